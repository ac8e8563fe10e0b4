//! WebAssembly label stack for control flow
//!
//! Each active `block`, `loop` or `if` owns one [`Label`]. A label records
//! where the operand stack stood when the construct was entered, how many
//! values a branch to it carries, and the byte offset a branch resumes at.
//!
//! See: <https://webassembly.github.io/spec/core/exec/runtime.html#labels>

/// Kind of construct a label belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// `block ... end`, branches continue after the `end`
    Block,
    /// `loop ... end`, branches re-enter the loop
    Loop,
    /// The "then" arm of an `if`
    IfThen,
    /// The "else" arm of an `if`
    IfElse,
    /// The implicit scope of the function body itself
    Function,
}

/// A label on the label stack
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub kind: LabelKind,
    /// Operand stack height the construct's results sit on top of
    pub height: usize,
    /// Number of values a branch to this label carries
    pub arity: usize,
    /// Offset execution resumes at when branching to this label
    pub target: usize,
}

/// The label stack for one function activation
#[derive(Debug, Default)]
pub struct LabelStack {
    labels: Vec<Label>,
}

impl LabelStack {
    /// Create a new empty label stack
    pub fn new() -> Self {
        LabelStack { labels: Vec::new() }
    }

    /// Push a new label onto the stack
    pub fn push(&mut self, label: Label) {
        self.labels.push(label);
    }

    /// Pop a label from the stack
    pub fn pop(&mut self) -> Option<Label> {
        self.labels.pop()
    }

    /// Get the nth label from the top (0 = innermost)
    pub fn get(&self, depth: u32) -> Option<&Label> {
        let len = self.labels.len();
        if depth as usize >= len {
            return None;
        }
        self.labels.get(len - 1 - depth as usize)
    }

    /// Remove the innermost `depth + 1` labels, returning the outermost one removed
    ///
    /// This is what a branch to `depth` does to the label stack.
    pub fn unwind(&mut self, depth: u32) -> Option<Label> {
        let len = self.labels.len();
        if depth as usize >= len {
            return None;
        }
        let mut removed = self.labels.drain(len - 1 - depth as usize..);
        removed.next()
    }

    /// Check if label stack is empty
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Get the current depth (number of labels)
    pub fn depth(&self) -> usize {
        self.labels.len()
    }
}

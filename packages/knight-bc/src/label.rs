use std::fmt;

/// What kind of storage (or code address) a label names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelCat {
    /// An inline non-negative integer; the id is the value itself.
    Constant,
    /// An index into the environment's literal pool.
    Literal,
    /// An index into the environment's named-variable table.
    Variable,
    /// A scratch slot in the current call frame, written once per call.
    Temporary,
    /// A symbolic code address, rewritten by the linker to an absolute
    /// offset.
    JumpTarget,
}

/// The IR's universal operand: a category plus an id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    cat: LabelCat,
    id: usize,
}

impl Label {
    pub fn new(cat: LabelCat, id: usize) -> Self {
        Self { cat, id }
    }

    pub fn constant(n: usize) -> Self {
        Self::new(LabelCat::Constant, n)
    }

    pub fn literal(id: usize) -> Self {
        Self::new(LabelCat::Literal, id)
    }

    pub fn variable(id: usize) -> Self {
        Self::new(LabelCat::Variable, id)
    }

    pub fn temporary(id: usize) -> Self {
        Self::new(LabelCat::Temporary, id)
    }

    pub fn jump(id: usize) -> Self {
        Self::new(LabelCat::JumpTarget, id)
    }

    pub fn cat(self) -> LabelCat {
        self.cat
    }

    pub fn id(self) -> usize {
        self.id
    }

    /// Can the value behind this label change between reads?
    pub fn is_mutable(self) -> bool {
        self.cat == LabelCat::Variable
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cat {
            LabelCat::Constant => write!(f, "${}", self.id),
            LabelCat::Literal => write!(f, "l:{}", self.id),
            LabelCat::Variable => write!(f, "v:{}", self.id),
            LabelCat::Temporary => write!(f, "t:{}", self.id),
            LabelCat::JumpTarget => write!(f, ">{}", self.id),
        }
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render() {
        assert_eq!(Label::constant(7).to_string(), "$7");
        assert_eq!(Label::literal(0).to_string(), "l:0");
        assert_eq!(Label::variable(3).to_string(), "v:3");
        assert_eq!(Label::temporary(1).to_string(), "t:1");
        assert_eq!(Label::jump(42).to_string(), ">42");
    }

    #[test]
    fn mutability() {
        assert!(Label::variable(0).is_mutable());
        assert!(!Label::temporary(0).is_mutable());
        assert!(!Label::constant(0).is_mutable());
        assert!(!Label::literal(0).is_mutable());
    }
}

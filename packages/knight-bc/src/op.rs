use std::fmt;

use crate::label::Label;

/// Instruction opcode. The numeric value indexes the VM's dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum OpCode {
    NoOp = 0,

    // control flow
    Label,
    BlockData,
    Call,
    Return,
    Jump,
    JumpIf,
    JumpIfNot,

    // arithmetic
    Plus,
    Minus,
    Multiplies,
    Divides,
    Modulus,
    Exponent,

    // logical
    Negate,
    Less,
    Greater,
    Equals,

    // string
    Length,
    Get,
    Substitute,

    // environment
    Assign,
    Prompt,
    Output,
    Random,
    Shell,
    Quit,
    Eval,
    Dump,
}

/// Total number of opcodes; the size of the dispatch table.
pub const NUM_OPS: usize = OpCode::Dump as usize + 1;

/// The most labels any single operation carries (`Substitute`).
pub const MAX_LABELS: usize = 5;

impl OpCode {
    /// How many label operands follow this opcode in the bytecode. The
    /// result slot, where present, counts towards the total.
    pub fn num_labels(self) -> usize {
        use OpCode::*;
        match self {
            NoOp => 0,
            Label | BlockData | Return | Jump => 1,
            Call | JumpIf | JumpIfNot => 2,
            Plus | Minus | Multiplies | Divides | Modulus | Exponent => 3,
            Negate | Length => 2,
            Less | Greater | Equals => 3,
            Get => 4,
            Substitute => 5,
            Assign => 2,
            Prompt | Output | Random | Quit | Dump => 1,
            Shell | Eval => 2,
        }
    }

    /// Short mnemonic used by the disassembler.
    pub fn mnemonic(self) -> &'static str {
        use OpCode::*;
        match self {
            NoOp => "noop",
            Label => "label",
            BlockData => "block.data",
            Call => "call",
            Return => "ret",
            Jump => "jmp",
            JumpIf => "jmp.if",
            JumpIfNot => "jmp.ifn",
            Plus => "add",
            Minus => "sub",
            Multiplies => "mul",
            Divides => "div",
            Modulus => "mod",
            Exponent => "pow",
            Negate => "not",
            Less => "lt",
            Greater => "gt",
            Equals => "eq",
            Length => "len",
            Get => "get",
            Substitute => "subst",
            Assign => "mov",
            Prompt => "prompt",
            Output => "output",
            Random => "random",
            Shell => "shell",
            Quit => "quit",
            Eval => "eval",
            Dump => "dump",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// An opcode plus its label operands. The operation result, when present,
/// is conventionally the first label.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub op: OpCode,
    labels: [Label; MAX_LABELS],
}

impl Operation {
    pub fn new(op: OpCode, labels: &[Label]) -> Self {
        assert_eq!(
            labels.len(),
            op.num_labels(),
            "wrong number of labels for {op:?}"
        );
        let mut all = [Label::constant(0); MAX_LABELS];
        all[..labels.len()].copy_from_slice(labels);
        Self { op, labels: all }
    }

    /// The operands actually used by this opcode.
    pub fn labels(&self) -> &[Label] {
        &self.labels[..self.op.num_labels()]
    }

    pub fn label(&self, i: usize) -> Label {
        self.labels()[i]
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op.mnemonic())?;
        for (i, label) in self.labels().iter().enumerate() {
            if i == 0 {
                write!(f, " {label}")?;
            } else {
                write!(f, ", {label}")?;
            }
        }
        Ok(())
    }
}

/// One cell of the flat bytecode: either an opcode or a label operand.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CodePoint {
    Op(OpCode),
    Label(Label),
}

impl CodePoint {
    /// The opcode in this cell. Panics if the cell holds a label; a
    /// confusion between the two is a linker bug, not a user error.
    pub fn op(self) -> OpCode {
        match self {
            Self::Op(op) => op,
            Self::Label(label) => panic!("expected opcode, found label {label}"),
        }
    }

    /// The label in this cell. Panics if the cell holds an opcode.
    pub fn label(self) -> Label {
        match self {
            Self::Label(label) => label,
            Self::Op(op) => panic!("expected label, found opcode {op}"),
        }
    }
}

impl fmt::Debug for CodePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Op(op) => write!(f, "{op}"),
            Self::Label(label) => write!(f, "{label}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_counts_cover_every_opcode() {
        // Spot-check the shapes the linker and VM rely on.
        assert_eq!(OpCode::NoOp.num_labels(), 0);
        assert_eq!(OpCode::Call.num_labels(), 2);
        assert_eq!(OpCode::Substitute.num_labels(), 5);
        assert_eq!(OpCode::Get.num_labels(), 4);
        assert_eq!(OpCode::Quit.num_labels(), 1);
        assert_eq!(NUM_OPS, 29);
    }

    #[test]
    fn operation_debug_rendering() {
        let op = Operation::new(
            OpCode::Plus,
            &[Label::temporary(0), Label::variable(1), Label::constant(4)],
        );
        assert_eq!(format!("{op:?}"), "add t:0, v:1, $4");
    }

    #[test]
    #[should_panic(expected = "wrong number of labels")]
    fn operation_arity_is_checked() {
        let _ = Operation::new(OpCode::Plus, &[Label::temporary(0)]);
    }
}

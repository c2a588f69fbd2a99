//! Resolves symbolic jump targets and flattens blocks into bytecode.

use std::collections::HashMap;

use knight_bc::{Block, CodePoint, Label, LabelCat, OpCode};
use knight_diagnostics::{Error, Result};

/// The label table persists across invocations so that code produced by
/// `EVAL` can be spliced after the fact and still refer to existing
/// entry points.
#[derive(Debug, Default)]
pub struct Linker {
    labels: HashMap<usize, usize>,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenate `blocks` into a flat code-point vector, recording `Label`
    /// positions and rewriting every jump-target operand to an absolute
    /// offset. `base` is where the produced code will live in the final
    /// bytecode (0 initially, the current length when splicing for `EVAL`).
    pub fn prepare(&mut self, blocks: &[Block], base: usize) -> Result<Vec<CodePoint>> {
        let mut out = Vec::new();
        // positions in `out` still holding a placeholder, by target id
        let mut patches: Vec<(usize, usize)> = Vec::new();

        for op in blocks.iter().flatten() {
            if op.op == OpCode::Label {
                let target = op.label(0);
                debug_assert_eq!(target.cat(), LabelCat::JumpTarget);
                let previous = self.labels.insert(target.id(), out.len() + base);
                debug_assert!(previous.is_none(), "jump target {target} defined twice");
                continue;
            }

            out.push(CodePoint::Op(op.op));
            for &label in op.labels() {
                if label.cat() == LabelCat::JumpTarget {
                    patches.push((out.len(), label.id()));
                    out.push(CodePoint::Label(Label::jump(0)));
                } else {
                    out.push(CodePoint::Label(label));
                }
            }
        }

        for (position, id) in patches {
            let offset = self.labels.get(&id).ok_or_else(|| {
                Error::internal(format!("unresolved jump target >{id}"))
            })?;
            out[position] = CodePoint::Label(Label::jump(*offset));
        }

        Ok(out)
    }
}

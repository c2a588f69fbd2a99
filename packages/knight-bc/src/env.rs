//! The process-wide interpreter state: named variables, the literal pool,
//! call frames and their temporary slots.

use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::HashMap;

use knight_diagnostics::{Error, Result};

use crate::label::{Label, LabelCat};
use crate::value::Value;

/// Fixed literal-pool ids. The pool is seeded with these before any string
/// is interned.
const LIT_NULL: usize = 0;
const LIT_TRUE: usize = 1;
const LIT_FALSE: usize = 2;

#[derive(Debug, Clone, Copy)]
struct Frame {
    return_addr: usize,
    result: Label,
    num_temps: usize,
}

/// Storage shared by the parser and the VM. Lives for the whole program.
#[derive(Debug)]
pub struct Environment {
    /// Named variables; the insertion index is the variable id.
    variables: IndexMap<SmolStr, Option<Value>>,
    /// Immutable values: null, true, false, then interned strings.
    literals: Vec<Value>,
    /// Content -> literal-pool id for interned strings.
    string_ids: HashMap<SmolStr, usize>,
    /// All live temporary slots; each frame owns a contiguous suffix.
    temporaries: Vec<Option<Value>>,
    frames: Vec<Frame>,
    /// Monotonic jump-target allocator. Global rather than per-parse so ids
    /// stay unique across `EVAL` re-entries.
    next_jump: usize,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            variables: IndexMap::new(),
            literals: vec![Value::Null, Value::Boolean(true), Value::Boolean(false)],
            string_ids: HashMap::new(),
            temporaries: Vec::new(),
            frames: Vec::new(),
            next_jump: 0,
        }
    }

    /// The label of a named variable, interning the name if it is new.
    pub fn intern_variable(&mut self, name: &str) -> Label {
        let entry = self.variables.entry(SmolStr::new(name));
        let id = entry.index();
        entry.or_insert(None);
        Label::variable(id)
    }

    /// The label of a string literal, deduplicated by content.
    pub fn intern_string(&mut self, text: &str) -> Label {
        if let Some(&id) = self.string_ids.get(text) {
            return Label::literal(id);
        }
        let id = self.literals.len();
        self.literals.push(Value::String(text.into()));
        self.string_ids.insert(SmolStr::new(text), id);
        Label::literal(id)
    }

    pub fn literal_null(&self) -> Label {
        Label::literal(LIT_NULL)
    }

    pub fn literal_bool(&self, b: bool) -> Label {
        Label::literal(if b { LIT_TRUE } else { LIT_FALSE })
    }

    /// A fresh jump-target label.
    pub fn new_jump(&mut self) -> Label {
        let id = self.next_jump;
        self.next_jump += 1;
        Label::jump(id)
    }

    pub fn variable_name(&self, id: usize) -> &str {
        self.variables
            .get_index(id)
            .map(|(name, _)| name.as_str())
            .unwrap_or("<unknown>")
    }

    /// Enter a call: reserve `num_temps` fresh scratch slots and remember
    /// where to come back to.
    pub fn push_frame(&mut self, return_addr: usize, result: Label, num_temps: usize) {
        self.temporaries
            .resize(self.temporaries.len() + num_temps, None);
        self.frames.push(Frame {
            return_addr,
            result,
            num_temps,
        });
    }

    /// Leave a call: drop the frame's slots and hand back its return address
    /// and result label.
    pub fn pop_frame(&mut self) -> (usize, Label) {
        let frame = self.frames.pop().expect("popped an empty frame stack");
        self.temporaries
            .truncate(self.temporaries.len() - frame.num_temps);
        (frame.return_addr, frame.result)
    }

    fn temp_index(&self, id: usize) -> usize {
        let frame = self.frames.last().expect("no active frame");
        debug_assert!(id < frame.num_temps);
        self.temporaries.len() - frame.num_temps + id
    }

    /// Resolve a label to its current value.
    pub fn load(&self, label: Label) -> Result<Value> {
        match label.cat() {
            LabelCat::Constant => Ok(Value::Number(label.id() as i64)),
            LabelCat::Literal => Ok(self.literals[label.id()].clone()),
            LabelCat::Variable => self.variables[label.id()]
                .clone()
                .ok_or_else(|| Error::undefined_variable(self.variable_name(label.id()))),
            LabelCat::Temporary => self.temporaries[self.temp_index(label.id())]
                .clone()
                .ok_or_else(|| {
                    Error::internal(format!("read of unassigned temporary {label}"))
                }),
            LabelCat::JumpTarget => Ok(Value::Block(label.id())),
        }
    }

    /// Store into a variable or temporary slot. Everything else is
    /// immutable.
    pub fn store(&mut self, label: Label, value: Value) -> Result<()> {
        match label.cat() {
            LabelCat::Variable => {
                self.variables[label.id()] = Some(value);
                Ok(())
            }
            LabelCat::Temporary => {
                let index = self.temp_index(label.id());
                self.temporaries[index] = Some(value);
                Ok(())
            }
            _ => Err(Error::internal(format!("store to immutable label {label}"))),
        }
    }
}

//! One-pass parser and IR emitter for Knight.
//!
//! The parser walks the token stream once, keeping an explicit stack of
//! partially-built frames. Whenever a frame has all of its children it is
//! handed to the matching emitter, which produces a result label plus an
//! instruction sequence for the parent. `BLOCK` bodies are lifted out into
//! their own blocks as they complete; the top-level program becomes block 0.

use knight_bc::{Block, Environment, Label, OpCode, Operation};
use knight_diagnostics::span::Span;
use knight_diagnostics::{Error, Result};

use crate::lexer::Token;

mod emit;
pub mod lexer;

#[cfg(test)]
mod tests;

/// What an emitter hands up to its parent: where the expression's value
/// lives, and the instructions that compute it.
#[derive(Debug, Clone)]
pub struct Emitted {
    pub result: Label,
    pub code: Vec<Operation>,
}

impl Emitted {
    /// A bare storage location with nothing to execute: a literal, constant
    /// or identifier.
    pub(crate) fn leaf(result: Label) -> Self {
        Self {
            result,
            code: Vec::new(),
        }
    }
}

/// A partially-parsed function application.
pub(crate) struct AstFrame {
    pub(crate) func: char,
    /// Span of the function token, for error reporting.
    pub(crate) span: Span,
    pub(crate) arity: usize,
    pub(crate) children: Vec<Emitted>,
}

impl AstFrame {
    fn new(func: char, span: Span, arity: usize) -> Self {
        Self {
            func,
            span,
            arity,
            children: Vec::with_capacity(arity),
        }
    }

    fn is_complete(&self) -> bool {
        self.children.len() == self.arity
    }
}

/// State threaded through one parse: the completed blocks and a stack of
/// temporary counters, one per enclosing block.
#[derive(Debug)]
pub struct ParseInfo {
    pub blocks: Vec<Block>,
    temp_scopes: Vec<usize>,
}

impl ParseInfo {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            // the top-level program is itself a block
            temp_scopes: vec![0],
        }
    }

    /// A fresh temporary in the innermost block.
    pub(crate) fn new_temp(&mut self) -> Label {
        let counter = self.temp_scopes.last_mut().unwrap();
        let id = *counter;
        *counter += 1;
        Label::temporary(id)
    }

    fn push_scope(&mut self) {
        self.temp_scopes.push(0);
    }

    /// Leave a block, yielding how many temporaries it needs.
    pub(crate) fn pop_scope(&mut self) -> usize {
        self.temp_scopes.pop().unwrap()
    }
}

/// Parse a token stream into a list of blocks, block 0 being the top-level
/// program. Identifiers and string literals are interned into `env` as they
/// are seen.
pub fn parse(tokens: &[(Token, Span)], env: &mut Environment) -> Result<Vec<Block>> {
    let mut info = ParseInfo::new();

    // the root frame receives the whole program as its only child
    let mut stack = vec![AstFrame::new('\0', Span::new(0, 0), 1)];

    for (index, (token, span)) in tokens.iter().enumerate() {
        match token {
            Token::Str(text) => {
                let label = env.intern_string(text);
                stack.last_mut().unwrap().children.push(Emitted::leaf(label));
            }
            Token::Number(n) => {
                let label = Label::constant(*n as usize);
                stack.last_mut().unwrap().children.push(Emitted::leaf(label));
            }
            Token::Ident(name) => {
                let label = env.intern_variable(name);
                stack.last_mut().unwrap().children.push(Emitted::leaf(label));
            }
            Token::Function(func) => {
                let (arity, emitter) = emit::lookup(*func)
                    .ok_or_else(|| Error::parse(*span, format!("unknown function `{func}`")))?;
                if arity == 0 {
                    let frame = AstFrame::new(*func, *span, 0);
                    let emitted = emitter(frame, &mut info, env)?;
                    stack.last_mut().unwrap().children.push(emitted);
                } else {
                    stack.push(AstFrame::new(*func, *span, arity));
                    // block bodies get their own temporary numbering
                    if *func == 'B' {
                        info.push_scope();
                    }
                }
            }
            Token::Err => unreachable!("error tokens are rejected by tokenise"),
        }

        // fold in completed frames
        while stack.last().unwrap().is_complete() {
            if stack.len() == 1 {
                if index + 1 != tokens.len() {
                    let (_, extra) = &tokens[index + 1];
                    return Err(Error::parse(*extra, "unparsed tokens after the program"));
                }
                let mut root = stack.pop().unwrap();
                let Emitted { result, mut code } = root.children.pop().unwrap();
                code.push(Operation::new(OpCode::Return, &[result]));
                code.insert(
                    0,
                    Operation::new(OpCode::BlockData, &[Label::constant(info.pop_scope())]),
                );
                // the top level goes first so that it is block 0
                info.blocks.insert(0, code);
                return Ok(info.blocks);
            }

            let frame = stack.pop().unwrap();
            let (_, emitter) = emit::lookup(frame.func).unwrap();
            let emitted = emitter(frame, &mut info, env)?;
            stack.last_mut().unwrap().children.push(emitted);
        }
    }

    Err(Error::parse_eof("unexpected end of input"))
}

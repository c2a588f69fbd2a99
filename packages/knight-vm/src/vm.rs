//! The dispatch loop and the per-opcode handlers.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use rand::Rng;

use knight_bc::op::NUM_OPS;
use knight_bc::{Block, CodePoint, Environment, Label, LabelCat, Number, OpCode, Value};
use knight_diagnostics::{Error, Result};

use crate::link::Linker;

/// Every block starts with `BlockData n`, which occupies two code points;
/// entry points sit immediately after it.
const HEADER_LEN: usize = 2;

/// Where control goes after a handler runs.
enum Step {
    Goto(usize),
    Halt(Number),
}

type OpFn = fn(&mut Vm, usize) -> Result<Step>;

/// Operand count and handler for every opcode, in opcode order.
const DISPATCH: [(usize, OpFn); NUM_OPS] = [
    (0, Vm::op_noop),
    (1, Vm::op_unreachable), // Label
    (1, Vm::op_unreachable), // BlockData
    (2, Vm::op_call),
    (1, Vm::op_return),
    (1, Vm::op_jump),
    (2, Vm::op_jump_if),
    (2, Vm::op_jump_if_not),
    (3, Vm::op_plus),
    (3, Vm::op_minus),
    (3, Vm::op_multiplies),
    (3, Vm::op_divides),
    (3, Vm::op_modulus),
    (3, Vm::op_exponent),
    (2, Vm::op_negate),
    (3, Vm::op_less),
    (3, Vm::op_greater),
    (3, Vm::op_equals),
    (2, Vm::op_length),
    (4, Vm::op_get),
    (5, Vm::op_substitute),
    (2, Vm::op_assign),
    (1, Vm::op_prompt),
    (1, Vm::op_output),
    (1, Vm::op_random),
    (2, Vm::op_shell),
    (1, Vm::op_quit),
    (2, Vm::op_eval),
    (1, Vm::op_dump),
];

pub struct Vm {
    bytecode: Vec<CodePoint>,
    ip: usize,
    env: Environment,
    linker: Linker,
    /// `EVAL` source -> entry offset of the already-spliced code. Strictly
    /// additive; the bytecode only ever grows.
    eval_cache: HashMap<String, usize>,
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
}

impl Vm {
    /// Assemble `blocks` and set up the initial call frame, wired to the
    /// process's stdin/stdout.
    pub fn new(blocks: &[Block], env: Environment) -> Result<Self> {
        Self::with_io(
            blocks,
            env,
            Box::new(io::BufReader::new(io::stdin())),
            Box::new(io::stdout()),
        )
    }

    pub fn with_io(
        blocks: &[Block],
        mut env: Environment,
        input: Box<dyn BufRead>,
        output: Box<dyn Write>,
    ) -> Result<Self> {
        let mut linker = Linker::new();
        let mut bytecode = linker.prepare(blocks, 0)?;

        // make sure the program has a "finish": the top-level result is
        // carried into a synthetic Quit through a reserved variable
        let end = bytecode.len();
        let retval = env.intern_variable("#retval");
        bytecode.push(CodePoint::Op(OpCode::Quit));
        bytecode.push(CodePoint::Label(retval));

        assert_eq!(bytecode[0].op(), OpCode::BlockData);
        let num_temps = bytecode[1].label().id();
        env.push_frame(end, retval, num_temps);

        Ok(Self {
            bytecode,
            ip: HEADER_LEN,
            env,
            linker,
            eval_cache: HashMap::new(),
            input,
            output,
        })
    }

    /// Run to completion and hand back the exit status.
    pub fn run(&mut self) -> Result<Number> {
        while self.ip < self.bytecode.len() {
            let ip = self.ip;
            let op = self.bytecode[ip].op();
            let (_, handler) = DISPATCH[op as usize];
            match handler(self, ip)? {
                Step::Goto(next) => self.ip = next,
                Step::Halt(code) => return Ok(code),
            }
        }
        // well-formed programs always leave through Quit
        Ok(0)
    }

    /// The assembled program, for the disassembler.
    pub fn code(&self) -> &[CodePoint] {
        &self.bytecode
    }

    fn label_at(&self, index: usize) -> Label {
        self.bytecode[index].label()
    }

    fn load(&self, index: usize) -> Result<Value> {
        self.env.load(self.label_at(index))
    }

    fn store_result(&mut self, index: usize, value: Value) -> Result<()> {
        self.env.store(self.label_at(index), value)
    }

    /// The temp count a block declared, read back from the `BlockData`
    /// header in front of its entry point.
    fn block_data(&self, entry: usize) -> Result<usize> {
        match entry.checked_sub(HEADER_LEN).map(|i| self.bytecode[i]) {
            Some(CodePoint::Op(OpCode::BlockData)) => Ok(self.bytecode[entry - 1].label().id()),
            _ => Err(Error::internal(format!(
                "no block header before entry {entry}"
            ))),
        }
    }

    // control flow

    fn op_noop(&mut self, ip: usize) -> Result<Step> {
        Ok(Step::Goto(ip + 1))
    }

    fn op_unreachable(&mut self, ip: usize) -> Result<Step> {
        Err(Error::internal(format!("executed data at offset {ip}")))
    }

    fn op_call(&mut self, ip: usize) -> Result<Step> {
        let result = self.label_at(ip + 1);
        let target = self.label_at(ip + 2);
        let entry = if target.cat() == LabelCat::JumpTarget {
            target.id()
        } else {
            self.load(ip + 2)?.to_block()?
        };
        let num_temps = self.block_data(entry)?;
        self.env.push_frame(ip + 3, result, num_temps);
        Ok(Step::Goto(entry))
    }

    fn op_return(&mut self, ip: usize) -> Result<Step> {
        // the operand may name one of this frame's temporaries, so load it
        // before the frame goes away
        let value = self.load(ip + 1)?;
        let (return_addr, result) = self.env.pop_frame();
        self.env.store(result, value)?;
        Ok(Step::Goto(return_addr))
    }

    fn op_jump(&mut self, ip: usize) -> Result<Step> {
        let target = self.label_at(ip + 1);
        debug_assert_eq!(target.cat(), LabelCat::JumpTarget);
        Ok(Step::Goto(target.id()))
    }

    fn op_jump_if(&mut self, ip: usize) -> Result<Step> {
        if self.load(ip + 2)?.to_bool() {
            Ok(Step::Goto(self.label_at(ip + 1).id()))
        } else {
            Ok(Step::Goto(ip + 3))
        }
    }

    fn op_jump_if_not(&mut self, ip: usize) -> Result<Step> {
        if self.load(ip + 2)?.to_bool() {
            Ok(Step::Goto(ip + 3))
        } else {
            Ok(Step::Goto(self.label_at(ip + 1).id()))
        }
    }

    // arithmetic

    fn op_plus(&mut self, ip: usize) -> Result<Step> {
        let lhs = self.load(ip + 2)?;
        let rhs = self.load(ip + 3)?;
        let value = match &lhs {
            Value::Number(x) => Value::Number(x.wrapping_add(rhs.to_number())),
            Value::String(x) => Value::String(x.concat(&rhs.to_string())),
            other => {
                return Err(Error::type_error(format!(
                    "cannot add to a {}",
                    other.type_name()
                )))
            }
        };
        self.store_result(ip + 1, value)?;
        Ok(Step::Goto(ip + 4))
    }

    fn op_multiplies(&mut self, ip: usize) -> Result<Step> {
        let lhs = self.load(ip + 2)?;
        let rhs = self.load(ip + 3)?;
        let value = match &lhs {
            Value::Number(x) => Value::Number(x.wrapping_mul(rhs.to_number())),
            Value::String(x) => {
                let count = rhs.to_number();
                if count < 0 {
                    return Err(Error::runtime("negative string repetition count"));
                }
                Value::String(x.repeat(count as usize))
            }
            other => {
                return Err(Error::type_error(format!(
                    "cannot multiply a {}",
                    other.type_name()
                )))
            }
        };
        self.store_result(ip + 1, value)?;
        Ok(Step::Goto(ip + 4))
    }

    fn numeric_binary(
        &mut self,
        ip: usize,
        f: impl FnOnce(Number, Number) -> Result<Number>,
    ) -> Result<Step> {
        let lhs = self.load(ip + 2)?.to_number();
        let rhs = self.load(ip + 3)?.to_number();
        self.store_result(ip + 1, Value::Number(f(lhs, rhs)?))?;
        Ok(Step::Goto(ip + 4))
    }

    fn op_minus(&mut self, ip: usize) -> Result<Step> {
        self.numeric_binary(ip, |x, y| Ok(x.wrapping_sub(y)))
    }

    fn op_divides(&mut self, ip: usize) -> Result<Step> {
        self.numeric_binary(ip, |x, y| {
            if y == 0 {
                Err(Error::runtime("division by zero"))
            } else {
                Ok(x.wrapping_div(y))
            }
        })
    }

    fn op_modulus(&mut self, ip: usize) -> Result<Step> {
        self.numeric_binary(ip, |x, y| {
            if y == 0 {
                Err(Error::runtime("division by zero"))
            } else {
                Ok(x.wrapping_rem(y))
            }
        })
    }

    fn op_exponent(&mut self, ip: usize) -> Result<Step> {
        self.numeric_binary(ip, |x, y| Ok(int_pow(x, y)))
    }

    // logical

    fn op_negate(&mut self, ip: usize) -> Result<Step> {
        let value = self.load(ip + 2)?;
        self.store_result(ip + 1, Value::Boolean(!value.to_bool()))?;
        Ok(Step::Goto(ip + 3))
    }

    /// `Less` and `Greater` coerce their right operand according to the
    /// kind of the left one.
    fn compare(&mut self, ip: usize) -> Result<Ordering> {
        let lhs = self.load(ip + 2)?;
        let rhs = self.load(ip + 3)?;
        match &lhs {
            Value::Number(x) => Ok(x.cmp(&rhs.to_number())),
            Value::String(x) => Ok(x.as_str().cmp(rhs.to_string().as_str())),
            Value::Boolean(x) => Ok(x.cmp(&rhs.to_bool())),
            other => Err(Error::type_error(format!(
                "cannot compare a {}",
                other.type_name()
            ))),
        }
    }

    fn op_less(&mut self, ip: usize) -> Result<Step> {
        let ordering = self.compare(ip)?;
        self.store_result(ip + 1, Value::Boolean(ordering == Ordering::Less))?;
        Ok(Step::Goto(ip + 4))
    }

    fn op_greater(&mut self, ip: usize) -> Result<Step> {
        let ordering = self.compare(ip)?;
        self.store_result(ip + 1, Value::Boolean(ordering == Ordering::Greater))?;
        Ok(Step::Goto(ip + 4))
    }

    fn op_equals(&mut self, ip: usize) -> Result<Step> {
        let lhs = self.load(ip + 2)?;
        let rhs = self.load(ip + 3)?;
        self.store_result(ip + 1, Value::Boolean(lhs == rhs))?;
        Ok(Step::Goto(ip + 4))
    }

    // strings

    fn op_length(&mut self, ip: usize) -> Result<Step> {
        let text = self.load(ip + 2)?.to_string();
        self.store_result(ip + 1, Value::Number(text.len() as Number))?;
        Ok(Step::Goto(ip + 3))
    }

    fn op_get(&mut self, ip: usize) -> Result<Step> {
        let text = self.load(ip + 2)?.to_string();
        let pos = self.load(ip + 3)?.to_number();
        let len = self.load(ip + 4)?.to_number();
        let (pos, len) = index_pair(pos, len)?;
        self.store_result(ip + 1, Value::String(text.substr(pos, len)?))?;
        Ok(Step::Goto(ip + 5))
    }

    fn op_substitute(&mut self, ip: usize) -> Result<Step> {
        let text = self.load(ip + 2)?.to_string();
        let pos = self.load(ip + 3)?.to_number();
        let len = self.load(ip + 4)?.to_number();
        let repl = self.load(ip + 5)?.to_string();
        let (pos, len) = index_pair(pos, len)?;
        self.store_result(ip + 1, Value::String(text.replace(pos, len, &repl)?))?;
        Ok(Step::Goto(ip + 6))
    }

    // environment

    fn op_assign(&mut self, ip: usize) -> Result<Step> {
        let value = self.load(ip + 2)?;
        self.store_result(ip + 1, value)?;
        Ok(Step::Goto(ip + 3))
    }

    fn op_prompt(&mut self, ip: usize) -> Result<Step> {
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        self.store_result(ip + 1, Value::String(line.into()))?;
        Ok(Step::Goto(ip + 2))
    }

    fn op_output(&mut self, ip: usize) -> Result<Step> {
        let text = self.load(ip + 1)?.to_string();
        // a trailing backslash suppresses the newline
        match text.as_str().strip_suffix('\\') {
            Some(stripped) => write!(self.output, "{stripped}")?,
            None => writeln!(self.output, "{text}")?,
        }
        self.output.flush()?;
        Ok(Step::Goto(ip + 2))
    }

    fn op_random(&mut self, ip: usize) -> Result<Step> {
        let value = rand::thread_rng().gen_range(0..=Number::MAX);
        self.store_result(ip + 1, Value::Number(value))?;
        Ok(Step::Goto(ip + 2))
    }

    fn op_shell(&mut self, ip: usize) -> Result<Step> {
        let command = self.load(ip + 2)?.to_string();
        let output = crate::shell::open_shell(command.as_str())?;
        self.store_result(ip + 1, Value::String(output.into()))?;
        Ok(Step::Goto(ip + 3))
    }

    fn op_quit(&mut self, ip: usize) -> Result<Step> {
        let code = self.load(ip + 1)?.to_number();
        Ok(Step::Halt(code))
    }

    fn op_dump(&mut self, ip: usize) -> Result<Step> {
        let value = self.load(ip + 1)?;
        write!(self.output, "{value}")?;
        self.output.flush()?;
        Ok(Step::Goto(ip + 2))
    }

    /// Re-enter the front end on a runtime string and splice the assembled
    /// result onto the end of the live program.
    fn op_eval(&mut self, ip: usize) -> Result<Step> {
        let result = self.label_at(ip + 1);
        let source = self.load(ip + 2)?.to_string();

        let entry = match self.eval_cache.get(source.as_str()) {
            Some(&entry) => entry,
            None => {
                let tokens = knight_parser::lexer::tokenise(source.as_str())?;
                let blocks = knight_parser::parse(&tokens, &mut self.env)?;
                let base = self.bytecode.len();
                let spliced = self.linker.prepare(&blocks, base)?;
                self.bytecode.extend(spliced);
                let entry = base + HEADER_LEN;
                self.eval_cache.insert(source.as_str().to_owned(), entry);
                entry
            }
        };

        let num_temps = self.block_data(entry)?;
        self.env.push_frame(ip + 3, result, num_temps);
        Ok(Step::Goto(entry))
    }
}

/// Integer exponentiation. Negative exponents only have an integral result
/// for bases 1 and -1; everything else truncates to 0.
fn int_pow(base: Number, exp: Number) -> Number {
    if exp < 0 {
        return match base {
            1 => 1,
            -1 if exp % 2 == 0 => 1,
            -1 => -1,
            _ => 0,
        };
    }
    let mut result: Number = 1;
    let mut base = base;
    let mut exp = exp as u64;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    result
}

fn index_pair(pos: Number, len: Number) -> Result<(usize, usize)> {
    if pos < 0 || len < 0 {
        return Err(Error::runtime(format!(
            "substring bounds ({pos}, {len}) are negative"
        )));
    }
    Ok((pos as usize, len as usize))
}

//! Per-operator IR templates. Each emitter consumes its children's
//! instruction sequences and produces an [`Emitted`] for the parent frame.

use knight_bc::{Environment, Label, LabelCat, OpCode, Operation};
use knight_diagnostics::{Error, Result};

use crate::{AstFrame, Emitted, ParseInfo};

pub(crate) type EmitFn = fn(AstFrame, &mut ParseInfo, &mut Environment) -> Result<Emitted>;

/// The function-letter table: arity plus emitter.
pub(crate) fn lookup(func: char) -> Option<(usize, EmitFn)> {
    Some(match func {
        'T' => (0, true_),
        'F' => (0, false_),
        'N' => (0, null),
        'P' => (0, prompt),
        'R' => (0, random),

        'E' => (1, eval),
        'B' => (1, block),
        'C' => (1, call),
        '`' => (1, shell),
        'Q' => (1, quit),
        '!' => (1, negate),
        'L' => (1, length),
        'D' => (1, dump),
        'O' => (1, output),

        '+' => (2, plus),
        '-' => (2, minus),
        '*' => (2, multiplies),
        '/' => (2, divides),
        '%' => (2, modulus),
        '^' => (2, exponent),
        '<' => (2, less),
        '>' => (2, greater),
        '?' => (2, equals),
        '|' => (2, disjunct),
        '&' => (2, conjunct),
        ';' => (2, sequence),
        '=' => (2, assign),
        'W' => (2, while_),

        'I' => (3, ifelse),
        'G' => (3, get),

        'S' => (4, substitute),

        _ => return None,
    })
}

/// If `arg` is a mutable variable and some later operand still has code to
/// run, copy it into a fresh temporary now so left-to-right evaluation
/// order survives a later assignment to the same variable.
fn cache_arg(arg: &mut Emitted, later_has_code: bool, info: &mut ParseInfo) {
    if later_has_code && arg.result.is_mutable() {
        let tmp = info.new_temp();
        arg.code
            .push(Operation::new(OpCode::Assign, &[tmp, arg.result]));
        arg.result = tmp;
    }
}

/// `Op result, child` for value-producing one-argument functions.
fn gen_value(op: OpCode, mut ast: AstFrame, info: &mut ParseInfo) -> Result<Emitted> {
    let mut child = ast.children.pop().unwrap();
    let result = info.new_temp();
    child.code.push(Operation::new(op, &[result, child.result]));
    Ok(Emitted {
        result,
        code: child.code,
    })
}

/// `Op child` for statements; the expression's own value is null.
fn gen_statement(
    op: OpCode,
    mut ast: AstFrame,
    env: &mut Environment,
) -> Result<Emitted> {
    let mut child = ast.children.pop().unwrap();
    child.code.push(Operation::new(op, &[child.result]));
    Ok(Emitted {
        result: env.literal_null(),
        code: child.code,
    })
}

/// `Op result, lhs, rhs` with the argument-caching rule applied to the
/// left operand.
fn gen_binary(op: OpCode, mut ast: AstFrame, info: &mut ParseInfo) -> Result<Emitted> {
    let rhs = ast.children.pop().unwrap();
    let mut lhs = ast.children.pop().unwrap();
    cache_arg(&mut lhs, !rhs.code.is_empty(), info);

    let result = info.new_temp();
    lhs.code.extend(rhs.code);
    lhs.code
        .push(Operation::new(op, &[result, lhs.result, rhs.result]));
    Ok(Emitted {
        result,
        code: lhs.code,
    })
}

/// Conjunction and disjunction share one shape; `brancher` decides which
/// truth of the left operand skips the right one.
fn short_circuit(
    brancher: OpCode,
    mut ast: AstFrame,
    info: &mut ParseInfo,
    env: &mut Environment,
) -> Result<Emitted> {
    let rhs = ast.children.pop().unwrap();
    let lhs = ast.children.pop().unwrap();

    let finish = env.new_jump();
    let result = info.new_temp();

    let mut code = lhs.code;
    code.push(Operation::new(OpCode::Assign, &[result, lhs.result]));
    code.push(Operation::new(brancher, &[finish, lhs.result]));
    code.extend(rhs.code);
    code.push(Operation::new(OpCode::Assign, &[result, rhs.result]));
    code.push(Operation::new(OpCode::Label, &[finish]));
    Ok(Emitted { result, code })
}

// arity 0

fn true_(_ast: AstFrame, _info: &mut ParseInfo, env: &mut Environment) -> Result<Emitted> {
    Ok(Emitted::leaf(env.literal_bool(true)))
}

fn false_(_ast: AstFrame, _info: &mut ParseInfo, env: &mut Environment) -> Result<Emitted> {
    Ok(Emitted::leaf(env.literal_bool(false)))
}

fn null(_ast: AstFrame, _info: &mut ParseInfo, env: &mut Environment) -> Result<Emitted> {
    Ok(Emitted::leaf(env.literal_null()))
}

fn prompt(_ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    let result = info.new_temp();
    Ok(Emitted {
        result,
        code: vec![Operation::new(OpCode::Prompt, &[result])],
    })
}

fn random(_ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    let result = info.new_temp();
    Ok(Emitted {
        result,
        code: vec![Operation::new(OpCode::Random, &[result])],
    })
}

// arity 1

fn eval(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_value(OpCode::Eval, ast, info)
}

fn call(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_value(OpCode::Call, ast, info)
}

fn shell(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_value(OpCode::Shell, ast, info)
}

fn negate(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_value(OpCode::Negate, ast, info)
}

fn length(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_value(OpCode::Length, ast, info)
}

fn output(ast: AstFrame, _info: &mut ParseInfo, env: &mut Environment) -> Result<Emitted> {
    gen_statement(OpCode::Output, ast, env)
}

fn dump(ast: AstFrame, _info: &mut ParseInfo, env: &mut Environment) -> Result<Emitted> {
    gen_statement(OpCode::Dump, ast, env)
}

fn quit(ast: AstFrame, _info: &mut ParseInfo, env: &mut Environment) -> Result<Emitted> {
    gen_statement(OpCode::Quit, ast, env)
}

/// The child's code is lifted out into its own block; all that remains at
/// the call site is the entry label.
fn block(mut ast: AstFrame, info: &mut ParseInfo, env: &mut Environment) -> Result<Emitted> {
    let child = ast.children.pop().unwrap();
    let entry = env.new_jump();
    let num_temps = info.pop_scope();

    let mut code = Vec::with_capacity(child.code.len() + 3);
    code.push(Operation::new(
        OpCode::BlockData,
        &[Label::constant(num_temps)],
    ));
    code.push(Operation::new(OpCode::Label, &[entry]));
    code.extend(child.code);
    code.push(Operation::new(OpCode::Return, &[child.result]));
    info.blocks.push(code);

    Ok(Emitted::leaf(entry))
}

// arity 2

fn plus(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_binary(OpCode::Plus, ast, info)
}

fn minus(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_binary(OpCode::Minus, ast, info)
}

fn multiplies(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_binary(OpCode::Multiplies, ast, info)
}

fn divides(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_binary(OpCode::Divides, ast, info)
}

fn modulus(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_binary(OpCode::Modulus, ast, info)
}

fn exponent(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_binary(OpCode::Exponent, ast, info)
}

fn less(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_binary(OpCode::Less, ast, info)
}

fn greater(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_binary(OpCode::Greater, ast, info)
}

fn equals(ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    gen_binary(OpCode::Equals, ast, info)
}

fn disjunct(ast: AstFrame, info: &mut ParseInfo, env: &mut Environment) -> Result<Emitted> {
    short_circuit(OpCode::JumpIf, ast, info, env)
}

fn conjunct(ast: AstFrame, info: &mut ParseInfo, env: &mut Environment) -> Result<Emitted> {
    short_circuit(OpCode::JumpIfNot, ast, info, env)
}

fn sequence(mut ast: AstFrame, _info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    let rhs = ast.children.pop().unwrap();
    let mut lhs = ast.children.pop().unwrap();
    lhs.code.extend(rhs.code);
    Ok(Emitted {
        result: rhs.result,
        code: lhs.code,
    })
}

fn assign(mut ast: AstFrame, _info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    let mut rhs = ast.children.pop().unwrap();
    let var = ast.children.pop().unwrap();

    // only an identifier may be assigned to, and identifiers never carry
    // instructions
    if var.result.cat() != LabelCat::Variable || !var.code.is_empty() {
        return Err(Error::parse(
            ast.span,
            "expected an identifier as assignment target",
        ));
    }

    rhs.code
        .push(Operation::new(OpCode::Assign, &[var.result, rhs.result]));
    Ok(Emitted {
        result: var.result,
        code: rhs.code,
    })
}

fn while_(mut ast: AstFrame, _info: &mut ParseInfo, env: &mut Environment) -> Result<Emitted> {
    let body = ast.children.pop().unwrap();
    let cond = ast.children.pop().unwrap();

    let start = env.new_jump();
    let finish = env.new_jump();

    let mut code = vec![Operation::new(OpCode::Label, &[start])];
    code.extend(cond.code);
    code.push(Operation::new(OpCode::JumpIfNot, &[finish, cond.result]));
    code.extend(body.code);
    code.push(Operation::new(OpCode::Jump, &[start]));
    code.push(Operation::new(OpCode::Label, &[finish]));
    Ok(Emitted {
        result: env.literal_null(),
        code,
    })
}

// arity 3

fn ifelse(mut ast: AstFrame, info: &mut ParseInfo, env: &mut Environment) -> Result<Emitted> {
    let no = ast.children.pop().unwrap();
    let yes = ast.children.pop().unwrap();
    let cond = ast.children.pop().unwrap();

    let no_label = env.new_jump();
    let end_label = env.new_jump();
    let result = info.new_temp();

    let mut code = cond.code;
    code.push(Operation::new(OpCode::JumpIfNot, &[no_label, cond.result]));
    code.extend(yes.code);
    code.push(Operation::new(OpCode::Assign, &[result, yes.result]));
    code.push(Operation::new(OpCode::Jump, &[end_label]));
    code.push(Operation::new(OpCode::Label, &[no_label]));
    code.extend(no.code);
    code.push(Operation::new(OpCode::Assign, &[result, no.result]));
    code.push(Operation::new(OpCode::Label, &[end_label]));
    Ok(Emitted { result, code })
}

fn get(mut ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    let len = ast.children.pop().unwrap();
    let mut pos = ast.children.pop().unwrap();
    let mut str_ = ast.children.pop().unwrap();

    cache_arg(&mut str_, !pos.code.is_empty() || !len.code.is_empty(), info);
    cache_arg(&mut pos, !len.code.is_empty(), info);

    let result = info.new_temp();
    str_.code.extend(pos.code);
    str_.code.extend(len.code);
    str_.code.push(Operation::new(
        OpCode::Get,
        &[result, str_.result, pos.result, len.result],
    ));
    Ok(Emitted {
        result,
        code: str_.code,
    })
}

// arity 4

fn substitute(mut ast: AstFrame, info: &mut ParseInfo, _env: &mut Environment) -> Result<Emitted> {
    let repl = ast.children.pop().unwrap();
    let mut len = ast.children.pop().unwrap();
    let mut pos = ast.children.pop().unwrap();
    let mut str_ = ast.children.pop().unwrap();

    let later = |xs: &[&Emitted]| xs.iter().any(|x| !x.code.is_empty());
    cache_arg(&mut str_, later(&[&pos, &len, &repl]), info);
    cache_arg(&mut pos, later(&[&len, &repl]), info);
    cache_arg(&mut len, later(&[&repl]), info);

    let result = info.new_temp();
    str_.code.extend(pos.code);
    str_.code.extend(len.code);
    str_.code.extend(repl.code);
    str_.code.push(Operation::new(
        OpCode::Substitute,
        &[result, str_.result, pos.result, len.result, repl.result],
    ));
    Ok(Emitted {
        result,
        code: str_.code,
    })
}

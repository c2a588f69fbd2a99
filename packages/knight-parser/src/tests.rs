use expect_test::{expect, Expect};

use knight_bc::{Block, Environment, LabelCat, OpCode};

use crate::lexer::tokenise;
use crate::parse;

fn compile(source: &str) -> (Vec<Block>, Environment) {
    let mut env = Environment::new();
    let tokens = tokenise(source).unwrap();
    let blocks = parse(&tokens, &mut env).unwrap();
    (blocks, env)
}

/// One line per operation, one group per block, in block order.
fn render(blocks: &[Block]) -> String {
    let mut out = String::new();
    for (index, block) in blocks.iter().enumerate() {
        out.push_str(&format!("block {index}:\n"));
        for op in block {
            out.push_str(&format!("  {op:?}\n"));
        }
    }
    out
}

#[track_caller]
fn check(source: &str, expect: Expect) {
    let (blocks, _) = compile(source);
    expect.assert_eq(&render(&blocks));
}

#[test]
fn constant_expression() {
    check(
        "+ 1 2",
        expect![[r#"
            block 0:
              block.data $1
              add t:0, $1, $2
              ret t:0
        "#]],
    );
}

#[test]
fn assignment_and_sequence() {
    check(
        "; = a 3 O + a 4",
        expect![[r#"
            block 0:
              block.data $1
              mov v:0, $3
              add t:0, v:0, $4
              output t:0
              ret l:0
        "#]],
    );
}

#[test]
fn left_operand_is_cached_when_the_right_one_has_code() {
    check(
        "+ a = a 2",
        expect![[r#"
            block 0:
              block.data $2
              mov t:0, v:0
              mov v:0, $2
              add t:1, t:0, v:0
              ret t:1
        "#]],
    );
}

#[test]
fn conjunction_short_circuits_around_the_right_operand() {
    check(
        r#"& a O "hi""#,
        expect![[r#"
            block 0:
              block.data $1
              mov t:0, v:0
              jmp.ifn >0, v:0
              output l:3
              mov t:0, l:0
              label >0
              ret t:0
        "#]],
    );
}

#[test]
fn while_loop_shape() {
    check(
        "W > n 0 = n - n 1",
        expect![[r#"
            block 0:
              block.data $2
              label >0
              gt t:0, v:0, $0
              jmp.ifn >1, t:0
              sub t:1, v:0, $1
              mov v:0, t:1
              jmp >0
              label >1
              ret l:0
        "#]],
    );
}

#[test]
fn if_assigns_both_arms_into_one_result() {
    check(
        r#"I < 1 2 "a" "b""#,
        expect![[r#"
            block 0:
              block.data $2
              lt t:0, $1, $2
              jmp.ifn >0, t:0
              mov t:1, l:3
              jmp >1
              label >0
              mov t:1, l:4
              label >1
              ret t:1
        "#]],
    );
}

#[test]
fn blocks_are_lifted_to_the_top_level() {
    check(
        "; = f B + 1 2 O C f",
        expect![[r#"
            block 0:
              block.data $1
              mov v:0, >0
              call t:0, v:0
              output t:0
              ret l:0
            block 1:
              block.data $1
              label >0
              add t:0, $1, $2
              ret t:0
        "#]],
    );
}

#[test]
fn block_without_temporaries() {
    check(
        "; = f B 1 C f",
        expect![[r#"
            block 0:
              block.data $1
              mov v:0, >0
              call t:0, v:0
              ret t:0
            block 1:
              block.data $0
              label >0
              ret $1
        "#]],
    );
}

#[test]
fn zero_arity_literals_emit_no_code() {
    let (blocks, _) = compile("T");
    assert_eq!(blocks.len(), 1);
    // only the header and the return
    assert_eq!(blocks[0].len(), 2);
    assert_eq!(blocks[0][0].op, OpCode::BlockData);
    assert_eq!(blocks[0][1].op, OpCode::Return);
    assert_eq!(blocks[0][1].label(0).cat(), LabelCat::Literal);
}

#[test]
fn string_literals_intern_by_content() {
    let (blocks, _) = compile(r#"+ "ab" "ab""#);
    let add = &blocks[0][1];
    assert_eq!(add.op, OpCode::Plus);
    assert_eq!(add.label(1), add.label(2));
}

#[test]
fn nested_blocks_become_sibling_blocks() {
    let (blocks, _) = compile("= f B B 1");
    // the top level plus two lifted blocks
    assert_eq!(blocks.len(), 3);
    for block in &blocks {
        assert_eq!(block[0].op, OpCode::BlockData);
        assert_eq!(block.last().unwrap().op, OpCode::Return);
    }
    // inner blocks complete first, so the outer block is last; it returns
    // the inner block's entry label
    let outer = &blocks[2];
    assert_eq!(outer.last().unwrap().label(0).cat(), LabelCat::JumpTarget);
}

#[test]
fn parsing_is_deterministic() {
    let source = r#"; = f B + 1 2 ; W > a 0 = a - a 1 O I ? a 0 "done" C f"#;
    let (first, _) = compile(source);
    let (second, _) = compile(source);
    assert_eq!(first, second);
}

#[test]
fn unknown_function_letter() {
    let mut env = Environment::new();
    let tokens = tokenise("A 1").unwrap();
    let err = parse(&tokens, &mut env).unwrap_err();
    assert!(err.to_string().contains("unknown function `A`"));
}

#[test]
fn trailing_tokens_are_rejected() {
    let mut env = Environment::new();
    let tokens = tokenise("+ 1 2 3").unwrap();
    let err = parse(&tokens, &mut env).unwrap_err();
    assert!(err.to_string().contains("unparsed tokens"));
    assert_eq!(err.span().unwrap().start, 6);
}

#[test]
fn truncated_input_is_rejected() {
    let mut env = Environment::new();
    for source in ["+ 1", "", "W < a"] {
        let tokens = tokenise(source).unwrap();
        let err = parse(&tokens, &mut env).unwrap_err();
        assert!(err.to_string().contains("unexpected end of input"), "{source:?}");
    }
}

#[test]
fn assignment_needs_an_identifier_target() {
    let mut env = Environment::new();
    let tokens = tokenise("= 1 2").unwrap();
    let err = parse(&tokens, &mut env).unwrap_err();
    assert!(err.to_string().contains("assignment target"));
}

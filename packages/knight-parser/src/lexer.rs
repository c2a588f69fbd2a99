use logos::Logos;
use smol_str::SmolStr;

use knight_diagnostics::span::Span;
use knight_diagnostics::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, logos::Logos)]
pub enum Token {
    /// A run of decimal digits. Numbers in source are always non-negative;
    /// `-` is a function letter.
    #[regex("[0-9]+", |lex| lex.slice().parse())]
    Number(i64),

    #[regex("[a-z_][a-z0-9_]*", |lex| SmolStr::new(lex.slice()))]
    Ident(SmolStr),

    /// A string literal. No escapes; the other quote kind may appear freely
    /// inside.
    #[regex(r#""[^"]*""#, |lex| lex.slice()[1..lex.slice().len() - 1].to_string())]
    #[regex(r"'[^']*'", |lex| lex.slice()[1..lex.slice().len() - 1].to_string())]
    Str(String),

    /// A function: one uppercase letter (any further uppercase letters and
    /// underscores are part of the word but carry no meaning), or a single
    /// punctuation operator.
    #[regex("[A-Z][A-Z_]*", |lex| lex.slice().as_bytes()[0] as char)]
    #[regex("[-+*/%^!<>?|&;=`]", |lex| lex.slice().as_bytes()[0] as char)]
    Function(char),

    #[error]
    #[regex(r"[ \t\r\n(){}\[\]:]+", logos::skip)]
    #[regex("#[^\n]*", logos::skip)]
    Err,
}

/// Tokenise a whole program, converting logos error tokens into the
/// specific lex errors.
pub fn tokenise(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    for (token, range) in Token::lexer(source).spanned() {
        let span = Span::from(range);
        if token == Token::Err {
            let slice = &source[span.start..span.end];
            let message = match slice.as_bytes().first() {
                Some(b'\'' | b'"') => "unterminated string literal",
                Some(b'0'..=b'9') => "number out of range",
                _ => "unrecognised character",
            };
            return Err(Error::lex(span, message));
        }
        tokens.push((token, span));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenise(source)
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn tokenises_the_basic_forms() {
        assert_eq!(
            kinds(r#"; = a 3 O + a "x""#),
            vec![
                Token::Function(';'),
                Token::Function('='),
                Token::Ident(SmolStr::new("a")),
                Token::Number(3),
                Token::Function('O'),
                Token::Function('+'),
                Token::Ident(SmolStr::new("a")),
                Token::Str("x".to_string()),
            ]
        );
    }

    #[test]
    fn function_words_collapse_to_their_first_letter() {
        assert_eq!(kinds("OUTPUT 1"), vec![Token::Function('O'), Token::Number(1)]);
        assert_eq!(kinds("O_UT 1"), vec![Token::Function('O'), Token::Number(1)]);
    }

    #[test]
    fn brackets_and_colon_are_whitespace() {
        assert_eq!(
            kinds("(: [ + {1} ] 2 )"),
            vec![Token::Function('+'), Token::Number(1), Token::Number(2)]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("+ 1 # the rest is noise ' \" @\n2"),
            vec![Token::Function('+'), Token::Number(1), Token::Number(2)]
        );
    }

    #[test]
    fn both_quote_kinds_work() {
        assert_eq!(kinds(r#""a'b""#), vec![Token::Str("a'b".to_string())]);
        assert_eq!(kinds(r#"'a"b'"#), vec![Token::Str("a\"b".to_string())]);
        assert_eq!(kinds("''"), vec![Token::Str(String::new())]);
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let err = tokenise("O 'abc").unwrap_err();
        assert!(err.to_string().contains("unterminated string literal"));
    }

    #[test]
    fn out_of_range_number_is_a_lex_error() {
        let err = tokenise("99999999999999999999999").unwrap_err();
        assert!(err.to_string().contains("number out of range"));
    }

    #[test]
    fn unknown_character_is_a_lex_error() {
        let err = tokenise("+ 1 @").unwrap_err();
        assert!(err.to_string().contains("unrecognised character"));
        assert_eq!(err.span().unwrap().start, 4);
    }
}

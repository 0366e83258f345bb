//! Argument classification - turns lexed tokens into typed OSC arguments

use super::lexer::{normalize_quotes, ArgumentToken, Lexer, TokenClass};
use crate::value::{parse_float, parse_integer, ArgLiteral, OscArg};
use log::warn;

/// Parse a free-form argument string into typed OSC arguments
///
/// - `"quoted text"` becomes a string, spacing preserved
/// - `{"type":"f","value":1.5}` becomes the argument it describes
/// - numbers with a `.` become floats, other numbers integers
/// - anything else becomes a string
///
/// `"` and `'` are stripped from string arguments. Never fails: a brace
/// literal that cannot be read is logged and sent as a string instead.
///
/// ```
/// use oscsend::{tokenize, OscArg};
///
/// let args = tokenize(r#"1 "test" 2.5"#);
/// assert_eq!(args, vec![OscArg::Int(1), OscArg::from("test"), OscArg::Float(2.5)]);
/// ```
pub fn tokenize(input: &str) -> Vec<OscArg> {
    let normalized = normalize_quotes(input);
    Lexer::new(&normalized)
        .tokenize()
        .into_iter()
        .map(classify)
        .collect()
}

fn classify(token: ArgumentToken<'_>) -> OscArg {
    match token.class {
        TokenClass::Quoted => OscArg::String(strip_quotes(token.text)),
        TokenClass::Braced => match serde_json::from_str::<ArgLiteral>(token.text) {
            Ok(literal) => literal.into_arg(),
            Err(e) => {
                warn!("not a JSON argument {}: {}", token.text, e);
                OscArg::String(strip_quotes(token.text))
            }
        },
        TokenClass::Bare => {
            if parse_float(token.text).is_none() {
                OscArg::String(strip_quotes(token.text))
            } else if token.text.contains('.') {
                parse_float(token.text).map_or_else(|| OscArg::from(token.text), OscArg::Float)
            } else {
                parse_integer(token.text).map_or_else(|| OscArg::from(token.text), OscArg::Int)
            }
        }
    }
}

fn strip_quotes(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '"' | '\'')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_arguments() {
        assert_eq!(
            tokenize(r#"1 "test" 2.5"#),
            vec![OscArg::Int(1), OscArg::from("test"), OscArg::Float(2.5)]
        );
    }

    #[test]
    fn test_quoted_phrase() {
        assert_eq!(tokenize(r#""a b c""#), vec![OscArg::from("a b c")]);
    }

    #[test]
    fn test_typographic_quotes() {
        assert_eq!(
            tokenize("\u{201C}hello world\u{201D} 3"),
            vec![OscArg::from("hello world"), OscArg::Int(3)]
        );
    }

    #[test]
    fn test_quoted_number_stays_string() {
        assert_eq!(tokenize(r#""5" 5"#), vec![OscArg::from("5"), OscArg::Int(5)]);
    }

    #[test]
    fn test_single_quotes_stripped() {
        assert_eq!(tokenize("it's"), vec![OscArg::from("its")]);
    }

    #[test]
    fn test_integer_and_float() {
        assert_eq!(
            tokenize("-3 +4 0.5 -2. .25"),
            vec![
                OscArg::Int(-3),
                OscArg::Int(4),
                OscArg::Float(0.5),
                OscArg::Float(-2.0),
                OscArg::Float(0.25),
            ]
        );
    }

    #[test]
    fn test_exponent_without_dot_is_integer() {
        assert_eq!(tokenize("1e3"), vec![OscArg::Int(1000)]);
    }

    #[test]
    fn test_non_finite_words_are_strings() {
        assert_eq!(
            tokenize("inf NaN"),
            vec![OscArg::from("inf"), OscArg::from("NaN")]
        );
    }

    #[test]
    fn test_json_literal_emits_parsed_value_only() {
        assert_eq!(
            tokenize(r#"{"type":"f","value":0.5} {"type": "s", "value": "two words"} {"type":"T"}"#),
            vec![
                OscArg::Float(0.5),
                OscArg::from("two words"),
                OscArg::Bool(true),
            ]
        );
    }

    #[test]
    fn test_malformed_json_falls_back_to_string() {
        assert_eq!(tokenize("{oops} 1"), vec![OscArg::from("{oops}"), OscArg::Int(1)]);
        assert_eq!(
            tokenize(r#"{"a":1}"#),
            vec![OscArg::from("{a:1}")]
        );
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            tokenize(r#"1 "never closed 2.5"#),
            vec![OscArg::Int(1), OscArg::from("never closed 2.5")]
        );
    }

    #[test]
    fn test_idempotent() {
        let input = r#"7 "x y" {"type":"i","value":3} z 1.25"#;
        assert_eq!(tokenize(input), tokenize(input));
    }
}

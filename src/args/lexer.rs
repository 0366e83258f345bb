//! Argument lexer - splits an argument string into tokens
//!
//! A small state machine over the characters of the (quote-normalised)
//! input. Tokens are separated by spaces, except inside a quoted string or a
//! brace literal, where spaces belong to the token.

/// Lexical class of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    /// Plain word: a number or a bare string
    Bare,
    /// Starts with `"`; runs until a word ending in `"`
    Quoted,
    /// Starts with `{`; runs until the matching `}`
    Braced,
}

/// A slice of the input plus its lexical class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentToken<'a> {
    pub text: &'a str,
    pub class: TokenClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between tokens
    Idle,
    /// Inside a token, up to the next space
    Word,
    /// Inside a quoted string
    InQuote,
    /// Inside a brace literal
    InBrace { depth: usize, in_string: bool, escaped: bool },
}

/// Replace typographic double quotes with plain ones
pub fn normalize_quotes(input: &str) -> String {
    input.replace(['\u{201C}', '\u{201D}'], "\"")
}

/// Argument lexer over an already normalised input
pub struct Lexer<'a> {
    input: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input }
    }

    pub fn tokenize(&self) -> Vec<ArgumentToken<'a>> {
        let mut tokens = Vec::new();
        let mut state = State::Idle;
        let mut start = 0;
        let mut class = TokenClass::Bare;

        let mut chars = self.input.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            let at_boundary = matches!(chars.peek(), None | Some((_, ' ')));

            state = match state {
                State::Idle => {
                    start = i;
                    match c {
                        ' ' => State::Idle,
                        '"' => {
                            class = TokenClass::Quoted;
                            if at_boundary {
                                // a lone `"` opens and closes itself
                                tokens.push(self.token(start, i + c.len_utf8(), class));
                                State::Idle
                            } else {
                                State::InQuote
                            }
                        }
                        '{' => {
                            class = TokenClass::Braced;
                            State::InBrace {
                                depth: 1,
                                in_string: false,
                                escaped: false,
                            }
                        }
                        _ => {
                            class = TokenClass::Bare;
                            State::Word
                        }
                    }
                }
                State::Word => {
                    if c == ' ' {
                        tokens.push(self.token(start, i, class));
                        State::Idle
                    } else {
                        State::Word
                    }
                }
                State::InQuote => {
                    if c == '"' && at_boundary {
                        tokens.push(self.token(start, i + c.len_utf8(), class));
                        State::Idle
                    } else {
                        State::InQuote
                    }
                }
                State::InBrace {
                    depth,
                    in_string,
                    escaped,
                } => match c {
                    _ if escaped => State::InBrace {
                        depth,
                        in_string,
                        escaped: false,
                    },
                    '\\' if in_string => State::InBrace {
                        depth,
                        in_string,
                        escaped: true,
                    },
                    '"' => State::InBrace {
                        depth,
                        in_string: !in_string,
                        escaped: false,
                    },
                    '{' if !in_string => State::InBrace {
                        depth: depth + 1,
                        in_string,
                        escaped: false,
                    },
                    '}' if !in_string && depth == 1 => {
                        if at_boundary {
                            tokens.push(self.token(start, i + c.len_utf8(), class));
                            State::Idle
                        } else {
                            // trailing text stays glued to the literal
                            State::Word
                        }
                    }
                    '}' if !in_string => State::InBrace {
                        depth: depth - 1,
                        in_string,
                        escaped: false,
                    },
                    _ => State::InBrace {
                        depth,
                        in_string,
                        escaped: false,
                    },
                },
            };
        }

        // Unterminated quotes and braces swallow the rest of the input
        if state != State::Idle {
            tokens.push(self.token(start, self.input.len(), class));
        }

        tokens
    }

    fn token(&self, start: usize, end: usize, class: TokenClass) -> ArgumentToken<'a> {
        ArgumentToken {
            text: &self.input[start..end],
            class,
        }
    }
}

//! Free-form argument parsing
//!
//! Architecture:
//! - Lexer: splits the argument string into quoted, braced and bare tokens
//! - Parser: classifies each token into an [`OscArg`](crate::OscArg)

pub mod lexer;
pub mod parser;

pub use lexer::{ArgumentToken, Lexer, TokenClass};
pub use parser::tokenize;

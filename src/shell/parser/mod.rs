pub mod ast;
pub mod lexer;
mod parser;
mod redirect;

pub use lexer::tokenize;
pub use parser::{parse, ParseError, Parser};
pub use redirect::{parse_redirection, starts_redirection};

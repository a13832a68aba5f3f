pub mod types;

pub mod expand;
pub mod parse;
pub mod resolve;
pub mod tokenize;

pub use expand::Expander;
pub use parse::parse_line;
pub use resolve::{compile, Program};
pub use tokenize::tokenize_line;

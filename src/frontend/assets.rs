use crate::assembler;
use crate::spec::types::hw::Word;
use once_cell::sync::Lazy;
use std::path::PathBuf;

pub const DEFAULT_BINARY_EXT: &str = "bin";
pub const SOURCE_EXT: &str = "ucisc";

pub fn default_suite_dir() -> PathBuf {
    ["asm"].iter().collect()
}

pub static FACTORIAL_SRC: &str = include_str!("../../asm/examples/factorial.ucisc");
pub static FIB_SRC: &str = include_str!("../../asm/examples/fib.ucisc");

static FACTORIAL_BIN: Lazy<Vec<Word>> = Lazy::new(|| {
    assembler::assemble(FACTORIAL_SRC).expect("Could not compile binary-packaged factorial example")
});
static FIB_BIN: Lazy<Vec<Word>> =
    Lazy::new(|| assembler::assemble(FIB_SRC).expect("Could not compile binary-packaged fib example"));

pub const EXAMPLES: &[&str] = &["factorial", "fib"];

pub fn example_source(name: &str) -> Option<&'static str> {
    match name {
        "factorial" => Some(FACTORIAL_SRC),
        "fib" => Some(FIB_SRC),
        _ => None,
    }
}

pub fn example_binary(name: &str) -> Option<&'static [Word]> {
    match name {
        "factorial" => Some(FACTORIAL_BIN.as_slice()),
        "fib" => Some(FIB_BIN.as_slice()),
        _ => None,
    }
}

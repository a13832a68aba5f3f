pub mod disasm;
pub mod label;
pub mod listing;
pub mod model;
pub mod phases;
pub mod sugar;

pub use listing::{Entry, LogSink, NullSink, Sink};
pub use phases::types::{Error, Failure, LineError};
pub use phases::Program;

use crate::spec::types::hw::{self, Byte, Word};

pub fn compile(source: &str, sink: &mut dyn Sink) -> Result<Program, Error> {
    phases::compile(source, sink)
}

pub fn assemble(source: &str) -> Result<Vec<Word>, Error> {
    Ok(compile(source, &mut LogSink)?.words)
}

pub fn assemble_bytes(source: &str) -> Result<Vec<Byte>, Error> {
    Ok(hw::words_to_bytes(&assemble(source)?))
}

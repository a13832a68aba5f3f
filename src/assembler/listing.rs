use crate::spec::types::hw::Word;
use std::fmt::{self, Display};

/// One line of the assembly listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Header,
    Inst {
        address: Word,
        word: Word,
        line: usize,
        source: String,
    },
    Data {
        start: Word,
        words: usize,
    },
}

impl Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Header => write!(f, "ADDRESS: INS-WORD  LINE#: SOURCE"),
            Entry::Inst {
                address,
                word,
                line,
                source,
            } => write!(
                f,
                " 0x{:04x}: 0x{:04x}   {:6}: {}",
                address,
                word,
                line,
                source.trim()
            ),
            Entry::Data { start, words } => write!(f, " 0x{:04x}: {} words of data", start, words),
        }
    }
}

/// Receives the listing of a compile, one entry at a time.
pub trait Sink {
    fn emit(&mut self, entry: Entry);
}

pub struct NullSink;

impl Sink for NullSink {
    fn emit(&mut self, _: Entry) {}
}

pub struct LogSink;

impl Sink for LogSink {
    fn emit(&mut self, entry: Entry) {
        log::debug!("{}", entry);
    }
}

impl Sink for Vec<Entry> {
    fn emit(&mut self, entry: Entry) {
        self.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_lines() {
        assert_eq!(Entry::Header.to_string(), "ADDRESS: INS-WORD  LINE#: SOURCE");
        assert_eq!(
            Entry::Inst {
                address: 0x12,
                word: 0xE000,
                line: 3,
                source: "  compute 0.op 0.reg 0.reg\n".to_owned(),
            }
            .to_string(),
            " 0x0012: 0xe000        3: compute 0.op 0.reg 0.reg"
        );
        assert_eq!(
            Entry::Data { start: 0x20, words: 4 }.to_string(),
            " 0x0020: 4 words of data"
        );
    }
}

use crate::spec::types::{hw::Word, inst::Inst};
use std::fmt::{self, Display};

/// A decoded word and where it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub address: Word,
    pub word: Word,
    pub inst: Inst,
}

impl Line {
    pub fn at(address: Word, word: Word) -> Self {
        Line {
            address,
            word,
            inst: Inst::decode(word),
        }
    }
}

impl Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}: 0x{:04x}  {}", self.address, self.word, self.inst)?;
        if self.inst.is_halt() {
            write!(f, "  # halt")?;
        }
        Ok(())
    }
}

pub fn disassemble(words: &[Word], start: Word) -> impl Iterator<Item = Line> + '_ {
    words
        .iter()
        .enumerate()
        .map(move |(i, &word)| Line::at(start.wrapping_add(i as Word), word))
}

/// The instructions around `pc`, as far as `peek` can read them.
pub fn window<F>(peek: F, pc: Word, before: Word, after: Word) -> Vec<Line>
where
    F: Fn(Word) -> Option<Word>,
{
    let first = pc.saturating_sub(before);
    let last = pc.saturating_add(after);

    (first..=last)
        .filter_map(|address| peek(address).map(|word| Line::at(address, word)))
        .collect()
}

use crate::spec::types::hw::{self, offset_in_page, page_of, Byte, Word, PAGE_WORDS};
use std::fmt::{self, Display};

pub type Page = [Word; PAGE_WORDS];

#[derive(Debug, PartialEq, Eq)]
pub enum LoadError {
    Parity,
    TooLarge { words: usize, capacity: usize },
}

impl Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Parity => write!(f, "program image has an odd number of bytes"),
            LoadError::TooLarge { words, capacity } => write!(
                f,
                "program image of {} words does not fit in {} words of memory",
                words, capacity
            ),
        }
    }
}

impl std::error::Error for LoadError {}

/// Page-granular local memory. The first `rom` pages reject writes once
/// loaded.
pub struct Memory {
    pages: Vec<Page>,
    rom: usize,
}

impl Memory {
    pub fn new(pages: usize, rom: usize) -> Self {
        Memory {
            pages: vec![[0; PAGE_WORDS]; pages],
            rom: rom.min(pages),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_rom(&self, page: usize) -> bool {
        page < self.rom
    }

    pub fn page(&self, page: usize) -> Option<&Page> {
        self.pages.get(page)
    }

    /// Copies `words` in starting at `start_page`, ROM included.
    pub fn load(&mut self, start_page: usize, words: &[Word]) -> Result<(), LoadError> {
        let capacity = self.pages.len().saturating_sub(start_page) * PAGE_WORDS;
        if words.len() > capacity {
            return Err(LoadError::TooLarge {
                words: words.len(),
                capacity,
            });
        }

        for (chunk, page) in words
            .chunks(PAGE_WORDS)
            .zip(self.pages.iter_mut().skip(start_page))
        {
            page[..chunk.len()].copy_from_slice(chunk);
        }

        Ok(())
    }

    pub fn load_bytes(&mut self, start_page: usize, bytes: &[Byte]) -> Result<(), LoadError> {
        let words = hw::bytes_to_words(bytes).ok_or(LoadError::Parity)?;
        self.load(start_page, &words)
    }

    pub fn read(&self, page: usize, offset: usize) -> Option<Word> {
        self.pages.get(page).and_then(|p| p.get(offset)).copied()
    }

    /// Returns whether the write landed.
    pub fn write(&mut self, page: usize, offset: usize, val: Word) -> bool {
        if self.is_rom(page) {
            return false;
        }

        match self.pages.get_mut(page).and_then(|p| p.get_mut(offset)) {
            Some(slot) => {
                *slot = val;
                true
            }
            None => false,
        }
    }

    pub fn read_addr(&self, addr: Word) -> Option<Word> {
        self.read(page_of(addr), offset_in_page(addr))
    }

    pub fn write_addr(&mut self, addr: Word, val: Word) -> bool {
        self.write(page_of(addr), offset_in_page(addr), val)
    }
}

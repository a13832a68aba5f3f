use bitflags::bitflags;
use static_assertions::const_assert_eq;
use std::{
    convert::{TryFrom, TryInto},
    fmt::{self, Display},
    num::{TryFromIntError, Wrapping},
};

pub type Byte = u8;
pub type Word = u16;

pub const BYTE_WIDTH: usize = 8;
pub const WORD_WIDTH: usize = 16;
pub const WORD_MAX: Word = 0xFFFF;

pub const PAGE_WORDS: usize = 256;
pub const PAGE_SHIFT: u32 = 8;
pub const PAGE_OFFSET_MASK: Word = 0x00FF;
pub const PAGE_MASK: Word = !PAGE_OFFSET_MASK;
const_assert_eq!(PAGE_WORDS, 1 << PAGE_SHIFT);

pub const CONTROL_WORDS: usize = 16;

/// Set in the processor control word to switch the ALU into signed mode. This
/// bit doubles as the banking bit for the `0x8xxx` region.
pub const SIGNED_MODE: Word = 0x0100;

pub const fn byte_flip(v: Word) -> Word {
    ((v & 0x00FF) << BYTE_WIDTH) | ((v & 0xFF00) >> BYTE_WIDTH)
}

pub const fn page_of(addr: Word) -> usize {
    (addr >> PAGE_SHIFT) as usize
}

pub const fn offset_in_page(addr: Word) -> usize {
    (addr & PAGE_OFFSET_MASK) as usize
}

pub fn bytes_to_words_into_buff(buff: &mut [Word], bytes: &[Byte]) -> Option<()> {
    for (idx, ch) in bytes.chunks(2).enumerate() {
        buff[idx] = u16::from_le_bytes(ch.try_into().ok()?)
    }
    Some(())
}

// Returns none if the data has bad parity.
pub fn bytes_to_words(bytes: &[Byte]) -> Option<Vec<Word>> {
    if bytes.len() % 2 != 0 {
        return None;
    }

    let mut buff = vec![0; bytes.len() / 2];
    bytes_to_words_into_buff(&mut buff, bytes).map(|_| buff)
}

pub fn words_to_bytes(v: &[Word]) -> Vec<Byte> {
    v.iter().flat_map(|w| w.to_le_bytes().to_vec()).collect()
}

pub fn word_from_i64_wrapping(i: i64) -> Result<Word, TryFromIntError> {
    if i >= 0 {
        Word::try_from(i)
    } else {
        Ok((Wrapping(0) - Wrapping(Word::try_from(-i)?)).0)
    }
}

/// Sign-extends the low `width` bits of `raw`.
pub const fn sign_extend(raw: Word, width: u32) -> Word {
    let shift = WORD_WIDTH as u32 - width;
    (((raw << shift) as i16) >> shift) as Word
}

bitflags! {
    #[derive(Default)]
    pub struct Flags: Word {
        const OVERFLOW = 1 << 0;
        const ZERO     = 1 << 1;
        const NEGATIVE = 1 << 2;
    }
}

#[rustfmt::skip]
impl Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if self.contains(Flags::OVERFLOW) { 'O' } else { 'o' })?;
        write!(f, "{}", if self.contains(Flags::ZERO) { 'Z' } else { 'z' })?;
        write!(f, "{}", if self.contains(Flags::NEGATIVE) { 'N' } else { 'n' })?;
        Ok(())
    }
}

impl From<Flags> for Word {
    fn from(f: Flags) -> Word {
        f.bits()
    }
}

impl Flags {
    pub fn of_result(val: Word, overflow: bool) -> Flags {
        let mut f = Flags::default();
        f.set(Flags::ZERO, val == 0);
        f.set(Flags::NEGATIVE, val & 0x8000 != 0);
        f.set(Flags::OVERFLOW, overflow);
        f
    }
}

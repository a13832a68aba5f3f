use super::hw::Word;
use enum_map::Enum;
use std::fmt::{self, Display};
use strum_macros::EnumIter;

pub const SELECTOR_MASK: Word = 0b111;

/// The three general registers. Each one doubles as the base pointer for one
/// memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, EnumIter)]
pub enum Reg {
    R1,
    R2,
    R3,
}

impl Reg {
    pub const fn index(self) -> Word {
        self as Word + 1
    }

    pub fn from_index(idx: Word) -> Option<Reg> {
        match idx {
            1 => Some(Reg::R1),
            2 => Some(Reg::R2),
            3 => Some(Reg::R3),
            _ => None,
        }
    }
}

impl Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.index())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Pc,
    Mem(Reg),
    Imm,
    Reg(Reg),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Pc,
    Mem(Reg),
    Control,
    Reg(Reg),
}

// Selectors 1..3 are memory through a register, 5..7 the register itself.
fn split_selector(sel: Word) -> (bool, Option<Reg>) {
    let sel = sel & SELECTOR_MASK;
    (sel & 0b100 != 0, Reg::from_index(sel & 0b011))
}

impl Source {
    pub const fn selector(self) -> Word {
        match self {
            Source::Pc => 0,
            Source::Mem(r) => r.index(),
            Source::Imm => 4,
            Source::Reg(r) => r.index() + 4,
        }
    }

    pub fn from_selector(sel: Word) -> Source {
        match split_selector(sel) {
            (false, None) => Source::Pc,
            (false, Some(r)) => Source::Mem(r),
            (true, None) => Source::Imm,
            (true, Some(r)) => Source::Reg(r),
        }
    }

    pub fn is_mem(self) -> bool {
        matches!(self, Source::Mem(_))
    }

    pub fn all() -> impl Iterator<Item = Source> + Clone {
        (0..=SELECTOR_MASK).map(Source::from_selector)
    }
}

impl Destination {
    pub const fn selector(self) -> Word {
        match self {
            Destination::Pc => 0,
            Destination::Mem(r) => r.index(),
            Destination::Control => 4,
            Destination::Reg(r) => r.index() + 4,
        }
    }

    pub fn from_selector(sel: Word) -> Destination {
        match split_selector(sel) {
            (false, None) => Destination::Pc,
            (false, Some(r)) => Destination::Mem(r),
            (true, None) => Destination::Control,
            (true, Some(r)) => Destination::Reg(r),
        }
    }

    pub fn is_mem(self) -> bool {
        matches!(self, Destination::Mem(_))
    }

    pub fn all() -> impl Iterator<Item = Destination> + Clone {
        (0..=SELECTOR_MASK).map(Destination::from_selector)
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Pc => write!(f, "0.reg"),
            Source::Mem(r) => write!(f, "{}.mem", r.index()),
            Source::Imm => write!(f, "4.val"),
            Source::Reg(r) => write!(f, "{}.reg", r.index()),
        }
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Pc => write!(f, "0.reg"),
            Destination::Mem(r) => write!(f, "{}.mem", r.index()),
            Destination::Control => write!(f, "4.reg"),
            Destination::Reg(r) => write!(f, "{}.reg", r.index()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_total_and_stable() {
        for sel in 0..=SELECTOR_MASK {
            assert_eq!(Source::from_selector(sel).selector(), sel);
            assert_eq!(Destination::from_selector(sel).selector(), sel);
        }
    }

    #[test]
    fn register_aliases_resolve_back_to_registers() {
        assert_eq!(Source::from_selector(5), Source::Reg(Reg::R1));
        assert_eq!(Destination::from_selector(7), Destination::Reg(Reg::R3));
        assert_eq!(Destination::from_selector(2), Destination::Mem(Reg::R2));
        assert_eq!(Destination::from_selector(4), Destination::Control);
    }
}

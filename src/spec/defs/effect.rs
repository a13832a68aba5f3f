use crate::spec::types::{
    hw::{Flags, Word},
    inst::Class,
};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::fmt::{self, Display};
use strum_macros::EnumIter;

pub const EFFECT_SHIFT: u32 = 13;
pub const EFFECT_MASK: Word = 0b11 << EFFECT_SHIFT;

/// Decides whether an instruction's result is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, EnumIter)]
pub enum Effect {
    IfZero = 0,
    IfNotZero = 1,
    /// Commits while the guard flags of the class are all clear: zero and
    /// negative for a copy, overflow for a compute.
    Clear = 2,
    Always = 3,
}

impl Default for Effect {
    fn default() -> Self {
        Effect::Always
    }
}

impl Effect {
    pub const fn code(self) -> Word {
        self as Word
    }

    pub fn from_code(code: Word) -> Option<Effect> {
        Effect::from_u16(code)
    }

    pub fn decode(inst: Word) -> Effect {
        match (inst & EFFECT_MASK) >> EFFECT_SHIFT {
            0 => Effect::IfZero,
            1 => Effect::IfNotZero,
            2 => Effect::Clear,
            _ => Effect::Always,
        }
    }

    pub const fn encode(self) -> Word {
        self.code() << EFFECT_SHIFT
    }

    fn guard(class: Class) -> Flags {
        match class {
            Class::Copy => Flags::ZERO | Flags::NEGATIVE,
            Class::Compute => Flags::OVERFLOW,
        }
    }

    pub fn commits(self, class: Class, flags: Flags) -> bool {
        match self {
            Effect::IfZero => flags.contains(Flags::ZERO),
            Effect::IfNotZero => !flags.contains(Flags::ZERO),
            Effect::Clear => !flags.intersects(Effect::guard(class)),
            Effect::Always => true,
        }
    }
}

impl Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.eff", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::iproduct;
    use strum::IntoEnumIterator;

    #[test]
    fn truth_table() {
        for (bits, class, eff) in iproduct!(0..8, [Class::Copy, Class::Compute].iter(), Effect::iter())
        {
            let flags = Flags::from_bits_truncate(bits);
            let zero = flags.contains(Flags::ZERO);
            let negative = flags.contains(Flags::NEGATIVE);
            let overflow = flags.contains(Flags::OVERFLOW);

            let expected = match (eff, class) {
                (Effect::IfZero, _) => zero,
                (Effect::IfNotZero, _) => !zero,
                (Effect::Clear, Class::Copy) => !zero && !negative,
                (Effect::Clear, Class::Compute) => !overflow,
                (Effect::Always, _) => true,
            };
            assert_eq!(eff.commits(*class, flags), expected, "{} {:?} {}", eff, class, flags);
        }
    }

    #[test]
    fn field_position() {
        assert_eq!(Effect::Always.encode(), 0x6000);
        assert_eq!(Effect::decode(0x4000 | 0x1FFF), Effect::Clear);
        assert_eq!(Effect::from_code(4), None);
    }
}

use crate::spec::types::hw::Word;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use static_assertions::const_assert_eq;
use strum_macros::{Display, EnumIter, EnumString};

pub const ALU_OP_MASK: Word = 0x000F;

/// ALU operations, numbered by their 4-bit code. In the descriptions `a` is
/// the source operand and `b` is the current value of the destination.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, EnumIter, EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum AluOp {
    /// `!a`
    Inv = 0x0,
    And = 0x1,
    Or = 0x2,
    Xor = 0x3,
    /// Two's complement negation of `a`.
    Neg = 0x4,
    /// `b << a`, spilled bits go to the overflow register.
    Shl = 0x5,
    /// `b >> a`, arithmetic in signed mode.
    Shr = 0x6,
    /// Swaps the bytes of `a`.
    Swap = 0x7,
    /// Keeps the most significant byte of `a`.
    Msb = 0x8,
    /// Keeps the least significant byte of `a`.
    Lsb = 0x9,
    Add = 0xA,
    /// `b - a`
    Sub = 0xB,
    Mul = 0xC,
    /// `b / a`, the remainder goes to the overflow register.
    Div = 0xD,
    /// The page-aligned base of `a`.
    Page = 0xE,
    /// `a` plus the overflow register, for carrying into the next word.
    Addc = 0xF,
}

const_assert_eq!(AluOp::Addc as Word, ALU_OP_MASK);

impl AluOp {
    pub const fn code(self) -> Word {
        self as Word
    }

    pub fn decode(inst: Word) -> AluOp {
        // Every 4-bit code names an operation.
        AluOp::from_u16(inst & ALU_OP_MASK).unwrap()
    }
}

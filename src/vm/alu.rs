use crate::spec::{
    defs::alu::AluOp,
    types::hw::{byte_flip, Flags, Word, PAGE_MASK},
};
use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpResult {
    pub val: Word,
    /// The new contents of the overflow register.
    pub spill: Word,
    pub flags: Flags,
}

impl Display for OpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OpResult({:#06X}:{:#06X}:{})",
            self.val, self.spill, self.flags
        )
    }
}

impl OpResult {
    fn new(val: Word, spill: Word, overflow: bool) -> Self {
        OpResult {
            val,
            spill,
            flags: Flags::of_result(val, overflow),
        }
    }

    fn plain(val: Word) -> Self {
        OpResult::new(val, 0, false)
    }
}

fn hi(v: u32) -> Word {
    (v >> 16) as Word
}

fn add(a: Word, b: Word, signed: bool) -> OpResult {
    if signed {
        let wide = (a as i16 as i32) + (b as i16 as i32);
        let val = wide as Word;
        OpResult::new(val, hi(wide as u32), wide != val as i16 as i32)
    } else {
        let wide = (a as u32) + (b as u32);
        OpResult::new(wide as Word, hi(wide), wide > Word::MAX as u32)
    }
}

fn sub(a: Word, b: Word, signed: bool) -> OpResult {
    if signed {
        let wide = (b as i16 as i32) - (a as i16 as i32);
        let val = wide as Word;
        OpResult::new(val, hi(wide as u32), wide != val as i16 as i32)
    } else {
        let borrow = a > b;
        OpResult::new(
            b.wrapping_sub(a),
            if borrow { Word::MAX } else { 0 },
            borrow,
        )
    }
}

fn mul(a: Word, b: Word, signed: bool) -> OpResult {
    if signed {
        let wide = (a as i16 as i32) * (b as i16 as i32);
        let val = wide as Word;
        OpResult::new(val, hi(wide as u32), wide != val as i16 as i32)
    } else {
        let wide = (a as u32) * (b as u32);
        OpResult::new(wide as Word, hi(wide), wide > Word::MAX as u32)
    }
}

fn div(a: Word, b: Word, signed: bool) -> OpResult {
    if a == 0 {
        return OpResult::new(Word::MAX, b, true);
    }

    if signed {
        let (a, b) = (a as i16, b as i16);
        OpResult::new(b.wrapping_div(a) as Word, b.wrapping_rem(a) as Word, false)
    } else {
        OpResult::new(b / a, b % a, false)
    }
}

fn shl(a: Word, b: Word) -> OpResult {
    if a >= 32 {
        return OpResult::plain(0);
    }
    let wide = (b as u32) << a;
    OpResult::new(wide as Word, hi(wide), false)
}

// The bits shifted out land left-aligned in the overflow register, ready to be
// `addc`ed onto the next lower word of a double-width shift.
fn shr(a: Word, b: Word, signed: bool) -> OpResult {
    if a >= 32 {
        let fill = if signed && b & 0x8000 != 0 { Word::MAX } else { 0 };
        return OpResult::plain(fill);
    }

    let wide = (b as u32) << 16;
    let spill = (wide >> a) as Word;
    let val = if signed {
        (((b as i16 as i32) << 16) >> a >> 16) as Word
    } else {
        (wide >> a >> 16) as Word
    };
    OpResult::new(val, spill, false)
}

/// Evaluates `op` on the source value `a` and the destination value `b`. This
/// is a pure function, the caller decides whether to commit the result.
pub fn eval(op: AluOp, a: Word, b: Word, spill: Word, signed: bool) -> OpResult {
    match op {
        AluOp::Inv => OpResult::plain(!a),
        AluOp::And => OpResult::plain(b & a),
        AluOp::Or => OpResult::plain(b | a),
        AluOp::Xor => OpResult::plain(b ^ a),
        AluOp::Neg => OpResult::plain(a.wrapping_neg()),
        AluOp::Shl => shl(a, b),
        AluOp::Shr => shr(a, b, signed),
        AluOp::Swap => OpResult::plain(byte_flip(a)),
        AluOp::Msb => OpResult::plain(a & 0xFF00),
        AluOp::Lsb => OpResult::plain(a & 0x00FF),
        AluOp::Add => add(a, b, signed),
        AluOp::Sub => sub(a, b, signed),
        AluOp::Mul => mul(a, b, signed),
        AluOp::Div => div(a, b, signed),
        AluOp::Page => OpResult::plain(a & PAGE_MASK),
        AluOp::Addc => add(a, spill, signed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned(op: AluOp, a: Word, b: Word) -> OpResult {
        eval(op, a, b, 0, false)
    }

    fn signed(op: AluOp, a: Word, b: Word) -> OpResult {
        eval(op, a, b, 0, true)
    }

    #[test]
    fn bitwise() {
        assert_eq!(unsigned(AluOp::Inv, 0x00FF, 0).val, 0xFF00);
        assert_eq!(unsigned(AluOp::And, 0x0FF0, 0x00FF).val, 0x00F0);
        assert_eq!(unsigned(AluOp::Or, 0x0F00, 0x00F0).val, 0x0FF0);
        assert_eq!(unsigned(AluOp::Xor, 0xFFFF, 0x00FF).val, 0xFF00);
        assert_eq!(unsigned(AluOp::Swap, 0x1234, 0).val, 0x3412);
        assert_eq!(unsigned(AluOp::Msb, 0x1234, 0).val, 0x1200);
        assert_eq!(unsigned(AluOp::Lsb, 0x1234, 0).val, 0x0034);
        assert_eq!(unsigned(AluOp::Page, 0x12FF, 0).val, 0x1200);
    }

    #[test]
    fn flags() {
        let r = unsigned(AluOp::Neg, 1, 0);
        assert_eq!(r.val, 0xFFFF);
        assert_eq!(r.flags, Flags::NEGATIVE);

        let r = unsigned(AluOp::Xor, 0x55, 0x55);
        assert_eq!(r.flags, Flags::ZERO);
    }

    #[test]
    fn add_carries() {
        let r = unsigned(AluOp::Add, 0xFFFF, 0x0002);
        assert_eq!((r.val, r.spill), (0x0001, 1));
        assert!(r.flags.contains(Flags::OVERFLOW));

        let r = unsigned(AluOp::Add, 0x7FFF, 0x0001);
        assert!(!r.flags.contains(Flags::OVERFLOW));
        assert!(r.flags.contains(Flags::NEGATIVE));

        let r = signed(AluOp::Add, 0x7FFF, 0x0001);
        assert!(r.flags.contains(Flags::OVERFLOW));

        let r = signed(AluOp::Add, 0xFFFF, 0x0002);
        assert_eq!(r.val, 1);
        assert!(!r.flags.contains(Flags::OVERFLOW));

        let r = eval(AluOp::Addc, 0x0010, 0xBEEF, 1, false);
        assert_eq!(r.val, 0x0011);
    }

    #[test]
    fn sub_borrows() {
        // Overflow is a borrow, never a carry out.
        let r = unsigned(AluOp::Sub, 1, 5);
        assert_eq!((r.val, r.spill), (4, 0));
        assert!(r.flags.is_empty());

        let r = unsigned(AluOp::Sub, 0, 0xFFFF);
        assert_eq!((r.val, r.spill), (0xFFFF, 0));
        assert!(!r.flags.contains(Flags::OVERFLOW));

        let r = unsigned(AluOp::Sub, 1, 1);
        assert_eq!(r.flags, Flags::ZERO);

        let r = unsigned(AluOp::Sub, 2, 1);
        assert_eq!((r.val, r.spill), (0xFFFF, 0xFFFF));
        assert!(r.flags.contains(Flags::OVERFLOW | Flags::NEGATIVE));

        let r = signed(AluOp::Sub, 2, 1);
        assert_eq!(r.val, 0xFFFF);
        assert!(!r.flags.contains(Flags::OVERFLOW));

        let r = signed(AluOp::Sub, 1, 0x8000);
        assert!(r.flags.contains(Flags::OVERFLOW));
    }

    #[test]
    fn double_width() {
        let r = unsigned(AluOp::Mul, 0x1000, 0x0100);
        assert_eq!((r.val, r.spill), (0x0000, 0x0010));
        assert!(r.flags.contains(Flags::OVERFLOW | Flags::ZERO));

        let r = signed(AluOp::Mul, 0xFFFF, 0x0003);
        assert_eq!((r.val, r.spill), (0xFFFD, 0xFFFF));
        assert!(!r.flags.contains(Flags::OVERFLOW));

        let r = unsigned(AluOp::Div, 3, 10);
        assert_eq!((r.val, r.spill), (3, 1));

        let r = signed(AluOp::Div, 3, (-10i16) as Word);
        assert_eq!((r.val as i16, r.spill as i16), (-3, -1));

        let r = unsigned(AluOp::Div, 0, 10);
        assert_eq!((r.val, r.spill), (0xFFFF, 10));
        assert!(r.flags.contains(Flags::OVERFLOW));
    }

    #[test]
    fn shifts() {
        let r = unsigned(AluOp::Shl, 4, 0x1234);
        assert_eq!((r.val, r.spill), (0x2340, 0x0001));

        let r = unsigned(AluOp::Shr, 4, 0x1234);
        assert_eq!((r.val, r.spill), (0x0123, 0x4000));

        let r = signed(AluOp::Shr, 4, 0x8000);
        assert_eq!(r.val, 0xF800);

        let r = unsigned(AluOp::Shr, 4, 0x8000);
        assert_eq!(r.val, 0x0800);

        assert_eq!(unsigned(AluOp::Shl, 40, 0x1234).val, 0);
        assert_eq!(signed(AluOp::Shr, 40, 0x8000).val, 0xFFFF);
    }
}

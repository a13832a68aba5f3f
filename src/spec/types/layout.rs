use super::{
    hw::{sign_extend, Word},
    inst::Class,
    operand::{Destination, Source},
};
use std::ops::RangeInclusive;

pub const SPLIT_WIDTH: u32 = 3;
const SPLIT_MASK: Word = (1 << SPLIT_WIDTH) - 1;

/// How the immediate bits of an instruction are laid out. This is the one
/// place the width rule lives, both the assembler and the processor ask it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmLayout {
    Single { width: u32, signed: bool },
    /// Memory to memory copies carry two unsigned offsets, the source one in
    /// bits 3..5 and the destination one in bits 0..2.
    Split,
}

impl ImmLayout {
    pub fn of(class: Class, src: Source, dst: Destination) -> ImmLayout {
        if class == Class::Copy && src.is_mem() && dst.is_mem() {
            return ImmLayout::Split;
        }

        let any_mem = src.is_mem() || dst.is_mem();
        let compute = class == Class::Compute;
        ImmLayout::Single {
            width: 7 - 4 * (compute as u32) - (any_mem as u32),
            signed: !src.is_mem(),
        }
    }

    /// The low bit of the immediate field within the word.
    pub const fn shift(class: Class) -> u32 {
        match class {
            Class::Copy => 0,
            Class::Compute => 4,
        }
    }

    pub fn source_range(self) -> RangeInclusive<i32> {
        match self {
            ImmLayout::Single { width, signed } => range(width, signed),
            ImmLayout::Split => range(SPLIT_WIDTH, false),
        }
    }

    pub fn destination_range(self) -> Option<RangeInclusive<i32>> {
        match self {
            ImmLayout::Single { .. } => None,
            ImmLayout::Split => Some(range(SPLIT_WIDTH, false)),
        }
    }

    pub fn pack(self, class: Class, src_imm: i32, dst_imm: i32) -> Word {
        let field = match self {
            ImmLayout::Single { width, .. } => (src_imm as Word) & ((1 << width) - 1),
            ImmLayout::Split => {
                (((src_imm as Word) & SPLIT_MASK) << SPLIT_WIDTH) | ((dst_imm as Word) & SPLIT_MASK)
            }
        };
        field << ImmLayout::shift(class)
    }

    /// Returns the (source, destination) immediates held in `inst`.
    pub fn unpack(self, class: Class, inst: Word) -> (i32, i32) {
        let raw = inst >> ImmLayout::shift(class);
        match self {
            ImmLayout::Single { width, signed } => {
                let field = raw & ((1 << width) - 1);
                let val = if signed {
                    sign_extend(field, width) as i16 as i32
                } else {
                    field as i32
                };
                (val, 0)
            }
            ImmLayout::Split => (
                ((raw >> SPLIT_WIDTH) & SPLIT_MASK) as i32,
                (raw & SPLIT_MASK) as i32,
            ),
        }
    }
}

fn range(width: u32, signed: bool) -> RangeInclusive<i32> {
    if signed {
        -(1 << (width - 1))..=(1 << (width - 1)) - 1
    } else {
        0..=(1 << width) - 1
    }
}

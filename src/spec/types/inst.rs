use super::{
    hw::Word,
    layout::ImmLayout,
    operand::{Destination, Source, SELECTOR_MASK},
};
use crate::spec::defs::{alu::AluOp, effect::Effect};
use static_assertions::const_assert_eq;
use std::fmt::{self, Display};

/*
    Instruction words are laid out as (each character is a bit):

        C EE DDD SSS P IIIIII       copy
        C EE DDD SSS P II AAAA      compute

    From left to right: the class (C, 0 for copy and 1 for compute), the
    effect (EE), the destination selector (DDD), the source selector (SSS), the
    push/pop bit (P), the immediate (I) and, for computes, the ALU operation
    (AAAA).

    The push/pop bit only exists when at least one operand is memory. When
    neither is, it becomes the top bit of the immediate instead. See
    `ImmLayout` for the exact widths.
*/

pub const CLASS_BIT: Word = 0x8000;
pub const DEST_SHIFT: u32 = 10;
pub const SOURCE_SHIFT: u32 = 7;
pub const INCREMENT_BIT: Word = 0x0040;

pub const DEST_MASK: Word = SELECTOR_MASK << DEST_SHIFT;
pub const SOURCE_MASK: Word = SELECTOR_MASK << SOURCE_SHIFT;
const_assert_eq!(DEST_MASK, 0x1C00);
const_assert_eq!(SOURCE_MASK, 0x0380);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Copy,
    Compute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operands {
    pub src: Source,
    pub dst: Destination,
    pub src_imm: i32,
    /// Only ever nonzero for memory to memory copies.
    pub dst_imm: i32,
    pub effect: Effect,
    pub push: bool,
}

impl Operands {
    pub fn has_mem(&self) -> bool {
        self.src.is_mem() || self.dst.is_mem()
    }

    /// A push through a memory destination decrements its register before the
    /// store. Otherwise a set increment bit pops the source register after
    /// the load.
    pub fn is_pop(&self) -> bool {
        self.push && self.src.is_mem() && !self.dst.is_mem()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inst {
    Copy(Operands),
    Compute(AluOp, Operands),
}

impl Inst {
    pub fn class(&self) -> Class {
        match self {
            Inst::Copy(_) => Class::Copy,
            Inst::Compute(..) => Class::Compute,
        }
    }

    pub fn operands(&self) -> &Operands {
        match self {
            Inst::Copy(ops) | Inst::Compute(_, ops) => ops,
        }
    }

    pub fn layout(&self) -> ImmLayout {
        let ops = self.operands();
        ImmLayout::of(self.class(), ops.src, ops.dst)
    }

    pub fn encode(&self) -> Word {
        let ops = self.operands();
        let head = match self {
            Inst::Copy(_) => 0,
            Inst::Compute(op, _) => CLASS_BIT | op.code(),
        };

        let inc = if ops.push && ops.has_mem() {
            INCREMENT_BIT
        } else {
            0
        };

        head | ops.effect.encode()
            | (ops.dst.selector() << DEST_SHIFT)
            | (ops.src.selector() << SOURCE_SHIFT)
            | inc
            | self.layout().pack(self.class(), ops.src_imm, ops.dst_imm)
    }

    /// Every word decodes to some instruction.
    pub fn decode(inst: Word) -> Inst {
        let class = if inst & CLASS_BIT == 0 {
            Class::Copy
        } else {
            Class::Compute
        };
        let src = Source::from_selector(inst >> SOURCE_SHIFT);
        let dst = Destination::from_selector(inst >> DEST_SHIFT);
        let (src_imm, dst_imm) = ImmLayout::of(class, src, dst).unpack(class, inst);

        let ops = Operands {
            src,
            dst,
            src_imm,
            dst_imm,
            effect: Effect::decode(inst),
            push: (src.is_mem() || dst.is_mem()) && inst & INCREMENT_BIT != 0,
        };

        match class {
            Class::Copy => Inst::Copy(ops),
            Class::Compute => Inst::Compute(AluOp::decode(inst), ops),
        }
    }

    /// `compute inv.op 0.reg 0.reg` with a zero immediate, under any effect.
    pub fn is_halt(&self) -> bool {
        match self {
            Inst::Compute(AluOp::Inv, ops) => {
                ops.src == Source::Pc && ops.dst == Destination::Pc && !ops.push && ops.src_imm == 0
            }
            _ => false,
        }
    }

    pub const HALT: Inst = Inst::Compute(
        AluOp::Inv,
        Operands {
            src: Source::Pc,
            dst: Destination::Pc,
            src_imm: 0,
            dst_imm: 0,
            effect: Effect::Always,
            push: false,
        },
    );
}

// Small values read the same in decimal and hexadecimal.
fn fmt_num(v: i32) -> String {
    match v {
        -9..=9 => v.to_string(),
        _ if v < 0 => format!("-{:#x}", -v),
        _ => format!("{:#x}", v),
    }
}

impl Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ops = self.operands();
        match self {
            Inst::Copy(_) => write!(f, "copy")?,
            Inst::Compute(op, _) => write!(f, "compute {}.op", op)?,
        }

        write!(f, " {}", ops.src)?;
        if ops.src_imm != 0 || ops.src == Source::Imm {
            write!(f, " {}.imm", fmt_num(ops.src_imm))?;
        }

        write!(f, " {}", ops.dst)?;
        if ops.dst_imm != 0 {
            write!(f, " {}.imm", fmt_num(ops.dst_imm))?;
        }

        if ops.effect != Effect::Always {
            write!(f, " {}", ops.effect)?;
        }

        if ops.push {
            write!(f, " {}", if ops.is_pop() { "pop" } else { "push" })?;
        }

        Ok(())
    }
}

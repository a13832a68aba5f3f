use crate::spec::types::{
    hw::{Flags, Word, SIGNED_MODE},
    operand::Reg,
};
use enum_map::EnumMap;
use std::fmt::{self, Display};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    pub pc: Word,
    pub r: EnumMap<Reg, Word>,
    pub flags: Flags,
    /// The spill of the last double-width ALU result.
    pub overflow: Word,
    pub control: Word,
}

impl Registers {
    pub fn signed_mode(&self) -> bool {
        self.control & SIGNED_MODE != 0
    }

    /// Whether accesses to `addr` leave local memory. The top nibble of the
    /// address picks the bit of the control word to test.
    pub fn is_banked(&self, addr: Word) -> bool {
        self.control & (1 << (addr >> 12)) != 0
    }
}

impl Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "PC:  {:#06X} FL:  {}    OV:  {:#06X} CTL: {:#06X}",
            self.pc, self.flags, self.overflow, self.control
        )?;
        writeln!(
            f,
            "R1:  {:#06X} R2:  {:#06X} R3:  {:#06X}",
            self.r[Reg::R1],
            self.r[Reg::R2],
            self.r[Reg::R3]
        )
    }
}

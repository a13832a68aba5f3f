use super::phases::types::{LabelMap, LabelName, LineError};
use crate::spec::{
    defs::{alu::AluOp, effect::Effect},
    types::{
        hw::Word,
        inst::{Class, Inst, Operands},
        layout::ImmLayout,
        operand::{Destination, Reg, Source},
    },
};
use std::fmt::{self, Display};

/// An operand as written, before it is known which side of the instruction it
/// sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Pc,
    Reg(Reg),
    Mem(Reg),
    /// `4.reg`
    Control,
    /// `4.val`
    Val,
}

impl Operand {
    pub fn parse(idx: Word, kind: &str) -> Option<Operand> {
        match (kind, idx) {
            ("reg", 0) => Some(Operand::Pc),
            ("reg", 4) => Some(Operand::Control),
            ("reg", idx) => Reg::from_index(idx).map(Operand::Reg),
            ("mem", idx) => Reg::from_index(idx).map(Operand::Mem),
            ("val", 4) => Some(Operand::Val),
            _ => None,
        }
    }

    pub fn as_source(self) -> Option<Source> {
        match self {
            Operand::Pc => Some(Source::Pc),
            Operand::Reg(r) => Some(Source::Reg(r)),
            Operand::Mem(r) => Some(Source::Mem(r)),
            Operand::Val => Some(Source::Imm),
            Operand::Control => None,
        }
    }

    pub fn as_destination(self) -> Option<Destination> {
        match self {
            Operand::Pc => Some(Destination::Pc),
            Operand::Reg(r) => Some(Destination::Reg(r)),
            Operand::Mem(r) => Some(Destination::Mem(r)),
            Operand::Control => Some(Destination::Control),
            Operand::Val => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// `name.imm`, the label's address.
    Absolute,
    /// `name.disp`, the label's address relative to the referencing word.
    Displacement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRef {
    pub name: LabelName,
    pub kind: RefKind,
}

impl LabelRef {
    pub fn resolve(&self, labels: &LabelMap, address: Word) -> Result<i32, LineError> {
        let target = *labels
            .get(&self.name)
            .ok_or_else(|| LineError::UnresolvedLabel(self.name.clone()))?;

        Ok(match self.kind {
            RefKind::Absolute => target as i32,
            RefKind::Displacement => target as i32 - address as i32,
        })
    }
}

impl Display for LabelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            RefKind::Absolute => "imm",
            RefKind::Displacement => "disp",
        };
        write!(f, "{}.{}", self.name, kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imm {
    Num(i32),
    Label(LabelRef),
}

impl Default for Imm {
    fn default() -> Self {
        Imm::Num(0)
    }
}

impl Imm {
    pub fn as_num(&self) -> Option<i32> {
        match self {
            Imm::Num(v) => Some(*v),
            Imm::Label(_) => None,
        }
    }

    fn resolve(&self, labels: &LabelMap, address: Word) -> Result<i32, LineError> {
        match self {
            Imm::Num(v) => Ok(*v),
            Imm::Label(lref) => lref.resolve(labels, address),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataItem {
    Words(Vec<Word>),
    Ref(LabelRef),
}

impl DataItem {
    pub fn words(&self) -> usize {
        match self {
            DataItem::Words(words) => words.len(),
            DataItem::Ref(_) => 1,
        }
    }

    /// `address` is where the first word of this item lands.
    pub fn resolve(&self, labels: &LabelMap, address: Word) -> Result<Vec<Word>, LineError> {
        match self {
            DataItem::Words(words) => Ok(words.clone()),
            DataItem::Ref(lref) => Ok(vec![lref.resolve(labels, address)? as Word]),
        }
    }
}

/// A validated copy or compute, with its immediates possibly still symbolic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub alu: Option<AluOp>,
    pub src: Source,
    pub dst: Destination,
    pub src_imm: Imm,
    pub dst_imm: Imm,
    pub effect: Effect,
    pub push: bool,
}

pub fn check_range(range: std::ops::RangeInclusive<i32>, value: i32) -> Result<i32, LineError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(LineError::ImmediateOutOfRange {
            min: *range.start(),
            max: *range.end(),
            value,
        })
    }
}

impl Operation {
    pub fn class(&self) -> Class {
        match self.alu {
            None => Class::Copy,
            Some(_) => Class::Compute,
        }
    }

    pub fn layout(&self) -> ImmLayout {
        ImmLayout::of(self.class(), self.src, self.dst)
    }

    /// Builds the instruction found at `address`.
    pub fn to_inst(&self, labels: &LabelMap, address: Word) -> Result<Inst, LineError> {
        let layout = self.layout();
        let src_imm = check_range(layout.source_range(), self.src_imm.resolve(labels, address)?)?;
        let dst_imm = check_range(
            layout.destination_range().unwrap_or(0..=0),
            self.dst_imm.resolve(labels, address)?,
        )?;

        let ops = Operands {
            src: self.src,
            dst: self.dst,
            src_imm,
            dst_imm,
            effect: self.effect,
            push: self.push,
        };

        Ok(match self.alu {
            None => Inst::Copy(ops),
            Some(op) => Inst::Compute(op, ops),
        })
    }

    /// Without a label map there is nothing to resolve against, and the
    /// placeholder word 0 comes back.
    pub fn encode(&self, labels: Option<&LabelMap>, address: Word) -> Result<Word, LineError> {
        match labels {
            None => Ok(0),
            Some(labels) => Ok(self.to_inst(labels, address)?.encode()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jump(target: &str) -> Operation {
        Operation {
            alu: None,
            src: Source::Pc,
            dst: Destination::Pc,
            src_imm: Imm::Label(LabelRef {
                name: target.to_owned(),
                kind: RefKind::Displacement,
            }),
            dst_imm: Imm::default(),
            effect: Effect::Always,
            push: false,
        }
    }

    #[test]
    fn operands_by_position() {
        assert_eq!(Operand::parse(0, "reg"), Some(Operand::Pc));
        assert_eq!(Operand::parse(2, "mem"), Some(Operand::Mem(Reg::R2)));
        assert_eq!(Operand::parse(4, "val"), Some(Operand::Val));
        assert_eq!(Operand::parse(0, "mem"), None);
        assert_eq!(Operand::parse(5, "reg"), None);
        assert_eq!(Operand::parse(3, "val"), None);

        assert_eq!(Operand::Control.as_source(), None);
        assert_eq!(Operand::Val.as_destination(), None);
        assert_eq!(Operand::Control.as_destination(), Some(Destination::Control));
    }

    #[test]
    fn displacements_are_relative() {
        let mut labels = LabelMap::new();
        labels.insert("back".to_owned(), 2);
        labels.insert("far".to_owned(), 0x200);

        let inst = jump("back").to_inst(&labels, 10).unwrap();
        assert_eq!(inst.operands().src_imm, -8);
        assert_eq!(jump("back").encode(None, 10), Ok(0));

        assert_eq!(
            jump("far").encode(Some(&labels), 0),
            Err(LineError::ImmediateOutOfRange {
                min: -64,
                max: 63,
                value: 0x200
            })
        );
        assert_eq!(
            jump("nowhere").encode(Some(&labels), 0),
            Err(LineError::UnresolvedLabel("nowhere".to_owned()))
        );
    }

    #[test]
    fn data_references() {
        let mut labels = LabelMap::new();
        labels.insert("msg".to_owned(), 0x10);
        let abs = DataItem::Ref(LabelRef {
            name: "msg".to_owned(),
            kind: RefKind::Absolute,
        });
        let disp = DataItem::Ref(LabelRef {
            name: "msg".to_owned(),
            kind: RefKind::Displacement,
        });
        assert_eq!(abs.resolve(&labels, 0x20), Ok(vec![0x10]));
        assert_eq!(disp.resolve(&labels, 0x20), Ok(vec![0xFFF0]));
        assert_eq!(abs.words(), 1);
        assert_eq!(DataItem::Words(vec![1, 2, 3]).words(), 3);
    }
}

use super::{
    model::{Imm, Operand, Operation},
    phases::{
        parse::{parse_num, split_token},
        types::{LineError, Located},
    },
};
use crate::spec::types::{
    hw::Word,
    inst::Class,
    operand::{Destination, Reg, Source},
};
use std::collections::HashMap;

pub const VALUE_SIGIL: char = '$';
pub const REF_SIGIL: char = '&';

pub fn is_alias(raw: &str) -> bool {
    raw.starts_with(VALUE_SIGIL) || raw.starts_with(REF_SIGIL)
}

pub fn fmt_imm(v: i32) -> String {
    if v < 0 {
        format!("-{:x}.imm", -(v as i64))
    } else {
        format!("{:x}.imm", v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alias {
    /// Substituted verbatim, possibly as several tokens.
    Direct(String),
    /// A word at `offset` from the address held in `reg`. The offset moves
    /// whenever a later instruction moves `reg`.
    Tracked { reg: Reg, offset: i32 },
}

/// Aliases are textual. The same alias may expand differently at two points
/// of a program when its register has moved in between.
#[derive(Debug, Default)]
pub struct SugarTable {
    aliases: HashMap<String, Alias>,
}

impl SugarTable {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, name: &str) -> Option<&Alias> {
        self.aliases.get(name)
    }

    /// `$name as <operand>`. A register or memory operand defines both the
    /// `$name` (memory) and `&name` (register) forms.
    pub fn define(&mut self, name: &str, operand: &str) {
        let reg_form = split_token(operand)
            .filter(|(_, kind)| kind == "mem" || kind == "reg")
            .map(|(idx, _)| idx.to_owned());

        match reg_form {
            Some(idx) => {
                let bare = &name[1..];
                self.insert(format!("{}{}", VALUE_SIGIL, bare), Alias::Direct(format!("{}.mem", idx)));
                self.insert(format!("{}{}", REF_SIGIL, bare), Alias::Direct(format!("{}.reg", idx)));
            }
            None => self.insert(name.to_owned(), Alias::Direct(operand.to_owned())),
        }
    }

    /// `$a, $b, ... as N.mem`, each name one word further from `reg`.
    pub fn define_indexed(&mut self, names: &[&str], reg: Reg) {
        for (offset, name) in names.iter().enumerate() {
            self.insert(
                (*name).to_owned(),
                Alias::Tracked {
                    reg,
                    offset: offset as i32,
                },
            );
        }
    }

    /// `$name = <operation>`, bound once the operation has been tracked.
    pub fn bind_destination(&mut self, name: &str, dst: Destination, offset: i32) {
        let bare = &name[1..];
        match dst {
            Destination::Mem(reg) => {
                self.insert(format!("{}{}", VALUE_SIGIL, bare), Alias::Tracked { reg, offset });
                self.insert(
                    format!("{}{}", REF_SIGIL, bare),
                    Alias::Direct(format!("{}.reg", reg.index())),
                );
            }
            dst => self.insert(name.to_owned(), Alias::Direct(dst.to_string())),
        }
    }

    fn insert(&mut self, name: String, alias: Alias) {
        log::trace!("sugar {} -> {:?}", name, alias);
        self.aliases.insert(name, alias);
    }

    pub fn shift(&mut self, reg: Reg, delta: i32) {
        for alias in self.aliases.values_mut() {
            if let Alias::Tracked { reg: r, offset } = alias {
                if *r == reg {
                    *offset = offset.wrapping_add(delta);
                }
            }
        }
    }

    /// Follows the pointer register movements made by `op`: pushes move the
    /// stack down, pops move it back up, and `copy N.reg k.imm N.reg` moves
    /// it by `k`.
    pub fn track(&mut self, op: &Operation) {
        match (op.src, op.dst) {
            (_, Destination::Mem(r)) if op.push => self.shift(r, 1),
            (Source::Mem(r), _) if op.push => self.shift(r, -1),
            (Source::Reg(a), Destination::Reg(b)) if a == b && op.class() == Class::Copy => {
                if let Imm::Num(k) = op.src_imm {
                    self.shift(a, k.wrapping_neg());
                }
            }
            _ => (),
        }
    }

    /// The register an indexed declaration counts from. `N.reg` names the
    /// same slots as `N.mem`.
    pub fn resolve_base(&self, raw: &str) -> Result<Reg, LineError> {
        let text = match self.get(raw) {
            Some(Alias::Direct(text)) => text.as_str(),
            _ => raw,
        };

        match split_token(text) {
            Some((idx, kind)) if kind == "reg" => self.resolve_stack(&format!("{}.mem", idx)),
            _ => self.resolve_stack(raw),
        }
    }

    /// The stack register behind `raw`, which is `N.mem` or an alias of it.
    pub fn resolve_stack(&self, raw: &str) -> Result<Reg, LineError> {
        let text = match self.get(raw) {
            Some(Alias::Direct(text)) => text.clone(),
            Some(Alias::Tracked { reg, offset: 0 }) => format!("{}.mem", reg.index()),
            Some(Alias::Tracked { .. }) => return Err(LineError::InvalidStackOperand(raw.to_owned())),
            None => raw.to_owned(),
        };

        let operand = match split_token(&text) {
            Some((idx, kind)) if kind == "mem" => parse_num(idx)
                .filter(|&idx| idx >= 0)
                .and_then(|idx| Operand::parse(idx as Word, &kind)),
            _ => None,
        };

        match operand {
            Some(Operand::Mem(reg)) => Ok(reg),
            _ => Err(LineError::InvalidStackOperand(text)),
        }
    }

    /// Replaces every alias in `tokens`. A numeric immediate directly after a
    /// tracked alias is folded into its offset.
    pub fn substitute(
        &self,
        tokens: &[Located<String>],
    ) -> Result<Vec<Located<String>>, Located<LineError>> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut it = tokens.iter().peekable();

        while let Some(tk) = it.next() {
            let raw = tk.as_value();
            if !is_alias(raw) {
                out.push(tk.clone());
                continue;
            }

            match self.get(raw) {
                None => return Err(tk.transfer(LineError::InvalidOperand(raw.clone()))),
                Some(Alias::Direct(text)) => {
                    out.extend(text.split_whitespace().map(|part| tk.transfer(part.to_owned())));
                }
                Some(Alias::Tracked { reg, offset }) => {
                    let extra = it
                        .peek()
                        .and_then(|next| numeric_imm(next.as_value()).map(|k| (*next, k)));
                    let offset = match extra {
                        None => *offset,
                        Some((next, k)) => {
                            it.next();
                            offset
                                .checked_add(k)
                                .ok_or_else(|| next.transfer(LineError::InvalidOperand(next.as_value().clone())))?
                        }
                    };

                    out.push(tk.transfer(format!("{}.mem", reg.index())));
                    if offset != 0 {
                        out.push(tk.transfer(fmt_imm(offset)));
                    }
                }
            }
        }

        Ok(out)
    }
}

/// The value of a `k.imm` token with a numeric `k`.
pub fn numeric_imm(raw: &str) -> Option<i32> {
    match split_token(raw) {
        Some((value, kind)) if kind == "imm" => parse_num(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::defs::effect::Effect;

    fn tokens(line: &str) -> Vec<Located<String>> {
        line.split_whitespace().map(|s| Located::from(s.to_owned())).collect()
    }

    fn expand(table: &SugarTable, line: &str) -> String {
        table
            .substitute(&tokens(line))
            .unwrap()
            .into_iter()
            .map(Located::value)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn push_to(reg: Reg) -> Operation {
        Operation {
            alu: None,
            src: Source::Imm,
            dst: Destination::Mem(reg),
            src_imm: Imm::Num(1),
            dst_imm: Imm::default(),
            effect: Effect::Always,
            push: true,
        }
    }

    #[test]
    fn direct_aliases() {
        let mut table = SugarTable::new();
        table.define("$stack", "1.mem");
        table.define("$five", "4.val 5.imm");

        assert_eq!(expand(&table, "copy $stack &stack"), "copy 1.mem 1.reg");
        assert_eq!(expand(&table, "copy $five 2.reg"), "copy 4.val 5.imm 2.reg");
        assert_eq!(
            table.substitute(&tokens("copy $nope 2.reg")).unwrap_err().value(),
            LineError::InvalidOperand("$nope".to_owned())
        );
    }

    #[test]
    fn indexed_aliases_drift() {
        let mut table = SugarTable::new();
        table.define_indexed(&["$a", "$b"], Reg::R1);
        assert_eq!(expand(&table, "copy $a $b"), "copy 1.mem 1.mem 1.imm");

        table.track(&push_to(Reg::R1));
        assert_eq!(expand(&table, "copy $a 2.reg"), "copy 1.mem 1.imm 2.reg");
        assert_eq!(expand(&table, "copy $b 3.imm 2.reg"), "copy 1.mem 5.imm 2.reg");

        // Other registers are left alone.
        table.track(&push_to(Reg::R2));
        assert_eq!(expand(&table, "copy $a 2.reg"), "copy 1.mem 1.imm 2.reg");

        let mut pop = push_to(Reg::R1);
        pop.src = Source::Mem(Reg::R1);
        pop.dst = Destination::Reg(Reg::R2);
        table.track(&pop);
        assert_eq!(expand(&table, "copy $a 2.reg"), "copy 1.mem 2.reg");

        let mut grow = push_to(Reg::R1);
        grow.src = Source::Reg(Reg::R1);
        grow.dst = Destination::Reg(Reg::R1);
        grow.src_imm = Imm::Num(-3);
        grow.push = false;
        table.track(&grow);
        assert_eq!(expand(&table, "copy $a 2.reg"), "copy 1.mem 3.imm 2.reg");
    }

    #[test]
    fn bound_destinations() {
        let mut table = SugarTable::new();
        table.bind_destination("$x", Destination::Mem(Reg::R3), 0);
        table.bind_destination("$y", Destination::Reg(Reg::R2), 0);

        assert_eq!(expand(&table, "copy $x &x"), "copy 3.mem 3.reg");
        assert_eq!(expand(&table, "copy $y 1.reg"), "copy 2.reg 1.reg");
    }

    #[test]
    fn stack_operands() {
        let mut table = SugarTable::new();
        table.define("$stack", "2.mem");
        table.define("$val", "4.val");
        table.define_indexed(&["$top", "$next"], Reg::R3);

        assert_eq!(table.resolve_stack("$stack"), Ok(Reg::R2));
        assert_eq!(table.resolve_stack("1.mem"), Ok(Reg::R1));
        assert_eq!(table.resolve_stack("$top"), Ok(Reg::R3));
        assert_eq!(
            table.resolve_stack("$next"),
            Err(LineError::InvalidStackOperand("$next".to_owned()))
        );
        assert_eq!(
            table.resolve_stack("$val"),
            Err(LineError::InvalidStackOperand("4.val".to_owned()))
        );
        assert_eq!(
            table.resolve_stack("2.reg"),
            Err(LineError::InvalidStackOperand("2.reg".to_owned()))
        );
    }
}

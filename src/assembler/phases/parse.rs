use super::types::{LabelName, LineError, Located, Statement};
use crate::assembler::{
    label::LabelGenerator,
    model::{check_range, DataItem, Imm, LabelRef, Operand, Operation, RefKind},
};
use crate::spec::{
    defs::{alu::AluOp, effect::Effect},
    types::{hw::Word, inst::Class},
};
use num_traits::FromPrimitive;
use std::{ops::RangeInclusive, str::FromStr};

const BLOCK_START: &str = "{";
const BLOCK_END: &str = "}";
const DATA_MARKER: &str = "%";
const LABEL_SUFFIX: char = ':';
const BLOCK_CONTEXT: &str = "";

/// Numeric data items are one word, read as either signed or unsigned.
const DATA_WORD_RANGE: RangeInclusive<i32> = (i16::MIN as i32)..=(Word::MAX as i32);

/// Reads a hexadecimal number, optionally `-` signed and `0x` prefixed.
pub fn parse_num(raw: &str) -> Option<i32> {
    let (neg, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let digits = digits.strip_prefix("0x").unwrap_or(digits);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let val = i32::from_str_radix(digits, 16).ok()?;
    Some(if neg { -val } else { val })
}

/// Splits `value.kind` at the last dot.
pub fn split_token(raw: &str) -> Option<(&str, String)> {
    let dot = raw.rfind('.')?;
    Some((&raw[..dot], raw[dot + 1..].to_ascii_lowercase()))
}

fn parse_label_name(raw: &str) -> Result<LabelName, LineError> {
    if raw.is_empty() {
        return Err(LineError::Syntax(
            raw.to_owned(),
            "label names must have nonzero length",
        ));
    }

    if LabelGenerator::is_reserved(raw) {
        return Err(LineError::Syntax(
            raw.to_owned(),
            "label names may not begin with a block marker",
        ));
    }

    if raw.contains('.') || raw.contains(LABEL_SUFFIX) {
        return Err(LineError::Syntax(
            raw.to_owned(),
            "label names may not contain '.' or ':'",
        ));
    }

    Ok(raw.to_owned())
}

fn parse_ref_kind(kind: &str) -> Option<RefKind> {
    match kind {
        "imm" => Some(RefKind::Absolute),
        "disp" => Some(RefKind::Displacement),
        _ => None,
    }
}

fn parse_imm(value: &str, kind: RefKind, labels: &LabelGenerator) -> Result<Imm, LineError> {
    if let Some(v) = parse_num(value) {
        return Ok(Imm::Num(v));
    }

    let name = match value {
        "loop" => labels.start_label()?,
        "break" => labels.end_label()?,
        name => parse_label_name(name)?,
    };

    Ok(Imm::Label(LabelRef { name, kind }))
}

struct Arg {
    tk: Located<String>,
    operand: Operand,
}

#[derive(Default)]
struct OpBuilder {
    alu: Option<AluOp>,
    args: Vec<Arg>,
    src_imm: Option<Located<Imm>>,
    dst_imm: Option<Located<Imm>>,
    effect: Option<Effect>,
    dst_imm_raw: Option<String>,
    push: Option<(Located<String>, bool)>,
}

fn set_once<T>(slot: &mut Option<T>, val: T, raw: &str) -> Result<(), LineError> {
    if slot.is_some() {
        return Err(LineError::DuplicateModifier(raw.to_owned()));
    }
    *slot = Some(val);
    Ok(())
}

impl OpBuilder {
    fn accept(
        &mut self,
        class: Class,
        tk: &Located<String>,
        labels: &LabelGenerator,
    ) -> Result<(), LineError> {
        let raw = tk.as_value().as_str();
        let invalid = || LineError::InvalidOperand(raw.to_owned());

        if raw == "push" || raw == "pop" {
            return set_once(&mut self.push, (tk.clone(), true), raw);
        }

        let (value, kind) = split_token(raw).ok_or_else(invalid)?;
        match kind.as_str() {
            "reg" | "mem" | "val" => {
                let operand = parse_num(value)
                    .filter(|&idx| idx >= 0)
                    .and_then(|idx| Operand::parse(idx as Word, &kind))
                    .ok_or_else(|| LineError::InvalidRegister(raw.to_owned()))?;
                if self.args.len() == 2 {
                    return Err(invalid());
                }
                self.args.push(Arg {
                    tk: tk.clone(),
                    operand,
                });
                Ok(())
            }
            "imm" | "disp" => {
                let kind = parse_ref_kind(&kind).ok_or_else(invalid)?;
                let imm = tk.transfer(parse_imm(value, kind, labels)?);
                match self.args.len() {
                    1 => set_once(&mut self.src_imm, imm, raw),
                    2 => {
                        set_once(&mut self.dst_imm, imm, raw)?;
                        self.dst_imm_raw = Some(raw.to_owned());
                        Ok(())
                    }
                    _ => Err(LineError::Syntax(
                        raw.to_owned(),
                        "an immediate must directly follow its operand",
                    )),
                }
            }
            "eff" => {
                let eff = parse_num(value)
                    .filter(|&code| code >= 0)
                    .and_then(|code| Effect::from_code(code as Word))
                    .ok_or_else(invalid)?;
                set_once(&mut self.effect, eff, raw)
            }
            "push" => {
                let push = match parse_num(value) {
                    Some(0) => false,
                    Some(1) => true,
                    _ => return Err(invalid()),
                };
                set_once(&mut self.push, (tk.clone(), push), raw)
            }
            "op" if class == Class::Compute => {
                // Names first, `add` is also a hex number.
                let op = AluOp::from_str(&value.to_ascii_lowercase())
                    .ok()
                    .or_else(|| parse_num(value).and_then(AluOp::from_i32))
                    .ok_or_else(invalid)?;
                set_once(&mut self.alu, op, raw)
            }
            _ => Err(invalid()),
        }
    }

    fn finish(self, class: Class, mnemonic: &Located<String>) -> Result<Operation, Located<LineError>> {
        let missing = |msg| mnemonic.transfer(LineError::Syntax(mnemonic.as_value().clone(), msg));

        if self.args.len() != 2 {
            return Err(missing("expected a source and a destination operand"));
        }

        let alu = match (class, self.alu) {
            (Class::Compute, None) => return Err(missing("missing ALU operation")),
            (_, alu) => alu,
        };

        let (src_arg, dst_arg) = (&self.args[0], &self.args[1]);
        let src = src_arg.operand.as_source().ok_or_else(|| {
            src_arg
                .tk
                .transfer(LineError::InvalidRegister(src_arg.tk.as_value().clone()))
        })?;
        let dst = dst_arg.operand.as_destination().ok_or_else(|| {
            dst_arg
                .tk
                .transfer(LineError::InvalidDestination(dst_arg.tk.as_value().clone()))
        })?;

        // Pushing and popping move a pointer register, so they need one.
        let push = match self.push {
            Some((tk, true)) if !(src.is_mem() || dst.is_mem()) => {
                return Err(tk.transfer(LineError::InvalidOperand(tk.as_value().clone())));
            }
            Some((_, push)) => push,
            None => false,
        };

        let src_imm = self.src_imm.unwrap_or_else(|| Located::from(Imm::default()));
        let dst_imm = self.dst_imm.unwrap_or_else(|| Located::from(Imm::default()));

        if dst_imm.as_value() != &Imm::default() && !(class == Class::Copy && src.is_mem() && dst.is_mem()) {
            return Err(dst_imm.transfer(LineError::InvalidOperand(
                self.dst_imm_raw.unwrap_or_default(),
            )));
        }

        let op = Operation {
            alu,
            src,
            dst,
            src_imm: src_imm.as_value().clone(),
            dst_imm: dst_imm.as_value().clone(),
            effect: self.effect.unwrap_or_default(),
            push,
        };

        let layout = op.layout();
        check_imm(&src_imm, layout.source_range())?;
        check_imm(&dst_imm, layout.destination_range().unwrap_or(0..=0))?;

        Ok(op)
    }
}

fn check_imm(imm: &Located<Imm>, range: RangeInclusive<i32>) -> Result<(), Located<LineError>> {
    match imm.as_value().as_num() {
        Some(v) => check_range(range, v)
            .map(|_| ())
            .map_err(|err| imm.transfer(err)),
        None => Ok(()),
    }
}

fn parse_operation(
    class: Class,
    mnemonic: &Located<String>,
    rest: &[Located<String>],
    labels: &LabelGenerator,
) -> Result<Operation, Located<LineError>> {
    let mut builder = OpBuilder::default();
    for tk in rest {
        builder
            .accept(class, tk, labels)
            .map_err(|err| tk.transfer(err))?;
    }
    builder.finish(class, mnemonic)
}

fn flush_hex(run: &mut String, items: &mut Vec<DataItem>) -> Result<(), LineError> {
    if run.is_empty() {
        return Ok(());
    }

    if run.len() % 4 != 0 {
        return Err(LineError::Syntax(
            run.clone(),
            "data must be a whole number of 16-bit words",
        ));
    }

    let words = run
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            std::str::from_utf8(chunk)
                .ok()
                .and_then(|s| Word::from_str_radix(s, 16).ok())
                .ok_or_else(|| LineError::Syntax(run.clone(), "malformed hex data"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    items.push(DataItem::Words(words));
    run.clear();
    Ok(())
}

fn parse_data(rest: &[Located<String>]) -> Result<Vec<DataItem>, Located<LineError>> {
    let mut items = Vec::new();
    let mut run = String::new();

    for tk in rest {
        let raw = tk.as_value();
        if raw.chars().all(|c| c.is_ascii_hexdigit()) {
            run.push_str(raw);
            continue;
        }

        flush_hex(&mut run, &mut items).map_err(|err| tk.transfer(err))?;

        let item = split_token(raw)
            .and_then(|(value, kind)| {
                let kind = parse_ref_kind(&kind)?;
                Some(match parse_num(value) {
                    Some(v) => check_range(DATA_WORD_RANGE, v).map(|v| DataItem::Words(vec![v as Word])),
                    None => parse_label_name(value).map(|name| DataItem::Ref(LabelRef { name, kind })),
                })
            })
            .unwrap_or_else(|| Err(LineError::Syntax(raw.clone(), "expected hex data or a label reference")))
            .map_err(|err| tk.transfer(err))?;
        items.push(item);
    }

    let last = rest.last().map(|tk| tk.transfer(()));
    flush_hex(&mut run, &mut items).map_err(|err| match &last {
        Some(last) => last.transfer(err),
        None => Located::from(err),
    })?;
    Ok(items)
}

fn expect_alone(first: &Located<String>, rest: &[Located<String>]) -> Result<(), Located<LineError>> {
    match rest.first() {
        None => Ok(()),
        Some(tk) => Err(tk.transfer(LineError::Syntax(
            tk.as_value().clone(),
            match first.as_value().as_str() {
                BLOCK_START | BLOCK_END => "block markers stand alone",
                _ => "label definitions stand alone",
            },
        ))),
    }
}

/// Turns one instruction line into its statement, `None` for a blank line.
pub fn parse_line(
    tokens: &[Located<String>],
    labels: &mut LabelGenerator,
) -> Result<Option<Statement>, Located<LineError>> {
    let (first, rest) = match tokens.split_first() {
        None => return Ok(None),
        Some(split) => split,
    };

    let stmt = match first.as_value().as_str() {
        BLOCK_START => {
            expect_alone(first, rest)?;
            Statement::LabelDef(labels.push_context(BLOCK_CONTEXT))
        }
        BLOCK_END => {
            expect_alone(first, rest)?;
            Statement::LabelDef(labels.pop_context(BLOCK_CONTEXT).map_err(|err| first.transfer(err))?)
        }
        DATA_MARKER => Statement::Data(parse_data(rest)?),
        "copy" => Statement::Op(parse_operation(Class::Copy, first, rest, labels)?),
        "compute" => Statement::Op(parse_operation(Class::Compute, first, rest, labels)?),
        raw => match raw.strip_suffix(LABEL_SUFFIX) {
            Some(name) => {
                expect_alone(first, rest)?;
                Statement::LabelDef(parse_label_name(name).map_err(|err| first.transfer(err))?)
            }
            None => {
                return Err(first.transfer(LineError::Syntax(
                    raw.to_owned(),
                    "expected a label, a block marker, data, or an operation",
                )))
            }
        },
    };

    Ok(Some(stmt))
}

use super::{
    expand::Expander,
    tokenize::tokenize_line,
    types::{Error, Failure, LabelMap, LineError, Located, Statement},
};
use crate::assembler::listing::{Entry, Sink};
use crate::spec::types::hw::Word;

const ADDRESS_SPACE: usize = 1 << 16;

/// An assembled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub words: Vec<Word>,
    pub labels: LabelMap,
    /// Source lines which produced at least one instruction.
    pub instructions: usize,
}

struct Unit<'a> {
    line: usize,
    source: &'a str,
    address: Word,
    stmt: Located<Statement>,
}

impl<'a> Unit<'a> {
    fn fail(&self, err: LineError) -> Failure {
        Failure::new(self.line, self.source, self.stmt.transfer(err))
    }
}

/// Expands every line and places its statements, collecting the failures of
/// lines which could not be expanded.
fn layout<'a>(source: &'a str, failures: &mut Vec<Failure>) -> (Vec<Unit<'a>>, usize) {
    let mut expander = Expander::new();
    let mut units = Vec::new();
    let mut instructions = 0;
    let mut address = 0;

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let stmts = match tokenize_line(line_no, line).and_then(|tokens| expander.expand(&tokens)) {
            Ok(stmts) => stmts,
            Err(err) => {
                failures.push(Failure::new(line_no, line, err));
                continue;
            }
        };

        if stmts.iter().any(|stmt| matches!(stmt.as_value(), Statement::Op(_))) {
            instructions += 1;
        }

        for stmt in stmts {
            let words = stmt.as_value().words();
            if address + words > ADDRESS_SPACE {
                failures.push(Failure::new(
                    line_no,
                    line,
                    stmt.transfer(LineError::Syntax(
                        line.trim().to_owned(),
                        "program does not fit in the address space",
                    )),
                ));
                return (units, instructions);
            }

            units.push(Unit {
                line: line_no,
                source: line,
                address: address as Word,
                stmt,
            });
            address += words;
        }
    }

    (units, instructions)
}

fn build_label_map(units: &[Unit], failures: &mut Vec<Failure>) -> LabelMap {
    let mut labels = LabelMap::new();

    for unit in units {
        if let Statement::LabelDef(name) = unit.stmt.as_value() {
            if labels.insert(name.clone(), unit.address).is_some() {
                failures.push(unit.fail(LineError::DuplicateLabel(name.clone())));
            }
        }
    }

    labels
}

fn serialize(units: &[Unit], labels: &LabelMap, sink: &mut dyn Sink) -> Result<Vec<Word>, Vec<Failure>> {
    let mut words = Vec::new();
    let mut failures = Vec::new();

    sink.emit(Entry::Header);
    for unit in units {
        match unit.stmt.as_value() {
            Statement::LabelDef(_) => (),
            Statement::Op(op) => match op.encode(Some(labels), unit.address) {
                Ok(word) => {
                    sink.emit(Entry::Inst {
                        address: unit.address,
                        word,
                        line: unit.line,
                        source: unit.source.to_owned(),
                    });
                    words.push(word);
                }
                Err(err) => failures.push(unit.fail(err)),
            },
            Statement::Data(items) => {
                let mut address = unit.address;
                let mut data = Vec::new();
                for item in items {
                    match item.resolve(labels, address) {
                        Ok(mut resolved) => data.append(&mut resolved),
                        Err(err) => failures.push(unit.fail(err)),
                    }
                    address = address.wrapping_add(item.words() as Word);
                }

                sink.emit(Entry::Data {
                    start: unit.address,
                    words: data.len(),
                });
                words.append(&mut data);
            }
        }
    }

    if failures.is_empty() {
        Ok(words)
    } else {
        Err(failures)
    }
}

/// Assembles `source` in two passes over its expanded statements. The first
/// gives every label its address, the second encodes against the finished
/// label map and reports each word to `sink`.
pub fn compile(source: &str, sink: &mut dyn Sink) -> Result<Program, Error> {
    let mut failures = Vec::new();
    let (units, instructions) = layout(source, &mut failures);
    let labels = build_label_map(&units, &mut failures);

    if !failures.is_empty() {
        return Err(Error::CompileFailed(failures));
    }

    let words = serialize(&units, &labels, sink).map_err(Error::CompileFailed)?;
    log::debug!(
        "assembled {} words from {} instruction lines, {} labels",
        words.len(),
        instructions,
        labels.len()
    );

    Ok(Program {
        words,
        labels,
        instructions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::listing::NullSink;

    fn compile_quiet(source: &str) -> Result<Program, Error> {
        compile(source, &mut NullSink)
    }

    #[test]
    fn labels_count_words() {
        let prog = compile_quiet(
            "start:\n\
             copy 0.reg end.disp 0.reg\n\
             % 0001 0002 start.imm\n\
             end:\n\
             compute 0.op 0.reg 0.reg\n",
        )
        .unwrap();

        assert_eq!(prog.labels["start"], 0);
        assert_eq!(prog.labels["end"], 4);
        assert_eq!(prog.words.len(), 5);
        assert_eq!(&prog.words[1..4], &[1, 2, 0]);
        assert_eq!(prog.words[4], 0xE000);
        assert_eq!(prog.instructions, 2);
    }

    #[test]
    fn forward_and_backward_displacements() {
        let prog = compile_quiet(
            "top:\n\
             copy 0.reg bottom.disp 0.reg\n\
             copy 0.reg top.disp 0.reg\n\
             bottom:\n",
        )
        .unwrap();
        assert_eq!(prog.words, vec![0x6002, 0x607F]);
    }

    #[test]
    fn duplicate_labels() {
        let err = compile_quiet("a:\ncopy 1.reg 2.reg\na:\n").unwrap_err();
        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failures()[0].line, 3);
        assert_eq!(
            err.failures()[0].error.as_value(),
            &LineError::DuplicateLabel("a".to_owned())
        );
    }

    #[test]
    fn failures_are_aggregated() {
        let err = compile_quiet(
            "copy 9.reg 1.reg\n\
             copy 1.reg 2.reg\n\
             copy 0.reg nowhere.disp 0.reg\n\
             copy 1.reg 2.reg bogus\n",
        )
        .unwrap_err();
        let lines = err.failures().iter().map(|f| f.line).collect::<Vec<_>>();
        assert_eq!(lines, vec![1, 4]);

        let err = compile_quiet("copy 0.reg nowhere.disp 0.reg\n% other.imm\n").unwrap_err();
        let lines = err.failures().iter().map(|f| f.line).collect::<Vec<_>>();
        assert_eq!(lines, vec![1, 2]);
    }

    #[test]
    fn listing_follows_the_words() {
        let mut listing: Vec<Entry> = Vec::new();
        compile("copy 1.reg 2.reg\n\n% 0001 0002\ncompute 0.op 0.reg 0.reg\n", &mut listing).unwrap();

        assert_eq!(listing.len(), 4);
        assert_eq!(listing[0], Entry::Header);
        assert!(matches!(listing[1], Entry::Inst { address: 0, line: 1, .. }));
        assert_eq!(listing[2], Entry::Data { start: 1, words: 2 });
        assert!(matches!(listing[3], Entry::Inst { address: 3, word: 0xE000, line: 4, .. }));
    }
}

use ucisc::assembler::{self, Entry, LineError};
use ucisc::frontend::assets;
use ucisc::spec::types::hw;

fn first_error(src: &str) -> LineError {
    let err = assembler::assemble(src).unwrap_err();
    err.failures()[0].error.as_value().clone()
}

#[test]
fn plain_instructions() {
    assert_eq!(
        assembler::assemble("copy 0.reg 2.imm 0.reg\ncompute 0.op 0.reg 0.reg"),
        Ok(vec![0x6002, 0xE000])
    );
}

#[test]
fn immediates_are_range_checked() {
    assert!(matches!(
        first_error("copy 4.val 40.imm 2.mem"),
        LineError::ImmediateOutOfRange { value: 64, .. }
    ));
    assert!(matches!(
        first_error("compute add.op 4.val 4.imm 2.reg"),
        LineError::ImmediateOutOfRange { value: 4, .. }
    ));
    assert!(assembler::assemble("compute add.op 4.val -4.imm 2.reg").is_ok());
}

#[test]
fn unknown_labels() {
    assert_eq!(
        first_error("copy 0.reg nowhere.disp 0.reg"),
        LineError::UnresolvedLabel("nowhere".to_owned())
    );
}

#[test]
fn every_broken_line_is_reported() {
    let err = assembler::assemble(
        "copy 9.reg 1.reg
         copy 1.reg 2.reg
         copy 4.val 40.imm 2.mem",
    )
    .unwrap_err();

    assert_eq!(err.failures().len(), 2);
    let report = err.to_string();
    assert!(report.starts_with("Assembly Error: 2 line(s) failed to compile"));
    assert!(report.contains("copy 9.reg 1.reg"));
}

#[test]
fn aliases_assemble_like_their_operands() {
    let sugared = assembler::assemble(
        "$counter as 2.reg
         copy 4.val 5.imm &counter
         compute sub.op 4.val 1.imm $counter",
    );
    let plain = assembler::assemble(
        "copy 4.val 5.imm 2.reg
         compute sub.op 4.val 1.imm 2.mem",
    );
    assert_eq!(sugared, plain);
}

#[test]
fn indexed_aliases_accept_registers() {
    let src = |base: &str| {
        format!(
            "$a, $b as {}
             copy 4.val 7.imm $a
             copy $b 3.reg",
            base
        )
    };
    let from_reg = assembler::assemble(&src("1.reg"));
    assert!(from_reg.is_ok());
    assert_eq!(from_reg, assembler::assemble(&src("1.mem")));
}

#[test]
fn oversized_offsets_are_rejected() {
    assert_eq!(
        first_error("$a, $b as 1.mem\ncopy $b 7fffffff.imm 2.reg\n"),
        LineError::InvalidOperand("7fffffff.imm".to_owned())
    );
    assert_eq!(
        first_error("1.mem[1] <= f(1.mem 7fffffff.imm)\nf:\n"),
        LineError::InvalidOperand("7fffffff.imm".to_owned())
    );
    assert!(matches!(
        first_error("% 12345.imm"),
        LineError::ImmediateOutOfRange { value: 0x12345, .. }
    ));
}

#[test]
fn output_is_deterministic() {
    let once = assembler::assemble(assets::FIB_SRC).unwrap();
    let twice = assembler::assemble(assets::FIB_SRC).unwrap();
    assert_eq!(once, twice);
    assert_eq!(assets::example_binary("fib"), Some(once.as_slice()));
}

#[test]
fn binaries_are_word_pairs() {
    let words = assembler::assemble(assets::FACTORIAL_SRC).unwrap();
    let bytes = assembler::assemble_bytes(assets::FACTORIAL_SRC).unwrap();
    assert_eq!(bytes.len(), 2 * words.len());
    assert_eq!(hw::bytes_to_words(&bytes), Some(words));
}

#[test]
fn listings_cover_every_word() {
    let mut listing: Vec<Entry> = Vec::new();
    let prog = assembler::compile(assets::FACTORIAL_SRC, &mut listing).unwrap();

    assert_eq!(listing[0], Entry::Header);
    let listed = listing
        .iter()
        .map(|entry| match entry {
            Entry::Header => 0,
            Entry::Inst { .. } => 1,
            Entry::Data { words, .. } => *words,
        })
        .sum::<usize>();
    assert_eq!(listed, prog.words.len());
    assert!(listing
        .iter()
        .any(|entry| matches!(entry, Entry::Inst { source, .. } if source.contains("store the result"))));
}

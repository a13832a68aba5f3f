use ucisc::assembler;
use ucisc::frontend::run::execute::{self, Config, Summary};
use ucisc::spec::types::hw::Word;
use ucisc::vm::{Processor, State};

pub const MAX_INSTRUCTIONS: u64 = 5_000_000;

pub fn boot(src: &str) -> Processor {
    let prog = assembler::assemble(src).unwrap_or_else(|err| panic!("{}", err));
    execute::boot(&prog).unwrap()
}

pub fn execute(vm: &mut Processor) -> Summary {
    execute::execute(
        &Config {
            max_instructions: Some(MAX_INSTRUCTIONS),
            ..Config::default()
        },
        vm,
    )
}

/// Assembles and runs `src`, which must halt.
pub fn run(src: &str) -> (Processor, Summary) {
    let mut vm = boot(src);
    let summary = execute(&mut vm);
    assert_eq!(summary.state, State::Halted, "{}", vm);
    assert!(!summary.timeout);
    (vm, summary)
}

pub fn word_at(vm: &Processor, addr: Word) -> Word {
    vm.peek(addr).unwrap()
}

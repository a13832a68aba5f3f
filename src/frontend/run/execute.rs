use crate::assembler::disasm;
use crate::spec::types::hw::{Byte, Word};
use crate::vm::{LoadError, Processor, State, DEFAULT_PAGES};
use derive_more::Constructor;
use std::convert::Infallible;

/// The device id the frontends give the processor they boot.
pub const PROCESSOR_ID: Word = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Silent,
    MachineState,
    Disassemble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortAction {
    Stop,
    Report,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub max_instructions: Option<u64>,
    pub abort_action: AbortAction,

    pub print_marginals: bool,
    pub verbosity: Verbosity,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_instructions: Some(50_000_000),
            abort_action: AbortAction::Stop,
            print_marginals: false,
            verbosity: Verbosity::Silent,
        }
    }
}

#[derive(Debug, Constructor)]
pub struct Summary {
    pub state: State,
    pub timeout: bool,
    pub instructions: u64,
    pub real_ns_elapsed: u128,
}

impl Summary {
    pub fn to_effective_freq_megahertz(&self) -> f64 {
        ((self.instructions as f64) * 1000.0) / (self.real_ns_elapsed as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Continue,
    Stepping,
    Stop,
}

pub trait ExecutionHook<Error>: FnMut(&Processor) -> Result<ExecutionMode, Error> {}

impl<Error, F: FnMut(&Processor) -> Result<ExecutionMode, Error>> ExecutionHook<Error> for F {}

pub fn boot(prog: &[Word]) -> Result<Processor, LoadError> {
    Processor::with_program(PROCESSOR_ID, prog)
}

pub fn boot_bytes(prog: &[Byte]) -> Result<Processor, LoadError> {
    let mut vm = Processor::new(PROCESSOR_ID, DEFAULT_PAGES, 0);
    vm.load_bytes(prog)?;
    Ok(vm)
}

pub fn execute(cfg: &Config, vm: &mut Processor) -> Summary {
    let hook = |_: &Processor| Ok::<_, Infallible>(ExecutionMode::Continue);
    match execute_with_hook(cfg, vm, hook) {
        Ok(summary) => summary,
        Err(never) => match never {},
    }
}

fn trace(verbosity: Verbosity, vm: &Processor) {
    let pc = vm.registers().pc;
    match verbosity {
        Verbosity::Silent => (),
        Verbosity::MachineState => print!("{}", vm.registers()),
        Verbosity::Disassemble => {
            if let Some(word) = vm.peek(pc) {
                println!("{}", disasm::Line::at(pc, word));
            }
            print!("{}", vm.registers());
        }
    }
}

pub fn execute_with_hook<Error>(
    cfg: &Config,
    vm: &mut Processor,
    mut hook: impl ExecutionHook<Error>,
) -> Result<Summary, Error> {
    if cfg.print_marginals {
        println!("CPU Start");
    }

    let start = vm.instructions();
    let did_timeout = loop {
        let remaining = cfg
            .max_instructions
            .map(|max| max.saturating_sub(vm.instructions() - start));
        if remaining == Some(0) {
            break true;
        }

        let state = match (hook(&*vm)?, cfg.verbosity) {
            (ExecutionMode::Stop, _) => break false,
            (ExecutionMode::Continue, Verbosity::Silent) => vm.run(remaining),
            (_, verbosity) => {
                trace(verbosity, vm);
                vm.step()
            }
        };

        match state {
            State::Running | State::Timeout => (),
            State::Halted => break false,
            State::Aborted => {
                if cfg.abort_action == AbortAction::Report {
                    if let Some(fault) = vm.fault() {
                        println!("CPU Aborted: {}", fault);
                    }
                    print!("{}", vm);
                }
                break false;
            }
        }
    };

    let summary = Summary::new(
        vm.state(),
        did_timeout,
        vm.instructions() - start,
        vm.real_ns_elapsed(),
    );

    if cfg.print_marginals {
        println!(
            "CPU Stop (in state {}{}), {} instructions executed taking {}ms, @{:.2}MHz",
            summary.state,
            if did_timeout { "/Timeout" } else { "" },
            summary.instructions,
            summary.real_ns_elapsed / 1000 / 1000,
            summary.to_effective_freq_megahertz()
        );
    }

    Ok(summary)
}

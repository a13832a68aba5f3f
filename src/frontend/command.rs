use super::{
    assemble, assets,
    run::{
        debug,
        execute::{self, AbortAction, Config, Summary, Verbosity},
    },
    suite,
};
use crate::assembler::{self, Entry};
use crate::spec::types::hw::{self, Word};
use crate::vm::{Processor, State};
use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::{fmt::Display, path::PathBuf, str::FromStr};
use structopt::StructOpt;

#[cfg(windows)]
pub fn terminal_init() {
    ansi_term::enable_ansi_support().expect("Could not enable terminal ANSI support");
}

#[cfg(not(windows))]
pub fn terminal_init() {}

#[derive(StructOpt, Debug)]
#[structopt(name = "ucisc")]
pub enum CommandRoot {
    Vm(SubcommandVm),
    Asm(SubcommandAsm),
    Run(SubcommandRun),
    Suite(SubcommandSuite),
}

#[derive(StructOpt, Debug)]
#[structopt(name = "ucasm")]
pub struct SubcommandAsm {
    /// Source files, assembled as one program in the order given
    #[structopt(name = "in.ucisc", parse(from_os_str), required = true)]
    in_srcs: Vec<PathBuf>,

    #[structopt(short, long = "out", name = "out.bin", parse(from_os_str))]
    out_bin: Option<PathBuf>,

    /// Print the address/word/source listing
    #[structopt(short, long)]
    listing: bool,
}

#[derive(StructOpt, Debug)]
struct VmOpts {
    #[structopt(short, long, name = "max-instructions")]
    max_instructions: Option<InstLimit>,

    #[structopt(short, long)]
    verbose: bool,

    #[structopt(short, long)]
    debugger: bool,
}

#[derive(StructOpt, Debug)]
#[structopt(name = "ucisc-vm")]
pub struct SubcommandVm {
    #[structopt(flatten)]
    vm_opts: VmOpts,

    #[structopt(name = "prog.bin", parse(from_os_str))]
    in_prog_bin: PathBuf,
}

#[derive(StructOpt, Debug)]
pub struct SubcommandRun {
    #[structopt(flatten)]
    vm_opts: VmOpts,

    /// Run one of the bundled programs instead of source files
    #[structopt(short, long, possible_values = assets::EXAMPLES)]
    example: Option<String>,

    #[structopt(short, long)]
    listing: bool,

    #[structopt(name = "prog.ucisc", parse(from_os_str), required_unless = "example")]
    in_prog_srcs: Vec<PathBuf>,
}

#[derive(StructOpt, Debug)]
pub struct SubcommandSuite {
    #[structopt(name = "suite_name", parse(from_os_str))]
    suite_name: OsString,

    #[structopt(flatten)]
    opts: SuiteOpts,
}

#[derive(StructOpt, Debug)]
pub struct SuiteOpts {
    #[structopt(name = "suite/root/dir", parse(from_os_str))]
    suite_root_dir: Option<PathBuf>,

    #[structopt(short = "only", long, parse(from_os_str))]
    only: Option<OsString>,

    #[structopt(short, long, name = "max-instructions")]
    max_instructions: Option<InstLimit>,
}

#[derive(Debug)]
pub struct InstLimit(Option<u64>);

impl Display for InstLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.0.map(|lim| lim.to_string()).as_deref().unwrap_or("∞")
        )
    }
}

impl FromStr for InstLimit {
    type Err = <u64 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("unlimited") || s.eq_ignore_ascii_case("infinity") || s.eq("∞")
        {
            Ok(InstLimit(None))
        } else {
            Ok(InstLimit(Some(u64::from_str(s)?)))
        }
    }
}

impl Default for InstLimit {
    fn default() -> Self {
        InstLimit(Config::default().max_instructions)
    }
}

impl InstLimit {
    pub fn into_option(self) -> Option<u64> {
        self.0
    }
}

fn exit_with(result: Result<i32>) -> ! {
    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(2);
        }
    }
}

pub fn root(cmd: CommandRoot) -> ! {
    match cmd {
        CommandRoot::Asm(scmd) => asm(scmd),
        CommandRoot::Vm(scmd) => vm(scmd),
        CommandRoot::Run(scmd) => run(scmd),
        CommandRoot::Suite(scmd) => suite(scmd),
    };
}

pub fn asm(cmd: SubcommandAsm) -> ! {
    exit_with(try_asm(cmd))
}

pub fn vm(cmd: SubcommandVm) -> ! {
    exit_with(try_vm(cmd))
}

pub fn run(cmd: SubcommandRun) -> ! {
    exit_with(try_run(cmd))
}

pub fn suite(cmd: SubcommandSuite) -> ! {
    exit_with(try_suite(cmd))
}

fn try_asm(cmd: SubcommandAsm) -> Result<i32> {
    let prog = assemble::compile_paths(&cmd.in_srcs, cmd.listing)?;

    let out_name = match cmd.out_bin {
        Some(outfile) => outfile,
        None => assemble::default_output_path(&cmd.in_srcs[0], assets::DEFAULT_BINARY_EXT),
    };

    std::fs::write(&out_name, hw::words_to_bytes(&prog.words))
        .with_context(|| format!("could not write binary '{}'", out_name.display()))?;
    log::info!(
        "wrote {} words ({} instructions) to '{}'",
        prog.words.len(),
        prog.instructions,
        out_name.display()
    );

    Ok(0)
}

fn try_vm(cmd: SubcommandVm) -> Result<i32> {
    let prog_bin = std::fs::read(&cmd.in_prog_bin)
        .with_context(|| format!("could not read binary '{}'", cmd.in_prog_bin.display()))?;
    let mut vm = execute::boot_bytes(&prog_bin)?;
    let summary = execute_with_opts(&mut vm, cmd.vm_opts)?;

    Ok(summary_to_exit_code(&summary))
}

fn try_run(cmd: SubcommandRun) -> Result<i32> {
    let prog = match &cmd.example {
        Some(name) => example_program(name, cmd.listing)?,
        None => assemble::compile_paths(&cmd.in_prog_srcs, cmd.listing)?.words,
    };

    let mut vm = execute::boot(&prog)?;
    let summary = execute_with_opts(&mut vm, cmd.vm_opts)?;

    Ok(summary_to_exit_code(&summary))
}

fn try_suite(cmd: SubcommandSuite) -> Result<i32> {
    let success = suite::run_suite(
        &cmd.suite_name,
        &cmd.opts
            .suite_root_dir
            .unwrap_or_else(assets::default_suite_dir),
        cmd.opts.only.as_ref(),
        cmd.opts.max_instructions.unwrap_or_default().into_option(),
    )?;

    Ok(if success { 0 } else { 1 })
}

fn example_program(name: &str, listing: bool) -> Result<Vec<Word>> {
    if listing {
        let src = assets::example_source(name).ok_or_else(|| anyhow!("no example named '{}'", name))?;
        let mut entries: Vec<Entry> = Vec::new();
        let prog = assembler::compile(src, &mut entries)?;
        for entry in entries {
            println!("{}", entry);
        }
        return Ok(prog.words);
    }

    assets::example_binary(name)
        .map(<[Word]>::to_vec)
        .ok_or_else(|| anyhow!("no example named '{}'", name))
}

fn summary_to_exit_code(summary: &Summary) -> i32 {
    match (summary.state, summary.timeout) {
        (State::Halted, false) => 0,
        _ => 1,
    }
}

fn execute_with_opts(vm: &mut Processor, vm_opts: VmOpts) -> Result<Summary> {
    let cfg = Config {
        max_instructions: vm_opts.max_instructions.unwrap_or_default().into_option(),
        abort_action: if vm_opts.debugger || vm_opts.verbose {
            AbortAction::Report
        } else {
            AbortAction::Stop
        },
        verbosity: if vm_opts.verbose {
            Verbosity::Disassemble
        } else {
            Verbosity::Silent
        },
        print_marginals: true,
    };

    let summary = execute::execute_with_hook(
        &cfg,
        vm,
        debug::hook(vm_opts.verbose, vm_opts.debugger),
    )?;

    if vm_opts.verbose || vm_opts.debugger {
        print!("{}", vm);
    }

    Ok(summary)
}

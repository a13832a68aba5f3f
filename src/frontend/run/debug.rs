use super::execute::{ExecutionHook, ExecutionMode};
use crate::assembler::disasm;
use crate::spec::types::{
    hw::{offset_in_page, Word, PAGE_WORDS},
    operand::Reg,
};
use crate::vm::Processor;
use ansi_term::Color;
use std::io::{self, BufRead, Write};

const UPCOMING: Word = 2;
const PROMPT: &str = "[ENTER/n to step, c to continue, s for the stack, exit to stop]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Step,
    Continue,
    Stack,
    Exit,
}

impl Command {
    pub fn parse(raw: &str) -> Option<Command> {
        match raw.trim() {
            "" | "n" | "next" => Some(Command::Step),
            "c" | "continue" => Some(Command::Continue),
            "s" | "stack" => Some(Command::Stack),
            "exit" => Some(Command::Exit),
            _ => None,
        }
    }
}

fn print_header(vm: &Processor, verbose: bool) {
    let pc = vm.registers().pc;
    let lines = disasm::window(|addr| vm.peek(addr), pc, 0, UPCOMING);
    let (current, upcoming) = match lines.split_first() {
        Some((current, upcoming)) if current.address == pc => (current.to_string(), upcoming),
        _ => (format!("0x{:04x}: <unmapped>", pc), &[][..]),
    };

    println!("{:-<60}", "");
    println!(
        "{}",
        Color::White
            .bold()
            .on(Color::Fixed(22))
            .paint(format!(" {: <58} ", current))
    );
    for line in upcoming {
        println!("  {}", line);
    }
    if verbose {
        println!("{:-<60}", "");
        print!("{}", vm.registers());
    }
    println!("{:-<60}", "");
}

/// The rest of the page the stack pointer sits in.
fn print_stack(vm: &Processor) {
    let top = vm.registers().r[Reg::R1];
    let depth = PAGE_WORDS - offset_in_page(top);
    for (addr, word) in vm.stack(Reg::R1, depth) {
        println!("  0x{:04x}: 0x{:04x}", addr, word);
    }
}

fn prompt() -> io::Result<Option<String>> {
    println!("{}", PROMPT);
    io::stdout().flush()?;
    io::stdin().lock().lines().next().transpose()
}

pub fn hook(verbose: bool, interactive: bool) -> impl ExecutionHook<io::Error> {
    let mut continuing = !interactive;

    move |vm: &Processor| {
        if continuing {
            return Ok(ExecutionMode::Continue);
        }

        print_header(vm, verbose);
        loop {
            let line = match prompt()? {
                Some(line) => line,
                None => return Ok(ExecutionMode::Stop),
            };

            match Command::parse(&line) {
                Some(Command::Step) => return Ok(ExecutionMode::Stepping),
                Some(Command::Continue) => {
                    continuing = true;
                    return Ok(ExecutionMode::Continue);
                }
                Some(Command::Stack) => print_stack(vm),
                Some(Command::Exit) => return Ok(ExecutionMode::Stop),
                None => println!("Unknown command: '{}'", line.trim()),
            }
        }
    }
}

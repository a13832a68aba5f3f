use super::{
    alu,
    io::types::{ControlBlock, Device, DeviceType, Handle},
    mem::{LoadError, Memory},
    reg::Registers,
};
use crate::spec::{
    defs::effect::Effect,
    types::{
        hw::*,
        inst::{Inst, Operands},
        operand::{Destination, Reg, Source},
    },
};
use std::fmt::{self, Display};
use strum_macros::Display;

pub const DEFAULT_PAGES: usize = 256;

/// Control words through which a controller can drive a processor.
pub mod remote {
    pub const PC: usize = 0x7;
    pub const R1: usize = 0x8;
    pub const R3: usize = 0xA;
    pub const FLAGS: usize = 0xB;
    pub const CONTROL: usize = 0xC;

    pub const MASK: u16 = 0x1F80;
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Halted,
    Aborted,

    // Not a real state, just returned by `run()` when it runs out of instructions
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The program counter points outside local memory.
    Fetch(Word),
}

impl Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Fetch(pc) => write!(f, "instruction fetch from unmapped address {:#06X}", pc),
        }
    }
}

enum Route {
    Local,
    Control(usize, usize),
    Window(usize),
}

pub struct Processor {
    control: ControlBlock,
    memory: Memory,
    regs: Registers,
    peers: Vec<Handle<dyn Device>>,

    state: State,
    fault: Option<Fault>,
    instructions: u64,
    real_ns_elapsed: u128,
}

impl Processor {
    pub fn new(id: Word, pages: usize, rom_pages: usize) -> Self {
        let mut control = ControlBlock::new(id, DeviceType::Processor);
        control.masks.privileged_read |= remote::MASK;
        control.masks.privileged_write |= remote::MASK;

        Processor {
            control,
            memory: Memory::new(pages, rom_pages),
            regs: Registers::default(),
            peers: Vec::new(),

            state: State::Running,
            fault: None,
            instructions: 0,
            real_ns_elapsed: 0,
        }
    }

    /// A processor with a full 64K words of RAM holding `prog` from address 0.
    pub fn with_program(id: Word, prog: &[Word]) -> Result<Self, LoadError> {
        let mut cpu = Processor::new(id, DEFAULT_PAGES, 0);
        cpu.memory.load(0, prog)?;
        Ok(cpu)
    }

    pub fn load(&mut self, prog: &[Word]) -> Result<(), LoadError> {
        self.memory.load(0, prog)
    }

    pub fn load_bytes(&mut self, prog: &[Byte]) -> Result<(), LoadError> {
        self.memory.load_bytes(0, prog)
    }

    /// Puts `dev` on this processor's bank, returning its bank index.
    pub fn attach(&mut self, dev: Handle<dyn Device>) -> Word {
        let idx = (self.peers.len() + 1) as Word;
        dev.rc.borrow_mut().control_mut().set_bank_index(idx);
        self.peers.push(dev);
        idx
    }

    pub fn id(&self) -> Word {
        self.control.id()
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn real_ns_elapsed(&self) -> u128 {
        self.real_ns_elapsed
    }

    /// Reads local memory without going through the bank.
    pub fn peek(&self, addr: Word) -> Option<Word> {
        self.memory.read_addr(addr)
    }

    /// The `depth` words on top of the stack held in `reg`.
    pub fn stack(&self, reg: Reg, depth: usize) -> Vec<(Word, Word)> {
        let top = self.regs.r[reg];
        (0..depth as Word)
            .map(|i| top.wrapping_add(i))
            .filter_map(|addr| self.peek(addr).map(|w| (addr, w)))
            .collect()
    }

    pub fn step(&mut self) -> State {
        if self.state != State::Running {
            return self.state;
        }

        let then = std::time::Instant::now();

        let pc = self.regs.pc;
        let word = match self.memory.read_addr(pc) {
            Some(word) => word,
            None => {
                self.abort(Fault::Fetch(pc));
                return self.state;
            }
        };

        let inst = Inst::decode(word);
        self.instructions += 1;
        log::trace!("{:#06X}: {:#06X}  {}", pc, word, inst);

        if inst.is_halt() {
            self.state = State::Halted;
        } else {
            self.exec(&inst);
        }

        self.real_ns_elapsed += then.elapsed().as_nanos();

        if self.state == State::Halted {
            log::info!(
                "HALT: {} instructions in {}ms",
                self.instructions,
                self.real_ns_elapsed / 1000 / 1000
            );
        }

        self.state
    }

    pub fn run(&mut self, max_instructions: Option<u64>) -> State {
        let then = self.instructions;

        while self.state == State::Running {
            if let Some(max_instructions) = max_instructions {
                if self.instructions - then >= max_instructions {
                    return State::Timeout;
                }
            }

            self.step();
        }

        self.state
    }

    fn abort(&mut self, fault: Fault) {
        log::error!("ABORT: {}", fault);
        self.fault = Some(fault);
        self.state = State::Aborted;
    }

    fn exec(&mut self, inst: &Inst) {
        let ops = *inst.operands();
        let src = self.source_value(&ops);

        let (result, flags) = match inst {
            Inst::Copy(_) => (src, self.regs.flags),
            Inst::Compute(op, _) => {
                let dst = self.destination_value(&ops);
                let res = alu::eval(*op, src, dst, self.regs.overflow, self.regs.signed_mode());
                self.regs.flags = res.flags;
                self.regs.overflow = res.spill;
                (res.val, res.flags)
            }
        };

        let mut pc_modified = false;
        if ops.effect.commits(inst.class(), flags) {
            pc_modified = self.store(&ops, result);

            if let (true, Source::Mem(r)) = (ops.is_pop(), ops.src) {
                self.regs.r[r] = self.regs.r[r].wrapping_add(1);
            }
        }

        if !pc_modified {
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
    }

    fn source_value(&mut self, ops: &Operands) -> Word {
        let imm = ops.src_imm as Word;
        match ops.src {
            Source::Pc => self.regs.pc.wrapping_add(imm),
            Source::Mem(r) => {
                let addr = self.regs.r[r].wrapping_add(imm);
                self.read_mem(self.id(), addr, false)
            }
            Source::Imm => imm,
            Source::Reg(r) => self.regs.r[r].wrapping_add(imm),
        }
    }

    fn destination_value(&mut self, ops: &Operands) -> Word {
        match ops.dst {
            Destination::Pc => self.regs.pc,
            Destination::Mem(r) => {
                let addr = self.regs.r[r].wrapping_add(ops.dst_imm as Word);
                self.read_mem(self.id(), addr, false)
            }
            Destination::Control => self.regs.control,
            Destination::Reg(r) => self.regs.r[r],
        }
    }

    /// Returns whether the program counter was written.
    fn store(&mut self, ops: &Operands, val: Word) -> bool {
        match ops.dst {
            Destination::Pc => {
                // Nothing can ever break out of a jump to itself, unless the
                // target was read from memory.
                if val == self.regs.pc && ops.effect == Effect::Always && !ops.src.is_mem() {
                    self.state = State::Halted;
                }
                self.regs.pc = val;
                return true;
            }
            Destination::Mem(r) => {
                if ops.push {
                    self.regs.r[r] = self.regs.r[r].wrapping_sub(1);
                }
                let addr = self.regs.r[r].wrapping_add(ops.dst_imm as Word);
                self.write_mem(self.id(), addr, val);
            }
            Destination::Control => self.regs.control = val,
            Destination::Reg(r) => self.regs.r[r] = val,
        }

        false
    }

    fn route(&self, addr: Word) -> Route {
        if !self.regs.is_banked(addr) {
            return Route::Local;
        }

        match addr >> 12 {
            0 => Route::Control(((addr >> 4) & 0xFF) as usize, (addr & 0xF) as usize),
            n => Route::Window(n as usize),
        }
    }

    fn peer(&self, bank_index: usize) -> Option<&Handle<dyn Device>> {
        bank_index.checked_sub(1).and_then(|idx| self.peers.get(idx))
    }
}

impl Device for Processor {
    fn control(&self) -> &ControlBlock {
        &self.control
    }

    fn control_mut(&mut self) -> &mut ControlBlock {
        &mut self.control
    }

    fn memory(&self) -> &Memory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    fn on_control_read(&mut self, index: usize) {
        let val = match index {
            remote::PC => self.regs.pc,
            remote::R1..=remote::R3 => self.regs.r[reg_of(index)],
            remote::FLAGS => self.regs.flags.bits(),
            remote::CONTROL => self.regs.control,
            _ => return,
        };
        self.control.set(index, val);
    }

    fn on_control_write(&mut self, index: usize, value: Word) {
        match index {
            remote::PC => {
                // A controller restarts a stopped processor by pointing it somewhere.
                self.regs.pc = value;
                self.state = State::Running;
                self.fault = None;
            }
            remote::R1..=remote::R3 => self.regs.r[reg_of(index)] = value,
            remote::FLAGS => self.regs.flags = Flags::from_bits_truncate(value),
            remote::CONTROL => self.regs.control = value,
            _ => (),
        }
    }

    fn read_mem(&mut self, requester: Word, addr: Word, force_local: bool) -> Word {
        let id = self.id();
        if requester == id && !force_local {
            match self.route(addr) {
                Route::Local => (),
                Route::Control(0, idx) => return self.read_control(id, idx),
                Route::Control(dev, idx) => {
                    return self
                        .peer(dev)
                        .map(|h| h.rc.borrow_mut().read_control(id, idx))
                        .unwrap_or(0)
                }
                Route::Window(dev) => {
                    return self
                        .peer(dev)
                        .map(|h| h.rc.borrow_mut().read_mem(id, addr, false))
                        .unwrap_or(0)
                }
            }
        }

        self.resolve(requester, addr)
            .and_then(|(page, offset)| self.memory.read(page, offset))
            .unwrap_or(0)
    }

    fn write_mem(&mut self, requester: Word, addr: Word, value: Word) {
        let id = self.id();
        if requester == id {
            match self.route(addr) {
                Route::Local => (),
                Route::Control(0, idx) => return self.write_control(id, idx, value),
                Route::Control(dev, idx) => {
                    if let Some(h) = self.peer(dev) {
                        h.rc.borrow_mut().write_control(id, idx, value);
                    }
                    return;
                }
                Route::Window(dev) => {
                    if let Some(h) = self.peer(dev) {
                        h.rc.borrow_mut().write_mem(id, addr, value);
                    }
                    return;
                }
            }
        }

        if let Some((page, offset)) = self.resolve(requester, addr) {
            self.memory.write(page, offset, value);
        }
    }
}

fn reg_of(index: usize) -> Reg {
    match index - remote::R1 {
        0 => Reg::R1,
        1 => Reg::R2,
        _ => Reg::R3,
    }
}

impl Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.regs)
    }
}

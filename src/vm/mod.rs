mod alu;
mod instance;
mod io;
mod mem;
mod reg;

pub use alu::{eval, OpResult};
pub use instance::{remote, Fault, Processor, State, DEFAULT_PAGES};
pub use io::dev::block::{self, BlockMemory};
pub use io::{word, AccessMasks, ControlBlock, Device, DeviceType, Handle};
pub use mem::{LoadError, Memory, Page};
pub use reg::Registers;

pub mod dev;
pub mod types;

pub use types::{word, AccessMasks, ControlBlock, Device, DeviceType, Handle};

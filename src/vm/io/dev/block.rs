use crate::spec::types::hw::Word;
use crate::vm::{
    io::types::{ControlBlock, Device, DeviceType},
    mem::Memory,
};

/// Control word reporting the number of pages the device holds.
pub const PAGE_COUNT: usize = 0x6;

/// Plain paged storage which a bound controller reaches through its banked
/// window.
pub struct BlockMemory {
    control: ControlBlock,
    memory: Memory,
}

impl BlockMemory {
    pub fn new(id: Word, pages: usize) -> Self {
        let mut control = ControlBlock::new(id, DeviceType::BlockMemory);
        control.masks.external_read |= 1 << PAGE_COUNT;
        control.masks.privileged_read |= 1 << PAGE_COUNT;
        BlockMemory {
            control,
            memory: Memory::new(pages, 0),
        }
    }
}

impl Device for BlockMemory {
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
        if index == PAGE_COUNT {
            let pages = self.memory.page_count() as Word;
            self.control.set(PAGE_COUNT, pages);
        }
    }
}

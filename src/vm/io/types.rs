use crate::spec::types::hw::*;
use crate::vm::mem::Memory;
use derive_more::Display;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::{cell::RefCell, rc::Rc};

/// Well-known words of every control block.
pub mod word {
    pub const ID: usize = 0x0;
    pub const TYPE: usize = 0x1;
    pub const BOUND: usize = 0x2;
    pub const ACCESSED_PAGE: usize = 0x3;
    pub const STATUS: usize = 0x4;
    pub const HANDLER: usize = 0x5;
}

const CONTROL_INDEX_MASK: usize = CONTROL_WORDS - 1;
const WINDOW_PAGES_MASK: Word = 0x0F;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum DeviceType {
    Invalid = 0,
    Processor = 1,
    BlockMemory = 2,
    BlockIo = 3,
    Serial = 4,
    Hid = 5,
    Terminal = 6,
}

/// Bit `i` of each mask grants access to control word `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessMasks {
    pub external_read: Word,
    pub privileged_read: Word,
    pub privileged_write: Word,
    pub internal_write: Word,
}

impl Default for AccessMasks {
    fn default() -> Self {
        AccessMasks {
            external_read: 0x003F,
            privileged_read: 0x003F,
            privileged_write: 0x002C,
            internal_write: 0x0030,
        }
    }
}

fn allows(mask: Word, index: usize) -> bool {
    mask & (1 << index) != 0
}

pub struct ControlBlock {
    words: [Word; CONTROL_WORDS],
    pub masks: AccessMasks,
}

impl ControlBlock {
    pub fn new(id: Word, typ: DeviceType) -> Self {
        let mut words = [0; CONTROL_WORDS];
        words[word::ID] = id;
        words[word::TYPE] = typ as Word;
        ControlBlock {
            words,
            masks: AccessMasks::default(),
        }
    }

    pub fn get(&self, index: usize) -> Word {
        self.words[index & CONTROL_INDEX_MASK]
    }

    /// Writes without any access checks.
    pub fn set(&mut self, index: usize, val: Word) {
        self.words[index & CONTROL_INDEX_MASK] = val;
    }

    pub fn id(&self) -> Word {
        self.words[word::ID]
    }

    pub fn device_type(&self) -> DeviceType {
        DeviceType::from_u16(self.words[word::TYPE] & 0xFF).unwrap_or(DeviceType::Invalid)
    }

    pub fn bank_index(&self) -> Word {
        self.words[word::TYPE] >> BYTE_WIDTH
    }

    pub fn set_bank_index(&mut self, idx: Word) {
        let typ = self.words[word::TYPE] & 0xFF;
        self.words[word::TYPE] = (idx << BYTE_WIDTH) | typ;
    }

    /// The id of the controlling device, 0 when unbound.
    pub fn bound(&self) -> Word {
        self.words[word::BOUND]
    }

    pub fn accessed_page(&self) -> Word {
        self.words[word::ACCESSED_PAGE]
    }

    fn is_privileged(&self, requester: Word) -> bool {
        requester == self.id() || (requester != 0 && requester == self.bound())
    }
}

/// Anything that sits on the bank: owns local pages and a control block, and
/// lets other devices in through the access rules below.
pub trait Device {
    fn control(&self) -> &ControlBlock;
    fn control_mut(&mut self) -> &mut ControlBlock;
    fn memory(&self) -> &Memory;
    fn memory_mut(&mut self) -> &mut Memory;

    /// Called before a permitted control word is handed out.
    fn on_control_read(&mut self, _index: usize) {}

    /// Called after a permitted external write to a control word.
    fn on_control_write(&mut self, _index: usize, _value: Word) {}

    fn read_control(&mut self, requester: Word, index: usize) -> Word {
        let index = index & CONTROL_INDEX_MASK;
        let ctl = self.control();
        let mask = if ctl.is_privileged(requester) {
            ctl.masks.privileged_read
        } else {
            ctl.masks.external_read
        };

        if index != word::ID && !allows(mask, index) {
            return 0;
        }

        self.on_control_read(index);
        self.control().get(index)
    }

    fn write_control(&mut self, requester: Word, index: usize, value: Word) {
        let index = index & CONTROL_INDEX_MASK;
        if index == word::ID {
            return;
        }

        let ctl = self.control_mut();
        if requester == ctl.id() {
            if allows(ctl.masks.internal_write, index) {
                ctl.set(index, value);
            }
            return;
        }

        if requester == 0 {
            return;
        }

        if ctl.bound() == 0 {
            ctl.set(word::BOUND, requester);
        }

        if ctl.bound() != requester {
            return;
        }

        // The controller may always let go, or hand over to another device.
        if index == word::BOUND || allows(ctl.masks.privileged_write, index) {
            ctl.set(index, value);
            self.on_control_write(index, value);
        }
    }

    /// Where `addr` lands in local memory for `requester`. The device itself
    /// sees its pages directly, its controller sees a 16-page window starting
    /// at the accessed page.
    fn resolve(&self, requester: Word, addr: Word) -> Option<(usize, usize)> {
        let ctl = self.control();
        if requester == ctl.id() {
            Some((page_of(addr), offset_in_page(addr)))
        } else if ctl.is_privileged(requester) {
            let page = ctl.accessed_page() + ((addr >> PAGE_SHIFT) & WINDOW_PAGES_MASK);
            Some((page as usize, offset_in_page(addr)))
        } else {
            None
        }
    }

    fn read_mem(&mut self, requester: Word, addr: Word, _force_local: bool) -> Word {
        self.resolve(requester, addr)
            .and_then(|(page, offset)| self.memory().read(page, offset))
            .unwrap_or(0)
    }

    fn write_mem(&mut self, requester: Word, addr: Word, value: Word) {
        if let Some((page, offset)) = self.resolve(requester, addr) {
            self.memory_mut().write(page, offset, value);
        }
    }
}

pub struct Handle<T: Device + ?Sized> {
    pub rc: Rc<RefCell<T>>,
}

impl<T: Device + ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Handle {
            rc: self.rc.clone(),
        }
    }
}

impl<T: Device> Handle<T> {
    pub fn new(dev: T) -> Self {
        Handle {
            rc: Rc::new(RefCell::new(dev)),
        }
    }
}

impl<T: Device + 'static> Handle<T> {
    pub fn erase(&self) -> Handle<dyn Device> {
        let rc: Rc<RefCell<dyn Device>> = self.rc.clone();
        Handle { rc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWN: Word = 0x10;
    const CTRL: Word = 0x20;
    const OTHER: Word = 0x30;

    /// Records which hooks fired.
    struct Recorder {
        control: ControlBlock,
        memory: Memory,
        reads: Vec<usize>,
        writes: Vec<(usize, Word)>,
    }

    impl Recorder {
        fn new() -> Self {
            Recorder {
                control: ControlBlock::new(OWN, DeviceType::Serial),
                memory: Memory::new(4, 0),
                reads: vec![],
                writes: vec![],
            }
        }
    }

    impl Device for Recorder {
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
            self.reads.push(index);
        }

        fn on_control_write(&mut self, index: usize, value: Word) {
            self.writes.push((index, value));
        }
    }

    #[test]
    fn first_writer_binds() {
        let mut dev = Recorder::new();
        dev.write_control(CTRL, word::ACCESSED_PAGE, 2);
        assert_eq!(dev.control().bound(), CTRL);
        assert_eq!(dev.control().accessed_page(), 2);
        assert_eq!(dev.writes, vec![(word::ACCESSED_PAGE, 2)]);

        dev.write_control(OTHER, word::ACCESSED_PAGE, 3);
        assert_eq!(dev.control().accessed_page(), 2);
        assert_eq!(dev.writes.len(), 1);

        dev.write_control(CTRL, word::BOUND, 0);
        dev.write_control(OTHER, word::ACCESSED_PAGE, 3);
        assert_eq!(dev.control().bound(), OTHER);
        assert_eq!(dev.control().accessed_page(), 3);
    }

    #[test]
    fn masks_gate_writes() {
        let mut dev = Recorder::new();
        dev.write_control(CTRL, word::TYPE, 0xFFFF);
        assert_eq!(dev.control().device_type(), DeviceType::Serial);
        assert!(dev.writes.is_empty());

        dev.write_control(OWN, word::STATUS, 0xAA);
        assert_eq!(dev.control().get(word::STATUS), 0xAA);
        assert!(dev.writes.is_empty());

        dev.write_control(OWN, word::ACCESSED_PAGE, 1);
        assert_eq!(dev.control().accessed_page(), 0);

        dev.write_control(CTRL, word::ID, 0x99);
        assert_eq!(dev.control().id(), OWN);
    }

    #[test]
    fn reads_are_gated_and_hooked() {
        let mut dev = Recorder::new();
        dev.control_mut().set(0x9, 0x1234);
        dev.control_mut().masks.privileged_read |= 1 << 0x9;

        assert_eq!(dev.read_control(OTHER, 0x9), 0);
        assert!(dev.reads.is_empty());

        dev.write_control(CTRL, word::HANDLER, 0x40);
        assert_eq!(dev.read_control(CTRL, 0x9), 0x1234);
        assert_eq!(dev.read_control(OTHER, word::ID), OWN);
        assert_eq!(dev.read_control(OTHER, word::HANDLER), 0x40);
        assert_eq!(dev.reads, vec![0x9, word::ID, word::HANDLER]);
    }

    #[test]
    fn controller_sees_a_window() {
        let mut dev = Recorder::new();
        dev.write_mem(OWN, 0x0205, 0xBEEF);
        assert_eq!(dev.read_mem(CTRL, 0x0005, false), 0);

        dev.write_control(CTRL, word::ACCESSED_PAGE, 2);
        assert_eq!(dev.read_mem(CTRL, 0x3005, false), 0xBEEF);
        dev.write_mem(CTRL, 0x1101, 7);
        assert_eq!(dev.read_mem(OWN, 0x0301, true), 7);

        assert_eq!(dev.read_mem(OTHER, 0x0005, false), 0);
        dev.write_mem(OTHER, 0x0005, 1);
        assert_eq!(dev.read_mem(OWN, 0x0205, true), 0xBEEF);
    }

    #[test]
    fn bank_index_shares_the_type_word() {
        let mut ctl = ControlBlock::new(OWN, DeviceType::BlockMemory);
        ctl.set_bank_index(3);
        assert_eq!(ctl.get(word::TYPE), 0x0302);
        assert_eq!(ctl.bank_index(), 3);
        assert_eq!(ctl.device_type(), DeviceType::BlockMemory);
    }
}

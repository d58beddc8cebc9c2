//! Recording MMIO port for unit tests.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::mmio::MmioPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(usize, u32),
    Write(usize, u32),
}

/// Plain register file: reads return the last value written (or the
/// programmed value), every access is logged.
#[derive(Default)]
pub struct MockMmio {
    regs: RefCell<BTreeMap<usize, u32>>,
    log: RefCell<Vec<Access>>,
}

impl MockMmio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presets a register without logging an access.
    pub fn program(&self, offset: usize, val: u32) {
        self.regs.borrow_mut().insert(offset, val);
    }

    pub fn peek(&self, offset: usize) -> u32 {
        self.regs.borrow().get(&offset).copied().unwrap_or(0)
    }

    pub fn accesses(&self) -> Vec<Access> {
        self.log.borrow().clone()
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.log
            .borrow()
            .iter()
            .filter_map(|a| match *a {
                Access::Write(offset, val) => Some((offset, val)),
                Access::Read(..) => None,
            })
            .collect()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn is_untouched(&self) -> bool {
        self.log.borrow().is_empty()
    }
}

impl MmioPort for MockMmio {
    fn read32(&self, offset: usize) -> u32 {
        let val = self.peek(offset);
        self.log.borrow_mut().push(Access::Read(offset, val));
        val
    }

    fn write32(&self, offset: usize, val: u32) {
        self.regs.borrow_mut().insert(offset, val);
        self.log.borrow_mut().push(Access::Write(offset, val));
    }
}

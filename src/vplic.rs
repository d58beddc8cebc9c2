//! Behavioural model of an `rv_plic` register file.
//!
//! [`VirtPlic`] implements the claim/complete handshake and the gateway the
//! way the hardware does. It backs the driver in tests and can be handed
//! to a hypervisor as an emulated interrupt controller.

use axaddrspace::device::AccessWidth;
use axaddrspace::{GuestPhysAddr, GuestPhysAddrRange};
use axdevice_base::{BaseDeviceOps, EmuDeviceType};
use axerrno::{AxError, AxResult};
use bitmaps::Bitmap;
use log::{trace, warn};
use spin::Mutex;

use crate::consts::{PLIC_MAX_SOURCES, PLIC_REG_BITS};
use crate::geometry::Geometry;
use crate::mmio::MmioPort;
use crate::{IrqId, TargetId};

/// Number of targets the model can hold.
pub const VPLIC_MAX_TARGETS: usize = 16;

const MAX_WORDS: usize = PLIC_MAX_SOURCES / PLIC_REG_BITS;

/// A decoded register offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reg {
    Priority(usize),
    Pending(usize),
    Enable(usize, usize),
    Threshold(usize),
    ClaimComplete(usize),
    Msip(usize),
    Unmapped,
}

pub struct VirtPlic {
    /// Guest physical address the model is mapped at.
    pub addr: GuestPhysAddr,
    pub geometry: &'static Geometry,
    inner: Mutex<VirtPlicInner>,
}

struct VirtPlicInner {
    priority: [u32; PLIC_MAX_SOURCES],
    /// Latched by the gateway, cleared by a claim.
    pending: Bitmap<PLIC_MAX_SOURCES>,
    /// Claimed and not yet completed.
    claimed: Bitmap<PLIC_MAX_SOURCES>,
    /// Current level of each interrupt line.
    level: Bitmap<PLIC_MAX_SOURCES>,
    enable: [[u32; MAX_WORDS]; VPLIC_MAX_TARGETS],
    threshold: [u32; VPLIC_MAX_TARGETS],
    msip: [bool; VPLIC_MAX_TARGETS],
}

impl VirtPlicInner {
    fn new() -> Self {
        Self {
            priority: [0; PLIC_MAX_SOURCES],
            pending: Bitmap::new(),
            claimed: Bitmap::new(),
            level: Bitmap::new(),
            enable: [[0; MAX_WORDS]; VPLIC_MAX_TARGETS],
            threshold: [0; VPLIC_MAX_TARGETS],
            msip: [false; VPLIC_MAX_TARGETS],
        }
    }

    fn enabled(&self, target: usize, source: usize) -> bool {
        let word = self.enable[target][source / PLIC_REG_BITS];
        word & (1 << (source % PLIC_REG_BITS)) != 0
    }

    /// Highest-priority pending source that `target` may claim. Ties go to
    /// the lowest ID.
    fn best_candidate(&self, num_sources: usize, target: usize) -> Option<usize> {
        let mut best = None;
        let mut best_prio = self.threshold[target];
        let mut next = self.pending.first_index();
        while let Some(source) = next {
            if source >= num_sources {
                break;
            }
            let prio = self.priority[source];
            if source != 0 && prio > best_prio && self.enabled(target, source) {
                best = Some(source);
                best_prio = prio;
            }
            next = self.pending.next_index(source);
        }
        best
    }

    fn claim(&mut self, num_sources: usize, target: usize) -> u32 {
        match self.best_candidate(num_sources, target) {
            Some(source) => {
                self.pending.set(source, false);
                self.claimed.set(source, true);
                source as u32
            }
            None => 0,
        }
    }

    fn complete(&mut self, num_sources: usize, source: usize) {
        if source == 0 || source >= num_sources || !self.claimed.get(source) {
            trace!("vPlic: ignoring completion of unclaimed source {source}");
            return;
        }
        self.claimed.set(source, false);
        // Gateway reopens: a line still held high is pending again.
        if self.level.get(source) {
            self.pending.set(source, true);
        }
    }

    fn pending_word(&self, word: usize) -> u32 {
        let start = word * PLIC_REG_BITS;
        let mut val = 0;
        for i in 0..PLIC_REG_BITS {
            if self.pending.get(start + i) {
                val |= 1 << i;
            }
        }
        val
    }
}

impl VirtPlic {
    pub fn new(addr: GuestPhysAddr, geometry: &'static Geometry) -> AxResult<Self> {
        geometry.validate()?;
        if geometry.num_targets() > VPLIC_MAX_TARGETS {
            return Err(AxError::InvalidInput);
        }
        Ok(Self {
            addr,
            geometry,
            inner: Mutex::new(VirtPlicInner::new()),
        })
    }

    fn check_source(&self, source: IrqId) -> AxResult<usize> {
        let source = source as usize;
        if source == 0 || source >= self.geometry.num_sources() {
            return Err(AxError::InvalidInput);
        }
        Ok(source)
    }

    fn check_target(&self, target: TargetId) -> AxResult<usize> {
        let target = target as usize;
        if target >= self.geometry.num_targets() {
            return Err(AxError::InvalidInput);
        }
        Ok(target)
    }

    /// Drives the interrupt line of `source`. A rising line sets the
    /// pending bit unless the source is currently claimed.
    pub fn set_level(&self, source: IrqId, high: bool) -> AxResult {
        let source = self.check_source(source)?;
        let mut inner = self.inner.lock();
        inner.level.set(source, high);
        if high && !inner.claimed.get(source) {
            inner.pending.set(source, true);
        }
        Ok(())
    }

    /// One edge on the line of `source`: pending stays latched after the
    /// line drops.
    pub fn pulse(&self, source: IrqId) -> AxResult {
        self.set_level(source, true)?;
        self.set_level(source, false)
    }

    /// Whether the external interrupt output of `target` is asserted, i.e.
    /// a claim would return a non-zero ID.
    pub fn irq_line(&self, target: TargetId) -> AxResult<bool> {
        let target = self.check_target(target)?;
        let inner = self.inner.lock();
        Ok(inner
            .best_candidate(self.geometry.num_sources(), target)
            .is_some())
    }

    /// Whether the software interrupt output of `target` is asserted.
    pub fn software_line(&self, target: TargetId) -> AxResult<bool> {
        let target = self.check_target(target)?;
        Ok(self.inner.lock().msip[target])
    }

    pub fn is_claimed(&self, source: IrqId) -> bool {
        let source = source as usize;
        source < self.geometry.num_sources() && self.inner.lock().claimed.get(source)
    }

    fn decode(&self, offset: usize) -> Reg {
        let g = self.geometry;
        let map = &g.map;
        if offset % 4 != 0 {
            return Reg::Unmapped;
        }
        if offset >= map.msip {
            let rel = offset - map.msip;
            let target = rel / map.msip_stride;
            if rel % map.msip_stride == 0 && target < g.num_targets() {
                return Reg::Msip(target);
            }
            return Reg::Unmapped;
        }
        if offset >= map.threshold {
            let rel = offset - map.threshold;
            let target = rel / map.context_stride;
            if target >= g.num_targets() {
                return Reg::Unmapped;
            }
            return match rel % map.context_stride {
                0 => Reg::Threshold(target),
                local if local == map.claim_complete - map.threshold => {
                    Reg::ClaimComplete(target)
                }
                _ => Reg::Unmapped,
            };
        }
        if offset >= map.enable {
            let rel = offset - map.enable;
            let target = rel / map.enable_stride;
            let word = (rel % map.enable_stride) / 4;
            if target < g.num_targets() && word < g.multireg_count() {
                return Reg::Enable(target, word);
            }
            return Reg::Unmapped;
        }
        if offset >= map.pending {
            let word = (offset - map.pending) / 4;
            if word < g.multireg_count() {
                return Reg::Pending(word);
            }
            return Reg::Unmapped;
        }
        if offset >= map.priority {
            let source = (offset - map.priority) / 4;
            if source < g.num_sources() {
                return Reg::Priority(source);
            }
        }
        Reg::Unmapped
    }

    /// Bits of enable word `word` that map to existing sources.
    fn enable_mask(&self, word: usize) -> u32 {
        let remaining = self.geometry.num_sources() - word * PLIC_REG_BITS;
        if remaining >= PLIC_REG_BITS {
            u32::MAX
        } else {
            (1 << remaining) - 1
        }
    }

    fn read_reg(&self, offset: usize) -> u32 {
        let num_sources = self.geometry.num_sources();
        let mut inner = self.inner.lock();
        let val = match self.decode(offset) {
            Reg::Priority(source) => inner.priority[source],
            Reg::Pending(word) => inner.pending_word(word),
            Reg::Enable(target, word) => inner.enable[target][word],
            Reg::Threshold(target) => inner.threshold[target],
            Reg::ClaimComplete(target) => inner.claim(num_sources, target),
            Reg::Msip(target) => inner.msip[target] as u32,
            Reg::Unmapped => {
                warn!("vPlic: read of unmapped offset {offset:#x}");
                0
            }
        };
        trace!("vPlic read reg {offset:#x} -> {val:#x}");
        val
    }

    fn write_reg(&self, offset: usize, val: u32) {
        trace!("vPlic write reg {offset:#x} val {val:#x}");
        let num_sources = self.geometry.num_sources();
        let prio_mask = self.geometry.priority_mask();
        let mut inner = self.inner.lock();
        match self.decode(offset) {
            Reg::Priority(source) => inner.priority[source] = val & prio_mask,
            // Read-only, only the gateway and claims change pending bits.
            Reg::Pending(_) => {}
            Reg::Enable(target, word) => {
                inner.enable[target][word] = val & self.enable_mask(word);
            }
            Reg::Threshold(target) => inner.threshold[target] = val & prio_mask,
            Reg::ClaimComplete(_) => inner.complete(num_sources, val as usize),
            Reg::Msip(target) => inner.msip[target] = val & 1 != 0,
            Reg::Unmapped => warn!("vPlic: write of unmapped offset {offset:#x}"),
        }
    }
}

impl MmioPort for VirtPlic {
    fn read32(&self, offset: usize) -> u32 {
        self.read_reg(offset)
    }

    fn write32(&self, offset: usize, val: u32) {
        self.write_reg(offset, val)
    }
}

impl BaseDeviceOps<GuestPhysAddrRange> for VirtPlic {
    fn emu_type(&self) -> EmuDeviceType {
        EmuDeviceType::InterruptController
    }

    fn address_range(&self) -> GuestPhysAddrRange {
        GuestPhysAddrRange::from_start_size(self.addr, self.geometry.map.size)
    }

    fn handle_read(&self, addr: GuestPhysAddr, width: AccessWidth) -> AxResult<usize> {
        if width != AccessWidth::Dword {
            return Err(AxError::Unsupported);
        }
        Ok(self.read_reg(addr - self.addr) as usize)
    }

    fn handle_write(&self, addr: GuestPhysAddr, width: AccessWidth, val: usize) -> AxResult {
        if width != AccessWidth::Dword {
            return Err(AxError::Unsupported);
        }
        self.write_reg(addr - self.addr, val as u32);
        Ok(())
    }
}

use axaddrspace::{HostPhysAddr, HostVirtAddr};

/// 32-bit register access at an offset from a device's base address.
///
/// Accesses have side effects and must reach the device in program order;
/// implementations must not cache or merge them.
pub trait MmioPort {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, val: u32);
}

impl<P: MmioPort + ?Sized> MmioPort for &P {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, val: u32) {
        (**self).write32(offset, val)
    }
}

/// A mapped register window accessed with volatile loads and stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmioRegion {
    base: HostVirtAddr,
}

impl MmioRegion {
    /// # Safety
    ///
    /// `base` must map the device's whole register window for as long as
    /// the region (or any copy of it) is used.
    pub const unsafe fn new(base: HostVirtAddr) -> Self {
        Self { base }
    }

    /// Maps a host physical base address through the hypervisor's linear
    /// mapping.
    ///
    /// Only usable inside a hypervisor that implements the `axvisor_api`
    /// memory interface; the translation is resolved at link time against
    /// that implementation. Without one, map the window yourself and use
    /// [`MmioRegion::new`].
    ///
    /// # Safety
    ///
    /// Same as [`MmioRegion::new`].
    pub unsafe fn from_phys(base: HostPhysAddr) -> Self {
        Self {
            base: axvisor_api::memory::phys_to_virt(base),
        }
    }

    pub const fn base(&self) -> HostVirtAddr {
        self.base
    }

    fn reg(&self, offset: usize) -> *mut u32 {
        (self.base.as_usize() + offset) as *mut u32
    }
}

impl MmioPort for MmioRegion {
    fn read32(&self, offset: usize) -> u32 {
        // SAFETY: the constructor's contract guarantees the window is mapped.
        unsafe { self.reg(offset).read_volatile() }
    }

    fn write32(&self, offset: usize, val: u32) {
        // SAFETY: see `read32`.
        unsafe { self.reg(offset).write_volatile(val) }
    }
}

//! Driver for the RISC-V `rv_plic` Platform-Level Interrupt Controller.
//!
//! [`Plic`] programs a controller through an [`MmioPort`]: priorities,
//! per-target enables and thresholds, the claim/complete handshake and the
//! per-target software interrupt. Register locations come from a
//! [`Geometry`] table, [`Geometry::TOP_EARLGREY`] for the reference
//! instantiation.
//!
//! [`VirtPlic`] is a behavioural model of the same register file. It can
//! stand in for the hardware behind a [`Plic`] or be mapped into a guest as
//! an emulated device.
#![cfg_attr(not(test), no_std)]

mod consts;
mod geometry;
mod mmio;
mod multireg;
mod plic;
pub mod vplic;

#[cfg(test)]
mod mock;

pub use consts::*;
pub use geometry::{Geometry, PlicParams, RegisterMap};
pub use mmio::{MmioPort, MmioRegion};
pub use multireg::{BitLocation, RegFamily};
pub use plic::Plic;
pub use vplic::VirtPlic;

/// Interrupt source ID. 0 is reserved and means "no interrupt".
pub type IrqId = u32;

/// Index of an interrupt target (a hart context).
pub type TargetId = u32;

/// Source priority or target threshold.
pub type Priority = u32;

/// On/off switch for enable bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Enabled,
    Disabled,
}

impl From<bool> for Toggle {
    fn from(enabled: bool) -> Self {
        if enabled {
            Toggle::Enabled
        } else {
            Toggle::Disabled
        }
    }
}

impl From<Toggle> for bool {
    fn from(toggle: Toggle) -> Self {
        toggle == Toggle::Enabled
    }
}

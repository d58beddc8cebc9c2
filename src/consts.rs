// Register table of the top_earlgrey `rv_plic` instance, as emitted by the
// hardware generator. Offsets are relative to the PLIC base address.

/// Architectural ceiling on interrupt sources (PLIC 1.0), source 0 included.
pub const PLIC_MAX_SOURCES: usize = 1024;

/// Architectural ceiling on targets (PLIC 1.0 contexts).
pub const PLIC_MAX_TARGETS: usize = 15872;

/// Width of every PLIC register, in bits.
pub const PLIC_REG_BITS: usize = 32;

/// Number of interrupt sources, source 0 ("no interrupt") included.
pub const RV_PLIC_PARAM_NUM_SRC: usize = 181;

/// Number of targets (interrupt consumer contexts).
pub const RV_PLIC_PARAM_NUM_TARGET: usize = 1;

/// Highest programmable priority.
pub const RV_PLIC_PARAM_MAX_PRIO: u32 = 3;

// --- Register Offsets (relative to RV_PLIC_BASE) ---

/// Priority register of source 0. Source N lives at `PRIO0 + N * 4`.
pub const RV_PLIC_PRIO0_REG_OFFSET: usize = 0x000000;

/// First pending word (sources 0–31). Word W covers sources [W*32, W*32+31].
pub const RV_PLIC_IP_0_REG_OFFSET: usize = 0x001000;

/// First enable word of target 0.
/// Target T starts at `IE0_0 + T * RV_PLIC_IE_TARGET_STRIDE`.
pub const RV_PLIC_IE0_0_REG_OFFSET: usize = 0x002000;

/// 32 words per target, 1024 bits.
pub const RV_PLIC_IE_TARGET_STRIDE: usize = 0x80;

/// Threshold register of target 0.
pub const RV_PLIC_THRESHOLD0_REG_OFFSET: usize = 0x200000;

/// Claim/complete register of target 0.
pub const RV_PLIC_CC0_REG_OFFSET: usize = 0x200004;

/// Threshold and claim/complete of consecutive targets are 4K apart.
pub const RV_PLIC_TARGET_STRIDE: usize = 0x1000;

/// Software interrupt pending register of target 0.
pub const RV_PLIC_MSIP0_REG_OFFSET: usize = 0x4000000;

pub const RV_PLIC_MSIP_TARGET_STRIDE: usize = 0x4;

/// Size of the register window.
pub const RV_PLIC_REGION_SIZE: usize = 0x8000000;

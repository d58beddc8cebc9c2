use axerrno::{AxError, AxResult};

use crate::consts::*;
use crate::multireg::RegFamily;

/// Instantiation parameters of a PLIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlicParams {
    /// Number of sources, source 0 included.
    pub num_sources: usize,
    /// Number of targets.
    pub num_targets: usize,
    /// Highest programmable priority (and threshold).
    pub max_priority: u32,
}

/// Base offsets and per-target strides of every register family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    pub priority: usize,
    pub pending: usize,
    pub enable: usize,
    pub enable_stride: usize,
    pub threshold: usize,
    pub claim_complete: usize,
    pub context_stride: usize,
    pub msip: usize,
    pub msip_stride: usize,
    /// Size of the whole register window.
    pub size: usize,
}

/// Register geometry of one PLIC instantiation.
///
/// This is the table the hardware generator produces, in data form. The
/// accessors below do not range-check their arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub params: PlicParams,
    pub map: RegisterMap,
}

impl Geometry {
    /// The top_earlgrey instance: 181 sources, one target, priorities 0..=3.
    pub const TOP_EARLGREY: Geometry = Geometry::new(
        PlicParams {
            num_sources: RV_PLIC_PARAM_NUM_SRC,
            num_targets: RV_PLIC_PARAM_NUM_TARGET,
            max_priority: RV_PLIC_PARAM_MAX_PRIO,
        },
        RegisterMap {
            priority: RV_PLIC_PRIO0_REG_OFFSET,
            pending: RV_PLIC_IP_0_REG_OFFSET,
            enable: RV_PLIC_IE0_0_REG_OFFSET,
            enable_stride: RV_PLIC_IE_TARGET_STRIDE,
            threshold: RV_PLIC_THRESHOLD0_REG_OFFSET,
            claim_complete: RV_PLIC_CC0_REG_OFFSET,
            context_stride: RV_PLIC_TARGET_STRIDE,
            msip: RV_PLIC_MSIP0_REG_OFFSET,
            msip_stride: RV_PLIC_MSIP_TARGET_STRIDE,
            size: RV_PLIC_REGION_SIZE,
        },
    );

    pub const fn new(params: PlicParams, map: RegisterMap) -> Self {
        Self { params, map }
    }

    /// Same register map as [`Geometry::TOP_EARLGREY`] with different
    /// instantiation parameters.
    pub const fn with_params(params: PlicParams) -> Self {
        Self::new(params, Self::TOP_EARLGREY.map)
    }

    pub const fn num_sources(&self) -> usize {
        self.params.num_sources
    }

    pub const fn num_targets(&self) -> usize {
        self.params.num_targets
    }

    pub const fn max_priority(&self) -> u32 {
        self.params.max_priority
    }

    /// Number of registers in each bit-packed family.
    pub const fn multireg_count(&self) -> usize {
        self.pending_family().words()
    }

    /// Register bits needed to hold every priority up to `max_priority`.
    pub const fn priority_mask(&self) -> u32 {
        let max = self.params.max_priority;
        if max == 0 {
            0
        } else {
            u32::MAX >> max.leading_zeros()
        }
    }

    pub const fn priority_offset(&self, source: usize) -> usize {
        self.map.priority + source * 4
    }

    pub const fn pending_family(&self) -> RegFamily {
        RegFamily::new(self.map.pending, self.params.num_sources)
    }

    pub const fn enable_family(&self, target: usize) -> RegFamily {
        RegFamily::new(
            self.map.enable + target * self.map.enable_stride,
            self.params.num_sources,
        )
    }

    pub const fn threshold_offset(&self, target: usize) -> usize {
        self.map.threshold + target * self.map.context_stride
    }

    pub const fn claim_complete_offset(&self, target: usize) -> usize {
        self.map.claim_complete + target * self.map.context_stride
    }

    pub const fn msip_offset(&self, target: usize) -> usize {
        self.map.msip + target * self.map.msip_stride
    }

    /// Checks that the table describes a PLIC whose registers are word
    /// aligned, whose families do not overlap and that fits the window.
    pub fn validate(&self) -> AxResult {
        let PlicParams {
            num_sources,
            num_targets,
            ..
        } = self.params;
        if num_sources == 0
            || num_sources > PLIC_MAX_SOURCES
            || num_targets == 0
            || num_targets > PLIC_MAX_TARGETS
        {
            return Err(AxError::InvalidInput);
        }
        let map = &self.map;
        let aligned = [
            map.priority,
            map.pending,
            map.enable,
            map.enable_stride,
            map.threshold,
            map.claim_complete,
            map.context_stride,
            map.msip,
            map.msip_stride,
        ]
        .iter()
        .all(|offset| offset % 4 == 0);
        if !aligned {
            return Err(AxError::InvalidInput);
        }
        match self.layout_fits() {
            Some(true) => Ok(()),
            _ => Err(AxError::InvalidInput),
        }
    }

    /// `None` when an end offset does not fit in `usize`.
    fn layout_fits(&self) -> Option<bool> {
        let map = &self.map;
        let last = self.params.num_targets - 1;
        let family_bytes = self.multireg_count().checked_mul(4)?;

        let priority_end = map
            .priority
            .checked_add(self.params.num_sources.checked_mul(4)?)?;
        let pending_end = map.pending.checked_add(family_bytes)?;
        let enable_end = map
            .enable
            .checked_add(last.checked_mul(map.enable_stride)?)?
            .checked_add(family_bytes)?;
        let claim_last = map
            .claim_complete
            .checked_add(last.checked_mul(map.context_stride)?)?;
        let msip_end = map
            .msip
            .checked_add(last.checked_mul(map.msip_stride)?)?
            .checked_add(4)?;

        Some(
            family_bytes <= map.enable_stride
                && priority_end <= map.pending
                && pending_end <= map.enable
                && enable_end <= map.threshold
                && map.threshold < map.claim_complete
                && map.claim_complete - map.threshold < map.context_stride
                && claim_last < map.msip
                && map.msip_stride >= 4
                && msip_end <= map.size,
        )
    }
}

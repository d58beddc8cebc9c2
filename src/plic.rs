use axerrno::{AxError, AxResult};
use log::debug;

use crate::geometry::Geometry;
use crate::mmio::{MmioPort, MmioRegion};
use crate::multireg::BitLocation;
use crate::{IrqId, Priority, TargetId, Toggle};

/// Handle to one PLIC.
///
/// The handle only knows where the registers are. Enable bits, priorities,
/// thresholds and pending state live in the hardware and are read back on
/// every query, never cached.
///
/// No operation takes a lock. Read-modify-write of an enable word and the
/// claim/complete handshake of a target must be serialized by the caller
/// when several contexts share the handle.
#[derive(Debug, Clone, Copy)]
pub struct Plic<P: MmioPort = MmioRegion> {
    port: P,
    geometry: &'static Geometry,
}

impl<P: MmioPort> Plic<P> {
    /// Attaches to a controller without touching its registers.
    pub fn new(port: P, geometry: &'static Geometry) -> AxResult<Self> {
        geometry.validate()?;
        Ok(Self { port, geometry })
    }

    /// Attaches to a controller and brings it to a quiescent state, see
    /// [`Plic::reset`].
    pub fn init(port: P, geometry: &'static Geometry) -> AxResult<Self> {
        let plic = Self::new(port, geometry)?;
        plic.reset();
        Ok(plic)
    }

    /// Zeroes every priority, every enable word of every target, every
    /// threshold and every software interrupt, in that order.
    ///
    /// Not atomic: must not race with interrupt delivery or other users of
    /// the controller.
    pub fn reset(&self) {
        let g = self.geometry;
        debug!(
            "rv_plic: reset {} sources, {} targets",
            g.num_sources(),
            g.num_targets()
        );
        for source in 0..g.num_sources() {
            self.port.write32(g.priority_offset(source), 0);
        }
        for target in 0..g.num_targets() {
            for offset in g.enable_family(target).word_offsets() {
                self.port.write32(offset, 0);
            }
        }
        for target in 0..g.num_targets() {
            self.port.write32(g.threshold_offset(target), 0);
        }
        for target in 0..g.num_targets() {
            self.port.write32(g.msip_offset(target), 0);
        }
    }

    pub fn geometry(&self) -> &'static Geometry {
        self.geometry
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    fn check_source(&self, source: IrqId) -> AxResult<usize> {
        let source = source as usize;
        if source >= self.geometry.num_sources() {
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

    fn check_priority(&self, priority: Priority) -> AxResult<u32> {
        if priority > self.geometry.max_priority() {
            return Err(AxError::InvalidInput);
        }
        Ok(priority)
    }

    fn enable_bit(&self, source: IrqId, target: TargetId) -> AxResult<BitLocation> {
        let source = self.check_source(source)?;
        let target = self.check_target(target)?;
        self.geometry
            .enable_family(target)
            .locate(source)
            .ok_or(AxError::InvalidInput)
    }

    /// Enables or disables `source` for `target`.
    ///
    /// Read, modify one bit, write back. Other bits of the word are kept,
    /// but a concurrent writer of the same word can be lost.
    pub fn irq_set_enabled(&self, source: IrqId, target: TargetId, toggle: Toggle) -> AxResult {
        let loc = self.enable_bit(source, target)?;
        let word = self.port.read32(loc.offset);
        self.port.write32(loc.offset, loc.apply(word, toggle));
        Ok(())
    }

    pub fn irq_get_enabled(&self, source: IrqId, target: TargetId) -> AxResult<Toggle> {
        let loc = self.enable_bit(source, target)?;
        Ok(loc.is_set(self.port.read32(loc.offset)).into())
    }

    /// Sets the priority of `source`. Priority 0 masks the source for every
    /// target whatever its enable bits say.
    pub fn irq_set_priority(&self, source: IrqId, priority: Priority) -> AxResult {
        let source = self.check_source(source)?;
        let priority = self.check_priority(priority)?;
        self.port.write32(self.geometry.priority_offset(source), priority);
        Ok(())
    }

    /// Sets the threshold of `target`. Only sources with a priority strictly
    /// above it can be claimed by `target`.
    pub fn target_set_threshold(&self, target: TargetId, threshold: Priority) -> AxResult {
        let target = self.check_target(target)?;
        let threshold = self.check_priority(threshold)?;
        self.port.write32(self.geometry.threshold_offset(target), threshold);
        Ok(())
    }

    /// Reports the pending bit of `source`. Reading does not clear it.
    pub fn irq_is_pending(&self, source: IrqId) -> AxResult<bool> {
        let source = self.check_source(source)?;
        let loc = self
            .geometry
            .pending_family()
            .locate(source)
            .ok_or(AxError::InvalidInput)?;
        Ok(loc.is_set(self.port.read32(loc.offset)))
    }

    /// Claims the highest-priority eligible interrupt of `target`.
    ///
    /// Returns 0 when nothing is eligible. A non-zero ID stays claimed, and
    /// is not offered again, until it is passed to [`Plic::irq_complete`].
    pub fn irq_claim(&self, target: TargetId) -> AxResult<IrqId> {
        let target = self.check_target(target)?;
        Ok(self.port.read32(self.geometry.claim_complete_offset(target)))
    }

    /// Signals that `target` has finished handling `source`.
    ///
    /// `source` is written as is. Completing an ID that this target did not
    /// claim, or one outside the source range, is a caller error: the
    /// hardware ignores it and this layer does not detect it.
    pub fn irq_complete(&self, target: TargetId, source: IrqId) -> AxResult {
        let target = self.check_target(target)?;
        self.port.write32(self.geometry.claim_complete_offset(target), source);
        Ok(())
    }

    /// Claims and completes every interrupt currently eligible for `target`,
    /// handing each ID to `handler` in between. Stops after one round over
    /// the source range so that a source held asserted cannot spin forever.
    ///
    /// Returns the number of interrupts handled.
    pub fn irq_drain(&self, target: TargetId, mut handler: impl FnMut(IrqId)) -> AxResult<usize> {
        self.check_target(target)?;
        let mut handled = 0;
        while handled < self.geometry.num_sources() {
            let source = self.irq_claim(target)?;
            if source == 0 {
                break;
            }
            handler(source);
            self.irq_complete(target, source)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Raises the software interrupt of `target`.
    pub fn software_irq_force(&self, target: TargetId) -> AxResult {
        let target = self.check_target(target)?;
        self.port.write32(self.geometry.msip_offset(target), 1);
        Ok(())
    }

    /// Clears the software interrupt of `target`.
    pub fn software_irq_acknowledge(&self, target: TargetId) -> AxResult {
        let target = self.check_target(target)?;
        self.port.write32(self.geometry.msip_offset(target), 0);
        Ok(())
    }

    pub fn software_irq_is_pending(&self, target: TargetId) -> AxResult<bool> {
        let target = self.check_target(target)?;
        Ok(self.port.read32(self.geometry.msip_offset(target)) & 1 != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::geometry::PlicParams;
    use crate::mock::{Access, MockMmio};

    const TARGET0: TargetId = 0;
    const FIRST_IRQ: IrqId = 1;
    const NUM_SRC: u32 = RV_PLIC_PARAM_NUM_SRC as u32;
    const NUM_TARGET: u32 = RV_PLIC_PARAM_NUM_TARGET as u32;
    const MAX_PRIO: u32 = RV_PLIC_PARAM_MAX_PRIO;

    static MULTI_TARGET: Geometry = Geometry::with_params(PlicParams {
        num_sources: 64,
        num_targets: 3,
        max_priority: 7,
    });

    const ENABLE_REGS: [(usize, u32); 6] = [
        (0x2000, 31),
        (0x2004, 31),
        (0x2008, 31),
        (0x200c, 31),
        (0x2010, 31),
        (0x2014, 20),
    ];

    const PENDING_REGS: [(usize, u32); 6] = [
        (0x1000, 31),
        (0x1004, 31),
        (0x1008, 31),
        (0x100c, 31),
        (0x1010, 31),
        (0x1014, 20),
    ];

    fn plic(mock: &MockMmio) -> Plic<&MockMmio> {
        Plic::new(mock, &Geometry::TOP_EARLGREY).unwrap()
    }

    fn expected_reset() -> Vec<(usize, u32)> {
        let mut writes = Vec::new();
        for i in 0..RV_PLIC_PARAM_NUM_SRC {
            writes.push((RV_PLIC_PRIO0_REG_OFFSET + 4 * i, 0));
        }
        for (offset, _) in ENABLE_REGS {
            writes.push((offset, 0));
        }
        writes.push((RV_PLIC_THRESHOLD0_REG_OFFSET, 0));
        writes.push((RV_PLIC_MSIP0_REG_OFFSET, 0));
        writes
    }

    #[test]
    fn register_tables_cover_all_sources() {
        let total: u32 = ENABLE_REGS.iter().map(|(_, last)| last + 1).sum();
        assert_eq!(total, NUM_SRC);
        let total: u32 = PENDING_REGS.iter().map(|(_, last)| last + 1).sum();
        assert_eq!(total, NUM_SRC);
        assert_eq!(NUM_TARGET, 1);
    }

    #[test]
    fn new_does_not_touch_hardware() {
        let mock = MockMmio::new();
        let _ = plic(&mock);
        assert!(mock.is_untouched());
    }

    #[test]
    fn new_rejects_invalid_geometry() {
        static EMPTY: Geometry = Geometry::with_params(PlicParams {
            num_sources: 0,
            num_targets: 1,
            max_priority: 3,
        });
        let mock = MockMmio::new();
        assert_eq!(Plic::init(&mock, &EMPTY).err(), Some(AxError::InvalidInput));
        assert!(mock.is_untouched());
    }

    #[test]
    fn init_resets_in_order() {
        let mock = MockMmio::new();
        Plic::init(&mock, &Geometry::TOP_EARLGREY).unwrap();
        assert_eq!(mock.writes(), expected_reset());
        assert_eq!(mock.accesses().len(), expected_reset().len());
    }

    #[test]
    fn init_resets_every_target() {
        let mock = MockMmio::new();
        Plic::init(&mock, &MULTI_TARGET).unwrap();
        let writes = mock.writes();
        assert_eq!(writes.len(), 64 + 3 * 2 + 3 + 3);
        assert!(writes.iter().all(|&(_, val)| val == 0));
        assert_eq!(writes[64], (0x2000, 0));
        assert_eq!(writes[67], (0x2084, 0));
        assert_eq!(writes[69], (0x2104, 0));
        assert_eq!(&writes[70..73], &[(0x200000, 0), (0x201000, 0), (0x202000, 0)]);
        assert_eq!(
            &writes[73..],
            &[(0x4000000, 0), (0x4000004, 0), (0x4000008, 0)]
        );
    }

    #[test]
    fn set_enabled_every_source() {
        for toggle in [Toggle::Enabled, Toggle::Disabled] {
            let mock = MockMmio::new();
            let plic = plic(&mock);
            let background = match toggle {
                Toggle::Enabled => 0,
                Toggle::Disabled => u32::MAX,
            };
            let mut source = 0;
            for (offset, last_bit) in ENABLE_REGS {
                for bit in 0..=last_bit {
                    mock.program(offset, background);
                    mock.clear_log();
                    plic.irq_set_enabled(source, TARGET0, toggle).unwrap();
                    let expected = match toggle {
                        Toggle::Enabled => 1 << bit,
                        Toggle::Disabled => !(1 << bit),
                    };
                    assert_eq!(
                        mock.accesses(),
                        [
                            Access::Read(offset, background),
                            Access::Write(offset, expected)
                        ]
                    );
                    source += 1;
                }
            }
            assert_eq!(source, NUM_SRC);
        }
    }

    #[test]
    fn set_enabled_keeps_neighbours() {
        let mock = MockMmio::new();
        let plic = plic(&mock);
        mock.program(0x2004, 0x8000_0001);
        plic.irq_set_enabled(40, TARGET0, Toggle::Enabled).unwrap();
        assert_eq!(mock.peek(0x2004), 0x8000_0101);
        plic.irq_set_enabled(63, TARGET0, Toggle::Disabled).unwrap();
        assert_eq!(mock.peek(0x2004), 0x0000_0101);
        assert_eq!(
            plic.irq_get_enabled(40, TARGET0).unwrap(),
            Toggle::Enabled
        );
        assert_eq!(
            plic.irq_get_enabled(63, TARGET0).unwrap(),
            Toggle::Disabled
        );
    }

    #[test]
    fn set_enabled_uses_target_family() {
        let mock = MockMmio::new();
        let plic = Plic::new(&mock, &MULTI_TARGET).unwrap();
        plic.irq_set_enabled(33, 2, Toggle::Enabled).unwrap();
        assert_eq!(mock.writes(), [(0x2104, 1 << 1)]);
    }

    #[test]
    fn set_enabled_rejects_bad_indices() {
        let mock = MockMmio::new();
        let plic = plic(&mock);
        assert_eq!(
            plic.irq_set_enabled(NUM_SRC, TARGET0, Toggle::Enabled),
            Err(AxError::InvalidInput)
        );
        assert_eq!(
            plic.irq_set_enabled(FIRST_IRQ, NUM_TARGET, Toggle::Enabled),
            Err(AxError::InvalidInput)
        );
        assert_eq!(
            plic.irq_get_enabled(FIRST_IRQ, NUM_TARGET),
            Err(AxError::InvalidInput)
        );
        assert!(mock.is_untouched());
    }

    #[test]
    fn set_priority_every_source() {
        let mock = MockMmio::new();
        let plic = plic(&mock);
        for i in 0..NUM_SRC {
            for priority in 0..=MAX_PRIO {
                plic.irq_set_priority(i, priority).unwrap();
                assert_eq!(mock.peek(4 * i as usize), priority);
            }
        }
        assert_eq!(mock.writes().len(), (NUM_SRC * (MAX_PRIO + 1)) as usize);
    }

    #[test]
    fn set_priority_rejects_bad_arguments() {
        let mock = MockMmio::new();
        let plic = plic(&mock);
        assert_eq!(
            plic.irq_set_priority(FIRST_IRQ, MAX_PRIO + 1),
            Err(AxError::InvalidInput)
        );
        assert_eq!(
            plic.irq_set_priority(NUM_SRC, MAX_PRIO),
            Err(AxError::InvalidInput)
        );
        assert!(mock.is_untouched());
    }

    #[test]
    fn set_threshold() {
        let mock = MockMmio::new();
        let plic = plic(&mock);
        for threshold in 0..=MAX_PRIO {
            mock.clear_log();
            plic.target_set_threshold(TARGET0, threshold).unwrap();
            assert_eq!(mock.writes(), [(RV_PLIC_THRESHOLD0_REG_OFFSET, threshold)]);
            assert_eq!(mock.peek(RV_PLIC_THRESHOLD0_REG_OFFSET), threshold);
        }

        mock.clear_log();
        assert_eq!(
            plic.target_set_threshold(TARGET0, MAX_PRIO + 1),
            Err(AxError::InvalidInput)
        );
        assert_eq!(
            plic.target_set_threshold(NUM_TARGET, 0),
            Err(AxError::InvalidInput)
        );
        assert!(mock.is_untouched());
    }

    #[test]
    fn pending_every_source() {
        for pending in [true, false] {
            let mock = MockMmio::new();
            let plic = plic(&mock);
            let mut source = 0;
            for (offset, last_bit) in PENDING_REGS {
                for bit in 0..=last_bit {
                    let word = if pending { 1 << bit } else { !(1 << bit) };
                    mock.program(offset, word);
                    assert_eq!(plic.irq_is_pending(source).unwrap(), pending);
                    source += 1;
                }
            }
            assert!(mock.writes().is_empty());
        }
    }

    #[test]
    fn pending_rejects_bad_source() {
        let mock = MockMmio::new();
        let plic = plic(&mock);
        assert_eq!(plic.irq_is_pending(NUM_SRC), Err(AxError::InvalidInput));
        assert!(mock.is_untouched());
    }

    #[test]
    fn claim_returns_register_value() {
        let mock = MockMmio::new();
        let plic = plic(&mock);
        for i in 0..NUM_SRC {
            mock.program(RV_PLIC_CC0_REG_OFFSET, i);
            assert_eq!(plic.irq_claim(TARGET0).unwrap(), i);
        }
        assert!(mock.writes().is_empty());

        mock.clear_log();
        assert_eq!(plic.irq_claim(NUM_TARGET), Err(AxError::InvalidInput));
        assert!(mock.is_untouched());
    }

    #[test]
    fn complete_writes_any_id() {
        let mock = MockMmio::new();
        let plic = plic(&mock);
        for i in 0..NUM_SRC {
            plic.irq_complete(TARGET0, i).unwrap();
        }
        plic.irq_complete(TARGET0, NUM_SRC + 7).unwrap();
        let writes = mock.writes();
        assert_eq!(writes.len(), NUM_SRC as usize + 1);
        assert!(writes
            .iter()
            .all(|&(offset, _)| offset == RV_PLIC_CC0_REG_OFFSET));
        assert_eq!(writes[5], (RV_PLIC_CC0_REG_OFFSET, 5));
        assert_eq!(writes[NUM_SRC as usize], (RV_PLIC_CC0_REG_OFFSET, NUM_SRC + 7));

        mock.clear_log();
        assert_eq!(plic.irq_complete(NUM_TARGET, 1), Err(AxError::InvalidInput));
        assert!(mock.is_untouched());
    }

    #[test]
    fn software_irq() {
        let mock = MockMmio::new();
        let plic = plic(&mock);
        plic.software_irq_force(TARGET0).unwrap();
        assert_eq!(mock.writes(), [(RV_PLIC_MSIP0_REG_OFFSET, 1)]);
        assert!(plic.software_irq_is_pending(TARGET0).unwrap());

        plic.software_irq_acknowledge(TARGET0).unwrap();
        assert_eq!(mock.peek(RV_PLIC_MSIP0_REG_OFFSET), 0);
        assert!(!plic.software_irq_is_pending(TARGET0).unwrap());
    }

    #[test]
    fn software_irq_rejects_bad_target() {
        let mock = MockMmio::new();
        let plic = plic(&mock);
        assert_eq!(plic.software_irq_force(NUM_TARGET), Err(AxError::InvalidInput));
        assert_eq!(
            plic.software_irq_acknowledge(NUM_TARGET),
            Err(AxError::InvalidInput)
        );
        assert_eq!(
            plic.software_irq_is_pending(NUM_TARGET),
            Err(AxError::InvalidInput)
        );
        assert!(mock.is_untouched());
    }

    #[test]
    fn init_then_enable_source_5() {
        let mock = MockMmio::new();
        let plic = Plic::init(&mock, &Geometry::TOP_EARLGREY).unwrap();
        mock.clear_log();
        plic.irq_set_enabled(5, TARGET0, Toggle::Enabled).unwrap();
        assert_eq!(
            mock.accesses(),
            [
                Access::Read(RV_PLIC_IE0_0_REG_OFFSET, 0),
                Access::Write(RV_PLIC_IE0_0_REG_OFFSET, 1 << 5)
            ]
        );
    }
}

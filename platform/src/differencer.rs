use crate::convert;
use crate::record::ImuRecord;
use platform_traits::{ErrorSample, ImuSample, SourceId};
use strum::IntoEnumIterator;
use tracing::trace;

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    sample: ImuSample,
    updated_at: f64,
}

/// Latest converted state of both IMUs and their difference.
///
/// A slot becomes valid on its first record and stays valid. With
/// `stale_after` set, a slot that has not been updated for that many seconds
/// is left out of the difference until it reports again.
#[derive(Debug, Clone, Default)]
pub struct DualImuDifferencer {
    slots: [Slot; 2],
    stale_after: Option<f64>,
}

impl DualImuDifferencer {
    pub fn new(stale_after: Option<f64>) -> Self {
        DualImuDifferencer {
            slots: Default::default(),
            stale_after,
        }
    }

    /// Stores `record` in its source slot and returns IMU1 - IMU2 when both
    /// slots hold data.
    pub fn update(&mut self, record: &ImuRecord, now: f64) -> Option<ErrorSample> {
        let slot = &mut self.slots[record.source.index()];
        slot.sample = convert::imu_sample(record);
        slot.updated_at = now;

        if !SourceId::iter().all(|source| self.is_live(source, now)) {
            trace!(source = %record.source, "waiting for both IMUs");
            return None;
        }

        let imu1 = &self.slots[SourceId::Imu1.index()].sample;
        let imu2 = &self.slots[SourceId::Imu2.index()].sample;
        Some(ErrorSample {
            t: now,
            d_accel: imu1.accel - imu2.accel,
            d_gyro: imu1.gyro - imu2.gyro,
        })
    }

    pub fn sample(&self, source: SourceId) -> &ImuSample {
        &self.slots[source.index()].sample
    }

    fn is_live(&self, source: SourceId, now: f64) -> bool {
        let slot = &self.slots[source.index()];
        match self.stale_after {
            Some(max_age) => slot.sample.valid && now - slot.updated_at <= max_age,
            None => slot.sample.valid,
        }
    }

    pub fn reset(&mut self) {
        self.slots = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use platform_traits::RawTriple;

    fn record(source: SourceId, accel: [i16; 3], gyro: [i16; 3]) -> ImuRecord {
        ImuRecord {
            source,
            raw_accel: RawTriple::new(accel[0], accel[1], accel[2]),
            raw_gyro: RawTriple::new(gyro[0], gyro[1], gyro[2]),
        }
    }

    #[test]
    fn needs_both_sources() {
        let mut diff = DualImuDifferencer::default();
        let r1 = record(SourceId::Imu1, [1000, 2000, 3000], [655, 0, -655]);
        assert!(diff.update(&r1, 0.1).is_none());
        assert!(diff.update(&r1, 0.2).is_none());
        assert!(!diff.sample(SourceId::Imu2).valid);

        let r2 = record(SourceId::Imu2, [500, 2000, 4000], [0, 131, -655]);
        let sample = diff.update(&r2, 0.3).expect("both sources valid");

        let imu1 = convert::imu_sample(&r1);
        let imu2 = convert::imu_sample(&r2);
        assert_eq!(sample.t, 0.3);
        assert_eq!(sample.d_accel, imu1.accel - imu2.accel);
        assert_eq!(sample.d_gyro, imu1.gyro - imu2.gyro);
        assert_relative_eq!(sample.d_accel.x, 500.0 * convert::ACCEL_SCALE, epsilon = 1e-6);
        assert_relative_eq!(sample.d_accel.z, -1000.0 * convert::ACCEL_SCALE, epsilon = 1e-6);
        assert_eq!(sample.d_gyro.z, 0.0);
    }

    #[test]
    fn every_update_after_both_valid_emits() {
        let mut diff = DualImuDifferencer::default();
        diff.update(&record(SourceId::Imu2, [0; 3], [0; 3]), 0.0);
        assert!(diff.update(&record(SourceId::Imu1, [0; 3], [0; 3]), 1.0).is_some());
        assert!(diff.update(&record(SourceId::Imu1, [1; 3], [0; 3]), 2.0).is_some());
        assert!(diff.update(&record(SourceId::Imu2, [1; 3], [0; 3]), 3.0).is_some());
    }

    #[test]
    fn latched_validity_ignores_age() {
        let mut diff = DualImuDifferencer::default();
        diff.update(&record(SourceId::Imu2, [0; 3], [0; 3]), 0.0);
        assert!(diff.update(&record(SourceId::Imu1, [0; 3], [0; 3]), 1000.0).is_some());
    }

    #[test]
    fn stale_slot_is_skipped() {
        let mut diff = DualImuDifferencer::new(Some(0.5));
        diff.update(&record(SourceId::Imu2, [0; 3], [0; 3]), 0.0);
        assert!(diff.update(&record(SourceId::Imu1, [0; 3], [0; 3]), 0.4).is_some());
        assert!(diff.update(&record(SourceId::Imu1, [0; 3], [0; 3]), 0.6).is_none());
        assert!(diff.update(&record(SourceId::Imu2, [0; 3], [0; 3]), 0.7).is_some());
    }

    #[test]
    fn reset_clears_slots() {
        let mut diff = DualImuDifferencer::default();
        diff.update(&record(SourceId::Imu1, [1; 3], [1; 3]), 0.0);
        diff.update(&record(SourceId::Imu2, [1; 3], [1; 3]), 0.0);
        diff.reset();
        assert!(!diff.sample(SourceId::Imu1).valid);
        assert!(diff.update(&record(SourceId::Imu1, [1; 3], [1; 3]), 1.0).is_none());
    }
}

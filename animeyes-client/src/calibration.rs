use animeyes_core::{
    FACTORY_SERVO_CENTER, FACTORY_SERVO_MAX, FACTORY_SERVO_MIN, MAX_GPIO_PIN, NUM_SERVOS,
    Outbound, SERVO_ANGLE_MAX, ServoCalibration, ServoStatus,
};
use tracing::{debug, info};

use crate::{admin::AdminGuard, error::ActionError};

/// Local and saved calibration for the six servos.
///
/// `local` is seeded once from the first broadcast that carries servo data
/// and from then on changes only through the operations below. Every record
/// keeps `0 <= min <= center <= max <= 180`.
#[derive(Debug, Default)]
pub struct CalibrationStore {
    local: Vec<ServoCalibration>,
    saved: Vec<ServoCalibration>,
}

fn from_status(index: usize, servo: &ServoStatus) -> ServoCalibration {
    let max = servo.max.min(SERVO_ANGLE_MAX);
    let min = servo.min.min(max);
    ServoCalibration {
        index: index as u8,
        pin: servo.pin,
        min,
        center: servo.center.clamp(min, max),
        max,
        invert: servo.invert,
    }
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        !self.local.is_empty()
    }

    pub fn local(&self) -> &[ServoCalibration] {
        &self.local
    }

    pub fn saved(&self) -> &[ServoCalibration] {
        &self.saved
    }

    pub fn record(&self, index: usize) -> Option<&ServoCalibration> {
        self.local.get(index)
    }

    /// Seeds both copies from a broadcast. Returns true when this call did
    /// the seeding; later broadcasts are ignored.
    pub fn seed_from(&mut self, servos: &[ServoStatus]) -> bool {
        if self.is_loaded() || servos.is_empty() {
            return false;
        }
        self.local = servos
            .iter()
            .take(NUM_SERVOS)
            .enumerate()
            .map(|(index, servo)| from_status(index, servo))
            .collect();
        self.saved = self.local.clone();
        info!(servos = self.local.len(), "calibration seeded from device");
        true
    }

    fn record_mut(&mut self, index: usize) -> Result<&mut ServoCalibration, ActionError> {
        if !self.is_loaded() {
            return Err(ActionError::CalibrationNotLoaded);
        }
        self.local
            .get_mut(index)
            .ok_or(ActionError::UnknownServo(index))
    }

    /// Moves `min` by `delta` within `[0, center]` and previews the new bound.
    pub fn adjust_min(&mut self, index: usize, delta: i32) -> Result<Outbound, ActionError> {
        let record = self.record_mut(index)?;
        let next = i32::from(record.min)
            .saturating_add(delta)
            .clamp(0, i32::from(record.center));
        record.min = next as u8;
        Ok(Outbound::PreviewCalibration {
            index: record.index,
            position: record.min,
        })
    }

    /// Moves `max` by `delta` within `[center, 180]` and previews the new bound.
    pub fn adjust_max(&mut self, index: usize, delta: i32) -> Result<Outbound, ActionError> {
        let record = self.record_mut(index)?;
        let next = i32::from(record.max)
            .saturating_add(delta)
            .clamp(i32::from(record.center), i32::from(SERVO_ANGLE_MAX));
        record.max = next as u8;
        Ok(Outbound::PreviewCalibration {
            index: record.index,
            position: record.max,
        })
    }

    /// Stores the center clamped to `[min, max]` and returns the value the
    /// caller should preview through its throttle.
    pub fn set_center(&mut self, index: usize, value: i32) -> Result<u8, ActionError> {
        let record = self.record_mut(index)?;
        record.center = value.clamp(i32::from(record.min), i32::from(record.max)) as u8;
        Ok(record.center)
    }

    /// Test slider: nothing is stored, the position is only clamped.
    pub fn test_position(&self, index: usize, value: i32) -> Result<u8, ActionError> {
        if !self.is_loaded() {
            return Err(ActionError::CalibrationNotLoaded);
        }
        let record = self
            .local
            .get(index)
            .ok_or(ActionError::UnknownServo(index))?;
        Ok(value.clamp(i32::from(record.min), i32::from(record.max)) as u8)
    }

    pub fn set_invert(&mut self, index: usize, invert: bool) -> Result<Outbound, ActionError> {
        let record = self.record_mut(index)?;
        record.invert = invert;
        Ok(Outbound::SetInvert {
            index: record.index,
            invert,
        })
    }

    pub fn set_pin(&mut self, index: usize, pin: i32) -> Result<(), ActionError> {
        let gpio = u8::try_from(pin)
            .ok()
            .filter(|gpio| *gpio <= MAX_GPIO_PIN)
            .ok_or(ActionError::PinOutOfRange { max: MAX_GPIO_PIN })?;
        self.record_mut(index)?.pin = gpio;
        Ok(())
    }

    /// Local only: nothing is sent until [`Self::save_all`].
    pub fn reset_to_factory_defaults(&mut self) -> Result<(), ActionError> {
        if !self.is_loaded() {
            return Err(ActionError::CalibrationNotLoaded);
        }
        for record in &mut self.local {
            record.min = FACTORY_SERVO_MIN;
            record.center = FACTORY_SERVO_CENTER;
            record.max = FACTORY_SERVO_MAX;
            record.invert = false;
        }
        debug!("calibration reset to factory defaults");
        Ok(())
    }

    pub fn save_all(&mut self, admin: &AdminGuard) -> Result<Outbound, ActionError> {
        admin.check_save()?;
        if !self.is_loaded() {
            return Err(ActionError::CalibrationNotLoaded);
        }
        self.saved = self.local.clone();
        info!(servos = self.saved.len(), "calibration saved");
        Ok(Outbound::SaveAllCalibration {
            servos: self.local.clone(),
        })
    }

    pub fn is_dirty(&self, index: usize) -> bool {
        self.local.get(index) != self.saved.get(index)
    }

    pub fn dirty_indices(&self) -> Vec<usize> {
        (0..self.local.len())
            .filter(|index| self.is_dirty(*index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use animeyes_core::AdminStatus;

    use super::*;

    fn servos() -> Vec<ServoStatus> {
        (0..NUM_SERVOS)
            .map(|index| ServoStatus {
                name: format!("servo-{index}"),
                pos: 90,
                pin: 13 + index as u8,
                min: 80,
                center: 90,
                max: 100,
                invert: false,
            })
            .collect()
    }

    fn seeded() -> CalibrationStore {
        let mut store = CalibrationStore::new();
        assert!(store.seed_from(&servos()));
        store
    }

    fn assert_ordered(store: &CalibrationStore) {
        for record in store.local() {
            assert!(record.min <= record.center);
            assert!(record.center <= record.max);
            assert!(record.max <= SERVO_ANGLE_MAX);
        }
    }

    #[test]
    fn seeds_once() {
        let mut store = seeded();
        assert_eq!(store.local(), store.saved());
        assert!(store.dirty_indices().is_empty());

        let mut other = servos();
        other[0].min = 10;
        assert!(!store.seed_from(&other));
        assert_eq!(store.local()[0].min, 80);
    }

    #[test]
    fn empty_broadcast_does_not_seed() {
        let mut store = CalibrationStore::new();
        assert!(!store.seed_from(&[]));
        assert_eq!(store.adjust_min(0, 1), Err(ActionError::CalibrationNotLoaded));
    }

    #[test]
    fn bounds_stop_at_center_and_limits() {
        let mut store = seeded();
        for _ in 0..20 {
            store.adjust_min(0, 1).unwrap();
            store.adjust_max(0, -1).unwrap();
        }
        let record = store.record(0).unwrap();
        assert_eq!((record.min, record.center, record.max), (90, 90, 90));

        store.adjust_min(1, -200).unwrap();
        assert_eq!(
            store.adjust_max(1, 200).unwrap(),
            Outbound::PreviewCalibration {
                index: 1,
                position: 180
            }
        );
        assert_eq!(store.record(1).unwrap().min, 0);
        assert_ordered(&store);
        assert_eq!(store.dirty_indices(), vec![0, 1]);
    }

    #[test]
    fn extreme_deltas_saturate_at_bounds() {
        let mut store = seeded();
        store.adjust_min(0, i32::MAX).unwrap();
        store.adjust_max(0, i32::MIN).unwrap();
        let record = store.record(0).unwrap();
        assert_eq!((record.min, record.center, record.max), (90, 90, 90));

        store.adjust_min(1, i32::MIN).unwrap();
        store.adjust_max(1, i32::MAX).unwrap();
        let record = store.record(1).unwrap();
        assert_eq!((record.min, record.max), (0, SERVO_ANGLE_MAX));
        assert_ordered(&store);
    }

    #[test]
    fn center_and_test_position_clamp_to_range() {
        let mut store = seeded();
        assert_eq!(store.set_center(2, 150), Ok(100));
        assert_eq!(store.set_center(2, -5), Ok(80));
        assert_eq!(store.test_position(2, 170), Ok(100));
        assert_eq!(store.set_center(9, 90), Err(ActionError::UnknownServo(9)));
    }

    #[test]
    fn invert_is_sent_immediately() {
        let mut store = seeded();
        assert_eq!(
            store.set_invert(4, true),
            Ok(Outbound::SetInvert {
                index: 4,
                invert: true
            })
        );
        assert!(store.is_dirty(4));
    }

    #[test]
    fn pin_range() {
        let mut store = seeded();
        assert!(store.set_pin(0, 39).is_ok());
        assert_eq!(
            store.set_pin(0, 40),
            Err(ActionError::PinOutOfRange { max: 39 })
        );
        assert!(store.set_pin(0, -1).is_err());
    }

    #[test]
    fn factory_reset_keeps_pins() {
        let mut store = seeded();
        store.set_invert(0, true).unwrap();
        store.reset_to_factory_defaults().unwrap();
        for (index, record) in store.local().iter().enumerate() {
            assert_eq!((record.min, record.center, record.max), (89, 90, 91));
            assert!(!record.invert);
            assert_eq!(record.pin, 13 + index as u8);
        }
        assert_eq!(store.dirty_indices().len(), NUM_SERVOS);
        assert_ordered(&store);
    }

    #[test]
    fn save_all_is_gated_and_batched() {
        let mut store = seeded();
        store.adjust_min(3, -1).unwrap();

        let mut admin = AdminGuard::new();
        admin.apply_server_state(
            AdminStatus {
                locked: true,
                pin_configured: true,
                ..AdminStatus::default()
            },
            std::time::Instant::now(),
        );
        assert_eq!(store.save_all(&admin), Err(ActionError::SaveLocked));
        assert!(store.is_dirty(3));

        let admin = AdminGuard::new();
        let Outbound::SaveAllCalibration { servos } = store.save_all(&admin).unwrap() else {
            panic!("expected batched save");
        };
        assert_eq!(servos.len(), NUM_SERVOS);
        assert_eq!(servos[3].min, 79);
        assert!(store.dirty_indices().is_empty());
    }
}

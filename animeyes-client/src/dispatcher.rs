use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use animeyes_core::Outbound;

use crate::throttle::Throttle;

pub const CONTINUOUS_WINDOW: Duration = Duration::from_millis(50);

/// Turns intents into outbound commands.
///
/// Discrete commands go straight to the outbox. Continuous controls (gaze,
/// lids, calibration preview) pass through one [`Throttle`] each, so a drag
/// produces a leading send, at most one send per window, and always the final
/// value.
#[derive(Debug)]
pub struct Dispatcher {
    outbox: Vec<Outbound>,
    gaze: Throttle<(f64, f64, f64)>,
    lids: Throttle<(f64, f64)>,
    preview: BTreeMap<u8, Throttle<u8>>,
    window: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(CONTINUOUS_WINDOW)
    }
}

impl Dispatcher {
    pub fn new(window: Duration) -> Self {
        Self {
            outbox: Vec::new(),
            gaze: Throttle::new(window),
            lids: Throttle::new(window),
            preview: BTreeMap::new(),
            window,
        }
    }

    pub fn send(&mut self, command: Outbound) {
        self.outbox.push(command);
    }

    pub fn send_all(&mut self, commands: impl IntoIterator<Item = Outbound>) {
        self.outbox.extend(commands);
    }

    pub fn gaze(&mut self, x: f64, y: f64, z: f64, now: Instant) {
        if let Some((x, y, z)) = self.gaze.call((x, y, z), now) {
            self.outbox.push(Outbound::SetGaze { x, y, z });
        }
    }

    pub fn lids(&mut self, left: f64, right: f64, now: Instant) {
        if let Some((left, right)) = self.lids.call((left, right), now) {
            self.outbox.push(Outbound::SetLids { left, right });
        }
    }

    pub fn preview(&mut self, index: u8, position: u8, now: Instant) {
        let window = self.window;
        let throttle = self
            .preview
            .entry(index)
            .or_insert_with(|| Throttle::new(window));
        if let Some(position) = throttle.call(position, now) {
            self.outbox
                .push(Outbound::PreviewCalibration { index, position });
        }
    }

    /// Flushes every trailing value whose window has closed.
    pub fn poll(&mut self, now: Instant) {
        if let Some((x, y, z)) = self.gaze.poll(now) {
            self.outbox.push(Outbound::SetGaze { x, y, z });
        }
        if let Some((left, right)) = self.lids.poll(now) {
            self.outbox.push(Outbound::SetLids { left, right });
        }
        for (index, throttle) in &mut self.preview {
            if let Some(position) = throttle.poll(now) {
                self.outbox.push(Outbound::PreviewCalibration {
                    index: *index,
                    position,
                });
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [self.gaze.deadline(), self.lids.deadline()]
            .into_iter()
            .chain(self.preview.values().map(Throttle::deadline))
            .flatten()
            .min()
    }

    pub fn take_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbox.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaze_drag_sends_leading_and_trailing_only() {
        let t0 = Instant::now();
        let mut dispatcher = Dispatcher::default();
        for step in 0..5_u32 {
            let offset = Duration::from_millis(u64::from(step) * 10);
            dispatcher.gaze(f64::from(step), 0.0, 100.0, t0 + offset);
        }
        assert_eq!(
            dispatcher.take_outbound(),
            vec![Outbound::SetGaze {
                x: 0.0,
                y: 0.0,
                z: 100.0
            }]
        );
        assert_eq!(dispatcher.next_deadline(), Some(t0 + CONTINUOUS_WINDOW));

        dispatcher.poll(t0 + CONTINUOUS_WINDOW);
        assert_eq!(
            dispatcher.take_outbound(),
            vec![Outbound::SetGaze {
                x: 4.0,
                y: 0.0,
                z: 100.0
            }]
        );
        assert_eq!(dispatcher.next_deadline(), None);
    }

    #[test]
    fn preview_throttles_are_independent_per_servo() {
        let t0 = Instant::now();
        let mut dispatcher = Dispatcher::default();
        dispatcher.preview(0, 90, t0);
        dispatcher.preview(1, 45, t0);
        dispatcher.preview(0, 91, t0 + Duration::from_millis(5));
        assert_eq!(
            dispatcher.take_outbound(),
            vec![
                Outbound::PreviewCalibration {
                    index: 0,
                    position: 90
                },
                Outbound::PreviewCalibration {
                    index: 1,
                    position: 45
                },
            ]
        );
        dispatcher.poll(t0 + CONTINUOUS_WINDOW);
        assert_eq!(
            dispatcher.take_outbound(),
            vec![Outbound::PreviewCalibration {
                index: 0,
                position: 91
            }]
        );
    }

    #[test]
    fn discrete_commands_are_never_coalesced() {
        let mut dispatcher = Dispatcher::default();
        dispatcher.send(Outbound::Blink { duration: 200 });
        dispatcher.send(Outbound::Blink { duration: 200 });
        assert_eq!(dispatcher.take_outbound().len(), 2);
    }
}

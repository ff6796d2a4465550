use std::time::{Duration, Instant};

use animeyes_core::Outbound;

/// Must stay above the device broadcast interval (100 ms).
pub const CONTROL_LOCK: Duration = Duration::from_millis(300);
pub const MODE_SELECTOR_LOCK: Duration = Duration::from_millis(1000);
pub const BLINK_PREVIEW_DURATION: Duration = Duration::from_millis(200);
const BLINK_SAFETY_MARGIN: Duration = Duration::from_millis(50);
pub const MODE_PLAYER_RESUME_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    GazePad,
    LidSliders,
    Depth,
    Coupling,
}

/// Lock flags evaluated at one instant. This is what projection reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockState {
    pub gaze_pad_active: bool,
    pub lid_sliders_active: bool,
    pub controls_locked: bool,
    pub mode_selector_locked: bool,
    pub blink_animating: bool,
}

/// Suppression windows that keep broadcasts from overwriting local input.
///
/// Also owns the mode-player hold: the device's auto-mode player is paused on
/// the first gesture and resumed once input has been idle for
/// [`MODE_PLAYER_RESUME_DELAY`].
#[derive(Debug, Default)]
pub struct InteractionLocks {
    gaze_pad_active: bool,
    lid_sliders_active: bool,
    controls_locked_until: Option<Instant>,
    mode_selector_locked_until: Option<Instant>,
    blink_until: Option<Instant>,
    player_paused: bool,
    resume_at: Option<Instant>,
}

impl InteractionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, now: Instant) -> LockState {
        LockState {
            gaze_pad_active: self.gaze_pad_active,
            lid_sliders_active: self.lid_sliders_active,
            controls_locked: self.controls_locked_until.is_some_and(|until| now < until),
            mode_selector_locked: self
                .mode_selector_locked_until
                .is_some_and(|until| now < until),
            blink_animating: self.blink_until.is_some_and(|until| now < until),
        }
    }

    /// Returns the pause command when this gesture starts a new hold.
    pub fn gesture_start(&mut self, gesture: Gesture, now: Instant) -> Option<Outbound> {
        match gesture {
            Gesture::GazePad => self.gaze_pad_active = true,
            Gesture::LidSliders => self.lid_sliders_active = true,
            Gesture::Depth | Gesture::Coupling => {}
        }
        self.lock_controls(now);
        self.resume_at = None;
        if self.player_paused {
            return None;
        }
        self.player_paused = true;
        Some(Outbound::PauseModePlayer { paused: true })
    }

    /// Every movement of a gesture extends the cooldown.
    pub fn gesture_tick(&mut self, now: Instant) {
        self.lock_controls(now);
    }

    pub fn gesture_end(&mut self, gesture: Gesture, now: Instant) {
        match gesture {
            Gesture::GazePad => self.gaze_pad_active = false,
            Gesture::LidSliders => self.lid_sliders_active = false,
            Gesture::Depth | Gesture::Coupling => {}
        }
        // Keep the lock past release so the trailing throttled send lands first.
        self.lock_controls(now);
        self.resume_at = Some(now + MODE_PLAYER_RESUME_DELAY);
    }

    pub fn lock_controls(&mut self, now: Instant) {
        self.controls_locked_until = Some(now + CONTROL_LOCK);
    }

    pub fn lock_mode_selector(&mut self, now: Instant) {
        self.mode_selector_locked_until = Some(now + MODE_SELECTOR_LOCK);
    }

    pub fn start_blink_animation(&mut self, duration: Duration, now: Instant) {
        self.blink_until = Some(now + duration + BLINK_SAFETY_MARGIN);
    }

    pub fn finish_blink_animation(&mut self) {
        self.blink_until = None;
    }

    pub fn is_player_paused(&self) -> bool {
        self.player_paused
    }

    /// Fires the delayed mode-player resume.
    pub fn poll(&mut self, now: Instant) -> Option<Outbound> {
        let at = self.resume_at?;
        if now < at {
            return None;
        }
        self.resume_at = None;
        if self.player_paused && !self.gaze_pad_active && !self.lid_sliders_active {
            self.player_paused = false;
            return Some(Outbound::PauseModePlayer { paused: false });
        }
        None
    }

    /// Earliest instant at which a lock expires or the resume fires.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        [
            self.controls_locked_until,
            self.mode_selector_locked_until,
            self.blink_until,
        ]
        .into_iter()
        .flatten()
        .filter(|at| *at > now)
        .chain(self.resume_at)
        .min()
    }

    /// The device forgets pause state on reconnect; so do we.
    pub fn reset_player_hold(&mut self) {
        self.player_paused = false;
        self.resume_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gesture_flag_and_cooldown() {
        let t0 = Instant::now();
        let mut locks = InteractionLocks::new();
        locks.gesture_start(Gesture::GazePad, t0);
        let state = locks.snapshot(t0 + Duration::from_secs(10));
        assert!(state.gaze_pad_active);
        assert!(!state.controls_locked);

        locks.gesture_end(Gesture::GazePad, t0 + Duration::from_secs(10));
        let released = t0 + Duration::from_secs(10);
        assert!(locks.snapshot(released + Duration::from_millis(299)).controls_locked);
        let after = locks.snapshot(released + CONTROL_LOCK);
        assert!(!after.gaze_pad_active);
        assert!(!after.controls_locked);
    }

    #[test]
    fn ticks_extend_the_cooldown() {
        let t0 = Instant::now();
        let mut locks = InteractionLocks::new();
        locks.gesture_start(Gesture::Depth, t0);
        locks.gesture_tick(t0 + Duration::from_millis(250));
        assert!(locks.snapshot(t0 + Duration::from_millis(500)).controls_locked);
        assert!(!locks.snapshot(t0 + Duration::from_millis(550)).controls_locked);
    }

    #[test]
    fn mode_player_paused_once_and_resumed_after_idle() {
        let t0 = Instant::now();
        let mut locks = InteractionLocks::new();
        assert_eq!(
            locks.gesture_start(Gesture::GazePad, t0),
            Some(Outbound::PauseModePlayer { paused: true })
        );
        assert_eq!(locks.gesture_start(Gesture::LidSliders, t0), None);

        locks.gesture_end(Gesture::GazePad, t0 + Duration::from_millis(100));
        // Lid drag still active: resume is skipped.
        assert_eq!(locks.poll(t0 + Duration::from_millis(600)), None);
        assert!(locks.is_player_paused());

        locks.gesture_end(Gesture::LidSliders, t0 + Duration::from_millis(700));
        assert_eq!(locks.poll(t0 + Duration::from_millis(1199)), None);
        assert_eq!(
            locks.poll(t0 + Duration::from_millis(1200)),
            Some(Outbound::PauseModePlayer { paused: false })
        );
    }

    #[test]
    fn new_gesture_cancels_pending_resume() {
        let t0 = Instant::now();
        let mut locks = InteractionLocks::new();
        locks.gesture_start(Gesture::Coupling, t0);
        locks.gesture_end(Gesture::Coupling, t0);
        locks.gesture_start(Gesture::Coupling, t0 + Duration::from_millis(200));
        assert_eq!(locks.poll(t0 + Duration::from_secs(5)), None);
        assert!(locks.is_player_paused());
    }

    #[test]
    fn blink_flag_has_safety_expiry() {
        let t0 = Instant::now();
        let mut locks = InteractionLocks::new();
        locks.start_blink_animation(BLINK_PREVIEW_DURATION, t0);
        assert!(locks.snapshot(t0 + Duration::from_millis(249)).blink_animating);
        assert!(!locks.snapshot(t0 + Duration::from_millis(250)).blink_animating);

        locks.start_blink_animation(BLINK_PREVIEW_DURATION, t0);
        locks.finish_blink_animation();
        assert!(!locks.snapshot(t0).blink_animating);
    }

    #[test]
    fn mode_selector_lock_window() {
        let t0 = Instant::now();
        let mut locks = InteractionLocks::new();
        locks.lock_mode_selector(t0);
        assert!(locks.snapshot(t0 + Duration::from_millis(999)).mode_selector_locked);
        assert!(!locks.snapshot(t0 + MODE_SELECTOR_LOCK).mode_selector_locked);
        assert!(!locks.snapshot(t0).controls_locked);
    }
}

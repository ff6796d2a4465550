use std::time::{Duration, Instant};

use animeyes_core::{ADMIN_PIN_MIN_LEN, AdminStatus, Outbound, is_valid_admin_pin};
use tracing::{debug, info};

use crate::error::ActionError;

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// No PIN set: every action is allowed.
    Unconfigured,
    Locked,
    Unlocked { remaining_seconds: u32 },
}

/// How a pending PIN submission was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    Unlocked,
    RateLimited { seconds: u32 },
    Incorrect,
}

/// Client mirror of the device's per-session admin lock.
///
/// The device is authoritative. Between pushes both countdowns tick down
/// locally once a second; when the unlock countdown reaches zero the guard
/// assumes the lock and asks the device to confirm.
#[derive(Debug, Default)]
pub struct AdminGuard {
    status: AdminStatus,
    unlock_tick_at: Option<Instant>,
    lockout_tick_at: Option<Instant>,
    awaiting_auth: bool,
}

impl AdminGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &AdminStatus {
        &self.status
    }

    pub fn mode(&self) -> AccessMode {
        if !self.status.pin_configured {
            AccessMode::Unconfigured
        } else if self.status.locked {
            AccessMode::Locked
        } else {
            AccessMode::Unlocked {
                remaining_seconds: self.status.remaining_seconds,
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        self.status.pin_configured && self.status.locked
    }

    pub fn lockout_seconds(&self) -> u32 {
        self.status.lockout_seconds
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status.lockout_seconds > 0
    }

    pub fn awaiting_auth(&self) -> bool {
        self.awaiting_auth
    }

    pub fn can_change_pin(&self) -> bool {
        !self.status.pin_configured || !self.status.locked || self.status.is_ap_client
    }

    pub fn check_save(&self) -> Result<(), ActionError> {
        if self.is_locked() {
            return Err(ActionError::SaveLocked);
        }
        Ok(())
    }

    pub fn check_command(&self, command: &Outbound) -> Result<(), ActionError> {
        if command.requires_admin() && self.is_locked() {
            return Err(ActionError::ActionLocked);
        }
        Ok(())
    }

    pub fn check_reboot(&self) -> Result<(), ActionError> {
        if self.is_rate_limited() {
            return Err(ActionError::RateLimited {
                seconds: self.status.lockout_seconds,
            });
        }
        Ok(())
    }

    pub fn request_unlock(&mut self, pin: &str) -> Result<Outbound, ActionError> {
        if !self.status.pin_configured {
            return Err(ActionError::NoPinConfigured);
        }
        self.check_reboot()?;
        let pin = pin.trim();
        if pin.len() < ADMIN_PIN_MIN_LEN {
            return Err(ActionError::PinTooShort);
        }
        self.awaiting_auth = true;
        Ok(Outbound::AdminAuth {
            pin: pin.to_owned(),
        })
    }

    pub fn lock(&self) -> Result<Outbound, ActionError> {
        if !self.status.pin_configured {
            return Err(ActionError::NoPinConfigured);
        }
        Ok(Outbound::AdminLock)
    }

    pub fn set_pin(&self, pin: &str) -> Result<Outbound, ActionError> {
        if !self.can_change_pin() {
            return Err(ActionError::PinChangeLocked);
        }
        let pin = pin.trim();
        if !is_valid_admin_pin(pin) {
            return Err(ActionError::PinFormat);
        }
        Ok(Outbound::SetAdminPin {
            pin: pin.to_owned(),
        })
    }

    pub fn clear_pin(&self) -> Result<Outbound, ActionError> {
        if !self.status.pin_configured {
            return Err(ActionError::NoPinConfigured);
        }
        if !self.can_change_pin() {
            return Err(ActionError::PinChangeLocked);
        }
        Ok(Outbound::ClearAdminPin)
    }

    pub fn refresh(&self) -> Outbound {
        Outbound::GetAdminState
    }

    /// Replaces the mirror with a device push and restarts both countdowns.
    /// Resolves a pending PIN submission, if any.
    pub fn apply_server_state(&mut self, status: AdminStatus, now: Instant) -> Option<PinOutcome> {
        debug!(
            locked = status.locked,
            pin_configured = status.pin_configured,
            remaining = status.remaining_seconds,
            lockout = status.lockout_seconds,
            "admin state"
        );
        self.status = status;
        self.unlock_tick_at = (!self.status.locked && self.status.remaining_seconds > 0)
            .then(|| now + COUNTDOWN_STEP);
        self.lockout_tick_at = (self.status.lockout_seconds > 0).then(|| now + COUNTDOWN_STEP);

        if !std::mem::take(&mut self.awaiting_auth) {
            return None;
        }
        let outcome = if !self.status.locked {
            PinOutcome::Unlocked
        } else if self.status.lockout_seconds > 0 {
            PinOutcome::RateLimited {
                seconds: self.status.lockout_seconds,
            }
        } else {
            PinOutcome::Incorrect
        };
        info!(?outcome, "admin pin answered");
        Some(outcome)
    }

    /// Advances the local countdowns. Returns the re-query to send when the
    /// unlock window runs out.
    pub fn poll(&mut self, now: Instant) -> Option<Outbound> {
        while let Some(at) = self.lockout_tick_at {
            if now < at {
                break;
            }
            self.status.lockout_seconds = self.status.lockout_seconds.saturating_sub(1);
            self.lockout_tick_at = (self.status.lockout_seconds > 0).then(|| at + COUNTDOWN_STEP);
        }

        while let Some(at) = self.unlock_tick_at {
            if now < at {
                break;
            }
            self.status.remaining_seconds = self.status.remaining_seconds.saturating_sub(1);
            if self.status.remaining_seconds == 0 {
                self.unlock_tick_at = None;
                self.status.locked = true;
                info!("admin unlock window elapsed, confirming with device");
                return Some(Outbound::GetAdminState);
            }
            self.unlock_tick_at = Some(at + COUNTDOWN_STEP);
        }
        None
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [self.unlock_tick_at, self.lockout_tick_at]
            .into_iter()
            .flatten()
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locked() -> AdminStatus {
        AdminStatus {
            locked: true,
            pin_configured: true,
            ..AdminStatus::default()
        }
    }

    #[test]
    fn unconfigured_allows_everything() {
        let guard = AdminGuard::new();
        assert_eq!(guard.mode(), AccessMode::Unconfigured);
        assert!(guard.check_save().is_ok());
        assert!(guard.check_command(&Outbound::FactoryReset).is_ok());
    }

    #[test]
    fn locked_refuses_saves_and_protected_commands() {
        let mut guard = AdminGuard::new();
        guard.apply_server_state(locked(), Instant::now());
        assert_eq!(guard.check_save(), Err(ActionError::SaveLocked));
        assert_eq!(
            guard.check_command(&Outbound::FactoryReset),
            Err(ActionError::ActionLocked)
        );
        assert!(guard.check_command(&Outbound::CenterEyes).is_ok());
        assert!(guard.check_reboot().is_ok());
    }

    #[test]
    fn pin_submission_resolves_on_next_push() {
        let now = Instant::now();
        let mut guard = AdminGuard::new();
        guard.apply_server_state(locked(), now);

        assert_eq!(guard.request_unlock("12"), Err(ActionError::PinTooShort));
        assert!(!guard.awaiting_auth());

        guard.request_unlock("1234").unwrap();
        assert_eq!(guard.apply_server_state(locked(), now), Some(PinOutcome::Incorrect));
        assert_eq!(guard.apply_server_state(locked(), now), None);

        guard.request_unlock("1234").unwrap();
        let limited = AdminStatus {
            lockout_seconds: 300,
            ..locked()
        };
        assert_eq!(
            guard.apply_server_state(limited, now),
            Some(PinOutcome::RateLimited { seconds: 300 })
        );
        assert_eq!(
            guard.request_unlock("1234"),
            Err(ActionError::RateLimited { seconds: 300 })
        );
        assert!(guard.check_reboot().is_err());
    }

    #[test]
    fn unlock_countdown_requeries_at_zero() {
        let t0 = Instant::now();
        let mut guard = AdminGuard::new();
        guard.request_unlock("1234").ok();
        let unlocked = AdminStatus {
            locked: false,
            pin_configured: true,
            remaining_seconds: 3,
            ..AdminStatus::default()
        };
        guard.apply_server_state(unlocked, t0);
        assert_eq!(guard.mode(), AccessMode::Unlocked { remaining_seconds: 3 });

        assert_eq!(guard.poll(t0 + Duration::from_millis(1500)), None);
        assert_eq!(guard.mode(), AccessMode::Unlocked { remaining_seconds: 2 });
        assert_eq!(
            guard.poll(t0 + Duration::from_secs(3)),
            Some(Outbound::GetAdminState)
        );
        assert_eq!(guard.mode(), AccessMode::Locked);
        assert_eq!(guard.next_deadline(), None);
    }

    #[test]
    fn push_replaces_running_countdown() {
        let t0 = Instant::now();
        let mut guard = AdminGuard::new();
        guard.apply_server_state(
            AdminStatus {
                pin_configured: true,
                remaining_seconds: 2,
                ..AdminStatus::default()
            },
            t0,
        );
        guard.apply_server_state(
            AdminStatus {
                pin_configured: true,
                remaining_seconds: 900,
                ..AdminStatus::default()
            },
            t0 + Duration::from_millis(1500),
        );
        assert_eq!(guard.poll(t0 + Duration::from_secs(3)), None);
        assert_eq!(
            guard.mode(),
            AccessMode::Unlocked {
                remaining_seconds: 899
            }
        );
    }

    #[test]
    fn lockout_counts_down_locally() {
        let t0 = Instant::now();
        let mut guard = AdminGuard::new();
        guard.apply_server_state(
            AdminStatus {
                lockout_seconds: 2,
                ..locked()
            },
            t0,
        );
        guard.poll(t0 + Duration::from_secs(2));
        assert!(!guard.is_rate_limited());
        assert!(guard.request_unlock("1234").is_ok());
    }

    #[test]
    fn pin_change_rules() {
        let mut guard = AdminGuard::new();
        assert!(guard.set_pin("1234").is_ok());
        assert_eq!(guard.set_pin("12ab"), Err(ActionError::PinFormat));
        assert_eq!(guard.clear_pin(), Err(ActionError::NoPinConfigured));

        guard.apply_server_state(locked(), Instant::now());
        assert_eq!(guard.set_pin("1234"), Err(ActionError::PinChangeLocked));

        guard.apply_server_state(
            AdminStatus {
                is_ap_client: true,
                ..locked()
            },
            Instant::now(),
        );
        assert!(guard.set_pin("123456").is_ok());
        assert!(guard.clear_pin().is_ok());
    }
}

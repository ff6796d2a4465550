use thiserror::Error;

/// A user action refused before anything was sent.
///
/// `Display` is the notification text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("SSID is required")]
    SsidRequired,
    #[error("Password must be at least 8 characters")]
    ApPasswordTooShort,
    #[error("Min interval must be less than max")]
    IntervalOrder,
    #[error("Invalid number for {field}")]
    InvalidNumber { field: &'static str },
    #[error("Cannot save: Admin lock is active")]
    SaveLocked,
    #[error("Action blocked: Admin lock is active")]
    ActionLocked,
    #[error("Too many failed attempts, try again in {seconds}s")]
    RateLimited { seconds: u32 },
    #[error("PIN must be at least 4 digits")]
    PinTooShort,
    #[error("PIN must be 4-6 digits")]
    PinFormat,
    #[error("Unlock admin access to change the PIN")]
    PinChangeLocked,
    #[error("No admin PIN is configured")]
    NoPinConfigured,
    #[error("GPIO pin must be between 0 and {max}")]
    PinOutOfRange { max: u8 },
    #[error("No servo at index {0}")]
    UnknownServo(usize),
    #[error("No network slot at index {0}")]
    UnknownNetworkSlot(usize),
    #[error("Unknown field {key} in {section}")]
    UnknownField { section: &'static str, key: String },
    #[error("Field {key} expects a {expected} value")]
    FieldType { key: String, expected: &'static str },
    #[error("Calibration data not received yet")]
    CalibrationNotLoaded,
    #[error("No impulses selected")]
    NoImpulseSelected,
    #[error("An impulse is already playing")]
    ImpulsePlaying,
    #[error("Not available while an auto mode is running")]
    AutoModeActive,
}

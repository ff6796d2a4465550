pub mod config;
pub mod message;
pub mod state;

use std::collections::BTreeSet;

use thiserror::Error;

pub use config::*;
pub use message::*;
pub use state::*;

pub const NUM_SERVOS: usize = 6;
pub const SERVO_ANGLE_MAX: u8 = 180;
pub const FACTORY_SERVO_MIN: u8 = 89;
pub const FACTORY_SERVO_CENTER: u8 = 90;
pub const FACTORY_SERVO_MAX: u8 = 91;
pub const MAX_GPIO_PIN: u8 = 39;
pub const SERVO_NAMES: [&str; NUM_SERVOS] = ["L-X", "L-Y", "L-Lid", "R-X", "R-Y", "R-Lid"];
pub const DEFAULT_SERVO_PINS: [u8; NUM_SERVOS] = [32, 33, 25, 26, 27, 14];

pub const WEBSOCKET_PATH: &str = "/ws";
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

pub const ADMIN_PIN_MIN_LEN: usize = 4;
pub const ADMIN_PIN_MAX_LEN: usize = 6;
pub const ADMIN_MAX_FAILED_ATTEMPTS: u32 = 3;
pub const ADMIN_LOCKOUT_SECS: u32 = 300;
pub const ADMIN_UNLOCK_SECS: u32 = 900;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("message exceeds {max} bytes")]
    MessageTooLarge { max: usize },
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub fn decode_inbound(text: &str) -> Result<Inbound, CoreError> {
    check_size(text)?;
    serde_json::from_str(text).map_err(|err| CoreError::Serialization(err.to_string()))
}

pub fn encode_outbound(message: &Outbound) -> Result<String, CoreError> {
    serde_json::to_string(message).map_err(|err| CoreError::Serialization(err.to_string()))
}

/// Device-side counterpart of [`decode_inbound`].
pub fn decode_outbound(text: &str) -> Result<Outbound, CoreError> {
    check_size(text)?;
    serde_json::from_str(text).map_err(|err| CoreError::Serialization(err.to_string()))
}

/// Device-side counterpart of [`encode_outbound`].
pub fn encode_inbound(message: &Inbound) -> Result<String, CoreError> {
    serde_json::to_string(message).map_err(|err| CoreError::Serialization(err.to_string()))
}

fn check_size(text: &str) -> Result<(), CoreError> {
    if text.len() > MAX_MESSAGE_BYTES {
        return Err(CoreError::MessageTooLarge {
            max: MAX_MESSAGE_BYTES,
        });
    }
    Ok(())
}

/// Reduce user input to a valid mDNS label: lowercase, `[a-z0-9-]` only, at
/// most 63 characters, never empty.
pub fn sanitize_hostname(input: &str) -> String {
    let cleaned: String = input
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .take(MAX_HOSTNAME_LEN)
        .collect();

    if cleaned.is_empty() {
        DEFAULT_MDNS_HOSTNAME.to_owned()
    } else {
        cleaned
    }
}

/// Shape accepted by `setAdminPin`: 4 to 6 ASCII digits.
pub fn is_valid_admin_pin(pin: &str) -> bool {
    (ADMIN_PIN_MIN_LEN..=ADMIN_PIN_MAX_LEN).contains(&pin.len())
        && pin.chars().all(|c| c.is_ascii_digit())
}

/// Split a comma-joined impulse selection into its set of tokens.
pub fn selection_set(selection: &str) -> BTreeSet<String> {
    selection
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

pub fn join_selection(tokens: &BTreeSet<String>) -> String {
    tokens.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_is_lowercased_and_stripped() {
        assert_eq!(sanitize_hostname("My Device!!"), "mydevice");
        assert_eq!(sanitize_hostname("  Eyes-01 "), "eyes-01");
    }

    #[test]
    fn hostname_falls_back_when_nothing_survives() {
        assert_eq!(sanitize_hostname("!!!"), DEFAULT_MDNS_HOSTNAME);
        assert_eq!(sanitize_hostname(""), DEFAULT_MDNS_HOSTNAME);
    }

    #[test]
    fn hostname_is_truncated() {
        let long = "a".repeat(100);
        assert_eq!(sanitize_hostname(&long).len(), MAX_HOSTNAME_LEN);
    }

    #[test]
    fn admin_pin_shape() {
        assert!(is_valid_admin_pin("1234"));
        assert!(is_valid_admin_pin("123456"));
        assert!(!is_valid_admin_pin("123"));
        assert!(!is_valid_admin_pin("1234567"));
        assert!(!is_valid_admin_pin("12a4"));
    }

    #[test]
    fn selection_ignores_order_and_spacing() {
        assert_eq!(
            selection_set("startle, distraction"),
            selection_set("distraction,startle")
        );
        assert!(selection_set(" , ").is_empty());
        assert_eq!(
            join_selection(&selection_set("startle,distraction")),
            "distraction,startle"
        );
    }

    #[test]
    fn malformed_inbound_is_an_error() {
        assert!(decode_inbound("not json").is_err());
        assert!(decode_inbound(r#"{"type":"noSuchKind"}"#).is_err());
        assert!(decode_inbound(r#"{"line":"missing type"}"#).is_err());

        let oversized = format!(r#"{{"type":"log","line":"{}"}}"#, "x".repeat(MAX_MESSAGE_BYTES));
        assert!(matches!(
            decode_inbound(&oversized),
            Err(CoreError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn state_broadcast_decodes() {
        let inbound = decode_inbound(
            r#"{"type":"state","servos":[{"pin":13,"min":80,"center":90,"max":100,"invert":false,"pos":90,"name":"L-X"}],"mode":{"current":"follow"}}"#,
        )
        .unwrap();
        let Inbound::State(state) = inbound else {
            panic!("expected state");
        };
        assert_eq!(state.servos[0].pin, 13);
        assert_eq!(state.servos[0].min, 80);
        assert_eq!(state.mode.current, "follow");
    }
}

//! Controller for a networked animatronic eye pair.
//!
//! [`app::AppContext`] owns every piece of client state and is driven by
//! [`runtime`], which keeps one WebSocket session to the device alive.

pub mod admin;
pub mod app;
pub mod calibration;
pub mod config_store;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod locks;
pub mod projection;
pub mod repl;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod throttle;
pub mod upload;

pub use app::{AppContext, ClientCommand, Notice, NoticeLevel, Tab};
pub use error::ActionError;
pub use runtime::{ClientEvent, ClientHandle, RuntimeCommand, spawn_client};
pub use session::{ConnectionStatus, SessionConfig, endpoint_from_origin};

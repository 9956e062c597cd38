pub mod alert;
pub mod config;
pub mod error;
pub mod vitals;

pub use alert::{AlertEvent, AlertPayload, AlertReason, Severity, VitalsSnapshot, ALERT_RAISED};
pub use config::Config;
pub use error::CoreError;
pub use vitals::{extract_sample, VitalsSample, VITALS_RECORDED};

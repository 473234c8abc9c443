pub mod error;
pub(crate) mod lock;
pub mod memory;
pub mod telemetry;

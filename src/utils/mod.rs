pub mod accounting;
pub mod clock;
pub mod log_sink;
pub mod net_utils;
pub mod pacing;
pub mod probe;
pub mod telemetry;
pub mod ui;

pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod settings;
pub mod status;
pub mod telemetry;

pub mod patch;
mod service;

pub use service::SettingsManager;

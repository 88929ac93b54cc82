mod service;

pub use service::{HistoryQuery, TelemetryService, TemperatureReadingInput};

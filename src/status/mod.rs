mod service;

pub use service::{StatusAggregator, SystemStatusView};

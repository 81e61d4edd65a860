mod configuration;

pub use configuration::{Configuration, DateRangeMode};

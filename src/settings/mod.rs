// Settings module
// Timing, volume and asset configuration persisted as JSON

pub mod settings;

pub use settings::{AmbientSettings, AppSettings, DriverSettings, EffectClip, EffectSettings};

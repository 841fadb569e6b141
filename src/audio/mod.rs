// Audio module
// Ambient track control with volume ducking, plus one-shot sound effects

pub mod ambient;
pub mod clock;
pub mod effects;
pub mod fade;
pub mod handle;
pub mod resource;
pub mod scheduler;

#[cfg(feature = "device")]
pub mod decoder;
#[cfg(feature = "device")]
pub mod device;
#[cfg(feature = "device")]
pub mod output;

pub use ambient::{AmbientController, AmbientStatus, DuckLevel, StartOutcome};
pub use clock::{Clock, TokioClock};
pub use effects::{Effect, EffectPlayer};
pub use handle::{AmbientHandle, FrameDriver};
pub use resource::{AudioResource, NullFactory, ResourceFactory, TrackSource};

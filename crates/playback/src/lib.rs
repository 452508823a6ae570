//! Animated trip playback over a slippy map.
//!
//! [`TripEngine`] takes batches of trips, renders each as a projected path
//! on an [`OverlaySurface`], and sweeps a short trace along every path on
//! the playback clock. Viewport changes re-project the paths without
//! disturbing playback progress.

pub mod config;
pub mod engine;
pub mod intake;
pub mod overlay;
pub mod path;
pub mod projection;
pub mod scheduler;
pub mod sync;
pub mod trip;

pub use config::*;
pub use engine::*;
pub use intake::*;
pub use overlay::*;
pub use path::*;
pub use projection::*;
pub use scheduler::*;
pub use sync::*;
pub use trip::*;

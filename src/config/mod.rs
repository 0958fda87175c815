//! Configuration for bps.
//!
//! Timing templates and the optional on-disk settings file.

mod settings;
mod timing;

pub use settings::{Paths, Settings};
pub use timing::TimingProfile;

//! Core input types: the port range to scan and the targets to scan it on.
//!
//! These types reject invalid input at parse time so the scanning engine
//! only ever sees well-formed ranges and resolved IPv4 targets.

mod port;
mod target;

pub use port::{PortError, PortRange};
pub use target::{resolve_targets, Resolution, Target, TargetError, TargetSpec};

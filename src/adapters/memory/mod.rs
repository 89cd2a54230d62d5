//! In-memory adapters.
//!
//! Deterministic stand-ins for the control plane and the signal source, with
//! fault injection for exercising every compensation path.

pub mod control_plane;
pub mod signal_source;

pub use control_plane::{ControlCall, Fault, InMemoryControlPlane};
pub use signal_source::StaticSignalSource;

pub mod control_plane;
pub mod cooldown_store;
pub mod errors;
pub mod signal_source;

pub use control_plane::{ApplyResult, ControlPlane};
pub use cooldown_store::CooldownStore;
pub use errors::{ControlPlaneError, DatabaseError, SignalError};
pub use signal_source::{DiagnosticFilter, SignalSource};

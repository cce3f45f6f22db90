//! Error Types
//!
//! This module defines the fault taxonomy used throughout Credrotate.
//! Callers are expected to branch on the fault kind, never on message text.
//!
//! The error types are organized into focused submodules:
//! - `rotation`: Faults surfaced by the rotation state machine
//! - `backend`: Secret backend transport and persistence errors

mod backend;
mod rotation;

pub use backend::{BackendError, BackendKind, BackendResult};
pub use rotation::{ConnectionFailureKind, FaultKind, RotationError, RotationResult};

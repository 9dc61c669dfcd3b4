//! Admission control: who is asking, and may they proceed.

mod gate;
mod identity;

pub use gate::{AdmissionDenied, AdmissionGate, Operation, Outcome};
pub use identity::{IdentityResolver, UNKNOWN_CLIENT, X_FORWARDED_FOR, X_REAL_IP};

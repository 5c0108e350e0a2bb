//! Domain layer - Pure business abstractions
//!
//! Error taxonomy and the collaborator traits the transaction core calls out to.
//! No HTTP types live here.

pub mod collaborators;
pub mod errors;

pub use collaborators::{Authorizer, NotificationKind, Notifier};
pub use errors::DomainError;

//! Domain layer for Reframe
//!
//! Contains the session entity, its status state machine, value objects and
//! domain errors. This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;

//! Reframe HTTP presentation layer
//!
//! Session API and generated-media serving on top of the application
//! services.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use extract::{Owner, USER_ID_HEADER};
pub use routes::create_router;
pub use state::AppState;

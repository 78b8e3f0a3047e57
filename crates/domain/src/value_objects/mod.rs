//! Value Objects - Immutable, identity-less domain primitives

mod session_id;
mod session_status;
mod user_id;

pub use session_id::SessionId;
pub use session_status::SessionStatus;
pub use user_id::UserId;

//! Domain entities - Objects with identity and lifecycle

mod audio_file;
mod session;

pub use audio_file::AudioFile;
pub use session::{Session, SessionUpdate};

//! Infrastructure adapters
//!
//! Connect the pipeline's stage ports to the speech and inference clients.

mod reframer_adapter;
mod speech_adapter;

pub use reframer_adapter::{DEFAULT_REFRAMING_PROMPT, ReframerAdapter, map_inference_error};
pub use speech_adapter::{SpeechAdapter, VoiceDirectory, map_speech_error};

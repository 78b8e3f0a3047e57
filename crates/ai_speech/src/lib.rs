//! AI Speech - speech-to-text and text-to-speech clients
//!
//! - `SpeechToText` turns an audio recording into text
//! - `TextToSpeech` renders text as audio in a chosen voice
//!
//! `OpenAISpeechProvider` implements both against the OpenAI audio API
//! (or any server exposing the same `/audio/transcriptions` and
//! `/audio/speech` endpoints).

pub mod config;
pub mod error;
pub mod ports;
pub mod providers;
pub mod types;

pub use config::SpeechConfig;
pub use error::SpeechError;
pub use ports::{SpeechToText, TextToSpeech};
pub use providers::openai::OpenAISpeechProvider;
pub use types::{AudioData, AudioFormat, Transcription};

//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod reframer_port;
mod session_store;
mod stage_error;
mod synthesizer_port;
mod transcriber_port;

#[cfg(test)]
pub use reframer_port::MockReframerPort;
pub use reframer_port::ReframerPort;
#[cfg(test)]
pub use session_store::MockSessionStore;
pub use session_store::SessionStore;
pub use stage_error::StageError;
#[cfg(test)]
pub use synthesizer_port::MockSynthesizerPort;
pub use synthesizer_port::SynthesizerPort;
#[cfg(test)]
pub use transcriber_port::MockTranscriberPort;
pub use transcriber_port::TranscriberPort;

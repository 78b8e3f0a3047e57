//! Session status state machine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Status of a reframing session
///
/// The happy path is
/// `created -> audio_uploaded -> processing -> transcribing -> transcribed ->
/// reframing -> reframed -> generating_audio -> completed`. Every status may
/// move to `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session exists but has no audio yet
    Created,
    /// At least one audio file has been attached
    AudioUploaded,
    /// A run has been accepted and is queued or starting
    Processing,
    /// Speech-to-text in progress
    Transcribing,
    /// Transcript stored
    Transcribed,
    /// Reframing in progress
    Reframing,
    /// Reframed text stored
    Reframed,
    /// Speech synthesis in progress
    GeneratingAudio,
    /// Run finished; synthesized audio may or may not be present
    Completed,
    /// Run aborted on a critical failure
    Error,
}

impl SessionStatus {
    /// All statuses in pipeline order, `Error` last
    pub const ALL: [Self; 10] = [
        Self::Created,
        Self::AudioUploaded,
        Self::Processing,
        Self::Transcribing,
        Self::Transcribed,
        Self::Reframing,
        Self::Reframed,
        Self::GeneratingAudio,
        Self::Completed,
        Self::Error,
    ];

    /// Wire name of the status
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AudioUploaded => "audio_uploaded",
            Self::Processing => "processing",
            Self::Transcribing => "transcribing",
            Self::Transcribed => "transcribed",
            Self::Reframing => "reframing",
            Self::Reframed => "reframed",
            Self::GeneratingAudio => "generating_audio",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// A run has reached its end
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// A run owns the session right now
    #[must_use]
    pub const fn is_in_pipeline(&self) -> bool {
        matches!(
            self,
            Self::Processing
                | Self::Transcribing
                | Self::Transcribed
                | Self::Reframing
                | Self::Reframed
                | Self::GeneratingAudio
        )
    }

    /// Whether a fresh run may be started from this status
    #[must_use]
    pub const fn can_begin_processing(&self) -> bool {
        matches!(self, Self::AudioUploaded | Self::Completed | Self::Error)
    }

    /// The status the orchestrator writes after this one on the happy path
    #[must_use]
    pub const fn next_stage(&self) -> Option<Self> {
        match self {
            Self::Processing => Some(Self::Transcribing),
            Self::Transcribing => Some(Self::Transcribed),
            Self::Transcribed => Some(Self::Reframing),
            Self::Reframing => Some(Self::Reframed),
            Self::Reframed => Some(Self::GeneratingAudio),
            Self::GeneratingAudio => Some(Self::Completed),
            Self::Created
            | Self::AudioUploaded
            | Self::Completed
            | Self::Error => None,
        }
    }

    /// Check whether `next` may follow the current status
    ///
    /// Stages only move forward one step at a time. The only way back is a
    /// fresh upload or trigger once the previous run has ended.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match next {
            Self::Error => true,
            Self::AudioUploaded => matches!(self, Self::Created | Self::AudioUploaded)
                || self.is_terminal(),
            Self::Processing => self.can_begin_processing(),
            Self::Created => false,
            _ => self.next_stage() == Some(next),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::ValidationError(format!("unknown session status '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn happy_path_is_a_chain_of_legal_transitions() {
        let path = [
            SessionStatus::Created,
            SessionStatus::AudioUploaded,
            SessionStatus::Processing,
            SessionStatus::Transcribing,
            SessionStatus::Transcribed,
            SessionStatus::Reframing,
            SessionStatus::Reframed,
            SessionStatus::GeneratingAudio,
            SessionStatus::Completed,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn every_status_can_fail() {
        for status in SessionStatus::ALL {
            assert!(status.can_transition_to(SessionStatus::Error));
        }
    }

    #[test]
    fn stages_cannot_be_skipped() {
        assert!(!SessionStatus::Processing.can_transition_to(SessionStatus::Reframing));
        assert!(!SessionStatus::Transcribed.can_transition_to(SessionStatus::Completed));
        assert!(!SessionStatus::AudioUploaded.can_transition_to(SessionStatus::Transcribing));
    }

    #[test]
    fn stages_never_regress() {
        assert!(!SessionStatus::Reframed.can_transition_to(SessionStatus::Transcribing));
        assert!(!SessionStatus::Completed.can_transition_to(SessionStatus::GeneratingAudio));
    }

    #[test]
    fn uploads_are_refused_mid_run() {
        assert!(!SessionStatus::Transcribing.can_transition_to(SessionStatus::AudioUploaded));
        assert!(SessionStatus::Completed.can_transition_to(SessionStatus::AudioUploaded));
        assert!(SessionStatus::Error.can_transition_to(SessionStatus::AudioUploaded));
    }

    #[test]
    fn fresh_trigger_only_from_idle_states() {
        assert!(SessionStatus::AudioUploaded.can_transition_to(SessionStatus::Processing));
        assert!(SessionStatus::Completed.can_transition_to(SessionStatus::Processing));
        assert!(SessionStatus::Error.can_transition_to(SessionStatus::Processing));
        assert!(!SessionStatus::Created.can_transition_to(SessionStatus::Processing));
        assert!(!SessionStatus::Processing.can_transition_to(SessionStatus::Processing));
        assert!(!SessionStatus::Reframing.can_transition_to(SessionStatus::Processing));
    }

    #[test]
    fn pipeline_and_terminal_flags() {
        assert!(SessionStatus::Processing.is_in_pipeline());
        assert!(SessionStatus::GeneratingAudio.is_in_pipeline());
        assert!(!SessionStatus::Completed.is_in_pipeline());
        assert!(!SessionStatus::AudioUploaded.is_in_pipeline());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Error.is_terminal());
        assert!(!SessionStatus::Reframed.is_terminal());
    }

    #[test]
    fn parses_every_wire_name() {
        for status in SessionStatus::ALL {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("done".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&SessionStatus::GeneratingAudio).unwrap();
        assert_eq!(json, "\"generating_audio\"");
    }

    fn any_status() -> impl Strategy<Value = SessionStatus> {
        prop::sample::select(SessionStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn stage_statuses_only_follow_their_predecessor(from in any_status(), to in any_status()) {
            let is_stage = !matches!(
                to,
                SessionStatus::Created
                    | SessionStatus::AudioUploaded
                    | SessionStatus::Processing
                    | SessionStatus::Error
            );
            if is_stage {
                prop_assert_eq!(from.can_transition_to(to), from.next_stage() == Some(to));
            }
        }

        #[test]
        fn nothing_returns_to_created(from in any_status()) {
            prop_assert!(!from.can_transition_to(SessionStatus::Created));
        }
    }
}

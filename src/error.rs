//! Error types for reading scores and building Antescofo timelines.

use thiserror::Error;

use crate::rational::{format_duration, Rational};

fn beat_str(beat: &Rational) -> String {
    format_duration(*beat)
}

/// Failures raised while accumulating events into the writer's timeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    /// A beat could not be placed on the absolute time axis.
    #[error(
        "inconsistent beat position: measure {measure}, beat {}, pitch {pitch}",
        beat_str(.beat)
    )]
    Inconsistency {
        measure: i32,
        beat: Rational,
        pitch: i32,
    },

    /// A note started inside an earlier, longer non-rest event.
    #[error(
        "note {pitch} at beat {} (measure {measure}) overlaps the event at beat {}",
        beat_str(.beat),
        beat_str(.occupant_position)
    )]
    UnsupportedOverlap {
        measure: i32,
        beat: Rational,
        pitch: i32,
        occupant_position: Rational,
    },

    /// Splicing one event spawned more follow-up insertions than allowed.
    #[error(
        "too many spliced fragments while inserting at measure {measure}, beat {}",
        beat_str(.beat)
    )]
    SpliceLimit { measure: i32, beat: Rational },
}

impl TimelineError {
    /// Whether the conversion can carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TimelineError::UnsupportedOverlap { .. })
    }

    pub fn measure(&self) -> i32 {
        match self {
            TimelineError::Inconsistency { measure, .. }
            | TimelineError::UnsupportedOverlap { measure, .. }
            | TimelineError::SpliceLimit { measure, .. } => *measure,
        }
    }

    pub fn beat(&self) -> Rational {
        match self {
            TimelineError::Inconsistency { beat, .. }
            | TimelineError::UnsupportedOverlap { beat, .. }
            | TimelineError::SpliceLimit { beat, .. } => *beat,
        }
    }
}

/// Top-level conversion error.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("unsupported root element: '{0}'. Only 'score-partwise' is supported.")]
    UnsupportedRoot(String),

    #[error("MXL archive error: {0}")]
    Archive(String),

    /// The timeline became inconsistent; `partial` holds the score
    /// rendered from everything accumulated before the failure.
    #[error("{source}")]
    Timeline {
        #[source]
        source: TimelineError,
        partial: String,
    },
}

impl ConvertError {
    /// The best-effort score dump attached to timeline failures.
    pub fn partial_score(&self) -> Option<&str> {
        match self {
            ConvertError::Timeline { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

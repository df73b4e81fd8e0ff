//! Element tree: a parallel, printable representation of a converted score.

pub mod element;
pub mod note_status;

pub use element::{Element, ElementKind, NoteData, NoteDuration, Param};
pub use note_status::{FormattingState, NoteStatus, MAX_VOICES};

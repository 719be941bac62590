//! Triage core: pure lifecycle types, the profile selection state machine and
//! the pick/commit helpers it drives.
mod commit;
mod phase;
mod picks;
mod selection;

pub use commit::{ManualSelection, ProfileChoice, SelectionCommit};
pub use phase::Phase;
pub use picks::{
    file_options, normalize_answer, picks_from_answer, profile_rule, resolve_targets,
    PromptOption, SelectionRule, SubmissionKind, TargetFile, TargetListing, TargetPick,
    TargetResolution,
};
pub use selection::{update, SelectionMsg, SelectionState};

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::TargetPick;

/// A profile attached to one pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileChoice {
    pub profile: String,
    pub pick: String,
}

/// A non-empty list of profile choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualSelection(Vec<ProfileChoice>);

impl ManualSelection {
    pub fn new(choices: Vec<ProfileChoice>) -> Option<Self> {
        if choices.is_empty() {
            None
        } else {
            Some(Self(choices))
        }
    }

    pub fn choices(&self) -> &[ProfileChoice] {
        &self.0
    }
}

/// The payload committed for a sample: either automatic profiles for a set of
/// picks or an explicit profile per pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCommit {
    Automatic { pick: Vec<String> },
    Manual(ManualSelection),
}

impl SelectionCommit {
    pub fn automatic(picks: &[TargetPick]) -> Self {
        SelectionCommit::Automatic {
            pick: picks.iter().map(|pick| pick.path.clone()).collect(),
        }
    }

    /// Falls back to automatic profiles for `picks` when no choice was made.
    pub fn from_choices(picks: &[TargetPick], choices: Vec<ProfileChoice>) -> Self {
        match ManualSelection::new(choices) {
            Some(manual) => SelectionCommit::Manual(manual),
            None => SelectionCommit::automatic(picks),
        }
    }

    pub fn is_automatic(&self) -> bool {
        matches!(self, SelectionCommit::Automatic { .. })
    }
}

impl Serialize for SelectionCommit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = serializer.serialize_struct("SelectionCommit", 2)?;
        match self {
            SelectionCommit::Automatic { pick } => {
                body.serialize_field("auto", &true)?;
                body.serialize_field("pick", pick)?;
            }
            SelectionCommit::Manual(manual) => {
                body.serialize_field("auto", &false)?;
                body.serialize_field("profiles", manual.choices())?;
            }
        }
        body.end()
    }
}

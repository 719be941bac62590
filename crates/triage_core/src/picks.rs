/// Origin of a submission: an uploaded file (possibly an archive) or a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    File,
    Url,
}

impl SubmissionKind {
    /// Anything that is not a URL submission is treated as file-backed.
    pub fn from_wire(kind: &str) -> Self {
        if kind.eq_ignore_ascii_case("url") {
            SubmissionKind::Url
        } else {
            SubmissionKind::File
        }
    }
}

/// One file listed by the static report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFile {
    pub name: String,
    pub path: String,
    /// Recommended for analysis by the service.
    pub emphasized: bool,
}

/// An addressable sub-target of a sample that profiles are attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPick {
    pub name: String,
    pub path: String,
}

impl From<&TargetFile> for TargetPick {
    fn from(file: &TargetFile) -> Self {
        Self {
            name: file.name.clone(),
            path: file.path.clone(),
        }
    }
}

/// What the static report says about the sample's targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetListing {
    pub kind: SubmissionKind,
    pub target: String,
    pub files: Vec<TargetFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetResolution {
    /// Exactly one target exists; no prompt is needed.
    Implicit(TargetPick),
    /// Several files were found and the user has to choose.
    Prompt(Vec<TargetFile>),
    /// A file submission without any listed file.
    Empty,
}

pub fn resolve_targets(listing: TargetListing) -> TargetResolution {
    if listing.kind == SubmissionKind::Url {
        return TargetResolution::Implicit(TargetPick {
            name: listing.target.clone(),
            path: listing.target,
        });
    }
    let mut files = listing.files;
    match files.len() {
        0 => TargetResolution::Empty,
        1 => {
            let file = files.remove(0);
            TargetResolution::Implicit(TargetPick {
                name: file.name,
                path: file.path,
            })
        }
        _ => TargetResolution::Prompt(files),
    }
}

/// Turns a file prompt answer into picks. An empty answer selects the
/// emphasized files.
pub fn picks_from_answer(files: &[TargetFile], answer: &[usize]) -> Vec<TargetPick> {
    if answer.is_empty() {
        return files
            .iter()
            .filter(|file| file.emphasized)
            .map(TargetPick::from)
            .collect();
    }
    answer
        .iter()
        .filter_map(|&index| files.get(index))
        .map(TargetPick::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOption {
    pub label: String,
    pub emphasized: bool,
}

pub fn file_options(files: &[TargetFile]) -> Vec<PromptOption> {
    files
        .iter()
        .map(|file| PromptOption {
            label: file.name.clone(),
            emphasized: file.emphasized,
        })
        .collect()
}

/// Acceptance rule a prompt answer has to satisfy before it is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRule {
    /// Any answer, including an empty one.
    Any,
    /// At least one index.
    NonEmpty,
}

impl SelectionRule {
    pub fn accepts(self, answer: &[usize]) -> bool {
        match self {
            SelectionRule::Any => true,
            SelectionRule::NonEmpty => !answer.is_empty(),
        }
    }
}

/// With a single pick an empty profile answer means automatic profiles; with
/// several picks every pick needs at least one profile.
pub fn profile_rule(pick_count: usize) -> SelectionRule {
    if pick_count <= 1 {
        SelectionRule::Any
    } else {
        SelectionRule::NonEmpty
    }
}

/// Deduplicates an answer while keeping its order. Returns `None` when an
/// index is out of range.
pub fn normalize_answer(answer: &[usize], option_count: usize) -> Option<Vec<usize>> {
    let mut normalized = Vec::with_capacity(answer.len());
    for &index in answer {
        if index >= option_count {
            return None;
        }
        if !normalized.contains(&index) {
            normalized.push(index);
        }
    }
    Some(normalized)
}

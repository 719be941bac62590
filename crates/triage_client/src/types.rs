//! Wire types. Every field is optional on the wire so that report variants
//! across service versions decode into the same shapes.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use triage_core::{Phase, SubmissionKind, TargetFile, TargetListing};

use crate::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: String,
    pub status: String,
}

/// A submitted sample as listed, searched or streamed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Sample {
    pub id: String,
    pub status: String,
    pub kind: String,
    pub filename: String,
    pub url: String,
    pub private: bool,
    pub tasks: Vec<Task>,
    pub submitted: Option<String>,
    pub completed: Option<String>,
}

impl Sample {
    /// `None` when the service reports a phase this client does not know.
    pub fn phase(&self) -> Option<Phase> {
        Phase::parse(&self.status)
    }

    pub fn submission_kind(&self) -> SubmissionKind {
        SubmissionKind::from_wire(&self.kind)
    }

    /// The URL for URL submissions, the file name otherwise.
    pub fn target(&self) -> &str {
        if self.url.is_empty() {
            &self.filename
        } else {
            &self.url
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub network: String,
    /// Seconds.
    pub timeout: u64,
}

impl Profile {
    /// Identifier used when attaching the profile; falls back to the name.
    pub fn selector(&self) -> &str {
        if self.id.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }

    pub fn display_label(&self) -> String {
        format!(
            "{} (tags=[{}], network={}, timeout={}s)",
            self.name,
            self.tags.join(" "),
            if self.network.is_empty() {
                "default"
            } else {
                self.network.as_str()
            },
            self.timeout
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSample {
    #[serde(rename = "sample")]
    pub id: String,
    pub kind: String,
    pub size: u64,
    pub target: String,
    pub submitted: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportFile {
    #[serde(rename = "filename")]
    pub name: String,
    pub relpath: String,
    #[serde(rename = "filesize")]
    pub size: u64,
    pub md5: String,
    pub sha256: String,
    pub tags: Vec<String>,
    pub kind: String,
    pub filetype: String,
    pub depth: i32,
    /// Recommended for analysis by the service.
    pub selected: bool,
}

impl ReportFile {
    pub fn path(&self) -> &str {
        if self.relpath.is_empty() {
            &self.name
        } else {
            &self.relpath
        }
    }
}

/// The intermediate report available once static analysis is done.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticReport {
    pub version: String,
    pub sample: ReportSample,
    pub files: Vec<ReportFile>,
    pub unpack_count: u32,
    pub error_count: u32,
    /// Older reports carry the submission kind at the top level.
    #[serde(rename = "kind")]
    pub compat_kind: String,
}

impl StaticReport {
    pub fn submission_kind(&self) -> SubmissionKind {
        if self.sample.kind.is_empty() {
            SubmissionKind::from_wire(&self.compat_kind)
        } else {
            SubmissionKind::from_wire(&self.sample.kind)
        }
    }

    pub fn listing(&self) -> TargetListing {
        TargetListing {
            kind: self.submission_kind(),
            target: self.sample.target.clone(),
            files: self
                .files
                .iter()
                .map(|file| TargetFile {
                    name: file.name.clone(),
                    path: file.path().to_string(),
                    emphasized: file.selected,
                })
                .collect(),
        }
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Page<T> {
    pub records: Vec<T>,
    pub next: Option<String>,
}

#[derive(Deserialize)]
struct RawPage<T> {
    data: Option<Vec<T>>,
    next: Option<Value>,
}

impl<T: DeserializeOwned> Page<T> {
    pub(crate) fn from_value(value: Value) -> Result<Self, ClientError> {
        let raw: RawPage<T> = serde_json::from_value(value)?;
        Ok(Self {
            records: raw.data.unwrap_or_default(),
            next: raw.next.as_ref().and_then(cursor_text),
        })
    }
}

/// Cursors are opaque; strings and numbers are both seen in the wild and an
/// empty string means there is no next page.
fn cursor_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    Ok(serde_json::from_value(value)?)
}

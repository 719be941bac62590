//! Triage client: request execution, paged listings, event streams and the
//! interactive profile selection workflow.
mod client;
mod error;
mod events;
mod executor;
mod handoff;
mod paging;
mod selection;
mod settings;
mod types;

pub use client::{NewProfile, TriageClient};
pub use error::ClientError;
pub use events::{EventScope, EventStream, EVENT_BUFFER};
pub use executor::{ApiRequest, ByteStream, RequestBody, ReqwestExecutor, RequestExecutor};
pub use paging::{PageQuery, PagedSequence, Subset, PAGE_LIMIT};
pub use reqwest::Method;
pub use selection::{ProfileSelectionCoordinator, SelectionOutcome, SelectionPrompt};
pub use settings::{ClientSettings, DEFAULT_ROOT_URL};
pub use types::{Profile, ReportFile, ReportSample, Sample, StaticReport, Task};

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use triage_core::{ManualSelection, ProfileChoice, SelectionCommit};
use triage_logging::triage_info;

use crate::types::{decode, Page};
use crate::{
    ApiRequest, ClientError, ClientSettings, EventScope, EventStream, PageQuery, PagedSequence,
    Profile, ProfileSelectionCoordinator, ReqwestExecutor, RequestBody, RequestExecutor, Sample,
    SelectionPrompt, StaticReport, Subset,
};

/// High level access to the Triage API.
///
/// Cheap to clone; clones share the executor and its connection pool.
#[derive(Clone)]
pub struct TriageClient {
    executor: Arc<dyn RequestExecutor>,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    interactive: bool,
    profiles: &'a [ProfileChoice],
    /// Unlocks an encrypted archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

/// Parameters for a new profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProfile {
    pub name: String,
    pub tags: Vec<String>,
    /// `internet`, `drop` or empty for the service default.
    pub network: String,
    /// Seconds.
    pub timeout: u64,
}

impl TriageClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        Ok(Self::with_executor(Arc::new(ReqwestExecutor::new(
            settings,
        )?)))
    }

    pub fn with_executor(executor: Arc<dyn RequestExecutor>) -> Self {
        Self { executor }
    }

    pub fn owned_samples(&self, max_records: usize, cancel: &CancellationToken) -> PagedSequence {
        self.paged(PageQuery::Subset(Subset::Owned), max_records, cancel)
    }

    pub fn public_samples(&self, max_records: usize, cancel: &CancellationToken) -> PagedSequence {
        self.paged(PageQuery::Subset(Subset::Public), max_records, cancel)
    }

    pub fn search(
        &self,
        query: impl Into<String>,
        max_records: usize,
        cancel: &CancellationToken,
    ) -> PagedSequence {
        self.paged(PageQuery::Search(query.into()), max_records, cancel)
    }

    pub fn paged(
        &self,
        query: PageQuery,
        max_records: usize,
        cancel: &CancellationToken,
    ) -> PagedSequence {
        PagedSequence::fetch(self.executor.clone(), query, max_records, cancel)
    }

    pub fn sample_events(&self, sample_id: &str, cancel: &CancellationToken) -> EventStream {
        EventStream::subscribe(
            self.executor.clone(),
            EventScope::Sample(sample_id.to_string()),
            cancel,
        )
    }

    pub fn all_events(&self, cancel: &CancellationToken) -> EventStream {
        EventStream::subscribe(self.executor.clone(), EventScope::AllSamples, cancel)
    }

    pub async fn sample_by_id(&self, sample_id: &str) -> Result<Sample, ClientError> {
        let value = self
            .executor
            .execute(ApiRequest::get(format!("/v0/samples/{sample_id}")))
            .await?;
        decode(value)
    }

    pub async fn delete_sample(&self, sample_id: &str) -> Result<(), ClientError> {
        self.executor
            .execute(ApiRequest::delete(format!("/v0/samples/{sample_id}")))
            .await?;
        triage_info!("deleted sample {}", sample_id);
        Ok(())
    }

    /// Submits a URL. `profiles` entries usually leave `pick` empty.
    pub async fn submit_url(
        &self,
        url: &str,
        interactive: bool,
        profiles: &[ProfileChoice],
    ) -> Result<Sample, ClientError> {
        let body = serde_json::to_value(SubmitRequest {
            kind: "url",
            url: Some(url),
            interactive,
            profiles,
            password: None,
        })?;
        let value = self
            .executor
            .execute(ApiRequest::post_json("/v0/samples", body))
            .await?;
        decode(value)
    }

    /// Uploads a file. `password` is passed on for encrypted archives.
    pub async fn submit_file(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        interactive: bool,
        profiles: &[ProfileChoice],
        password: Option<&str>,
    ) -> Result<Sample, ClientError> {
        let json = serde_json::to_value(SubmitRequest {
            kind: "file",
            url: None,
            interactive,
            profiles,
            password,
        })?;
        let request = ApiRequest::new(reqwest::Method::POST, "/v0/samples").with_body(
            RequestBody::Multipart {
                json,
                file_name: file_name.to_string(),
                contents,
            },
        );
        decode(self.executor.execute(request).await?)
    }

    pub async fn commit_selection(
        &self,
        sample_id: &str,
        commit: &SelectionCommit,
    ) -> Result<(), ClientError> {
        commit_selection(self.executor.as_ref(), sample_id, commit).await
    }

    /// Attaches explicit profiles. An empty `choices` falls back to automatic
    /// profiles for the sample's own target.
    pub async fn set_profile(
        &self,
        sample_id: &str,
        choices: Vec<ProfileChoice>,
    ) -> Result<(), ClientError> {
        let commit = match ManualSelection::new(choices) {
            Some(manual) => SelectionCommit::Manual(manual),
            None => SelectionCommit::Automatic { pick: Vec::new() },
        };
        self.commit_selection(sample_id, &commit).await
    }

    /// Lets the service choose profiles for each of `pick`.
    pub async fn set_profile_automatically(
        &self,
        sample_id: &str,
        pick: &[String],
    ) -> Result<(), ClientError> {
        let commit = SelectionCommit::Automatic {
            pick: pick.to_vec(),
        };
        self.commit_selection(sample_id, &commit).await
    }

    pub async fn profiles(&self) -> Result<Vec<Profile>, ClientError> {
        fetch_profiles(self.executor.as_ref()).await
    }

    pub async fn create_profile(&self, profile: &NewProfile) -> Result<Profile, ClientError> {
        let body = serde_json::to_value(profile)?;
        let value = self
            .executor
            .execute(ApiRequest::post_json("/v0/profiles", body))
            .await?;
        decode(value)
    }

    /// Deletes a profile by id or name.
    pub async fn delete_profile(&self, profile: &str) -> Result<(), ClientError> {
        self.executor
            .execute(ApiRequest::delete(format!("/v0/profiles/{profile}")))
            .await?;
        Ok(())
    }

    pub async fn static_report(&self, sample_id: &str) -> Result<StaticReport, ClientError> {
        fetch_static_report(self.executor.as_ref(), sample_id).await
    }

    /// The overview report, left undecoded.
    pub async fn overview_report(&self, sample_id: &str) -> Result<Value, ClientError> {
        self.executor
            .execute(ApiRequest::get(format!(
                "/v0/samples/{sample_id}/overview.json"
            )))
            .await
    }

    /// A task's triage report, left undecoded.
    pub async fn task_report(&self, sample_id: &str, task_id: &str) -> Result<Value, ClientError> {
        self.executor
            .execute(ApiRequest::get(format!(
                "/v0/samples/{sample_id}/{task_id}/report_triage.json"
            )))
            .await
    }

    /// Prepares an interactive profile selection for `sample_id`.
    pub fn select_profile<P: SelectionPrompt>(
        &self,
        sample_id: &str,
        prompt: P,
        cancel: CancellationToken,
    ) -> ProfileSelectionCoordinator<P> {
        ProfileSelectionCoordinator::new(self.executor.clone(), prompt, sample_id, cancel)
    }
}

pub(crate) async fn fetch_static_report(
    executor: &dyn RequestExecutor,
    sample_id: &str,
) -> Result<StaticReport, ClientError> {
    let value = executor
        .execute(ApiRequest::get(format!(
            "/v0/samples/{sample_id}/reports/static"
        )))
        .await?;
    decode(value)
}

pub(crate) async fn fetch_profiles(
    executor: &dyn RequestExecutor,
) -> Result<Vec<Profile>, ClientError> {
    let value = executor.execute(ApiRequest::get("/v0/profiles")).await?;
    Ok(Page::<Profile>::from_value(value)?.records)
}

pub(crate) async fn commit_selection(
    executor: &dyn RequestExecutor,
    sample_id: &str,
    commit: &SelectionCommit,
) -> Result<(), ClientError> {
    let body = serde_json::to_value(commit)?;
    executor
        .execute(ApiRequest::post_json(
            format!("/v0/samples/{sample_id}/profile"),
            body,
        ))
        .await?;
    Ok(())
}

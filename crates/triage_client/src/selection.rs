//! Interactive profile selection for samples submitted in interactive mode.
//!
//! The coordinator watches the sample's events until static analysis is done,
//! resolves which targets to run and with which profiles, and commits exactly
//! one selection. Steps run strictly in order; the remote sample is only
//! changed by the final commit.
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use triage_core::{
    file_options, normalize_answer, picks_from_answer, profile_rule, resolve_targets, update,
    Phase, ProfileChoice, PromptOption, SelectionCommit, SelectionMsg, SelectionRule,
    SelectionState, TargetPick, TargetResolution,
};
use triage_logging::{triage_debug, triage_info, triage_warn};

use crate::client::{commit_selection, fetch_profiles, fetch_static_report};
use crate::handoff::cancellable;
use crate::{ClientError, EventScope, EventStream, RequestExecutor};

/// Lets a user (or automation) pick from a list of options.
#[async_trait::async_trait]
pub trait SelectionPrompt: Send {
    /// Returns zero-based, deduplicated indices into `options`.
    ///
    /// Implementations keep asking until `rule` accepts the answer.
    async fn choose(
        &mut self,
        heading: &str,
        options: &[PromptOption],
        rule: SelectionRule,
    ) -> Result<Vec<usize>, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    Committed(SelectionCommit),
    /// Selection did not apply; the sample was already in `phase`.
    Skipped { phase: Phase },
}

pub struct ProfileSelectionCoordinator<P> {
    executor: Arc<dyn RequestExecutor>,
    prompt: P,
    sample_id: String,
    cancel: CancellationToken,
    state: SelectionState,
    outcome: Option<SelectionOutcome>,
}

impl<P: SelectionPrompt> ProfileSelectionCoordinator<P> {
    pub fn new(
        executor: Arc<dyn RequestExecutor>,
        prompt: P,
        sample_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            executor,
            prompt,
            sample_id: sample_id.into(),
            cancel,
            state: SelectionState::Waiting,
            outcome: None,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    /// Drives the selection to a terminal state.
    ///
    /// A failed commit leaves the coordinator `Ready`; calling `run` again
    /// resolves and commits anew without waiting for events. Once terminal,
    /// `run` returns the same outcome again.
    pub async fn run(&mut self) -> Result<SelectionOutcome, ClientError> {
        if let Some(outcome) = &self.outcome {
            return Ok(outcome.clone());
        }
        match self.state {
            SelectionState::Waiting => {
                if let Some(phase) = self.wait_for_static_analysis().await? {
                    let outcome = SelectionOutcome::Skipped { phase };
                    self.outcome = Some(outcome.clone());
                    return Ok(outcome);
                }
            }
            SelectionState::Ready => {}
            SelectionState::Failed => return Err(self.failed()),
            SelectionState::Skipped | SelectionState::Committed => {
                return Err(ClientError::ProtocolViolation(format!(
                    "selection for sample {} finished without an outcome",
                    self.sample_id
                )));
            }
        }

        let commit = self.resolve_commit().await?;
        cancellable(
            &self.cancel,
            commit_selection(self.executor.as_ref(), &self.sample_id, &commit),
        )
        .await?;
        self.state = update(self.state, SelectionMsg::CommitAccepted);
        triage_info!(
            "sample {} committed {} selection",
            self.sample_id,
            if commit.is_automatic() { "automatic" } else { "manual" }
        );
        let outcome = SelectionOutcome::Committed(commit);
        self.outcome = Some(outcome.clone());
        Ok(outcome)
    }

    fn failed(&self) -> ClientError {
        ClientError::SampleFailed {
            sample_id: self.sample_id.clone(),
        }
    }

    /// Returns the phase that made selection inapplicable, or `None` once the
    /// sample is ready.
    async fn wait_for_static_analysis(&mut self) -> Result<Option<Phase>, ClientError> {
        let mut events = EventStream::subscribe(
            self.executor.clone(),
            EventScope::Sample(self.sample_id.clone()),
            &self.cancel,
        );
        loop {
            let snapshot = match events.next().await {
                Some(snapshot) => snapshot?,
                None if self.cancel.is_cancelled() => return Err(ClientError::Cancelled),
                None => {
                    return Err(ClientError::ProtocolViolation(format!(
                        "event stream for sample {} ended before static analysis finished",
                        self.sample_id
                    )))
                }
            };
            let phase = snapshot.phase().ok_or_else(|| {
                ClientError::ProtocolViolation(format!(
                    "sample {} reported unknown status {:?}",
                    self.sample_id, snapshot.status
                ))
            })?;
            self.state = update(self.state, SelectionMsg::PhaseObserved(phase));
            triage_debug!(
                "sample {} phase {} -> {:?}",
                self.sample_id,
                phase,
                self.state
            );
            match self.state {
                SelectionState::Waiting => {
                    triage_info!("sample {} waiting for static analysis", self.sample_id);
                }
                SelectionState::Ready | SelectionState::Committed => return Ok(None),
                SelectionState::Failed => {
                    triage_warn!("sample {} failed before selection", self.sample_id);
                    return Err(self.failed());
                }
                SelectionState::Skipped => {
                    triage_info!(
                        "sample {} does not need a profile ({})",
                        self.sample_id,
                        phase
                    );
                    return Ok(Some(phase));
                }
            }
        }
    }

    async fn resolve_commit(&mut self) -> Result<SelectionCommit, ClientError> {
        let report = cancellable(
            &self.cancel,
            fetch_static_report(self.executor.as_ref(), &self.sample_id),
        )
        .await?;

        let picks = match resolve_targets(report.listing()) {
            TargetResolution::Implicit(pick) => vec![pick],
            TargetResolution::Prompt(files) => {
                let answer = self
                    .ask(
                        "Select the files from the archive to analyze. Leave blank to continue with the emphasized files.",
                        &file_options(&files),
                        SelectionRule::Any,
                    )
                    .await?;
                picks_from_answer(&files, &answer)
            }
            TargetResolution::Empty => {
                return Err(ClientError::ProtocolViolation(format!(
                    "static report for sample {} lists no files",
                    self.sample_id
                )))
            }
        };

        let profiles = cancellable(&self.cancel, fetch_profiles(self.executor.as_ref())).await?;
        if profiles.is_empty() {
            triage_info!("no profiles available, using automatic profiles");
            return Ok(SelectionCommit::automatic(&picks));
        }

        let options: Vec<PromptOption> = profiles
            .iter()
            .map(|profile| PromptOption {
                label: profile.display_label(),
                emphasized: false,
            })
            .collect();
        let rule = profile_rule(picks.len());
        let mut choices = Vec::new();
        for pick in &picks {
            let answer = self.ask(&profile_heading(pick, rule), &options, rule).await?;
            choices.extend(answer.into_iter().map(|index| ProfileChoice {
                profile: profiles[index].selector().to_string(),
                pick: pick.path.clone(),
            }));
        }
        Ok(SelectionCommit::from_choices(&picks, choices))
    }

    async fn ask(
        &mut self,
        heading: &str,
        options: &[PromptOption],
        rule: SelectionRule,
    ) -> Result<Vec<usize>, ClientError> {
        let answer =
            cancellable(&self.cancel, self.prompt.choose(heading, options, rule)).await?;
        let normalized = normalize_answer(&answer, options.len()).ok_or_else(|| {
            ClientError::Prompt(format!(
                "answer {answer:?} is out of range for {} options",
                options.len()
            ))
        })?;
        if !rule.accepts(&normalized) {
            return Err(ClientError::Prompt(format!(
                "answer {answer:?} rejected by rule {rule:?}"
            )));
        }
        Ok(normalized)
    }
}

fn profile_heading(pick: &TargetPick, rule: SelectionRule) -> String {
    match rule {
        SelectionRule::Any => format!(
            "Select the profiles to use for {:?}. Leave blank for automatic profiles.",
            pick.name
        ),
        SelectionRule::NonEmpty => format!("Select the profiles to use for {:?}", pick.name),
    }
}

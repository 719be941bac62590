use crate::Phase;

/// Where a profile selection for a single sample currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    /// Watching the event stream for the sample to finish static analysis.
    #[default]
    Waiting,
    /// Static analysis is done; picks can be resolved and committed.
    Ready,
    /// The sample failed before a selection could be made.
    Failed,
    /// Selection does not apply (the sample was auto-profiled or has moved on).
    Skipped,
    /// A selection was accepted by the service.
    Committed,
}

impl SelectionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SelectionState::Failed | SelectionState::Skipped | SelectionState::Committed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMsg {
    /// A snapshot with this phase arrived on the event stream.
    PhaseObserved(Phase),
    /// The service accepted the selection commit.
    CommitAccepted,
}

/// Pure update function: applies a message to the selection state.
///
/// Messages that make no sense in the current state leave it untouched, so a
/// terminal state can never be left.
pub fn update(state: SelectionState, msg: SelectionMsg) -> SelectionState {
    match (state, msg) {
        (SelectionState::Waiting, SelectionMsg::PhaseObserved(phase)) => match phase {
            Phase::Pending => SelectionState::Waiting,
            Phase::StaticAnalysis => SelectionState::Ready,
            Phase::Failed => SelectionState::Failed,
            Phase::Scheduled | Phase::Running | Phase::Processing | Phase::Reported => {
                SelectionState::Skipped
            }
        },
        (SelectionState::Ready, SelectionMsg::CommitAccepted) => SelectionState::Committed,
        (state, _) => state,
    }
}

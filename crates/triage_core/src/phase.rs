use std::fmt;

/// Lifecycle of a submitted sample as reported by the service.
///
/// `Reported` and `Failed` are terminal. `StaticAnalysis` is the only phase in
/// which a profile can be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pending,
    StaticAnalysis,
    Scheduled,
    Running,
    Processing,
    Reported,
    Failed,
}

impl Phase {
    /// Parses the wire representation. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let phase = match raw {
            "pending" => Phase::Pending,
            "static_analysis" => Phase::StaticAnalysis,
            "scheduled" => Phase::Scheduled,
            "running" => Phase::Running,
            "processing" => Phase::Processing,
            "reported" => Phase::Reported,
            "failed" => Phase::Failed,
            _ => return None,
        };
        Some(phase)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pending => "pending",
            Phase::StaticAnalysis => "static_analysis",
            Phase::Scheduled => "scheduled",
            Phase::Running => "running",
            Phase::Processing => "processing",
            Phase::Reported => "reported",
            Phase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Reported | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

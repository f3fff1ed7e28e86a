use std::fmt;
use std::str::FromStr;

/// When a report is produced without the participant asking for one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportPolicy {
    /// Generate automatically only for sessions that ended themselves;
    /// otherwise ask the participant.
    #[default]
    AskFirst,
    /// Generate whenever there is history to report on.
    AlwaysAuto,
    /// Always ask the participant.
    NeverAuto,
}

/// What `stop` does once the session is wound down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAction {
    GenerateReport,
    AskParticipant,
}

impl ReportPolicy {
    pub fn decide(self, auto_ended: bool, has_history: bool, requested: bool) -> StopAction {
        if requested {
            return StopAction::GenerateReport;
        }
        let generate = match self {
            Self::AskFirst => auto_ended && has_history,
            Self::AlwaysAuto => has_history,
            Self::NeverAuto => false,
        };
        if generate {
            StopAction::GenerateReport
        } else {
            StopAction::AskParticipant
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown report policy '{0}' (expected ask_first, always_auto or never_auto)")]
pub struct UnknownPolicy(String);

impl FromStr for ReportPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "ask_first" => Ok(Self::AskFirst),
            "always_auto" => Ok(Self::AlwaysAuto),
            "never_auto" => Ok(Self::NeverAuto),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for ReportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AskFirst => "ask_first",
            Self::AlwaysAuto => "always_auto",
            Self::NeverAuto => "never_auto",
        };
        f.write_str(name)
    }
}

use anyhow::{anyhow, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Installed,
    AlreadyPresent,
    Upgraded,
    Configured,
    Skipped,
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::AlreadyPresent => "already-present",
            Self::Upgraded => "upgraded",
            Self::Configured => "configured",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "installed" => Ok(Self::Installed),
            "already-present" => Ok(Self::AlreadyPresent),
            "upgraded" => Ok(Self::Upgraded),
            "configured" => Ok(Self::Configured),
            "skipped" => Ok(Self::Skipped),
            "failed" => Ok(Self::Failed),
            _ => Err(anyhow!("invalid step status: {value}")),
        }
    }

    pub fn is_failure(self) -> bool {
        self == Self::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub name: String,
    pub status: StepStatus,
    pub detail: String,
}

impl StepOutcome {
    pub fn new(name: impl Into<String>, status: StepStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }

    pub fn failed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, StepStatus::Failed, detail)
    }
}

/// Ordered record of every step the driver ran. The run never halts on a
/// non-fatal failure, so the report is the only complete account of what
/// actually happened.
#[derive(Debug, Default)]
pub struct StepReport {
    outcomes: Vec<StepOutcome>,
}

impl StepReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: StepOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[StepOutcome] {
        &self.outcomes
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status.is_failure())
            .count()
    }

    pub fn is_degraded(&self) -> bool {
        self.failed_count() > 0
    }
}

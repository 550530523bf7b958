//! Long-period job gating and the member verification state machine.
//!
//! The coarse loop ticks hourly; each job below runs only when its
//! persisted checkpoint is at least one period old.

use std::time::Duration;

use serde_json::Value;

use crate::snapshot::as_i64;

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

const DAY_SECS: i64 = 24 * 3600;

/// Long-period jobs gated per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScheduledJob {
    DailyVerify,
    WeeklyVerify,
    DailyCheck,
    WeeklyCheck,
}

impl ScheduledJob {
    pub const ALL: [ScheduledJob; 4] = [
        Self::DailyVerify,
        Self::WeeklyVerify,
        Self::DailyCheck,
        Self::WeeklyCheck,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DailyVerify => "daily_verify",
            Self::WeeklyVerify => "weekly_verify",
            Self::DailyCheck => "daily_check",
            Self::WeeklyCheck => "weekly_check",
        }
    }

    /// Period in seconds.
    pub fn period_secs(self) -> i64 {
        match self {
            Self::DailyVerify | Self::DailyCheck => DAY_SECS,
            Self::WeeklyVerify | Self::WeeklyCheck => 7 * DAY_SECS,
        }
    }

    pub fn period(self) -> Duration {
        Duration::from_secs(self.period_secs().unsigned_abs())
    }

    /// Full-population verification (as opposed to faction checks).
    pub fn is_verify(self) -> bool {
        matches!(self, Self::DailyVerify | Self::WeeklyVerify)
    }

    /// Banner used in the admin channel.
    pub fn title(self) -> &'static str {
        match self {
            Self::DailyVerify => "Daily verification of your members",
            Self::WeeklyVerify => "Weekly verification of your members",
            Self::DailyCheck => "Daily check of your factions members",
            Self::WeeklyCheck => "Weekly check of your factions members",
        }
    }
}

impl std::fmt::Display for ScheduledJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

/// Interpreted value of a persisted checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointState {
    /// The job is turned off for the group.
    Disabled,
    /// Epoch seconds of the last run.
    Last(i64),
}

impl CheckpointState {
    /// Absent, `false`, `0`, `null` and `""` disable the job. Any other
    /// value that is not an integer counts as epoch start so the job runs
    /// once and repairs the checkpoint.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Self::Disabled,
            Some(Value::String(s)) if s.is_empty() => Self::Disabled,
            Some(v) => match as_i64(v) {
                Some(0) => Self::Disabled,
                Some(ts) => Self::Last(ts),
                None => Self::Last(1),
            },
        }
    }

    /// Whether the job should run at `now`.
    pub fn is_due(self, now: i64, period_secs: i64) -> bool {
        match self {
            Self::Disabled => false,
            Self::Last(last) => is_due(last, now, period_secs),
        }
    }
}

/// `now - last >= period`.
pub fn is_due(last: i64, now: i64, period_secs: i64) -> bool {
    now.saturating_sub(last) >= period_secs
}

// ---------------------------------------------------------------------------
// Verification state machine
// ---------------------------------------------------------------------------

/// Per-member verification status inside a sweep.
pub mod state_machine {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum VerificationState {
        Unverified,
        Resolving,
        Verified,
        Failed,
    }

    /// Valid successors of `from`.
    ///
    /// `Verified` re-enters `Resolving` on the next sweep; `Failed` may be
    /// retried the same way.
    pub fn valid_transitions(from: VerificationState) -> &'static [VerificationState] {
        use VerificationState::*;
        match from {
            Unverified => &[Resolving],
            Resolving => &[Verified, Failed],
            Verified => &[Resolving],
            Failed => &[Resolving],
        }
    }

    pub fn can_transition(from: VerificationState, to: VerificationState) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a transition, returning an error message for invalid ones.
    pub fn validate_transition(
        from: VerificationState,
        to: VerificationState,
    ) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(format!("Invalid verification transition: {from:?} -> {to:?}"))
        }
    }
}

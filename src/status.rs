use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LifecycleError, Result};

/// Lifecycle status of a job posting.
///
/// `Completed` is also displayed as "Filled", and `PaymentPending` as
/// "Payment Received"; each pair is a single stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Draft,
    Pending,
    Active,
    Filling,
    Completed,
    WorkFinished,
    PaymentPending,
    PaymentDistributed,
    Deactivated,
}

/// Steps of the visual progress tracker, in order.
pub const PROGRESS_STEPS: [JobStatus; 8] = [
    JobStatus::Draft,
    JobStatus::Pending,
    JobStatus::Active,
    JobStatus::Filling,
    JobStatus::Completed,
    JobStatus::WorkFinished,
    JobStatus::PaymentPending,
    JobStatus::PaymentDistributed,
];

pub const ALL_STATUSES: [JobStatus; 9] = [
    JobStatus::Draft,
    JobStatus::Pending,
    JobStatus::Active,
    JobStatus::Filling,
    JobStatus::Completed,
    JobStatus::WorkFinished,
    JobStatus::PaymentPending,
    JobStatus::PaymentDistributed,
    JobStatus::Deactivated,
];

impl JobStatus {
    /// Canonical label, as stored in the database.
    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Draft => "Draft",
            JobStatus::Pending => "Pending",
            JobStatus::Active => "Active",
            JobStatus::Filling => "Filling",
            JobStatus::Completed => "Completed",
            JobStatus::WorkFinished => "Work Finished",
            JobStatus::PaymentPending => "Payment Pending",
            JobStatus::PaymentDistributed => "Payment Distributed",
            JobStatus::Deactivated => "Deactivated",
        }
    }

    /// Parse a canonical label or one of its aliases.
    ///
    /// Matching ignores case and treats `_` and `-` as spaces. Strings outside
    /// the fixed set are rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let normalized = s
            .trim()
            .to_lowercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let status = match normalized.as_str() {
            "draft" => JobStatus::Draft,
            "pending" => JobStatus::Pending,
            "active" => JobStatus::Active,
            "filling" => JobStatus::Filling,
            "completed" | "filled" => JobStatus::Completed,
            "work finished" => JobStatus::WorkFinished,
            "payment pending" | "payment received" => JobStatus::PaymentPending,
            "payment distributed" => JobStatus::PaymentDistributed,
            "deactivated" => JobStatus::Deactivated,
            _ => return Err(LifecycleError::UnknownStatus(s.to_string())),
        };
        Ok(status)
    }

    /// Index into [`PROGRESS_STEPS`]. `Deactivated` sits outside the tracker.
    pub fn progress_step(self) -> Option<usize> {
        PROGRESS_STEPS.iter().position(|s| *s == self)
    }

    /// Fixed predecessor used by the revert command.
    ///
    /// This is a lookup, not history: every path into a status reverts to
    /// the same predecessor.
    pub fn revert_target(self) -> Option<JobStatus> {
        match self {
            JobStatus::Draft => None,
            JobStatus::Pending => Some(JobStatus::Draft),
            JobStatus::Active => Some(JobStatus::Pending),
            JobStatus::Filling => Some(JobStatus::Active),
            JobStatus::Completed => Some(JobStatus::Filling),
            JobStatus::WorkFinished => Some(JobStatus::Completed),
            JobStatus::PaymentPending => Some(JobStatus::WorkFinished),
            JobStatus::PaymentDistributed => Some(JobStatus::PaymentPending),
            JobStatus::Deactivated => Some(JobStatus::Active),
        }
    }

    /// Statuses in which applicants can be hired.
    pub fn accepts_hires(self) -> bool {
        matches!(self, JobStatus::Active | JobStatus::Filling)
    }

    /// Statuses in which a hire can still be taken back.
    pub fn accepts_unhires(self) -> bool {
        matches!(
            self,
            JobStatus::Active | JobStatus::Filling | JobStatus::Completed
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Job status after one more position is filled.
pub fn status_after_hire(filled: i64, needed: i64, current: JobStatus) -> JobStatus {
    if filled >= needed {
        JobStatus::Completed
    } else if current == JobStatus::Filling {
        JobStatus::Filling
    } else {
        JobStatus::Active
    }
}

/// Job status after a hire is removed and the counter decremented to `filled`.
pub fn status_after_unhire(filled: i64) -> JobStatus {
    if filled == 0 {
        JobStatus::Active
    } else {
        JobStatus::Filling
    }
}

/// Render the progress tracker as a single line, e.g.
/// `Draft > Pending > [Active] > Filling > ...`.
pub fn render_progress(current: JobStatus) -> String {
    let step = current.progress_step();
    PROGRESS_STEPS
        .iter()
        .enumerate()
        .map(|(i, s)| {
            if Some(i) == step {
                format!("[{}]", s.label())
            } else {
                s.label().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" > ")
}

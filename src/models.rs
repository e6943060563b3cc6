use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LifecycleError, Result};
use crate::status::JobStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub title: String,
    pub status: JobStatus,
    pub positions_needed: i64,
    pub positions_filled: i64,
    pub created_at: String,
    pub updated_at: String,
    pub published_at: Option<String>,
}

impl Job {
    pub fn open_positions(&self) -> i64 {
        (self.positions_needed - self.positions_filled).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Applied,
    Interviewed,
    Hired,
    Rejected,
}

impl ApplicationStatus {
    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Interviewed => "Interviewed",
            ApplicationStatus::Hired => "Hired",
            ApplicationStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "applied" => Ok(ApplicationStatus::Applied),
            "interviewed" => Ok(ApplicationStatus::Interviewed),
            "hired" => Ok(ApplicationStatus::Hired),
            "rejected" => Ok(ApplicationStatus::Rejected),
            _ => Err(LifecycleError::UnknownStatus(s.to_string())),
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub job_id: i64,
    pub user_id: Option<String>, // absent for manually added applicants
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: ApplicationStatus,
    pub is_manual: bool,
    pub payment_distributed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a new application record.
#[derive(Debug, Clone, Default)]
pub struct NewApplication {
    pub user_id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_manual: bool,
}

/// One row of the append-only status log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub id: i64,
    pub job_id: i64,
    pub from_status: JobStatus,
    pub to_status: JobStatus,
    pub command: String,
    pub actor: String,
    pub at: String,
}

/// Job whose filled counter disagrees with its hired applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountMismatch {
    pub job_id: i64,
    pub positions_filled: i64,
    pub hired: i64,
}

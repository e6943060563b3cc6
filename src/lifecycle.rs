//! Admin commands that move a job through its lifecycle.
//!
//! Each command opens a write transaction, reads the records it needs inside
//! it, checks the status rules in [`crate::status`], and applies its writes
//! together with a row in the status log. Reads made inside the transaction
//! stay valid until commit, even with other processes on the same database.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{LifecycleError, Result};
use crate::models::{
    Application, ApplicationStatus, CountMismatch, Job, NewApplication, Transition,
};
use crate::status::{JobStatus, status_after_hire, status_after_unhire};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("valid phone regex"));

/// Result of a status-only command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Changed { from: JobStatus, to: JobStatus },
    /// The job already held the command's target status; nothing was written.
    Unchanged(JobStatus),
}

pub struct LifecycleManager<'a> {
    db: &'a Database,
    actor: String,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(db: &'a Database, actor: impl Into<String>) -> Self {
        Self {
            db,
            actor: actor.into(),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    // --- Queries ---

    pub fn job(&self, id: i64) -> Result<Job> {
        self.db.get_job(id)?.ok_or(LifecycleError::JobNotFound(id))
    }

    pub fn jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        self.db.list_jobs(status)
    }

    pub fn application(&self, id: i64) -> Result<Application> {
        self.db
            .get_application(id)?
            .ok_or(LifecycleError::ApplicationNotFound(id))
    }

    pub fn applications(&self, job_id: i64) -> Result<Vec<Application>> {
        self.db.list_applications(job_id)
    }

    pub fn history(&self, job_id: i64) -> Result<Vec<Transition>> {
        self.db.list_transitions(job_id)
    }

    pub fn audit(&self) -> Result<Vec<CountMismatch>> {
        self.db.count_mismatches()
    }

    // --- Posting ---

    pub fn create_job(&self, title: &str, positions_needed: i64) -> Result<Job> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LifecycleError::Validation("title is required".to_string()));
        }
        if positions_needed < 1 {
            return Err(LifecycleError::Validation(
                "positions needed must be at least 1".to_string(),
            ));
        }
        let id = self.db.insert_job(title, positions_needed)?;
        info!(job_id = id, actor = %self.actor, "job created");
        self.job(id)
    }

    pub fn approve_draft(&self, job_id: i64) -> Result<Outcome> {
        self.advance(job_id, "approve", JobStatus::Pending, |s| {
            s == JobStatus::Draft
        })
    }

    pub fn post_job(&self, job_id: i64) -> Result<Outcome> {
        self.advance(job_id, "post", JobStatus::Active, |s| s == JobStatus::Pending)
    }

    // --- Hiring ---

    pub fn hire(&self, application_id: i64) -> Result<Job> {
        let tx = self.db.begin()?;

        let app = self.application(application_id)?;
        if app.status == ApplicationStatus::Hired {
            warn!(application_id, "hire rejected: already hired");
            return Err(LifecycleError::AlreadyHired(application_id));
        }

        let job = self.job(app.job_id)?;
        if !job.status.accepts_hires() {
            warn!(job_id = job.id, status = %job.status, "hire rejected");
            return Err(LifecycleError::InvalidTransition {
                command: "hire into",
                status: job.status,
            });
        }
        if job.open_positions() == 0 {
            return Err(LifecycleError::NoOpenPositions(job.id));
        }

        let filled = job.positions_filled + 1;
        let to = status_after_hire(filled, job.positions_needed, job.status);

        self.db
            .set_application_status(application_id, ApplicationStatus::Hired)?;
        self.db.set_positions_filled(job.id, filled)?;
        if to != job.status {
            self.db.set_job_status(job.id, to, false)?;
            self.db
                .record_transition(job.id, job.status, to, "hire", &self.actor)?;
        }
        tx.commit()?;

        info!(
            job_id = job.id,
            application_id,
            filled,
            needed = job.positions_needed,
            status = %to,
            actor = %self.actor,
            "applicant hired"
        );
        self.job(job.id)
    }

    /// Return a hired applicant to Applied and release the position. Any
    /// payment stamp is cleared with the hire.
    pub fn remove_hire(&self, application_id: i64) -> Result<Job> {
        let tx = self.db.begin()?;

        let app = self.application(application_id)?;
        if app.status != ApplicationStatus::Hired {
            warn!(application_id, status = %app.status, "remove hire rejected");
            return Err(LifecycleError::NotHired(application_id));
        }

        let job = self.job(app.job_id)?;
        if !job.status.accepts_unhires() {
            warn!(job_id = job.id, status = %job.status, "remove hire rejected");
            return Err(LifecycleError::InvalidTransition {
                command: "remove a hire from",
                status: job.status,
            });
        }

        let filled = (job.positions_filled - 1).max(0);
        let to = status_after_unhire(filled);

        self.db
            .set_application_status(application_id, ApplicationStatus::Applied)?;
        if app.payment_distributed_at.is_some() {
            self.db.clear_payment_distributed(application_id)?;
        }
        self.db.set_positions_filled(job.id, filled)?;
        if to != job.status {
            self.db.set_job_status(job.id, to, false)?;
            self.db
                .record_transition(job.id, job.status, to, "remove hire", &self.actor)?;
        }
        tx.commit()?;

        info!(
            job_id = job.id,
            application_id,
            filled,
            status = %to,
            actor = %self.actor,
            "hire removed"
        );
        self.job(job.id)
    }

    // --- Completion and payment ---

    pub fn mark_work_finished(&self, job_id: i64) -> Result<Outcome> {
        self.advance(job_id, "finish", JobStatus::WorkFinished, |s| {
            s == JobStatus::Completed
        })
    }

    pub fn mark_payment_received(&self, job_id: i64) -> Result<Outcome> {
        self.advance(
            job_id,
            "mark payment received for",
            JobStatus::PaymentPending,
            |s| s == JobStatus::WorkFinished,
        )
    }

    /// Record that `application_id` has been paid. Once every hired applicant
    /// of the job is paid, the job moves to Payment Distributed.
    pub fn mark_payment_distributed(&self, application_id: i64) -> Result<Job> {
        let tx = self.db.begin()?;

        let app = self.application(application_id)?;
        if app.status != ApplicationStatus::Hired {
            return Err(LifecycleError::NotHired(application_id));
        }

        let job = self.job(app.job_id)?;
        if job.status != JobStatus::PaymentPending {
            if app.payment_distributed_at.is_some() {
                debug!(application_id, "payment already distributed");
                return Ok(job);
            }
            warn!(job_id = job.id, status = %job.status, "payment distribution rejected");
            return Err(LifecycleError::InvalidTransition {
                command: "distribute payment for",
                status: job.status,
            });
        }

        if app.payment_distributed_at.is_none() {
            self.db.stamp_payment_distributed(application_id)?;
        }
        let unpaid = self.db.count_unpaid_hires(job.id)?;
        if unpaid == 0 {
            self.db
                .set_job_status(job.id, JobStatus::PaymentDistributed, false)?;
            self.db.record_transition(
                job.id,
                job.status,
                JobStatus::PaymentDistributed,
                "distribute payment",
                &self.actor,
            )?;
        }
        tx.commit()?;

        info!(
            job_id = job.id,
            application_id,
            unpaid,
            actor = %self.actor,
            "payment distributed"
        );
        self.job(job.id)
    }

    // --- Revert, suspension, removal ---

    /// Move the job to its fixed predecessor. Counters are left as they are.
    pub fn revert(&self, job_id: i64) -> Result<Outcome> {
        let tx = self.db.begin()?;

        let job = self.job(job_id)?;
        let Some(to) = job.status.revert_target() else {
            warn!(job_id, status = %job.status, "revert rejected");
            return Err(LifecycleError::InvalidTransition {
                command: "revert",
                status: job.status,
            });
        };
        self.write_status(&job, to, "revert")?;
        tx.commit()?;

        self.log_status_change(&job, to, "revert");
        Ok(Outcome::Changed {
            from: job.status,
            to,
        })
    }

    pub fn deactivate(&self, job_id: i64) -> Result<Outcome> {
        self.advance(job_id, "deactivate", JobStatus::Deactivated, |s| {
            s == JobStatus::Active
        })
    }

    /// Move any non-Active job to Active. A job that was never posted gets
    /// its `published_at` stamped.
    pub fn activate(&self, job_id: i64) -> Result<Outcome> {
        self.advance(job_id, "activate", JobStatus::Active, |s| s != JobStatus::Active)
    }

    /// Delete the job. With `cascade`, its applications are deleted in the
    /// same transaction; otherwise they are left in place. Returns the number
    /// of applications removed.
    pub fn delete_job(&self, job_id: i64, cascade: bool) -> Result<usize> {
        let tx = self.db.begin()?;

        let job = self.job(job_id)?;
        let removed = if cascade {
            self.db.delete_applications_for_job(job.id)?
        } else {
            0
        };
        self.db.delete_job(job.id)?;
        tx.commit()?;

        info!(
            job_id,
            status = %job.status,
            cascade,
            applications_removed = removed,
            actor = %self.actor,
            "job deleted"
        );
        Ok(removed)
    }

    // --- Applicants ---

    /// Add an applicant to a job. Applicants without a `user_id` are recorded
    /// as manually added.
    pub fn add_applicant(&self, job_id: i64, mut new: NewApplication) -> Result<Application> {
        new.name = new.name.trim().to_string();
        new.phone = normalize_phone(new.phone.as_deref());
        new.email = new
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);
        new.is_manual = new.user_id.is_none();
        validate_applicant(&new)?;

        let job = self.job(job_id)?;
        let id = self.db.insert_application(job.id, &new)?;
        info!(job_id, application_id = id, manual = new.is_manual, "applicant added");
        self.application(id)
    }

    /// Screening moves between Applied, Interviewed and Rejected. Hiring goes
    /// through [`Self::hire`] so the job counters stay in step.
    pub fn set_applicant_status(
        &self,
        application_id: i64,
        status: ApplicationStatus,
    ) -> Result<Application> {
        if status == ApplicationStatus::Hired {
            return Err(LifecycleError::Validation(
                "use the hire command to hire an applicant".to_string(),
            ));
        }

        let tx = self.db.begin()?;
        let app = self.application(application_id)?;
        if app.status == ApplicationStatus::Hired {
            return Err(LifecycleError::Validation(format!(
                "application #{} is hired; remove the hire first",
                application_id
            )));
        }
        if app.status != status {
            self.db.set_application_status(application_id, status)?;
            info!(application_id, from = %app.status, to = %status, "applicant status changed");
        }
        tx.commit()?;

        self.application(application_id)
    }

    /// Delete an application. A hired applicant's position is released, which
    /// follows the same rules as [`Self::remove_hire`]: once the work is
    /// finished a hire is settled and the applicant can no longer be removed.
    pub fn remove_applicant(&self, application_id: i64) -> Result<()> {
        let tx = self.db.begin()?;

        let app = self.application(application_id)?;
        let was_hired = app.status == ApplicationStatus::Hired;
        let job = if was_hired {
            self.db.get_job(app.job_id)?
        } else {
            None
        };

        if let Some(job) = &job {
            if !job.status.accepts_unhires() {
                warn!(
                    application_id,
                    job_id = job.id,
                    status = %job.status,
                    "remove applicant rejected"
                );
                return Err(LifecycleError::InvalidTransition {
                    command: "remove a hired applicant from",
                    status: job.status,
                });
            }
        }

        self.db.delete_application(application_id)?;
        if let Some(job) = &job {
            let filled = (job.positions_filled - 1).max(0);
            let to = status_after_unhire(filled);
            self.db.set_positions_filled(job.id, filled)?;
            if to != job.status {
                self.db.set_job_status(job.id, to, false)?;
                self.db
                    .record_transition(job.id, job.status, to, "remove applicant", &self.actor)?;
            }
        }
        tx.commit()?;

        info!(
            application_id,
            job_id = app.job_id,
            was_hired,
            actor = %self.actor,
            "applicant removed"
        );
        Ok(())
    }

    // --- Internals ---

    /// Forward move to `target` when `allowed(current)` holds. A job already
    /// at `target` is left alone.
    fn advance(
        &self,
        job_id: i64,
        command: &'static str,
        target: JobStatus,
        allowed: impl Fn(JobStatus) -> bool,
    ) -> Result<Outcome> {
        let tx = self.db.begin()?;

        let job = self.job(job_id)?;
        if job.status == target {
            debug!(job_id, status = %target, command, "no-op");
            return Ok(Outcome::Unchanged(target));
        }
        if !allowed(job.status) {
            warn!(job_id, status = %job.status, command, "transition rejected");
            return Err(LifecycleError::InvalidTransition {
                command,
                status: job.status,
            });
        }
        self.write_status(&job, target, command)?;
        tx.commit()?;

        self.log_status_change(&job, target, command);
        Ok(Outcome::Changed {
            from: job.status,
            to: target,
        })
    }

    /// Status update plus log row; must run inside an open transaction.
    /// Posting a pending job, or the first move of any job into Active,
    /// stamps `published_at`.
    fn write_status(&self, job: &Job, to: JobStatus, command: &str) -> Result<()> {
        let publish = to == JobStatus::Active
            && (job.status == JobStatus::Pending || job.published_at.is_none());
        self.db.set_job_status(job.id, to, publish)?;
        self.db
            .record_transition(job.id, job.status, to, command, &self.actor)?;
        Ok(())
    }

    fn log_status_change(&self, job: &Job, to: JobStatus, command: &str) {
        info!(
            job_id = job.id,
            from = %job.status,
            to = %to,
            command,
            actor = %self.actor,
            "job status changed"
        );
    }
}

fn normalize_phone(phone: Option<&str>) -> Option<String> {
    let phone = phone?
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect::<String>();
    if phone.is_empty() { None } else { Some(phone) }
}

fn validate_applicant(new: &NewApplication) -> Result<()> {
    if new.name.is_empty() {
        return Err(LifecycleError::Validation("name is required".to_string()));
    }
    if new.phone.is_none() && new.email.is_none() {
        return Err(LifecycleError::Validation(
            "a phone number or email is required".to_string(),
        ));
    }
    if let Some(email) = &new.email {
        if !EMAIL_RE.is_match(email) {
            return Err(LifecycleError::Validation(format!("invalid email '{}'", email)));
        }
    }
    if let Some(phone) = &new.phone {
        if !PHONE_RE.is_match(phone) {
            return Err(LifecycleError::Validation(format!("invalid phone '{}'", phone)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    fn applicant(name: &str) -> NewApplication {
        NewApplication {
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            ..Default::default()
        }
    }

    /// Job with `needed` positions, already posted.
    fn active_job(mgr: &LifecycleManager, needed: i64) -> Job {
        let job = mgr.create_job("Event staff", needed).unwrap();
        mgr.approve_draft(job.id).unwrap();
        mgr.post_job(job.id).unwrap();
        mgr.job(job.id).unwrap()
    }

    fn job_at(mgr: &LifecycleManager, db: &Database, status: JobStatus) -> Job {
        let job = mgr.create_job("Inventory count", 1).unwrap();
        db.set_job_status(job.id, status, false).unwrap();
        mgr.job(job.id).unwrap()
    }

    #[test]
    fn test_create_job_validation() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        assert!(matches!(
            mgr.create_job("  ", 1),
            Err(LifecycleError::Validation(_))
        ));
        assert!(matches!(
            mgr.create_job("Usher", 0),
            Err(LifecycleError::Validation(_))
        ));
        let job = mgr.create_job(" Usher ", 3).unwrap();
        assert_eq!(job.title, "Usher");
        assert_eq!(job.status, JobStatus::Draft);
    }

    #[test]
    fn test_approve_and_post() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = mgr.create_job("Usher", 1).unwrap();

        assert_eq!(
            mgr.approve_draft(job.id).unwrap(),
            Outcome::Changed {
                from: JobStatus::Draft,
                to: JobStatus::Pending
            }
        );
        assert!(mgr.job(job.id).unwrap().published_at.is_none());

        mgr.post_job(job.id).unwrap();
        let job = mgr.job(job.id).unwrap();
        assert_eq!(job.status, JobStatus::Active);
        assert!(job.published_at.is_some());
    }

    #[test]
    fn test_post_requires_pending() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = mgr.create_job("Usher", 1).unwrap();
        let err = mgr.post_job(job.id).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                status: JobStatus::Draft,
                ..
            }
        ));
        assert_eq!(mgr.job(job.id).unwrap().status, JobStatus::Draft);
    }

    #[test]
    fn test_missing_job_is_not_found() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        assert!(matches!(
            mgr.approve_draft(42),
            Err(LifecycleError::JobNotFound(42))
        ));
        assert!(matches!(
            mgr.hire(7),
            Err(LifecycleError::ApplicationNotFound(7))
        ));
    }

    #[test]
    fn test_hire_increments_and_fills() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 2);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        let b = mgr.add_applicant(job.id, applicant("Ben")).unwrap();

        let after_a = mgr.hire(a.id).unwrap();
        assert_eq!(after_a.positions_filled, 1);
        assert_eq!(after_a.status, JobStatus::Active);
        assert_eq!(mgr.application(a.id).unwrap().status, ApplicationStatus::Hired);

        let after_b = mgr.hire(b.id).unwrap();
        assert_eq!(after_b.positions_filled, 2);
        assert_eq!(after_b.status, JobStatus::Completed);
    }

    #[test]
    fn test_hire_twice_is_rejected() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 3);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        mgr.hire(a.id).unwrap();
        assert!(matches!(mgr.hire(a.id), Err(LifecycleError::AlreadyHired(_))));
        assert_eq!(mgr.job(job.id).unwrap().positions_filled, 1);
    }

    #[test]
    fn test_hire_requires_open_job() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = mgr.create_job("Usher", 1).unwrap();
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        assert!(matches!(
            mgr.hire(a.id),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert_eq!(mgr.application(a.id).unwrap().status, ApplicationStatus::Applied);
    }

    #[test]
    fn test_hire_without_open_positions() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        let b = mgr.add_applicant(job.id, applicant("Ben")).unwrap();
        mgr.hire(a.id).unwrap();
        // Completed -> Filling -> Active leaves the counter at 1 of 1.
        mgr.revert(job.id).unwrap();
        mgr.revert(job.id).unwrap();
        assert!(matches!(
            mgr.hire(b.id),
            Err(LifecycleError::NoOpenPositions(_))
        ));
    }

    #[test]
    fn test_remove_hire() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 2);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        let b = mgr.add_applicant(job.id, applicant("Ben")).unwrap();
        mgr.hire(a.id).unwrap();
        mgr.hire(b.id).unwrap();

        let job_after = mgr.remove_hire(b.id).unwrap();
        assert_eq!(job_after.positions_filled, 1);
        assert_eq!(job_after.status, JobStatus::Filling);
        assert_eq!(mgr.application(b.id).unwrap().status, ApplicationStatus::Applied);

        let job_after = mgr.remove_hire(a.id).unwrap();
        assert_eq!(job_after.positions_filled, 0);
        assert_eq!(job_after.status, JobStatus::Active);

        assert!(matches!(mgr.remove_hire(a.id), Err(LifecycleError::NotHired(_))));
    }

    #[test]
    fn test_remove_hire_rejected_after_work_finished() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        mgr.hire(a.id).unwrap();
        mgr.mark_work_finished(job.id).unwrap();
        assert!(matches!(
            mgr.remove_hire(a.id),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert_eq!(mgr.job(job.id).unwrap().positions_filled, 1);
    }

    #[test]
    fn test_work_finished_and_payment_received() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = job_at(&mgr, &db, JobStatus::Active);
        assert!(mgr.mark_work_finished(job.id).is_err());

        let job = job_at(&mgr, &db, JobStatus::Completed);
        mgr.mark_work_finished(job.id).unwrap();
        assert!(matches!(
            mgr.mark_payment_received(job.id).unwrap(),
            Outcome::Changed {
                to: JobStatus::PaymentPending,
                ..
            }
        ));
    }

    #[test]
    fn test_payment_received_twice_is_a_no_op() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = job_at(&mgr, &db, JobStatus::WorkFinished);
        mgr.mark_payment_received(job.id).unwrap();
        let before = mgr.history(job.id).unwrap().len();

        assert_eq!(
            mgr.mark_payment_received(job.id).unwrap(),
            Outcome::Unchanged(JobStatus::PaymentPending)
        );
        assert_eq!(mgr.history(job.id).unwrap().len(), before);
    }

    #[test]
    fn test_payment_distribution_completes_when_all_hires_paid() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 2);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        let b = mgr.add_applicant(job.id, applicant("Ben")).unwrap();
        let c = mgr.add_applicant(job.id, applicant("Cy")).unwrap();
        mgr.hire(a.id).unwrap();
        mgr.hire(b.id).unwrap();

        // Not yet in Payment Pending.
        assert!(mgr.mark_payment_distributed(a.id).is_err());

        mgr.mark_work_finished(job.id).unwrap();
        mgr.mark_payment_received(job.id).unwrap();

        assert!(matches!(
            mgr.mark_payment_distributed(c.id),
            Err(LifecycleError::NotHired(_))
        ));

        let after_a = mgr.mark_payment_distributed(a.id).unwrap();
        assert_eq!(after_a.status, JobStatus::PaymentPending);
        assert!(mgr.application(a.id).unwrap().payment_distributed_at.is_some());

        // Repeating for the same applicant does not complete the job.
        let again = mgr.mark_payment_distributed(a.id).unwrap();
        assert_eq!(again.status, JobStatus::PaymentPending);

        let after_b = mgr.mark_payment_distributed(b.id).unwrap();
        assert_eq!(after_b.status, JobStatus::PaymentDistributed);

        // Already paid, job done: no-op.
        let done = mgr.mark_payment_distributed(b.id).unwrap();
        assert_eq!(done.status, JobStatus::PaymentDistributed);
    }

    #[test]
    fn test_payment_completion_survives_revert() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        mgr.hire(a.id).unwrap();
        mgr.mark_work_finished(job.id).unwrap();
        mgr.mark_payment_received(job.id).unwrap();
        mgr.mark_payment_distributed(a.id).unwrap();

        mgr.revert(job.id).unwrap();
        assert_eq!(mgr.job(job.id).unwrap().status, JobStatus::PaymentPending);
        let job = mgr.mark_payment_distributed(a.id).unwrap();
        assert_eq!(job.status, JobStatus::PaymentDistributed);
    }

    #[test]
    fn test_revert_uses_fixed_table() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);
        assert_eq!(
            mgr.revert(job.id).unwrap(),
            Outcome::Changed {
                from: JobStatus::Active,
                to: JobStatus::Pending
            }
        );
        mgr.revert(job.id).unwrap();
        assert_eq!(mgr.job(job.id).unwrap().status, JobStatus::Draft);
        assert!(matches!(
            mgr.revert(job.id),
            Err(LifecycleError::InvalidTransition {
                status: JobStatus::Draft,
                ..
            })
        ));
    }

    #[test]
    fn test_revert_leaves_counters() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 2);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        mgr.hire(a.id).unwrap();
        mgr.revert(job.id).unwrap();

        let job = mgr.job(job.id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.positions_filled, 1);
        assert!(mgr.audit().unwrap().is_empty());
    }

    #[test]
    fn test_deactivate_and_activate() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);

        mgr.deactivate(job.id).unwrap();
        assert_eq!(mgr.job(job.id).unwrap().status, JobStatus::Deactivated);
        assert_eq!(
            mgr.deactivate(job.id).unwrap(),
            Outcome::Unchanged(JobStatus::Deactivated)
        );

        mgr.activate(job.id).unwrap();
        assert_eq!(mgr.job(job.id).unwrap().status, JobStatus::Active);
        assert_eq!(
            mgr.activate(job.id).unwrap(),
            Outcome::Unchanged(JobStatus::Active)
        );

        let draft = mgr.create_job("Usher", 1).unwrap();
        assert!(mgr.deactivate(draft.id).is_err());
        mgr.activate(draft.id).unwrap();
        assert_eq!(mgr.job(draft.id).unwrap().status, JobStatus::Active);
    }

    #[test]
    fn test_deactivated_reverts_to_active() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);
        mgr.deactivate(job.id).unwrap();
        mgr.revert(job.id).unwrap();
        assert_eq!(mgr.job(job.id).unwrap().status, JobStatus::Active);
    }

    #[test]
    fn test_delete_job_without_cascade_keeps_applications() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();

        assert_eq!(mgr.delete_job(job.id, false).unwrap(), 0);
        assert!(matches!(mgr.job(job.id), Err(LifecycleError::JobNotFound(_))));
        assert_eq!(mgr.application(a.id).unwrap().job_id, job.id);
    }

    #[test]
    fn test_delete_job_with_cascade() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        mgr.add_applicant(job.id, applicant("Ben")).unwrap();

        assert_eq!(mgr.delete_job(job.id, true).unwrap(), 2);
        assert!(matches!(
            mgr.application(a.id),
            Err(LifecycleError::ApplicationNotFound(_))
        ));
    }

    #[test]
    fn test_remove_hired_applicant_releases_position() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        mgr.hire(a.id).unwrap();
        assert_eq!(mgr.job(job.id).unwrap().status, JobStatus::Completed);

        mgr.remove_applicant(a.id).unwrap();
        let job = mgr.job(job.id).unwrap();
        assert_eq!(job.positions_filled, 0);
        assert_eq!(job.status, JobStatus::Active);
        assert!(mgr.audit().unwrap().is_empty());
    }

    #[test]
    fn test_remove_unhired_applicant() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        mgr.remove_applicant(a.id).unwrap();
        assert!(mgr.applications(job.id).unwrap().is_empty());
        assert_eq!(mgr.job(job.id).unwrap().status, JobStatus::Active);
    }

    #[test]
    fn test_add_applicant_validation() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = mgr.create_job("Usher", 1).unwrap();

        let no_contact = NewApplication {
            name: "Ana".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            mgr.add_applicant(job.id, no_contact),
            Err(LifecycleError::Validation(_))
        ));

        let bad_email = NewApplication {
            name: "Ana".to_string(),
            email: Some("ana-at-example".to_string()),
            ..Default::default()
        };
        assert!(mgr.add_applicant(job.id, bad_email).is_err());

        let bad_phone = NewApplication {
            name: "Ana".to_string(),
            phone: Some("12-34".to_string()),
            ..Default::default()
        };
        assert!(mgr.add_applicant(job.id, bad_phone).is_err());

        let blank_name = NewApplication {
            name: "   ".to_string(),
            phone: Some("555 123 4567".to_string()),
            ..Default::default()
        };
        assert!(mgr.add_applicant(job.id, blank_name).is_err());

        assert!(mgr.applications(job.id).unwrap().is_empty());
    }

    #[test]
    fn test_add_applicant_normalizes_and_marks_manual() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = mgr.create_job("Usher", 1).unwrap();

        let manual = mgr
            .add_applicant(
                job.id,
                NewApplication {
                    name: " Ana ".to_string(),
                    phone: Some("(555) 123-4567".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(manual.name, "Ana");
        assert_eq!(manual.phone.as_deref(), Some("5551234567"));
        assert!(manual.is_manual);

        let public = mgr
            .add_applicant(
                job.id,
                NewApplication {
                    user_id: Some("uid-1".to_string()),
                    ..applicant("Ben")
                },
            )
            .unwrap();
        assert!(!public.is_manual);

        assert!(matches!(
            mgr.add_applicant(999, applicant("Cy")),
            Err(LifecycleError::JobNotFound(999))
        ));
    }

    #[test]
    fn test_set_applicant_status() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();

        let a = mgr
            .set_applicant_status(a.id, ApplicationStatus::Interviewed)
            .unwrap();
        assert_eq!(a.status, ApplicationStatus::Interviewed);
        assert!(mgr.set_applicant_status(a.id, ApplicationStatus::Hired).is_err());

        mgr.hire(a.id).unwrap();
        assert!(mgr
            .set_applicant_status(a.id, ApplicationStatus::Rejected)
            .is_err());
    }

    #[test]
    fn test_history_records_actor_and_commands() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "ops@shiftboard");
        let job = active_job(&mgr, 1);
        let history = mgr.history(job.id).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from_status, JobStatus::Draft);
        assert_eq!(history[0].to_status, JobStatus::Pending);
        assert_eq!(history[0].command, "approve");
        assert_eq!(history[1].to_status, JobStatus::Active);
        assert!(history.iter().all(|t| t.actor == "ops@shiftboard"));
    }

    #[test]
    fn test_remove_hired_applicant_rejected_once_work_finished() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        mgr.hire(a.id).unwrap();
        mgr.mark_work_finished(job.id).unwrap();

        assert!(matches!(
            mgr.remove_applicant(a.id),
            Err(LifecycleError::InvalidTransition {
                status: JobStatus::WorkFinished,
                ..
            })
        ));

        mgr.mark_payment_received(job.id).unwrap();
        assert!(matches!(
            mgr.remove_applicant(a.id),
            Err(LifecycleError::InvalidTransition {
                status: JobStatus::PaymentPending,
                ..
            })
        ));

        // Nothing was removed, so the job can still complete.
        let job = mgr.job(job.id).unwrap();
        assert_eq!(job.positions_filled, 1);
        assert_eq!(mgr.application(a.id).unwrap().status, ApplicationStatus::Hired);
        let job = mgr.mark_payment_distributed(a.id).unwrap();
        assert_eq!(job.status, JobStatus::PaymentDistributed);
    }

    #[test]
    fn test_remove_unhired_applicant_allowed_after_work_finished() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 1);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        let b = mgr.add_applicant(job.id, applicant("Ben")).unwrap();
        mgr.hire(a.id).unwrap();
        mgr.mark_work_finished(job.id).unwrap();

        mgr.remove_applicant(b.id).unwrap();
        let job = mgr.job(job.id).unwrap();
        assert_eq!(job.status, JobStatus::WorkFinished);
        assert_eq!(job.positions_filled, 1);
    }

    #[test]
    fn test_remove_hire_clears_payment_stamp() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let job = active_job(&mgr, 2);
        let a = mgr.add_applicant(job.id, applicant("Ana")).unwrap();
        let b = mgr.add_applicant(job.id, applicant("Ben")).unwrap();
        mgr.hire(a.id).unwrap();
        mgr.hire(b.id).unwrap();
        mgr.mark_work_finished(job.id).unwrap();
        mgr.mark_payment_received(job.id).unwrap();
        mgr.mark_payment_distributed(a.id).unwrap();

        // Payment Pending -> Work Finished -> Completed
        mgr.revert(job.id).unwrap();
        mgr.revert(job.id).unwrap();
        mgr.remove_hire(a.id).unwrap();

        let a = mgr.application(a.id).unwrap();
        assert_eq!(a.status, ApplicationStatus::Applied);
        assert!(a.payment_distributed_at.is_none());

        // Re-hired, the applicant is owed payment again.
        mgr.hire(a.id).unwrap();
        mgr.mark_work_finished(job.id).unwrap();
        mgr.mark_payment_received(job.id).unwrap();
        assert_eq!(db.count_unpaid_hires(job.id).unwrap(), 2);
    }

    #[test]
    fn test_activate_unpublished_job_stamps_published_at() {
        let db = test_db();
        let mgr = LifecycleManager::new(&db, "admin");
        let draft = mgr.create_job("Usher", 1).unwrap();
        mgr.activate(draft.id).unwrap();
        let job = mgr.job(draft.id).unwrap();
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.published_at.as_deref(), Some(job.updated_at.as_str()));

        // Suspending and reactivating keeps the original publish time.
        mgr.deactivate(job.id).unwrap();
        mgr.activate(job.id).unwrap();
        let again = mgr.job(job.id).unwrap();
        assert_eq!(again.published_at, job.published_at);
    }
}

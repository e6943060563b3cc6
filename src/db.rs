use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LifecycleError, Result};
use crate::models::{
    Application, ApplicationStatus, CountMismatch, Job, NewApplication, Transition,
};
use crate::status::JobStatus;

/// How long a writer waits for another connection's transaction to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Document store for jobs, applications and the status log.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LifecycleError::Config(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        // Applications carry no foreign key: they outlive their job unless
        // removed explicitly.
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'Draft' CHECK (status IN (
                    'Draft', 'Pending', 'Active', 'Filling', 'Completed', 'Work Finished',
                    'Payment Pending', 'Payment Distributed', 'Deactivated')),
                positions_needed INTEGER NOT NULL CHECK (positions_needed >= 1),
                positions_filled INTEGER NOT NULL DEFAULT 0 CHECK (positions_filled >= 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                published_at TEXT
            );

            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL,
                user_id TEXT,
                name TEXT NOT NULL,
                phone TEXT,
                email TEXT,
                status TEXT NOT NULL DEFAULT 'Applied' CHECK (status IN (
                    'Applied', 'Interviewed', 'Hired', 'Rejected')),
                is_manual INTEGER NOT NULL DEFAULT 0,
                payment_distributed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS job_transitions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL,
                from_status TEXT NOT NULL,
                to_status TEXT NOT NULL,
                command TEXT NOT NULL,
                actor TEXT NOT NULL,
                at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_applications_job ON applications(job_id);
            CREATE INDEX IF NOT EXISTS idx_transitions_job ON job_transitions(job_id);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(LifecycleError::Config(
                "database not initialized. Run 'shiftboard init' first.".to_string(),
            ));
        }
        Ok(())
    }

    /// Begin a write transaction; statements issued through `self` until it
    /// is committed belong to it, and dropping it rolls them back.
    ///
    /// The write lock is taken up front, so reads made inside the transaction
    /// cannot be invalidated by another connection before the writes land.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?)
    }

    // --- Job operations ---

    pub fn insert_job(&self, title: &str, positions_needed: i64) -> Result<i64> {
        let now = now();
        self.conn.execute(
            "INSERT INTO jobs (title, status, positions_needed, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![title, JobStatus::Draft, positions_needed, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let job = self
            .conn
            .query_row(
                "SELECT id, title, status, positions_needed, positions_filled,
                        created_at, updated_at, published_at
                 FROM jobs WHERE id = ?1",
                [id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    pub fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, status, positions_needed, positions_filled,
                    created_at, updated_at, published_at
             FROM jobs
             WHERE ?1 IS NULL OR status = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![status], Self::row_to_job)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Set the job's status and stamp `updated_at`; `publish` also stamps
    /// `published_at`.
    pub fn set_job_status(&self, id: i64, status: JobStatus, publish: bool) -> Result<()> {
        let now = now();
        if publish {
            self.conn.execute(
                "UPDATE jobs SET status = ?1, updated_at = ?2, published_at = ?2 WHERE id = ?3",
                params![status, now, id],
            )?;
        } else {
            self.conn.execute(
                "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status, now, id],
            )?;
        }
        Ok(())
    }

    pub fn set_positions_filled(&self, id: i64, filled: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE jobs SET positions_filled = ?1, updated_at = ?2 WHERE id = ?3",
            params![filled, now(), id],
        )?;
        Ok(())
    }

    pub fn delete_job(&self, id: i64) -> Result<bool> {
        let n = self.conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
        Ok(n > 0)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        Ok(Job {
            id: row.get(0)?,
            title: row.get(1)?,
            status: row.get(2)?,
            positions_needed: row.get(3)?,
            positions_filled: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            published_at: row.get(7)?,
        })
    }

    // --- Application operations ---

    pub fn insert_application(&self, job_id: i64, new: &NewApplication) -> Result<i64> {
        let now = now();
        self.conn.execute(
            "INSERT INTO applications
                (job_id, user_id, name, phone, email, status, is_manual, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                job_id,
                new.user_id,
                new.name,
                new.phone,
                new.email,
                ApplicationStatus::Applied,
                new.is_manual,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_application(&self, id: i64) -> Result<Option<Application>> {
        let app = self
            .conn
            .query_row(
                "SELECT id, job_id, user_id, name, phone, email, status, is_manual,
                        payment_distributed_at, created_at, updated_at
                 FROM applications WHERE id = ?1",
                [id],
                Self::row_to_application,
            )
            .optional()?;
        Ok(app)
    }

    pub fn list_applications(&self, job_id: i64) -> Result<Vec<Application>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, job_id, user_id, name, phone, email, status, is_manual,
                    payment_distributed_at, created_at, updated_at
             FROM applications WHERE job_id = ?1
             ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([job_id], Self::row_to_application)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn set_application_status(&self, id: i64, status: ApplicationStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE applications SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, now(), id],
        )?;
        Ok(())
    }

    pub fn stamp_payment_distributed(&self, id: i64) -> Result<()> {
        let now = now();
        self.conn.execute(
            "UPDATE applications SET payment_distributed_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(())
    }

    pub fn clear_payment_distributed(&self, id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE applications SET payment_distributed_at = NULL, updated_at = ?1
             WHERE id = ?2",
            params![now(), id],
        )?;
        Ok(())
    }

    /// Hired applications of `job_id` still waiting for their payment.
    pub fn count_unpaid_hires(&self, job_id: i64) -> Result<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM applications
             WHERE job_id = ?1 AND status = ?2 AND payment_distributed_at IS NULL",
            params![job_id, ApplicationStatus::Hired],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    pub fn delete_application(&self, id: i64) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM applications WHERE id = ?1", [id])?;
        Ok(n > 0)
    }

    pub fn delete_applications_for_job(&self, job_id: i64) -> Result<usize> {
        let n = self
            .conn
            .execute("DELETE FROM applications WHERE job_id = ?1", [job_id])?;
        Ok(n)
    }

    fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<Application> {
        Ok(Application {
            id: row.get(0)?,
            job_id: row.get(1)?,
            user_id: row.get(2)?,
            name: row.get(3)?,
            phone: row.get(4)?,
            email: row.get(5)?,
            status: row.get(6)?,
            is_manual: row.get(7)?,
            payment_distributed_at: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    // --- Status log ---

    pub fn record_transition(
        &self,
        job_id: i64,
        from: JobStatus,
        to: JobStatus,
        command: &str,
        actor: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO job_transitions (job_id, from_status, to_status, command, actor, at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![job_id, from, to, command, actor, now()],
        )?;
        Ok(())
    }

    pub fn list_transitions(&self, job_id: i64) -> Result<Vec<Transition>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, job_id, from_status, to_status, command, actor, at
             FROM job_transitions WHERE job_id = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map([job_id], |row| {
            Ok(Transition {
                id: row.get(0)?,
                job_id: row.get(1)?,
                from_status: row.get(2)?,
                to_status: row.get(3)?,
                command: row.get(4)?,
                actor: row.get(5)?,
                at: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Jobs whose `positions_filled` differs from their count of hired
    /// applications.
    pub fn count_mismatches(&self) -> Result<Vec<CountMismatch>> {
        let mut stmt = self.conn.prepare(
            "SELECT j.id, j.positions_filled, COUNT(a.id)
             FROM jobs j
             LEFT JOIN applications a ON a.job_id = j.id AND a.status = ?1
             GROUP BY j.id
             HAVING j.positions_filled != COUNT(a.id)
             ORDER BY j.id",
        )?;
        let rows = stmt.query_map([ApplicationStatus::Hired], |row| {
            Ok(CountMismatch {
                job_id: row.get(0)?,
                positions_filled: row.get(1)?,
                hired: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.label()))
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        JobStatus::parse(value.as_str()?).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for ApplicationStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.label()))
    }
}

impl FromSql for ApplicationStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        ApplicationStatus::parse(value.as_str()?).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use shiftboard::config::Config;
use shiftboard::models::{ApplicationStatus, Job, NewApplication};
use shiftboard::status::render_progress;
use shiftboard::{Database, JobStatus, LifecycleManager, Outcome};

#[derive(Parser)]
#[command(name = "shiftboard")]
#[command(about = "Moderate part-time job postings and move them through their lifecycle")]
struct Cli {
    /// Database file (overrides config and SHIFTBOARD_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Name recorded in the status log (overrides config and SHIFTBOARD_ACTOR)
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage job postings
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Approve a draft (Draft -> Pending)
    Approve { id: i64 },

    /// Publish an approved job (Pending -> Active)
    Post { id: i64 },

    /// Hire an applicant
    Hire {
        /// Application ID
        application: i64,
    },

    /// Take back a hire
    Unhire {
        /// Application ID
        application: i64,
    },

    /// Mark the work as finished (Completed -> Work Finished)
    Finish { id: i64 },

    /// Mark payment as received (Work Finished -> Payment Pending)
    Paid { id: i64 },

    /// Record payment distributed to a hired applicant
    Distribute {
        /// Application ID
        application: i64,
    },

    /// Move a job back to its previous status
    Revert { id: i64 },

    /// Suspend an active job
    Deactivate { id: i64 },

    /// Reactivate a job
    Activate { id: i64 },

    /// Manage applicants
    Applicant {
        #[command(subcommand)]
        command: ApplicantCommands,
    },

    /// List jobs whose filled count disagrees with their hires
    Audit,
}

#[derive(Subcommand)]
enum JobCommands {
    /// Create a draft job
    Add {
        title: String,

        /// Number of positions to fill
        #[arg(short, long, default_value = "1")]
        positions: i64,
    },

    /// List jobs
    List {
        /// Filter by status (e.g. draft, active, "work finished")
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show job details and applicants
    Show { id: i64 },

    /// Show the status log of a job
    History { id: i64 },

    /// Delete a job
    Delete {
        id: i64,

        /// Also delete the job's applications
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(Subcommand)]
enum ApplicantCommands {
    /// Add an applicant to a job
    Add {
        /// Job ID
        job: i64,

        /// Applicant name
        name: String,

        #[arg(short, long)]
        phone: Option<String>,

        #[arg(short, long)]
        email: Option<String>,

        /// Marketplace user ID (omit for a manually added applicant)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// List applicants of a job
    List {
        /// Job ID
        job: i64,
    },

    /// Set screening status (applied, interviewed, rejected)
    Status {
        /// Application ID
        application: i64,

        status: String,
    },

    /// Remove an applicant
    Remove {
        /// Application ID
        application: i64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }
    if let Some(actor) = cli.actor {
        config.actor = actor;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let db_path = config.database_path();
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    if let Commands::Init = cli.command {
        db.init()?;
        println!("Database initialized at {}", db.path().display());
        return Ok(());
    }

    db.ensure_initialized()?;
    let mgr = LifecycleManager::new(&db, config.actor);

    match cli.command {
        Commands::Init => {}

        Commands::Job { command } => match command {
            JobCommands::Add { title, positions } => {
                let job = mgr.create_job(&title, positions)?;
                println!("Created draft job #{} ({} position(s))", job.id, job.positions_needed);
            }

            JobCommands::List { status } => {
                let status = status.as_deref().map(JobStatus::parse).transpose()?;
                let jobs = mgr.jobs(status)?;
                if jobs.is_empty() {
                    println!("No jobs found.");
                } else {
                    println!("{:<6} {:<20} {:<30} {:>9}", "ID", "STATUS", "TITLE", "FILLED");
                    println!("{}", "-".repeat(68));
                    for job in jobs {
                        println!(
                            "{:<6} {:<20} {:<30} {:>9}",
                            job.id,
                            job.status.label(),
                            truncate(&job.title, 28),
                            format!("{}/{}", job.positions_filled, job.positions_needed)
                        );
                    }
                }
            }

            JobCommands::Show { id } => {
                let job = mgr.job(id)?;
                print_job(&job);
                let apps = mgr.applications(id)?;
                if !apps.is_empty() {
                    println!("\nApplicants ({}):", apps.len());
                    for app in apps {
                        let paid = if app.payment_distributed_at.is_some() {
                            " (paid)"
                        } else {
                            ""
                        };
                        println!("  #{} - {} [{}]{}", app.id, app.name, app.status, paid);
                    }
                }
            }

            JobCommands::History { id } => {
                mgr.job(id)?;
                let history = mgr.history(id)?;
                if history.is_empty() {
                    println!("No status changes recorded for job #{}.", id);
                } else {
                    println!(
                        "{:<25} {:<20} {:<20} {:<20} {:<12}",
                        "AT", "FROM", "TO", "COMMAND", "ACTOR"
                    );
                    println!("{}", "-".repeat(99));
                    for t in history {
                        println!(
                            "{:<25} {:<20} {:<20} {:<20} {:<12}",
                            t.at,
                            t.from_status.label(),
                            t.to_status.label(),
                            truncate(&t.command, 18),
                            truncate(&t.actor, 12)
                        );
                    }
                }
            }

            JobCommands::Delete { id, cascade } => {
                let removed = mgr.delete_job(id, cascade)?;
                if cascade {
                    println!("Deleted job #{} and {} application(s).", id, removed);
                } else {
                    println!("Deleted job #{}. Its applications were kept.", id);
                }
            }
        },

        Commands::Approve { id } => report(id, mgr.approve_draft(id)?),
        Commands::Post { id } => report(id, mgr.post_job(id)?),
        Commands::Finish { id } => report(id, mgr.mark_work_finished(id)?),
        Commands::Paid { id } => report(id, mgr.mark_payment_received(id)?),
        Commands::Revert { id } => report(id, mgr.revert(id)?),
        Commands::Deactivate { id } => report(id, mgr.deactivate(id)?),
        Commands::Activate { id } => report(id, mgr.activate(id)?),

        Commands::Hire { application } => {
            let job = mgr.hire(application)?;
            println!(
                "Hired applicant #{} for job #{} ({}/{} filled, {})",
                application, job.id, job.positions_filled, job.positions_needed, job.status
            );
        }

        Commands::Unhire { application } => {
            let job = mgr.remove_hire(application)?;
            println!(
                "Removed hire #{} from job #{} ({}/{} filled, {})",
                application, job.id, job.positions_filled, job.positions_needed, job.status
            );
        }

        Commands::Distribute { application } => {
            let job = mgr.mark_payment_distributed(application)?;
            println!(
                "Payment recorded for applicant #{}. Job #{} is {}.",
                application, job.id, job.status
            );
        }

        Commands::Applicant { command } => match command {
            ApplicantCommands::Add {
                job,
                name,
                phone,
                email,
                user,
            } => {
                let app = mgr.add_applicant(
                    job,
                    NewApplication {
                        user_id: user,
                        name,
                        phone,
                        email,
                        is_manual: false,
                    },
                )?;
                println!("Added applicant #{} to job #{}", app.id, job);
            }

            ApplicantCommands::List { job } => {
                mgr.job(job)?;
                let apps = mgr.applications(job)?;
                if apps.is_empty() {
                    println!("No applicants for job #{}.", job);
                } else {
                    println!(
                        "{:<6} {:<12} {:<24} {:<16} {:<28}",
                        "ID", "STATUS", "NAME", "PHONE", "EMAIL"
                    );
                    println!("{}", "-".repeat(90));
                    for app in apps {
                        println!(
                            "{:<6} {:<12} {:<24} {:<16} {:<28}",
                            app.id,
                            app.status.label(),
                            truncate(&app.name, 22),
                            app.phone.unwrap_or_default(),
                            truncate(&app.email.unwrap_or_default(), 26)
                        );
                    }
                }
            }

            ApplicantCommands::Status { application, status } => {
                let status = ApplicationStatus::parse(&status)?;
                let app = mgr.set_applicant_status(application, status)?;
                println!("Applicant #{} is now {}.", app.id, app.status);
            }

            ApplicantCommands::Remove { application } => {
                mgr.remove_applicant(application)?;
                println!("Removed applicant #{}.", application);
            }
        },

        Commands::Audit => {
            let mismatches = mgr.audit()?;
            if mismatches.is_empty() {
                println!("All filled counts match their hires.");
            } else {
                println!("{:<6} {:>8} {:>8}", "JOB", "FILLED", "HIRED");
                println!("{}", "-".repeat(24));
                for m in mismatches {
                    println!("{:<6} {:>8} {:>8}", m.job_id, m.positions_filled, m.hired);
                }
            }
        }
    }

    Ok(())
}

fn report(id: i64, outcome: Outcome) {
    match outcome {
        Outcome::Changed { from, to } => println!("Job #{}: {} -> {}", id, from, to),
        Outcome::Unchanged(status) => println!("Job #{} is already {}.", id, status),
    }
}

fn print_job(job: &Job) {
    println!("Job #{}", job.id);
    println!("Title: {}", job.title);
    println!("Status: {}", job.status);
    println!("Progress: {}", render_progress(job.status));
    println!("Positions: {}/{} filled", job.positions_filled, job.positions_needed);
    println!("Created: {}", job.created_at);
    println!("Updated: {}", job.updated_at);
    if let Some(published) = &job.published_at {
        println!("Published: {}", published);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

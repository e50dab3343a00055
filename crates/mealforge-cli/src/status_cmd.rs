//! `mealforge status` and `mealforge dlq` commands.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use mealforge_core::queue::{Job, PLAN_GENERATION_QUEUE};
use mealforge_db::queries::{dead_letters, jobs as job_db};

const RECENT_JOBS: i64 = 20;

/// Run the status command.
///
/// When `job_id_str` is `Some`, shows detailed status for that job.
/// When `None`, shows queue counts and the most recent jobs.
pub async fn run_status(pool: &PgPool, job_id_str: Option<&str>) -> Result<()> {
    match job_id_str {
        Some(id_str) => run_job_status(pool, id_str).await,
        None => run_queue_status(pool).await,
    }
}

async fn run_job_status(pool: &PgPool, job_id_str: &str) -> Result<()> {
    let job_id =
        Uuid::parse_str(job_id_str).with_context(|| format!("invalid job ID: {job_id_str}"))?;

    let job = job_db::get_job(pool, job_id)
        .await?
        .with_context(|| format!("job {job_id} not found"))?;

    println!("Job: {} ({})", job.id, job.queue);
    println!("Status: {}", job.status);
    println!("Attempts: {}/{}", job.attempts_made, job.max_attempts);
    println!("Created: {}", job.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if !job.status.is_terminal() {
        println!("Run at: {}", job.run_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(owner) = &job.locked_by {
        println!("Worker: {owner}");
    }
    if let Some(plan_id) = &job.result_ref {
        println!("Plan: {plan_id}");
    }
    if let Some(error) = &job.last_error {
        println!("Last error: {error}");
    }

    if let Some(entry) = dead_letters::get_dead_letter_for_job(pool, job_id).await? {
        println!();
        println!(
            "Dead-lettered {} after {} attempt(s): {}",
            entry.failed_at.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.attempts_made,
            entry.failed_reason
        );
    }

    Ok(())
}

async fn run_queue_status(pool: &PgPool) -> Result<()> {
    let counts = job_db::count_by_status(pool, PLAN_GENERATION_QUEUE).await?;
    println!("Queue: {PLAN_GENERATION_QUEUE}");
    println!(
        "  pending={} running={} saving={} completed={} failed={} total={}",
        counts.pending,
        counts.running,
        counts.saving,
        counts.completed,
        counts.failed,
        counts.total(),
    );
    println!();

    let jobs = job_db::list_jobs(pool, PLAN_GENERATION_QUEUE, RECENT_JOBS).await?;
    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    println!("{:<38} {:<10} {:>8} {:<20}", "ID", "STATUS", "ATTEMPTS", "UPDATED");
    println!("{}", "-".repeat(79));
    for job in &jobs {
        println!("{}", job_row(job));
    }

    Ok(())
}

fn job_row(job: &Job) -> String {
    format!(
        "{:<38} {:<10} {:>8} {:<20}",
        job.id,
        job.status.to_string(),
        format!("{}/{}", job.attempts_made, job.max_attempts),
        job.updated_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Run the dlq command: list dead-lettered jobs.
pub async fn run_dlq(pool: &PgPool) -> Result<()> {
    let entries = dead_letters::list_dead_letters(pool, PLAN_GENERATION_QUEUE).await?;
    if entries.is_empty() {
        println!("Dead letter queue is empty.");
        return Ok(());
    }

    println!("Dead letters ({}):", entries.len());
    for entry in &entries {
        println!(
            "  [{}] {} after {} attempt(s): {}",
            entry.failed_at.format("%Y-%m-%d %H:%M:%S"),
            entry.original_job_id,
            entry.attempts_made,
            truncate(&entry.failed_reason, 80),
        );
    }
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

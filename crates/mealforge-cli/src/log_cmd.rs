//! `mealforge log` command: replay the progress events recorded for a job.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use mealforge_db::models::JobEvent;
use mealforge_db::queries::{job_events, jobs as job_db};

/// Run the log command.
pub async fn run_log(pool: &PgPool, job_id_str: &str, attempt: Option<i32>) -> Result<()> {
    let job_id =
        Uuid::parse_str(job_id_str).with_context(|| format!("invalid job ID: {job_id_str}"))?;

    let job = job_db::get_job(pool, job_id)
        .await?
        .with_context(|| format!("job {job_id} not found"))?;

    println!("Job: {}", job.id);
    println!("Status: {} (attempt {}/{})", job.status, job.attempts_made, job.max_attempts);
    println!();

    let events: Vec<JobEvent> = job_events::list_events_for_job(pool, job_id)
        .await?
        .into_iter()
        .filter(|e| attempt.is_none() || e.attempt == attempt)
        .collect();

    if events.is_empty() {
        println!("No events recorded.");
        return Ok(());
    }

    println!("Events ({}):", events.len());
    for event in &events {
        println!("  {}", format_event(event));
    }

    Ok(())
}

fn format_event(event: &JobEvent) -> String {
    let time = event.recorded_at.format("%H:%M:%S%.3f");
    let attempt = event
        .attempt
        .map(|a| format!("attempt {a}"))
        .unwrap_or_else(|| "attempt -".to_string());
    format!(
        "[{time}] [{attempt}] {} {}: {}",
        event.agent_name, event.status, event.message
    )
}

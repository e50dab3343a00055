//! `mealforge enqueue` command: submit an intake form as a generation job.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use uuid::Uuid;

use mealforge_core::model::{JobSubmission, RawIntakeForm};
use mealforge_core::queue::{EnqueueOptions, JobQueue};

/// Parse an intake form from a JSON file. Accepts either the bare form or
/// a full `{ "intakeData": ..., "jobId": ... }` submission.
pub fn read_submission(path: &Path) -> Result<JobSubmission> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read intake file: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse JSON from {}", path.display()))?;

    if value.get("intakeData").is_some() {
        return serde_json::from_value(value)
            .with_context(|| format!("invalid job submission in {}", path.display()));
    }
    let intake_data: RawIntakeForm = serde_json::from_value(value)
        .with_context(|| format!("invalid intake form in {}", path.display()))?;
    Ok(JobSubmission {
        intake_data,
        job_id: Uuid::new_v4(),
    })
}

/// Run the enqueue command.
pub async fn run_enqueue(
    queue: &dyn JobQueue,
    path: &Path,
    max_attempts: u32,
    delay_secs: u64,
) -> Result<()> {
    let submission = read_submission(path)?;
    let options = EnqueueOptions {
        max_attempts,
        delay: Duration::from_secs(delay_secs),
    };

    // Re-submitting a known job id is a no-op that returns the same id.
    let id = queue.enqueue(&submission, options).await?;
    tracing::info!(job_id = %id, queue = queue.name(), "job submitted");
    println!("Queued job {id} (max {max_attempts} attempts).");
    println!("Follow it with `mealforge status {id}` or `mealforge log {id}`.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use mealforge_core::queue::InMemoryQueue;

    use super::*;

    fn write_json(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn bare_form_gets_a_fresh_job_id() {
        let file = write_json(r#"{ "sex": "female", "age": 29, "allergies": ["peanut"] }"#);
        let submission = read_submission(file.path()).unwrap();
        assert_eq!(submission.intake_data.sex.as_deref(), Some("female"));
        assert_eq!(submission.intake_data.allergies, vec!["peanut".to_string()]);
    }

    #[test]
    fn full_submission_keeps_its_job_id() {
        let id = Uuid::new_v4();
        let file = write_json(&format!(r#"{{ "intakeData": {{ "age": 40 }}, "jobId": "{id}" }}"#));
        let submission = read_submission(file.path()).unwrap();
        assert_eq!(submission.job_id, id);
        assert_eq!(submission.intake_data.age, Some(40.0));
    }

    #[test]
    fn invalid_json_names_the_file() {
        let file = write_json("{ not json");
        let err = read_submission(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse JSON"), "got: {err:#}");
    }

    #[tokio::test]
    async fn enqueue_twice_keeps_one_job() {
        let id = Uuid::new_v4();
        let file = write_json(&format!(r#"{{ "intakeData": {{}}, "jobId": "{id}" }}"#));
        let queue = InMemoryQueue::new();

        run_enqueue(&queue, file.path(), 3, 0).await.unwrap();
        run_enqueue(&queue, file.path(), 3, 0).await.unwrap();

        let jobs = queue.jobs().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, id);
        assert_eq!(jobs[0].max_attempts, 3);
    }
}

//! `mealforge generate` command: run the pipeline in-process, without a
//! queue, against the built-in recipe library and food table.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;

use mealforge_core::notify::RecordingNotifier;
use mealforge_core::pipeline::{run_pipeline, PipelineContext, PipelineOutput};
use mealforge_core::scoring::ScorecardResult;

use crate::enqueue_cmd::read_submission;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Category scores, composite and violations
    #[default]
    Scorecard,
    /// The rendered markdown plan
    Markdown,
    /// The full pipeline output as JSON
    Json,
}

/// Run the generate command.
pub async fn run_generate(path: &Path, format: OutputFormat, verbose: bool) -> Result<()> {
    let submission = read_submission(path)?;
    let context = PipelineContext::deterministic();
    let recorder = RecordingNotifier::new();

    let result = run_pipeline(
        submission.job_id,
        None,
        &submission.intake_data,
        &context,
        &recorder,
    )
    .await;

    if verbose {
        for event in recorder.events() {
            eprintln!("[{}] {}: {}", event.status.as_str(), event.agent_name, event.message);
        }
    }

    let output = result.context("plan generation failed")?;
    print!("{}", render(&output, format)?);
    Ok(())
}

fn render(output: &PipelineOutput, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Scorecard => format_scorecard(&output.plan.validated.scorecard),
        OutputFormat::Markdown => output.plan.markdown.clone(),
        OutputFormat::Json => {
            let mut json =
                serde_json::to_string_pretty(output).context("failed to serialize plan")?;
            json.push('\n');
            json
        }
    })
}

pub fn format_scorecard(scorecard: &ScorecardResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<24} {:>6} {:>7} {:>9}\n", "CATEGORY", "SCORE", "WEIGHT", "WEIGHTED"));
    out.push_str(&format!("{}\n", "-".repeat(49)));
    for category in scorecard.categories() {
        out.push_str(&format!(
            "{:<24} {:>6.1} {:>7.2} {:>9.2}\n",
            category.name, category.score, category.weight, category.weighted
        ));
    }
    out.push_str(&format!("{}\n", "-".repeat(49)));
    out.push_str(&format!(
        "Composite: {:.2} ({:?})\n",
        scorecard.composite, scorecard.grade
    ));

    let violations = scorecard
        .allergen_violations
        .iter()
        .chain(&scorecard.dietary_violations)
        .collect::<Vec<_>>();
    if violations.is_empty() {
        out.push_str("No violations.\n");
    } else {
        out.push_str(&format!("Violations ({}):\n", violations.len()));
        for violation in violations {
            out.push_str(&format!(
                "  - day {} {}: '{}' breaks {:?} rule '{}'\n",
                violation.day_index + 1,
                violation.meal,
                violation.term,
                violation.kind,
                violation.rule
            ));
        }
    }
    out
}

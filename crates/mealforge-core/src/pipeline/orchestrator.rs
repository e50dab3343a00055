//! Runs the six stages of one job in order.
//!
//! Each stage is bracketed by two `running` progress events. The first
//! error aborts the run: later stages never start and no partial plan is
//! returned. The terminal `failed` event belongs to the worker, which knows
//! whether the attempt will be retried.

use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

use super::{
    calculate_metabolic_profile, compile_nutrition, curate_recipes, normalize_intake, render_plan,
    validate_plan, AgentStage, PipelineContext,
};
use crate::error::PipelineError;
use crate::model::{ClientIntake, MetabolicProfile, RawIntakeForm, RenderedPlan};
use crate::notify::{emit, ProgressEvent, ProgressNotifier, ProgressStatus};
use crate::sanitize::sanitize_message;

/// Everything a successful run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub intake: ClientIntake,
    pub profile: MetabolicProfile,
    pub plan: RenderedPlan,
}

struct StageRunner<'a> {
    job_id: Uuid,
    attempt: Option<u32>,
    notifier: &'a dyn ProgressNotifier,
}

impl StageRunner<'_> {
    async fn announce(&self, stage: AgentStage, message: &str) {
        let event = ProgressEvent::for_stage(self.job_id, stage, ProgressStatus::Running, message)
            .with_attempt(self.attempt);
        emit(self.notifier, &event).await;
    }

    async fn run<T, F>(&self, stage: AgentStage, work: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        self.announce(stage, stage.started_message()).await;
        tracing::debug!(job_id = %self.job_id, stage = stage.name(), "stage started");

        match work.await {
            Ok(output) => {
                tracing::info!(job_id = %self.job_id, stage = stage.name(), "stage finished");
                self.announce(stage, stage.finished_message()).await;
                Ok(output)
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    stage = stage.name(),
                    error = %sanitize_message(&e.to_string()),
                    "stage failed"
                );
                Err(e)
            }
        }
    }
}

/// Run stages 1 through 6 for one job.
pub async fn run_pipeline(
    job_id: Uuid,
    attempt: Option<u32>,
    form: &RawIntakeForm,
    ctx: &PipelineContext,
    notifier: &dyn ProgressNotifier,
) -> Result<PipelineOutput, PipelineError> {
    let runner = StageRunner {
        job_id,
        attempt,
        notifier,
    };

    let intake = runner
        .run(AgentStage::IntakeNormalizer, async { normalize_intake(form) })
        .await?;

    let profile = runner
        .run(AgentStage::MetabolicCalculator, async {
            calculate_metabolic_profile(&intake)
        })
        .await?;

    let draft = runner
        .run(
            AgentStage::RecipeCurator,
            curate_recipes(&intake, &profile, ctx.recipes.as_ref()),
        )
        .await?;

    let compiled = runner
        .run(
            AgentStage::NutritionCompiler,
            compile_nutrition(draft, ctx.nutrition.as_ref()),
        )
        .await?;

    let validated = runner
        .run(AgentStage::QaValidator, async {
            validate_plan(compiled, &intake, &profile, &ctx.qa)
        })
        .await?;

    tracing::info!(
        job_id = %job_id,
        composite = validated.scorecard.composite,
        grade = %validated.scorecard.grade,
        "plan accepted"
    );

    let plan = runner
        .run(AgentStage::OutputRenderer, async { render_plan(validated) })
        .await?;

    Ok(PipelineOutput {
        intake,
        profile,
        plan,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::model::JobSubmission;
    use crate::notify::RecordingNotifier;

    pub(crate) fn form() -> RawIntakeForm {
        let submission: JobSubmission = serde_json::from_value(serde_json::json!({
            "jobId": "0b8e7c9e-2f7d-4f7e-9a0e-3d1f5c2b6a11",
            "intakeData": {
                "sex": "male",
                "age": 34,
                "heightCm": 178,
                "weightKg": 82,
                "goalType": "cut",
                "activityLevel": "moderately_active",
                "trainingDays": ["mon", "wed", "fri"],
                "cuisinePreferences": ["mediterranean"]
            }
        }))
        .unwrap();
        submission.intake_data
    }

    /// A full deterministic run of [`form`].
    pub(crate) async fn output() -> PipelineOutput {
        run_pipeline(
            Uuid::new_v4(),
            None,
            &form(),
            &PipelineContext::deterministic(),
            &RecordingNotifier::new(),
        )
        .await
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::form;
    use super::*;
    use crate::notify::RecordingNotifier;

    #[tokio::test]
    async fn emits_two_events_per_stage_in_order() {
        let notifier = RecordingNotifier::new();
        let job_id = Uuid::new_v4();
        let output = run_pipeline(
            job_id,
            Some(1),
            &form(),
            &PipelineContext::deterministic(),
            &notifier,
        )
        .await
        .unwrap();
        assert_eq!(output.plan.validated.plan.days.len(), 7);

        let events = notifier.events_for(job_id);
        assert_eq!(events.len(), 12);
        for (i, pair) in events.chunks(2).enumerate() {
            let stage = AgentStage::ALL[i];
            assert_eq!(pair[0].agent, stage.number());
            assert_eq!(pair[0].message, stage.started_message());
            assert_eq!(pair[1].message, stage.finished_message());
            assert!(pair.iter().all(|e| e.status == ProgressStatus::Running));
            assert!(pair.iter().all(|e| e.attempt == Some(1)));
        }
    }

    #[tokio::test]
    async fn invalid_intake_stops_before_later_stages() {
        let notifier = RecordingNotifier::new();
        let job_id = Uuid::new_v4();
        let err = run_pipeline(
            job_id,
            None,
            &RawIntakeForm::default(),
            &PipelineContext::deterministic(),
            &notifier,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::InvalidIntake(_)));
        let events = notifier.events_for(job_id);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].agent, 1);
    }
}

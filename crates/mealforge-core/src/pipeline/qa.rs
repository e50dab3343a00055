//! Stage 5: score the compiled plan and decide whether to accept it.

use crate::error::PipelineError;
use crate::model::{ClientIntake, MealPlanCompiled, MealPlanValidated, MetabolicProfile};
use crate::scoring::score_plan;

/// Verified-nutrition share below which the plan carries a warning.
const LOW_COVERAGE: f64 = 0.8;
/// Category scores below this are reported as warnings.
const WEAK_CATEGORY: f64 = 5.0;

/// Acceptance settings for the quality gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QaConfig {
    /// Lowest composite score a plan may have and still be returned.
    pub min_composite: f64,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self { min_composite: 5.0 }
    }
}

/// Score the plan; reject it on any allergen hit or a composite below the
/// threshold.
pub fn validate_plan(
    plan: MealPlanCompiled,
    intake: &ClientIntake,
    profile: &MetabolicProfile,
    config: &QaConfig,
) -> Result<MealPlanValidated, PipelineError> {
    let scorecard = score_plan(&plan, intake, profile);

    if !scorecard.allergen_violations.is_empty() {
        let terms: Vec<String> = scorecard
            .allergen_violations
            .iter()
            .map(|v| format!("{} in '{}'", v.term, v.meal))
            .collect();
        return Err(PipelineError::QualityGate {
            composite: scorecard.composite,
            reason: format!("allergen matches: {}", terms.join(", ")),
        });
    }

    if scorecard.composite < config.min_composite {
        return Err(PipelineError::QualityGate {
            composite: scorecard.composite,
            reason: format!("composite below threshold {:.2}", config.min_composite),
        });
    }

    let mut warnings = Vec::new();
    if scorecard.coverage.total > 0 && scorecard.coverage.verified_fraction < LOW_COVERAGE {
        warnings.push(format!(
            "only {:.0}% of ingredients have verified nutrition",
            scorecard.coverage.verified_fraction * 100.0
        ));
    }
    for category in scorecard.categories() {
        if category.score < WEAK_CATEGORY {
            warnings.push(format!("{} scored {:.1}", category.name, category.score));
        }
    }
    if !scorecard.dietary_violations.is_empty() {
        warnings.push(format!(
            "{} dietary violations",
            scorecard.dietary_violations.len()
        ));
    }

    tracing::debug!(
        composite = scorecard.composite,
        grade = %scorecard.grade,
        warnings = warnings.len(),
        "plan accepted"
    );

    Ok(MealPlanValidated {
        plan,
        scorecard,
        warnings,
    })
}

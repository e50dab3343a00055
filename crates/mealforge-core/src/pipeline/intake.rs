//! Stage 1: turn the raw form into a validated [`ClientIntake`].

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::error::PipelineError;
use crate::model::{
    ActivityLevel, ClientIntake, DietaryStyle, GoalRate, GoalType, MacroStyle, RawIntakeForm, Sex,
    Weekday,
};

const CM_PER_INCH: f64 = 2.54;
const KG_PER_LB: f64 = 0.453_592_37;

const AGE_RANGE: RangeInclusive<f64> = 13.0..=100.0;
const HEIGHT_CM_RANGE: RangeInclusive<f64> = 100.0..=250.0;
const WEIGHT_KG_RANGE: RangeInclusive<f64> = 30.0..=300.0;
const MEALS_RANGE: RangeInclusive<u32> = 2..=6;
const SNACKS_RANGE: RangeInclusive<u32> = 0..=3;
const SKILL_RANGE: RangeInclusive<u32> = 1..=10;
const PREP_RANGE: RangeInclusive<u32> = 5..=240;
const DURATION_RANGE: RangeInclusive<u32> = 1..=7;

fn invalid(msg: impl Into<String>) -> PipelineError {
    PipelineError::InvalidIntake(msg.into())
}

/// Parse an optional enumerated field, falling back to `default` when absent.
fn choice<T>(
    field: &str,
    raw: Option<&str>,
    default: T,
    parse: fn(&str) -> Option<T>,
) -> Result<T, PipelineError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(value) => parse(value).ok_or_else(|| invalid(format!("unknown {field} {value:?}"))),
    }
}

fn bounded(field: &str, value: u32, range: RangeInclusive<u32>) -> Result<u32, PipelineError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(invalid(format!(
            "{field} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

fn measured(field: &str, value: f64, range: RangeInclusive<f64>) -> Result<f64, PipelineError> {
    if value.is_finite() && range.contains(&value) {
        Ok(value)
    } else {
        Err(invalid(format!(
            "{field} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

/// Trim, lowercase, drop blanks and duplicates (first occurrence wins).
fn term_list(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for item in raw {
        let term = item.trim().to_lowercase();
        if !term.is_empty() && !out.contains(&term) {
            out.push(term);
        }
    }
    out
}

fn height_cm(form: &RawIntakeForm) -> Result<f64, PipelineError> {
    let cm = match (form.height_cm, form.height_feet, form.height_inches) {
        (Some(cm), _, _) => cm,
        (None, Some(feet), inches) => (feet * 12.0 + inches.unwrap_or(0.0)) * CM_PER_INCH,
        (None, None, Some(inches)) => inches * CM_PER_INCH,
        (None, None, None) => return Err(invalid("height is required")),
    };
    measured("height (cm)", cm, HEIGHT_CM_RANGE)
}

fn weight_kg(form: &RawIntakeForm) -> Result<f64, PipelineError> {
    let kg = match (form.weight_kg, form.weight_lbs) {
        (Some(kg), _) => kg,
        (None, Some(lbs)) => lbs * KG_PER_LB,
        (None, None) => return Err(invalid("weight is required")),
    };
    measured("weight (kg)", kg, WEIGHT_KG_RANGE)
}

/// Validate and normalize a submitted intake form.
///
/// Sex, age, height and weight are required. Every other field has a
/// default; a present but unrecognized value is an error rather than being
/// silently replaced.
pub fn normalize_intake(form: &RawIntakeForm) -> Result<ClientIntake, PipelineError> {
    let sex = form
        .sex
        .as_deref()
        .ok_or_else(|| invalid("sex is required"))
        .and_then(|raw| Sex::parse(raw).ok_or_else(|| invalid(format!("unknown sex {raw:?}"))))?;

    let age = form.age.ok_or_else(|| invalid("age is required"))?;
    let age = measured("age", age, AGE_RANGE)?.round() as u32;

    let mut training_days = BTreeSet::new();
    for raw in &form.training_days {
        let day = Weekday::parse(raw).ok_or_else(|| invalid(format!("unknown weekday {raw:?}")))?;
        training_days.insert(day);
    }

    let dietary_style = choice(
        "dietary style",
        form.dietary_style.as_deref(),
        DietaryStyle::Omnivore,
        DietaryStyle::parse,
    )?;
    let default_macros = if dietary_style == DietaryStyle::Keto {
        MacroStyle::Keto
    } else {
        MacroStyle::Balanced
    };

    Ok(ClientIntake {
        sex,
        age,
        height_cm: height_cm(form)?,
        weight_kg: weight_kg(form)?,
        goal_type: choice(
            "goal type",
            form.goal_type.as_deref(),
            GoalType::Maintain,
            GoalType::parse,
        )?,
        goal_rate: choice(
            "goal rate",
            form.goal_rate.as_deref(),
            GoalRate::Moderate,
            GoalRate::parse,
        )?,
        activity_level: choice(
            "activity level",
            form.activity_level.as_deref(),
            ActivityLevel::ModeratelyActive,
            ActivityLevel::parse,
        )?,
        training_days,
        dietary_style,
        allergies: term_list(&form.allergies),
        exclusions: term_list(&form.exclusions),
        cuisine_preferences: term_list(&form.cuisine_preferences),
        meals_per_day: bounded("meals per day", form.meals_per_day.unwrap_or(3), MEALS_RANGE)?,
        snacks_per_day: bounded("snacks per day", form.snacks_per_day.unwrap_or(1), SNACKS_RANGE)?,
        cooking_skill: bounded("cooking skill", form.cooking_skill.unwrap_or(5), SKILL_RANGE)?,
        prep_time_max: bounded("prep time", form.prep_time_max.unwrap_or(45), PREP_RANGE)?,
        macro_style: choice(
            "macro style",
            form.macro_style.as_deref(),
            default_macros,
            MacroStyle::parse,
        )?,
        plan_duration_days: bounded(
            "plan duration",
            form.plan_duration_days.unwrap_or(7),
            DURATION_RANGE,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> RawIntakeForm {
        RawIntakeForm {
            sex: Some("male".into()),
            age: Some(34.0),
            height_cm: Some(180.0),
            weight_kg: Some(82.0),
            ..Default::default()
        }
    }

    #[test]
    fn applies_defaults() {
        let intake = normalize_intake(&minimal()).unwrap();
        assert_eq!(intake.goal_type, GoalType::Maintain);
        assert_eq!(intake.meals_per_day, 3);
        assert_eq!(intake.snacks_per_day, 1);
        assert_eq!(intake.plan_duration_days, 7);
        assert_eq!(intake.macro_style, MacroStyle::Balanced);
        assert!(intake.training_days.is_empty());
    }

    #[test]
    fn converts_imperial_units() {
        let form = RawIntakeForm {
            height_cm: None,
            weight_kg: None,
            height_feet: Some(5.0),
            height_inches: Some(10.0),
            weight_lbs: Some(180.0),
            ..minimal()
        };
        let intake = normalize_intake(&form).unwrap();
        assert!((intake.height_cm - 177.8).abs() < 1e-9);
        assert!((intake.weight_kg - 81.646_626_6).abs() < 1e-6);
    }

    #[test]
    fn keto_diet_defaults_to_keto_macros() {
        let form = RawIntakeForm {
            dietary_style: Some("Keto".into()),
            ..minimal()
        };
        assert_eq!(normalize_intake(&form).unwrap().macro_style, MacroStyle::Keto);
    }

    #[test]
    fn cleans_term_lists() {
        let form = RawIntakeForm {
            allergies: vec![" Peanuts".into(), "peanuts".into(), "".into(), "Shellfish".into()],
            training_days: vec!["mon".into(), "Monday".into(), "fri".into()],
            ..minimal()
        };
        let intake = normalize_intake(&form).unwrap();
        assert_eq!(intake.allergies, vec!["peanuts", "shellfish"]);
        assert_eq!(intake.training_days.len(), 2);
    }

    #[test]
    fn rejects_missing_and_out_of_range_fields() {
        let missing_age = RawIntakeForm {
            age: None,
            ..minimal()
        };
        let err = normalize_intake(&missing_age).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidIntake(_)));
        assert!(err.to_string().contains("age is required"));

        let too_many_meals = RawIntakeForm {
            meals_per_day: Some(9),
            ..minimal()
        };
        assert!(normalize_intake(&too_many_meals).is_err());

        let bad_goal = RawIntakeForm {
            goal_type: Some("teleport".into()),
            ..minimal()
        };
        let err = normalize_intake(&bad_goal).unwrap_err();
        assert!(err.to_string().contains("teleport"));
    }

    #[test]
    fn rejects_unknown_weekday() {
        let form = RawIntakeForm {
            training_days: vec!["funday".into()],
            ..minimal()
        };
        assert!(normalize_intake(&form).is_err());
    }
}

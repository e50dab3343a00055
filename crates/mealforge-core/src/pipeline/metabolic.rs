//! Stage 2: energy and macro targets (Mifflin-St Jeor).

use crate::error::PipelineError;
use crate::model::{
    ActivityLevel, ClientIntake, GoalRate, GoalType, MacroStyle, MacroTargets, MetabolicProfile,
    Sex,
};

const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_CARB: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;

const KETO_CARBS_G: f64 = 25.0;
/// Protein never takes more than this share of daily energy.
const MAX_PROTEIN_SHARE: f64 = 0.40;

fn bmr(intake: &ClientIntake) -> f64 {
    let base = 10.0 * intake.weight_kg + 6.25 * intake.height_cm - 5.0 * f64::from(intake.age);
    match intake.sex {
        Sex::Male => base + 5.0,
        Sex::Female => base - 161.0,
    }
}

fn goal_adjustment(goal: GoalType, rate: GoalRate) -> f64 {
    match (goal, rate) {
        (GoalType::Maintain, _) => 0.0,
        (GoalType::Cut, GoalRate::Conservative) => -250.0,
        (GoalType::Cut, GoalRate::Moderate) => -500.0,
        (GoalType::Cut, GoalRate::Aggressive) => -750.0,
        (GoalType::Bulk, GoalRate::Conservative) => 250.0,
        (GoalType::Bulk, GoalRate::Moderate) => 350.0,
        (GoalType::Bulk, GoalRate::Aggressive) => 500.0,
    }
}

fn calorie_floor(sex: Sex) -> f64 {
    match sex {
        Sex::Male => 1500.0,
        Sex::Female => 1200.0,
    }
}

fn protein_per_kg(style: MacroStyle) -> f64 {
    match style {
        MacroStyle::Balanced => 1.8,
        MacroStyle::HighProtein => 2.2,
        MacroStyle::LowCarb => 2.0,
        MacroStyle::Keto => 1.6,
    }
}

fn fat_share(style: MacroStyle) -> f64 {
    match style {
        MacroStyle::Balanced => 0.30,
        MacroStyle::HighProtein => 0.25,
        MacroStyle::LowCarb => 0.40,
        MacroStyle::Keto => 0.70,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Split `kcal` into macros for the given style and body weight.
fn split_macros(kcal: f64, weight_kg: f64, style: MacroStyle) -> MacroTargets {
    let protein_g = (protein_per_kg(style) * weight_kg)
        .min(kcal * MAX_PROTEIN_SHARE / KCAL_PER_G_PROTEIN);
    let protein_kcal = protein_g * KCAL_PER_G_PROTEIN;

    let (carbs_g, fat_g) = if style == MacroStyle::Keto {
        let fat = (kcal - protein_kcal - KETO_CARBS_G * KCAL_PER_G_CARB) / KCAL_PER_G_FAT;
        (KETO_CARBS_G, fat.max(0.0))
    } else {
        let fat = kcal * fat_share(style) / KCAL_PER_G_FAT;
        let carbs = (kcal - protein_kcal - fat * KCAL_PER_G_FAT) / KCAL_PER_G_CARB;
        (carbs.max(0.0), fat)
    };

    MacroTargets {
        kcal,
        protein_g: round1(protein_g),
        carbs_g: round1(carbs_g),
        fat_g: round1(fat_g),
    }
}

/// Derive BMR, TDEE, goal calories and macro targets from an intake.
///
/// Training days get a calorie bonus (200 kcal, 300 for very and extremely
/// active clients). The bonus is added to carbohydrate, or to fat on keto.
/// Clients without training days get no bonus and no training-day split.
pub fn calculate_metabolic_profile(
    intake: &ClientIntake,
) -> Result<MetabolicProfile, PipelineError> {
    let bmr = bmr(intake);
    let tdee = bmr * intake.activity_level.multiplier();
    let goal_kcal = (tdee + goal_adjustment(intake.goal_type, intake.goal_rate))
        .max(calorie_floor(intake.sex))
        .round();

    if !goal_kcal.is_finite() || goal_kcal <= 0.0 {
        return Err(PipelineError::Metabolic(format!(
            "goal calories out of range: {goal_kcal}"
        )));
    }

    let base = split_macros(goal_kcal, intake.weight_kg, intake.macro_style);

    let (training_bonus_kcal, training_day) = if intake.training_days.is_empty() {
        (0.0, None)
    } else {
        let bonus = match intake.activity_level {
            ActivityLevel::VeryActive | ActivityLevel::ExtremelyActive => 300.0,
            _ => 200.0,
        };
        let mut day = base;
        day.kcal = base.kcal + bonus;
        if intake.macro_style == MacroStyle::Keto {
            day.fat_g = round1(base.fat_g + bonus / KCAL_PER_G_FAT);
        } else {
            day.carbs_g = round1(base.carbs_g + bonus / KCAL_PER_G_CARB);
        }
        (bonus, Some(day))
    };

    Ok(MetabolicProfile {
        bmr: round1(bmr),
        tdee: round1(tdee),
        goal_kcal,
        base,
        training_bonus_kcal,
        training_day,
    })
}

//! Intake types: the loosely typed form a client submits and the validated
//! profile the rest of the pipeline works from.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Normalize a free-form choice for matching: lowercase, `-`/space to `_`.
fn choice_key(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .replace(['-', ' '], "_")
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    /// Plans start on Monday; day `i` of a plan falls on `from_index(i)`.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 7]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }

    /// Accepts full names and three-letter abbreviations, any case.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = choice_key(raw);
        Self::ALL
            .into_iter()
            .find(|day| day.as_str() == key || (key.len() == 3 && day.as_str().starts_with(&key)))
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn parse(raw: &str) -> Option<Self> {
        match choice_key(raw).as_str() {
            "male" | "m" => Some(Self::Male),
            "female" | "f" => Some(Self::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    Cut,
    Maintain,
    Bulk,
}

impl GoalType {
    pub fn parse(raw: &str) -> Option<Self> {
        match choice_key(raw).as_str() {
            "cut" | "lose" | "fat_loss" | "lose_weight" => Some(Self::Cut),
            "maintain" | "maintenance" | "recomp" => Some(Self::Maintain),
            "bulk" | "gain" | "muscle_gain" | "gain_weight" => Some(Self::Bulk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalRate {
    Conservative,
    Moderate,
    Aggressive,
}

impl GoalRate {
    pub fn parse(raw: &str) -> Option<Self> {
        match choice_key(raw).as_str() {
            "conservative" | "slow" => Some(Self::Conservative),
            "moderate" | "medium" => Some(Self::Moderate),
            "aggressive" | "fast" => Some(Self::Aggressive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    ModeratelyActive,
    VeryActive,
    ExtremelyActive,
}

impl ActivityLevel {
    /// TDEE multiplier applied to BMR.
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::LightlyActive => 1.375,
            Self::ModeratelyActive => 1.55,
            Self::VeryActive => 1.725,
            Self::ExtremelyActive => 1.9,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match choice_key(raw).as_str() {
            "sedentary" => Some(Self::Sedentary),
            "lightly_active" | "light" => Some(Self::LightlyActive),
            "moderately_active" | "moderate" => Some(Self::ModeratelyActive),
            "very_active" | "active" => Some(Self::VeryActive),
            "extremely_active" | "extra_active" | "athlete" => Some(Self::ExtremelyActive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DietaryStyle {
    Omnivore,
    Vegetarian,
    Vegan,
    Pescatarian,
    Keto,
    Paleo,
}

impl DietaryStyle {
    pub fn parse(raw: &str) -> Option<Self> {
        match choice_key(raw).as_str() {
            "omnivore" | "none" | "standard" => Some(Self::Omnivore),
            "vegetarian" => Some(Self::Vegetarian),
            "vegan" | "plant_based" => Some(Self::Vegan),
            "pescatarian" => Some(Self::Pescatarian),
            "keto" | "ketogenic" => Some(Self::Keto),
            "paleo" => Some(Self::Paleo),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Omnivore => "omnivore",
            Self::Vegetarian => "vegetarian",
            Self::Vegan => "vegan",
            Self::Pescatarian => "pescatarian",
            Self::Keto => "keto",
            Self::Paleo => "paleo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroStyle {
    Balanced,
    HighProtein,
    LowCarb,
    Keto,
}

impl MacroStyle {
    pub fn parse(raw: &str) -> Option<Self> {
        match choice_key(raw).as_str() {
            "balanced" => Some(Self::Balanced),
            "high_protein" => Some(Self::HighProtein),
            "low_carb" => Some(Self::LowCarb),
            "keto" | "ketogenic" => Some(Self::Keto),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw form
// ---------------------------------------------------------------------------

/// The intake form exactly as a client submitted it.
///
/// Everything is optional and loosely typed; [`crate::pipeline::intake`]
/// decides what is required and what defaults apply. Height and weight come
/// either metric (`heightCm`, `weightKg`) or imperial (`heightFeet` +
/// `heightInches`, `weightLbs`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawIntakeForm {
    pub sex: Option<String>,
    pub age: Option<f64>,
    pub height_cm: Option<f64>,
    pub height_feet: Option<f64>,
    pub height_inches: Option<f64>,
    pub weight_kg: Option<f64>,
    pub weight_lbs: Option<f64>,
    pub goal_type: Option<String>,
    pub goal_rate: Option<String>,
    pub activity_level: Option<String>,
    pub training_days: Vec<String>,
    pub dietary_style: Option<String>,
    pub allergies: Vec<String>,
    pub exclusions: Vec<String>,
    pub cuisine_preferences: Vec<String>,
    pub meals_per_day: Option<u32>,
    pub snacks_per_day: Option<u32>,
    pub cooking_skill: Option<u32>,
    pub prep_time_max: Option<u32>,
    pub macro_style: Option<String>,
    pub plan_duration_days: Option<u32>,
}

/// The payload of a generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    pub intake_data: RawIntakeForm,
    pub job_id: Uuid,
}

// ---------------------------------------------------------------------------
// Normalized intake
// ---------------------------------------------------------------------------

/// Validated client profile produced by stage 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIntake {
    pub sex: Sex,
    pub age: u32,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub goal_type: GoalType,
    pub goal_rate: GoalRate,
    pub activity_level: ActivityLevel,
    pub training_days: BTreeSet<Weekday>,
    pub dietary_style: DietaryStyle,
    /// Lowercased, trimmed, deduplicated.
    pub allergies: Vec<String>,
    pub exclusions: Vec<String>,
    pub cuisine_preferences: Vec<String>,
    pub meals_per_day: u32,
    pub snacks_per_day: u32,
    pub cooking_skill: u32,
    /// Prep-time ceiling in minutes.
    pub prep_time_max: u32,
    pub macro_style: MacroStyle,
    pub plan_duration_days: u32,
}

impl ClientIntake {
    pub fn is_training_day(&self, day: Weekday) -> bool {
        self.training_days.contains(&day)
    }
}

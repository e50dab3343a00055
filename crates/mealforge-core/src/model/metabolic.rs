use serde::{Deserialize, Serialize};

/// Daily calorie and macro targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroTargets {
    pub kcal: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

/// Energy needs derived once from the intake by stage 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetabolicProfile {
    pub bmr: f64,
    pub tdee: f64,
    /// TDEE adjusted for the goal; equals `base.kcal`.
    pub goal_kcal: f64,
    /// Rest-day targets.
    pub base: MacroTargets,
    pub training_bonus_kcal: f64,
    /// Macro split for training days, when it differs from `base`.
    pub training_day: Option<MacroTargets>,
}

impl MetabolicProfile {
    /// Targets for one plan day.
    ///
    /// Training days get `base.kcal + training_bonus_kcal`; their macros
    /// come from `training_day` when present and from `base` otherwise.
    pub fn target_for(&self, is_training_day: bool) -> MacroTargets {
        if !is_training_day {
            return self.base;
        }
        let macros = self.training_day.unwrap_or(self.base);
        MacroTargets {
            kcal: self.base.kcal + self.training_bonus_kcal,
            ..macros
        }
    }
}

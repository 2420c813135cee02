//! Pure calculations shared by the food log and profile sync.

use crate::models::{DailyTotals, FitnessGoal, FoodEntry};

const MIN_DAILY_PROTEIN_G: f64 = 50.0;
const MAX_DAILY_PROTEIN_G: f64 = 300.0;
const LOWER_BOUND_PER_KG: f64 = 0.8;
const UPPER_BOUND_PER_KG: f64 = 2.5;

#[must_use]
pub fn protein_per_kg_for_goal(goal: FitnessGoal) -> f64 {
    match goal {
        FitnessGoal::WeightLoss => 1.6,
        FitnessGoal::Maintenance => 1.2,
        FitnessGoal::MuscleGain => 1.8,
    }
}

/// Daily protein target: `weight * per_kg`, clamped to the bounds and then
/// rounded to whole grams (72 kg on muscle gain gives 130, not 129.6).
///
/// The raw target is raised to the lower bound first and then capped by the
/// upper bound, so very light bodyweights (where the bounds cross) resolve to
/// the upper bound instead of panicking in `f64::clamp`.
#[must_use]
pub fn recommended_protein(weight_kg: f64, goal: FitnessGoal) -> f64 {
    let raw = weight_kg * protein_per_kg_for_goal(goal);
    let lower = MIN_DAILY_PROTEIN_G.max(weight_kg * LOWER_BOUND_PER_KG);
    let upper = MAX_DAILY_PROTEIN_G.min(weight_kg * UPPER_BOUND_PER_KG);
    raw.max(lower).min(upper).round()
}

#[must_use]
pub fn sum_totals(entries: &[FoodEntry]) -> DailyTotals {
    entries.iter().fold(DailyTotals::default(), |acc, e| DailyTotals {
        protein: acc.protein + e.protein,
        calories: acc.calories + e.calories,
        carbs: acc.carbs + e.carbs,
        fat: acc.fat + e.fat,
        entry_count: acc.entry_count + 1,
    })
}

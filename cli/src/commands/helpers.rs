use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use proteus_core::models::{DATE_FORMAT, FoodEntry};

/// Resolve a date argument relative to `today`. Accepts YYYY-MM-DD or
/// today/yesterday/tomorrow; no argument means today.
pub(crate) fn parse_date(date_str: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
    match date_str {
        None | Some("today") => Ok(today),
        Some("yesterday") => Ok(today - chrono::Duration::days(1)),
        Some("tomorrow") => Ok(today + chrono::Duration::days(1)),
        Some(s) => NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| {
            format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
        }),
    }
}

pub(crate) fn parse_serving(s: &str) -> Result<f64> {
    let trimmed = s.trim().trim_end_matches('g').trim();
    let value: f64 = trimmed.parse().with_context(|| {
        format!("Invalid serving size: '{s}'. Use a number like '200' or '200g'")
    })?;
    Ok(value)
}

pub(crate) fn print_entries_table(entries: &[FoodEntry]) {
    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Serving")]
        serving: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Kcal")]
        calories: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            id: short_id(&e.id).to_string(),
            meal: e.meal_type.clone(),
            name: truncate(&e.name, 30),
            serving: format!("{:.0}g", e.serving_size),
            protein: format!("{:.1}g", no_neg_zero(e.protein)),
            calories: format!("{:.0}", no_neg_zero(e.calories)),
            carbs: format!("{:.1}g", no_neg_zero(e.carbs)),
            fat: format!("{:.1}g", no_neg_zero(e.fat)),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// Leading segment of a UUID, enough to tell a day's entries apart.
pub(crate) fn short_id(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}

/// Match a full entry id or a unique prefix of one.
pub(crate) fn resolve_entry_id<'a>(entries: &'a [FoodEntry], id: &str) -> Option<&'a str> {
    if let Some(exact) = entries.iter().find(|e| e.id == id) {
        return Some(&exact.id);
    }
    let mut matches = entries.iter().filter(|e| e.id.starts_with(id));
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(&only.id),
        _ => None,
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn entry(id: &str) -> FoodEntry {
        FoodEntry {
            id: id.to_string(),
            name: "Eggs".to_string(),
            protein: 12.0,
            calories: 140.0,
            carbs: 1.0,
            fat: 10.0,
            serving_size: 100.0,
            meal_type: "breakfast".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_parse_date_none() {
        assert_eq!(parse_date(None, today()).unwrap(), today());
    }

    #[test]
    fn test_parse_date_keywords() {
        assert_eq!(parse_date(Some("today"), today()).unwrap(), today());
        assert_eq!(
            parse_date(Some("yesterday"), today()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            parse_date(Some("tomorrow"), today()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15"), today()).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope"), today()).is_err());
    }

    #[test]
    fn test_parse_serving() {
        assert!((parse_serving("200").unwrap() - 200.0).abs() < f64::EPSILON);
        assert!((parse_serving("200g").unwrap() - 200.0).abs() < f64::EPSILON);
        assert!((parse_serving(" 87.5 g").unwrap() - 87.5).abs() < f64::EPSILON);
        assert!(parse_serving("lots").is_err());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("3f2a9c1e-1111-2222-3333-444455556666"), "3f2a9c1e");
        assert_eq!(short_id("plain"), "plain");
    }

    #[test]
    fn test_resolve_entry_id_prefix() {
        let entries = vec![entry("abc-1"), entry("abd-2")];
        assert_eq!(resolve_entry_id(&entries, "abc-1"), Some("abc-1"));
        assert_eq!(resolve_entry_id(&entries, "abd"), Some("abd-2"));
        // Ambiguous prefix
        assert_eq!(resolve_entry_id(&entries, "ab"), None);
        assert_eq!(resolve_entry_id(&entries, "zzz"), None);
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("boom"), r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("日清カップヌードル", 8), "日清カップ...");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(5.0), 5.0);
    }
}

use anyhow::Result;
use std::process;

use proteus_core::models::{NewFoodEntry, day_key};
use proteus_core::service::ProteusService;

use super::helpers::{json_error, parse_date, parse_serving, resolve_entry_id, short_id};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_add(
    svc: &ProteusService,
    name: &str,
    protein: f64,
    calories: f64,
    carbs: f64,
    fat: f64,
    serving: &str,
    meal: &str,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let date = day_key(parse_date(date, svc.today())?);
    let item = NewFoodEntry {
        name: name.to_string(),
        protein,
        calories,
        carbs,
        fat,
        serving_size: parse_serving(serving)?,
        meal_type: meal.to_string(),
    };

    let entry = svc.add_food(&date, &item)?;
    let totals = svc.totals(&date)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "entry": entry, "date": date, "totals": totals })
        );
    } else {
        let id = short_id(&entry.id);
        let entry_name = &entry.name;
        let meal_type = &entry.meal_type;
        let p = entry.protein;
        let day_p = totals.protein;
        println!("Logged [{id}] {entry_name} ({meal_type}, {p:.1}g protein) on {date}");
        println!("  {date} total: {day_p:.1}g protein");
    }
    Ok(())
}

pub(crate) fn cmd_remove(
    svc: &ProteusService,
    entry_id: &str,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let date = day_key(parse_date(date, svc.today())?);
    let entries = svc.entries(&date)?;
    let removed = match resolve_entry_id(&entries, entry_id) {
        Some(id) => svc.remove_food(&date, id)?,
        None => false,
    };

    if !removed {
        if json {
            println!(
                "{}",
                json_error(&format!("Entry {entry_id} not found on {date}"))
            );
        } else {
            eprintln!("Entry {entry_id} not found on {date}");
        }
        process::exit(2);
    }

    let totals = svc.totals(&date)?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "deleted": entry_id, "date": date, "totals": totals })
        );
    } else {
        let day_p = totals.protein;
        println!("Deleted entry {entry_id}");
        println!("  {date} total: {day_p:.1}g protein");
    }
    Ok(())
}

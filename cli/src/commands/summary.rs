use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use proteus_core::models::day_key;
use proteus_core::service::ProteusService;

use super::helpers::{no_neg_zero, parse_date, print_entries_table};

pub(crate) fn cmd_show(svc: &ProteusService, date: Option<&str>, json: bool) -> Result<()> {
    let date = day_key(parse_date(date, svc.today())?);
    let summary = svc.day_summary(&date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.entries.is_empty() {
        eprintln!("No entries for {date}");
        process::exit(2);
    }

    println!("=== {date} ===\n");
    print_entries_table(&summary.entries);

    let t = &summary.totals;
    let (p, cal, c, f) = (
        no_neg_zero(t.protein),
        no_neg_zero(t.calories),
        no_neg_zero(t.carbs),
        no_neg_zero(t.fat),
    );
    println!("\n  TOTAL: {cal:.0} kcal | P:{p:.1}g C:{c:.1}g F:{f:.1}g");
    Ok(())
}

/// Today's intake against the protein target.
pub(crate) fn cmd_intake(svc: &ProteusService, json: bool) -> Result<()> {
    let current = svc.current_protein_intake();
    let rec = svc.recommendation();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "date": day_key(svc.today()),
                "current": current,
                "recommended": rec.recommended,
                "remaining": rec.remaining(),
            })
        );
        return Ok(());
    }

    let today = day_key(svc.today());
    println!("=== {today} ===\n");
    println!("  PROTEIN: {current:.1}g");
    if rec.profile.is_some() {
        let target = rec.recommended;
        let remaining = rec.remaining();
        println!("  TARGET: {target:.0}g");
        println!("  REMAINING: {remaining:.1}g");
    } else {
        println!("  No profile set. Run `proteus profile set` to get a protein target.");
    }
    Ok(())
}

pub(crate) fn cmd_history(svc: &ProteusService, days: u32, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Entries")]
        entries: usize,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    // Newest first for display
    let mut history = svc.history(days);
    history.reverse();

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.iter().all(|h| h.totals.entry_count == 0) {
        eprintln!("No entries in the last {days} days");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = history
        .iter()
        .map(|h| {
            let t = &h.totals;
            HistoryRow {
                date: day_key(h.date),
                entries: t.entry_count,
                protein: format!("{:.1}g", no_neg_zero(t.protein)),
                calories: format!("{:.0}", no_neg_zero(t.calories)),
                carbs: format!("{:.0}g", no_neg_zero(t.carbs)),
                fat: format!("{:.0}g", no_neg_zero(t.fat)),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

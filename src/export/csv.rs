use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::error::ExportError;
use crate::models::WeighIn;

/// One CSV row of the weigh-in history
#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Phase")]
    phase: u8,
    #[serde(rename = "Weight_KG")]
    weight_kg: Decimal,
    #[serde(rename = "Weekly_Delta_KG")]
    weekly_delta_kg: Decimal,
    #[serde(rename = "Four_Week_Avg_KG")]
    four_week_avg_kg: Decimal,
    #[serde(rename = "Estimated_BF_Pct")]
    estimated_bf_pct: Decimal,
    #[serde(rename = "Estimated_Fat_Mass_KG")]
    estimated_fat_mass_kg: Decimal,
    #[serde(rename = "Edited")]
    edited: bool,
    #[serde(rename = "Notes")]
    notes: &'a str,
    #[serde(rename = "Insight")]
    insight: &'a str,
    #[serde(rename = "ID")]
    id: &'a str,
}

impl<'a> From<&'a WeighIn> for HistoryRow<'a> {
    fn from(entry: &'a WeighIn) -> Self {
        HistoryRow {
            date: entry.date.format("%Y-%m-%d").to_string(),
            phase: entry.phase_id.number(),
            weight_kg: entry.weight_kg,
            weekly_delta_kg: entry.weekly_delta_kg.round_dp(2),
            four_week_avg_kg: entry.four_week_avg_kg.round_dp(2),
            estimated_bf_pct: entry.estimated_bf_pct.round_dp(1),
            estimated_fat_mass_kg: entry.estimated_fat_mass_kg.round_dp(1),
            edited: entry.is_edited,
            notes: &entry.notes,
            insight: &entry.insight,
            id: &entry.id,
        }
    }
}

/// Write the weigh-in history as CSV (suitable for spreadsheet plotting)
pub fn write_history<W: Write>(history: &[WeighIn], writer: W) -> Result<(), ExportError> {
    let mut csv_writer = ::csv::Writer::from_writer(writer);

    for entry in history {
        csv_writer.serialize(HistoryRow::from(entry))?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Export the weigh-in history to a CSV file
pub fn export_history<P: AsRef<Path>>(history: &[WeighIn], output_path: P) -> Result<(), ExportError> {
    let file = std::fs::File::create(output_path)?;
    write_history(history, file)
}

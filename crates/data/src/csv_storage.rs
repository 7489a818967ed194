use crate::models::TradeRecord;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Writer};
use std::fs::File;
use std::path::Path;

/// Column read by [`CsvStorage::read_returns`] when a header row is present.
pub const RETURNS_COLUMN: &str = "return";

pub struct CsvStorage;

impl CsvStorage {
    /// Reads a series of periodic returns.
    ///
    /// Uses the `return` column when the header has one, otherwise the first
    /// column. Blank and non-numeric cells are skipped.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or is not valid CSV
    pub fn read_returns(path: &Path) -> Result<Vec<f64>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open returns file: {}", path.display()))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let column = reader
            .headers()?
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(RETURNS_COLUMN))
            .unwrap_or(0);

        let mut returns = Vec::new();
        for row in reader.records() {
            let row = row?;
            if let Some(value) = row.get(column).and_then(|cell| cell.trim().parse::<f64>().ok()) {
                returns.push(value);
            }
        }
        Ok(returns)
    }

    /// Writes trade records sorted by execution time.
    ///
    /// Format: id,execution_time,symbol,trade_type,executed_price,quantity,limit_price,status,execution_id,note
    ///
    /// # Errors
    /// Returns error if file cannot be created or writing fails
    pub fn write_trades(path: &Path, records: &[TradeRecord]) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        let mut writer = Writer::from_writer(file);

        writer.write_record([
            "id",
            "execution_time",
            "symbol",
            "trade_type",
            "executed_price",
            "quantity",
            "limit_price",
            "status",
            "execution_id",
            "note",
        ])?;

        let mut sorted = records.to_vec();
        sorted.sort_by_key(|r| r.execution_time);

        for record in sorted {
            writer.write_record(&[
                record.id.to_string(),
                record.execution_time.to_rfc3339(),
                record.symbol,
                record.trade_type,
                record.executed_price.to_string(),
                record.quantity.to_string(),
                record.limit_price.map(|p| p.to_string()).unwrap_or_default(),
                record.status,
                record.execution_id.unwrap_or_default(),
                record.note.unwrap_or_default(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }
}

use csv::StringRecord;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use super::csv_io::{parse_date, parse_decimal};
use crate::error::AttributionError;
use crate::types::{CommodityPrice, CompanyRecord, IndexLevel, MarketData, Sector};
use crate::AttributionResult;

pub const COMPANY_HEADER: [&str; 5] = ["date", "sector", "company", "monthly_return", "asset_value"];
pub const INDEX_HEADER: [&str; 3] = ["date", "level", "monthly_return"];
pub const COMMODITY_HEADER: [&str; 4] = ["date", "commodity", "price", "unit"];

/// Positions of `names` in the header row, matched case-insensitively.
fn column_positions<const N: usize>(headers: &StringRecord, names: [&str; N]) -> AttributionResult<[usize; N]> {
    let mut positions = [0usize; N];
    for (slot, name) in positions.iter_mut().zip(names) {
        *slot = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| AttributionError::MissingColumn {
                column: name.to_string(),
            })?;
    }
    Ok(positions)
}

/// Non-blank data rows with their 1-based row numbers, plus the header positions.
fn read_rows<R: Read, const N: usize>(
    reader: R,
    names: [&str; N],
) -> AttributionResult<(Vec<(usize, StringRecord)>, [usize; N])> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let positions = column_positions(rdr.headers()?, names)?;
    let mut rows = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        let row = row?;
        if !row.iter().all(|f| f.trim().is_empty()) {
            rows.push((i + 1, row));
        }
    }
    Ok((rows, positions))
}

fn cell(row: &StringRecord, idx: usize) -> &str {
    row.get(idx).unwrap_or("").trim()
}

fn text(row: &StringRecord, idx: usize, row_no: usize, column: &str) -> AttributionResult<String> {
    let value = cell(row, idx);
    if value.is_empty() {
        return Err(AttributionError::InvalidInput {
            field: column.into(),
            reason: format!("row {row_no}: value is empty"),
        });
    }
    Ok(value.to_string())
}

pub fn read_companies<R: Read>(reader: R) -> AttributionResult<Vec<CompanyRecord>> {
    let (rows, [date, sector, company, monthly_return, asset_value]) = read_rows(reader, COMPANY_HEADER)?;
    rows.iter()
        .map(|(n, row)| {
            Ok(CompanyRecord {
                date: parse_date(cell(row, date), *n)?,
                sector: cell(row, sector).parse::<Sector>()?,
                company: text(row, company, *n, "company")?,
                monthly_return: parse_decimal(cell(row, monthly_return), *n, "monthly_return")?,
                asset_value: parse_decimal(cell(row, asset_value), *n, "asset_value")?,
            })
        })
        .collect()
}

pub fn read_market_index<R: Read>(reader: R) -> AttributionResult<Vec<IndexLevel>> {
    let (rows, [date, level, monthly_return]) = read_rows(reader, INDEX_HEADER)?;
    rows.iter()
        .map(|(n, row)| {
            Ok(IndexLevel {
                date: parse_date(cell(row, date), *n)?,
                level: parse_decimal(cell(row, level), *n, "level")?,
                monthly_return: parse_decimal(cell(row, monthly_return), *n, "monthly_return")?,
            })
        })
        .collect()
}

pub fn read_commodities<R: Read>(reader: R) -> AttributionResult<Vec<CommodityPrice>> {
    let (rows, [date, commodity, price, unit]) = read_rows(reader, COMMODITY_HEADER)?;
    rows.iter()
        .map(|(n, row)| {
            Ok(CommodityPrice {
                date: parse_date(cell(row, date), *n)?,
                commodity: text(row, commodity, *n, "commodity")?,
                price: parse_decimal(cell(row, price), *n, "price")?,
                unit: cell(row, unit).to_string(),
            })
        })
        .collect()
}

/// Write serialisable rows as CSV, header taken from the field names.
pub fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> AttributionResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_rows_path<T: Serialize>(path: &Path, rows: &[T]) -> AttributionResult<()> {
    write_rows(File::create(path)?, rows)?;
    tracing::info!(path = %path.display(), rows = rows.len(), "wrote table");
    Ok(())
}

fn open(path: &Path) -> AttributionResult<File> {
    File::open(path).map_err(|e| {
        AttributionError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open '{}': {}", path.display(), e),
        ))
    })
}

/// Paths of the companion tables; `None` leaves that series empty.
#[derive(Debug, Clone, Default)]
pub struct MarketDataPaths<'a> {
    pub companies: Option<&'a Path>,
    pub market_index: Option<&'a Path>,
    pub commodities: Option<&'a Path>,
}

pub fn read_market_data(paths: &MarketDataPaths<'_>) -> AttributionResult<MarketData> {
    let mut data = MarketData::default();
    if let Some(p) = paths.companies {
        data.companies = read_companies(open(p)?)?;
    }
    if let Some(p) = paths.market_index {
        data.market_index = read_market_index(open(p)?)?;
    }
    if let Some(p) = paths.commodities {
        data.commodities = read_commodities(open(p)?)?;
    }
    tracing::debug!(
        companies = data.companies.len(),
        index_levels = data.market_index.len(),
        commodity_prices = data.commodities.len(),
        "loaded market data"
    );
    Ok(data)
}

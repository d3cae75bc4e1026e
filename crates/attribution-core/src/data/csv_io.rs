use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::AttributionError;
use crate::types::{Sector, SectorRecord};
use crate::AttributionResult;

pub const COL_SECTOR: &str = "sector";
pub const COL_DATE: &str = "date";
pub const COL_PORTFOLIO_WEIGHT: &str = "portfolio_weight";
pub const COL_PORTFOLIO_RETURN: &str = "portfolio_return";
pub const COL_BENCHMARK_WEIGHT: &str = "benchmark_weight";
pub const COL_BENCHMARK_RETURN: &str = "benchmark_return";

pub const HEADER: [&str; 6] = [
    COL_SECTOR,
    COL_DATE,
    COL_PORTFOLIO_WEIGHT,
    COL_PORTFOLIO_RETURN,
    COL_BENCHMARK_WEIGHT,
    COL_BENCHMARK_RETURN,
];

/// Column positions resolved from the header row.
struct ColumnIndex {
    sector: usize,
    date: usize,
    portfolio_weight: usize,
    portfolio_return: usize,
    benchmark_weight: usize,
    benchmark_return: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord) -> AttributionResult<Self> {
        let find = |name: &str| -> AttributionResult<usize> {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| AttributionError::MissingColumn {
                    column: name.to_string(),
                })
        };
        Ok(Self {
            sector: find(COL_SECTOR)?,
            date: find(COL_DATE)?,
            portfolio_weight: find(COL_PORTFOLIO_WEIGHT)?,
            portfolio_return: find(COL_PORTFOLIO_RETURN)?,
            benchmark_weight: find(COL_BENCHMARK_WEIGHT)?,
            benchmark_return: find(COL_BENCHMARK_RETURN)?,
        })
    }
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize) -> &'r str {
    record.get(idx).unwrap_or("").trim()
}

/// Parse a numeric cell, accepting plain and scientific notation.
pub fn parse_decimal(raw: &str, row: usize, column: &str) -> AttributionResult<Decimal> {
    let trimmed = raw.trim();
    let non_numeric = || AttributionError::NonNumeric {
        row,
        column: column.to_string(),
        value: trimmed.to_string(),
    };
    if trimmed.is_empty() {
        return Err(non_numeric());
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| non_numeric())
}

pub fn parse_date(raw: &str, row: usize) -> AttributionResult<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .map_err(|_| AttributionError::DateError(format!("row {row}: cannot parse '{trimmed}' as YYYY-MM-DD")))
}

/// Read sector records from any CSV source.
pub fn read_records<R: Read>(reader: R) -> AttributionResult<Vec<SectorRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let columns = ColumnIndex::from_headers(rdr.headers()?)?;

    let mut records = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        let row_no = i + 1;
        let row = row?;
        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let sector: Sector = field(&row, columns.sector).parse().map_err(|e| match e {
            AttributionError::InvalidInput { field, reason } => AttributionError::InvalidInput {
                field,
                reason: format!("row {row_no}: {reason}"),
            },
            other => other,
        })?;
        records.push(SectorRecord {
            sector,
            date: parse_date(field(&row, columns.date), row_no)?,
            portfolio_weight: parse_decimal(
                field(&row, columns.portfolio_weight),
                row_no,
                COL_PORTFOLIO_WEIGHT,
            )?,
            portfolio_return: parse_decimal(
                field(&row, columns.portfolio_return),
                row_no,
                COL_PORTFOLIO_RETURN,
            )?,
            benchmark_weight: parse_decimal(
                field(&row, columns.benchmark_weight),
                row_no,
                COL_BENCHMARK_WEIGHT,
            )?,
            benchmark_return: parse_decimal(
                field(&row, columns.benchmark_return),
                row_no,
                COL_BENCHMARK_RETURN,
            )?,
        });
    }
    tracing::debug!(records = records.len(), "parsed sector records");
    Ok(records)
}

pub fn read_records_path(path: &Path) -> AttributionResult<Vec<SectorRecord>> {
    let file = File::open(path).map_err(|e| {
        AttributionError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open '{}': {}", path.display(), e),
        ))
    })?;
    let records = read_records(file)?;
    tracing::info!(path = %path.display(), records = records.len(), "loaded sector records");
    Ok(records)
}

pub fn write_records<W: Write>(writer: W, records: &[SectorRecord]) -> AttributionResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)?;
    for r in records {
        wtr.write_record([
            r.sector.name().to_string(),
            r.date.format("%Y-%m-%d").to_string(),
            r.portfolio_weight.to_string(),
            r.portfolio_return.to_string(),
            r.benchmark_weight.to_string(),
            r.benchmark_return.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_records_path(path: &Path, records: &[SectorRecord]) -> AttributionResult<()> {
    let file = File::create(path)?;
    write_records(file, records)?;
    tracing::info!(path = %path.display(), records = records.len(), "wrote sector records");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = "\
sector,date,portfolio_weight,portfolio_return,benchmark_weight,benchmark_return
Mining,2024-01-31,0.6,0.05,0.5,0.04
Real Estate,2024-01-31,0.4,0.02,0.5,0.03
";

    #[test]
    fn test_read_sample() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sector, Sector::Mining);
        assert_eq!(records[1].sector, Sector::RealEstate);
        assert_eq!(records[0].portfolio_weight, dec!(0.6));
        assert_eq!(records[1].benchmark_return, dec!(0.03));
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn test_column_order_and_case_free() {
        let csv = "\
Benchmark_Return,Sector,DATE,portfolio_return,benchmark_weight,portfolio_weight,extra
0.04,Energy,2024-02-29,0.05,1,1,ignored
";
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records[0].sector, Sector::Energy);
        assert_eq!(records[0].benchmark_return, dec!(0.04));
        assert_eq!(records[0].portfolio_weight, dec!(1));
    }

    #[test]
    fn test_missing_column() {
        let csv = "sector,date,portfolio_weight,portfolio_return,benchmark_weight\nMining,2024-01-31,1,0.1,1\n";
        match read_records(csv.as_bytes()) {
            Err(AttributionError::MissingColumn { column }) => {
                assert_eq!(column, COL_BENCHMARK_RETURN)
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_value() {
        let csv = "\
sector,date,portfolio_weight,portfolio_return,benchmark_weight,benchmark_return
Mining,2024-01-31,1,0.1,1,0.05
Energy,2024-01-31,abc,0.1,1,0.05
";
        match read_records(csv.as_bytes()) {
            Err(AttributionError::NonNumeric { row, column, value }) => {
                assert_eq!(row, 2);
                assert_eq!(column, COL_PORTFOLIO_WEIGHT);
                assert_eq!(value, "abc");
            }
            other => panic!("expected NonNumeric, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_numeric_cell() {
        let csv = "\
sector,date,portfolio_weight,portfolio_return,benchmark_weight,benchmark_return
Mining,2024-01-31,1,,1,0.05
";
        assert!(matches!(
            read_records(csv.as_bytes()),
            Err(AttributionError::NonNumeric { .. })
        ));
    }

    #[test]
    fn test_scientific_notation() {
        assert_eq!(parse_decimal("1.5e-3", 1, "x").unwrap(), dec!(0.0015));
    }

    #[test]
    fn test_bad_date() {
        let csv = "\
sector,date,portfolio_weight,portfolio_return,benchmark_weight,benchmark_return
Mining,31/01/2024,1,0.1,1,0.05
";
        assert!(matches!(
            read_records(csv.as_bytes()),
            Err(AttributionError::DateError(_))
        ));
    }

    #[test]
    fn test_datetime_cell_accepted() {
        assert_eq!(
            parse_date("2024-03-31 00:00:00", 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
        );
    }

    #[test]
    fn test_unknown_sector_reports_row() {
        let csv = "\
sector,date,portfolio_weight,portfolio_return,benchmark_weight,benchmark_return
Crypto,2024-01-31,1,0.1,1,0.05
";
        let err = read_records(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_write_then_read() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        let mut buf = Vec::new();
        write_records(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("sector,date,portfolio_weight"));
        assert!(text.contains("Real Estate,2024-01-31"));
        assert_eq!(read_records(buf.as_slice()).unwrap(), records);
    }
}

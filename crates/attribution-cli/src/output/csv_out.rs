use serde_json::{Map, Value};
use std::io::{self, Write};

use super::{is_record_array, result_of, scalar_text};

/// Lists written as rows, in order of preference, when the result has one.
const PRIMARY_LISTS: [&str; 7] = [
    "sector_attribution",
    "points",
    "checks",
    "sector_impacts",
    "sectors",
    "files",
    "histogram",
];

/// Write output as CSV to stdout, reporting write failures on stderr.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    if let Err(e) = write_csv(stdout.lock(), result_of(value)) {
        eprintln!("{}", csv_error_message(&e));
    }
}

fn csv_error_message(err: &csv::Error) -> String {
    format!("CSV output error: {err}")
}

fn write_csv<W: Write>(out: W, result: &Value) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(out);
    match result {
        Value::Object(map) => match primary_list(map) {
            Some(rows) => write_records(&mut wtr, rows)?,
            None => {
                wtr.write_record(["field", "value"])?;
                for (key, val) in map {
                    wtr.write_record([key.as_str(), &scalar_text(val)])?;
                }
            }
        },
        Value::Array(arr) if is_record_array(result) => write_records(&mut wtr, arr)?,
        Value::Array(arr) => {
            for item in arr {
                wtr.write_record([scalar_text(item)])?;
            }
        }
        _ => wtr.write_record([scalar_text(result)])?,
    }
    wtr.flush()?;
    Ok(())
}

fn primary_list(map: &Map<String, Value>) -> Option<&[Value]> {
    PRIMARY_LISTS
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|v| is_record_array(v))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

fn write_records<W: Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) -> Result<(), csv::Error> {
    let Some(Value::Object(first)) = rows.first() else {
        return Ok(());
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    wtr.write_record(&headers)?;
    for item in rows.iter().filter_map(Value::as_object) {
        let row: Vec<String> = headers
            .iter()
            .map(|h| item.get(*h).map(scalar_text).unwrap_or_default())
            .collect();
        wtr.write_record(&row)?;
    }
    Ok(())
}

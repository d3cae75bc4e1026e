use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{is_record_array, scalar_text};

/// Scalar arrays longer than this are summarised instead of listed.
const MAX_INLINE_VALUES: usize = 12;

/// Format output as tables using the tabled crate: one field/value table
/// for the scalars, then one table per list of records (sectors, periods,
/// checks, histogram bins).
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => print_result(result, map),
            _ => print_object(map),
        },
        Value::Array(arr) => println!("{}", record_table(arr)),
        _ => println!("{}", value),
    }
}

fn print_result(result: &Map<String, Value>, envelope: &Map<String, Value>) {
    print_object(result);

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }
    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_object(map: &Map<String, Value>) {
    let (rows, lists) = split_fields(map);
    if !rows.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (field, text) in rows {
            builder.push_record([field, text]);
        }
        println!("{}", Table::from(builder));
    }
    for (name, arr) in lists {
        println!("\n{}:", name);
        println!("{}", record_table(arr));
    }
}

/// Field/value rows (nested objects flattened as `parent.child`) and the
/// record lists to print as their own tables.
fn split_fields(map: &Map<String, Value>) -> (Vec<(String, String)>, Vec<(&str, &[Value])>) {
    let mut rows = Vec::new();
    let mut lists = Vec::new();
    for (key, val) in map {
        match val {
            Value::Array(arr) if is_record_array(val) => lists.push((key.as_str(), arr.as_slice())),
            Value::Object(inner) => {
                for (child, v) in inner {
                    rows.push((format!("{key}.{child}"), cell_text(v)));
                }
            }
            _ => rows.push((key.clone(), cell_text(val))),
        }
    }
    (rows, lists)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Array(arr) if arr.len() > MAX_INLINE_VALUES => format!("[{} values]", arr.len()),
        Value::Array(arr) => arr.iter().map(scalar_text).collect::<Vec<_>>().join(", "),
        _ => scalar_text(value),
    }
}

fn record_table(arr: &[Value]) -> Table {
    let mut builder = Builder::default();
    match arr.first() {
        Some(Value::Object(first)) => {
            let headers: Vec<String> = first.keys().cloned().collect();
            builder.push_record(headers.clone());
            for item in arr.iter().filter_map(Value::as_object) {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| item.get(h).map(cell_text).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }
        Some(_) => {
            for item in arr {
                builder.push_record([cell_text(item)]);
            }
        }
        None => builder.push_record(["(empty)"]),
    }
    Table::from(builder)
}

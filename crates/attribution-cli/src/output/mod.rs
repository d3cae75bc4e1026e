pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}

/// The `result` of an output envelope, or the value itself.
pub fn result_of(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

/// Render a scalar for a table cell or CSV field. Decimals serialise as
/// strings already, so they pass through unchanged.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// True for a non-empty array whose first element is an object.
pub fn is_record_array(value: &Value) -> bool {
    matches!(value, Value::Array(arr) if matches!(arr.first(), Some(Value::Object(_))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_of_envelope() {
        let v = json!({"result": {"a": 1}, "warnings": []});
        assert_eq!(result_of(&v), &json!({"a": 1}));
        let bare = json!({"a": 1});
        assert_eq!(result_of(&bare), &bare);
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(scalar_text(&json!("0.035")), "0.035");
        assert_eq!(scalar_text(&json!(12)), "12");
        assert_eq!(scalar_text(&Value::Null), "");
        assert_eq!(scalar_text(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_record_array_detection() {
        assert!(is_record_array(&json!([{"sector": "Mining"}])));
        assert!(!is_record_array(&json!([1.0, 2.0])));
        assert!(!is_record_array(&json!([])));
    }
}

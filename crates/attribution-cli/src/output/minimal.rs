use serde_json::Value;

use super::{result_of, scalar_text};

/// Headline value per command, most specific first. Paths are JSON pointers
/// into the result object.
const PRIORITY_POINTERS: [&str; 12] = [
    "/total_active_return",
    "/all_passed",
    "/active_impact",
    "/var_95",
    "/portfolio/sharpe_ratio",
    "/is_stationary",
    "/statistic",
    "/window",
    "/files",
    "/pages",
    "/path",
    "/records",
];

/// Print just the key answer value from the output.
///
/// Falls back to the first field of the result object.
pub fn print_minimal(value: &Value) {
    println!("{}", minimal_text(result_of(value)));
}

fn minimal_text(result: &Value) -> String {
    if let Value::Object(map) = result {
        for pointer in PRIORITY_POINTERS {
            match result.pointer(pointer) {
                Some(Value::Array(files)) => return format!("{} files", files.len()),
                Some(v) if !v.is_null() => return scalar_text(v),
                _ => {}
            }
        }
        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, scalar_text(val));
        }
    }
    scalar_text(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribution_headline() {
        let result = json!({"num_periods": 12, "total_active_return": "0.0123"});
        assert_eq!(minimal_text(&result), "0.0123");
    }

    #[test]
    fn test_nested_sharpe() {
        let result = json!({"portfolio": {"sharpe_ratio": "1.2"}, "tracking_error": "0.03"});
        assert_eq!(minimal_text(&result), "1.2");
    }

    #[test]
    fn test_validation_before_other_keys() {
        let result = json!({"checks": [], "passed": 5, "total": 5, "all_passed": true});
        assert_eq!(minimal_text(&result), "true");
    }

    #[test]
    fn test_export_counts_files() {
        let result = json!({"directory": "out", "files": [{"name": "a"}, {"name": "b"}]});
        assert_eq!(minimal_text(&result), "2 files");
    }

    #[test]
    fn test_fallback_first_field() {
        assert_eq!(minimal_text(&json!({"zeta": 1})), "zeta: 1");
        assert_eq!(minimal_text(&json!("plain")), "plain");
    }
}

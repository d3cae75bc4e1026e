use attribution_core::data::csv_io::read_records;
use attribution_core::SectorRecord;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Read a sector records CSV.
pub fn read_records_file(path: &Path) -> Result<Vec<SectorRecord>, Box<dyn std::error::Error>> {
    let resolved = resolve_path(path)?;
    let file = File::open(&resolved)
        .map_err(|e| format!("Failed to open '{}': {}", resolved.display(), e))?;
    let records = read_records(file)
        .map_err(|e| format!("Failed to read '{}': {}", resolved.display(), e))?;
    Ok(records)
}

/// Read a JSON file and deserialise into a typed struct.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let resolved = resolve_path(path)?;
    let contents = fs::read_to_string(&resolved)
        .map_err(|e| format!("Failed to read '{}': {}", resolved.display(), e))?;
    let value: T = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", resolved.display(), e))?;
    Ok(value)
}

/// Make `path` absolute and check it names an existing file.
fn resolve_path(path: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    if !resolved.exists() {
        return Err(format!("File not found: {}", resolved.display()).into());
    }
    if !resolved.is_file() {
        return Err(format!("Not a file: {}", resolved.display()).into());
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;

    #[test]
    fn test_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_records_file(dir.path()).err().unwrap();
        assert!(err.to_string().starts_with("Not a file"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sector,date").unwrap();
        let err = read_records_file(file.path()).err().unwrap();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_read_json_map() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"Mining": "0.6", "ICT": "0.4"}}"#).unwrap();
        let map: BTreeMap<String, String> = read_json(file.path()).unwrap();
        assert_eq!(map.len(), 2);
    }
}

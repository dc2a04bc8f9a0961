use anyhow::{anyhow, Context, Result};
use std::path::Path;

use merchant_eval::{MerchantProfile, Record};

pub mod check;
pub mod config;
pub mod evaluate;

/// Parse a `key=value` argument.
pub fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Build the record to evaluate: profile file first, then `--field` overrides.
pub fn build_record(profile: Option<&Path>, fields: &[(String, String)]) -> Result<Record> {
    let mut record = match profile {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read profile {}", path.display()))?;
            let profile: MerchantProfile = serde_json::from_str(&content)
                .map_err(|e| anyhow!("Invalid merchant profile {}: {e}", path.display()))?;
            profile.to_record()
        }
        None => Record::new(),
    };

    for (key, value) in fields {
        record.set(key.clone(), value.clone());
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_field_splits_on_first_equals() {
        assert_eq!(
            parse_field("contactEmail=a=b@example.com"),
            Ok(("contactEmail".to_string(), "a=b@example.com".to_string()))
        );
        assert_eq!(
            parse_field("address="),
            Ok(("address".to_string(), String::new()))
        );
    }

    #[test]
    fn test_parse_field_rejects_malformed_input() {
        assert!(parse_field("merchantName").is_err());
        assert!(parse_field("=Acme").is_err());
    }

    #[test]
    fn test_fields_override_profile_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"merchantName": "Acme", "businessType": "retail"}}"#).unwrap();

        let record = build_record(
            Some(file.path()),
            &[("businessType".to_string(), "wholesale".to_string())],
        )
        .unwrap();

        assert_eq!(record.get("merchantName"), Some("Acme"));
        assert_eq!(record.get("businessType"), Some("wholesale"));
    }

    #[test]
    fn test_missing_profile_file_is_an_error() {
        let err = build_record(Some(Path::new("/nonexistent/profile.json")), &[]).unwrap_err();
        assert!(err.to_string().contains("Failed to read profile"));
    }
}

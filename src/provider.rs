//! # Attribute Provider
//!
//! The seam between the engine and the external data source, plus the
//! bundled file-backed reference implementation. Providers are incremental:
//! the first fetch returns everything, later fetches return only what
//! changed, and an empty batch means "nothing new".

use crate::model::AttributeRecord;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

/// External source of attribute records.
///
/// Implementations track their own change-detection state (a modification
/// watermark, pagination cursor, or similar) and must include the identity
/// field on every record.
pub trait AttributeProvider {
    /// Fetch records changed since the previous call. An empty vector means
    /// no changes.
    fn fetch_changed_records(&mut self) -> Result<Vec<AttributeRecord>>;

    /// Release any resources held by the provider.
    fn close(&mut self) -> Result<()>;
}

/// Reads attribute records from a JSON file, returning data only when the
/// file's modification time advanced since the last read.
///
/// Expected format: a JSON array of objects, each with an `identity` string
/// and an `attributes` map of field name to scalar string, string list, or
/// null.
pub struct FileProvider {
    path: PathBuf,
    last_mod_time: Option<SystemTime>,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_mod_time: None,
        }
    }

    /// Provider over the configured data file path.
    pub fn from_config(config: &crate::config::SyncConfig) -> Self {
        Self::new(config.data_file.clone())
    }
}

impl AttributeProvider for FileProvider {
    fn fetch_changed_records(&mut self) -> Result<Vec<AttributeRecord>> {
        let metadata = fs::metadata(&self.path)
            .with_context(|| format!("failed to stat {}", self.path.display()))?;
        let mod_time = metadata
            .modified()
            .with_context(|| format!("no modification time for {}", self.path.display()))?;

        if let Some(last) = self.last_mod_time {
            if mod_time <= last {
                return Ok(Vec::new());
            }
        }

        let data = fs::read(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let records: Vec<AttributeRecord> = serde_json::from_slice(&data)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;

        self.last_mod_time = Some(mod_time);
        Ok(records)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    fn write_records(file: &tempfile::NamedTempFile, json: &str) {
        fs::write(file.path(), json).unwrap();
    }

    #[test]
    fn test_first_fetch_returns_all_records() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_records(
            &file,
            r#"[{"identity":"a@x.com","attributes":{"dept":"Eng","tags":["X"]}}]"#,
        );

        let mut provider = FileProvider::new(file.path());
        let records = provider.fetch_changed_records().unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identity, "a@x.com");
        assert_eq!(
            records[0].attributes.get("dept"),
            Some(&Value::Text("Eng".to_string()))
        );
    }

    #[test]
    fn test_from_config_reads_the_configured_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_records(&file, r#"[{"identity":"a@x.com","attributes":{}}]"#);

        let config = crate::config::SyncConfig {
            data_file: file.path().to_path_buf(),
            ..Default::default()
        };
        let mut provider = FileProvider::from_config(&config);
        assert_eq!(provider.fetch_changed_records().unwrap().len(), 1);
    }

    #[test]
    fn test_unmodified_file_yields_empty_batch() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_records(&file, r#"[{"identity":"a@x.com","attributes":{}}]"#);

        let mut provider = FileProvider::new(file.path());
        assert_eq!(provider.fetch_changed_records().unwrap().len(), 1);
        assert!(provider.fetch_changed_records().unwrap().is_empty());
    }

    #[test]
    fn test_modified_file_is_fetched_again() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_records(&file, r#"[{"identity":"a@x.com","attributes":{}}]"#);

        let mut provider = FileProvider::new(file.path());
        provider.fetch_changed_records().unwrap();

        // Push the mtime forward explicitly; fast writes can otherwise land
        // within filesystem timestamp granularity.
        write_records(
            &file,
            r#"[{"identity":"a@x.com","attributes":{}},{"identity":"b@x.com","attributes":{}}]"#,
        );
        let future = SystemTime::now() + std::time::Duration::from_secs(2);
        file.as_file().set_modified(future).unwrap();

        let records = provider.fetch_changed_records().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut provider = FileProvider::new("/nonexistent/attrs.json");
        assert!(provider.fetch_changed_records().is_err());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_records(&file, "not json");

        let mut provider = FileProvider::new(file.path());
        assert!(provider.fetch_changed_records().is_err());
    }
}

use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MineError;

pub const DEFAULT_CONFIG_FILE: &str = "protmine.json";
pub const DEFAULT_FILE_PATTERN: &str = r".*_genefamilies\.tsv(\.gz)?$";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 10.0;

/// Raw config as it appears in `protmine.json`. Every field is optional so
/// a file config and CLI flags can be merged before resolution.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub sample_dir: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub requests_per_second: Option<f64>,
    #[serde(default)]
    pub filter_invalid_ids: Option<bool>,
    #[serde(default)]
    pub mapping_table: Option<String>,
    #[serde(default)]
    pub file_pattern: Option<String>,
    #[serde(default)]
    pub id_column: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub sample_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub job_name: String,
    pub fields: Vec<String>,
    pub batch_size: usize,
    pub requests_per_second: f64,
    pub filter_invalid_ids: bool,
    pub mapping_table: Option<Utf8PathBuf>,
    pub file_pattern: String,
    pub id_column: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the raw config file. An explicit path must exist; with no path,
    /// a missing `protmine.json` yields an empty config so a run can be
    /// driven by CLI flags alone.
    pub fn load(path: Option<&str>) -> Result<Config, MineError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MineError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| MineError::ConfigParse(err.to_string()))
    }
}

impl Config {
    /// Overlay `self` on `fallback`; values present in `self` win.
    pub fn merge(self, fallback: Config) -> Config {
        Config {
            sample_dir: self.sample_dir.or(fallback.sample_dir),
            output_dir: self.output_dir.or(fallback.output_dir),
            job_name: self.job_name.or(fallback.job_name),
            fields: self.fields.or(fallback.fields),
            batch_size: self.batch_size.or(fallback.batch_size),
            requests_per_second: self.requests_per_second.or(fallback.requests_per_second),
            filter_invalid_ids: self.filter_invalid_ids.or(fallback.filter_invalid_ids),
            mapping_table: self.mapping_table.or(fallback.mapping_table),
            file_pattern: self.file_pattern.or(fallback.file_pattern),
            id_column: self.id_column.or(fallback.id_column),
        }
    }

    pub fn resolve(self) -> Result<RunConfig, MineError> {
        let sample_dir = self
            .sample_dir
            .ok_or_else(|| MineError::InvalidParameter("sample_dir is required".to_string()))?;
        let output_dir = self
            .output_dir
            .ok_or_else(|| MineError::InvalidParameter("output_dir is required".to_string()))?;
        let job_name = self
            .job_name
            .ok_or_else(|| MineError::InvalidParameter("job_name is required".to_string()))?;

        let fields = self.fields.unwrap_or_else(default_fields);
        if fields.is_empty() {
            return Err(MineError::InvalidParameter(
                "fields must not be empty".to_string(),
            ));
        }

        let batch_size = self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(MineError::InvalidParameter(
                "batch_size must be at least 1".to_string(),
            ));
        }

        let requests_per_second = self
            .requests_per_second
            .unwrap_or(DEFAULT_REQUESTS_PER_SECOND);
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(MineError::InvalidParameter(
                "requests_per_second must be a positive number".to_string(),
            ));
        }

        let file_pattern = self
            .file_pattern
            .unwrap_or_else(|| DEFAULT_FILE_PATTERN.to_string());
        Regex::new(&file_pattern)
            .map_err(|err| MineError::InvalidParameter(format!("bad file_pattern: {err}")))?;

        Ok(RunConfig {
            sample_dir: Utf8PathBuf::from(sample_dir),
            output_dir: Utf8PathBuf::from(output_dir),
            job_name,
            fields,
            batch_size,
            requests_per_second,
            filter_invalid_ids: self.filter_invalid_ids.unwrap_or(true),
            mapping_table: self.mapping_table.map(Utf8PathBuf::from),
            file_pattern,
            id_column: self.id_column,
        })
    }
}

/// Default UniProtKB return fields for a feature-mining run.
pub fn default_fields() -> Vec<String> {
    [
        "accession",
        "ft_domain",
        "cc_domain",
        "protein_families",
        "go_f",
        "go_p",
        "cc_function",
        "cc_catalytic_activity",
        "ec",
        "cc_pathway",
        "rhea",
        "cc_cofactor",
        "sequence",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn minimal() -> Config {
        Config {
            sample_dir: Some("samples".to_string()),
            output_dir: Some("mined".to_string()),
            job_name: Some("run1".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn resolve_applies_defaults() {
        let resolved = minimal().resolve().unwrap();
        assert_eq!(resolved.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(resolved.requests_per_second, DEFAULT_REQUESTS_PER_SECOND);
        assert!(resolved.filter_invalid_ids);
        assert_eq!(resolved.fields, default_fields());
        assert_eq!(resolved.file_pattern, DEFAULT_FILE_PATTERN);
        assert!(resolved.mapping_table.is_none());
    }

    #[test]
    fn resolve_rejects_missing_required() {
        let err = Config::default().resolve().unwrap_err();
        assert_matches!(err, MineError::InvalidParameter(_));
    }

    #[test]
    fn resolve_rejects_zero_batch_size() {
        let config = Config {
            batch_size: Some(0),
            ..minimal()
        };
        assert_matches!(config.resolve(), Err(MineError::InvalidParameter(_)));
    }

    #[test]
    fn resolve_rejects_nonpositive_rate() {
        let config = Config {
            requests_per_second: Some(0.0),
            ..minimal()
        };
        assert_matches!(config.resolve(), Err(MineError::InvalidParameter(_)));
    }

    #[test]
    fn merge_prefers_overrides() {
        let file = Config {
            batch_size: Some(500),
            job_name: Some("from-file".to_string()),
            ..minimal()
        };
        let cli = Config {
            job_name: Some("from-cli".to_string()),
            ..Config::default()
        };

        let merged = cli.merge(file);
        assert_eq!(merged.job_name.as_deref(), Some("from-cli"));
        assert_eq!(merged.batch_size, Some(500));
    }
}

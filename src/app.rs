use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::config::RunConfig;
use crate::engine::{ENTRY_COLUMN, FetchEngine, FetchOptions};
use crate::error::MineError;
use crate::extract::{self, CrossReferenceMap};
use crate::normalize::FieldNormalizer;
use crate::uniprot::SearchClient;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub job_name: String,
    pub completed_at: String,
    pub files: Vec<FileSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub source: String,
    pub output: String,
    pub requested: usize,
    pub unmapped: usize,
    pub filtered_out: usize,
    pub rows: usize,
    pub dropped: Vec<DroppedEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DroppedEntry {
    pub id: String,
    pub reason: String,
}

/// Per-source-file mining pipeline: extract identifier tokens, translate
/// the secondary namespace, fetch features in batches, normalize, persist.
#[derive(Clone)]
pub struct App<C: SearchClient> {
    client: C,
}

impl<C: SearchClient> App<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn run(
        &self,
        config: &RunConfig,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, MineError> {
        let sources = extract::scan_sources(&config.sample_dir, &config.file_pattern)?;
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; {} source file(s) matched", sources.len()),
            elapsed: None,
        });

        let map = match &config.mapping_table {
            Some(path) => Some(CrossReferenceMap::load(path)?),
            None => None,
        };

        let out_dir = config
            .output_dir
            .join(format!("{}_output_dir", config.job_name));
        fs::create_dir_all(out_dir.as_std_path())
            .map_err(|err| MineError::Filesystem(err.to_string()))?;

        // One engine and one normalizer for the whole run: the rate limiter
        // paces every request of the run, and unavailable-rule warnings fire
        // once per column, not once per file.
        let mut engine = FetchEngine::new(
            &self.client,
            FetchOptions {
                fields: config.fields.clone(),
                batch_size: config.batch_size,
                requests_per_second: config.requests_per_second,
                filter_invalid: config.filter_invalid_ids,
            },
        )?;
        let mut normalizer = FieldNormalizer::new();
        let mut files = Vec::new();
        for source in sources {
            sink.event(ProgressEvent {
                message: format!("phase=Extract; scanning {source}"),
                elapsed: None,
            });
            let extracted = extract::extract_identifiers(&source, config.id_column.as_deref())?;
            let (identifiers, unmapped) = extract::resolve_secondary(extracted, map.as_ref());

            sink.event(ProgressEvent {
                message: format!(
                    "phase=Fetch; {} identifier(s) from {source}",
                    identifiers.len()
                ),
                elapsed: None,
            });
            let requested = identifiers.len();
            let report = engine.fetch(&identifiers, sink);

            let mut table = report.table;
            normalizer.normalize(&mut table, ENTRY_COLUMN);

            let output = output_path(&out_dir, &source);
            table.write_tsv(&output)?;
            sink.event(ProgressEvent {
                message: format!("phase=Store; wrote {output}"),
                elapsed: None,
            });

            files.push(FileSummary {
                source: source.to_string(),
                output: output.to_string(),
                requested,
                unmapped,
                filtered_out: report.filtered_out,
                rows: table.len(),
                dropped: report
                    .dropped
                    .into_iter()
                    .map(|dropped| DroppedEntry {
                        id: dropped.id.to_string(),
                        reason: dropped.reason.to_string(),
                    })
                    .collect(),
            });
        }

        Ok(RunSummary {
            job_name: config.job_name.clone(),
            completed_at: iso_timestamp(),
            files,
        })
    }
}

/// `X_genefamilies.tsv[.gz]` → `<dir>/X_genefamilies.features.tsv`.
fn output_path(dir: &Utf8Path, source: &Utf8Path) -> Utf8PathBuf {
    let name = source.file_name().unwrap_or("source");
    let stem = name.strip_suffix(".gz").unwrap_or(name);
    let stem = stem.strip_suffix(".tsv").unwrap_or(stem);
    dir.join(format!("{stem}.features.tsv"))
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

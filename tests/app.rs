use std::fs;
use std::sync::Mutex;

use camino::Utf8PathBuf;

use protmine::app::{App, ProgressEvent, ProgressSink};
use protmine::config::{Config, RunConfig};
use protmine::domain::Accession;
use protmine::error::MineError;
use protmine::uniprot::SearchClient;

struct NullSink;

impl ProgressSink for NullSink {
    fn event(&self, _event: ProgressEvent) {}
}

/// Answers every batch with one pathway row per accession, except the ones
/// it is told to reject.
struct CannedSearch {
    reject: Vec<String>,
    calls: Mutex<usize>,
}

impl CannedSearch {
    fn new(reject: &[&str]) -> Self {
        Self {
            reject: reject.iter().map(|id| id.to_string()).collect(),
            calls: Mutex::new(0),
        }
    }
}

impl SearchClient for CannedSearch {
    fn search(&self, accessions: &[Accession], _fields: &[String]) -> Result<String, MineError> {
        *self.calls.lock().unwrap() += 1;
        if accessions
            .iter()
            .any(|id| self.reject.contains(&id.as_str().to_string()))
        {
            return Err(MineError::UniprotStatus {
                status: 400,
                message: "bad accession".to_string(),
            });
        }
        let mut body = String::from("Entry\tPathway\n");
        for id in accessions {
            body.push_str(&format!("{id}\tpathway of {id}\n"));
        }
        Ok(body)
    }
}

fn run_config(sample_dir: &Utf8PathBuf, output_dir: &Utf8PathBuf) -> RunConfig {
    Config {
        sample_dir: Some(sample_dir.to_string()),
        output_dir: Some(output_dir.to_string()),
        job_name: Some("t1".to_string()),
        fields: Some(vec!["accession".to_string(), "cc_pathway".to_string()]),
        batch_size: Some(2),
        requests_per_second: Some(10_000.0),
        ..Config::default()
    }
    .resolve()
    .unwrap()
}

fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).unwrap()
}

#[test]
fn run_mines_each_source_into_a_feature_table() {
    let dir = tempfile::tempdir().unwrap();
    let samples = utf8(dir.path().join("samples"));
    let mined = utf8(dir.path().join("mined"));
    fs::create_dir_all(samples.as_std_path()).unwrap();
    fs::write(
        samples.join("stool_genefamilies.tsv").as_std_path(),
        "# Gene Family\tabundance\n\
         UniRef90_P69905\t1.0\n\
         UniRef90_P68871\t2.0\n\
         UniRef90_UPI0000000001\t3.0\n",
    )
    .unwrap();

    let app = App::new(CannedSearch::new(&[]));
    let summary = app.run(&run_config(&samples, &mined), &NullSink).unwrap();

    assert_eq!(summary.job_name, "t1");
    assert_eq!(summary.files.len(), 1);
    let file = &summary.files[0];
    assert_eq!(file.requested, 3);
    assert_eq!(file.filtered_out, 1);
    assert_eq!(file.rows, 2);
    assert!(file.dropped.is_empty());

    let output = mined.join("t1_output_dir/stool_genefamilies.features.tsv");
    assert_eq!(file.output, output.as_str());
    let written = fs::read_to_string(output.as_std_path()).unwrap();
    assert_eq!(
        written,
        "Entry\tPathway\nP69905\tpathway of P69905\nP68871\tpathway of P68871\n"
    );
}

#[test]
fn run_reports_dropped_identifiers_and_still_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let samples = utf8(dir.path().join("samples"));
    let mined = utf8(dir.path().join("mined"));
    fs::create_dir_all(samples.as_std_path()).unwrap();
    fs::write(
        samples.join("gut_genefamilies.tsv").as_std_path(),
        "# Gene Family\tabundance\nUniRef90_P69905\t1.0\nUniRef90_P99999\t2.0\n",
    )
    .unwrap();

    let app = App::new(CannedSearch::new(&["P99999"]));
    let summary = app.run(&run_config(&samples, &mined), &NullSink).unwrap();

    let file = &summary.files[0];
    assert_eq!(file.rows, 1);
    assert_eq!(file.dropped.len(), 1);
    assert_eq!(file.dropped[0].id, "P99999");
    assert!(file.dropped[0].reason.contains("400"));
}

#[test]
fn run_with_no_matching_sources_produces_an_empty_summary() {
    let dir = tempfile::tempdir().unwrap();
    let samples = utf8(dir.path().join("samples"));
    let mined = utf8(dir.path().join("mined"));
    fs::create_dir_all(samples.as_std_path()).unwrap();

    let app = App::new(CannedSearch::new(&[]));
    let summary = app.run(&run_config(&samples, &mined), &NullSink).unwrap();
    assert!(summary.files.is_empty());
}

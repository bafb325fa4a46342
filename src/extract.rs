use std::collections::{HashMap, HashSet};
use std::fs;
use std::fs::File;
use std::io::{BufReader, Read};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use regex::Regex;
use tracing::{debug, info};

use crate::domain::{Accession, IdentifierSet, SecondaryId};
use crate::error::MineError;

/// Identifier tokens found in one source file, split by namespace.
#[derive(Debug, Default)]
pub struct ExtractedIds {
    pub primary: IdentifierSet,
    pub secondary: Vec<SecondaryId>,
}

/// Files in `dir` whose name matches `pattern`, sorted for a stable run
/// order. The directory is not walked recursively.
pub fn scan_sources(dir: &Utf8Path, pattern: &str) -> Result<Vec<Utf8PathBuf>, MineError> {
    let name_regex = Regex::new(pattern)
        .map_err(|err| MineError::InvalidParameter(format!("bad file_pattern: {err}")))?;

    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| MineError::Filesystem(format!("read source dir {dir}: {err}")))?;
    let mut sources = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| MineError::Filesystem(err.to_string()))?;
        let path = Utf8PathBuf::from_path_buf(entry.path())
            .map_err(|_| MineError::Filesystem("non-utf8 path in source directory".to_string()))?;
        let matches = path
            .file_name()
            .map(|name| name_regex.is_match(name))
            .unwrap_or(false);
        if matches && path.is_file() {
            sources.push(path);
        }
    }
    sources.sort();
    debug!(count = sources.len(), dir = %dir, "scanned source directory");
    Ok(sources)
}

/// Collect `UniRef90_<id>` / `UniRef50_<id>` tokens from the designated
/// column of a tab-delimited source file. With no configured column the
/// first one is used. Both namespaces are deduplicated in encounter order.
pub fn extract_identifiers(
    path: &Utf8Path,
    id_column: Option<&str>,
) -> Result<ExtractedIds, MineError> {
    let re_primary = Regex::new(r"UniRef90_([A-Za-z0-9]+)").unwrap();
    let re_secondary = Regex::new(r"UniRef50_([A-Za-z0-9]+)").unwrap();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(open_source(path)?);
    let headers = reader
        .headers()
        .map_err(|err| MineError::TableRead(format!("{path}: {err}")))?;
    let column = match id_column {
        Some(name) => headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| MineError::MissingColumn {
                file: path.to_string(),
                column: name.to_string(),
            })?,
        None => 0,
    };

    let mut extracted = ExtractedIds::default();
    let mut seen_secondary = HashSet::new();
    for record in reader.records() {
        let record = record.map_err(|err| MineError::TableRead(format!("{path}: {err}")))?;
        let Some(cell) = record.get(column) else {
            continue;
        };
        for captures in re_primary.captures_iter(cell) {
            if let Ok(id) = captures[1].parse::<Accession>() {
                extracted.primary.insert(id);
            }
        }
        for captures in re_secondary.captures_iter(cell) {
            if let Ok(id) = captures[1].parse::<SecondaryId>() {
                if seen_secondary.insert(id.as_str().to_string()) {
                    extracted.secondary.push(id);
                }
            }
        }
    }

    debug!(
        primary = extracted.primary.len(),
        secondary = extracted.secondary.len(),
        file = %path,
        "extracted identifier tokens"
    );
    Ok(extracted)
}

/// Many-to-one UniRef50 → accession lookup, loaded from a headerless
/// two-column TSV.
#[derive(Debug, Default)]
pub struct CrossReferenceMap {
    map: HashMap<String, Accession>,
}

impl CrossReferenceMap {
    pub fn load(path: &Utf8Path) -> Result<Self, MineError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(open_source(path)?);

        let mut map = HashMap::new();
        for record in reader.records() {
            let record = record.map_err(|err| MineError::TableRead(format!("{path}: {err}")))?;
            let (Some(secondary), Some(primary)) = (record.get(0), record.get(1)) else {
                return Err(MineError::TableRead(format!(
                    "{path}: mapping rows need two columns"
                )));
            };
            let primary: Accession = primary.parse()?;
            map.insert(secondary.trim().to_string(), primary);
        }
        info!(entries = map.len(), file = %path, "loaded cross-reference map");
        Ok(Self { map })
    }

    pub fn resolve(&self, id: &SecondaryId) -> Option<&Accession> {
        self.map.get(id.as_str())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Merge resolved secondary identifiers into the primary set. Returns the
/// unified set and the count of secondary identifiers that had no mapping
/// (all of them, when no map is supplied).
pub fn resolve_secondary(
    extracted: ExtractedIds,
    map: Option<&CrossReferenceMap>,
) -> (IdentifierSet, usize) {
    let ExtractedIds {
        mut primary,
        secondary,
    } = extracted;

    let mut unresolved = 0;
    for id in &secondary {
        match map.and_then(|map| map.resolve(id)) {
            Some(accession) => {
                primary.insert(accession.clone());
            }
            None => unresolved += 1,
        }
    }
    if unresolved > 0 {
        info!(unresolved, "secondary identifiers without a mapping were excluded");
    }
    (primary, unresolved)
}

fn open_source(path: &Utf8Path) -> Result<Box<dyn Read>, MineError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| MineError::Filesystem(format!("open {path}: {err}")))?;
    if path.as_str().ends_with(".gz") {
        Ok(Box::new(GzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_patterns_capture_id_portion() {
        let re = Regex::new(r"UniRef90_([A-Za-z0-9]+)").unwrap();
        let cell = "UniRef90_P69905|g__Escherichia; UniRef90_unknown";
        let ids: Vec<&str> = re.captures_iter(cell).map(|c| c.get(1).unwrap().as_str()).collect();
        assert_eq!(ids, vec!["P69905", "unknown"]);
    }

    #[test]
    fn resolve_without_map_excludes_all_secondary() {
        let mut extracted = ExtractedIds::default();
        extracted.primary.insert("P1".parse().unwrap());
        extracted.secondary.push("S1".parse().unwrap());
        extracted.secondary.push("S2".parse().unwrap());

        let (ids, unresolved) = resolve_secondary(extracted, None);
        assert_eq!(ids.len(), 1);
        assert_eq!(unresolved, 2);
    }
}

use std::fs;

use camino::Utf8Path;

use crate::error::MineError;

/// Marker for an absent field value. Distinct from the empty string: empty
/// cells are rewritten to it before a table is persisted.
pub const MISSING: &str = "NaN";

/// In-memory tab-separated table: a header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    key: Option<usize>,
}

impl Table {
    pub fn with_columns(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            key: None,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Parse a TSV body with a header row. Ragged records are padded or
    /// truncated to the header width.
    pub fn parse_tsv(body: &str) -> Result<Self, MineError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(body.as_bytes());
        let columns: Vec<String> = reader
            .headers()
            .map_err(|err| MineError::TableRead(err.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| MineError::TableRead(err.to_string()))?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Self {
            columns,
            rows,
            key: None,
        })
    }

    /// Append another table's rows. A table that has not yet accumulated any
    /// rows adopts the incoming header; afterwards headers must match.
    pub fn append(&mut self, other: Table) -> Result<(), MineError> {
        if other.rows.is_empty() {
            return Ok(());
        }
        if self.rows.is_empty() {
            self.columns = other.columns;
            self.rows = other.rows;
            return Ok(());
        }
        if other.columns != self.columns {
            return Err(MineError::TableRead(format!(
                "column mismatch: expected {:?}, got {:?}",
                self.columns, other.columns
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Rewrite empty cells to the missing-value sentinel.
    pub fn fill_missing(&mut self) {
        for row in &mut self.rows {
            for cell in row {
                if cell.is_empty() {
                    *cell = MISSING.to_string();
                }
            }
        }
    }

    /// Make `column` the row key, moving it to the front. Returns false when
    /// the column is absent (an empty result keeps its configured columns).
    pub fn set_key(&mut self, column: &str) -> bool {
        let Some(index) = self.column_index(column) else {
            return false;
        };
        if index != 0 {
            self.columns[..=index].rotate_right(1);
            for row in &mut self.rows {
                row[..=index].rotate_right(1);
            }
        }
        self.key = Some(0);
        true
    }

    /// Drop rows whose every non-key cell is the missing sentinel.
    pub fn drop_blank_rows(&mut self) {
        let key = self.key;
        if self.columns.len() <= key.map(|_| 1).unwrap_or(0) {
            return;
        }
        self.rows.retain(|row| {
            row.iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != key)
                .any(|(_, cell)| cell != MISSING)
        });
    }

    /// Apply `f` to every cell of `column`. Returns false when the column is
    /// absent.
    pub fn map_column<F: FnMut(&str) -> String>(&mut self, column: &str, mut f: F) -> bool {
        let Some(index) = self.column_index(column) else {
            return false;
        };
        for row in &mut self.rows {
            row[index] = f(&row[index]);
        }
        true
    }

    /// Row lookup by key cell; only meaningful after `set_key`.
    pub fn row_by_key(&self, key: &str) -> Option<&[String]> {
        let index = self.key?;
        self.rows
            .iter()
            .find(|row| row[index] == key)
            .map(Vec::as_slice)
    }

    /// Persist as TSV, header first. The write goes through a temp file in
    /// the destination directory and a rename.
    pub fn write_tsv(&self, path: &Utf8Path) -> Result<(), MineError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());
        writer
            .write_record(&self.columns)
            .map_err(|err| MineError::TableRead(err.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|err| MineError::TableRead(err.to_string()))?;
        }
        let content = writer
            .into_inner()
            .map_err(|err| MineError::Filesystem(err.to_string()))?;
        write_bytes_atomic(path, &content)
    }
}

fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), MineError> {
    let parent = path
        .parent()
        .ok_or_else(|| MineError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| MineError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix("protmine")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| MineError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), content).map_err(|err| MineError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| MineError::Filesystem(err.to_string()))?;
    Ok(())
}

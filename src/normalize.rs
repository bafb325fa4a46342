use std::collections::HashSet;

use regex::Regex;
use tracing::warn;

use crate::table::{MISSING, Table};

/// Extraction rule for one TSV column: a pattern whose first capture group
/// is the informative payload, or `None` for columns that are already clean.
struct Rule {
    column: &'static str,
    pattern: Option<Regex>,
}

/// Strips UniProt's free-text framing (comment-type prefixes, evidence
/// braces, feature qualifiers) out of fetched columns. Columns without a
/// rule pass through unchanged, with a warning emitted once per run.
pub struct FieldNormalizer {
    rules: Vec<Rule>,
    warned: HashSet<String>,
}

impl FieldNormalizer {
    pub fn new() -> Self {
        let identity = |column| Rule {
            column,
            pattern: None,
        };
        let extract = |column, pattern: &str| Rule {
            column,
            pattern: Some(Regex::new(pattern).unwrap()),
        };

        Self {
            rules: vec![
                extract("Domain [FT]", r#"/note="([^"]+)""#),
                extract("Domain [CC]", r"DOMAIN:\s*([^{]+)"),
                identity("Protein families"),
                identity("Gene Ontology (molecular function)"),
                identity("Gene Ontology (biological process)"),
                identity("Interacts with"),
                extract("Function [CC]", r"FUNCTION:\s*([^{]+)"),
                extract("Catalytic activity", r"Reaction=([^;.]+)"),
                identity("EC number"),
                extract("Pathway", r"PATHWAY:\s*([^{]+)"),
                identity("Rhea ID"),
                extract("Cofactor", r"COFACTOR:\s*([^{]+)"),
                extract("Activity regulation", r"ACTIVITY REGULATION:\s*([^{]+)"),
                identity("Sequence"),
            ],
            warned: HashSet::new(),
        }
    }

    /// Rewrite every column of `table` through its rule. The key column and
    /// sentinel cells are left untouched.
    pub fn normalize(&mut self, table: &mut Table, key_column: &str) {
        for column in table.columns().to_vec() {
            if column == key_column {
                continue;
            }
            let Some(rule) = self.rules.iter().find(|rule| rule.column == column) else {
                if self.warned.insert(column.clone()) {
                    warn!(column = %column, "no extraction rule for column, passing values through");
                }
                continue;
            };
            let Some(pattern) = &rule.pattern else {
                continue;
            };
            table.map_column(&column, |cell| extract_payload(pattern, cell));
        }
    }
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// All capture-group matches joined with `,`; a cell with no match (or a
/// missing one) is returned unchanged.
fn extract_payload(pattern: &Regex, cell: &str) -> String {
    if cell.is_empty() || cell == MISSING {
        return cell.to_string();
    }
    let matches: Vec<&str> = pattern
        .captures_iter(cell)
        .filter_map(|captures| captures.get(1))
        .map(|group| group.as_str().trim())
        .collect();
    if matches.is_empty() {
        cell.to_string()
    } else {
        matches.join(",")
    }
}

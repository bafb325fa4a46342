use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MineError;

/// Canonical UniProtKB accession, the primary identifier of a protein entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Accession {
    type Err = MineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid =
            !normalized.is_empty() && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(MineError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// UniRef50 cluster id, a secondary identifier that needs translation to an
/// accession before it can be queried.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecondaryId(String);

impl SecondaryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecondaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SecondaryId {
    type Err = MineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid =
            !normalized.is_empty() && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(MineError::InvalidSecondaryId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// Deduplicated, order-preserving accession collection. First occurrence
/// wins; later duplicates are ignored.
#[derive(Debug, Clone, Default)]
pub struct IdentifierSet {
    ids: Vec<Accession>,
    seen: HashSet<String>,
}

impl IdentifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: Accession) -> bool {
        if self.seen.insert(id.as_str().to_string()) {
            self.ids.push(id);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn as_slice(&self) -> &[Accession] {
        &self.ids
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Accession> {
        self.ids.iter()
    }
}

impl FromIterator<Accession> for IdentifierSet {
    fn from_iter<I: IntoIterator<Item = Accession>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_accession_valid() {
        let id: Accession = " P69905 ".parse().unwrap();
        assert_eq!(id.as_str(), "P69905");
    }

    #[test]
    fn parse_accession_invalid() {
        let err = "P699-05".parse::<Accession>().unwrap_err();
        assert_matches!(err, MineError::InvalidAccession(_));

        let err = "".parse::<Accession>().unwrap_err();
        assert_matches!(err, MineError::InvalidAccession(_));
    }

    #[test]
    fn parse_secondary_id() {
        let id: SecondaryId = "Q8WZ42".parse().unwrap();
        assert_eq!(id.as_str(), "Q8WZ42");
        assert_matches!(
            "not an id".parse::<SecondaryId>(),
            Err(MineError::InvalidSecondaryId(_))
        );
    }

    #[test]
    fn identifier_set_dedups_preserving_order() {
        let mut set = IdentifierSet::new();
        assert!(set.insert("B1".parse().unwrap()));
        assert!(set.insert("A1".parse().unwrap()));
        assert!(!set.insert("B1".parse().unwrap()));

        let ids: Vec<&str> = set.iter().map(Accession::as_str).collect();
        assert_eq!(ids, vec!["B1", "A1"]);
        assert_eq!(set.len(), 2);
    }
}

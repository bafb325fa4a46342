use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::Accession;
use crate::error::MineError;

pub const SEARCH_URL: &str = "https://rest.uniprot.org/uniprotkb/search";

/// One bulk query against the UniProtKB search endpoint: the requested
/// fields for every accession in the batch, as a TSV body.
///
/// Implementations must classify failures: a non-2xx response maps to
/// `MineError::UniprotStatus`, everything else (connect, timeout, body read)
/// to `MineError::UniprotHttp`. The fetch engine splits batches on the
/// former and discards them on the latter.
pub trait SearchClient: Send + Sync {
    fn search(&self, accessions: &[Accession], fields: &[String]) -> Result<String, MineError>;
}

#[derive(Clone)]
pub struct UniprotHttpClient {
    client: Client,
    base_url: String,
}

impl UniprotHttpClient {
    pub fn new() -> Result<Self, MineError> {
        Self::with_base_url(SEARCH_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, MineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("protmine/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MineError::UniprotHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| MineError::UniprotHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl SearchClient for UniprotHttpClient {
    fn search(&self, accessions: &[Accession], fields: &[String]) -> Result<String, MineError> {
        let size = accessions.len().to_string();
        let query = accession_query(accessions);
        let fields = fields.join(",");
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("format", "tsv"),
                ("size", size.as_str()),
                ("query", query.as_str()),
                ("fields", fields.as_str()),
            ])
            .send()
            .map_err(|err| MineError::UniprotHttp(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "UniProt request failed".to_string());
            return Err(MineError::UniprotStatus { status, message });
        }

        response
            .text()
            .map_err(|err| MineError::UniprotHttp(err.to_string()))
    }
}

/// OR-joined accession-equality filter over the batch.
pub fn accession_query(accessions: &[Accession]) -> String {
    accessions
        .iter()
        .map(|id| format!("accession:{id}"))
        .collect::<Vec<_>>()
        .join(" OR ")
}

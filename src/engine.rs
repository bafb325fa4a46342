use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{Accession, IdentifierSet};
use crate::error::MineError;
use crate::table::Table;
use crate::uniprot::SearchClient;

/// Identifier prefixes with no UniProtKB entry behind them: UniParc
/// accessions and the unmapped-read bucket of gene-family profilers.
pub const INVALID_ID_PREFIXES: [&str; 2] = ["UPI", "unknown"];

/// Accession column of the search endpoint's TSV output.
pub const ENTRY_COLUMN: &str = "Entry";

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub fields: Vec<String>,
    pub batch_size: usize,
    pub requests_per_second: f64,
    pub filter_invalid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Rejected by the endpoint at minimum batch size.
    Rejected { status: u16 },
    /// Lost with its whole batch to an unclassified failure.
    Discarded { message: String },
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::Rejected { status } => write!(f, "rejected with status {status}"),
            DropReason::Discarded { message } => write!(f, "batch discarded: {message}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DroppedIdentifier {
    pub id: Accession,
    pub reason: DropReason,
}

/// What a fetch actually delivered: the accumulated table, every identifier
/// that was lost along the way and why, and the pre-filter exclusion count.
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub table: Table,
    pub dropped: Vec<DroppedIdentifier>,
    pub filtered_out: usize,
}

/// Minimum-interval pacer shared by every request of a run, splits included.
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Self {
        Self {
            min_interval: Duration::from_secs_f64(1.0 / requests_per_second),
            last_request: None,
        }
    }

    /// Block until at least `1/rate` has passed since the previous call.
    /// The first call never waits.
    pub fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last_request = Some(Instant::now());
    }
}

struct PendingBatch {
    ids: Vec<Accession>,
    limit: usize,
}

/// Resilient batch fetcher over a [`SearchClient`].
///
/// Identifiers are partitioned into batches of `batch_size` and resolved
/// sequentially. A batch the endpoint rejects is re-chunked at half its
/// limit and retried; at limit 1 the identifier is dropped. Any other
/// failure discards the batch outright. Nothing is raised to the caller:
/// every loss is recorded in the returned [`FetchReport`].
pub struct FetchEngine<'a, C: SearchClient> {
    client: &'a C,
    options: FetchOptions,
    limiter: RateLimiter,
}

impl<'a, C: SearchClient> FetchEngine<'a, C> {
    pub fn new(client: &'a C, options: FetchOptions) -> Result<Self, MineError> {
        if options.batch_size == 0 {
            return Err(MineError::InvalidParameter(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if !options.requests_per_second.is_finite() || options.requests_per_second <= 0.0 {
            return Err(MineError::InvalidParameter(
                "requests_per_second must be a positive number".to_string(),
            ));
        }
        let limiter = RateLimiter::new(options.requests_per_second);
        Ok(Self {
            client,
            options,
            limiter,
        })
    }

    pub fn fetch(&mut self, identifiers: &IdentifierSet, sink: &dyn ProgressSink) -> FetchReport {
        let mut requested: Vec<Accession> = identifiers.as_slice().to_vec();

        let mut filtered_out = 0;
        if self.options.filter_invalid {
            let before = requested.len();
            requested.retain(|id| {
                !INVALID_ID_PREFIXES
                    .iter()
                    .any(|prefix| id.as_str().starts_with(prefix))
            });
            filtered_out = before - requested.len();
            if filtered_out > 0 {
                info!(filtered_out, "excluded identifiers with known-invalid prefixes");
            }
        }

        let mut table = Table::with_columns(self.options.fields.clone());
        let mut dropped = Vec::new();

        let total = requested.len().div_ceil(self.options.batch_size);
        for (index, chunk) in requested.chunks(self.options.batch_size).enumerate() {
            self.resolve_batch(chunk, &mut table, &mut dropped);
            sink.event(ProgressEvent {
                message: format!("phase=Fetch; batch {}/{total} resolved", index + 1),
                elapsed: None,
            });
        }

        table.fill_missing();
        table.set_key(ENTRY_COLUMN);
        table.drop_blank_rows();

        if !dropped.is_empty() {
            info!(dropped = dropped.len(), "identifiers lost to failed batches");
        }

        FetchReport {
            table,
            dropped,
            filtered_out,
        }
    }

    /// Drive one top-level batch (and everything it splits into) to a
    /// terminal outcome. Sub-batches go on the front of the queue so
    /// identifier order survives splitting.
    fn resolve_batch(
        &mut self,
        ids: &[Accession],
        table: &mut Table,
        dropped: &mut Vec<DroppedIdentifier>,
    ) {
        let mut queue = VecDeque::new();
        queue.push_back(PendingBatch {
            ids: ids.to_vec(),
            limit: self.options.batch_size,
        });

        while let Some(batch) = queue.pop_front() {
            self.limiter.acquire();
            match self.client.search(&batch.ids, &self.options.fields) {
                Ok(body) => match Table::parse_tsv(&body).and_then(|parsed| table.append(parsed)) {
                    Ok(()) => {}
                    Err(err) => discard_batch(batch.ids, &err, dropped),
                },
                Err(MineError::UniprotStatus { status, message }) => {
                    if batch.limit == 1 {
                        warn!(status, id = %batch.ids[0], "identifier rejected at minimum batch size, dropping");
                        for id in batch.ids {
                            dropped.push(DroppedIdentifier {
                                id,
                                reason: DropReason::Rejected { status },
                            });
                        }
                    } else {
                        let half = batch.limit / 2;
                        warn!(
                            status,
                            size = batch.ids.len(),
                            half,
                            message = %message,
                            "batch rejected, splitting"
                        );
                        for sub in batch.ids.chunks(half).rev() {
                            queue.push_front(PendingBatch {
                                ids: sub.to_vec(),
                                limit: half,
                            });
                        }
                    }
                }
                Err(err) => discard_batch(batch.ids, &err, dropped),
            }
        }
    }
}

fn discard_batch(ids: Vec<Accession>, err: &MineError, dropped: &mut Vec<DroppedIdentifier>) {
    warn!(size = ids.len(), error = %err, "unclassified batch failure, dropping whole batch");
    let message = err.to_string();
    for id in ids {
        dropped.push(DroppedIdentifier {
            id,
            reason: DropReason::Discarded {
                message: message.clone(),
            },
        });
    }
}

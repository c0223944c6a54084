use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::core::catalog::Catalog;
use crate::core::error::Result;
use crate::tail::store::CatalogStore;

/// Keeps the catalog consistent with the authoritative revision log:
/// a snapshot load at startup, then strictly forward polling by change
/// sequence.
pub struct ChangeTailer {
    catalog: Arc<Catalog>,
    store: Arc<dyn CatalogStore>,
    poll: Duration,
    batch_size: i64,
}

impl ChangeTailer {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn CatalogStore>) -> Self {
        let poll = Duration::from_millis(catalog.config.poll_ms);
        let batch_size = catalog.config.poll_batch.max(1);
        ChangeTailer {
            catalog,
            store,
            poll,
            batch_size,
        }
    }

    /// Load the latest view in bulk, resort once, and position the tail
    /// at the current end of the change log.
    pub async fn bootstrap(&self) -> Result<()> {
        let started = Instant::now();
        let entries = self.store.list_latest().await?;
        let docs = entries.len();
        self.catalog.load_snapshot(entries);
        let last_seq = self.store.max_seq().await?;
        self.catalog.set_last_seq(last_seq);
        let build_ms = started.elapsed().as_millis() as u64;
        self.catalog.set_build_ms(build_ms);
        info!(docs, last_seq, build_ms, "catalog bootstrap complete");
        Ok(())
    }

    /// Poll forever. The sequential loop runs at most one cycle at a
    /// time; ticks that fire mid-cycle are skipped. A failed cycle is
    /// logged and retried on the next tick.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(err) = self.drain().await {
                warn!(error = %err, last_seq = self.catalog.last_seq(), "change tail cycle failed");
            }
        }
    }

    /// Fetch and apply batches until the log is exhausted.
    ///
    /// The tail position advances per row, after that row is handled, so
    /// a fetch error never skips past unapplied changes. Rows whose
    /// joined entry is null (pruned revisions, future retract types) only
    /// advance the sequence.
    async fn drain(&self) -> Result<()> {
        loop {
            let rows = self
                .store
                .next_changes(self.catalog.last_seq(), self.batch_size)
                .await?;
            let fetched = rows.len();
            let mut applied = 0usize;
            for row in rows {
                self.catalog.set_last_seq(row.seq);
                if let Some(entry) = row.entry {
                    if self.catalog.apply_change(entry) {
                        applied += 1;
                    }
                }
            }
            if applied > 0 {
                debug!(applied, last_seq = self.catalog.last_seq(), "applied tailed changes");
            }
            if (fetched as i64) < self.batch_size {
                return Ok(());
            }
        }
    }
}

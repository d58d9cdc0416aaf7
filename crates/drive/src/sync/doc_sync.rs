//! Document permission sync
//!
//! Streams changed documents from a [`DocumentSource`], resolves each one's
//! access and yields the records one at a time. Nothing runs in the
//! background: the caller's `next()` drives every listing page and every
//! permission fetch.

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use super::resolver::{PermissionOrigin, PermissionResolver, Resolution};
use super::{DocumentBatches, DocumentSource, PermissionCache, PermissionSource, SyncCallback, SyncWindow};
use crate::config::DriveConfig;
use crate::error::SyncError;
use crate::models::{DocExternalAccess, SlimDocument, SyncScope};

/// Label reported to [`SyncCallback::progress`]
pub const PROGRESS_LABEL: &str = "gdrive_doc_sync";

/// Statistics from a sync run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncStats {
    /// Listing pages pulled
    pub batches: usize,
    /// Access records emitted
    pub documents: usize,
    /// Documents whose permissions came inline
    pub embedded: usize,
    /// Documents resolved entirely from the permission cache
    pub cache_hits: usize,
    /// Permission fetches issued
    pub fetches: usize,
    /// Documents with no obtainable permissions, emitted as private
    pub private_fallbacks: usize,
    /// Malformed permission entries skipped across all documents
    pub skipped_entries: usize,
    /// Duration of the run so far
    pub duration_ms: u64,
}

impl SyncStats {
    fn record(&mut self, resolution: &Resolution) {
        self.documents += 1;
        match resolution.origin {
            PermissionOrigin::Embedded => self.embedded += 1,
            PermissionOrigin::Cached => self.cache_hits += 1,
            PermissionOrigin::Fetched => self.fetches += 1,
            PermissionOrigin::Unavailable => {}
        }
        if resolution.fell_back {
            self.private_fallbacks += 1;
        }
        self.skipped_entries += resolution.skipped;
    }
}

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Streaming,
    /// Listing exhausted; every document was emitted
    Done,
    Cancelled,
    /// Listing failed
    Failed,
}

/// A running permission sync, consumed as an iterator of access records.
///
/// Yields `Ok` once per listed document. A cancellation or listing failure
/// is yielded once as `Err`, after which the iterator is finished.
pub struct DocSync<'a, S> {
    source: S,
    config: DriveConfig,
    cache: Arc<PermissionCache>,
    callback: Option<&'a dyn SyncCallback>,
    window: SyncWindow,
    batches: DocumentBatches,
    pending: VecDeque<SlimDocument>,
    state: RunState,
    stats: SyncStats,
    started: Instant,
}

/// Start a permission sync for `scope`, covering changes up to now.
///
/// Authenticates once up front; listing and permission fetches happen as
/// the returned iterator is consumed.
pub fn doc_sync<'a, S>(
    source: S,
    scope: &SyncScope,
    cache: Arc<PermissionCache>,
    callback: Option<&'a dyn SyncCallback>,
) -> Result<DocSync<'a, S>, SyncError>
where
    S: DocumentSource + PermissionSource,
{
    DocSync::start(source, scope, cache, callback, Utc::now())
}

impl<'a, S> DocSync<'a, S>
where
    S: DocumentSource + PermissionSource,
{
    /// Start a sync whose window ends at `now`
    pub fn start(
        source: S,
        scope: &SyncScope,
        cache: Arc<PermissionCache>,
        callback: Option<&'a dyn SyncCallback>,
        now: DateTime<Utc>,
    ) -> Result<Self, SyncError> {
        let started = Instant::now();
        source.connect().map_err(SyncError::Connect)?;

        let window = scope.window(now);
        if window.is_empty() {
            warn!(
                "Sync watermark {} is not before {}; nothing can have changed",
                window.start, window.end
            );
        }
        info!(
            "Starting permission sync for {} from {} to {}",
            scope.config.primary_admin_email, window.start, window.end
        );
        let batches = source
            .list_changed(window.start, window.end)
            .map_err(SyncError::Upstream)?;

        Ok(Self {
            source,
            config: scope.config.clone(),
            cache,
            callback,
            window,
            batches,
            pending: VecDeque::new(),
            state: RunState::Streaming,
            stats: SyncStats::default(),
            started,
        })
    }
}

impl<S> DocSync<'_, S> {
    /// Window this run covers; `window().end` is the next watermark
    pub fn window(&self) -> SyncWindow {
        self.window
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    fn finish(&mut self, state: RunState) {
        self.state = state;
        self.stats.duration_ms = self.started.elapsed().as_millis() as u64;
        info!(
            "Permission sync {:?}: {} documents in {} batches ({} embedded, {} cache hits, {} fetches, {} private, {} entries skipped) in {}ms",
            state,
            self.stats.documents,
            self.stats.batches,
            self.stats.embedded,
            self.stats.cache_hits,
            self.stats.fetches,
            self.stats.private_fallbacks,
            self.stats.skipped_entries,
            self.stats.duration_ms
        );
    }
}

impl<S> Iterator for DocSync<'_, S>
where
    S: PermissionSource,
{
    type Item = Result<DocExternalAccess, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != RunState::Streaming {
            return None;
        }

        let doc = loop {
            if let Some(doc) = self.pending.pop_front() {
                break doc;
            }
            match self.batches.next() {
                Some(Ok(batch)) => {
                    self.stats.batches += 1;
                    self.pending.extend(batch);
                }
                Some(Err(e)) => {
                    warn!("Document listing failed: {:#}", e);
                    self.finish(RunState::Failed);
                    return Some(Err(SyncError::Upstream(e)));
                }
                None => {
                    self.finish(RunState::Done);
                    return None;
                }
            }
        };

        if let Some(callback) = self.callback
            && callback.should_stop()
        {
            self.pending.clear();
            self.finish(RunState::Cancelled);
            return Some(Err(SyncError::Cancelled));
        }

        let resolution =
            PermissionResolver::new(&self.source, &self.cache, &self.config).resolve_detailed(&doc);
        self.stats.record(&resolution);

        if let Some(callback) = self.callback {
            callback.progress(PROGRESS_LABEL, 1);
        }

        Some(Ok(DocExternalAccess::new(doc.id, resolution.access)))
    }
}

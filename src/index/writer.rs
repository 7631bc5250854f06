//! The single-writer ingest and merge pipeline.
//!
//! An [`IndexWriter`] buffers add and delete operations in memory and
//! materializes them at [`IndexWriter::commit`]: buffered documents become
//! one new immutable segment, pending deletions are folded into the
//! per-segment bitmaps, and the manifest is swapped atomically. Background
//! worker threads fold small segments into larger ones once enough of
//! them accumulate; merge failures are retried with jittered backoff and
//! poison the writer once the retry budget is exhausted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use rand::Rng;

use crate::error::{FathomError, Result};
use crate::index::{Index, IndexMeta};
use crate::query::bm25::CorpusStats;
use crate::query::eval::{EvalContext, matching_docs};
use crate::query::Query;
use crate::schema::{Document, Schema, Term};
use crate::segment::deletes::DeleteSet;
use crate::segment::merge::merge_segments;
use crate::segment::{SegmentId, SegmentMeta, SegmentReader, SegmentWriter};

/// Number of live segments that triggers a background merge.
pub const MERGE_SEGMENT_THRESHOLD: usize = 8;

const MAX_MERGE_RETRIES: u32 = 3;
const MERGE_BACKOFF_BASE_MS: u64 = 50;
const MAX_MERGE_WORKERS: usize = 4;

/// Observable writer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Accepting operations.
    Idle,
    /// A commit is materializing buffered operations.
    Committing,
    /// The last commit queued a background merge.
    MergeScheduled,
    /// An unrecoverable failure occurred; recreate the writer.
    Poisoned,
}

// A buffered operation. Deletes remember how many documents were buffered
// ahead of them so they only apply to those, never to later adds.
enum PendingOp {
    Add(Document),
    Delete { query: Query, cutoff: u32 },
}

struct MergeTask {
    segment_ids: Vec<SegmentId>,
}

// State shared with the merge workers. `meta_lock` serializes every
// load-modify-save of the manifest, including deletion bitmap rewrites.
struct Shared {
    index: Index,
    meta_lock: Mutex<()>,
    poisoned: RwLock<Option<String>>,
}

impl Shared {
    fn check_usable(&self) -> Result<()> {
        match self.poisoned.read().as_deref() {
            Some(reason) => Err(FathomError::poisoned(reason.to_string())),
            None => Ok(()),
        }
    }

    fn poison(&self, reason: String) {
        error!("index writer poisoned: {reason}");
        *self.poisoned.write() = Some(reason);
    }
}

/// The one writer of an index.
pub struct IndexWriter {
    shared: Arc<Shared>,
    schema: Schema,
    pending: Vec<PendingOp>,
    buffered_docs: u32,
    opstamp: u64,
    state: WriterState,
    merge_tx: Option<Sender<MergeTask>>,
    workers: Vec<JoinHandle<()>>,
    writer_lock: Arc<AtomicBool>,
}

impl IndexWriter {
    /// Open the writer for an index and start its merge workers. Callers
    /// go through [`Index::writer`], which enforces the single-writer
    /// slot behind `writer_lock`.
    pub(crate) fn open(index: Index, writer_lock: Arc<AtomicBool>) -> Result<IndexWriter> {
        let meta = match index.load_meta() {
            Ok(meta) => meta,
            Err(e) => {
                writer_lock.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        let schema = index.schema().clone();
        sweep_orphan_files(index.storage().as_ref(), &meta);
        let shared = Arc::new(Shared {
            index,
            meta_lock: Mutex::new(()),
            poisoned: RwLock::new(None),
        });
        let (tx, rx) = unbounded::<MergeTask>();
        let num_workers = num_cpus::get().clamp(1, MAX_MERGE_WORKERS);
        let mut workers = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let shared = shared.clone();
            let rx: Receiver<MergeTask> = rx.clone();
            workers.push(thread::spawn(move || {
                while let Ok(task) = rx.recv() {
                    run_merge_task(&shared, task);
                }
            }));
        }
        Ok(IndexWriter {
            shared,
            schema,
            pending: Vec::new(),
            buffered_docs: 0,
            opstamp: meta.opstamp,
            state: WriterState::Idle,
            merge_tx: Some(tx),
            workers,
            writer_lock,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WriterState {
        if self.shared.poisoned.read().is_some() {
            WriterState::Poisoned
        } else {
            self.state
        }
    }

    /// Opstamp of the most recent operation.
    pub fn opstamp(&self) -> u64 {
        self.opstamp
    }

    /// Buffer a document for the next commit. Validation failures reject
    /// this document only; already-buffered operations are unaffected.
    pub fn add_document(&mut self, doc: Document) -> Result<u64> {
        self.shared.check_usable()?;
        validate_document(&self.schema, &doc)?;
        self.pending.push(PendingOp::Add(doc));
        self.buffered_docs += 1;
        self.opstamp += 1;
        Ok(self.opstamp)
    }

    /// Mark every live document containing `term` for deletion at the
    /// next commit. Returns the number of committed documents matched.
    pub fn delete_documents_by_term(&mut self, term: Term) -> Result<u64> {
        self.delete_documents_by_query(Query::Term(term))
    }

    /// Mark every live document matched by `query` for deletion at the
    /// next commit. Returns the number of committed documents matched.
    pub fn delete_documents_by_query(&mut self, query: Query) -> Result<u64> {
        self.shared.check_usable()?;
        let matched = {
            let _guard = self.shared.meta_lock.lock();
            let (_, segments) = self.open_committed()?;
            count_matches(&self.shared.index, &segments, &query)?
        };
        self.pending.push(PendingOp::Delete {
            query,
            cutoff: self.buffered_docs,
        });
        self.opstamp += 1;
        Ok(matched)
    }

    /// Mark every document, committed or buffered, for deletion at the
    /// next commit. Returns the number of documents matched.
    pub fn delete_all_documents(&mut self) -> Result<u64> {
        self.shared.check_usable()?;
        let committed = {
            let _guard = self.shared.meta_lock.lock();
            IndexMeta::load(self.shared.index.storage().as_ref())?.num_docs()
        };
        let matched = committed + self.buffered_docs as u64;
        self.pending.push(PendingOp::Delete {
            query: Query::All,
            cutoff: self.buffered_docs,
        });
        self.opstamp += 1;
        Ok(matched)
    }

    /// Discard all buffered operations. Returns the opstamp of the last
    /// commit.
    pub fn rollback(&mut self) -> Result<u64> {
        self.shared.check_usable()?;
        self.pending.clear();
        self.buffered_docs = 0;
        let meta = self.shared.index.load_meta()?;
        self.opstamp = meta.opstamp;
        self.state = WriterState::Idle;
        Ok(self.opstamp)
    }

    /// Materialize all buffered operations into a new committed state and
    /// publish it atomically. On error the buffer is kept so the whole
    /// commit can be retried.
    pub fn commit(&mut self) -> Result<u64> {
        self.shared.check_usable()?;
        self.state = WriterState::Committing;
        let commit_stamp = self.opstamp + 1;

        let result = self.commit_inner(commit_stamp);
        match result {
            Ok(num_segments) => {
                self.pending.clear();
                self.buffered_docs = 0;
                self.opstamp = commit_stamp;
                self.state = if self.maybe_schedule_merge(num_segments) {
                    WriterState::MergeScheduled
                } else {
                    WriterState::Idle
                };
                Ok(commit_stamp)
            }
            Err(e) => {
                self.state = WriterState::Idle;
                Err(e)
            }
        }
    }

    // Runs the whole commit under the manifest lock. Returns the number
    // of live segments after publishing.
    fn commit_inner(&mut self, commit_stamp: u64) -> Result<usize> {
        let _guard = self.shared.meta_lock.lock();
        let storage = self.shared.index.storage().clone();
        let (mut meta, committed) = self.open_committed()?;

        // Flush buffered documents into one fresh segment.
        let new_segment = if self.buffered_docs > 0 {
            let mut segment_writer =
                SegmentWriter::new(self.schema.clone(), self.shared.index.registry_handle());
            for op in &self.pending {
                if let PendingOp::Add(doc) = op {
                    segment_writer.add_document(doc)?;
                }
            }
            let segment_meta = segment_writer.flush(storage.as_ref())?;
            let reader = SegmentReader::open(storage.as_ref(), &segment_meta, self.schema.clone())?;
            Some(Arc::new(reader))
        } else {
            None
        };

        let stats = CorpusStats::from_segments(&committed);
        let registry = self.shared.index.registry_handle();
        let ctx = EvalContext {
            schema: &self.schema,
            registry: &registry,
            stats: &stats,
            segments: &committed,
        };

        // Fold pending deletions into each committed segment's bitmap.
        let mut updated: Vec<SegmentMeta> = Vec::with_capacity(meta.segments.len() + 1);
        for reader in &committed {
            let mut deletes = reader.deletes().clone();
            for op in &self.pending {
                if let PendingOp::Delete { query, .. } = op {
                    for doc_id in matching_docs(&ctx, reader, query)? {
                        deletes.delete(doc_id);
                    }
                }
            }
            let mut segment_meta = *reader.meta();
            if deletes.num_deleted() != segment_meta.num_deleted {
                segment_meta.num_deleted = deletes.num_deleted();
                if segment_meta.num_alive() == 0 {
                    remove_segment_files(storage.as_ref(), &segment_meta);
                    continue;
                }
                storage.atomic_write(&segment_meta.deletes_file(), &deletes.to_bytes())?;
            }
            updated.push(segment_meta);
        }

        // Deletions buffered after an add apply to it; later adds survive.
        if let Some(reader) = new_segment {
            let mut deletes = DeleteSet::new(reader.max_doc());
            let new_ctx = EvalContext {
                schema: &self.schema,
                registry: &registry,
                stats: &stats,
                segments: std::slice::from_ref(&reader),
            };
            for op in &self.pending {
                if let PendingOp::Delete { query, cutoff } = op {
                    for doc_id in matching_docs(&new_ctx, &reader, query)? {
                        if doc_id < *cutoff {
                            deletes.delete(doc_id);
                        }
                    }
                }
            }
            let mut segment_meta = *reader.meta();
            segment_meta.num_deleted = deletes.num_deleted();
            if segment_meta.num_alive() == 0 {
                remove_segment_files(storage.as_ref(), &segment_meta);
            } else {
                if deletes.num_deleted() > 0 {
                    storage.atomic_write(&segment_meta.deletes_file(), &deletes.to_bytes())?;
                }
                updated.push(segment_meta);
            }
        }

        meta.segments = updated;
        meta.opstamp = commit_stamp;
        meta.save(storage.as_ref())?;
        debug!(
            "committed opstamp {commit_stamp}: {} segments, {} docs",
            meta.segments.len(),
            meta.num_docs()
        );
        Ok(meta.segments.len())
    }

    fn maybe_schedule_merge(&self, num_segments: usize) -> bool {
        if num_segments < MERGE_SEGMENT_THRESHOLD {
            return false;
        }
        let Some(tx) = &self.merge_tx else {
            return false;
        };
        let meta = match self.shared.index.load_meta() {
            Ok(meta) => meta,
            Err(e) => {
                warn!("skipping merge scheduling: {e}");
                return false;
            }
        };
        let segment_ids = meta.segments.iter().map(|s| s.id).collect::<Vec<_>>();
        info!("scheduling merge of {} segments", segment_ids.len());
        tx.send(MergeTask { segment_ids }).is_ok()
    }

    fn open_committed(&self) -> Result<(IndexMeta, Vec<Arc<SegmentReader>>)> {
        let storage = self.shared.index.storage();
        let meta = IndexMeta::load(storage.as_ref())?;
        let mut readers = Vec::with_capacity(meta.segments.len());
        for segment_meta in &meta.segments {
            readers.push(Arc::new(SegmentReader::open(
                storage.as_ref(),
                segment_meta,
                meta.schema.clone(),
            )?));
        }
        Ok((meta, readers))
    }

    /// Block until every queued merge has finished, then dispose of the
    /// writer. This consumes the writer; reopen the index to write again.
    pub fn wait_merging_threads(mut self) -> Result<()> {
        self.merge_tx = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                self.shared.poison("merge worker panicked".to_string());
            }
        }
        self.shared.check_usable()
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        self.merge_tx = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        self.writer_lock.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("state", &self.state())
            .field("opstamp", &self.opstamp)
            .field("buffered_docs", &self.buffered_docs)
            .finish()
    }
}

fn validate_document(schema: &Schema, doc: &Document) -> Result<()> {
    for field_value in doc.field_values() {
        if field_value.field.ord() as usize >= schema.num_fields() {
            return Err(FathomError::schema(format!(
                "Unknown field ordinal {}",
                field_value.field.ord()
            )));
        }
        let entry = schema.get_field_entry(field_value.field);
        if !entry.field_type.accepts(&field_value.value) {
            return Err(FathomError::schema(format!(
                "Field `{}` of type {} rejects value {:?}",
                entry.name,
                entry.field_type.name(),
                field_value.value
            )));
        }
    }
    Ok(())
}

fn count_matches(
    index: &Index,
    segments: &[Arc<SegmentReader>],
    query: &Query,
) -> Result<u64> {
    let stats = CorpusStats::from_segments(segments);
    let registry = index.registry_handle();
    let ctx = EvalContext {
        schema: index.schema(),
        registry: &registry,
        stats: &stats,
        segments,
    };
    let mut matched = 0u64;
    for segment in segments {
        matched += matching_docs(&ctx, segment, query)?.len() as u64;
    }
    Ok(matched)
}

fn run_merge_task(shared: &Shared, task: MergeTask) {
    for attempt in 0..MAX_MERGE_RETRIES {
        match try_merge(shared, &task) {
            Ok(merged) => {
                if merged {
                    debug!("merge of {} segments finished", task.segment_ids.len());
                }
                return;
            }
            Err(e) => {
                warn!(
                    "merge attempt {}/{MAX_MERGE_RETRIES} failed: {e}",
                    attempt + 1
                );
                if let Some(delay) = merge_backoff(attempt) {
                    thread::sleep(delay);
                }
            }
        }
    }
    shared.poison(format!(
        "merge failed after {MAX_MERGE_RETRIES} attempts"
    ));
}

/// Jittered exponential delay before the next merge retry, or `None`
/// after the final attempt so the writer poisons without sleeping.
fn merge_backoff(attempt: u32) -> Option<Duration> {
    if attempt + 1 >= MAX_MERGE_RETRIES {
        return None;
    }
    let jitter = rand::rng().random_range(0..MERGE_BACKOFF_BASE_MS);
    Some(Duration::from_millis(
        MERGE_BACKOFF_BASE_MS * (1 << attempt) + jitter,
    ))
}

// Merges the task's segments under the manifest lock so commits cannot
// change deletion bitmaps underneath the merge.
fn try_merge(shared: &Shared, task: &MergeTask) -> Result<bool> {
    let _guard = shared.meta_lock.lock();
    let storage = shared.index.storage();
    let mut meta = IndexMeta::load(storage.as_ref())?;

    // Only merge segments still present in the manifest.
    let sources: Vec<SegmentMeta> = meta
        .segments
        .iter()
        .filter(|s| task.segment_ids.contains(&s.id))
        .copied()
        .collect();
    if sources.len() < 2 {
        return Ok(false);
    }

    let mut readers = Vec::with_capacity(sources.len());
    for source in &sources {
        readers.push(Arc::new(SegmentReader::open(
            storage.as_ref(),
            source,
            meta.schema.clone(),
        )?));
    }
    let merged = merge_segments(storage.as_ref(), &meta.schema, &readers)?;

    meta.segments.retain(|s| !task.segment_ids.contains(&s.id));
    meta.segments.push(merged);
    meta.save(storage.as_ref())?;
    for source in &sources {
        remove_segment_files(storage.as_ref(), source);
    }
    Ok(true)
}

// Deleting a mapped or open file is safe on the backends we support;
// existing readers keep their data until dropped.
fn remove_segment_files(storage: &dyn crate::storage::Storage, meta: &SegmentMeta) {
    for name in meta.file_names() {
        if let Err(e) = storage.delete_file(&name) {
            warn!("failed to delete {name}: {e}");
        }
    }
}

const SEGMENT_FILE_SUFFIXES: [&str; 5] = ["term", "post", "store", "fast", "del"];

// Removes segment files not referenced by the manifest, left behind when
// a previous writer stopped between a manifest swap and the unlink of
// its retired segments. Runs once per writer open; failures only warn,
// the next open retries.
fn sweep_orphan_files(storage: &dyn crate::storage::Storage, meta: &IndexMeta) {
    let files = match storage.list_files() {
        Ok(files) => files,
        Err(e) => {
            warn!("orphan sweep skipped: {e}");
            return;
        }
    };
    for name in files {
        let Some((stem, suffix)) = name.rsplit_once('.') else {
            continue;
        };
        if !SEGMENT_FILE_SUFFIXES.contains(&suffix) {
            continue;
        }
        let Some(id) = SegmentId::from_str_id(stem) else {
            continue;
        };
        if meta.segments.iter().any(|s| s.id == id) {
            continue;
        }
        info!("removing orphaned segment file {name}");
        if let Err(e) = storage.delete_file(&name) {
            warn!("failed to delete {name}: {e}");
        }
    }
}

//! Record Pane Cache
//!
//! Models the left-to-right sequence of "currently inspected" records. Opening
//! a record at pane index *k* replaces everything from *k* onward, like a
//! breadcrumb trail; it is not a general window manager, and the same id may
//! be open at several positions.
//!
//! # Fetching
//!
//! Fetched records are memoized for the whole session (the dataset is bounded,
//! nothing is evicted). Ids that turn out not to exist are remembered too:
//! not-found is permanent within a session.
//!
//! A fetch may still be in flight when the stack is truncated or the pane is
//! re-targeted. Every placeholder carries a ticket, and a completion is applied
//! only if the pane at its position still holds the same id and ticket.
//! Superseded results are dropped (after memoizing them); the underlying
//! request is not aborted.
//!
//! # Failures
//!
//! Transport failures mark the pane as failed and are returned to the caller,
//! who retries by calling `open` again at the same position. The cache never
//! retries on its own. A failure in one pane never touches the others.
//!
//! # Examples
//!
//! ```rust
//! use guildscope_core::db::InMemoryRecordStore;
//! use guildscope_core::models::{rank, Record};
//! use guildscope_core::services::{OpenOutcome, RecordPaneCache};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryRecordStore::new(vec![
//!     Record::new("G1", "Amanita", rank::GENUS, None),
//! ]));
//! let panes = RecordPaneCache::new(store);
//!
//! assert!(matches!(panes.open("G1", 0).await?, OpenOutcome::Rendered(_)));
//! assert!(matches!(panes.open("nope", 1).await?, OpenOutcome::NotFound));
//! assert_eq!(panes.len().await, 2);
//! # Ok(())
//! # }
//! ```

use crate::db::RecordFetcher;
use crate::models::Record;
use crate::services::error::ServiceError;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

/// Broadcast channel capacity for pane events.
///
/// Observers only track the current stack, so lagging is acceptable.
const PANE_EVENT_CHANNEL_CAPACITY: usize = 64;

/// What a pane currently shows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "camelCase")]
pub enum PaneState {
    /// Placeholder while the record is fetched
    Loading,
    /// Full record view
    Ready(Arc<Record>),
    /// Terminal: the id does not exist
    NotFound,
    /// Fetch failed; re-open the same position to retry
    Failed(String),
}

/// One slot of the navigation stack
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneEntry {
    pub position: usize,
    pub key: String,
    pub state: PaneState,
    #[serde(skip)]
    ticket: u64,
}

impl PaneEntry {
    /// The loaded record, if this pane is ready
    pub fn record(&self) -> Option<&Arc<Record>> {
        match &self.state {
            PaneState::Ready(record) => Some(record),
            _ => None,
        }
    }
}

/// Signals for the surrounding UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PaneEvent {
    /// Bring the pane at `position` into view
    Focus { position: usize },
    /// Everything at or after `from` was discarded
    Truncated { from: usize },
    /// The pane at `position` now shows the record
    Rendered { position: usize, id: String },
    /// The pane at `position` is a terminal not-found pane
    NotFound { position: usize, id: String },
    /// Fetching `id` for `position` failed
    FetchFailed {
        position: usize,
        id: String,
        message: String,
    },
}

/// Result of [`RecordPaneCache::open`]
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    /// The pane shows the record
    Rendered(Arc<Record>),
    /// The pane is a terminal not-found pane
    NotFound,
    /// The pane already showed (or was already loading) this id; nothing fetched
    Unchanged,
    /// The pane was truncated or re-targeted before the fetch completed
    Superseded,
}

#[derive(Default)]
struct PaneStack {
    entries: Vec<PaneEntry>,
    memo: HashMap<String, Arc<Record>>,
    missing: HashSet<String>,
    next_ticket: u64,
}

impl PaneStack {
    fn truncate(&mut self, len: usize) -> bool {
        if self.entries.len() > len {
            self.entries.truncate(len);
            true
        } else {
            false
        }
    }

    fn push(&mut self, key: &str, state: PaneState) -> u64 {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.entries.push(PaneEntry {
            position: self.entries.len(),
            key: key.to_string(),
            state,
            ticket,
        });
        ticket
    }

    /// The pane at `position` if it is still waiting on `ticket` for `key`
    fn pending_slot(&mut self, position: usize, key: &str, ticket: u64) -> Option<&mut PaneEntry> {
        self.entries
            .get_mut(position)
            .filter(|e| e.key == key && e.ticket == ticket && e.state == PaneState::Loading)
    }
}

/// Address-indexed, lazily fetched stack of open record panes
pub struct RecordPaneCache {
    fetcher: Arc<dyn RecordFetcher>,
    stack: RwLock<PaneStack>,
    event_tx: broadcast::Sender<PaneEvent>,
}

impl RecordPaneCache {
    /// Create an empty cache fetching through `fetcher`
    pub fn new(fetcher: Arc<dyn RecordFetcher>) -> Self {
        let (event_tx, _) = broadcast::channel(PANE_EVENT_CHANNEL_CAPACITY);
        Self {
            fetcher,
            stack: RwLock::new(PaneStack::default()),
            event_tx,
        }
    }

    /// Subscribe to pane events
    pub fn subscribe(&self) -> broadcast::Receiver<PaneEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: PaneEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Open `id` at `position`, discarding every pane from `position` onward.
    ///
    /// Positions past the end of the stack append a new pane. Re-opening the
    /// id already shown (or loading) at `position` only drops the panes after
    /// it and refocuses; a failed pane is fetched again.
    pub async fn open(&self, id: &str, position: usize) -> Result<OpenOutcome, ServiceError> {
        let (position, ticket) = {
            let mut stack = self.stack.write().await;
            let position = position.min(stack.entries.len());

            let reusable = stack
                .entries
                .get(position)
                .is_some_and(|e| e.key == id && !matches!(e.state, PaneState::Failed(_)));
            if reusable {
                if stack.truncate(position + 1) {
                    self.emit(PaneEvent::Truncated { from: position + 1 });
                }
                debug!("Pane {} already holds {}, refocusing", position, id);
                self.emit(PaneEvent::Focus { position });
                return Ok(OpenOutcome::Unchanged);
            }

            if stack.truncate(position) {
                self.emit(PaneEvent::Truncated { from: position });
            }

            if let Some(record) = stack.memo.get(id).cloned() {
                debug!("Pane {}: memo hit for {}", position, id);
                stack.push(id, PaneState::Ready(record.clone()));
                self.emit(PaneEvent::Focus { position });
                self.emit(PaneEvent::Rendered {
                    position,
                    id: id.to_string(),
                });
                return Ok(OpenOutcome::Rendered(record));
            }

            if stack.missing.contains(id) {
                stack.push(id, PaneState::NotFound);
                self.emit(PaneEvent::Focus { position });
                self.emit(PaneEvent::NotFound {
                    position,
                    id: id.to_string(),
                });
                return Ok(OpenOutcome::NotFound);
            }

            let ticket = stack.push(id, PaneState::Loading);
            self.emit(PaneEvent::Focus { position });
            (position, ticket)
        };

        debug!("Pane {}: fetching {}", position, id);
        let fetched = self.fetcher.fetch(id).await;

        let mut stack = self.stack.write().await;
        match fetched {
            Ok(Some(record)) => {
                stack.memo.insert(id.to_string(), record.clone());
                let Some(slot) = stack.pending_slot(position, id, ticket) else {
                    debug!("Pane {}: discarding superseded fetch of {}", position, id);
                    return Ok(OpenOutcome::Superseded);
                };
                slot.state = PaneState::Ready(record.clone());
                self.emit(PaneEvent::Rendered {
                    position,
                    id: id.to_string(),
                });
                Ok(OpenOutcome::Rendered(record))
            }
            Ok(None) => {
                stack.missing.insert(id.to_string());
                let Some(slot) = stack.pending_slot(position, id, ticket) else {
                    return Ok(OpenOutcome::Superseded);
                };
                slot.state = PaneState::NotFound;
                self.emit(PaneEvent::NotFound {
                    position,
                    id: id.to_string(),
                });
                Ok(OpenOutcome::NotFound)
            }
            Err(e) => {
                let message = e.to_string();
                let Some(slot) = stack.pending_slot(position, id, ticket) else {
                    return Ok(OpenOutcome::Superseded);
                };
                warn!("Pane {}: failed to fetch {}: {}", position, id, message);
                slot.state = PaneState::Failed(message.clone());
                self.emit(PaneEvent::FetchFailed {
                    position,
                    id: id.to_string(),
                    message: message.clone(),
                });
                Err(ServiceError::transport(format!(
                    "Failed to fetch record {}: {}",
                    id, message
                )))
            }
        }
    }

    /// Close every pane at or after `position`
    pub async fn truncate(&self, position: usize) {
        let mut stack = self.stack.write().await;
        if stack.truncate(position) {
            self.emit(PaneEvent::Truncated { from: position });
        }
    }

    /// Number of open panes
    pub async fn len(&self) -> usize {
        self.stack.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The pane at `position`
    pub async fn entry(&self, position: usize) -> Option<PaneEntry> {
        self.stack.read().await.entries.get(position).cloned()
    }

    /// Every open pane, left to right
    pub async fn snapshot(&self) -> Vec<PaneEntry> {
        self.stack.read().await.entries.clone()
    }

    /// The memoized record for `id`, if it has been fetched this session
    pub async fn memoized(&self, id: &str) -> Option<Arc<Record>> {
        self.stack.read().await.memo.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryRecordStore;
    use crate::models::rank;

    fn cache() -> RecordPaneCache {
        RecordPaneCache::new(Arc::new(InMemoryRecordStore::new(vec![
            Record::new("G1", "Amanita", rank::GENUS, None),
            Record::new("S1", "Amanita muscaria", rank::SPECIES, Some("G1".into())),
            Record::new("S2", "Amanita phalloides", rank::SPECIES, Some("G1".into())),
        ])))
    }

    fn keys(entries: &[PaneEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_open_truncates_from_position() {
        let panes = cache();
        panes.open("G1", 0).await.unwrap();
        panes.open("S1", 1).await.unwrap();
        panes.open("S2", 2).await.unwrap();

        panes.open("S2", 1).await.unwrap();
        let snapshot = panes.snapshot().await;
        assert_eq!(keys(&snapshot), vec!["G1", "S2"]);
        assert_eq!(snapshot[1].position, 1);
    }

    #[tokio::test]
    async fn test_position_past_end_appends() {
        let panes = cache();
        panes.open("G1", 0).await.unwrap();
        panes.open("S1", 7).await.unwrap();

        let snapshot = panes.snapshot().await;
        assert_eq!(keys(&snapshot), vec!["G1", "S1"]);
        assert_eq!(snapshot[1].position, 1);
    }

    #[tokio::test]
    async fn test_same_id_may_occupy_several_positions() {
        let panes = cache();
        panes.open("G1", 0).await.unwrap();
        panes.open("S1", 1).await.unwrap();
        panes.open("G1", 2).await.unwrap();

        assert_eq!(keys(&panes.snapshot().await), vec!["G1", "S1", "G1"]);
    }

    #[tokio::test]
    async fn test_reopen_same_position_keeps_pane_and_drops_later_ones() {
        let panes = cache();
        panes.open("G1", 0).await.unwrap();
        panes.open("S1", 1).await.unwrap();

        assert_eq!(panes.open("G1", 0).await.unwrap(), OpenOutcome::Unchanged);
        assert_eq!(keys(&panes.snapshot().await), vec!["G1"]);
    }

    #[tokio::test]
    async fn test_not_found_is_terminal_pane() {
        let panes = cache();
        panes.open("G1", 0).await.unwrap();
        assert_eq!(panes.open("ghost", 1).await.unwrap(), OpenOutcome::NotFound);
        assert_eq!(panes.entry(1).await.unwrap().state, PaneState::NotFound);
        // The neighbouring pane is untouched
        assert!(panes.entry(0).await.unwrap().record().is_some());
    }

    #[tokio::test]
    async fn test_events_emitted_for_open() {
        let panes = cache();
        let mut events = panes.subscribe();
        panes.open("G1", 0).await.unwrap();

        assert_eq!(events.recv().await.unwrap(), PaneEvent::Focus { position: 0 });
        assert_eq!(
            events.recv().await.unwrap(),
            PaneEvent::Rendered {
                position: 0,
                id: "G1".into()
            }
        );
    }

    #[tokio::test]
    async fn test_explicit_truncate() {
        let panes = cache();
        panes.open("G1", 0).await.unwrap();
        panes.open("S1", 1).await.unwrap();
        panes.truncate(1).await;
        assert_eq!(panes.len().await, 1);
        assert!(panes.memoized("S1").await.is_some());
    }
}

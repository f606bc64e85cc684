/// Timed items and the commit sink they are persisted through
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::{fmt, ops::BitOr};
use tracing::debug;
use uuid::Uuid;

use crate::{Ms, Result, TimingError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A timed subtitle line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    #[serde(default)]
    pub id: ItemId,
    pub start: Ms,
    pub end: Ms,
    #[serde(default)]
    pub text: String,
}

impl Item {
    pub fn new(start: Ms, end: Ms, text: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            start,
            end,
            text: text.into(),
        }
    }

    /// A line that has never been timed.
    pub fn untimed() -> Self {
        Self::new(0, 0, "")
    }
}

/// What a commit changed. Flags combine with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CommitType(u32);

impl CommitType {
    pub const TIMING: CommitType = CommitType(1 << 0);
    pub const ADD_REMOVE: CommitType = CommitType(1 << 1);
    pub const TEXT: CommitType = CommitType(1 << 2);

    pub fn contains(self, other: CommitType) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CommitType {
    type Output = CommitType;

    fn bitor(self, rhs: CommitType) -> CommitType {
        CommitType(self.0 | rhs.0)
    }
}

/// Identifies one undo-history entry. Automatic commits passing the same id
/// back are merged into that entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(pub u64);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Broadcast after every change to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileChanged {
    pub change: CommitType,
    pub commit: CommitId,
}

/// The subtitle document as seen by the timing controller.
pub trait Document {
    fn item(&self, id: ItemId) -> Option<&Item>;

    fn item_mut(&mut self, id: ItemId) -> Option<&mut Item>;

    /// First item, in document order, whose `[start, end]` contains `ms`.
    fn item_at(&self, ms: Ms) -> Option<ItemId>;

    fn next_item(&self, id: ItemId) -> Option<ItemId>;

    fn prev_item(&self, id: ItemId) -> Option<ItemId>;

    /// Insert `item` right after `after` (or at the end when `after` is
    /// `None` or unknown) and announce it as an add/remove change.
    fn insert_item_after(&mut self, after: Option<ItemId>, item: Item) -> ItemId;

    /// Persist the current item state as a history entry.
    ///
    /// With `coalesce` naming the newest entry the change is merged into it
    /// and the same id comes back; otherwise a new entry is created.
    /// `amend` names the single item touched, when there is exactly one.
    fn commit(
        &mut self,
        reason: &str,
        change: CommitType,
        coalesce: Option<CommitId>,
        amend: Option<ItemId>,
    ) -> CommitId;

    /// Receive a [`FileChanged`] for every later change.
    fn subscribe(&mut self) -> Receiver<FileChanged>;
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: CommitId,
    pub reason: String,
    pub change: CommitType,
    /// Item touched by every commit merged into this entry, if only one was.
    pub amended: Option<ItemId>,
    /// Merged automatic commits, including the first.
    pub merged: usize,
    before: Vec<Item>,
}

/// In-memory subtitle script with a snapshot undo history.
#[derive(Debug, Default)]
pub struct Script {
    items: Vec<Item>,
    committed: Vec<Item>,
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    next_commit: u64,
    subscribers: Vec<Sender<FileChanged>>,
}

impl Script {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            committed: items.clone(),
            items,
            ..Self::default()
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.undo_stack
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn allocate_commit(&mut self) -> CommitId {
        self.next_commit += 1;
        CommitId(self.next_commit)
    }

    fn notify(&mut self, change: CommitType, commit: CommitId) {
        let event = FileChanged { change, commit };
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    pub fn undo(&mut self) -> Result<CommitId> {
        let entry = self
            .undo_stack
            .pop()
            .ok_or(TimingError::HistoryEmpty("undo stack"))?;
        let restored = self.swap_snapshot(entry);
        let (change, id) = (restored.change, restored.id);
        self.redo_stack.push(restored);
        debug!(commit = %id, "undo");
        self.notify(change, id);
        Ok(id)
    }

    pub fn redo(&mut self) -> Result<CommitId> {
        let entry = self
            .redo_stack
            .pop()
            .ok_or(TimingError::HistoryEmpty("redo stack"))?;
        let restored = self.swap_snapshot(entry);
        let (change, id) = (restored.change, restored.id);
        self.undo_stack.push(restored);
        debug!(commit = %id, "redo");
        self.notify(change, id);
        Ok(id)
    }

    /// Remove an item and announce it as an add/remove change.
    pub fn remove_item(&mut self, id: ItemId) -> Result<Item> {
        let idx = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or(TimingError::ItemNotFound(id))?;
        let item = self.items.remove(idx);
        self.commit("line removal", CommitType::ADD_REMOVE, None, None);
        Ok(item)
    }

    /// Install the entry's snapshot and hand back an entry holding the
    /// state it replaced.
    fn swap_snapshot(&mut self, mut entry: HistoryEntry) -> HistoryEntry {
        let current = std::mem::replace(&mut self.items, std::mem::take(&mut entry.before));
        self.committed = self.items.clone();
        entry.before = current;
        entry
    }
}

impl Document for Script {
    fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    fn item_at(&self, ms: Ms) -> Option<ItemId> {
        self.items
            .iter()
            .find(|i| ms >= i.start && ms <= i.end)
            .map(|i| i.id)
    }

    fn next_item(&self, id: ItemId) -> Option<ItemId> {
        let idx = self.items.iter().position(|i| i.id == id)?;
        self.items.get(idx + 1).map(|i| i.id)
    }

    fn prev_item(&self, id: ItemId) -> Option<ItemId> {
        let idx = self.items.iter().position(|i| i.id == id)?;
        idx.checked_sub(1)
            .and_then(|prev| self.items.get(prev))
            .map(|i| i.id)
    }

    fn insert_item_after(&mut self, after: Option<ItemId>, item: Item) -> ItemId {
        let id = item.id;
        let idx = self
            .items
            .iter()
            .position(|i| Some(i.id) == after)
            .map(|i| i + 1)
            .unwrap_or(self.items.len());
        self.items.insert(idx, item);
        self.commit("line insertion", CommitType::ADD_REMOVE, None, None);
        id
    }

    fn commit(
        &mut self,
        reason: &str,
        change: CommitType,
        coalesce: Option<CommitId>,
        amend: Option<ItemId>,
    ) -> CommitId {
        let snapshot = self.items.clone();
        self.redo_stack.clear();

        if let Some(top) = self
            .undo_stack
            .last_mut()
            .filter(|top| Some(top.id) == coalesce)
        {
            if top.amended != amend {
                top.amended = None;
            }
            top.merged += 1;
            let id = top.id;
            self.committed = snapshot;
            debug!(commit = %id, reason, "amended history entry");
            self.notify(change, id);
            return id;
        }

        let id = self.allocate_commit();
        let before = std::mem::replace(&mut self.committed, snapshot);
        self.undo_stack.push(HistoryEntry {
            id,
            reason: reason.to_string(),
            change,
            amended: amend,
            merged: 1,
            before,
        });
        debug!(commit = %id, reason, "new history entry");
        self.notify(change, id);
        id
    }

    fn subscribe(&mut self) -> Receiver<FileChanged> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }
}

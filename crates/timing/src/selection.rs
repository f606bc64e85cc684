/// Active item and multi-selection tracking
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::BTreeSet;

use crate::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    ActiveChanged,
    SelectionChanged,
}

/// Source of the active item and the selected set.
pub trait SelectionController {
    fn active_item(&self) -> Option<ItemId>;

    /// Every selected item, possibly including the active one.
    fn selected_items(&self) -> Vec<ItemId>;

    fn set_selection_and_active(&mut self, selected: Vec<ItemId>, active: Option<ItemId>);

    /// Receive a [`SelectionEvent`] for every later change.
    fn subscribe(&mut self) -> Receiver<SelectionEvent>;
}

#[derive(Debug, Default)]
pub struct Selection {
    active: Option<ItemId>,
    selected: BTreeSet<ItemId>,
    subscribers: Vec<Sender<SelectionEvent>>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a single item and make it active.
    pub fn select_single(&mut self, id: ItemId) {
        self.set_selection_and_active(vec![id], Some(id));
    }

    /// Add to the selection without changing the active item.
    pub fn add_to_selection(&mut self, id: ItemId) {
        if self.selected.insert(id) {
            self.notify(SelectionEvent::SelectionChanged);
        }
    }

    pub fn remove_from_selection(&mut self, id: ItemId) {
        if self.selected.remove(&id) {
            self.notify(SelectionEvent::SelectionChanged);
        }
    }

    pub fn is_selected(&self, id: &ItemId) -> bool {
        self.selected.contains(id)
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    fn notify(&mut self, event: SelectionEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

impl SelectionController for Selection {
    fn active_item(&self) -> Option<ItemId> {
        self.active
    }

    fn selected_items(&self) -> Vec<ItemId> {
        self.selected.iter().copied().collect()
    }

    fn set_selection_and_active(&mut self, selected: Vec<ItemId>, active: Option<ItemId>) {
        let selected: BTreeSet<ItemId> = selected.into_iter().collect();
        if selected != self.selected {
            self.selected = selected;
            self.notify(SelectionEvent::SelectionChanged);
        }
        if active != self.active {
            self.active = active;
            self.notify(SelectionEvent::ActiveChanged);
        }
    }

    fn subscribe(&mut self) -> Receiver<SelectionEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }
}

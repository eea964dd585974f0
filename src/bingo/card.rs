//! Card state: the selected grid, the pin/exclude constraint sets and the
//! marked cells. All membership tests are keyed by item id.

use std::rc::Rc;

use crate::bingo::extract::{self, Constraints};
use crate::bingo::rng::CardRng;
use crate::catalog::{Catalog, Item};
use crate::error::BingoError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardState {
    /// Grid contents in display order.
    pub selected: Vec<Rc<Item>>,
    pub pinned: Vec<Rc<Item>>,
    pub excluded: Vec<Rc<Item>>,
    pub exclude_variants: bool,
    pub exclude_premium: bool,
    /// Marked item ids, in the order they were marked.
    pub active: Vec<String>,
}

impl CardState {
    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|item| item.id == id)
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.pinned.iter().any(|item| item.id == id)
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        self.excluded.iter().any(|item| item.id == id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.iter().any(|a| a == id)
    }

    pub fn constraints(&self) -> Constraints<'_> {
        Constraints {
            pinned: &self.pinned,
            excluded: &self.excluded,
            exclude_variants: self.exclude_variants,
            exclude_premium: self.exclude_premium,
        }
    }
}

/// Which of the two lists a constraint operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintList {
    Pinned,
    Excluded,
}

/// One card owned by a session slot.
#[derive(Debug, Clone, Default)]
pub struct BingoCard {
    state: CardState,
}

impl BingoCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CardState {
        &self.state
    }

    /// Draw a fresh grid. On error the card is left as it was.
    pub fn extract(
        &mut self,
        catalog: &Catalog,
        rng: &mut CardRng,
        card_size: usize,
    ) -> Result<(), BingoError> {
        let selected = extract::extract(catalog, &self.state.constraints(), rng, card_size)?;
        self.state.selected = selected;
        self.state.active.clear();
        Ok(())
    }

    /// Add to the pinned list. Returns false if the id was already there.
    pub fn pin(&mut self, item: Rc<Item>) -> bool {
        add_unique(&mut self.state.pinned, item)
    }

    pub fn unpin(&mut self, id: &str) -> bool {
        remove_id(&mut self.state.pinned, id)
    }

    /// Add to the excluded list. Returns false if the id was already there.
    pub fn exclude(&mut self, item: Rc<Item>) -> bool {
        add_unique(&mut self.state.excluded, item)
    }

    pub fn unexclude(&mut self, id: &str) -> bool {
        remove_id(&mut self.state.excluded, id)
    }

    pub fn add(&mut self, list: ConstraintList, item: Rc<Item>) -> bool {
        match list {
            ConstraintList::Pinned => self.pin(item),
            ConstraintList::Excluded => self.exclude(item),
        }
    }

    pub fn remove(&mut self, list: ConstraintList, id: &str) -> bool {
        match list {
            ConstraintList::Pinned => self.unpin(id),
            ConstraintList::Excluded => self.unexclude(id),
        }
    }

    pub fn set_exclude_variants(&mut self, value: bool) {
        self.state.exclude_variants = value;
    }

    pub fn set_exclude_premium(&mut self, value: bool) {
        self.state.exclude_premium = value;
    }

    pub fn toggle_exclude_variants(&mut self) -> bool {
        self.state.exclude_variants = !self.state.exclude_variants;
        self.state.exclude_variants
    }

    pub fn toggle_exclude_premium(&mut self) -> bool {
        self.state.exclude_premium = !self.state.exclude_premium;
        self.state.exclude_premium
    }

    /// Flip the marked state of a cell. Returns the new membership.
    pub fn toggle(&mut self, id: &str) -> Result<bool, BingoError> {
        if !self.state.is_selected(id) {
            return Err(BingoError::NotOnCard(id.to_string()));
        }
        if let Some(pos) = self.state.active.iter().position(|a| a == id) {
            self.state.active.remove(pos);
            Ok(false)
        } else {
            self.state.active.push(id.to_string());
            Ok(true)
        }
    }

    /// Swap in a whole decoded state.
    pub fn replace(&mut self, state: CardState) {
        self.state = state;
    }

    /// Drop everything back to an empty card.
    pub fn reset(&mut self) {
        self.state = CardState::default();
    }
}

fn add_unique(list: &mut Vec<Rc<Item>>, item: Rc<Item>) -> bool {
    if list.iter().any(|existing| existing.id == item.id) {
        return false;
    }
    list.push(item);
    true
}

fn remove_id(list: &mut Vec<Rc<Item>>, id: &str) -> bool {
    let before = list.len();
    list.retain(|item| item.id != id);
    list.len() != before
}

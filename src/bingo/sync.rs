//! Boundary to the shared room store, and the per-slot glue that keeps a
//! card and its remote copy in step without feedback loops.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::bingo::card::BingoCard;
use crate::bingo::codec;
use crate::catalog::Catalog;
use crate::error::BingoError;

/// One of the two cards a room tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardSlot {
    First,
    Second,
}

impl CardSlot {
    pub const ALL: [CardSlot; 2] = [CardSlot::First, CardSlot::Second];

    /// Field name of the slot in the room document.
    pub fn key(self) -> &'static str {
        match self {
            CardSlot::First => "card1State",
            CardSlot::Second => "card2State",
        }
    }

    pub fn number(self) -> u8 {
        match self {
            CardSlot::First => 1,
            CardSlot::Second => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(CardSlot::First),
            2 => Some(CardSlot::Second),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self.number() as usize - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

pub type UpdateCallback = Box<dyn FnMut(CardSlot, Option<&str>)>;

/// Opaque key-value channel keyed by (room, slot).
pub trait SyncChannel {
    fn write(&mut self, room: &str, slot: CardSlot, encoded: &str) -> Result<(), BingoError>;

    /// Register for slot updates of `room`. `None` means the slot is empty.
    fn subscribe(&mut self, room: &str, on_update: UpdateCallback) -> SubscriptionId;

    fn unsubscribe(&mut self, id: SubscriptionId);
}

/// What happened to an incoming slot value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// Slot is empty in the store.
    Empty,
    /// One of our own writes came back.
    OwnEcho,
    /// Same string we last applied from the store.
    Unchanged,
    /// A different participant's state replaced the card.
    Applied,
}

/// Echo suppression for one slot.
///
/// Compares strings, never decoded state: every token this slot wrote and
/// has not yet seen again sits in `pending`, oldest first. An incoming
/// token equal to one of them is our own echo, and anything older than it
/// is retired with it, so a late echo of an earlier write can never roll
/// back a newer local change.
///
/// `last_remote` tracks what the store held when it last reported the
/// slot, whoever wrote it. Publishing compares against that (or the newest
/// pending write), never against a value the store has since replaced.
#[derive(Debug, Clone)]
pub struct CardSync {
    slot: CardSlot,
    pending: VecDeque<String>,
    last_remote: Option<String>,
    window: usize,
}

impl CardSync {
    pub fn new(slot: CardSlot, window: usize) -> Self {
        Self {
            slot,
            pending: VecDeque::new(),
            last_remote: None,
            window: window.max(1),
        }
    }

    pub fn slot(&self) -> CardSlot {
        self.slot
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    pub fn last_remote(&self) -> Option<&str> {
        self.last_remote.as_deref()
    }

    /// Encode the card and write it unless the store already holds it.
    /// Returns whether a write was issued.
    pub fn publish(
        &mut self,
        card: &BingoCard,
        channel: &mut dyn SyncChannel,
        room: &str,
    ) -> Result<bool, BingoError> {
        let encoded = codec::encode(card.state());
        let newest = self.pending.back().or(self.last_remote.as_ref());
        if newest == Some(&encoded) {
            return Ok(false);
        }
        channel.write(room, self.slot, &encoded)?;
        tracing::debug!(slot = self.slot.number(), "published card state");
        self.pending.push_back(encoded);
        while self.pending.len() > self.window {
            self.pending.pop_front();
        }
        Ok(true)
    }

    /// Apply a value read from the store. On decode failure the card keeps
    /// its previous state.
    pub fn receive(
        &mut self,
        incoming: Option<&str>,
        card: &mut BingoCard,
        catalog: &Catalog,
        card_size: usize,
    ) -> Result<RemoteOutcome, BingoError> {
        let Some(incoming) = incoming else {
            self.last_remote = None;
            return Ok(RemoteOutcome::Empty);
        };

        if let Some(pos) = self.pending.iter().position(|p| p == incoming) {
            self.pending.drain(..=pos);
            self.last_remote = Some(incoming.to_string());
            tracing::debug!(slot = self.slot.number(), "skipped own echo");
            return Ok(RemoteOutcome::OwnEcho);
        }

        if self.last_remote.as_deref() == Some(incoming) {
            return Ok(RemoteOutcome::Unchanged);
        }

        let state = codec::decode(incoming, catalog, card_size)?;
        card.replace(state);
        self.pending.clear();
        self.last_remote = Some(incoming.to_string());
        tracing::debug!(slot = self.slot.number(), "applied remote card state");
        Ok(RemoteOutcome::Applied)
    }

    /// Forget everything, e.g. when leaving a room.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.last_remote = None;
    }
}

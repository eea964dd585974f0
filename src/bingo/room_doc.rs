//! In-memory room document backed by a Yrs CRDT.
//!
//! Holds the two slot strings of one room and implements [`SyncChannel`]
//! over them. Peers converge by exchanging binary Yrs updates (base64) over
//! whatever relay the page uses; this module never does I/O itself.
//!
//! ```text
//! yrs::Doc
//! └── "cards" (MapRef)
//!     ├── "card1State": String
//!     └── "card2State": String
//! ```
//!
//! Like a hosted document store, the doc reports every change to its
//! subscribers, including changes made through `write` by the same
//! instance. Telling those echoes apart is `CardSync`'s job.

use base64::prelude::*;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Any, Doc, Map, ReadTxn, StateVector, Transact, Update, WriteTxn};

use crate::bingo::sync::{CardSlot, SubscriptionId, SyncChannel, UpdateCallback};
use crate::error::BingoError;

const CARDS: &str = "cards";

struct Subscriber {
    id: SubscriptionId,
    room: String,
    on_update: UpdateCallback,
}

pub struct RoomDoc {
    room_code: String,
    doc: Doc,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
    outbound: Vec<String>,
}

/// Upper-case and trim a user-typed room code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn new_room_doc() -> Doc {
    let doc = Doc::new();
    {
        let mut txn = doc.transact_mut();
        txn.get_or_insert_map(CARDS);
    }
    doc
}

impl RoomDoc {
    pub fn new(room_code: &str) -> Self {
        Self {
            room_code: normalize_code(room_code),
            doc: new_room_doc(),
            subscribers: Vec::new(),
            next_subscription: 0,
            outbound: Vec::new(),
        }
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    /// Current string stored for a slot.
    pub fn slot_value(&self, slot: CardSlot) -> Option<String> {
        let cards = self.doc.get_or_insert_map(CARDS);
        let txn = self.doc.transact();
        match cards.get(&txn, slot.key()) {
            Some(yrs::Out::Any(Any::String(s))) => Some(s.to_string()),
            _ => None,
        }
    }

    /// Clear a slot (stored as an absent key).
    pub fn clear_slot(&mut self, slot: CardSlot) {
        let cards = self.doc.get_or_insert_map(CARDS);
        let sv = self.doc.transact().state_vector();
        {
            let mut txn = self.doc.transact_mut();
            cards.remove(&mut txn, slot.key());
        }
        self.queue_diff_since(&sv);
        self.notify(slot, None);
    }

    // ── Sync protocol ──────────────────────────────────────────────

    /// Base64 state vector for the handshake with a peer.
    pub fn encode_state_vector(&self) -> String {
        let sv = self.doc.transact().state_vector().encode_v1();
        BASE64_STANDARD.encode(&sv)
    }

    /// Everything the peer with state vector `remote_sv_b64` has not seen.
    pub fn encode_diff(&self, remote_sv_b64: &str) -> Result<String, BingoError> {
        let sv_bytes = BASE64_STANDARD
            .decode(remote_sv_b64.trim())
            .map_err(|e| BingoError::Sync(format!("base64 decode error: {e}")))?;
        let remote_sv = StateVector::decode_v1(&sv_bytes)
            .map_err(|e| BingoError::Sync(format!("state vector decode error: {e}")))?;
        let update = self.doc.transact().encode_diff_v1(&remote_sv);
        Ok(BASE64_STANDARD.encode(&update))
    }

    /// Apply a peer's base64 update and notify subscribers of every slot
    /// whose value changed. Returns those slots.
    pub fn apply_update(&mut self, update_b64: &str) -> Result<Vec<CardSlot>, BingoError> {
        let update_bytes = BASE64_STANDARD
            .decode(update_b64.trim())
            .map_err(|e| BingoError::Sync(format!("base64 decode error: {e}")))?;
        let update = Update::decode_v1(&update_bytes)
            .map_err(|e| BingoError::Sync(format!("update decode error: {e}")))?;

        let before = CardSlot::ALL.map(|slot| self.slot_value(slot));
        {
            let mut txn = self.doc.transact_mut();
            txn.apply_update(update)
                .map_err(|e| BingoError::Sync(format!("apply update error: {e}")))?;
        }

        let mut changed = Vec::new();
        for (slot, old) in CardSlot::ALL.into_iter().zip(before) {
            let new = self.slot_value(slot);
            if new != old {
                self.notify(slot, new.as_deref());
                changed.push(slot);
            }
        }
        Ok(changed)
    }

    /// Take the updates produced by local writes, oldest first, for relay.
    pub fn take_outbound(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outbound)
    }

    fn queue_diff_since(&mut self, before_sv: &StateVector) {
        let update = self.doc.transact().encode_diff_v1(before_sv);
        self.outbound.push(BASE64_STANDARD.encode(&update));
    }

    fn notify(&mut self, slot: CardSlot, value: Option<&str>) {
        for sub in self.subscribers.iter_mut().filter(|s| s.room == self.room_code) {
            (sub.on_update)(slot, value);
        }
    }
}

impl SyncChannel for RoomDoc {
    fn write(&mut self, room: &str, slot: CardSlot, encoded: &str) -> Result<(), BingoError> {
        if normalize_code(room) != self.room_code {
            return Err(BingoError::Sync(format!(
                "room {room:?} is not open (current room {:?})",
                self.room_code
            )));
        }
        let cards = self.doc.get_or_insert_map(CARDS);
        let sv = self.doc.transact().state_vector();
        {
            let mut txn = self.doc.transact_mut();
            cards.insert(&mut txn, slot.key(), Any::from(encoded.to_string()));
        }
        self.queue_diff_since(&sv);
        self.notify(slot, Some(encoded));
        Ok(())
    }

    /// Registers the callback and immediately delivers the current value
    /// of both slots, like a snapshot listener's first event.
    fn subscribe(&mut self, room: &str, mut on_update: UpdateCallback) -> SubscriptionId {
        let room = normalize_code(room);
        if room == self.room_code {
            for slot in CardSlot::ALL {
                on_update(slot, self.slot_value(slot).as_deref());
            }
        }
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscribers.push(Subscriber { id, room, on_update });
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|s| s.id != id);
    }
}

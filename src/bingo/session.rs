//! Per-worker session: the catalog, the rng, both card slots and the
//! optional room link.
//!
//! `Session` is a plain value that can be driven directly. The WASM entry
//! point keeps one in a `thread_local!` (see [`with_session`]) so it lives
//! as long as the Web Worker, the same way the page keeps one set of cards
//! per tab.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bingo::card::{BingoCard, ConstraintList};
use crate::bingo::codec;
use crate::bingo::rng::CardRng;
use crate::bingo::room::RoomLink;
use crate::bingo::sync::{CardSlot, CardSync, RemoteOutcome};
use crate::catalog::{Catalog, CatalogSource};
use crate::config::BingoConfig;
use crate::error::BingoError;

/// A constraint edit requested for one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintOp {
    Add(ConstraintList, String),
    Remove(ConstraintList, String),
    SetExcludeVariants(bool),
    SetExcludePremium(bool),
    ToggleExcludeVariants,
    ToggleExcludePremium,
}

/// One card slot and its sync bookkeeping.
#[derive(Debug, Clone)]
pub struct CardSession {
    pub card: BingoCard,
    pub sync: CardSync,
    /// Last failure applying a remote update or publishing, for display.
    pub last_error: Option<BingoError>,
}

impl CardSession {
    fn new(slot: CardSlot, config: &BingoConfig) -> Self {
        Self {
            card: BingoCard::new(),
            sync: CardSync::new(slot, config.echo_window),
            last_error: None,
        }
    }
}

pub struct Session {
    config: BingoConfig,
    catalog: Option<Rc<Catalog>>,
    catalog_error: Option<BingoError>,
    rng: CardRng,
    slots: [CardSession; 2],
    room: Option<RoomLink>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(BingoConfig::default())
    }
}

impl Session {
    pub fn new(config: BingoConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => CardRng::from_seed(seed),
            None => CardRng::from_entropy(),
        };
        let slots = CardSlot::ALL.map(|slot| CardSession::new(slot, &config));
        Self {
            config,
            catalog: None,
            catalog_error: None,
            rng,
            slots,
            room: None,
        }
    }

    pub fn config(&self) -> &BingoConfig {
        &self.config
    }

    /// Replace the config. Cards are reset since their size may change;
    /// the catalog is kept. Refused while linked to a room: the room's
    /// tokens are sized for the current grid.
    pub fn set_config(&mut self, config: BingoConfig) -> Result<(), BingoError> {
        config.validate()?;
        if self.room.is_some() {
            return Err(BingoError::InvalidRequest(
                "leave the room before changing the config".to_string(),
            ));
        }
        if let Some(seed) = config.seed {
            self.rng = CardRng::from_seed(seed);
        }
        self.slots = CardSlot::ALL.map(|slot| CardSession::new(slot, &config));
        self.config = config;
        Ok(())
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = CardRng::from_seed(seed);
    }

    // ── Catalog ────────────────────────────────────────────────────

    /// Load the catalog once. A failure is remembered and reported by every
    /// operation that needs the catalog until a load succeeds.
    pub fn load_catalog(&mut self, source: &dyn CatalogSource) -> Result<usize, BingoError> {
        match Catalog::load(source) {
            Ok(catalog) => {
                let len = catalog.len();
                self.catalog = Some(Rc::new(catalog));
                self.catalog_error = None;
                Ok(len)
            }
            Err(e) => {
                tracing::warn!(error = %e, "catalog load failed");
                self.catalog = None;
                self.catalog_error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn catalog(&self) -> Result<Rc<Catalog>, BingoError> {
        match (&self.catalog, &self.catalog_error) {
            (Some(catalog), _) => Ok(catalog.clone()),
            (None, Some(e)) => Err(e.clone()),
            (None, None) => Err(BingoError::CatalogUnavailable("catalog not loaded".to_string())),
        }
    }

    // ── Cards ──────────────────────────────────────────────────────

    pub fn slot(&self, slot: CardSlot) -> &CardSession {
        &self.slots[slot.index()]
    }

    pub fn card(&self, slot: CardSlot) -> &BingoCard {
        &self.slots[slot.index()].card
    }

    pub fn extract(&mut self, slot: CardSlot) -> Result<(), BingoError> {
        let catalog = self.catalog()?;
        let card_size = self.config.card_size();
        self.slots[slot.index()]
            .card
            .extract(&catalog, &mut self.rng, card_size)?;
        self.after_change(slot);
        Ok(())
    }

    /// Apply a constraint edit. Returns whether the card changed.
    pub fn constrain(&mut self, slot: CardSlot, op: ConstraintOp) -> Result<bool, BingoError> {
        let catalog = self.catalog();
        let card = &mut self.slots[slot.index()].card;
        let changed = match op {
            ConstraintOp::Add(list, id) => card.add(list, catalog?.resolve(&id)?),
            ConstraintOp::Remove(list, id) => card.remove(list, &id),
            ConstraintOp::SetExcludeVariants(value) => {
                let changed = card.state().exclude_variants != value;
                card.set_exclude_variants(value);
                changed
            }
            ConstraintOp::SetExcludePremium(value) => {
                let changed = card.state().exclude_premium != value;
                card.set_exclude_premium(value);
                changed
            }
            ConstraintOp::ToggleExcludeVariants => {
                card.toggle_exclude_variants();
                true
            }
            ConstraintOp::ToggleExcludePremium => {
                card.toggle_exclude_premium();
                true
            }
        };
        if changed {
            self.after_change(slot);
        }
        Ok(changed)
    }

    /// Mark or unmark a cell. Returns the new membership.
    pub fn toggle(&mut self, slot: CardSlot, id: &str) -> Result<bool, BingoError> {
        let active = self.slots[slot.index()].card.toggle(id)?;
        self.after_change(slot);
        Ok(active)
    }

    pub fn encode(&self, slot: CardSlot) -> String {
        codec::encode(self.card(slot).state())
    }

    /// Replace a card from a pasted token. On failure the card is untouched.
    pub fn restore(&mut self, slot: CardSlot, token: &str) -> Result<(), BingoError> {
        let catalog = self.catalog()?;
        let state = codec::decode(token, &catalog, self.config.card_size())?;
        self.slots[slot.index()].card.replace(state);
        self.after_change(slot);
        Ok(())
    }

    // ── Room ───────────────────────────────────────────────────────

    pub fn room(&self) -> Option<&RoomLink> {
        self.room.as_ref()
    }

    pub fn room_mut(&mut self) -> Option<&mut RoomLink> {
        self.room.as_mut()
    }

    /// Open a new room and seed it with the cards already drawn here.
    pub fn create_room(&mut self, code: &str, name: &str) -> Result<(), BingoError> {
        self.open_room(code, name, false)?;
        for slot in CardSlot::ALL {
            if !self.card(slot).state().selected.is_empty() {
                self.publish(slot);
            }
        }
        self.pump();
        Ok(())
    }

    /// Link to an existing room. Its cards arrive through the sync handshake.
    pub fn join_room(&mut self, code: &str, name: &str) -> Result<(), BingoError> {
        self.open_room(code, name, true)?;
        self.pump();
        Ok(())
    }

    pub fn leave_room(&mut self) {
        if let Some(link) = self.room.take() {
            link.close();
        }
        for session in &mut self.slots {
            session.sync.reset();
            session.last_error = None;
        }
    }

    pub fn set_connected(&mut self, connected: bool) {
        if let Some(link) = self.room.as_mut() {
            link.state.connected = connected;
        }
    }

    /// Apply a relayed room update, then route slot changes to the cards.
    pub fn apply_remote_update(
        &mut self,
        update_b64: &str,
    ) -> Result<Vec<(CardSlot, Result<RemoteOutcome, BingoError>)>, BingoError> {
        let link = self
            .room
            .as_mut()
            .ok_or_else(|| BingoError::Sync("not in a room".to_string()))?;
        link.doc.apply_update(update_b64)?;
        Ok(self.pump())
    }

    /// Deliver queued room updates to their slots.
    pub fn pump(&mut self) -> Vec<(CardSlot, Result<RemoteOutcome, BingoError>)> {
        let Some(link) = self.room.as_ref() else {
            return Vec::new();
        };
        let updates = link.drain();
        let catalog = self.catalog();
        let card_size = self.config.card_size();

        let mut outcomes = Vec::with_capacity(updates.len());
        for update in updates {
            let session = &mut self.slots[update.slot.index()];
            let result = match (&catalog, update.encoded.as_deref()) {
                (_, None) => Ok(RemoteOutcome::Empty),
                (Ok(catalog), encoded) => {
                    session
                        .sync
                        .receive(encoded, &mut session.card, catalog, card_size)
                }
                (Err(e), Some(_)) => Err(e.clone()),
            };
            match &result {
                Ok(RemoteOutcome::Applied) => session.last_error = None,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(slot = update.slot.number(), error = %e, "remote card state rejected");
                    session.last_error = Some(e.clone());
                }
            }
            outcomes.push((update.slot, result));
        }
        outcomes
    }

    fn open_room(&mut self, code: &str, name: &str, connected: bool) -> Result<(), BingoError> {
        if code.trim().is_empty() {
            return Err(BingoError::InvalidRequest("room code is required".to_string()));
        }
        self.leave_room();
        self.room = Some(RoomLink::open(code, name, connected));
        Ok(())
    }

    /// A local change: push it to the room (if any) and consume the echo.
    fn after_change(&mut self, slot: CardSlot) {
        if self.room.is_some() {
            self.publish(slot);
            self.pump();
        }
    }

    fn publish(&mut self, slot: CardSlot) {
        let Some(link) = self.room.as_mut() else {
            return;
        };
        let session = &mut self.slots[slot.index()];
        if let Err(e) = session
            .sync
            .publish(&session.card, &mut link.doc, &link.state.room_code)
        {
            tracing::warn!(slot = slot.number(), error = %e, "publish failed");
            session.last_error = Some(e);
        }
    }
}

thread_local! {
    static SESSION: RefCell<Session> = RefCell::new(Session::default());
}

/// Execute a closure with read access to the worker session.
pub fn with_session<F, R>(f: F) -> R
where
    F: FnOnce(&Session) -> R,
{
    SESSION.with(|s| f(&s.borrow()))
}

/// Execute a closure with mutable access to the worker session.
pub fn with_session_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut Session) -> R,
{
    SESSION.with(|s| f(&mut s.borrow_mut()))
}

/// Replace the worker session wholesale.
pub fn replace_session(session: Session) {
    SESSION.with(|s| {
        *s.borrow_mut() = session;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bingo::room_doc::RoomDoc;
    use crate::bingo::sync::SyncChannel;
    use crate::catalog::{BundledRoster, JsonSource};

    fn seeded() -> Session {
        let mut session = Session::new(BingoConfig {
            seed: Some(99),
            ..BingoConfig::default()
        });
        session.load_catalog(&BundledRoster).unwrap();
        session
    }

    #[test]
    fn extraction_needs_a_catalog() {
        let mut session = Session::default();
        let err = session.extract(CardSlot::First).unwrap_err();
        assert_eq!(err.kind(), "catalog_unavailable");
    }

    #[test]
    fn failed_load_is_reported_until_fixed() {
        let mut session = Session::default();
        assert!(session.load_catalog(&JsonSource("{oops")).is_err());
        let err = session.catalog().unwrap_err();
        assert!(err.to_string().contains("invalid catalog JSON"));
        assert_eq!(session.load_catalog(&BundledRoster).unwrap(), 86);
        assert!(session.catalog().is_ok());
    }

    #[test]
    fn slots_are_independent() {
        let mut session = seeded();
        session.extract(CardSlot::First).unwrap();
        assert_eq!(session.card(CardSlot::First).state().selected.len(), 25);
        assert!(session.card(CardSlot::Second).state().selected.is_empty());
    }

    #[test]
    fn constraint_ops_report_changes() {
        let mut session = seeded();
        let pin = ConstraintOp::Add(ConstraintList::Pinned, "kirby".to_string());
        assert!(session.constrain(CardSlot::First, pin.clone()).unwrap());
        assert!(!session.constrain(CardSlot::First, pin).unwrap());
        assert!(session.constrain(CardSlot::First, ConstraintOp::SetExcludePremium(true)).unwrap());
        assert!(!session.constrain(CardSlot::First, ConstraintOp::SetExcludePremium(true)).unwrap());
        let err = session
            .constrain(CardSlot::First, ConstraintOp::Add(ConstraintList::Excluded, "nobody".to_string()))
            .unwrap_err();
        assert_eq!(err, BingoError::UnknownItem("nobody".to_string()));
    }

    #[test]
    fn restore_failure_keeps_card() {
        let mut session = seeded();
        session.extract(CardSlot::First).unwrap();
        let before = session.encode(CardSlot::First);
        assert!(session.restore(CardSlot::First, "not-valid-token").is_err());
        assert_eq!(session.encode(CardSlot::First), before);
    }

    #[test]
    fn restore_moves_a_card_between_slots() {
        let mut session = seeded();
        session.extract(CardSlot::First).unwrap();
        let token = session.encode(CardSlot::First);
        session.restore(CardSlot::Second, &token).unwrap();
        assert_eq!(session.card(CardSlot::Second).state(), session.card(CardSlot::First).state());
    }

    #[test]
    fn local_changes_publish_without_reapplying_echo() {
        let mut session = seeded();
        session.create_room("abcd", "Test").unwrap();
        session.extract(CardSlot::First).unwrap();
        let id = session.card(CardSlot::First).state().selected[0].id.clone();
        session.toggle(CardSlot::First, &id).unwrap();

        let link = session.room().unwrap();
        assert_eq!(link.doc.slot_value(CardSlot::First), Some(session.encode(CardSlot::First)));
        assert_eq!(session.slot(CardSlot::First).sync.pending_writes(), 0);
        assert!(session.card(CardSlot::First).state().is_active(&id));
    }

    #[test]
    fn create_room_seeds_existing_cards() {
        let mut session = seeded();
        session.extract(CardSlot::Second).unwrap();
        session.create_room("ROOM1", "").unwrap();
        let link = session.room().unwrap();
        assert_eq!(link.doc.slot_value(CardSlot::Second), Some(session.encode(CardSlot::Second)));
        assert_eq!(link.doc.slot_value(CardSlot::First), None);
    }

    #[test]
    fn two_sessions_converge_through_relay() {
        let mut host = seeded();
        host.create_room("ABCD", "Host").unwrap();
        host.extract(CardSlot::First).unwrap();

        let mut guest = Session::new(BingoConfig {
            seed: Some(7),
            ..BingoConfig::default()
        });
        guest.load_catalog(&BundledRoster).unwrap();
        guest.join_room("abcd", "").unwrap();

        // Handshake: guest sends its state vector, host answers with a diff.
        let sv = guest.room().unwrap().doc.encode_state_vector();
        let diff = host.room().unwrap().doc.encode_diff(&sv).unwrap();
        let outcomes = guest.apply_remote_update(&diff).unwrap();
        assert!(outcomes.iter().any(|(slot, r)| *slot == CardSlot::First && *r == Ok(RemoteOutcome::Applied)));
        assert_eq!(guest.card(CardSlot::First).state(), host.card(CardSlot::First).state());

        // Guest marks a cell; the relayed update reaches the host.
        host.room_mut().unwrap().doc.take_outbound();
        let id = guest.card(CardSlot::First).state().selected[2].id.clone();
        guest.toggle(CardSlot::First, &id).unwrap();
        for update in guest.room_mut().unwrap().doc.take_outbound() {
            host.apply_remote_update(&update).unwrap();
        }
        assert!(host.card(CardSlot::First).state().is_active(&id));
        assert_eq!(host.encode(CardSlot::First), guest.encode(CardSlot::First));
    }

    #[test]
    fn unmark_after_mark_reaches_the_other_side() {
        let mut host = seeded();
        host.create_room("ABCD", "Host").unwrap();
        host.extract(CardSlot::First).unwrap();
        host.room_mut().unwrap().doc.take_outbound();

        let mut guest = Session::new(BingoConfig {
            seed: Some(7),
            ..BingoConfig::default()
        });
        guest.load_catalog(&BundledRoster).unwrap();
        guest.join_room("ABCD", "").unwrap();
        let sv = guest.room().unwrap().doc.encode_state_vector();
        let diff = host.room().unwrap().doc.encode_diff(&sv).unwrap();
        guest.apply_remote_update(&diff).unwrap();

        let id = guest.card(CardSlot::First).state().selected[0].id.clone();
        guest.toggle(CardSlot::First, &id).unwrap();
        guest.toggle(CardSlot::First, &id).unwrap();
        let updates = guest.room_mut().unwrap().doc.take_outbound();
        assert_eq!(updates.len(), 2);
        for update in updates {
            host.apply_remote_update(&update).unwrap();
        }

        assert!(!host.card(CardSlot::First).state().is_active(&id));
        assert_eq!(host.encode(CardSlot::First), guest.encode(CardSlot::First));
        assert_eq!(
            guest.room().unwrap().doc.slot_value(CardSlot::First),
            Some(guest.encode(CardSlot::First))
        );
    }

    #[test]
    fn config_is_locked_while_in_a_room() {
        let mut session = seeded();
        session.create_room("ABCD", "").unwrap();
        session.extract(CardSlot::First).unwrap();
        let err = session
            .set_config(BingoConfig {
                grid_side: 3,
                ..BingoConfig::default()
            })
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(session.config().grid_side, 5);
        assert_eq!(session.card(CardSlot::First).state().selected.len(), 25);

        session.leave_room();
        assert!(session
            .set_config(BingoConfig {
                grid_side: 3,
                ..BingoConfig::default()
            })
            .is_ok());
    }

    #[test]
    fn bad_remote_state_is_reported_not_applied() {
        let mut host = seeded();
        host.create_room("ABCD", "").unwrap();
        host.extract(CardSlot::First).unwrap();
        let before = host.encode(CardSlot::First);

        // The peer catches up first so its write supersedes the host's.
        let mut peer = RoomDoc::new("ABCD");
        let diff = host.room().unwrap().doc.encode_diff(&peer.encode_state_vector()).unwrap();
        peer.apply_update(&diff).unwrap();
        peer.write("ABCD", CardSlot::First, "garbage").unwrap();
        for update in peer.take_outbound() {
            let outcomes = host.apply_remote_update(&update).unwrap();
            assert_eq!(outcomes.len(), 1);
            assert_eq!(outcomes[0].1.as_ref().unwrap_err().kind(), "decode_failed");
        }
        assert_eq!(host.encode(CardSlot::First), before);
        assert!(host.slot(CardSlot::First).last_error.is_some());
    }

    #[test]
    fn leave_room_resets_sync() {
        let mut session = seeded();
        session.create_room("ABCD", "").unwrap();
        session.extract(CardSlot::First).unwrap();
        session.leave_room();
        assert!(session.room().is_none());
        assert_eq!(session.slot(CardSlot::First).sync.pending_writes(), 0);
        assert!(session.apply_remote_update("AAAA").is_err());
    }

    #[test]
    fn config_change_resets_cards() {
        let mut session = seeded();
        session.extract(CardSlot::First).unwrap();
        session
            .set_config(BingoConfig {
                grid_side: 3,
                seed: Some(1),
                ..BingoConfig::default()
            })
            .unwrap();
        assert!(session.card(CardSlot::First).state().selected.is_empty());
        session.extract(CardSlot::First).unwrap();
        assert_eq!(session.card(CardSlot::First).state().selected.len(), 9);
    }
}

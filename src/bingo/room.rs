//! Room membership: which room this session is linked to and the inbox
//! that collects slot updates from the room document.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::bingo::room_doc::{self, RoomDoc};
use crate::bingo::sync::{CardSlot, SubscriptionId, SyncChannel};

/// Room-level state shown to the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomState {
    /// Room code (e.g., "K7PX2M")
    pub room_code: String,
    /// Human-readable room name chosen by the creator
    pub room_name: String,
    /// Whether a peer relay is currently connected
    pub connected: bool,
}

/// A slot value delivered by the room document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotUpdate {
    pub slot: CardSlot,
    pub encoded: Option<String>,
}

type Inbox = Rc<RefCell<VecDeque<SlotUpdate>>>;

/// An open room: its document plus a subscription feeding `inbox`.
pub struct RoomLink {
    pub state: RoomState,
    pub doc: RoomDoc,
    inbox: Inbox,
    subscription: SubscriptionId,
}

impl RoomLink {
    pub fn open(code: &str, name: &str, connected: bool) -> Self {
        let room_code = room_doc::normalize_code(code);
        let mut doc = RoomDoc::new(&room_code);
        let inbox: Inbox = Rc::default();
        let sink = inbox.clone();
        let subscription = doc.subscribe(
            &room_code,
            Box::new(move |slot, encoded| {
                sink.borrow_mut().push_back(SlotUpdate {
                    slot,
                    encoded: encoded.map(str::to_string),
                });
            }),
        );
        tracing::info!(room = %room_code, connected, "opened room");
        Self {
            state: RoomState {
                room_code,
                room_name: name.to_string(),
                connected,
            },
            doc,
            inbox,
            subscription,
        }
    }

    /// Take every update delivered since the last drain, oldest first.
    pub fn drain(&self) -> Vec<SlotUpdate> {
        self.inbox.borrow_mut().drain(..).collect()
    }

    pub fn close(mut self) {
        self.doc.unsubscribe(self.subscription);
        tracing::info!(room = %self.state.room_code, "left room");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_normalizes_code_and_sees_empty_snapshot() {
        let link = RoomLink::open(" k7px2m ", "Friday", false);
        assert_eq!(link.state.room_code, "K7PX2M");
        assert_eq!(link.state.room_name, "Friday");
        assert!(!link.state.connected);
        let updates = link.drain();
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|u| u.encoded.is_none()));
        assert!(link.drain().is_empty());
    }

    #[test]
    fn writes_arrive_in_inbox() {
        let mut link = RoomLink::open("ABCD", "", true);
        link.drain();
        link.doc.write("ABCD", CardSlot::Second, "tok").unwrap();
        assert_eq!(
            link.drain(),
            vec![SlotUpdate {
                slot: CardSlot::Second,
                encoded: Some("tok".to_string())
            }]
        );
    }

    #[test]
    fn room_state_roundtrip_json() {
        let state = RoomState {
            room_code: "ABCD".to_string(),
            room_name: "Test Room".to_string(),
            connected: true,
        };
        let json = serde_json::to_string(&state).unwrap();
        let restored: RoomState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }
}

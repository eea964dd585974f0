//! `/api/room/*`: room membership and the Yrs relay protocol.
//!
//! The page owns the transport (WebRTC, websocket, whatever). It asks for
//! the local state vector, exchanges it with a peer, applies the peer's
//! diff via `/api/room/apply`, and forwards whatever `/api/room/outbound`
//! hands back after local edits.

use serde::Serialize;

use crate::bingo::room::RoomState;
use crate::bingo::session::{with_session, with_session_mut, Session};
use crate::bingo::sync::{CardSlot, RemoteOutcome};
use crate::error::BingoError;
use crate::routes::util::{json_ok, parse_bool, respond, Params};

#[derive(Debug, Serialize)]
struct SlotStatus {
    slot: u8,
    stored: bool,
    pending_writes: usize,
    last_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct RoomView {
    in_room: bool,
    #[serde(flatten)]
    state: RoomState,
    slots: Vec<SlotStatus>,
}

impl RoomView {
    fn of(session: &Session) -> Self {
        let room = session.room();
        let slots = CardSlot::ALL
            .into_iter()
            .map(|slot| {
                let card = session.slot(slot);
                SlotStatus {
                    slot: slot.number(),
                    stored: room.is_some_and(|r| r.doc.slot_value(slot).is_some()),
                    pending_writes: card.sync.pending_writes(),
                    last_error: card.last_error.as_ref().map(|e| e.to_string()),
                }
            })
            .collect();
        Self {
            in_room: room.is_some(),
            state: room.map(|r| r.state.clone()).unwrap_or_default(),
            slots,
        }
    }
}

#[derive(Serialize)]
struct SlotOutcome {
    slot: u8,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl SlotOutcome {
    fn new(slot: CardSlot, result: &Result<RemoteOutcome, BingoError>) -> Self {
        let (outcome, message) = match result {
            Ok(RemoteOutcome::Empty) => ("empty", None),
            Ok(RemoteOutcome::OwnEcho) => ("own_echo", None),
            Ok(RemoteOutcome::Unchanged) => ("unchanged", None),
            Ok(RemoteOutcome::Applied) => ("applied", None),
            Err(e) => (e.kind(), Some(e.to_string())),
        };
        Self {
            slot: slot.number(),
            outcome,
            message,
        }
    }
}

#[derive(Serialize)]
struct Applied {
    outcomes: Vec<SlotOutcome>,
    outbound: Vec<String>,
}

#[derive(Serialize)]
struct Payload {
    data: String,
}

#[derive(Serialize)]
struct Outbound {
    updates: Vec<String>,
}

fn not_in_room() -> BingoError {
    BingoError::Sync("not in a room".to_string())
}

/// GET /api/room/status
pub fn handle_status_get(_query: &str) -> String {
    with_session(|s| json_ok(&RoomView::of(s)))
}

/// POST /api/room/create: `code=&name=`
pub fn handle_create_post(body: &str) -> String {
    let params = Params::form(body);
    respond(params.require("code").and_then(|code| {
        let name = params.get("name").unwrap_or("");
        with_session_mut(|s| -> Result<_, BingoError> {
            s.create_room(code, name)?;
            Ok(RoomView::of(s))
        })
    }))
}

/// POST /api/room/join: `code=&name=`
pub fn handle_join_post(body: &str) -> String {
    let params = Params::form(body);
    respond(params.require("code").and_then(|code| {
        let name = params.get("name").unwrap_or("");
        with_session_mut(|s| -> Result<_, BingoError> {
            s.join_room(code, name)?;
            Ok(RoomView::of(s))
        })
    }))
}

/// POST /api/room/connected: `connected=true|false`, reported by the relay.
pub fn handle_connected_post(body: &str) -> String {
    let params = Params::form(body);
    respond(
        params.require("connected")
            .and_then(parse_bool)
            .and_then(|connected| {
                with_session_mut(|s| -> Result<_, BingoError> {
                    if s.room().is_none() {
                        return Err(not_in_room());
                    }
                    s.set_connected(connected);
                    Ok(RoomView::of(s))
                })
            }),
    )
}

/// POST /api/room/disconnect: drop the room link; cards stay.
pub fn handle_disconnect_post(_body: &str) -> String {
    with_session_mut(|s| {
        s.leave_room();
        json_ok(&RoomView::of(s))
    })
}

/// GET /api/room/sv: base64 state vector for the sync handshake.
pub fn handle_sv_get(_query: &str) -> String {
    respond(with_session(|s| {
        s.room()
            .map(|r| Payload {
                data: r.doc.encode_state_vector(),
            })
            .ok_or_else(not_in_room)
    }))
}

/// POST /api/room/diff: `sv=` → the update that peer is missing.
pub fn handle_diff_post(body: &str) -> String {
    let params = Params::form(body);
    respond(params.require("sv").and_then(|sv| {
        with_session(|s| -> Result<_, BingoError> {
            let room = s.room().ok_or_else(not_in_room)?;
            Ok(Payload {
                data: room.doc.encode_diff(sv)?,
            })
        })
    }))
}

/// POST /api/room/apply: `update=` from a peer. Also returns any local
/// updates produced while applying, ready to relay.
pub fn handle_apply_post(body: &str) -> String {
    let params = Params::form(body);
    respond(params.require("update").and_then(|update| {
        with_session_mut(|s| -> Result<_, BingoError> {
            let outcomes = s
                .apply_remote_update(update)?
                .iter()
                .map(|(slot, result)| SlotOutcome::new(*slot, result))
                .collect();
            let outbound = s
                .room_mut()
                .map(|r| r.doc.take_outbound())
                .unwrap_or_default();
            Ok(Applied { outcomes, outbound })
        })
    }))
}

/// GET /api/room/outbound: drain updates from local writes.
pub fn handle_outbound_get(_query: &str) -> String {
    respond(with_session_mut(|s| {
        s.room_mut()
            .map(|r| Outbound {
                updates: r.doc.take_outbound(),
            })
            .ok_or_else(not_in_room)
    }))
}

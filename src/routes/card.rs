//! `/api/card/*`: extraction, constraints, marking and share tokens for
//! one card slot (`slot=1|2`, default 1).

use serde::Serialize;

use crate::bingo::card::ConstraintList;
use crate::bingo::session::{with_session, with_session_mut, ConstraintOp, Session};
use crate::bingo::sync::CardSlot;
use crate::error::BingoError;
use crate::routes::util::{respond, Params};

/// One cell of the grid, in selection order.
#[derive(Debug, Serialize)]
pub struct CellView {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub active: bool,
    pub pinned: bool,
    pub has_variant: bool,
    pub premium: bool,
}

/// Everything the page needs to render a card and its constraint panel.
#[derive(Debug, Serialize)]
pub struct CardView {
    pub slot: u8,
    pub grid_side: usize,
    pub cells: Vec<CellView>,
    pub pinned: Vec<String>,
    pub excluded: Vec<String>,
    pub exclude_variants: bool,
    pub exclude_premium: bool,
    pub marked: usize,
    pub last_error: Option<String>,
}

impl CardView {
    pub fn of(session: &Session, slot: CardSlot) -> Self {
        let card = session.slot(slot);
        let state = card.card.state();
        Self {
            slot: slot.number(),
            grid_side: session.config().grid_side,
            cells: state
                .selected
                .iter()
                .map(|item| CellView {
                    id: item.id.clone(),
                    name: item.display_name.clone(),
                    icon: item.icon.clone(),
                    active: state.is_active(&item.id),
                    pinned: state.is_pinned(&item.id),
                    has_variant: item.has_variant,
                    premium: item.premium,
                })
                .collect(),
            pinned: state.pinned.iter().map(|i| i.id.clone()).collect(),
            excluded: state.excluded.iter().map(|i| i.id.clone()).collect(),
            exclude_variants: state.exclude_variants,
            exclude_premium: state.exclude_premium,
            marked: state.active.len(),
            last_error: card.last_error.as_ref().map(|e| e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct Changed {
    changed: bool,
    card: CardView,
}

#[derive(Serialize)]
struct Toggled {
    active: bool,
    card: CardView,
}

#[derive(Serialize)]
struct Token {
    slot: u8,
    state: String,
}

/// GET /api/card/state?slot=
pub fn handle_state_get(query: &str) -> String {
    let params = Params::query(query);
    respond(params.slot().map(|slot| with_session(|s| CardView::of(s, slot))))
}

/// POST /api/card/extract: `slot=`
pub fn handle_extract_post(body: &str) -> String {
    let params = Params::form(body);
    respond(params.slot().and_then(|slot| {
        with_session_mut(|s| -> Result<_, BingoError> {
            s.extract(slot)?;
            Ok(CardView::of(s, slot))
        })
    }))
}

/// POST /api/card/constraint
///
/// `action=pin|unpin|exclude|unexclude&id=` edits a list;
/// `action=variants|premium` toggles a flag, or sets it with `value=`.
pub fn handle_constraint_post(body: &str) -> String {
    let params = Params::form(body);
    respond(params.slot().and_then(|slot| {
        let op = parse_constraint(&params)?;
        with_session_mut(|s| -> Result<_, BingoError> {
            let changed = s.constrain(slot, op)?;
            Ok(Changed {
                changed,
                card: CardView::of(s, slot),
            })
        })
    }))
}

fn parse_constraint(params: &Params) -> Result<ConstraintOp, BingoError> {
    let action = params.require("action")?;
    let id = || params.require("id").map(str::to_string);
    let value = params.flag("value")?;
    Ok(match (action, value) {
        ("pin", _) => ConstraintOp::Add(ConstraintList::Pinned, id()?),
        ("unpin", _) => ConstraintOp::Remove(ConstraintList::Pinned, id()?),
        ("exclude", _) => ConstraintOp::Add(ConstraintList::Excluded, id()?),
        ("unexclude", _) => ConstraintOp::Remove(ConstraintList::Excluded, id()?),
        ("variants", Some(v)) => ConstraintOp::SetExcludeVariants(v),
        ("variants", None) => ConstraintOp::ToggleExcludeVariants,
        ("premium", Some(v)) => ConstraintOp::SetExcludePremium(v),
        ("premium", None) => ConstraintOp::ToggleExcludePremium,
        (other, _) => {
            return Err(BingoError::InvalidRequest(format!("unknown action {other:?}")));
        }
    })
}

/// POST /api/card/toggle: `slot=&id=`
pub fn handle_toggle_post(body: &str) -> String {
    let params = Params::form(body);
    respond(params.slot().and_then(|slot| {
        let id = params.require("id")?;
        with_session_mut(|s| -> Result<_, BingoError> {
            let active = s.toggle(slot, id)?;
            Ok(Toggled {
                active,
                card: CardView::of(s, slot),
            })
        })
    }))
}

/// GET /api/card/encode?slot=
pub fn handle_encode_get(query: &str) -> String {
    let params = Params::query(query);
    respond(params.slot().map(|slot| Token {
        slot: slot.number(),
        state: with_session(|s| s.encode(slot)),
    }))
}

/// POST /api/card/restore: `slot=&state=<token>`
pub fn handle_restore_post(body: &str) -> String {
    let params = Params::form(body);
    respond(params.slot().and_then(|slot| {
        let token = params.require("state")?;
        with_session_mut(|s| -> Result<_, BingoError> {
            s.restore(slot, token)?;
            Ok(CardView::of(s, slot))
        })
    }))
}

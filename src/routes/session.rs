//! `/api/session/*`: configuration and rng seeding.

use serde::Serialize;

use crate::bingo::session::{with_session, with_session_mut};
use crate::config::BingoConfig;
use crate::error::BingoError;
use crate::routes::util::{json_ok, respond, Params};

#[derive(Serialize)]
struct Seeded {
    seed: u64,
}

/// GET /api/session/config
pub fn handle_config_get(_query: &str) -> String {
    with_session(|session| json_ok(session.config()))
}

/// POST /api/session/config: body is a (possibly partial) config JSON.
/// Replacing the config clears both cards.
pub fn handle_config_post(body: &str) -> String {
    let body = if body.trim().is_empty() { "{}" } else { body };
    respond(BingoConfig::from_json(body).and_then(|config| {
        with_session_mut(|session| -> Result<_, BingoError> {
            session.set_config(config)?;
            Ok(session.config().clone())
        })
    }))
}

/// POST /api/session/seed: `seed=<u64>`
pub fn handle_seed_post(body: &str) -> String {
    let params = Params::form(body);
    respond(params.require("seed").and_then(|raw| {
        let seed = raw
            .parse::<u64>()
            .map_err(|_| BingoError::InvalidRequest(format!("invalid seed {raw:?}")))?;
        with_session_mut(|session| session.reseed(seed));
        Ok(Seeded { seed })
    }))
}

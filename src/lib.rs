//! Bingo card-state engine, compiled to WASM for a Web Worker.
//!
//! Exports `handle_request(method, path, query, body)` for the page's
//! worker bridge to call. Uses `matchit` for URL routing, the same router
//! engine that powers Axum. Every response is a JSON document; failures
//! come back as `{"error": <kind>, "message": <text>}`.
//!
//! The engine itself (`catalog`, `bingo::*`) has no WASM dependency and can
//! be driven directly through [`bingo::session::Session`].

use wasm_bindgen::prelude::*;

pub mod bingo;
pub mod catalog;
pub mod config;
pub mod error;
pub mod routes;

/// Process an HTTP-like request and return a JSON body.
///
/// # Arguments
/// * `method`: HTTP method ("GET" or "POST")
/// * `path`: URL path (e.g., "/api/card/state")
/// * `query`: Query string (e.g., "?slot=2")
/// * `body`: Request body: form data, or JSON for the catalog and
///   config routes. Empty string for GET requests.
#[wasm_bindgen]
pub fn handle_request(method: &str, path: &str, query: &str, body: &str) -> String {
    let mut router = matchit::Router::new();

    router.insert("/api/catalog", "catalog").ok();
    router.insert("/api/catalog/load", "catalog_load").ok();

    router.insert("/api/session/config", "session_config").ok();
    router.insert("/api/session/seed", "session_seed").ok();

    router.insert("/api/card/state", "card_state").ok();
    router.insert("/api/card/extract", "card_extract").ok();
    router.insert("/api/card/constraint", "card_constraint").ok();
    router.insert("/api/card/toggle", "card_toggle").ok();
    router.insert("/api/card/encode", "card_encode").ok();
    router.insert("/api/card/restore", "card_restore").ok();

    router.insert("/api/room/status", "room_status").ok();
    router.insert("/api/room/create", "room_create").ok();
    router.insert("/api/room/join", "room_join").ok();
    router.insert("/api/room/connected", "room_connected").ok();
    router.insert("/api/room/disconnect", "room_disconnect").ok();

    // Yrs relay
    router.insert("/api/room/sv", "room_sv").ok();
    router.insert("/api/room/diff", "room_diff").ok();
    router.insert("/api/room/apply", "room_apply").ok();
    router.insert("/api/room/outbound", "room_outbound").ok();

    match router.at(path) {
        Ok(matched) => match (*matched.value, method) {
            ("catalog", "GET") => routes::catalog::handle_get(query),
            ("catalog_load", "POST") => routes::catalog::handle_load_post(body),

            ("session_config", "GET") => routes::session::handle_config_get(query),
            ("session_config", "POST") => routes::session::handle_config_post(body),
            ("session_seed", "POST") => routes::session::handle_seed_post(body),

            ("card_state", "GET") => routes::card::handle_state_get(query),
            ("card_encode", "GET") => routes::card::handle_encode_get(query),
            ("card_extract", "POST") => routes::card::handle_extract_post(body),
            ("card_constraint", "POST") => routes::card::handle_constraint_post(body),
            ("card_toggle", "POST") => routes::card::handle_toggle_post(body),
            ("card_restore", "POST") => routes::card::handle_restore_post(body),

            ("room_status", "GET") => routes::room::handle_status_get(query),
            ("room_create", "POST") => routes::room::handle_create_post(body),
            ("room_join", "POST") => routes::room::handle_join_post(body),
            ("room_connected", "POST") => routes::room::handle_connected_post(body),
            ("room_disconnect", "POST") => routes::room::handle_disconnect_post(body),

            ("room_sv", "GET") => routes::room::handle_sv_get(query),
            ("room_diff", "POST") => routes::room::handle_diff_post(body),
            ("room_apply", "POST") => routes::room::handle_apply_post(body),
            ("room_outbound", "GET") => routes::room::handle_outbound_get(query),

            _ => method_not_allowed(),
        },
        Err(_) => not_found(),
    }
}

fn not_found() -> String {
    r#"{"error":"not_found","message":"404: route not found"}"#.to_string()
}

fn method_not_allowed() -> String {
    r#"{"error":"method_not_allowed","message":"405: method not allowed"}"#.to_string()
}

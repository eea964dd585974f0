//! `/api/catalog`: list the loaded roster, or load a new one.

use serde::Serialize;

use crate::bingo::session::{with_session, with_session_mut};
use crate::catalog::{BundledRoster, Item, JsonSource};
use crate::routes::util::{json_error, json_ok, respond};

#[derive(Serialize)]
struct CatalogView<'a> {
    count: usize,
    items: Vec<&'a Item>,
}

#[derive(Serialize)]
struct Loaded {
    loaded: usize,
}

/// GET /api/catalog
pub fn handle_get(_query: &str) -> String {
    let catalog = match with_session(|session| session.catalog()) {
        Ok(catalog) => catalog,
        Err(e) => return json_error(&e),
    };
    let items: Vec<&Item> = catalog.iter().map(|item| item.as_ref()).collect();
    json_ok(&CatalogView {
        count: items.len(),
        items,
    })
}

/// POST /api/catalog/load: body is catalog JSON; empty loads the bundled roster.
pub fn handle_load_post(body: &str) -> String {
    with_session_mut(|session| {
        let result = if body.trim().is_empty() {
            session.load_catalog(&BundledRoster)
        } else {
            session.load_catalog(&JsonSource(body))
        };
        respond(result.map(|loaded| Loaded { loaded }))
    })
}

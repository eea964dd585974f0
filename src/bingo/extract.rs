//! Constrained random extraction of a card's items.
//!
//! Pool construction works on id sets, never on item identity, so a pinned
//! or excluded handle that is a different allocation of the same catalog
//! entry still removes it from the pool. Placement and drawing both use
//! uniform Fisher–Yates shuffles.
//!
//! The premium and variant filters apply to the drawn pool only. A pinned
//! item always reaches the card, even when it is premium or a sibling of
//! another pin.

use std::collections::HashSet;
use std::rc::Rc;

use crate::bingo::rng::CardRng;
use crate::catalog::{Catalog, Item};
use crate::error::BingoError;

/// The inputs of an extraction, borrowed from a card.
#[derive(Debug, Clone, Copy)]
pub struct Constraints<'a> {
    pub pinned: &'a [Rc<Item>],
    pub excluded: &'a [Rc<Item>],
    pub exclude_variants: bool,
    pub exclude_premium: bool,
}

/// Pick `card_size` items: every pinned item (unless also excluded) plus a
/// uniform draw from the eligible pool, placed in uniformly random order.
pub fn extract(
    catalog: &Catalog,
    constraints: &Constraints<'_>,
    rng: &mut CardRng,
    card_size: usize,
) -> Result<Vec<Rc<Item>>, BingoError> {
    let excluded_ids: HashSet<&str> = constraints.excluded.iter().map(|i| i.id.as_str()).collect();
    let pinned_ids: HashSet<&str> = constraints.pinned.iter().map(|i| i.id.as_str()).collect();

    // Exclusion wins over pinning; duplicate pins count once.
    let mut seen = HashSet::new();
    let forced: Vec<Rc<Item>> = constraints
        .pinned
        .iter()
        .filter(|item| !excluded_ids.contains(item.id.as_str()))
        .filter(|item| seen.insert(item.id.as_str()))
        .cloned()
        .collect();

    if forced.len() > card_size {
        return Err(BingoError::TooManyPinned {
            pinned: forced.len(),
            capacity: card_size,
        });
    }

    let mut pool = eligible_pool(catalog, constraints, &pinned_ids, &excluded_ids, &forced, rng);

    let needed = card_size - forced.len();
    if pool.len() < needed {
        tracing::debug!(needed, available = pool.len(), "extraction pool too small");
        return Err(BingoError::InsufficientPool {
            needed,
            available: pool.len(),
        });
    }

    let drawn = rng.draw(&mut pool, needed);
    let mut selected = forced;
    selected.extend(drawn);
    rng.shuffle(&mut selected);

    tracing::debug!(
        card_size,
        pinned = selected.len() - needed,
        exclude_variants = constraints.exclude_variants,
        exclude_premium = constraints.exclude_premium,
        "extracted card"
    );
    Ok(selected)
}

fn eligible_pool(
    catalog: &Catalog,
    constraints: &Constraints<'_>,
    pinned_ids: &HashSet<&str>,
    excluded_ids: &HashSet<&str>,
    forced: &[Rc<Item>],
    rng: &mut CardRng,
) -> Vec<Rc<Item>> {
    let mut pool: Vec<Rc<Item>> = catalog
        .iter()
        .filter(|item| !pinned_ids.contains(item.id.as_str()))
        .filter(|item| !excluded_ids.contains(item.id.as_str()))
        .filter(|item| !(constraints.exclude_premium && item.premium))
        .cloned()
        .collect();

    if constraints.exclude_variants {
        let taken: HashSet<u32> = forced
            .iter()
            .filter(|item| item.has_variant)
            .map(|item| item.ordinal)
            .collect();
        pool.retain(|item| !taken.contains(&item.ordinal));

        // Shuffle before de-duplicating so the surviving sibling of each
        // ordinal is uniformly random.
        rng.shuffle(&mut pool);
        let mut ordinals = HashSet::new();
        pool.retain(|item| ordinals.insert(item.ordinal));
    }

    pool
}

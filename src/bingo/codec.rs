//! Card state ⇄ compact share token.
//!
//! The token is base64 over compact JSON with six one-letter keys:
//!
//! ```text
//! {"s":[selected ids],"m":[pinned ids],"e":[excluded ids],"d":exclude_variants,"l":exclude_premium,"a":[active ids]}
//! ```
//!
//! Tokens are written with the standard padded alphabet, which matches the
//! tokens the browser app produced with `btoa`. The URL-safe unpadded
//! alphabet is accepted on the way in.

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::rc::Rc;

use crate::bingo::card::CardState;
use crate::catalog::{Catalog, Item};
use crate::error::BingoError;

/// Wire form of a card. Field order is the serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncodedCard {
    pub s: Vec<String>,
    pub m: Vec<String>,
    pub e: Vec<String>,
    pub d: bool,
    pub l: bool,
    pub a: Vec<String>,
}

impl From<&CardState> for EncodedCard {
    fn from(state: &CardState) -> Self {
        Self {
            s: ids(&state.selected),
            m: ids(&state.pinned),
            e: ids(&state.excluded),
            d: state.exclude_variants,
            l: state.exclude_premium,
            a: state.active.clone(),
        }
    }
}

pub fn encode(state: &CardState) -> String {
    let wire = EncodedCard::from(state);
    // Serializing plain strings and bools cannot fail.
    let json = serde_json::to_string(&wire).unwrap_or_default();
    BASE64_STANDARD.encode(json)
}

/// Rebuild a card state from a token. Every id must resolve against
/// `catalog`; the result is a fresh value, so a failure never touches the
/// caller's current state.
pub fn decode(token: &str, catalog: &Catalog, card_size: usize) -> Result<CardState, BingoError> {
    let wire = decode_wire(token)?;
    resolve(wire, catalog, card_size).inspect_err(|e| {
        tracing::warn!(error = %e, "rejected card state token");
    })
}

/// Undo the base64 + JSON layers without touching the catalog.
pub fn decode_wire(token: &str) -> Result<EncodedCard, BingoError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(BingoError::DecodeFailed("empty token".to_string()));
    }
    let bytes = BASE64_STANDARD
        .decode(token)
        .or_else(|_| BASE64_URL_SAFE_NO_PAD.decode(token))?;
    let json = String::from_utf8(bytes)
        .map_err(|_| BingoError::DecodeFailed("token is not UTF-8 text".to_string()))?;
    Ok(serde_json::from_str(&json)?)
}

fn resolve(wire: EncodedCard, catalog: &Catalog, card_size: usize) -> Result<CardState, BingoError> {
    if wire.s.len() > card_size {
        return Err(BingoError::DecodeFailed(format!(
            "{} selected items do not fit a card of {card_size}",
            wire.s.len()
        )));
    }

    let mut seen = HashSet::new();
    for id in &wire.s {
        if !seen.insert(id.as_str()) {
            return Err(BingoError::DecodeFailed(format!("{id:?} appears twice on the card")));
        }
    }

    let selected = lookup_all(&wire.s, catalog)?;
    let pinned = lookup_all(&dedup(wire.m), catalog)?;
    let excluded = lookup_all(&dedup(wire.e), catalog)?;

    let active = dedup(wire.a);
    if let Some(orphan) = active.iter().find(|id| !seen.contains(id.as_str())) {
        return Err(BingoError::DecodeFailed(format!(
            "marked item {orphan:?} is not on the card"
        )));
    }

    Ok(CardState {
        selected,
        pinned,
        excluded,
        exclude_variants: wire.d,
        exclude_premium: wire.l,
        active,
    })
}

fn lookup_all(ids: &[String], catalog: &Catalog) -> Result<Vec<Rc<Item>>, BingoError> {
    ids.iter()
        .map(|id| {
            catalog
                .get(id)
                .cloned()
                .ok_or_else(|| BingoError::DecodeFailed(format!("unknown item {id:?}")))
        })
        .collect()
}

/// Keep the first occurrence of each id, preserving order.
fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

fn ids(items: &[Rc<Item>]) -> Vec<String> {
    items.iter().map(|item| item.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bingo::card::BingoCard;
    use crate::bingo::rng::CardRng;
    use proptest::prelude::*;

    fn small() -> Catalog {
        Catalog::from_items(vec![Item::new("a", "A", 1), Item::new("b", "B", 2), Item::new("c", "C", 3)]).unwrap()
    }

    #[test]
    fn token_matches_browser_format() {
        let catalog = small();
        let state = CardState {
            selected: vec![catalog.resolve("a").unwrap(), catalog.resolve("b").unwrap()],
            pinned: vec![catalog.resolve("a").unwrap()],
            excluded: vec![],
            exclude_variants: false,
            exclude_premium: false,
            active: vec!["b".to_string()],
        };
        let token = encode(&state);
        let json = String::from_utf8(BASE64_STANDARD.decode(&token).unwrap()).unwrap();
        assert_eq!(json, r#"{"s":["a","b"],"m":["a"],"e":[],"d":false,"l":false,"a":["b"]}"#);
        assert!(token.bytes().all(|b| b.is_ascii_graphic()));
    }

    #[test]
    fn small_example_round_trips() {
        let catalog = small();
        let state = CardState {
            selected: vec![catalog.resolve("a").unwrap(), catalog.resolve("b").unwrap()],
            pinned: vec![catalog.resolve("a").unwrap()],
            excluded: vec![],
            exclude_variants: false,
            exclude_premium: false,
            active: vec!["b".to_string()],
        };
        let restored = decode(&encode(&state), &catalog, 25).unwrap();
        assert_eq!(restored, state);
        assert!(restored.is_active("b"));
        assert!(restored.is_pinned("a"));
    }

    #[test]
    fn encoding_is_deterministic() {
        let catalog = Catalog::bundled().unwrap();
        let mut card = BingoCard::new();
        card.extract(&catalog, &mut CardRng::from_seed(5), 25).unwrap();
        assert_eq!(encode(card.state()), encode(&card.state().clone()));
    }

    #[test]
    fn empty_card_round_trips() {
        let catalog = small();
        let state = CardState::default();
        assert_eq!(decode(&encode(&state), &catalog, 25).unwrap(), state);
    }

    #[test]
    fn garbage_is_rejected() {
        let catalog = small();
        let err = decode("not-valid-token", &catalog, 25).unwrap_err();
        assert_eq!(err.kind(), "decode_failed");
        assert!(decode("", &catalog, 25).is_err());
    }

    #[test]
    fn valid_base64_of_wrong_shape_is_rejected() {
        let catalog = small();
        let token = BASE64_STANDARD.encode(r#"{"s":["a"]}"#);
        assert!(decode(&token, &catalog, 25).is_err());
        let token = BASE64_STANDARD.encode(r#"{"s":[],"m":[],"e":[],"d":false,"l":false,"a":[],"x":1}"#);
        assert!(decode(&token, &catalog, 25).is_err());
    }

    #[test]
    fn stale_ids_are_rejected() {
        let catalog = small();
        let token = BASE64_STANDARD.encode(r#"{"s":["a","zz"],"m":[],"e":[],"d":false,"l":false,"a":[]}"#);
        let err = decode(&token, &catalog, 25).unwrap_err();
        assert_eq!(err, BingoError::DecodeFailed("unknown item \"zz\"".to_string()));
    }

    #[test]
    fn orphaned_active_ids_are_rejected() {
        let catalog = small();
        let token = BASE64_STANDARD.encode(r#"{"s":["a"],"m":[],"e":[],"d":false,"l":false,"a":["c"]}"#);
        assert!(decode(&token, &catalog, 25).is_err());
    }

    #[test]
    fn duplicate_cells_and_oversized_cards_are_rejected() {
        let catalog = small();
        let dup = BASE64_STANDARD.encode(r#"{"s":["a","a"],"m":[],"e":[],"d":false,"l":false,"a":[]}"#);
        assert!(decode(&dup, &catalog, 25).is_err());
        let big = BASE64_STANDARD.encode(r#"{"s":["a","b","c"],"m":[],"e":[],"d":false,"l":false,"a":[]}"#);
        assert!(decode(&big, &catalog, 2).is_err());
    }

    #[test]
    fn url_safe_tokens_and_whitespace_are_accepted() {
        let catalog = small();
        let json = r#"{"s":["a"],"m":[],"e":["b"],"d":true,"l":true,"a":["a"]}"#;
        let token = format!("  {}\n", BASE64_URL_SAFE_NO_PAD.encode(json));
        let state = decode(&token, &catalog, 25).unwrap();
        assert!(state.exclude_variants && state.exclude_premium);
        assert!(state.is_excluded("b"));
    }

    proptest! {
        #[test]
        fn reachable_states_round_trip(
            seed in any::<u64>(),
            pins in proptest::collection::vec(0usize..86, 0..6),
            excludes in proptest::collection::vec(0usize..86, 0..6),
            marks in proptest::collection::vec(0usize..25, 0..10),
            exclude_variants in any::<bool>(),
            exclude_premium in any::<bool>(),
        ) {
            let catalog = Catalog::bundled().unwrap();
            let all: Vec<Rc<Item>> = catalog.iter().cloned().collect();
            let mut card = BingoCard::new();
            for i in pins {
                card.pin(all[i].clone());
            }
            for i in excludes {
                card.exclude(all[i].clone());
            }
            card.set_exclude_variants(exclude_variants);
            card.set_exclude_premium(exclude_premium);
            if card.extract(&catalog, &mut CardRng::from_seed(seed), 25).is_ok() {
                for m in marks {
                    let id = card.state().selected[m].id.clone();
                    card.toggle(&id).unwrap();
                }
            }
            let restored = decode(&encode(card.state()), &catalog, 25).unwrap();
            prop_assert_eq!(&restored, card.state());
        }
    }
}

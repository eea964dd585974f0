//! Shared form parsing and JSON response helpers for route handlers.

use serde::Serialize;
use serde_json::json;

use crate::bingo::sync::CardSlot;
use crate::error::BingoError;

/// Decoded `key=value` pairs from a form body or query string.
///
/// Lookups return the first occurrence of a key. An empty value reads the
/// same as an absent one.
#[derive(Debug, Default)]
pub struct Params(Vec<(String, String)>);

impl Params {
    /// `application/x-www-form-urlencoded` request body.
    pub fn form(body: &str) -> Self {
        body.split('&')
            .filter(|field| !field.is_empty())
            .map(|field| {
                let (key, value) = field.split_once('=').unwrap_or((field, ""));
                (percent_decode(key), percent_decode(value))
            })
            .collect()
    }

    /// Query string, with or without its leading `?`.
    pub fn query(query: &str) -> Self {
        Self::form(query.strip_prefix('?').unwrap_or(query))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &str) -> Result<&str, BingoError> {
        self.get(key)
            .ok_or_else(|| BingoError::InvalidRequest(format!("missing {key} parameter")))
    }

    /// `slot=1` or `slot=2`; the first card when absent.
    pub fn slot(&self) -> Result<CardSlot, BingoError> {
        let Some(raw) = self.get("slot") else {
            return Ok(CardSlot::First);
        };
        raw.parse::<u8>()
            .ok()
            .and_then(CardSlot::from_number)
            .ok_or_else(|| BingoError::InvalidRequest(format!("invalid slot {raw:?}")))
    }

    /// Optional boolean; `None` when the key is absent.
    pub fn flag(&self, key: &str) -> Result<Option<bool>, BingoError> {
        self.get(key).map(parse_bool).transpose()
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Params(iter.into_iter().collect())
    }
}

/// Percent-decode a URL-encoded value. Multi-byte UTF-8 sequences are
/// reassembled; malformed escapes are kept literally.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => match bytes.get(i + 1..i + 3).and_then(hex_byte) {
                Some(b) => {
                    out.push(b);
                    i += 3;
                }
                None => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_byte(pair: &[u8]) -> Option<u8> {
    let s = core::str::from_utf8(pair).ok()?;
    u8::from_str_radix(s, 16).ok()
}

/// Parse `true/false/1/0/on/off`.
pub fn parse_bool(raw: &str) -> Result<bool, BingoError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(BingoError::InvalidRequest(format!("invalid boolean {raw:?}"))),
    }
}

pub fn json_ok<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn json_error(err: &BingoError) -> String {
    json!({ "error": err.kind(), "message": err.to_string() }).to_string()
}

/// Render a handler result as a JSON body.
pub fn respond<T: Serialize>(result: Result<T, BingoError>) -> String {
    match result {
        Ok(value) => json_ok(&value),
        Err(err) => json_error(&err),
    }
}

//! Pagination cursors.
//!
//! A [`Cursor`] records where the previous page ended: the tiebreak id and
//! the primary sort value of its last document. Cursors are never stored on
//! the server; a cursor is valid for as long as it decodes and its id is a
//! well-formed identifier of the store's [`IdKind`].
//!
//! Two encodings are supported:
//!
//! - the structured form `{"lastId": "...", "lastValue": ...}` returned in
//!   page metadata, with `lastValue` in canonical extended JSON so its BSON
//!   type survives the round trip;
//! - an opaque token, the URL-safe unpadded base64 of the structured form.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use bson::Bson;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    backend::IdKind,
    error::{PaginationError, PaginationResult},
    value::{JsonMode, to_json, type_name},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Cursor {
    /// Canonical string form of the last document's tiebreak id.
    pub last_id: String,
    /// The last document's primary sort value.
    #[serde(with = "crate::value::ext_json")]
    pub last_value: Bson,
}

/// A decoded cursor, ready to be compared against stored values.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPosition {
    pub id: Bson,
    pub value: Bson,
}

impl Cursor {
    /// Encodes the position of a document.
    ///
    /// Returns `None` when `tiebreak_id` is not an identifier of `kind`.
    pub fn encode(kind: IdKind, tiebreak_id: &Bson, sort_value: Bson) -> Option<Cursor> {
        Some(Cursor {
            last_id: kind.canonical(tiebreak_id)?,
            last_value: sort_value,
        })
    }

    /// Decodes this cursor against the store's identifier type.
    ///
    /// The id segment is checked explicitly; a cursor naming an id the store
    /// could never have produced is rejected before any query is issued.
    pub fn decode(&self, kind: IdKind) -> PaginationResult<CursorPosition> {
        let id = kind.parse(&self.last_id).ok_or_else(|| {
            PaginationError::MalformedCursor(format!(
                "'{}' is not a valid {} identifier",
                self.last_id,
                kind.name()
            ))
        })?;

        if matches!(self.last_value, Bson::Array(_) | Bson::Document(_)) {
            return Err(PaginationError::MalformedCursor(format!(
                "cursor value must be a scalar, got {}",
                type_name(&self.last_value)
            )));
        }

        Ok(CursorPosition { id, value: self.last_value.clone() })
    }

    /// The structured JSON form.
    pub fn to_json(&self) -> Value {
        json!({
            "lastId": self.last_id,
            "lastValue": to_json(&self.last_value, JsonMode::Canonical),
        })
    }

    /// The opaque token form.
    pub fn to_token(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_json().to_string())
    }

    pub fn from_token(token: &str) -> PaginationResult<Cursor> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| PaginationError::MalformedCursor(format!("invalid cursor token: {e}")))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| PaginationError::MalformedCursor(format!("invalid cursor token: {e}")))
    }

    /// Accepts either the structured form or an opaque token string.
    pub fn from_json(raw: &Value) -> PaginationResult<Cursor> {
        match raw {
            Value::String(token) => Cursor::from_token(token),
            Value::Object(_) => Cursor::deserialize(raw)
                .map_err(|e| PaginationError::MalformedCursor(e.to_string())),
            other => Err(PaginationError::MalformedCursor(format!(
                "cursor must be an object or a token string, got {other}"
            ))),
        }
    }
}

//! # Strata Codec
//!
//! Dynamic field values and the binary encoding used for stored rows.
//!
//! Entities describe themselves as a [`FieldMap`] (field name → [`Value`]).
//! That representation is what the version history diffs, what edge
//! metadata carries, and what the store persists, CBOR-encoded through
//! `ciborium`.
//!
//! ## Usage
//!
//! ```
//! use strata_codec::{diff_fields, from_cbor, to_cbor, FieldMap, Value};
//!
//! let mut before = FieldMap::new();
//! before.insert("title".into(), Value::from("A"));
//!
//! let mut after = before.clone();
//! after.insert("title".into(), Value::from("B"));
//!
//! let changes = diff_fields(&before, &after);
//! assert_eq!(changes.get("title"), Some(&Value::from("B")));
//!
//! let bytes = to_cbor(&after).unwrap();
//! let decoded: FieldMap = from_cbor(&bytes).unwrap();
//! assert_eq!(decoded, after);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod diff;
mod error;
mod fields;
mod value;

pub use cbor::{from_cbor, to_cbor};
pub use diff::diff_fields;
pub use error::{CodecError, CodecResult};
pub use fields::FieldAccess;
pub use value::{FieldMap, Value};

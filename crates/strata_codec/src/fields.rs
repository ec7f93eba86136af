//! Typed field lookups for hand-written entity codecs.

use crate::error::{CodecError, CodecResult};
use crate::value::{FieldMap, Value};

/// Typed accessors over a [`FieldMap`].
///
/// ```
/// use strata_codec::{FieldAccess, FieldMap, Value};
///
/// let mut fields = FieldMap::new();
/// fields.insert("title".into(), Value::from("Buy milk"));
/// fields.insert("done".into(), Value::from(false));
///
/// assert_eq!(fields.text("title").unwrap(), "Buy milk");
/// assert!(!fields.boolean("done").unwrap());
/// assert!(fields.opt_text("notes").unwrap().is_none());
/// ```
pub trait FieldAccess {
    /// Returns a required text field.
    ///
    /// # Errors
    ///
    /// Fails if the field is missing or not text.
    fn text(&self, field: &str) -> CodecResult<String>;

    /// Returns an optional text field; null counts as absent.
    ///
    /// # Errors
    ///
    /// Fails if the field holds a non-text value.
    fn opt_text(&self, field: &str) -> CodecResult<Option<String>>;

    /// Returns a required integer field.
    ///
    /// # Errors
    ///
    /// Fails if the field is missing or not an integer.
    fn integer(&self, field: &str) -> CodecResult<i64>;

    /// Returns an optional integer field; null counts as absent.
    ///
    /// # Errors
    ///
    /// Fails if the field holds a non-integer value.
    fn opt_integer(&self, field: &str) -> CodecResult<Option<i64>>;

    /// Returns a required boolean field.
    ///
    /// # Errors
    ///
    /// Fails if the field is missing or not a boolean.
    fn boolean(&self, field: &str) -> CodecResult<bool>;
}

fn present<'a>(map: &'a FieldMap, field: &str) -> Option<&'a Value> {
    map.get(field).filter(|v| !v.is_null())
}

impl FieldAccess for FieldMap {
    fn text(&self, field: &str) -> CodecResult<String> {
        self.opt_text(field)?
            .ok_or_else(|| CodecError::missing_field(field))
    }

    fn opt_text(&self, field: &str) -> CodecResult<Option<String>> {
        present(self, field)
            .map(|v| {
                v.as_text()
                    .map(str::to_string)
                    .ok_or_else(|| CodecError::type_mismatch(field, "text"))
            })
            .transpose()
    }

    fn integer(&self, field: &str) -> CodecResult<i64> {
        self.opt_integer(field)?
            .ok_or_else(|| CodecError::missing_field(field))
    }

    fn opt_integer(&self, field: &str) -> CodecResult<Option<i64>> {
        present(self, field)
            .map(|v| {
                v.as_integer()
                    .ok_or_else(|| CodecError::type_mismatch(field, "integer"))
            })
            .transpose()
    }

    fn boolean(&self, field: &str) -> CodecResult<bool> {
        present(self, field)
            .ok_or_else(|| CodecError::missing_field(field))?
            .as_bool()
            .ok_or_else(|| CodecError::type_mismatch(field, "bool"))
    }
}

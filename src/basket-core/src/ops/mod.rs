//! Relational operations over [`Relation`](crate::Relation) values.
//!
//! | Module | Operations |
//! |--------|------------|
//! | [`aggregate`] | hash group-by with mergeable accumulators |
//! | [`join`] | inner hash join on a shared key column |
//! | [`sort`] | total sort by one or more keys |
//! | [`window`] | partitioned dense ranking |

pub mod aggregate;
pub mod join;
pub mod sort;
pub mod window;

use arrow::array::{Array, ArrayRef, Int64Array, StringArray};

use common_error::{BasketError, BasketResult};

/// A typed scalar used as a grouping, join or partition key.
///
/// Key equality is exact typed equality; ordering is the natural order of
/// the underlying type, used to emit grouped output deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    /// 64-bit integer key (ids, hours).
    Int64(i64),
    /// String key (dimension names).
    Utf8(String),
}

impl std::fmt::Display for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
        }
    }
}

/// Read the key value at `row`, or `None` for a null.
///
/// Only Int64 and Utf8 columns can serve as keys.
pub(crate) fn key_value(array: &ArrayRef, row: usize) -> BasketResult<Option<KeyValue>> {
    if array.is_null(row) {
        return Ok(None);
    }
    if let Some(ints) = array.as_any().downcast_ref::<Int64Array>() {
        Ok(Some(KeyValue::Int64(ints.value(row))))
    } else if let Some(strings) = array.as_any().downcast_ref::<StringArray>() {
        Ok(Some(KeyValue::Utf8(strings.value(row).to_string())))
    } else {
        Err(BasketError::type_error(format!(
            "unsupported key type {:?}",
            array.data_type()
        )))
    }
}

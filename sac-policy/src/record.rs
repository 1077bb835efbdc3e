//! Named outputs of model runs.
//!
//! Every pass through a [`PolicyModel`](crate::PolicyModel) returns a [`Record`]
//! keyed by the names of the requested [`OutputSlot`](crate::OutputSlot)s.
//! Reward signals also report their training statistics with it.
//!
//! ```rust
//! use sac_policy::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("policy_loss", 0.5);
//! record.insert("update_batch", RecordValue::Done);
//!
//! assert_eq!(record.get_scalar("policy_loss").unwrap(), 0.5);
//! assert!(record.contains_key("update_batch"));
//! ```
use crate::error::PolicyError;
use indexmap::{
    map::{IntoIter, Iter, Keys},
    IndexMap,
};
use ndarray::ArrayD;

/// A value stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single value, such as a loss or the learning rate.
    Scalar(f32),

    /// An array, such as actions or per-agent value estimates.
    Array(ArrayD<f32>),

    /// Confirmation that an update sub-pass was executed.
    Done,
}

/// Ordered map from output names to [`RecordValue`]s.
///
/// Insertion order is preserved, so a record returned by a model lists its
/// outputs in the order they were requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(IndexMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(IndexMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        let mut record = Self::empty();
        record.insert(name, RecordValue::Scalar(value));
        record
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<'_, String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair, replacing an existing value of the same key.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns a reference to the value of the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Returns `true` if the record has the given key.
    pub fn contains_key(&self, k: &str) -> bool {
        self.0.contains_key(k)
    }

    /// Removes the value of the given key and returns it.
    pub fn remove(&mut self, k: &str) -> Option<RecordValue> {
        self.0.shift_remove(k)
    }

    /// Merges another record into this one.
    ///
    /// Values of `record` overwrite values of the same key.
    pub fn merge_inplace(&mut self, record: Record) {
        for (k, v) in record {
            self.0.insert(k, v);
        }
    }

    /// Gets a scalar value.
    pub fn get_scalar(&self, k: &str) -> Result<f32, PolicyError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(PolicyError::OutputType {
                key: k.to_string(),
                expected: "Scalar".to_string(),
            }),
            None => Err(PolicyError::MissingOutput(k.to_string())),
        }
    }

    /// Gets an array value.
    pub fn get_array(&self, k: &str) -> Result<&ArrayD<f32>, PolicyError> {
        match self.0.get(k) {
            Some(RecordValue::Array(v)) => Ok(v),
            Some(_) => Err(PolicyError::OutputType {
                key: k.to_string(),
                expected: "Array".to_string(),
            }),
            None => Err(PolicyError::MissingOutput(k.to_string())),
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Record {
    type Item = (String, RecordValue);
    type IntoIter = IntoIter<String, RecordValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut, Index};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::{self, MetadataValue};
use crate::error::StoreError;

/// A flat map of attribute keys to encoded literals.
///
/// Values are stored exactly as persisted; use [`Attributes::get_value`] and
/// [`Attributes::set_value`] to go through the codec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, String>);

/// Recording-level attributes of one origin group.
pub type OriginAttributes = Attributes;

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw encoded literal for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert an already encoded literal.
    pub fn insert(&mut self, key: impl Into<String>, literal: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), literal.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Decode the value stored under `key`.
    pub fn get_value(&self, key: &str) -> Option<MetadataValue> {
        self.get(key).map(codec::decode)
    }

    /// Encode `value` and store it under `key`.
    pub fn set_value(
        &mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Result<(), StoreError> {
        let literal = codec::encode(&value.into())?;
        self.0.insert(key.into(), literal);
        Ok(())
    }

    /// Copy every entry of `other` whose key is not present yet.
    pub fn extend_missing(&mut self, other: &Attributes) {
        for (key, value) in other {
            self.0
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<&str> for Attributes {
    type Output = str;

    /// Panics if the key is missing, like `BTreeMap` indexing.
    fn index(&self, key: &str) -> &str {
        match self.0.get(key) {
            Some(value) => value,
            None => panic!("no attribute named '{key}'"),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Where a set of trace attributes was read from. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub store_path: PathBuf,
    pub global_index: usize,
}

/// Attributes of a single trace as returned by a read: the trace's own
/// entries merged with its origin group's, plus the provenance of the read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceAttributes {
    attrs: Attributes,
    provenance: Option<Provenance>,
}

impl TraceAttributes {
    /// Attributes without provenance. A store rejects writing these back.
    pub fn new(attrs: Attributes) -> Self {
        Self {
            attrs,
            provenance: None,
        }
    }

    pub(crate) fn with_provenance(attrs: Attributes, store_path: &Path, global_index: usize) -> Self {
        Self {
            attrs,
            provenance: Some(Provenance {
                store_path: store_path.to_path_buf(),
                global_index,
            }),
        }
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    /// Drop the provenance and return the plain attributes.
    pub fn into_attributes(self) -> Attributes {
        self.attrs
    }
}

impl Deref for TraceAttributes {
    type Target = Attributes;

    fn deref(&self) -> &Attributes {
        &self.attrs
    }
}

impl DerefMut for TraceAttributes {
    fn deref_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }
}

impl From<Attributes> for TraceAttributes {
    fn from(attrs: Attributes) -> Self {
        Self::new(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access_goes_through_codec() {
        let mut attrs = Attributes::new();
        attrs.set_value("onset_shift", 5).unwrap();
        attrs.set_value("xyz_coords", [1.0, f64::NAN, 3.5]).unwrap();
        assert_eq!(attrs.get("onset_shift"), Some("5"));
        assert_eq!(attrs.get("xyz_coords"), Some("[1.0, nan, 3.5]"));
        assert_eq!(attrs.get_value("onset_shift"), Some(MetadataValue::Int(5)));
        assert!(attrs.get_value("missing").is_none());
    }

    #[test]
    fn test_set_value_rejects_ambiguous_strings() {
        let mut attrs = Attributes::new();
        let err = attrs.set_value("subject", "007").unwrap_err();
        assert!(matches!(err, StoreError::EncodingViolation(_)));
        assert!(!attrs.contains_key("subject"));
    }

    #[test]
    fn test_extend_missing_keeps_existing_entries() {
        let mut trace: Attributes = [("comment", "trace"), ("id", "0")].into_iter().collect();
        let origin: Attributes = [("comment", "origin"), ("subject", "S01")]
            .into_iter()
            .collect();
        trace.extend_missing(&origin);
        assert_eq!(&trace["comment"], "trace");
        assert_eq!(&trace["subject"], "S01");
        assert_eq!(trace.len(), 3);
    }

    #[test]
    fn test_trace_attributes_deref_and_provenance() {
        let attrs: Attributes = [("id", "3")].into_iter().collect();
        let mut trace = TraceAttributes::with_provenance(attrs, Path::new("/tmp/a.tstore"), 3);
        trace.insert("comment", "edited");
        assert_eq!(&trace["comment"], "edited");
        assert_eq!(trace.provenance().unwrap().global_index, 3);
        assert!(TraceAttributes::new(trace.into_attributes()).provenance().is_none());
    }
}

use std::ops::ControlFlow;

use crate::codec::{self, MetadataValue};
use crate::error::StoreError;

use super::container::Container;

/// Trace keys of one origin group, in ascending numeric order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupKeys {
    pub origin: String,
    pub keys: Vec<String>,
}

/// Location of one trace inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Address<'a> {
    pub group: usize,
    pub key: &'a str,
}

/// The global index of a store: origin groups in store order, each with its
/// trace keys sorted numerically.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Layout {
    groups: Vec<GroupKeys>,
    len: usize,
}

impl Layout {
    pub fn new(groups: Vec<GroupKeys>) -> Self {
        let len = groups.iter().map(|g| g.keys.len()).sum();
        Self { groups, len }
    }

    /// Build the layout of a container, rejecting keys that are not
    /// non-negative integers or that collide numerically.
    pub fn from_container(container: &Container) -> Result<Self, StoreError> {
        let groups = container
            .origins
            .iter()
            .map(|group| -> Result<GroupKeys, StoreError> {
                let keys = sort_keys(group.traces.keys().map(String::as_str)).map_err(|e| {
                    StoreError::InvalidFormat(format!("origin '{}': {e}", group.origin))
                })?;
                Ok(GroupKeys {
                    origin: group.origin.clone(),
                    keys,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(groups))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.origin.as_str())
    }

    pub fn groups(&self) -> &[GroupKeys] {
        &self.groups
    }

    /// Map a global index to its group and trace key.
    pub fn resolve(&self, index: usize) -> Option<Address<'_>> {
        let found = self
            .groups
            .iter()
            .enumerate()
            .try_fold(0usize, |start, (group, keys)| {
                let end = start + keys.keys.len();
                if index < end {
                    ControlFlow::Break(Address {
                        group,
                        key: &keys.keys[index - start],
                    })
                } else {
                    ControlFlow::Continue(end)
                }
            });
        match found {
            ControlFlow::Break(address) => Some(address),
            ControlFlow::Continue(_) => None,
        }
    }
}

/// Sort trace keys by their numeric value.
pub(crate) fn sort_keys<'a>(keys: impl Iterator<Item = &'a str>) -> Result<Vec<String>, String> {
    let mut numbered = keys
        .map(|key| parse_trace_key(key).map(|n| (n, key)))
        .collect::<Result<Vec<_>, _>>()?;
    numbered.sort_unstable();
    if let Some(pair) = numbered.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(format!(
            "trace keys '{}' and '{}' denote the same index",
            pair[0].1, pair[1].1
        ));
    }
    Ok(numbered.into_iter().map(|(_, key)| key.to_string()).collect())
}

/// A trace key is a non-negative integer with no fractional remainder,
/// e.g. `"12"` or `"12.0"`.
pub(crate) fn parse_trace_key(key: &str) -> Result<u64, String> {
    let number = match codec::decode(key) {
        MetadataValue::Int(i) => u64::try_from(i).ok(),
        MetadataValue::Float(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < 1e19 => {
            Some(f as u64)
        }
        _ => None,
    };
    number.ok_or_else(|| format!("trace key '{key}' is not a non-negative integer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(groups: Vec<(&str, Vec<&str>)>) -> Layout {
        Layout::new(
            groups
                .into_iter()
                .map(|(origin, keys)| GroupKeys {
                    origin: origin.to_string(),
                    keys: sort_keys(keys.into_iter()).unwrap(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_keys_sort_numerically() {
        assert_eq!(
            sort_keys(["2", "10", "1"].into_iter()).unwrap(),
            vec!["1", "2", "10"]
        );
    }

    #[test]
    fn test_resolve_walks_groups_in_store_order() {
        let layout = layout(vec![
            ("b.xdf", vec!["2", "10", "1"]),
            ("a.xdf", vec![]),
            ("c.xdf", vec!["0", "3"]),
        ]);
        assert_eq!(layout.len(), 5);
        let resolved: Vec<(usize, &str)> = (0..layout.len())
            .map(|i| {
                let a = layout.resolve(i).unwrap();
                (a.group, a.key)
            })
            .collect();
        assert_eq!(
            resolved,
            vec![(0, "1"), (0, "2"), (0, "10"), (2, "0"), (2, "3")]
        );
        assert!(layout.resolve(5).is_none());
        assert_eq!(layout.origins().collect::<Vec<_>>(), ["b.xdf", "a.xdf", "c.xdf"]);
    }

    #[test]
    fn test_bad_keys_are_rejected() {
        assert!(parse_trace_key("-1").is_err());
        assert!(parse_trace_key("1.5").is_err());
        assert!(parse_trace_key("one").is_err());
        assert!(parse_trace_key("nan").is_err());
        assert_eq!(parse_trace_key("4.0"), Ok(4));
        assert!(sort_keys(["1", "1.0"].into_iter()).is_err());
    }

    #[test]
    fn test_empty_layout() {
        let layout = Layout::default();
        assert_eq!(layout.len(), 0);
        assert!(layout.resolve(0).is_none());
    }
}

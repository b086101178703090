use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::codec;
use crate::config::StoreSettings;
use crate::error::StoreError;
use crate::model::{Annotations, OriginAttributes, OriginParts, TraceAttributes, TraceData};
use crate::schema::Schema;

use super::container::{self, check_valid_suffix, Container, Fingerprint, Snapshot};
use super::layout::Layout;

#[derive(Debug)]
struct CachedLayout {
    fingerprint: Fingerprint,
    layout: Arc<Layout>,
}

/// Handle on a store file.
///
/// The handle holds no open file: every operation opens the file, locks it
/// for the duration of the call and closes it again. The addressing layout is
/// cached per handle and rebuilt whenever the file's size or modification
/// time changes, on every write through this handle, and on [`refresh`].
///
/// [`refresh`]: TraceStore::refresh
#[derive(Debug)]
pub struct TraceStore {
    path: PathBuf,
    settings: StoreSettings,
    cache: Mutex<Option<CachedLayout>>,
}

impl TraceStore {
    /// Open an existing store with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(path, StoreSettings::default())
    }

    pub fn open_with(path: impl AsRef<Path>, settings: StoreSettings) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StoreError::NotFound {
                path: path.to_path_buf(),
            });
        }
        check_valid_suffix(path)?;
        let store = Self {
            path: path.canonicalize()?,
            settings,
            cache: Mutex::new(None),
        };
        let snapshot = container::read(&store.path)?;
        store.layout_of(&snapshot)?;
        debug!(path = %store.path.display(), "opened store");
        Ok(store)
    }

    /// Canonical path of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Total number of traces across all origins.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.current_layout()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Origin names in store order.
    pub fn origins(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.current_layout()?.origins().map(str::to_string).collect())
    }

    /// Drop the cached layout so the next call re-reads the file.
    pub fn refresh(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn get_trace_data(&self, index: usize) -> Result<TraceData, StoreError> {
        let snapshot = container::read(&self.path)?;
        let layout = self.layout_of(&snapshot)?;
        let (group, key) = locate(&layout, index)?;
        let mut container = snapshot.container;
        let record = container.origins[group]
            .traces
            .remove(&key)
            .ok_or_else(|| missing_trace(&key))?;
        record.into_data()
    }

    /// Attributes of trace `index`, merged with those of its origin group and
    /// stamped with provenance for a later [`set_trace_attrs`].
    ///
    /// [`set_trace_attrs`]: TraceStore::set_trace_attrs
    pub fn get_trace_attrs(&self, index: usize) -> Result<TraceAttributes, StoreError> {
        let snapshot = container::read(&self.path)?;
        let layout = self.layout_of(&snapshot)?;
        let (group, key) = locate(&layout, index)?;
        let group = &snapshot.container.origins[group];
        let record = group.traces.get(&key).ok_or_else(|| missing_trace(&key))?;

        let mut attrs = record.attrs.clone();
        attrs.extend_missing(&group.attrs);
        attrs.insert("origin", group.origin.as_str());
        Ok(TraceAttributes::with_provenance(attrs, &self.path, index))
    }

    /// Write attributes read from this store at this index back to it.
    ///
    /// Keys that are not part of the trace's schema are dropped; the others
    /// overwrite the stored values one by one.
    pub fn set_trace_attrs(&self, index: usize, attrs: &TraceAttributes) -> Result<(), StoreError> {
        let provenance = attrs.provenance().ok_or_else(|| {
            StoreError::StaleWriteRejected("attributes were not read from a store".into())
        })?;
        if provenance.store_path != self.path {
            return Err(StoreError::StaleWriteRejected(format!(
                "attributes were read from {}, not {}",
                provenance.store_path.display(),
                self.path.display()
            )));
        }
        if provenance.global_index != index {
            return Err(StoreError::StaleWriteRejected(format!(
                "attributes were read for trace {}, not {index}",
                provenance.global_index
            )));
        }

        let schema = Schema::for_attributes(attrs)?;
        let filtered = schema.filter(attrs);
        if self.settings.validate_on_write {
            schema.validate(&filtered)?;
        }

        self.edit_trace(index, |record| {
            for (key, value) in &filtered {
                record.attrs.insert(key.as_str(), value.as_str());
            }
            Ok(())
        })?;
        info!(index, keys = filtered.len(), "updated trace attributes");
        Ok(())
    }

    /// Overwrite the samples of trace `index`. The shape can not change.
    pub fn write_trace_data(&self, index: usize, data: &TraceData) -> Result<(), StoreError> {
        self.edit_trace(index, |record| {
            if record.shape() != data.shape() {
                return Err(StoreError::ShapeMismatch {
                    expected: record.shape(),
                    actual: data.shape(),
                });
            }
            record.values = data.values().to_vec();
            Ok(())
        })?;
        info!(index, "overwrote trace data");
        Ok(())
    }

    /// Lazy iterator over `(data, attributes)` in global index order.
    pub fn iter(&self) -> Result<TraceIter<'_>, StoreError> {
        Ok(TraceIter {
            store: self,
            next: 0,
            len: self.len()?,
        })
    }

    /// Annotations of every origin group, traces in numeric key order. Trace
    /// attributes are returned as stored, without the origin's merged in.
    pub fn annotations(&self) -> Result<Vec<Annotations>, StoreError> {
        Ok(self
            .recover_parts()?
            .into_iter()
            .map(|part| part.annotations)
            .collect())
    }

    /// Annotations plus sample data of every origin group: what
    /// [`populate`](crate::storage::populate) needs to rebuild the store.
    pub fn recover_parts(&self) -> Result<Vec<OriginParts>, StoreError> {
        let snapshot = container::read(&self.path)?;
        let layout = self.layout_of(&snapshot)?;
        snapshot
            .container
            .origins
            .into_iter()
            .zip(layout.groups())
            .map(|(mut group, keys)| -> Result<OriginParts, StoreError> {
                let mut traces = Vec::with_capacity(keys.keys.len());
                let mut data = Vec::with_capacity(keys.keys.len());
                for key in &keys.keys {
                    let record = group.traces.remove(key).ok_or_else(|| missing_trace(key))?;
                    traces.push(record.attrs.clone());
                    data.push(record.into_data()?);
                }
                Ok(OriginParts {
                    annotations: Annotations {
                        origin: group.origin,
                        attrs: group.attrs,
                        traces,
                    },
                    data,
                })
            })
            .collect()
    }

    /// Per-origin overview of the store.
    pub fn summary(&self) -> Result<StoreSummary, StoreError> {
        let snapshot = container::read(&self.path)?;
        let origins = snapshot
            .container
            .origins
            .into_iter()
            .map(|group| OriginSummary {
                traces: group.traces.len(),
                origin: group.origin,
                attrs: group.attrs,
            })
            .collect();
        Ok(StoreSummary {
            path: self.path.clone(),
            origins,
        })
    }

    /// Parse a textual index, as typed by a user.
    pub fn parse_index(&self, text: &str) -> Result<usize, StoreError> {
        let index = codec::decode(text.trim())
            .as_int()
            .ok_or_else(|| StoreError::TypeError(text.to_string()))?;
        let len = self.len()?;
        usize::try_from(index)
            .ok()
            .filter(|i| *i < len)
            .ok_or(StoreError::IndexOutOfRange { index, len })
    }

    /// The cached layout if the file is unchanged, otherwise a fresh one.
    fn current_layout(&self) -> Result<Arc<Layout>, StoreError> {
        let fingerprint = Fingerprint::of(&self.path)?;
        if let Some(cached) = self.cache.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            if cached.fingerprint == fingerprint {
                return Ok(Arc::clone(&cached.layout));
            }
        }
        let snapshot = container::read(&self.path)?;
        self.layout_of(&snapshot)
    }

    /// Layout matching `snapshot`, reusing the cache when the fingerprints agree.
    fn layout_of(&self, snapshot: &Snapshot) -> Result<Arc<Layout>, StoreError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.as_ref() {
            if cached.fingerprint == snapshot.fingerprint {
                return Ok(Arc::clone(&cached.layout));
            }
        }
        let layout = Arc::new(Layout::from_container(&snapshot.container)?);
        debug!(traces = layout.len(), "rebuilt store layout");
        *cache = Some(CachedLayout {
            fingerprint: snapshot.fingerprint,
            layout: Arc::clone(&layout),
        });
        Ok(layout)
    }

    /// Read-modify-write of one trace record. The layout is rebuilt from the
    /// locked container so the index resolves against what is on disk.
    fn edit_trace(
        &self,
        index: usize,
        edit: impl FnOnce(&mut container::TraceRecord) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let result = container::update(&self.path, self.settings.pretty, |c: &mut Container| {
            let layout = Layout::from_container(c)?;
            let (group, key) = locate(&layout, index)?;
            let record = c.origins[group]
                .traces
                .get_mut(&key)
                .ok_or_else(|| missing_trace(&key))?;
            edit(record)
        });
        self.refresh();
        result
    }
}

fn locate(layout: &Layout, index: usize) -> Result<(usize, String), StoreError> {
    let address = layout.resolve(index).ok_or(StoreError::IndexOutOfRange {
        index: i64::try_from(index).unwrap_or(i64::MAX),
        len: layout.len(),
    })?;
    debug!(index, group = address.group, key = address.key, "resolved trace");
    Ok((address.group, address.key.to_string()))
}

fn missing_trace(key: &str) -> StoreError {
    StoreError::InvalidFormat(format!(
        "trace '{key}' vanished while reading; call refresh and retry"
    ))
}

/// Iterator returned by [`TraceStore::iter`]. Each item reads the file anew.
pub struct TraceIter<'a> {
    store: &'a TraceStore,
    next: usize,
    len: usize,
}

impl Iterator for TraceIter<'_> {
    type Item = Result<(TraceData, TraceAttributes), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let item = self
            .store
            .get_trace_data(index)
            .and_then(|data| Ok((data, self.store.get_trace_attrs(index)?)));
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TraceIter<'_> {}

#[derive(Debug, Clone, PartialEq)]
pub struct OriginSummary {
    pub origin: String,
    pub attrs: OriginAttributes,
    pub traces: usize,
}

/// Printable overview of a store, as shown by `tracestore peek`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSummary {
    pub path: PathBuf,
    pub origins: Vec<OriginSummary>,
}

impl StoreSummary {
    pub fn total_traces(&self) -> usize {
        self.origins.iter().map(|o| o.traces).sum()
    }
}

impl fmt::Display for StoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.path.display())?;
        for origin in &self.origins {
            writeln!(f, "-------------------------------------------------------------")?;
            writeln!(f, "{} with {} traces", origin.origin, origin.traces)?;
            writeln!(f)?;
            for (key, value) in &origin.attrs {
                writeln!(f, "{key:>20} : {value}")?;
            }
        }
        writeln!(f)?;
        write!(
            f,
            "In total, there are {} traces from {} origins",
            self.total_traces(),
            self.origins.len()
        )
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{Read as _, Seek, SeekFrom, Write as _};
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{Attributes, TraceData};

/// File extension every store must carry.
pub const STORE_SUFFIX: &str = "tstore";

const FORMAT_SIGNATURE: &str = "tracestore";
const FORMAT_VERSION: u32 = 1;

/// Fail unless `path` ends in `.tstore`. Does not touch the file.
pub fn check_valid_suffix(path: &Path) -> Result<(), StoreError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(STORE_SUFFIX) => Ok(()),
        _ => Err(StoreError::InvalidFormat(format!(
            "{} does not have the .{STORE_SUFFIX} suffix",
            path.display()
        ))),
    }
}

/// On-disk document of a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Container {
    pub format: String,
    pub version: u32,
    pub origins: Vec<OriginGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct OriginGroup {
    pub origin: String,
    pub attrs: Attributes,
    pub traces: BTreeMap<String, TraceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TraceRecord {
    pub attrs: Attributes,
    pub samples: usize,
    pub channels: usize,
    #[serde(with = "sample_values")]
    pub values: Vec<f64>,
}

impl Container {
    pub fn new(origins: Vec<OriginGroup>) -> Self {
        Self {
            format: FORMAT_SIGNATURE.to_string(),
            version: FORMAT_VERSION,
            origins,
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.format != FORMAT_SIGNATURE {
            return Err(StoreError::InvalidFormat(format!(
                "unexpected signature '{}'",
                self.format
            )));
        }
        if self.version != FORMAT_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "unsupported container version {}",
                self.version
            )));
        }
        let mut seen = BTreeSet::new();
        for group in &self.origins {
            if !seen.insert(group.origin.as_str()) {
                return Err(StoreError::InvalidFormat(format!(
                    "origin '{}' appears more than once",
                    group.origin
                )));
            }
            for (key, record) in &group.traces {
                if record.samples.checked_mul(record.channels) != Some(record.values.len()) {
                    return Err(StoreError::InvalidFormat(format!(
                        "trace {}/{key} holds {} values for shape {}x{}",
                        group.origin,
                        record.values.len(),
                        record.samples,
                        record.channels
                    )));
                }
            }
        }
        Ok(())
    }
}

impl TraceRecord {
    pub fn from_data(attrs: Attributes, data: &TraceData) -> Self {
        Self {
            attrs,
            samples: data.samples(),
            channels: data.channels(),
            values: data.values().to_vec(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.samples, self.channels)
    }

    pub fn into_data(self) -> Result<TraceData, StoreError> {
        TraceData::new(self.samples, self.channels, self.values)
    }
}

/// Size and modification time of a store file, used to tell whether cached
/// addressing is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    fn from_metadata(meta: &fs::Metadata) -> Self {
        Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }

    pub fn of(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::from_metadata(&fs::metadata(path)?))
    }
}

/// A container as read in one call, with the fingerprint it had at the time.
#[derive(Debug)]
pub(crate) struct Snapshot {
    pub container: Container,
    pub fingerprint: Fingerprint,
}

/// Read and check the container under a shared lock.
pub(crate) fn read(path: &Path) -> Result<Snapshot, StoreError> {
    let file = File::open(path)?;
    fs2::FileExt::lock_shared(&file).map_err(StoreError::Io)?;
    let result = read_locked(&file);
    fs2::FileExt::unlock(&file).map_err(StoreError::Io)?;
    let (container, fingerprint) = result?;
    Ok(Snapshot {
        container,
        fingerprint,
    })
}

/// Write a new container, replacing whatever `path` held.
pub(crate) fn create(path: &Path, container: &Container, pretty: bool) -> Result<(), StoreError> {
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    fs2::FileExt::lock_exclusive(&file).map_err(StoreError::Io)?;
    let result = write_locked(&file, container, pretty);
    fs2::FileExt::unlock(&file).map_err(StoreError::Io)?;
    result
}

/// Read-modify-write under an exclusive lock. The file is rewritten only when
/// `edit` succeeds.
pub(crate) fn update<T>(
    path: &Path,
    pretty: bool,
    edit: impl FnOnce(&mut Container) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let file = fs::OpenOptions::new().read(true).write(true).open(path)?;
    fs2::FileExt::lock_exclusive(&file).map_err(StoreError::Io)?;
    let result = read_locked(&file).and_then(|(mut container, _)| {
        let out = edit(&mut container)?;
        write_locked(&file, &container, pretty)?;
        Ok(out)
    });
    fs2::FileExt::unlock(&file).map_err(StoreError::Io)?;
    result
}

fn read_locked(file: &File) -> Result<(Container, Fingerprint), StoreError> {
    let fingerprint = Fingerprint::from_metadata(&file.metadata()?);
    let mut data = String::new();
    let mut reader = file;
    reader.read_to_string(&mut data).map_err(|e| match e.kind() {
        std::io::ErrorKind::InvalidData => StoreError::InvalidFormat("store is not UTF-8 text".into()),
        _ => StoreError::Io(e),
    })?;
    let container: Container = serde_json::from_str(&data)
        .map_err(|e| StoreError::InvalidFormat(format!("not a trace store container: {e}")))?;
    container.check()?;
    Ok((container, fingerprint))
}

fn write_locked(file: &File, container: &Container, pretty: bool) -> Result<(), StoreError> {
    let json = if pretty {
        serde_json::to_vec_pretty(container)?
    } else {
        serde_json::to_vec(container)?
    };
    let mut writer = file;
    file.set_len(0)?;
    writer.seek(SeekFrom::Start(0))?;
    writer.write_all(&json)?;
    writer.flush()?;
    Ok(())
}

/// Sample buffers as JSON numbers, with non-finite values spelled as the
/// codec's special float tokens.
mod sample_values {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::codec::literal::{format_float, special_float};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Sample {
        Number(f64),
        Token(String),
    }

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| {
            if v.is_finite() {
                Sample::Number(*v)
            } else {
                Sample::Token(format_float(*v))
            }
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<Sample>::deserialize(deserializer)?
            .into_iter()
            .map(|sample| match sample {
                Sample::Number(v) => Ok(v),
                Sample::Token(token) => special_float(&token)
                    .ok_or_else(|| D::Error::custom(format!("invalid sample value '{token}'"))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn one_trace_container() -> Container {
        let data = TraceData::new(2, 2, vec![1.0, f64::NAN, f64::NEG_INFINITY, 4.5]).unwrap();
        let mut traces = BTreeMap::new();
        traces.insert(
            "0".to_string(),
            TraceRecord::from_data([("id", "0")].into_iter().collect(), &data),
        );
        Container::new(vec![OriginGroup {
            origin: "a.xdf".into(),
            attrs: Attributes::new(),
            traces,
        }])
    }

    #[test]
    fn test_suffix_check() {
        assert!(check_valid_suffix(Path::new("/data/x.tstore")).is_ok());
        assert!(matches!(
            check_valid_suffix(Path::new("/data/x.hdf5")),
            Err(StoreError::InvalidFormat(_))
        ));
        assert!(check_valid_suffix(Path::new("/data/tstore")).is_err());
    }

    #[test]
    fn test_create_read_keeps_non_finite_samples() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.tstore");
        create(&path, &one_trace_container(), false).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#"[1.0,"nan","-inf",4.5]"#));

        let snapshot = read(&path).unwrap();
        let record = &snapshot.container.origins[0].traces["0"];
        assert!(record.values[1].is_nan());
        assert_eq!(record.values[2], f64::NEG_INFINITY);
    }

    #[test]
    fn test_update_rewrites_only_on_success() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.tstore");
        create(&path, &one_trace_container(), true).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let failed: Result<(), _> = update(&path, true, |c| {
            c.origins.clear();
            Err(StoreError::InvalidInput("abort".into()))
        });
        assert!(failed.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);

        update(&path, true, |c| {
            c.origins[0].origin = "renamed.xdf".into();
            Ok(())
        })
        .unwrap();
        assert_eq!(read(&path).unwrap().container.origins[0].origin, "renamed.xdf");
    }

    #[test]
    fn test_foreign_content_is_invalid_format() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.tstore");

        fs::write(&path, "not json at all").unwrap();
        assert!(matches!(read(&path), Err(StoreError::InvalidFormat(_))));

        fs::write(&path, r#"{"format":"other","version":1,"origins":[]}"#).unwrap();
        assert!(matches!(read(&path), Err(StoreError::InvalidFormat(_))));

        fs::write(&path, r#"{"format":"tracestore","version":9,"origins":[]}"#).unwrap();
        assert!(matches!(read(&path), Err(StoreError::InvalidFormat(_))));
    }

    #[test]
    fn test_bad_buffer_length_is_invalid_format() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.tstore");
        let mut container = one_trace_container();
        container.origins[0]
            .traces
            .get_mut("0")
            .unwrap()
            .values
            .pop();
        create(&path, &container, false).unwrap();
        assert!(matches!(read(&path), Err(StoreError::InvalidFormat(_))));
    }

    #[test]
    fn test_duplicate_origin_is_invalid_format() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.tstore");
        let mut container = one_trace_container();
        let twin = container.origins[0].clone();
        container.origins.push(twin);
        create(&path, &container, false).unwrap();
        assert!(matches!(read(&path), Err(StoreError::InvalidFormat(_))));
    }
}

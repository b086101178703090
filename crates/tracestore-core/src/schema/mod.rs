//! Schema registry: which attribute keys are valid for a given readin and
//! readout, and the predicate each value has to satisfy.

pub mod check;

use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;
use crate::model::Attributes;

pub use check::Check;

/// Schema version written into new origin attributes.
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Attribute key paired with the predicate for its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub key: &'static str,
    pub check: Check,
}

const fn field(key: &'static str, check: Check) -> Field {
    Field { key, check }
}

const ORIGIN_MUST_MATCH: &[Field] = &[
    field("channel_labels", Check::ChannelList),
    field("samples_pre_event", Check::Index),
    field("samples_post_event", Check::Index),
    field("samplingrate", Check::PositiveInteger),
    field("subject", Check::Text),
    field("readin", Check::ReadinTag),
    field("readout", Check::ReadoutTag),
    field("version", Check::Version),
];

const ORIGIN_MAY_VARY: &[Field] = &[
    field("global_comment", Check::Text),
    field("filedate", Check::FileDate),
    field("history", Check::Text),
];

const GENERIC_TRACE: &[Field] = &[
    field("id", Check::Index),
    field("event_name", Check::Text),
    field("event_sample", Check::Index),
    field("event_time", Check::Numeric),
    field("xyz_coords", Check::Coords),
    field("onset_shift", Check::Integer),
    field("time_since_last_pulse_in_s", Check::TimeSince),
    field("reject", Check::Flag),
    field("comment", Check::Text),
    field("examiner", Check::Text),
];

const TMS_TRACE: &[Field] = &[
    field("stimulation_intensity_mso", Check::OptionalFloat),
    field("stimulation_intensity_didt", Check::OptionalFloat),
];

const PES_TRACE: &[Field] = &[
    field("intensity_mA", Check::OptionalFloat),
    field("pulse_width_ms", Check::OptionalFloat),
    field("stimulation_target", Check::Text),
];

const MEP_TRACE: &[Field] = &[
    field("neg_peak_magnitude_uv", Check::OptionalFloat),
    field("neg_peak_latency_ms", Check::OptionalFloat),
    field("pos_peak_magnitude_uv", Check::OptionalFloat),
    field("pos_peak_latency_ms", Check::OptionalFloat),
    field("zcr_latency_ms", Check::OptionalFloat),
    field("channel_of_interest", Check::Text),
];

const IMEP_TRACE: &[Field] = &[
    field("imep_occurence", Check::Flag),
    field("imep_latency", Check::OptionalFloat),
    field("imep_magnitude", Check::OptionalFloat),
    field("estimation_method", Check::Text),
    field("channel_of_interest", Check::Text),
];

const ERP_TRACE: &[Field] = &[
    field("gmfp_neg_peaks_magnitude_uv", Check::FloatList),
    field("gmfp_neg_peaks_latency_ms", Check::FloatList),
    field("gmfp_pos_peaks_magnitude_uv", Check::FloatList),
    field("gmfp_pos_peaks_latency_ms", Check::FloatList),
    field("gmfp_zcr_latencies_ms", Check::FloatList),
];

/// Acquisition modality a recording was made with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Readin {
    Tms,
    Pes,
}

impl Readin {
    pub fn as_str(self) -> &'static str {
        match self {
            Readin::Tms => "tms",
            Readin::Pes => "pes",
        }
    }

    fn trace_fields(self) -> &'static [Field] {
        match self {
            Readin::Tms => TMS_TRACE,
            Readin::Pes => PES_TRACE,
        }
    }
}

impl FromStr for Readin {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tms" => Ok(Readin::Tms),
            "pes" => Ok(Readin::Pes),
            other => Err(StoreError::UnsupportedReadout(format!("unknown readin '{other}'"))),
        }
    }
}

impl fmt::Display for Readin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis schema applied to the traces of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Readout {
    Cmep,
    Imep,
    Erp,
    Mep,
}

impl Readout {
    pub const ALL: [Readout; 4] = [Readout::Cmep, Readout::Imep, Readout::Erp, Readout::Mep];

    pub fn as_str(self) -> &'static str {
        match self {
            Readout::Cmep => "cmep",
            Readout::Imep => "imep",
            Readout::Erp => "erp",
            Readout::Mep => "mep",
        }
    }

    fn trace_fields(self) -> &'static [Field] {
        match self {
            Readout::Cmep | Readout::Mep => MEP_TRACE,
            Readout::Imep => IMEP_TRACE,
            Readout::Erp => ERP_TRACE,
        }
    }
}

impl FromStr for Readout {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Readout::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| StoreError::UnsupportedReadout(format!("unknown readout '{s}'")))
    }
}

impl fmt::Display for Readout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A supported readin/readout combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rio {
    readin: Readin,
    readout: Readout,
}

impl Rio {
    pub fn new(readin: Readin, readout: Readout) -> Result<Self, StoreError> {
        use Readin::*;
        use Readout::*;
        match (readin, readout) {
            (Tms, Cmep | Imep | Erp) | (Pes, Mep | Erp) => Ok(Self { readin, readout }),
            _ => Err(StoreError::UnsupportedReadout(format!(
                "{readin}-{readout} is not a supported combination"
            ))),
        }
    }

    /// Parse both tags, e.g. from origin attributes.
    pub fn parse(readin: &str, readout: &str) -> Result<Self, StoreError> {
        Self::new(readin.parse()?, readout.parse()?)
    }

    pub fn readin(self) -> Readin {
        self.readin
    }

    pub fn readout(self) -> Readout {
        self.readout
    }
}

impl fmt::Display for Rio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.readin, self.readout)
    }
}

/// The full key set for one rio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    rio: Rio,
}

impl Schema {
    pub fn for_rio(rio: Rio) -> Self {
        Self { rio }
    }

    /// Resolve the schema from the `readin`/`readout` entries of `attrs`.
    pub fn for_attributes(attrs: &Attributes) -> Result<Self, StoreError> {
        let readout = attrs
            .get("readout")
            .ok_or_else(|| StoreError::schema("readout", "", "missing key"))?;
        let readin = attrs
            .get("readin")
            .ok_or_else(|| StoreError::schema("readin", "", "missing key"))?;
        Ok(Self::for_rio(Rio::parse(readin, readout)?))
    }

    pub fn rio(&self) -> Rio {
        self.rio
    }

    /// Trace keys in declaration order: generic, readin, then readout keys.
    /// Keys shared by several tables appear once.
    pub fn trace_fields(&self) -> Vec<Field> {
        let mut fields: Vec<Field> = Vec::new();
        let tables = [
            GENERIC_TRACE,
            self.rio.readin.trace_fields(),
            self.rio.readout.trace_fields(),
        ];
        for f in tables.into_iter().flatten() {
            if !fields.iter().any(|seen| seen.key == f.key) {
                fields.push(*f);
            }
        }
        fields
    }

    pub fn trace_keys(&self) -> Vec<&'static str> {
        self.trace_fields().into_iter().map(|f| f.key).collect()
    }

    pub fn origin_fields(&self) -> impl Iterator<Item = &'static Field> {
        ORIGIN_MUST_MATCH.iter().chain(ORIGIN_MAY_VARY)
    }

    /// Every field valid on a stored trace: trace keys plus origin keys.
    pub fn fields(&self) -> Vec<Field> {
        let mut fields = self.trace_fields();
        fields.extend(self.origin_fields().copied());
        fields
    }

    pub fn is_valid_key(&self, key: &str) -> bool {
        self.fields().iter().any(|f| f.key == key)
    }

    /// Check every field of the schema against `attrs`. Fails on the first
    /// missing key or rejected value.
    pub fn validate(&self, attrs: &Attributes) -> Result<(), StoreError> {
        for f in self.fields() {
            let raw = attrs
                .get(f.key)
                .ok_or_else(|| StoreError::schema(f.key, "", "missing key"))?;
            if !f.check.accepts(raw) {
                return Err(StoreError::schema(f.key, raw, f.check.describe()));
            }
        }
        Ok(())
    }

    /// Copy of `attrs` restricted to the keys of this schema.
    pub fn filter(&self, attrs: &Attributes) -> Attributes {
        let fields = self.fields();
        attrs
            .iter()
            .filter(|(key, _)| fields.iter().any(|f| f.key == *key))
            .collect()
    }
}

/// Origin keys that must agree across every origin merged into one store.
/// They are the same for every readout.
pub fn must_match_fields() -> &'static [Field] {
    ORIGIN_MUST_MATCH
}

/// Origin keys that may differ between origins.
pub fn may_vary_fields() -> &'static [Field] {
    ORIGIN_MAY_VARY
}

/// Validate `attrs` against the schema its own `readin` selects for `readout`.
pub fn validate(readout: &str, attrs: &Attributes) -> Result<(), StoreError> {
    let readout: Readout = readout.parse()?;
    let readin = attrs
        .get("readin")
        .ok_or_else(|| StoreError::schema("readin", "", "missing key"))?;
    Schema::for_rio(Rio::new(readin.parse()?, readout)?).validate(attrs)
}

/// Keep only the keys valid for the attributes' own readout.
pub fn filter(attrs: &Attributes) -> Result<Attributes, StoreError> {
    Ok(Schema::for_attributes(attrs)?.filter(attrs))
}

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::codec::{self, MetadataValue};

use super::{Readin, Readout};

static VERSION_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+[a-z]?$"));

/// Type predicate applied to the encoded value of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Any string.
    Text,
    /// Non-negative integer.
    Index,
    /// Any integer.
    Integer,
    /// Strictly positive integer.
    PositiveInteger,
    /// Integer or float, including the special float literals.
    Numeric,
    /// Numeric, or left empty.
    OptionalFloat,
    /// Positive numeric (or `inf`), or left empty for the first pulse.
    TimeSince,
    Flag,
    /// Exactly three numeric entries.
    Coords,
    /// Non-empty list of strings.
    ChannelList,
    /// List of floats, possibly empty.
    FloatList,
    /// `N.N.N` with an optional trailing lowercase letter.
    Version,
    /// `YYYY-MM-DD`, optionally followed by ` HH:MM:SS[.ffffff]`.
    FileDate,
    ReadinTag,
    ReadoutTag,
}

impl Check {
    /// Whether the encoded literal `raw` satisfies this predicate.
    pub fn accepts(self, raw: &str) -> bool {
        let value = codec::decode(raw);
        match self {
            Check::Text => true,
            Check::Index => matches!(value, MetadataValue::Int(i) if i >= 0),
            Check::Integer => value.as_int().is_some(),
            Check::PositiveInteger => matches!(value, MetadataValue::Int(i) if i > 0),
            Check::Numeric => value.is_numeric(),
            Check::OptionalFloat => raw.is_empty() || value.is_numeric(),
            Check::TimeSince => {
                raw.is_empty() || value.as_float().is_some_and(|t| t > 0.0)
            }
            Check::Flag => value.as_bool().is_some(),
            Check::Coords => value.as_float_list().is_some_and(|xyz| xyz.len() == 3),
            Check::ChannelList => value.as_str_list().is_some_and(|c| !c.is_empty()),
            Check::FloatList => match &value {
                MetadataValue::FloatList(_) => true,
                MetadataValue::StrList(items) => items.is_empty(),
                _ => false,
            },
            Check::Version => match VERSION_PATTERN.as_ref() {
                Ok(re) => re.is_match(raw),
                Err(e) => {
                    tracing::error!(error = %e, "version pattern failed to compile");
                    false
                }
            },
            Check::FileDate => is_file_date(raw),
            Check::ReadinTag => raw.parse::<Readin>().is_ok(),
            Check::ReadoutTag => raw.parse::<Readout>().is_ok(),
        }
    }

    /// Human readable expectation, used as the violation reason.
    pub fn describe(self) -> &'static str {
        match self {
            Check::Text => "expected a string",
            Check::Index => "expected a non-negative integer",
            Check::Integer => "expected an integer",
            Check::PositiveInteger => "expected a positive integer",
            Check::Numeric => "expected a number",
            Check::OptionalFloat => "expected a number, nan, inf or an empty value",
            Check::TimeSince => "expected a positive number, inf or an empty value",
            Check::Flag => "expected true or false",
            Check::Coords => "expected a list of three numbers",
            Check::ChannelList => "expected a non-empty list of strings",
            Check::FloatList => "expected a list of numbers",
            Check::Version => "expected a version like 1.2.3 or 1.2.3b",
            Check::FileDate => "expected a date like YYYY-MM-DD [HH:MM:SS]",
            Check::ReadinTag => "expected a known readin",
            Check::ReadoutTag => "expected a known readout",
        }
    }

    /// Literal an annotation builder fills in when an importer leaves the key
    /// out. `None` means the importer has to provide it.
    pub fn default_literal(self) -> Option<&'static str> {
        match self {
            Check::Text | Check::TimeSince => Some(""),
            Check::Integer => Some("0"),
            Check::OptionalFloat => Some(codec::literal::NAN_TOKEN),
            Check::Flag => Some("false"),
            Check::Coords => Some("[nan, nan, nan]"),
            Check::FloatList => Some("[]"),
            _ => None,
        }
    }
}

fn is_file_date(raw: &str) -> bool {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_checks() {
        for ok in ["0", "1", "-1"] {
            assert!(Check::Integer.accepts(ok), "{ok}");
        }
        for bad in ["0.0", "-1.0", "1.0", ""] {
            assert!(!Check::Integer.accepts(bad), "{bad}");
        }
        assert!(Check::Index.accepts("12"));
        assert!(!Check::Index.accepts("-1"));
        assert!(!Check::PositiveInteger.accepts("0"));
    }

    #[test]
    fn test_numeric_checks() {
        for ok in ["0", "-1", "0.1", "nan", "inf"] {
            assert!(Check::Numeric.accepts(ok), "{ok}");
        }
        assert!(!Check::Numeric.accepts(""));
        assert!(Check::OptionalFloat.accepts(""));
        assert!(Check::OptionalFloat.accepts("-20.8"));
        assert!(!Check::OptionalFloat.accepts("big"));
    }

    #[test]
    fn test_time_since_last_pulse() {
        for ok in ["0.001", "912321451", "", "inf"] {
            assert!(Check::TimeSince.accepts(ok), "{ok}");
        }
        for bad in ["0", "-1", "soon"] {
            assert!(!Check::TimeSince.accepts(bad), "{bad}");
        }
    }

    #[test]
    fn test_coords() {
        assert!(Check::Coords.accepts("[0.0, 1.0, 1.2]"));
        assert!(Check::Coords.accepts("[0, 1, 1.2]"));
        assert!(Check::Coords.accepts("[nan, nan, nan]"));
        assert!(!Check::Coords.accepts(""));
        assert!(!Check::Coords.accepts("['', 1, 1.2]"));
        assert!(!Check::Coords.accepts("[1, 1.2]"));
    }

    #[test]
    fn test_channel_list() {
        assert!(Check::ChannelList.accepts("['C0', 'C1']"));
        assert!(Check::ChannelList.accepts("['C0']"));
        for bad in ["C0", "1", "", "[]"] {
            assert!(!Check::ChannelList.accepts(bad), "{bad}");
        }
    }

    #[test]
    fn test_version() {
        for ok in ["0.1.1", "12.412354.2", "2.12.3b"] {
            assert!(Check::Version.accepts(ok), "{ok}");
        }
        for bad in ["0.1", "12", "", "2.12.3alpha"] {
            assert!(!Check::Version.accepts(bad), "{bad}");
        }
    }

    #[test]
    fn test_file_date() {
        for ok in ["1970-01-01 00:01:01", "1970-01-01", "2019-05-02 13:24:01.123456"] {
            assert!(Check::FileDate.accepts(ok), "{ok}");
        }
        for bad in ["00:01:01", "1970", "1970-01", "", "yesterday"] {
            assert!(!Check::FileDate.accepts(bad), "{bad}");
        }
    }

    #[test]
    fn test_defaults_satisfy_their_check() {
        let checks = [
            Check::Text,
            Check::Integer,
            Check::OptionalFloat,
            Check::TimeSince,
            Check::Flag,
            Check::Coords,
            Check::FloatList,
        ];
        for check in checks {
            let default = check.default_literal().unwrap();
            assert!(check.accepts(default), "{check:?} default '{default}'");
        }
        assert!(Check::Index.default_literal().is_none());
    }
}

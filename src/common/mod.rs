//! Common functionality.

use std::{fmt, path::Path, str::FromStr};

use byte_unit::{Byte, UnitType};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod io;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Helper to print the current memory resident set size via `tracing`.
pub fn trace_rss_now() {
    let rss = procfs::process::Process::myself()
        .and_then(|me| me.stat())
        .map(|stat| stat.rss * procfs::page_size());
    match rss {
        Ok(rss) => tracing::debug!(
            "RSS now: {:.2}",
            Byte::from_u64(rss).get_appropriate_unit(UnitType::Binary)
        ),
        Err(e) => tracing::trace!("could not determine RSS: {}", e),
    }
}

/// Definition of canonical chromosome names.
pub const CHROMS: &[&str] = &[
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16", "17",
    "18", "19", "20", "21", "22", "X", "Y", "M",
];

/// Rank of a chromosome name for sorting; `chr` prefixes are ignored, `MT`
/// is an alias of `M` and non-canonical names sort after all canonical ones.
pub fn chrom_rank(name: &str) -> usize {
    let name = name.trim();
    let name = name
        .strip_prefix("chr")
        .or_else(|| name.strip_prefix("CHR"))
        .unwrap_or(name);
    let name = if name.eq_ignore_ascii_case("mt") {
        "M"
    } else {
        name
    };
    CHROMS
        .iter()
        .position(|chrom| chrom.eq_ignore_ascii_case(name))
        .unwrap_or(CHROMS.len())
}

/// Sort key for (chromosome, position) pairs.
pub fn chrom_pos_key(chrom: &str, pos: Option<i64>) -> (usize, String, i64) {
    (chrom_rank(chrom), chrom.to_string(), pos.unwrap_or(i64::MAX))
}

/// Marker written for paths that could not be resolved.
pub const MISSING_PATH: &str = "MISSING_PATH";

/// Parse a list argument.
///
/// `@path` (with `~` and environment variables expanded) or the path of an
/// existing file is read as one entry per line, everything else is split
/// at commas.  Empty entries are dropped.
pub fn parse_list(value: &str) -> Result<Vec<String>, anyhow::Error> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Vec::new());
    }

    let (explicit_file, raw_path) = match value.strip_prefix('@') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let path = shellexpand::full(raw_path)
        .map_err(|e| anyhow::anyhow!("could not expand {:?}: {}", raw_path, e))?
        .to_string();

    if explicit_file || (!value.contains(',') && Path::new(&path).is_file()) {
        let mut result = Vec::new();
        for line in io::read_lines(&path)
            .map_err(|e| anyhow::anyhow!("could not read list file {:?}: {}", &path, e))?
        {
            let line = line?;
            let line = line.split(',').next().unwrap_or_default().trim();
            if !line.is_empty() && !line.starts_with('#') {
                result.push(line.to_string());
            }
        }
        Ok(result)
    } else {
        Ok(value
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect())
    }
}

/// Ordered, duplicate-free set of filter reasons.
///
/// Reasons are only ever appended; the text form joins them with `;` and an
/// empty set reads and writes as `PASS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet<R> {
    reasons: Vec<R>,
}

impl<R> Default for FilterSet<R> {
    fn default() -> Self {
        Self {
            reasons: Vec::new(),
        }
    }
}

impl<R: PartialEq + Copy> FilterSet<R> {
    /// Append `reason` unless already present.
    pub fn push(&mut self, reason: R) {
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    /// Whether no reason has been recorded.
    pub fn is_pass(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn contains(&self, reason: R) -> bool {
        self.reasons.contains(&reason)
    }
}

impl<R: PartialEq + Copy> FromIterator<R> for FilterSet<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        let mut result = Self::default();
        for reason in iter {
            result.push(reason);
        }
        result
    }
}

impl<R: fmt::Display> fmt::Display for FilterSet<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reasons.is_empty() {
            write!(f, "PASS")
        } else {
            for (i, reason) in self.reasons.iter().enumerate() {
                if i > 0 {
                    write!(f, ";")?;
                }
                write!(f, "{}", reason)?;
            }
            Ok(())
        }
    }
}

impl<R: FromStr + PartialEq + Copy> FromStr for FilterSet<R> {
    type Err = crate::err::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut result = Self::default();
        for token in s.split(';').map(|t| t.trim()) {
            if token.is_empty() || token == "PASS" {
                continue;
            }
            result.push(
                token
                    .parse()
                    .map_err(|_| crate::err::ParseError::UnknownFilterReason(token.to_string()))?,
            );
        }
        Ok(result)
    }
}

/// Lenient `serde` deserializers for numeric columns.
///
/// Values like `NA`, `nan`, the empty string or anything unparsable map to
/// `None` instead of failing the whole record.
pub mod de {
    use serde::{Deserialize, Deserializer};

    /// Parse a float, `None` for missing or non-finite values.
    pub fn parse_f64(value: &str) -> Option<f64> {
        let value = value.trim();
        match value {
            "" | "NA" | "na" | "NaN" | "nan" | "None" | "." => None,
            _ => value.parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    /// Parse a non-negative integer count, accepting `5.0` style values.
    pub fn parse_count(value: &str) -> Option<u32> {
        let value = value.trim();
        value.parse::<u32>().ok().or_else(|| {
            parse_f64(value)
                .filter(|v| *v >= 0f64 && v.fract() == 0f64 && *v <= u32::MAX as f64)
                .map(|v| v as u32)
        })
    }

    /// Parse an integer position, accepting `100.0` style values.
    pub fn parse_pos(value: &str) -> Option<i64> {
        let value = value.trim();
        value.parse::<i64>().ok().or_else(|| {
            parse_f64(value)
                .filter(|v| v.fract() == 0f64)
                .map(|v| v as i64)
        })
    }

    pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<String> = Option::deserialize(deserializer)?;
        Ok(value.as_deref().and_then(parse_f64))
    }

    pub fn opt_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<String> = Option::deserialize(deserializer)?;
        Ok(value.as_deref().and_then(parse_count))
    }

    pub fn opt_pos<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<String> = Option::deserialize(deserializer)?;
        Ok(value.as_deref().and_then(parse_pos))
    }

    /// Deserialize a position; it is an identity column so failure is an error.
    pub fn pos<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        parse_pos(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid position: {:?}", value)))
    }

    /// Normalize a chromosome name that may have been written as a number (`1.0`).
    pub fn normalize_chrom(value: &str) -> String {
        let value = value.trim();
        match value.strip_suffix(".0") {
            Some(prefix) if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) => {
                prefix.to_string()
            }
            _ => value.to_string(),
        }
    }

    pub fn chrom<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(normalize_chrom(&value))
    }
}

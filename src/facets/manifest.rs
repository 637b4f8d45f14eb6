//! Parsing of FACETS review manifests and best-fit ranking.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use crate::common::io::{load_table, TableFormat};

/// One reviewed fit of a FACETS review manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// Directory holding the manifest.
    pub manifest_dir: PathBuf,
    pub review_status: String,
    pub facets_qc: bool,
    pub date_reviewed: Option<NaiveDateTime>,
    pub fit_name: String,
    pub path: String,
}

impl ManifestEntry {
    fn is_reviewed_best_fit(&self) -> bool {
        self.review_status.contains("reviewed_best_fit")
    }

    /// Preference tier, lower is better; `None` if the entry does not qualify.
    pub fn tier(&self) -> Option<u8> {
        match (self.is_reviewed_best_fit(), self.facets_qc) {
            (true, true) => Some(0),
            (true, false) => Some(1),
            (false, true) => Some(2),
            (false, false) if self.fit_name == super::DEFAULT_FIT => Some(3),
            _ => None,
        }
    }

    /// Directory of the fit's output files.
    pub fn fit_dir(&self) -> PathBuf {
        if !self.fit_name.is_empty() {
            self.manifest_dir.join(&self.fit_name)
        } else {
            let path = Path::new(&self.path);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.manifest_dir.join(path)
            }
        }
    }
}

/// Interpret a QC flag value.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "t" | "yes" | "y" | "1"
    )
}

/// Parse a review date in any of the formats seen in manifests.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m/%d/%y"];
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Read the entries of the manifest at `path`.
///
/// Missing or malformed manifests yield no entries, with a warning.
pub fn read_manifest(path: &Path) -> Vec<ManifestEntry> {
    let format = TableFormat::from_path(path).with_comments();
    let table = match load_table(path, &format, &["fit_name"]).or_warn("FACETS manifest") {
        Some(table) => table,
        None => return Vec::new(),
    };
    let manifest_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    table
        .rows
        .iter()
        .map(|row| ManifestEntry {
            manifest_dir: manifest_dir.clone(),
            review_status: table.get_or_empty(row, "review_status").to_string(),
            facets_qc: parse_bool(table.get_or_empty(row, "facets_qc")),
            date_reviewed: parse_date(table.get_or_empty(row, "date_reviewed")),
            fit_name: table.get_or_empty(row, "fit_name").to_string(),
            path: table.get_or_empty(row, "path").to_string(),
        })
        .collect()
}

/// Pick the best entry: best tier first, then the most recent review date.
///
/// Entries without a date rank behind dated ones of the same tier; among
/// equal candidates the first one in manifest order wins.
pub fn select_best(entries: &[ManifestEntry]) -> Option<&ManifestEntry> {
    let mut best: Option<(&ManifestEntry, u8)> = None;
    for entry in entries {
        let tier = if let Some(tier) = entry.tier() {
            tier
        } else {
            continue;
        };
        best = match best {
            None => Some((entry, tier)),
            Some((current, current_tier)) => {
                let better = tier < current_tier
                    || (tier == current_tier && entry.date_reviewed > current.date_reviewed);
                if better {
                    Some((entry, tier))
                } else {
                    Some((current, current_tier))
                }
            }
        };
    }
    best.map(|(entry, _)| entry)
}

#[cfg(test)]
mod test {
    use std::path::{Path, PathBuf};

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::ManifestEntry;

    fn entry(status: &str, qc: bool, date: &str, fit_name: &str) -> ManifestEntry {
        ManifestEntry {
            manifest_dir: PathBuf::from("/facets/sample"),
            review_status: status.to_string(),
            facets_qc: qc,
            date_reviewed: super::parse_date(date),
            fit_name: fit_name.to_string(),
            path: String::new(),
        }
    }

    #[rstest]
    #[case("2023-01-05", true)]
    #[case("2023-01-05 12:30:00", true)]
    #[case("01/05/2023", true)]
    #[case("", false)]
    #[case("yesterday", false)]
    fn parse_date(#[case] value: &str, #[case] parses: bool) {
        assert_eq!(super::parse_date(value).is_some(), parses);
    }

    #[rstest]
    #[case("TRUE", true)]
    #[case("True", true)]
    #[case("false", false)]
    #[case("", false)]
    fn parse_bool(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(super::parse_bool(value), expected);
    }

    #[test]
    fn best_fit_prefers_reviewed_and_qc() {
        let entries = vec![
            entry("reviewed_best_fit", false, "2024-01-01", "fit_a"),
            entry("reviewed_best_fit", true, "2022-01-01", "fit_b"),
            entry("reviewed_best_fit", true, "2023-01-01", "fit_c"),
            entry("not_reviewed", true, "2024-06-01", "default"),
        ];
        assert_eq!(
            super::select_best(&entries).map(|e| e.fit_name.as_str()),
            Some("fit_c")
        );
    }

    #[test]
    fn best_fit_fallback_order() {
        let entries = vec![
            entry("not_reviewed", false, "2024-01-01", "default"),
            entry("not_reviewed", true, "2022-01-01", "fit_qc"),
        ];
        assert_eq!(
            super::select_best(&entries).map(|e| e.fit_name.as_str()),
            Some("fit_qc")
        );

        let entries = vec![
            entry("not_reviewed", false, "2024-01-01", "fit_x"),
            entry("not_reviewed", false, "2023-01-01", "default"),
        ];
        assert_eq!(
            super::select_best(&entries).map(|e| e.fit_name.as_str()),
            Some("default")
        );

        let entries = vec![entry("not_reviewed", false, "2024-01-01", "fit_x")];
        assert_eq!(super::select_best(&entries), None);
    }

    #[test]
    fn undated_entries_rank_last() {
        let entries = vec![
            entry("reviewed_best_fit", true, "", "fit_undated"),
            entry("reviewed_best_fit", true, "2020-01-01", "fit_dated"),
        ];
        assert_eq!(
            super::select_best(&entries).map(|e| e.fit_name.as_str()),
            Some("fit_dated")
        );
    }

    #[test]
    fn read_manifest() {
        let entries = super::read_manifest(Path::new(
            "tests/facets/data/P-00000/P-0000001-T01-IM6_P-0000001-N01-IM6/facets_review.manifest",
        ));
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].fit_name, "fit_purity");
        assert!(entries[1].facets_qc);
        assert_eq!(
            entries[1].fit_dir(),
            PathBuf::from(
                "tests/facets/data/P-00000/P-0000001-T01-IM6_P-0000001-N01-IM6/fit_purity"
            )
        );
    }
}

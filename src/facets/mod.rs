//! FACETS fit discovery and selection.

pub mod fit;
pub mod manifest;

use std::path::{Path, PathBuf};

use crate::common::io::{load_records, LoadOutcome, TableFormat};

/// Name of the review manifest in each FACETS sample directory.
pub const MANIFEST_NAME: &str = "facets_review.manifest";

/// Name of the fit FACETS runs by default.
pub const DEFAULT_FIT: &str = "default";

/// One selected FACETS fit, a row of the `_facets_fit.txt` list.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FitRecord {
    /// The IMPACT sample the fit was computed for.
    pub facets_impact_sample: String,
    /// Name of the fit.
    pub facets_fit: String,
    /// Path to the `.ccf.maf` file of the fit.
    #[serde(default)]
    pub facets_path: String,
}

/// The IMPACT sample of a FACETS sample directory, e.g. `P-0000001-T01-IM6`
/// for `P-0000001-T01-IM6_P-0000001-N01-IM6`.
pub fn impact_sample_of(sample_dir: &Path) -> String {
    let name = sample_dir
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    name.split('_').next().unwrap_or_default().to_string()
}

/// Whether `name` is a FACETS fit output file, `*[0-9].ccf.maf`.
pub fn is_ccf_maf(name: &str) -> bool {
    name.strip_suffix(".ccf.maf")
        .and_then(|stem| stem.chars().last())
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false)
}

/// All `ccf.maf` files directly in `fit_dir`, sorted by name.
pub fn find_ccf_mafs(fit_dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(fit_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_ccf_maf(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect()
}

/// First (sorted by name) `ccf.maf` file directly in `fit_dir`.
pub fn find_ccf_maf(fit_dir: &Path) -> Option<PathBuf> {
    find_ccf_mafs(fit_dir).into_iter().next()
}

/// FACETS sample directories of a patient: `{facets_dir}/{dmp_id[:7]}/{dmp_id}*`.
pub fn sample_dirs(facets_dir: &Path, dmp_id: &str) -> Vec<PathBuf> {
    let prefix: String = dmp_id.chars().take(7).collect();
    let patient_dir = facets_dir.join(prefix);
    if dmp_id.is_empty() || !patient_dir.is_dir() {
        tracing::warn!("no FACETS directory {:?} for {:?}", &patient_dir, dmp_id);
        return Vec::new();
    }
    walkdir::WalkDir::new(&patient_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| {
            entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with(dmp_id)
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// Read the FACETS fit list, dropping rows whose path is empty or `MISSING`.
pub fn read_fit_list<P: AsRef<Path>>(path: P) -> LoadOutcome<Vec<FitRecord>> {
    load_records::<FitRecord, _>(path, &TableFormat::TSV).map(|records| {
        records
            .into_iter()
            .filter(|record| {
                let path = record.facets_path.trim();
                !path.is_empty() && !path.eq_ignore_ascii_case("MISSING")
            })
            .collect()
    })
}

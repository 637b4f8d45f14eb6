//! Implementation of `facets fit` subcommand.

use std::path::{Path, PathBuf};

use crate::{
    common::io::{write_records, TableFormat},
    facets::{
        find_ccf_maf, find_ccf_mafs, impact_sample_of,
        manifest::{read_manifest, select_best},
        sample_dirs, FitRecord, DEFAULT_FIT, MANIFEST_NAME,
    },
    patient::PatientData,
};

/// Command line arguments for `facets fit` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Select FACETS fits of a patient", long_about = None)]
pub struct Args {
    /// Root directory of the FACETS results.
    #[arg(long)]
    pub facets_dir: PathBuf,
    /// Path to the patient JSON.
    #[arg(long)]
    pub patient_json: PathBuf,
    /// Select the reviewed best fit per sample instead of listing all fits.
    #[arg(long, default_value_t = false)]
    pub best_fit: bool,
    /// Directory to write `{combined_id}_facets_fit.txt` to.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

fn record_for(sample_dir: &Path, fit_name: &str, ccf_maf: &Path) -> FitRecord {
    FitRecord {
        facets_impact_sample: impact_sample_of(sample_dir),
        facets_fit: fit_name.to_string(),
        facets_path: ccf_maf.to_string_lossy().to_string(),
    }
}

/// Every `default` fit file of a sample directory.
fn default_fits(sample_dir: &Path) -> Vec<FitRecord> {
    find_ccf_mafs(&sample_dir.join(DEFAULT_FIT))
        .iter()
        .map(|ccf_maf| record_for(sample_dir, DEFAULT_FIT, ccf_maf))
        .collect()
}

/// Best fit of one sample directory according to its review manifest.
///
/// Without a manifest, or without a qualifying entry in it, all `default`
/// fit files are returned unranked.
pub fn best_fit(sample_dir: &Path) -> Vec<FitRecord> {
    let manifest = sample_dir.join(MANIFEST_NAME);
    if manifest.is_file() {
        let entries = read_manifest(&manifest);
        if let Some(entry) = select_best(&entries) {
            let fit_dir = entry.fit_dir();
            if let Some(ccf_maf) = find_ccf_maf(&fit_dir) {
                let fit_name = fit_dir
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| entry.fit_name.clone());
                return vec![record_for(sample_dir, &fit_name, &ccf_maf)];
            }
            tracing::warn!("no ccf.maf file in selected fit directory {:?}", &fit_dir);
        } else {
            tracing::debug!("no qualifying fit in {:?}", &manifest);
        }
    } else {
        tracing::debug!("no manifest in {:?}", sample_dir);
    }
    default_fits(sample_dir)
}

/// All fits of one sample directory: every `ccf.maf` file of every sub directory.
pub fn all_fits(sample_dir: &Path) -> Vec<FitRecord> {
    walkdir::WalkDir::new(sample_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .flat_map(|entry| {
            let fit_name = entry.file_name().to_string_lossy().to_string();
            find_ccf_mafs(entry.path())
                .into_iter()
                .map(move |ccf_maf| record_for(sample_dir, &fit_name, &ccf_maf))
        })
        .collect()
}

/// Collect the fits of all FACETS samples of `dmp_id`.
pub fn collect_fits(facets_dir: &Path, dmp_id: &str, best: bool) -> Vec<FitRecord> {
    sample_dirs(facets_dir, dmp_id)
        .iter()
        .flat_map(|sample_dir| {
            if best {
                best_fit(sample_dir)
            } else {
                all_fits(sample_dir)
            }
        })
        .collect()
}

/// Main entry point for `facets fit` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let patient = PatientData::load(&args.patient_json)?;
    let fits = collect_fits(&args.facets_dir, &patient.dmp_id, args.best_fit);
    if fits.is_empty() {
        tracing::warn!("no FACETS fits found for {}", &patient.combined_id);
    }
    write_records(
        args.output_dir
            .join(format!("{}_facets_fit.txt", &patient.combined_id)),
        &TableFormat::TSV,
        &fits,
    )?;

    Ok(())
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    fn summary(fits: &[super::FitRecord]) -> Vec<(String, String, String)> {
        fits.iter()
            .map(|f| {
                (
                    f.facets_impact_sample.clone(),
                    f.facets_fit.clone(),
                    Path::new(&f.facets_path)
                        .file_name()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_default(),
                )
            })
            .collect()
    }

    #[test]
    fn best_fits() {
        let fits = super::collect_fits(Path::new("tests/facets/data"), "P-0000001", true);
        insta::assert_yaml_snapshot!(summary(&fits), @r###"
        ---
        - - P-0000001-T01-IM6
          - fit_purity
          - P-0000001-T01-IM6_P-0000001-N01-IM6_purity1.ccf.maf
        - - P-0000001-T02-IM7
          - default
          - P-0000001-T02-IM7_P-0000001-N01-IM7_hisens1.ccf.maf
        "###);
    }

    #[test]
    fn all_fits() {
        let fits = super::collect_fits(Path::new("tests/facets/data"), "P-0000001", false);
        insta::assert_yaml_snapshot!(summary(&fits), @r###"
        ---
        - - P-0000001-T01-IM6
          - default
          - P-0000001-T01-IM6_P-0000001-N01-IM6_hisens1.ccf.maf
        - - P-0000001-T01-IM6
          - fit_purity
          - P-0000001-T01-IM6_P-0000001-N01-IM6_purity1.ccf.maf
        - - P-0000001-T02-IM7
          - default
          - P-0000001-T02-IM7_P-0000001-N01-IM7_hisens1.ccf.maf
        "###);
    }

    /// A sample directory without manifest whose `default` fit holds two fit files.
    fn two_default_fits(tmp_dir: &Path) -> Result<std::path::PathBuf, anyhow::Error> {
        let sample = tmp_dir.join("P-0000002-T01-IM6_P-0000002-N01-IM6");
        std::fs::create_dir_all(sample.join("default"))?;
        for name in ["a_purity1.ccf.maf", "b_hisens2.ccf.maf", "c_hisens.ccf.maf"] {
            std::fs::write(sample.join("default").join(name), "")?;
        }
        Ok(sample)
    }

    #[test]
    fn all_fits_lists_every_file_of_a_fit() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let sample = two_default_fits(&tmp_dir)?;

        let fits = super::all_fits(&sample);

        assert_eq!(
            summary(&fits),
            vec![
                (
                    String::from("P-0000002-T01-IM6"),
                    String::from("default"),
                    String::from("a_purity1.ccf.maf")
                ),
                (
                    String::from("P-0000002-T01-IM6"),
                    String::from("default"),
                    String::from("b_hisens2.ccf.maf")
                ),
            ]
        );
        Ok(())
    }

    #[test]
    fn best_fit_without_manifest_returns_every_default_fit() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let sample = two_default_fits(&tmp_dir)?;

        let fits = super::best_fit(&sample);

        assert_eq!(
            summary(&fits)
                .into_iter()
                .map(|(_, fit, name)| (fit, name))
                .collect::<Vec<_>>(),
            vec![
                (String::from("default"), String::from("a_purity1.ccf.maf")),
                (String::from("default"), String::from("b_hisens2.ccf.maf")),
            ]
        );
        Ok(())
    }

    #[test]
    fn run_without_fits_writes_header() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let patient_json = tmp_dir.join("patient.json");
        std::fs::write(
            &patient_json,
            r#"{"combined_id": "P-0000099", "cmo_id": "", "dmp_id": "P-0000099", "samples": {}}"#,
        )?;
        let args = super::Args {
            facets_dir: "tests/facets/data".into(),
            patient_json,
            best_fit: true,
            output_dir: tmp_dir.to_path_buf(),
        };

        super::run(&crate::common::Args::default(), &args)?;

        assert_eq!(
            std::fs::read_to_string(tmp_dir.join("P-0000099_facets_fit.txt"))?,
            "facets_impact_sample\tfacets_fit\tfacets_path\n"
        );
        Ok(())
    }
}

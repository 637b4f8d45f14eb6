//! Implementation of `snvs facets-vaf` subcommand.
//!
//! Joins the calls with the variants of every FACETS fit and adjusts the VAF
//! for clonality and copy number.

use std::{collections::HashMap, path::PathBuf};

use indexmap::IndexMap;

use crate::{
    common::{
        de,
        io::{load_table, write_records, Table, TableFormat},
    },
    facets::{read_fit_list, FitRecord},
    snvs::{
        read_calls,
        schema::{CallRecord, VariantKey, VARIANT_KEY_COLUMNS},
    },
};

/// Command line arguments for `snvs facets-vaf` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Add FACETS adjusted VAF to SNV/indel calls", long_about = None)]
pub struct Args {
    /// Path to the SNV/indel calls CSV.
    #[arg(long)]
    pub variant_csv: PathBuf,
    /// Path to the FACETS fit list from `facets fit`.
    #[arg(long)]
    pub facets_file_list: PathBuf,
    /// Output CSV with the adjusted VAF from all FACETS samples.
    #[arg(long)]
    pub output_all_facets_samples: PathBuf,
    /// Output CSV restricted to the best FACETS sample.
    #[arg(long)]
    pub output_best_facets_sample: PathBuf,
}

/// Copy number of the diploid normal.
pub const NORMAL_COPY_NUMBER: f64 = 2.0;

/// Clonality label for which the VAF is adjusted.
pub const CLONAL: &str = "CLONAL";

/// Columns a `ccf.maf` must carry on top of the variant identity.
const FACETS_COLUMNS: &[&str] = &["clonality", "tcn", "expected_alt_copies"];

/// Adjust the raw VAF `vaf` for purity and copy number.
///
/// Only clonal calls with numeric `tcn` and `expected_alt_copies` are
/// adjusted; everything else, including a zero or non-finite result, keeps
/// the raw VAF.
pub fn adjusted_vaf(
    vaf: Option<f64>,
    clonality: &str,
    tcn: Option<f64>,
    expected_alt_copies: Option<f64>,
) -> Option<f64> {
    let vaf = vaf?;
    match (clonality == CLONAL, tcn, expected_alt_copies) {
        (true, Some(tcn), Some(eac)) => {
            let denominator = eac + (NORMAL_COPY_NUMBER - tcn) * vaf;
            let adjusted = (vaf * NORMAL_COPY_NUMBER) / denominator;
            if denominator != 0f64 && adjusted.is_finite() {
                Some(adjusted)
            } else {
                Some(vaf)
            }
        }
        _ => Some(vaf),
    }
}

/// Clonality annotation of one variant in a FACETS fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetsCall {
    pub clonality: String,
    pub tcn: Option<f64>,
    pub expected_alt_copies: Option<f64>,
}

/// Read the calls of a `ccf.maf` by variant.
fn facets_calls(table: &Table) -> HashMap<VariantKey, Vec<FacetsCall>> {
    let mut result: HashMap<VariantKey, Vec<FacetsCall>> = HashMap::new();
    for row in &table.rows {
        if let Some(key) = VariantKey::from_row(table, row) {
            result.entry(key).or_default().push(FacetsCall {
                clonality: table.get_or_empty(row, "clonality").to_string(),
                tcn: table.get(row, "tcn").and_then(de::parse_f64),
                expected_alt_copies: table.get(row, "expected_alt_copies").and_then(de::parse_f64),
            });
        }
    }
    result
}

/// Load the calls of the fit `fit`, `None` if its file is missing or unusable.
fn load_fit(fit: &FitRecord) -> Option<HashMap<VariantKey, Vec<FacetsCall>>> {
    let required = VARIANT_KEY_COLUMNS
        .iter()
        .chain(FACETS_COLUMNS)
        .copied()
        .collect::<Vec<_>>();
    load_table(&fit.facets_path, &TableFormat::TSV.with_comments(), &required)
        .or_warn(&format!(
            "FACETS fit {} of {}",
            &fit.facets_fit, &fit.facets_impact_sample
        ))
        .map(|table| facets_calls(&table))
}

/// Inner join of `records` with the calls of one fit.
pub fn merge_fit(
    records: &[CallRecord],
    fit: &FitRecord,
    calls: &HashMap<VariantKey, Vec<FacetsCall>>,
) -> Vec<CallRecord> {
    let mut result = Vec::new();
    for record in records {
        if let Some(facets_calls) = calls.get(&record.variant_key()) {
            for call in facets_calls {
                result.push(CallRecord {
                    clonality: call.clonality.clone(),
                    tcn: call.tcn,
                    expected_alt_copies: call.expected_alt_copies,
                    facets_impact_sample: fit.facets_impact_sample.clone(),
                    facets_fit: fit.facets_fit.clone(),
                    adjusted_vaf: adjusted_vaf(
                        record.raw_vaf(),
                        &call.clonality,
                        call.tcn,
                        call.expected_alt_copies,
                    ),
                    ..record.clone()
                });
            }
        }
    }
    result
}

/// Merge `records` with all fits of `fits`, in list order.
pub fn merge_all_fits(records: &[CallRecord], fits: &[FitRecord]) -> Vec<CallRecord> {
    let mut result = Vec::new();
    for fit in fits {
        if let Some(calls) = load_fit(fit) {
            let mut merged = merge_fit(records, fit, &calls);
            tracing::debug!(
                "{} rows for {}/{}",
                merged.len(),
                &fit.facets_impact_sample,
                &fit.facets_fit
            );
            result.append(&mut merged);
        }
    }
    result
}

/// Restrict `records` to the FACETS sample backing the most ACCESS tumor calls.
///
/// Only passing rows are considered; a sample's score is its number of ACCESS
/// tumor rows with positive VAF.  Ties go to the sample seen first.  Without
/// any scoring row all passing rows are returned.
pub fn select_best_facets_sample(records: &[CallRecord]) -> Vec<CallRecord> {
    let passing = records
        .iter()
        .filter(|record| record.is_pass_or_unfiltered())
        .collect::<Vec<_>>();

    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for record in &passing {
        let counts_toward = record.is_access_tumor() && matches!(record.vaf, Some(vaf) if vaf > 0f64);
        if counts_toward {
            *counts.entry(record.facets_impact_sample.as_str()).or_default() += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (sample, count) in &counts {
        if best.map(|(_, best_count)| *count > best_count).unwrap_or(true) {
            best = Some((sample, *count));
        }
    }

    match best {
        Some((sample, count)) => {
            tracing::info!("best FACETS sample is {} ({} ACCESS tumor calls)", sample, count);
            passing
                .into_iter()
                .filter(|record| record.facets_impact_sample == sample)
                .cloned()
                .collect()
        }
        None => passing.into_iter().cloned().collect(),
    }
}

/// Main entry point for `snvs facets-vaf` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let records = read_calls(&args.variant_csv)?;
    let fits = read_fit_list(&args.facets_file_list)
        .or_warn("FACETS fit list")
        .unwrap_or_default();
    if fits.is_empty() {
        tracing::warn!("no valid FACETS files found");
    }

    let all = merge_all_fits(&records, &fits);
    write_records(&args.output_all_facets_samples, &TableFormat::CSV, &all)?;

    let best = select_best_facets_sample(&all);
    write_records(&args.output_best_facets_sample, &TableFormat::CSV, &best)?;

    Ok(())
}

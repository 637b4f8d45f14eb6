//! Implementation of `snvs filter` subcommand.
//!
//! The cascade applies each rule in [`CASCADE`] order.  Rules only append
//! reasons; a call without reasons is written as `PASS`.

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
};

use crate::{
    common::{io::write_records, io::TableFormat, parse_list, FilterSet},
    patient::TumorNormal,
    snvs::{
        read_calls,
        schema::{CallRecord, CallStatus, SnvFilter, VariantKey},
        sort_calls,
    },
};

/// Command line arguments for `snvs filter` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Apply the filter cascade to SNV/indel calls", long_about = None)]
pub struct Args {
    /// Path to the calls CSV.
    #[arg(long)]
    pub variant_input: PathBuf,
    /// Genes to exclude, comma separated or `@file`.
    #[arg(long, default_value = "")]
    pub exclude_genes: String,
    /// Variant classifications to exclude, comma separated or `@file`.
    #[arg(long, default_value = "")]
    pub exclude_classifications: String,
    /// Minimal duplex alt count of hotspot variants.
    #[arg(long, default_value_t = 3)]
    pub duplex_alt_count_hotspot: u32,
    /// Minimal duplex alt count of non-hotspot variants.
    #[arg(long, default_value_t = 5)]
    pub duplex_alt_count_non_hotspot: u32,
    /// Minimal ratio of maximal tumor VAF to maximal normal VAF.
    #[arg(long, default_value_t = 2.0)]
    pub tumor_normal_vaf_ratio: f64,
    /// Path to the output CSV with all calls.
    #[arg(long)]
    pub output: PathBuf,
    /// Path to the output CSV with the passing calls only.
    #[arg(long)]
    pub output_final: PathBuf,
}

/// Rules in the order they are applied.
pub const CASCADE: &[SnvFilter] = &[
    SnvFilter::ExcludedGene,
    SnvFilter::ExcludedClassification,
    SnvFilter::LowAccessCov,
    SnvFilter::LowDuplexAltCount,
    SnvFilter::LowTumorToNormalVafRatio,
];

/// Settings of the cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub exclude_genes: HashSet<String>,
    pub exclude_classifications: HashSet<String>,
    pub duplex_alt_count_hotspot: u32,
    pub duplex_alt_count_non_hotspot: u32,
    pub tumor_normal_vaf_ratio: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude_genes: HashSet::new(),
            exclude_classifications: HashSet::new(),
            duplex_alt_count_hotspot: 3,
            duplex_alt_count_non_hotspot: 5,
            tumor_normal_vaf_ratio: 2.0,
        }
    }
}

impl FilterConfig {
    fn from_args(args: &Args) -> Result<Self, anyhow::Error> {
        Ok(Self {
            exclude_genes: parse_list(&args.exclude_genes)?.into_iter().collect(),
            exclude_classifications: parse_list(&args.exclude_classifications)?
                .into_iter()
                .collect(),
            duplex_alt_count_hotspot: args.duplex_alt_count_hotspot,
            duplex_alt_count_non_hotspot: args.duplex_alt_count_non_hotspot,
            tumor_normal_vaf_ratio: args.tumor_normal_vaf_ratio,
        })
    }
}

/// Row indices of `records` grouped by variant.
fn by_variant(records: &[CallRecord]) -> HashMap<VariantKey, Vec<usize>> {
    let mut result: HashMap<VariantKey, Vec<usize>> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        result.entry(record.variant_key()).or_default().push(i);
    }
    result
}

/// Whether all ACCESS calls of a variant have low coverage; `false` without
/// ACCESS calls.
fn all_access_low_coverage(calls: &[&CallRecord]) -> bool {
    let mut access = calls.iter().filter(|call| call.is_access()).peekable();
    access.peek().is_some() && access.all(|call| call.call_status == Some(CallStatus::LowCoverage))
}

/// Whether the best duplex support of the variant's ACCESS tumor calls is
/// below the cutoff; `false` when no duplex count is known.
fn low_duplex_alt_count(calls: &[&CallRecord], config: &FilterConfig) -> bool {
    let max_duplex = calls
        .iter()
        .filter(|call| !call.is_signed_out() && call.is_access_tumor())
        .filter_map(|call| call.duplex_alt_count)
        .max();
    let is_hotspot = calls.iter().any(|call| call.hotspot == "yes");
    let cutoff = if is_hotspot {
        config.duplex_alt_count_hotspot
    } else {
        config.duplex_alt_count_non_hotspot
    };
    matches!(max_duplex, Some(max) if max < cutoff)
}

/// Ratio of the maximal tumor VAF to the maximal normal VAF of unsigned calls.
///
/// Infinite without a normal VAF, `None` when neither side has support.
pub fn tumor_normal_vaf_ratio(calls: &[&CallRecord]) -> Option<f64> {
    let max_vaf = |tumor_normal: TumorNormal| {
        calls
            .iter()
            .filter(|call| !call.is_signed_out() && call.tumor_normal == Some(tumor_normal))
            .filter_map(|call| call.raw_vaf())
            .fold(None, |acc: Option<f64>, vaf| Some(acc.map_or(vaf, |acc| acc.max(vaf))))
    };
    let tumor = max_vaf(TumorNormal::Tumor).unwrap_or(0f64);
    match max_vaf(TumorNormal::Normal) {
        None => Some(f64::INFINITY),
        Some(normal) if normal > 0f64 => Some(tumor / normal),
        Some(_) if tumor > 0f64 => Some(f64::INFINITY),
        Some(_) => None,
    }
}

/// Flag of `rule` for each record.
fn apply_rule(rule: SnvFilter, records: &[CallRecord], config: &FilterConfig) -> Vec<bool> {
    match rule {
        SnvFilter::ExcludedGene => records
            .iter()
            .map(|record| config.exclude_genes.contains(&record.hugo_symbol))
            .collect(),
        SnvFilter::ExcludedClassification => records
            .iter()
            .map(|record| {
                config
                    .exclude_classifications
                    .contains(&record.variant_classification)
            })
            .collect(),
        SnvFilter::LowAccessCov
        | SnvFilter::LowDuplexAltCount
        | SnvFilter::LowTumorToNormalVafRatio => {
            let mut flags = vec![false; records.len()];
            for rows in by_variant(records).values() {
                let calls = rows.iter().map(|i| &records[*i]).collect::<Vec<_>>();
                let flagged = match rule {
                    SnvFilter::LowAccessCov => all_access_low_coverage(&calls),
                    SnvFilter::LowDuplexAltCount => low_duplex_alt_count(&calls, config),
                    _ => matches!(
                        tumor_normal_vaf_ratio(&calls),
                        Some(ratio) if ratio < config.tumor_normal_vaf_ratio
                    ),
                };
                if flagged {
                    for i in rows {
                        flags[*i] = true;
                    }
                }
            }
            flags
        }
    }
}

/// Run the cascade over `records`, appending to any reasons already present.
pub fn filter_calls(records: &mut [CallRecord], config: &FilterConfig) {
    let mut filters = records
        .iter()
        .map(|record| record.filter.clone().unwrap_or_default())
        .collect::<Vec<FilterSet<SnvFilter>>>();
    for rule in CASCADE {
        let flags = apply_rule(*rule, records, config);
        let mut count = 0;
        for (filter, flagged) in filters.iter_mut().zip(flags) {
            if flagged {
                filter.push(*rule);
                count += 1;
            }
        }
        tracing::debug!("{}: {} rows", rule, count);
    }
    for (record, filter) in records.iter_mut().zip(filters) {
        record.filter = Some(filter);
    }
}

/// Main entry point for `snvs filter` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let config = FilterConfig::from_args(args)?;
    let mut records = read_calls(&args.variant_input)?;
    if records.is_empty() {
        tracing::warn!("no variants found in {:?}", &args.variant_input);
    }

    filter_calls(&mut records, &config);
    sort_calls(&mut records);
    write_records(&args.output, &TableFormat::CSV, &records)?;

    let passing = records
        .into_iter()
        .filter(CallRecord::is_pass_or_unfiltered)
        .collect::<Vec<_>>();
    write_records(&args.output_final, &TableFormat::CSV, &passing)?;

    Ok(())
}

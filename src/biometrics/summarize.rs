//! Implementation of `biometrics summarize` subcommand.

use std::{collections::BTreeMap, path::PathBuf};

use itertools::Itertools;

use crate::{
    biometrics::{Comparison, ComparisonStatus},
    common::io::{read_records, write_records, Table, TableFormat},
};

/// Command line arguments for `biometrics summarize` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Summarize biometrics genotype comparisons per patient", long_about = None)]
pub struct Args {
    /// Path to the biometrics genotype comparison CSV.
    #[arg(long)]
    pub input: PathBuf,
    /// Path to the output summary CSV.
    #[arg(long)]
    pub output: PathBuf,
}

/// Overall verdict of a sample group.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum GroupStatus {
    #[default]
    Pass,
    Fail,
}

/// Summary of the comparisons of one reference sample group.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GroupSummary {
    pub patient_id: String,
    pub total_samples: usize,
    pub num_comparisons: usize,
    pub num_expected_matches: usize,
    pub num_unexpected_matches: usize,
    pub num_expected_mismatches: usize,
    pub num_unexpected_mismatches: usize,
    pub status: GroupStatus,
}

/// Summarize `comparisons` per reference sample group, sorted by group.
pub fn summarize(comparisons: &[Comparison]) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<&str, Vec<&Comparison>> = BTreeMap::new();
    for comparison in comparisons {
        groups
            .entry(comparison.reference_sample_group.as_str())
            .or_default()
            .push(comparison);
    }

    groups
        .into_iter()
        .map(|(group, rows)| {
            let count = |status: ComparisonStatus| {
                rows.iter()
                    .filter(|row| row.status() == Some(status))
                    .count()
            };
            let num_unexpected_matches = count(ComparisonStatus::UnexpectedMatch);
            let num_unexpected_mismatches = count(ComparisonStatus::UnexpectedMismatch);
            GroupSummary {
                patient_id: group.to_string(),
                total_samples: rows
                    .iter()
                    .map(|row| row.reference_sample.as_str())
                    .unique()
                    .count(),
                num_comparisons: rows.len(),
                num_expected_matches: count(ComparisonStatus::ExpectedMatch),
                num_unexpected_matches,
                num_expected_mismatches: count(ComparisonStatus::ExpectedMismatch),
                num_unexpected_mismatches,
                status: if num_unexpected_matches == 0 && num_unexpected_mismatches == 0 {
                    GroupStatus::Pass
                } else {
                    GroupStatus::Fail
                },
            }
        })
        .collect()
}

/// Main entry point for `biometrics summarize` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    Table::read(&args.input, &TableFormat::CSV)?.require_columns(&[
        "ReferenceSampleGroup",
        "ReferenceSample",
        "Status",
    ])?;
    let comparisons: Vec<Comparison> = read_records(&args.input, &TableFormat::CSV)?;
    let summaries = summarize(&comparisons);
    for summary in summaries
        .iter()
        .filter(|summary| summary.status == GroupStatus::Fail)
    {
        tracing::warn!(
            "{}: {} unexpected matches, {} unexpected mismatches",
            &summary.patient_id,
            summary.num_unexpected_matches,
            summary.num_unexpected_mismatches
        );
    }
    write_records(&args.output, &TableFormat::CSV, &summaries)?;

    Ok(())
}

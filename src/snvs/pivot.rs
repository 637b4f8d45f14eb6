//! Implementation of `snvs pivot` subcommand.
//!
//! Reshapes the long call table into one row per variant and one column per
//! sample.

use std::{collections::BTreeSet, path::PathBuf};

use indexmap::IndexMap;
use itertools::Itertools;

use crate::{
    common::io::{write_table, TableFormat},
    snvs::{read_calls, schema::CallRecord},
};

/// Command line arguments for `snvs pivot` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Pivot passing SNV/indel calls to a variant by sample table", long_about = None)]
pub struct Args {
    /// Path to the (filtered) calls CSV.
    #[arg(long)]
    pub variant_input: PathBuf,
    /// Path to the output CSV.
    #[arg(long)]
    pub output: PathBuf,
}

/// Leading columns of the pivot table; identity first, then description.
pub const VARIANT_COLUMNS: &[&str] = &[
    "Chromosome",
    "Start_Position",
    "End_Position",
    "Reference_Allele",
    "Tumor_Seq_Allele2",
    "Hugo_Symbol",
    "Variant_Classification",
    "HGVSp",
    "HGVSp_Short",
    "HGVSc",
    "Clinical",
    "Hotspot",
    "CH",
];

fn variant_values(record: &CallRecord) -> Vec<String> {
    vec![
        record.chromosome.clone(),
        record.start_position.to_string(),
        record.end_position.to_string(),
        record.reference_allele.clone(),
        record.tumor_seq_allele2.clone(),
        record.hugo_symbol.clone(),
        record.variant_classification.clone(),
        record.hgvsp.clone(),
        record.hgvsp_short.clone(),
        record.hgvsc.clone(),
        record.clinical.clone(),
        record.hotspot.clone(),
        record.ch.clone(),
    ]
}

/// Format the counts of a call as `alt/total(vaf)`.
pub fn format_cell(alt_count: u32, total_count: u32, vaf: f64) -> String {
    format!("{}/{}({:.4})", alt_count, total_count, vaf)
}

/// Parse a single `alt/total(vaf)` cell.
pub fn parse_cell(cell: &str) -> Option<(u32, u32, f64)> {
    let (counts, vaf) = cell.trim().strip_suffix(')')?.split_once('(')?;
    let (alt, total) = counts.split_once('/')?;
    Some((alt.parse().ok()?, total.parse().ok()?, vaf.parse().ok()?))
}

/// Cell text of `record`, `None` without counts.
fn cell_of(record: &CallRecord) -> Option<String> {
    let alt_count = record.alt_count?;
    let total_count = record.total_count?;
    Some(format_cell(
        alt_count,
        total_count,
        record.raw_vaf().unwrap_or(0f64),
    ))
}

/// A pivoted table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pivot {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Pivot the passing rows of `records`, keeping variants in input order.
pub fn pivot(records: &[CallRecord]) -> Pivot {
    let records = records
        .iter()
        .filter(|record| record.is_pass_or_unfiltered())
        .collect::<Vec<_>>();
    let samples = records
        .iter()
        .filter(|record| !record.sample_id.is_empty())
        .map(|record| record.sample_id.as_str())
        .collect::<BTreeSet<_>>();

    let mut cells: IndexMap<Vec<String>, IndexMap<&str, Vec<String>>> = IndexMap::new();
    for record in &records {
        let sample_cells = cells.entry(variant_values(record)).or_default();
        if let Some(cell) = cell_of(record) {
            sample_cells
                .entry(record.sample_id.as_str())
                .or_default()
                .push(cell);
        }
    }

    let headers = VARIANT_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .chain(samples.iter().map(|s| s.to_string()))
        .collect();
    let rows = cells
        .into_iter()
        .map(|(mut row, sample_cells)| {
            for sample in &samples {
                row.push(
                    sample_cells
                        .get(sample)
                        .map(|cells| cells.iter().join(";"))
                        .unwrap_or_default(),
                );
            }
            row
        })
        .collect();
    Pivot { headers, rows }
}

/// Main entry point for `snvs pivot` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let records = read_calls(&args.variant_input)?;
    let pivot = pivot(&records);
    write_table(&args.output, &TableFormat::CSV, &pivot.headers, &pivot.rows)?;

    Ok(())
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::{
        common::FilterSet,
        snvs::schema::{CallRecord, SnvFilter},
    };

    fn call(sample_id: &str, start: i64, alt: u32, total: u32) -> CallRecord {
        CallRecord {
            hugo_symbol: String::from("GENE1"),
            chromosome: String::from("1"),
            start_position: start,
            end_position: start,
            reference_allele: String::from("A"),
            tumor_seq_allele2: String::from("T"),
            sample_id: sample_id.to_string(),
            alt_count: Some(alt),
            total_count: Some(total),
            filter: Some(FilterSet::default()),
            ..Default::default()
        }
    }

    #[rstest]
    #[case(0, 0)]
    #[case(5, 50)]
    #[case(1, 3)]
    #[case(123456, 7654321)]
    fn cell_round_trip(#[case] alt: u32, #[case] total: u32) {
        let vaf = if total > 0 { alt as f64 / total as f64 } else { 0f64 };
        let cell = super::format_cell(alt, total, vaf);
        let (parsed_alt, parsed_total, _) = super::parse_cell(&cell).unwrap_or_default();
        assert_eq!((parsed_alt, parsed_total), (alt, total));
    }

    #[test]
    fn format_cell() {
        assert_eq!(super::format_cell(5, 50, 0.1), "5/50(0.1000)");
    }

    #[test]
    fn pivot_samples_and_duplicates() {
        let records = vec![
            call("S2", 100, 5, 50),
            call("S1", 100, 1, 10),
            call("S1", 100, 2, 10),
            call("S1", 200, 0, 10),
            CallRecord {
                filter: Some(FilterSet::from_iter([SnvFilter::ExcludedGene])),
                ..call("S3", 300, 9, 10)
            },
        ];

        let pivot = super::pivot(&records);

        assert_eq!(
            &pivot.headers[super::VARIANT_COLUMNS.len()..],
            &[String::from("S1"), String::from("S2")]
        );
        let samples = pivot
            .rows
            .iter()
            .map(|row| row[super::VARIANT_COLUMNS.len()..].to_vec())
            .collect::<Vec<_>>();
        assert_eq!(
            samples,
            vec![
                vec![
                    String::from("1/10(0.1000);2/10(0.2000)"),
                    String::from("5/50(0.1000)")
                ],
                vec![String::from("0/10(0.0000)"), String::new()],
            ]
        );
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let args = super::Args {
            variant_input: PathBuf::from("tests/snvs/filter/calls.csv"),
            output: tmp_dir.join("pivot.csv"),
        };

        super::run(&crate::common::Args::default(), &args)?;

        let table = crate::common::io::Table::read(
            tmp_dir.join("pivot.csv"),
            &crate::common::io::TableFormat::CSV,
        )?;
        assert_eq!(table.rows.len(), 3);
        assert_eq!(
            table.get(&table.rows[1], "C-ABC123-N001-d01"),
            Some("0/300(0.0000)")
        );
        assert_eq!(table.get(&table.rows[0], "C-ABC123-N001-d01"), Some(""));

        Ok(())
    }
}

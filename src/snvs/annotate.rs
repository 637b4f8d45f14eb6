//! Implementation of `snvs annotate` subcommand.

use std::{collections::HashSet, path::PathBuf};

use crate::{
    common::{
        de,
        io::{write_records, Table, TableFormat},
    },
    snvs::{read_calls, schema::CallRecord},
};

/// Command line arguments for `snvs annotate` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Annotate SNV/indel calls with hotspot and CH status", long_about = None)]
pub struct Args {
    /// Path to the aggregated calls CSV.
    #[arg(long)]
    pub variant_input: PathBuf,
    /// Path to the hotspot list TSV.
    #[arg(long)]
    pub hotspot_list: PathBuf,
    /// Path to the clonal hematopoiesis list TSV.
    #[arg(long)]
    pub ch_list: PathBuf,
    /// Path to the output CSV.
    #[arg(long)]
    pub output: PathBuf,
}

/// Columns an annotation list is matched on.
pub const ANNOTATION_KEY_COLUMNS: &[&str] = &[
    "Chromosome",
    "Start_Position",
    "Reference_Allele",
    "Tumor_Seq_Allele2",
];

/// Column names of the CH list and their canonical counterparts.
pub const CH_COLUMN_MAP: &[(&str, &str)] = &[
    ("Chrom", "Chromosome"),
    ("Start", "Start_Position"),
    ("Ref", "Reference_Allele"),
    ("Alt", "Tumor_Seq_Allele2"),
];

/// Site key of the annotation lists; the end position is not part of it.
pub type SiteKey = (String, i64, String, String);

fn site_key(record: &CallRecord) -> SiteKey {
    (
        record.chromosome.clone(),
        record.start_position,
        record.reference_allele.clone(),
        record.tumor_seq_allele2.clone(),
    )
}

/// Load the sites of an annotation list after applying `renames`.
///
/// The list is a primary input so missing key columns are an error.
pub fn load_sites(
    path: &std::path::Path,
    renames: &[(&str, &str)],
) -> Result<HashSet<SiteKey>, anyhow::Error> {
    let table = Table::read(path, &TableFormat::TSV.with_comments())?.rename_columns(renames);
    table.require_columns(ANNOTATION_KEY_COLUMNS)?;

    let mut result = HashSet::new();
    for row in &table.rows {
        let start = table
            .get(row, "Start_Position")
            .and_then(de::parse_pos);
        match start {
            Some(start) => {
                result.insert((
                    de::normalize_chrom(table.get_or_empty(row, "Chromosome")),
                    start,
                    table.get_or_empty(row, "Reference_Allele").to_string(),
                    table.get_or_empty(row, "Tumor_Seq_Allele2").to_string(),
                ));
            }
            None => tracing::warn!("skipping row with invalid position in {:?}", path),
        }
    }
    tracing::debug!("{} sites in {:?}", result.len(), path);
    Ok(result)
}

fn flag(sites: &HashSet<SiteKey>, key: &SiteKey) -> String {
    if sites.contains(key) {
        String::from("yes")
    } else {
        String::new()
    }
}

/// Set the `Hotspot` and `CH` columns of `records`.
pub fn annotate(records: &mut [CallRecord], hotspots: &HashSet<SiteKey>, ch: &HashSet<SiteKey>) {
    for record in records.iter_mut() {
        let key = site_key(record);
        record.hotspot = flag(hotspots, &key);
        record.ch = flag(ch, &key);
    }
}

/// Main entry point for `snvs annotate` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let mut records = read_calls(&args.variant_input)?;
    let hotspots = load_sites(&args.hotspot_list, &[])?;
    let ch = load_sites(&args.ch_list, CH_COLUMN_MAP)?;

    annotate(&mut records, &hotspots, &ch);
    tracing::info!(
        "{} hotspot and {} CH rows",
        records.iter().filter(|r| !r.hotspot.is_empty()).count(),
        records.iter().filter(|r| !r.ch.is_empty()).count()
    );
    write_records(&args.output, &TableFormat::CSV, &records)?;

    Ok(())
}

#[cfg(test)]
mod test {
    use std::path::{Path, PathBuf};

    use pretty_assertions::assert_eq;

    #[test]
    fn load_ch_sites_with_renames() -> Result<(), anyhow::Error> {
        let sites = super::load_sites(Path::new("tests/snvs/annotate/ch.tsv"), super::CH_COLUMN_MAP)?;
        assert!(sites.contains(&(
            String::from("12"),
            25398284,
            String::from("C"),
            String::from("A")
        )));
        Ok(())
    }

    #[test]
    fn load_sites_without_key_columns_fails() {
        // The CH list is not renamed, so the canonical columns are missing.
        let result = super::load_sites(Path::new("tests/snvs/annotate/ch.tsv"), &[]);
        assert!(result.is_err());
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let args = super::Args {
            variant_input: PathBuf::from("tests/snvs/annotate/calls.csv"),
            hotspot_list: PathBuf::from("tests/snvs/annotate/hotspots.tsv"),
            ch_list: PathBuf::from("tests/snvs/annotate/ch.tsv"),
            output: tmp_dir.join("annotated.csv"),
        };

        super::run(&crate::common::Args::default(), &args)?;

        let records = crate::snvs::read_calls(tmp_dir.join("annotated.csv"))?;
        assert_eq!(
            records
                .iter()
                .map(|r| (r.hugo_symbol.as_str(), r.hotspot.as_str(), r.ch.as_str()))
                .collect::<Vec<_>>(),
            vec![("KRAS", "yes", "yes"), ("TP53", "yes", ""), ("EGFR", "", "")]
        );

        Ok(())
    }
}

//! Implementation of `snvs to-maf` subcommand.

use std::path::{Path, PathBuf};

use crate::{
    common::{
        de,
        io::{write_table, Table, TableFormat},
    },
    snvs::schema::VARIANT_KEY_COLUMNS,
};

/// Command line arguments for `snvs to-maf` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Convert SNV/indel CSV files to MAF", long_about = None)]
pub struct Args {
    /// One or more calls CSV files.
    #[arg(long, required = true, num_args = 1..)]
    pub variant_csvs: Vec<PathBuf>,
    /// Directory to write `{stem}.maf` files to.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

/// Leading columns of the written MAF.
pub const MAF_COLUMNS: &[&str] = &[
    "Hugo_Symbol",
    "Chromosome",
    "Start_Position",
    "End_Position",
    "Reference_Allele",
    "Tumor_Seq_Allele2",
    "Variant_Classification",
    "Tumor_Sample_Barcode",
    "Match_Norm_Sample_Barcode",
    "Variant_Type",
    "HGVSp",
    "HGVSp_Short",
    "HGVSc",
];

/// Reorder `table` to the MAF columns followed by all other columns.
pub fn to_maf(table: &Table) -> Result<(Vec<String>, Vec<Vec<String>>), anyhow::Error> {
    table.require_columns(VARIANT_KEY_COLUMNS)?;
    let missing = MAF_COLUMNS
        .iter()
        .copied()
        .filter(|name| !table.has_columns(&[*name]))
        .filter(|name| *name != "Tumor_Sample_Barcode" || !table.has_columns(&["sample_id"]))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        tracing::warn!(
            "{:?} lacks MAF columns {:?}, writing them empty",
            &table.path,
            &missing
        );
    }

    let headers = MAF_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .chain(
            table
                .headers
                .iter()
                .filter(|name| !MAF_COLUMNS.contains(&name.as_str()))
                .cloned(),
        )
        .collect::<Vec<_>>();

    let mut rows = Vec::with_capacity(table.rows.len());
    for (i, row) in table.rows.iter().enumerate() {
        let mut values = Vec::with_capacity(headers.len());
        for name in &headers {
            let value = match name.as_str() {
                "Start_Position" | "End_Position" => {
                    let raw = table.get_or_empty(row, name);
                    de::parse_pos(raw)
                        .ok_or_else(|| {
                            anyhow::anyhow!(
                                "invalid {} {:?} in row {} of {:?}",
                                name,
                                raw,
                                i + 1,
                                &table.path
                            )
                        })?
                        .to_string()
                }
                "Chromosome" => de::normalize_chrom(table.get_or_empty(row, name)),
                "Tumor_Sample_Barcode" => table
                    .get(row, "sample_id")
                    .unwrap_or_else(|| table.get_or_empty(row, name))
                    .to_string(),
                _ => table.get_or_empty(row, name).to_string(),
            };
            values.push(value);
        }
        rows.push(values);
    }
    Ok((headers, rows))
}

/// Path of the MAF written for `csv_path`.
pub fn maf_path(output_dir: &Path, csv_path: &Path) -> PathBuf {
    let stem = csv_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    output_dir.join(format!("{}.maf", stem))
}

/// Main entry point for `snvs to-maf` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    for csv_path in &args.variant_csvs {
        tracing::info!("converting {:?} to MAF", csv_path);
        let table = Table::read(csv_path, &TableFormat::CSV)?;
        let (headers, rows) = to_maf(&table)?;
        write_table(
            maf_path(&args.output_dir, csv_path),
            &TableFormat::TSV,
            &headers,
            &rows,
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use std::path::{Path, PathBuf};

    use pretty_assertions::assert_eq;

    use crate::common::io::{Table, TableFormat};

    #[test]
    fn maf_path() {
        assert_eq!(
            super::maf_path(Path::new("out"), Path::new("/data/P1_final.csv")),
            PathBuf::from("out/P1_final.maf")
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn reorders_and_fills_columns() -> Result<(), anyhow::Error> {
        let table = Table::read("tests/snvs/schema/calls.csv", &TableFormat::CSV)?;

        let (headers, rows) = super::to_maf(&table)?;

        assert_eq!(&headers[..super::MAF_COLUMNS.len()], super::MAF_COLUMNS);
        assert_eq!(headers.last().map(String::as_str), Some("extra_column"));
        assert_eq!(&rows[0][1..4], &["17", "7577120", "7577120"]);
        assert_eq!(rows[0][7], "C-ABC123-L001-d01");
        assert_eq!(rows[0][9], "");
        assert!(logs_contain("writing them empty"));

        Ok(())
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let args = super::Args {
            variant_csvs: vec![PathBuf::from("tests/snvs/filter/calls.csv")],
            output_dir: tmp_dir.to_path_buf(),
        };

        super::run(&crate::common::Args::default(), &args)?;

        let maf = Table::read(tmp_dir.join("calls.maf"), &TableFormat::TSV)?;
        assert_eq!(maf.rows.len(), 4);
        assert_eq!(maf.get(&maf.rows[0], "Tumor_Sample_Barcode"), Some("C-ABC123-L001-d01"));
        assert_eq!(maf.get(&maf.rows[0], "sample_id"), Some("C-ABC123-L001-d01"));

        Ok(())
    }
}

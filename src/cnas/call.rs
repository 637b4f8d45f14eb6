//! Implementation of `cnas call` subcommand.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::{
    cnas::{CnaFilter, CnaRecord, CnaType},
    common::{
        de,
        io::{load_table, write_records, TableFormat},
        parse_list, FilterSet,
    },
    patient::{Assay, PatientData, Sample},
    snvs::SIGNED_OUT,
};

/// Command line arguments for `cnas call` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Compile clinical and research CNA calls of a patient", long_about = None)]
pub struct Args {
    /// Path to the patient JSON.
    #[arg(long)]
    pub patient_json: PathBuf,
    /// Template of the research ACCESS CNA files; `{cmo_patient_id}` and
    /// `{sample_id}` are substituted.
    #[arg(long)]
    pub research_access_cna_template: String,
    /// Clinical CNA matrix, genes by samples.
    #[arg(long)]
    pub clinical_cna_file: PathBuf,
    /// Genes eligible for de-novo CNA calls on XS1, comma separated or `@file`.
    #[arg(long)]
    pub access_copy_number_gene_list_v1: String,
    /// Genes eligible for de-novo CNA calls on XS2, comma separated or `@file`.
    #[arg(long)]
    pub access_copy_number_gene_list_v2: String,
    /// ACCESS version of research samples without one in the patient JSON.
    #[arg(long)]
    pub default_access_version: Option<String>,
    /// Maximal adjusted p-value of research calls.
    #[arg(long, default_value_t = 0.05)]
    pub p_value_threshold: f64,
    /// Minimal fold change of de-novo amplifications.
    #[arg(long, default_value_t = 1.5, allow_hyphen_values = true)]
    pub fc_denovo_amp: f64,
    /// Maximal fold change of de-novo deletions.
    #[arg(long, default_value_t = -1.5, allow_hyphen_values = true)]
    pub fc_denovo_del: f64,
    /// Minimal fold change of signed out amplifications.
    #[arg(long, default_value_t = 1.2, allow_hyphen_values = true)]
    pub fc_signedout_amp: f64,
    /// Maximal fold change of signed out deletions.
    #[arg(long, default_value_t = -1.2, allow_hyphen_values = true)]
    pub fc_signedout_del: f64,
    /// Path to the output CSV with all calls.
    #[arg(long)]
    pub output: PathBuf,
    /// Path to the output CSV with the passing calls; defaults to
    /// `{output stem}.pass-filtered.csv`.
    #[arg(long)]
    pub output_final: Option<PathBuf>,
}

/// Thresholds of the research CNA filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub p_value: f64,
    pub fc_denovo_amp: f64,
    pub fc_denovo_del: f64,
    pub fc_signedout_amp: f64,
    pub fc_signedout_del: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            p_value: 0.05,
            fc_denovo_amp: 1.5,
            fc_denovo_del: -1.5,
            fc_signedout_amp: 1.2,
            fc_signedout_del: -1.2,
        }
    }
}

impl Thresholds {
    /// Whether `fc` is too weak for an event of type `cna_type`.
    fn below(cna_type: CnaType, fc: f64, amp: f64, del: f64) -> bool {
        match cna_type {
            CnaType::Amp => fc < amp,
            CnaType::Del => fc > del,
        }
    }
}

/// ACCESS copy number gene lists by ACCESS version.
#[derive(Debug, Clone, Default)]
pub struct GeneLists {
    pub xs1: HashSet<String>,
    pub xs2: HashSet<String>,
}

impl GeneLists {
    /// The list for `access_version`, if there is one.
    pub fn for_version(&self, access_version: Option<&str>) -> Option<&HashSet<String>> {
        match access_version {
            Some("XS1") => Some(&self.xs1),
            Some("XS2") => Some(&self.xs2),
            _ => None,
        }
    }
}

/// Signed out calls of the clinical CNA matrix for columns containing `dmp_id`.
pub fn clinical_calls(path: &Path, patient: &PatientData) -> Vec<CnaRecord> {
    if patient.dmp_id.is_empty() {
        return Vec::new();
    }
    let table = match load_table(path, &TableFormat::TSV, &[]).or_warn("clinical CNA file") {
        Some(table) => table,
        None => return Vec::new(),
    };

    let mut result = Vec::new();
    for (col, sample_id) in table.headers.iter().enumerate().skip(1) {
        if !sample_id.contains(&patient.dmp_id) {
            continue;
        }
        let sample = patient.samples.get(sample_id);
        for row in &table.rows {
            let gene = row.get(0).unwrap_or_default().trim();
            let fold_change = row.get(col).and_then(de::parse_f64);
            let cna_type = match CnaType::of_fold_change(fold_change) {
                Some(cna_type) => cna_type,
                None => continue,
            };
            result.push(CnaRecord {
                hugo_symbol: gene.to_string(),
                cna_type: Some(cna_type),
                sample_id: sample_id.clone(),
                patient_id: patient.combined_id.clone(),
                dmp_patient_id: patient.dmp_id.clone(),
                filter: FilterSet::default(),
                assay: sample.map(|s| s.assay_type.assay()),
                source: sample.map(|s| s.assay_type.source()),
                ..Default::default()
            });
        }
    }
    tracing::debug!("{} signed out CNA calls", result.len());
    result
}

/// Filters of one research call.
pub fn research_filters(
    gene: &str,
    cna_type: Option<CnaType>,
    fold_change: Option<f64>,
    p_val: Option<f64>,
    signed_out: &HashSet<(String, Option<CnaType>)>,
    gene_list: Option<&HashSet<String>>,
    thresholds: &Thresholds,
) -> FilterSet<CnaFilter> {
    let mut filter = FilterSet::default();
    if matches!(p_val, Some(p) if p > thresholds.p_value) {
        filter.push(CnaFilter::PvalFilter);
    }
    match (cna_type, fold_change) {
        (Some(cna_type), Some(fc)) => {
            if signed_out.contains(&(gene.to_string(), Some(cna_type))) {
                if Thresholds::below(
                    cna_type,
                    fc,
                    thresholds.fc_signedout_amp,
                    thresholds.fc_signedout_del,
                ) {
                    filter.push(CnaFilter::FcFilterSignedout);
                }
            } else {
                match gene_list {
                    Some(genes) if genes.contains(gene) => {
                        if Thresholds::below(
                            cna_type,
                            fc,
                            thresholds.fc_denovo_amp,
                            thresholds.fc_denovo_del,
                        ) {
                            filter.push(CnaFilter::FcFilterDenovo);
                        }
                    }
                    _ => filter.push(CnaFilter::DenovoNotInGenelist),
                }
            }
        }
        _ => filter.push(CnaFilter::UnknownEvent),
    }
    filter
}

/// Research ACCESS CNA calls of one tumor sample.
fn sample_research_calls(
    path: &Path,
    sample: &Sample,
    patient: &PatientData,
    signed_out: &HashSet<(String, Option<CnaType>)>,
    gene_list: Option<&HashSet<String>>,
    thresholds: &Thresholds,
) -> Vec<CnaRecord> {
    let table = match load_table(path, &TableFormat::TSV, &["region", "fc", "p.adj"])
        .or_warn(&format!("CNA file of {}", &sample.sample_id))
    {
        Some(table) => table,
        None => return Vec::new(),
    };

    table
        .rows
        .iter()
        .map(|row| {
            let gene = table.get_or_empty(row, "region");
            let fold_change = table.get(row, "fc").and_then(de::parse_f64);
            let p_val = table.get(row, "p.adj").and_then(de::parse_f64);
            let cna_type = CnaType::of_fold_change(fold_change);
            CnaRecord {
                hugo_symbol: gene.to_string(),
                cna_type,
                sample_id: sample.sample_id.clone(),
                patient_id: patient.combined_id.clone(),
                cmo_patient_id: patient.cmo_id.clone(),
                fold_change,
                p_val,
                filter: research_filters(
                    gene,
                    cna_type,
                    fold_change,
                    p_val,
                    signed_out,
                    gene_list,
                    thresholds,
                ),
                assay: Some(sample.assay_type.assay()),
                source: Some(sample.assay_type.source()),
                ..Default::default()
            }
        })
        .collect()
}

/// Research ACCESS CNA calls of all research tumor samples.
pub fn research_calls(
    template: &str,
    patient: &PatientData,
    signed_out: &HashSet<(String, Option<CnaType>)>,
    gene_lists: &GeneLists,
    default_access_version: Option<&str>,
    thresholds: &Thresholds,
) -> Vec<CnaRecord> {
    let mut result = Vec::new();
    for sample in patient.research_access_tumors() {
        let path = template
            .replace("{cmo_patient_id}", &patient.cmo_id)
            .replace("{sample_id}", &sample.sample_id);
        let access_version = sample.access_version.as_deref().or(default_access_version);
        result.append(&mut sample_research_calls(
            Path::new(&path),
            sample,
            patient,
            signed_out,
            gene_lists.for_version(access_version),
            thresholds,
        ));
    }
    result
}

/// Drop genes without any passing call, flag the remaining genes without an
/// ACCESS call and sort by gene, type and sample.
pub fn final_filter(records: Vec<CnaRecord>) -> Vec<CnaRecord> {
    let passing_genes = records
        .iter()
        .filter(|record| record.filter.is_pass())
        .map(|record| record.hugo_symbol.clone())
        .collect::<HashSet<_>>();
    let mut records = records
        .into_iter()
        .filter(|record| passing_genes.contains(&record.hugo_symbol))
        .collect::<Vec<_>>();

    let access_genes = records
        .iter()
        .filter(|record| record.assay == Some(Assay::Access))
        .map(|record| record.hugo_symbol.clone())
        .collect::<HashSet<_>>();
    for record in records.iter_mut() {
        if !access_genes.contains(&record.hugo_symbol) {
            record.filter.push(CnaFilter::GeneNotInAccess);
        }
    }

    records.sort_by(|a, b| {
        (&a.hugo_symbol, a.cna_type_str(), &a.sample_id).cmp(&(
            &b.hugo_symbol,
            b.cna_type_str(),
            &b.sample_id,
        ))
    });
    records
}

/// Fill `variant` and `variant_clinical_status`.
pub fn add_variant_columns(
    records: &mut [CnaRecord],
    signed_out: &HashSet<(String, Option<CnaType>)>,
) {
    for record in records.iter_mut() {
        record.variant = format!("{}_{}", &record.hugo_symbol, record.cna_type_str());
        record.variant_clinical_status = if signed_out.contains(&record.event()) {
            SIGNED_OUT.to_string()
        } else {
            String::new()
        };
    }
}

/// The passing-calls output path derived from `output`.
pub fn default_output_final(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    output.with_file_name(format!("{}.pass-filtered.csv", stem))
}

/// Main entry point for `cnas call` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &common);
    tracing::info!("args = {:?}", &args);

    let patient = PatientData::load(&args.patient_json)?;
    let gene_lists = GeneLists {
        xs1: parse_list(&args.access_copy_number_gene_list_v1)?
            .into_iter()
            .collect(),
        xs2: parse_list(&args.access_copy_number_gene_list_v2)?
            .into_iter()
            .collect(),
    };
    let thresholds = Thresholds {
        p_value: args.p_value_threshold,
        fc_denovo_amp: args.fc_denovo_amp,
        fc_denovo_del: args.fc_denovo_del,
        fc_signedout_amp: args.fc_signedout_amp,
        fc_signedout_del: args.fc_signedout_del,
    };

    let mut records = clinical_calls(&args.clinical_cna_file, &patient);
    let signed_out = records.iter().map(CnaRecord::event).collect::<HashSet<_>>();
    records.append(&mut research_calls(
        &args.research_access_cna_template,
        &patient,
        &signed_out,
        &gene_lists,
        args.default_access_version.as_deref(),
        &thresholds,
    ));

    let mut records = final_filter(records);
    add_variant_columns(&mut records, &signed_out);
    write_records(&args.output, &TableFormat::CSV, &records)?;

    let passing = records
        .into_iter()
        .filter(|record| record.filter.is_pass())
        .collect::<Vec<_>>();
    let output_final = args
        .output_final
        .clone()
        .unwrap_or_else(|| default_output_final(&args.output));
    write_records(&output_final, &TableFormat::CSV, &passing)?;

    Ok(())
}

#[cfg(test)]
mod test {
    use std::{
        collections::HashSet,
        path::{Path, PathBuf},
    };

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::Thresholds;
    use crate::{
        cnas::{CnaRecord, CnaType},
        common::FilterSet,
        patient::Assay,
    };

    fn genes(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case("MYC", Some(1.6), Some(0.01), false, true, "PASS")]
    #[case("MYC", Some(1.3), Some(0.01), false, true, "fc_filter_denovo")]
    #[case("MYC", Some(1.3), Some(0.01), true, true, "PASS")]
    #[case("MYC", Some(1.1), Some(0.01), true, true, "fc_filter_signedout")]
    #[case("MYC", Some(1.6), Some(0.2), false, true, "pval_filter")]
    #[case("MYC", Some(1.6), Some(0.01), false, false, "denovo_not_in_genelist")]
    #[case("MYC", Some(-1.4), Some(0.2), false, true, "pval_filter;fc_filter_denovo")]
    #[case("MYC", None, None, false, true, "unknown_event")]
    #[case("MYC", Some(0.0), Some(0.01), false, true, "unknown_event")]
    fn research_filters(
        #[case] gene: &str,
        #[case] fc: Option<f64>,
        #[case] p_val: Option<f64>,
        #[case] is_signed_out: bool,
        #[case] in_gene_list: bool,
        #[case] expected: &str,
    ) {
        let cna_type = CnaType::of_fold_change(fc);
        let signed_out = if is_signed_out {
            vec![(gene.to_string(), cna_type)].into_iter().collect()
        } else {
            HashSet::new()
        };
        let gene_list = genes(&["MYC"]);
        let filter = super::research_filters(
            gene,
            cna_type,
            fc,
            p_val,
            &signed_out,
            if in_gene_list { Some(&gene_list) } else { None },
            &Thresholds::default(),
        );
        assert_eq!(filter.to_string(), expected);
    }

    fn record(gene: &str, sample_id: &str, assay: Assay, filter: &str) -> CnaRecord {
        CnaRecord {
            hugo_symbol: gene.to_string(),
            cna_type: Some(CnaType::Amp),
            sample_id: sample_id.to_string(),
            assay: Some(assay),
            filter: filter.parse().unwrap_or_else(|_| FilterSet::default()),
            ..Default::default()
        }
    }

    #[test]
    fn final_filter_drops_and_flags() {
        let records = vec![
            record("ERBB2", "S2", Assay::Impact, "PASS"),
            record("MYC", "S1", Assay::Access, "PASS"),
            record("KRAS", "S1", Assay::Access, "pval_filter"),
            record("ERBB2", "S1", Assay::Impact, "pval_filter"),
        ];

        let records = super::final_filter(records);

        assert_eq!(
            records
                .iter()
                .map(|r| (
                    r.hugo_symbol.as_str(),
                    r.sample_id.as_str(),
                    r.filter.to_string()
                ))
                .collect::<Vec<_>>(),
            vec![
                ("ERBB2", "S1", String::from("pval_filter;gene_not_in_access")),
                ("ERBB2", "S2", String::from("gene_not_in_access")),
                ("MYC", "S1", String::from("PASS")),
            ]
        );
    }

    #[test]
    fn default_output_final() {
        assert_eq!(
            super::default_output_final(Path::new("out/P1_cna.csv")),
            PathBuf::from("out/P1_cna.pass-filtered.csv")
        );
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let args = super::Args {
            patient_json: PathBuf::from("tests/patient/C-ABC123_P-0000001_all_samples.json"),
            research_access_cna_template: String::from("tests/cnas/{sample_id}_cna.tsv"),
            clinical_cna_file: PathBuf::from("tests/cnas/clinical_cna.tsv"),
            access_copy_number_gene_list_v1: String::from("AR"),
            access_copy_number_gene_list_v2: String::from("MYC,ERBB2"),
            default_access_version: Some(String::from("XS2")),
            p_value_threshold: 0.05,
            fc_denovo_amp: 1.5,
            fc_denovo_del: -1.5,
            fc_signedout_amp: 1.2,
            fc_signedout_del: -1.2,
            output: tmp_dir.join("cna.csv"),
            output_final: None,
        };

        super::run(&crate::common::Args::default(), &args)?;

        let all: Vec<CnaRecord> = crate::common::io::read_records(
            tmp_dir.join("cna.csv"),
            &crate::common::io::TableFormat::CSV,
        )?;
        assert_eq!(
            all.iter()
                .map(|r| (
                    r.variant.as_str(),
                    r.sample_id.as_str(),
                    r.variant_clinical_status.as_str(),
                    r.filter.to_string()
                ))
                .collect::<Vec<_>>(),
            vec![
                ("ERBB2_AMP", "C-ABC123-L001-d01", "Signed Out", String::from("PASS")),
                ("ERBB2_AMP", "P-0000001-T02-IM7", "Signed Out", String::from("PASS")),
                ("MYC_AMP", "C-ABC123-L001-d01", "", String::from("PASS")),
                ("MYC_DEL", "C-ABC123-L001-d01", "", String::from("fc_filter_denovo")),
                (
                    "PTEN_DEL",
                    "P-0000001-T02-IM7",
                    "Signed Out",
                    String::from("gene_not_in_access")
                ),
            ]
        );

        let passing: Vec<CnaRecord> = crate::common::io::read_records(
            tmp_dir.join("cna.pass-filtered.csv"),
            &crate::common::io::TableFormat::CSV,
        )?;
        assert_eq!(passing.len(), 3);

        Ok(())
    }
}

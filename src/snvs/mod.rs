//! SNV/indel calls: union, aggregation, annotation, VAF adjustment, filtering
//! and reporting.

pub mod aggregate;
pub mod annotate;
pub mod facets_vaf;
pub mod filter;
pub mod pivot;
pub mod schema;
pub mod to_maf;
pub mod union;

use std::path::Path;

use crate::common::{chrom_pos_key, io::TableFormat};

/// Value of the `Clinical` column for calls reported by the clinical pipeline.
pub const SIGNED_OUT: &str = "Signed Out";

/// Read the long call table at `path`, failing on missing identity columns.
pub fn read_calls<P: AsRef<Path>>(path: P) -> Result<Vec<schema::CallRecord>, anyhow::Error> {
    let table = crate::common::io::Table::read(path.as_ref(), &TableFormat::CSV)?;
    table.require_columns(schema::VARIANT_KEY_COLUMNS)?;
    let records: Vec<schema::CallRecord> = table.deserialize()?;
    tracing::debug!(
        "read {} call records from {:?}",
        thousands::Separable::separate_with_commas(&records.len()),
        path.as_ref()
    );
    Ok(records)
}

/// Sort calls by chromosome and start position, keeping the order of ties.
pub fn sort_calls(records: &mut [schema::CallRecord]) {
    records.sort_by_key(|record| chrom_pos_key(&record.chromosome, Some(record.start_position)));
}

//! Common, IO-related code.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use flate2::{bufread::MultiGzDecoder, write::GzEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};

use crate::err::SchemaError;

/// Transparently open a file with gzip decoder.
pub fn open_read_maybe_gz<P>(path: P) -> Result<Box<dyn BufRead>, anyhow::Error>
where
    P: AsRef<Path>,
{
    if path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz")) {
        tracing::trace!("Opening {:?} as gzip for reading", path.as_ref());
        let file = File::open(path)?;
        let bufreader = BufReader::new(file);
        let decoder = MultiGzDecoder::new(bufreader);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        tracing::trace!("Opening {:?} as plain text for reading", path.as_ref());
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Transparently open a file with gzip encoder.
pub fn open_write_maybe_gz<P>(path: P) -> Result<Box<dyn Write>, anyhow::Error>
where
    P: AsRef<Path>,
{
    if path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz")) {
        tracing::trace!("Opening {:?} as gzip for writing", path.as_ref());
        let file = File::create(path)?;
        let bufwriter = BufWriter::new(file);
        let encoder = GzEncoder::new(bufwriter, Compression::default());
        Ok(Box::new(encoder))
    } else {
        tracing::trace!("Opening {:?} as plain text for writing", path.as_ref());
        let file = File::create(path)?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

// The output is wrapped in a Result to allow matching on errors
// Returns an Iterator to the Reader of the lines of the file.
pub fn read_lines<P: AsRef<Path>>(
    filename: P,
) -> std::io::Result<std::io::Lines<std::io::BufReader<File>>>
where
    P: AsRef<Path>,
{
    let file = File::open(filename)?;
    Ok(std::io::BufReader::new(file).lines())
}

/// Whether `path` points to an existing regular file, following symlinks.
pub fn is_valid_path<P: AsRef<Path>>(path: P) -> bool {
    std::fs::canonicalize(path.as_ref())
        .map(|p| p.is_file())
        .unwrap_or(false)
}

/// Layout of a delimited text table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFormat {
    /// Field delimiter.
    pub delimiter: u8,
    /// Skip lines starting with this byte.
    pub comment: Option<u8>,
    /// Drop every line containing this marker before parsing.
    pub drop_lines_containing: Option<&'static str>,
}

impl TableFormat {
    /// Plain tab-separated values (MAF, TSV).
    pub const TSV: TableFormat = TableFormat {
        delimiter: b'\t',
        comment: None,
        drop_lines_containing: None,
    };
    /// Plain comma-separated values.
    pub const CSV: TableFormat = TableFormat {
        delimiter: b',',
        comment: None,
        drop_lines_containing: None,
    };

    /// Same format, skipping `#`-prefixed lines.
    pub const fn with_comments(self) -> Self {
        TableFormat {
            comment: Some(b'#'),
            ..self
        }
    }

    /// Same format, dropping lines containing `marker`.
    pub const fn dropping_lines_with(self, marker: &'static str) -> Self {
        TableFormat {
            drop_lines_containing: Some(marker),
            ..self
        }
    }

    /// Guess the format from the file extension, `.csv` is comma, all else is tab.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let name = path.as_ref().to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".csv") || name.ends_with(".csv.gz") {
            Self::CSV
        } else {
            Self::TSV
        }
    }

    fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .delimiter(self.delimiter)
            .comment(self.comment)
            .flexible(true)
            .has_headers(true);
        if self.delimiter == b'\t' {
            builder.quoting(false);
        }
        builder
    }
}

/// Read the full text of `path`, applying the line-level filters of `format`.
fn read_filtered_text<P: AsRef<Path>>(path: P, format: &TableFormat) -> Result<String, anyhow::Error> {
    let mut text = String::new();
    open_read_maybe_gz(path.as_ref())?.read_to_string(&mut text)?;
    if let Some(marker) = format.drop_lines_containing {
        text = text
            .lines()
            .filter(|line| !line.contains(marker))
            .map(|line| format!("{}\n", line))
            .collect();
    }
    Ok(text)
}

/// A loosely typed table whose columns are looked up by name.
///
/// Used for the heterogeneous assay files where the column set varies.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Path the table was read from.
    pub path: PathBuf,
    /// Header names in file order.
    pub headers: Vec<String>,
    /// The data rows.
    pub rows: Vec<csv::StringRecord>,
    index: HashMap<String, usize>,
}

impl Table {
    /// Construct from headers and rows.
    pub fn new(path: PathBuf, headers: Vec<String>, rows: Vec<csv::StringRecord>) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            path,
            headers,
            rows,
            index,
        }
    }

    /// Read table from `path`.
    pub fn read<P: AsRef<Path>>(path: P, format: &TableFormat) -> Result<Self, anyhow::Error> {
        let text = read_filtered_text(path.as_ref(), format)?;
        let mut reader = format.reader_builder().from_reader(text.as_bytes());
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(path.as_ref().to_path_buf(), headers, rows))
    }

    /// Rename columns according to `mapping` (old name, new name).
    pub fn rename_columns(self, mapping: &[(&str, &str)]) -> Self {
        let headers = self
            .headers
            .into_iter()
            .map(|name| {
                mapping
                    .iter()
                    .find(|(old, _)| *old == name)
                    .map(|(_, new)| new.to_string())
                    .unwrap_or(name)
            })
            .collect();
        Self::new(self.path, headers, self.rows)
    }

    /// Index of column `name`, if any.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Whether all of `names` are present.
    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|name| self.index.contains_key(*name))
    }

    /// Ensure that all of `names` are present.
    pub fn require_columns(&self, names: &[&str]) -> Result<(), SchemaError> {
        let missing = names
            .iter()
            .filter(|name| !self.index.contains_key(**name))
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::MissingColumns {
                path: self.path.clone(),
                missing,
            })
        }
    }

    /// Value of column `name` in `row`, trimmed; `None` if the column does not exist.
    pub fn get<'a>(&self, row: &'a csv::StringRecord, name: &str) -> Option<&'a str> {
        self.column(name)
            .and_then(|idx| row.get(idx))
            .map(|s| s.trim())
    }

    /// Like `get()` but empty string for missing columns.
    pub fn get_or_empty<'a>(&self, row: &'a csv::StringRecord, name: &str) -> &'a str {
        self.get(row, name).unwrap_or_default()
    }

    /// Deserialize one row into a record of type `T`.
    pub fn deserialize_row<T: DeserializeOwned>(
        &self,
        row: &csv::StringRecord,
    ) -> Result<T, csv::Error> {
        let headers = csv::StringRecord::from(self.headers.clone());
        row.deserialize(Some(&headers))
    }

    /// Deserialize all rows into records of type `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<Vec<T>, anyhow::Error> {
        let headers = csv::StringRecord::from(self.headers.clone());
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.deserialize(Some(&headers)).map_err(|e| {
                    anyhow::anyhow!("problem parsing row {} of {:?}: {}", i + 1, &self.path, e)
                })
            })
            .collect()
    }
}

/// Read all records of type `T` from `path`.
pub fn read_records<T, P>(path: P, format: &TableFormat) -> Result<Vec<T>, anyhow::Error>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let text = read_filtered_text(path.as_ref(), format)?;
    let mut reader = format.reader_builder().from_reader(text.as_bytes());
    let mut result = Vec::new();
    for record in reader.deserialize() {
        result.push(record.map_err(|e| {
            anyhow::anyhow!("problem parsing record in {:?}: {}", path.as_ref(), e)
        })?);
    }
    Ok(result)
}

/// Why a load did not produce data.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The file does not exist.
    MissingInput(PathBuf),
    /// The file lacks required columns.
    SchemaMismatch(SchemaError),
    /// The file exists but could not be read or parsed.
    Unreadable { path: PathBuf, message: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingInput(path) => write!(f, "file not found: {:?}", path),
            SkipReason::SchemaMismatch(err) => write!(f, "{}", err),
            SkipReason::Unreadable { path, message } => {
                write!(f, "could not read {:?}: {}", path, message)
            }
        }
    }
}

/// Outcome of a soft-failing load.
#[derive(Debug, Clone)]
pub enum LoadOutcome<T> {
    /// The data was loaded.
    Loaded(T),
    /// The source was skipped.
    Skipped(SkipReason),
}

impl<T> LoadOutcome<T> {
    /// Return the loaded data, or log the skip reason at WARN and return `None`.
    pub fn or_warn(self, what: &str) -> Option<T> {
        match self {
            LoadOutcome::Loaded(data) => Some(data),
            LoadOutcome::Skipped(reason) => {
                tracing::warn!("skipping {}: {}", what, reason);
                None
            }
        }
    }

    /// Map the loaded data.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> LoadOutcome<U> {
        match self {
            LoadOutcome::Loaded(data) => LoadOutcome::Loaded(f(data)),
            LoadOutcome::Skipped(reason) => LoadOutcome::Skipped(reason),
        }
    }
}

/// Load a table, turning a missing file, unreadable content or missing
/// `required` columns into `LoadOutcome::Skipped`.
pub fn load_table<P: AsRef<Path>>(
    path: P,
    format: &TableFormat,
    required: &[&str],
) -> LoadOutcome<Table> {
    let path = path.as_ref();
    if !is_valid_path(path) {
        return LoadOutcome::Skipped(SkipReason::MissingInput(path.to_path_buf()));
    }
    match Table::read(path, format) {
        Ok(table) => match table.require_columns(required) {
            Ok(()) => LoadOutcome::Loaded(table),
            Err(err) => LoadOutcome::Skipped(SkipReason::SchemaMismatch(err)),
        },
        Err(err) => LoadOutcome::Skipped(SkipReason::Unreadable {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

/// Load typed records, turning a missing file or unparsable content into
/// `LoadOutcome::Skipped`.
pub fn load_records<T, P>(path: P, format: &TableFormat) -> LoadOutcome<Vec<T>>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !is_valid_path(path) {
        return LoadOutcome::Skipped(SkipReason::MissingInput(path.to_path_buf()));
    }
    match read_records(path, format) {
        Ok(records) => LoadOutcome::Loaded(records),
        Err(err) => LoadOutcome::Skipped(SkipReason::Unreadable {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

/// Header of the table written for records of type `T`.
///
/// Obtained by serializing `T::default()`, so the header always matches the
/// serialized fields, also for empty outputs.
pub fn header_of<T: Serialize + Default>() -> Result<Vec<String>, anyhow::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());
    writer.serialize(T::default())?;
    let buf = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("could not build header: {}", e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(buf.as_slice());
    let header = reader
        .records()
        .next()
        .ok_or_else(|| anyhow::anyhow!("could not build header: no output"))??;
    Ok(header.iter().map(|s| s.to_string()).collect())
}

/// Write `records` to `writer`, always including the header line.
pub fn write_records_to<T, W>(
    writer: W,
    format: &TableFormat,
    records: &[T],
) -> Result<(), anyhow::Error>
where
    T: Serialize + Default,
    W: Write,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(format.delimiter)
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(header_of::<T>()?)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `records` to the file at `path`.
pub fn write_records<T, P>(path: P, format: &TableFormat, records: &[T]) -> Result<(), anyhow::Error>
where
    T: Serialize + Default,
    P: AsRef<Path>,
{
    let writer = open_write_maybe_gz(path.as_ref()).map_err(|e| {
        anyhow::anyhow!("cannot open {:?} for writing: {}", path.as_ref(), e)
    })?;
    write_records_to(writer, format, records)?;
    tracing::info!(
        "{:?} has been created ({} records)",
        path.as_ref(),
        thousands::Separable::separate_with_commas(&records.len())
    );
    Ok(())
}

/// Write a loosely typed table with the given header.
pub fn write_table<P: AsRef<Path>>(
    path: P,
    format: &TableFormat,
    headers: &[String],
    rows: &[Vec<String>],
) -> Result<(), anyhow::Error> {
    let writer = open_write_maybe_gz(path.as_ref()).map_err(|e| {
        anyhow::anyhow!("cannot open {:?} for writing: {}", path.as_ref(), e)
    })?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(format.delimiter)
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    tracing::info!("{:?} has been created ({} rows)", path.as_ref(), rows.len());
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{LoadOutcome, SkipReason, Table, TableFormat};

    #[derive(Debug, Default, serde::Serialize, serde::Deserialize, PartialEq)]
    struct Row {
        #[serde(rename = "Name")]
        name: String,
        value: Option<u32>,
    }

    #[test]
    fn read_lines() -> Result<(), anyhow::Error> {
        let lines = super::read_lines("tests/common/lines.txt")?.collect::<Result<Vec<_>, _>>()?;

        insta::assert_yaml_snapshot!(lines, @r###"
        ---
        - first line
        - second line
        "###);

        Ok(())
    }

    #[test]
    fn header_of_row() -> Result<(), anyhow::Error> {
        assert_eq!(super::header_of::<Row>()?, vec!["Name", "value"]);
        Ok(())
    }

    #[test]
    fn write_empty_emits_header() -> Result<(), anyhow::Error> {
        let mut buf = Vec::new();
        super::write_records_to::<Row, _>(&mut buf, &TableFormat::TSV, &[])?;
        assert_eq!(String::from_utf8(buf)?, "Name\tvalue\n");
        Ok(())
    }

    #[test]
    fn write_and_read_records() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path = tmp_dir.join("rows.csv");
        let rows = vec![
            Row {
                name: String::from("a"),
                value: Some(1),
            },
            Row {
                name: String::from("b"),
                value: None,
            },
        ];
        super::write_records(&path, &TableFormat::CSV, &rows)?;

        assert_eq!(std::fs::read_to_string(&path)?, "Name,value\na,1\nb,\n");
        assert_eq!(super::read_records::<Row, _>(&path, &TableFormat::CSV)?, rows);
        Ok(())
    }

    #[test]
    fn table_skips_comments_and_marker_lines() -> Result<(), anyhow::Error> {
        let table = Table::read(
            "tests/common/commented.tsv",
            &TableFormat::TSV
                .with_comments()
                .dropping_lines_with("sequenced_samples:"),
        )?;

        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.get(&table.rows[1], "b"), Some("4"));
        assert_eq!(table.get(&table.rows[1], "c"), None);
        Ok(())
    }

    #[test]
    fn load_table_missing_file() {
        let outcome = super::load_table("tests/common/does-not-exist.tsv", &TableFormat::TSV, &[]);
        match outcome {
            LoadOutcome::Skipped(SkipReason::MissingInput(path)) => {
                assert!(path.ends_with("does-not-exist.tsv"))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn load_table_missing_columns() {
        let outcome = super::load_table("tests/common/commented.tsv", &TableFormat::TSV.with_comments(), &["a", "z"]);
        match outcome {
            LoadOutcome::Skipped(SkipReason::SchemaMismatch(err)) => {
                assert!(err.to_string().contains("z"))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn rename_columns() -> Result<(), anyhow::Error> {
        let table = Table::read("tests/common/commented.tsv", &TableFormat::TSV.with_comments())?
            .rename_columns(&[("a", "x")]);
        assert!(table.has_columns(&["x", "b"]));
        assert!(!table.has_columns(&["a"]));
        Ok(())
    }
}

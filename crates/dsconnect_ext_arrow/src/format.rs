//! Reading and writing datasets in the supported file formats.
//!
//! Decoding and encoding is delegated to the arrow and parquet crates, this
//! module only picks the codec and maps options onto it.
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use arrow::error::ArrowError;
use dsconnect_core::dataset::concat_datasets;
use dsconnect_core::{ConnectorError, Dataset, OptionMap, Result};
use flate2::read::GzDecoder;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;
use tracing::trace;

/// Number of records read for csv schema inference.
const CSV_INFER_RECORDS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Parquet,
    Feather,
    Csv,
    Tsv,
    Json,
}

impl FileFormat {
    /// Canonical tags, aliases are accepted on top of these.
    pub const SUPPORTED: &'static [&'static str] = &["parquet", "feather", "csv", "json"];

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag.to_ascii_lowercase().as_str() {
            "parquet" | "pq" | "pqt" => Self::Parquet,
            "feather" | "arrow" | "ipc" => Self::Feather,
            "csv" | "txt" => Self::Csv,
            "tsv" => Self::Tsv,
            "json" | "jsonl" | "ndjson" => Self::Json,
            _ => return None,
        })
    }

    pub fn for_read(tag: &str) -> Result<Self> {
        Self::from_tag(tag).ok_or_else(|| ConnectorError::UnsupportedFormat(tag.to_string()))
    }

    pub fn for_write(tag: &str) -> Result<Self> {
        Self::from_tag(tag).ok_or_else(|| ConnectorError::UnsupportedWriteFormat(tag.to_string()))
    }
}

/// Compression wrapped around a text format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl Compression {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "gz" | "gzip" => Some(Self::Gzip),
            _ => None,
        }
    }
}

/// Resolve the format and compression to read with.
///
/// `inner` is the extension preceding a compression extension, `tsv` for
/// `orders.tsv.gz`. Compressed input without a known inner format is read as
/// csv.
pub fn resolve_read(tag: &str, inner: Option<&str>) -> Result<(FileFormat, Compression)> {
    let Some(compression) = Compression::from_tag(tag) else {
        return Ok((FileFormat::for_read(tag)?, Compression::None));
    };

    let format = inner.and_then(FileFormat::from_tag).unwrap_or(FileFormat::Csv);
    match format {
        FileFormat::Parquet | FileFormat::Feather => Err(ConnectorError::UnsupportedFormat(
            format!("{}.{tag}", inner.unwrap_or_default()),
        )),
        _ => Ok((format, compression)),
    }
}

fn open_text(path: &Path, compression: Compression) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = match compression {
        Compression::None => Box::new(file),
        Compression::Gzip => Box::new(GzDecoder::new(file)),
    };
    Ok(reader)
}

/// Delimited text options.
///
/// - `delimiter`: single character separator, defaults to `,` (tab for tsv).
/// - `has_header`: whether the first row holds column names, defaults to true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub has_header: bool,
}

impl CsvOptions {
    pub fn try_from_options(format: FileFormat, options: &OptionMap) -> Result<Self> {
        let default_delimiter = match format {
            FileFormat::Tsv => b'\t',
            _ => b',',
        };
        let delimiter = match options.get_str("delimiter")? {
            Some(s) if s.len() == 1 => s.as_bytes()[0],
            Some(s) => {
                return Err(ConnectorError::Validation(format!(
                    "Option 'delimiter' must be a single byte character, got '{s}'"
                )));
            }
            None => default_delimiter,
        };
        let has_header = options.get_bool("has_header")?.unwrap_or(true);

        Ok(CsvOptions {
            delimiter,
            has_header,
        })
    }
}

fn parquet_err(e: ParquetError) -> ConnectorError {
    ConnectorError::External(Box::new(e))
}

pub fn read_dataset(
    path: &Path,
    format: FileFormat,
    compression: Compression,
    csv: &CsvOptions,
) -> Result<Dataset> {
    trace!(?path, ?format, ?compression, "reading dataset");

    match format {
        FileFormat::Parquet => {
            let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)
                .map_err(parquet_err)?;
            let schema = builder.schema().clone();
            let reader = builder.build().map_err(parquet_err)?;
            let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;
            concat_datasets(&schema, &batches)
        }
        FileFormat::Feather => {
            let reader = arrow::ipc::reader::FileReader::try_new(File::open(path)?, None)?;
            let schema = reader.schema();
            let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;
            concat_datasets(&schema, &batches)
        }
        // Text inputs are opened twice, once for schema inference and once
        // for decoding, since a decompressing reader can't seek.
        FileFormat::Csv | FileFormat::Tsv => {
            let (schema, _) = arrow::csv::reader::Format::default()
                .with_header(csv.has_header)
                .with_delimiter(csv.delimiter)
                .infer_schema(open_text(path, compression)?, Some(CSV_INFER_RECORDS))?;

            let schema = Arc::new(schema);
            let reader = arrow::csv::ReaderBuilder::new(schema.clone())
                .with_header(csv.has_header)
                .with_delimiter(csv.delimiter)
                .build(open_text(path, compression)?)?;
            let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;
            concat_datasets(&schema, &batches)
        }
        FileFormat::Json => {
            let (schema, _) = arrow::json::reader::infer_json_schema(
                BufReader::new(open_text(path, compression)?),
                None,
            )?;

            let schema = Arc::new(schema);
            let reader = arrow::json::ReaderBuilder::new(schema.clone())
                .build(BufReader::new(open_text(path, compression)?))?;
            let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;
            concat_datasets(&schema, &batches)
        }
    }
}

pub fn write_dataset(
    dataset: &Dataset,
    path: &Path,
    format: FileFormat,
    csv: &CsvOptions,
) -> Result<()> {
    trace!(?path, ?format, rows = dataset.num_rows(), "writing dataset");
    let file = File::create(path)?;

    match format {
        FileFormat::Parquet => {
            let mut writer =
                ArrowWriter::try_new(file, dataset.schema(), None).map_err(parquet_err)?;
            writer.write(dataset).map_err(parquet_err)?;
            writer.close().map_err(parquet_err)?;
        }
        FileFormat::Feather => {
            let mut writer = arrow::ipc::writer::FileWriter::try_new(file, &dataset.schema())?;
            writer.write(dataset)?;
            writer.finish()?;
        }
        FileFormat::Csv | FileFormat::Tsv => {
            let mut writer = arrow::csv::WriterBuilder::new()
                .with_header(csv.has_header)
                .with_delimiter(csv.delimiter)
                .build(file);
            writer.write(dataset)?;
        }
        FileFormat::Json => {
            let mut writer = arrow::json::LineDelimitedWriter::new(file);
            writer.write(dataset)?;
            writer.finish()?;
        }
    }

    Ok(())
}

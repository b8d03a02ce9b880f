//! The canonical dataset passed between handlers.
use arrow::array::ArrayRef;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::errors::{ConnectorError, Result};

/// Columnar table flowing through every handler.
///
/// Columns are reference counted so clones are cheap, and a stored dataset is
/// never edited in place.
pub type Dataset = RecordBatch;

/// Build a dataset from named columns.
///
/// Fails with a validation error if the columns don't share a row count.
pub fn try_new_dataset<I, S>(columns: I) -> Result<Dataset>
where
    I: IntoIterator<Item = (S, ArrayRef)>,
    S: AsRef<str>,
{
    RecordBatch::try_from_iter(columns)
        .map_err(|e| ConnectorError::Validation(format!("Invalid dataset: {e}")))
}

/// Concatenate batches read from a single source into one dataset.
pub fn concat_datasets(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<Dataset> {
    arrow::compute::concat_batches(schema, batches)
        .map_err(|e| ConnectorError::Validation(format!("Invalid dataset: {e}")))
}

/// Short `(rows,columns)` summary used in logs and catalog listings.
pub fn shape(dataset: &Dataset) -> (usize, usize) {
    (dataset.num_rows(), dataset.num_columns())
}

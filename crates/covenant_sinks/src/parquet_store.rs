//! Parquet-backed columnar store.
//!
//! Row batches (JSON objects) become Arrow record batches and land as
//! snappy-compressed parquet parts, one file per flush. Column layout is
//! inferred from the first row of each batch; nested values are carried
//! as JSON-encoded strings. Files are staged to a temp path and renamed
//! so readers never see a partial part.

use crate::error::{Result, StoreError};
use crate::ColumnarStore;
use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Inferred column shape for one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Text,
    Number,
    Flag,
    /// Arrays, objects, and nulls: stored as JSON text.
    Encoded,
}

pub struct ParquetStore {
    dir: PathBuf,
    part_seq: AtomicUsize,
}

impl ParquetStore {
    /// Store writing parts under `dir`, created on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            part_seq: AtomicUsize::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn build_batch(rows: &[Value]) -> Result<RecordBatch> {
        let first = rows[0]
            .as_object()
            .ok_or_else(|| StoreError::NonObjectRow(rows[0].to_string()))?;

        let columns: Vec<(String, ColumnKind)> = first
            .iter()
            .map(|(name, value)| (name.clone(), infer_kind(value)))
            .collect();

        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
        for (name, kind) in &columns {
            let (data_type, array) = build_column(rows, name, *kind);
            fields.push(Field::new(name, data_type, true));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        Ok(RecordBatch::try_new(schema, arrays)?)
    }
}

impl ColumnarStore for ParquetStore {
    fn save_batch(&self, rows: &[Value], trace_id: &str) -> Result<String> {
        if rows.is_empty() {
            return Err(StoreError::EmptyBatch);
        }
        fs::create_dir_all(&self.dir)?;

        let batch = Self::build_batch(rows)?;
        let part = self.part_seq.fetch_add(1, Ordering::SeqCst);
        let filename = format!("{}_part{}.parquet", trace_id, part);
        let final_path = self.dir.join(&filename);
        let temp_path = self.dir.join(format!(".{}.tmp", filename));

        let file = fs::File::create(&temp_path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        fs::rename(&temp_path, &final_path)?;

        debug!(
            path = %final_path.display(),
            rows = rows.len(),
            "Wrote parquet part"
        );
        Ok(file_uri(&final_path))
    }

    fn merge_parts(&self, parts: &[String], target_id: &str) -> Result<String> {
        if parts.is_empty() {
            return Err(StoreError::NoParts(target_id.to_string()));
        }
        fs::create_dir_all(&self.dir)?;

        // Metadata-level merge: the result file lists its member parts;
        // readers resolve them lazily.
        let manifest = serde_json::json!({
            "target_id": target_id,
            "parts": parts,
        });
        let filename = format!("{}_merged.json", target_id);
        let final_path = self.dir.join(&filename);
        let temp_path = self.dir.join(format!(".{}.tmp", filename));
        fs::write(&temp_path, serde_json::to_vec_pretty(&manifest)?)?;
        fs::rename(&temp_path, &final_path)?;

        info!(
            path = %final_path.display(),
            parts = parts.len(),
            "Merged spill parts"
        );
        Ok(file_uri(&final_path))
    }
}

fn infer_kind(value: &Value) -> ColumnKind {
    match value {
        Value::String(_) => ColumnKind::Text,
        Value::Number(_) => ColumnKind::Number,
        Value::Bool(_) => ColumnKind::Flag,
        _ => ColumnKind::Encoded,
    }
}

fn build_column(rows: &[Value], name: &str, kind: ColumnKind) -> (DataType, ArrayRef) {
    match kind {
        ColumnKind::Number => {
            let values: Vec<Option<f64>> = rows
                .iter()
                .map(|row| row.get(name).and_then(Value::as_f64))
                .collect();
            (DataType::Float64, Arc::new(Float64Array::from(values)))
        }
        ColumnKind::Flag => {
            let values: Vec<Option<bool>> = rows
                .iter()
                .map(|row| row.get(name).and_then(Value::as_bool))
                .collect();
            (DataType::Boolean, Arc::new(BooleanArray::from(values)))
        }
        ColumnKind::Text | ColumnKind::Encoded => {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|row| match row.get(name) {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => Some(other.to_string()),
                })
                .collect();
            (DataType::Utf8, Arc::new(StringArray::from(values)))
        }
    }
}

fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

//! Streaming `GeoJSON` reader producing Arrow record batches.
//!
//! Property types are inferred from a fixed prefix of features whose length
//! does not depend on the batch size. After that the schema is frozen:
//! integers are still accepted into float columns, but a new key or a value of
//! another type fails the read.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::builder::StringBuilder;
use arrow_array::{ArrayRef, RecordBatch};
use geoetl_core_common::error::{Result, schema_incompatible};
use geoetl_core_common::io::open_source;
use geoetl_core_common::{BatchReader, DatasetSchema, GeometryType};
use geoetl_format_shared::{ColumnBuilder, InferredType, SourcePosition, ValueMismatch};
use serde_json::Value as JsonValue;

use crate::decoder::FeatureScanner;
use crate::parser::{FeatureRecord, PropertyInference, parse_feature};

/// Default number of features sampled for type inference.
pub const DEFAULT_INFER_MAX_FEATURES: usize = 8192;

/// `GeoJSON` reader configuration.
#[derive(Debug, Clone)]
pub struct GeoJsonFormatOptions {
    /// Features per batch (default: 8192)
    pub batch_size: usize,
    /// Features read up front to infer property types (default: 8192)
    pub infer_max_features: usize,
    /// Upper bound on the size of a single feature in bytes
    pub max_feature_bytes: usize,
}

impl Default for GeoJsonFormatOptions {
    fn default() -> Self {
        Self {
            batch_size: geoetl_core_common::options::DEFAULT_BATCH_SIZE,
            infer_max_features: DEFAULT_INFER_MAX_FEATURES,
            max_feature_bytes: crate::decoder::DEFAULT_MAX_FEATURE_BYTES,
        }
    }
}

impl GeoJsonFormatOptions {
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_infer_max_features(mut self, infer_max_features: usize) -> Self {
        self.infer_max_features = infer_max_features.max(1);
        self
    }

    #[must_use]
    pub fn with_max_feature_bytes(mut self, max: usize) -> Self {
        self.max_feature_bytes = max;
        self
    }
}

/// What the inference prefix revealed about the file.
#[derive(Debug, Clone, Default)]
pub struct PrefixSummary {
    /// Features in the prefix
    pub features: u64,
    /// `true` if the prefix held every feature
    pub reached_eof: bool,
    /// Geometry types seen in the prefix
    pub geometry_types: BTreeSet<GeometryType>,
}

struct PropertyColumn {
    name: String,
    kind: InferredType,
    builder: ColumnBuilder,
}

impl PropertyColumn {
    fn append(&mut self, value: Option<&JsonValue>) -> std::result::Result<(), ValueMismatch> {
        let Some(value) = value else {
            self.builder.append_null();
            return Ok(());
        };
        match (self.kind, value) {
            (_, JsonValue::Null) => {
                self.builder.append_null();
                Ok(())
            },
            (InferredType::Json, JsonValue::Array(_) | JsonValue::Object(_)) => {
                self.builder.append_str(&value.to_string())
            },
            (InferredType::Json, _) | (_, JsonValue::Array(_) | JsonValue::Object(_)) => {
                Err(ValueMismatch {
                    expected: self.builder.data_type(),
                })
            },
            (_, JsonValue::Bool(b)) => self.builder.append_bool(*b),
            (_, JsonValue::Number(n)) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => self.builder.append_i64(i),
                (None, Some(f)) => self.builder.append_f64(f),
                (None, None) => Err(ValueMismatch {
                    expected: self.builder.data_type(),
                }),
            },
            (_, JsonValue::String(s)) => self.builder.append_str(s),
        }
    }
}

/// Lazily reads the features of a `GeoJSON` file in batches.
pub struct GeoJsonReader {
    path: PathBuf,
    scanner: FeatureScanner<BufReader<File>>,
    schema: DatasetSchema,
    columns: Vec<PropertyColumn>,
    column_index: HashMap<String, usize>,
    geometry: StringBuilder,
    pending: VecDeque<FeatureRecord>,
    prefix: PrefixSummary,
    batch_size: usize,
    rows: u64,
    done: bool,
}

impl GeoJsonReader {
    /// Opens the file and infers the schema from the first
    /// `infer_max_features` features.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened, the document is malformed, or the
    /// prefix has conflicting property types.
    pub fn try_new(path: &Path, options: &GeoJsonFormatOptions) -> Result<Self> {
        let file = open_source(path, "GeoJSON")?;
        let mut scanner = FeatureScanner::new(BufReader::new(file))
            .with_path(path)
            .with_max_feature_bytes(options.max_feature_bytes);
        let batch_size = options.batch_size.max(1);
        let sample = options.infer_max_features.max(1);

        let mut inference = PropertyInference::default();
        let mut pending = VecDeque::with_capacity(sample.min(batch_size));
        let mut geometry_types = BTreeSet::new();
        while pending.len() < sample {
            let Some(raw) = scanner.next_feature()? else {
                break;
            };
            let row = pending.len() as u64 + 1;
            let record = parse_feature(&raw.bytes, row, &SourcePosition::byte(raw.offset))?;
            inference.observe(&record.properties, row)?;
            geometry_types.extend(record.geometry_type);
            pending.push_back(record);
        }
        let prefix = PrefixSummary {
            features: pending.len() as u64,
            reached_eof: scanner.is_exhausted()?,
            geometry_types,
        };

        let kinds: Vec<InferredType> = inference.properties().map(|(_, kind)| kind).collect();
        let schema = inference.into_schema()?;
        let columns = schema
            .arrow_schema()
            .fields()
            .iter()
            .zip(kinds)
            .map(|(field, kind)| {
                ColumnBuilder::new(field.data_type(), batch_size)
                    .map(|builder| PropertyColumn {
                        name: field.name().clone(),
                        kind,
                        builder,
                    })
                    .ok_or_else(|| {
                        schema_incompatible(
                            "GeoJSON",
                            format!("unsupported property type {}", field.data_type()),
                        )
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        log::debug!(
            "Inferred GeoJSON schema for {} from {} feature(s): {} propert(ies)",
            path.display(),
            prefix.features,
            columns.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            scanner,
            schema,
            columns,
            column_index,
            geometry: StringBuilder::with_capacity(batch_size, batch_size * 64),
            pending,
            prefix,
            batch_size,
            rows: 0,
            done: false,
        })
    }

    /// Summary of the inference prefix, used by the info operation.
    #[must_use]
    pub fn prefix(&self) -> &PrefixSummary {
        &self.prefix
    }

    fn append(&mut self, record: &FeatureRecord) -> Result<()> {
        let row = self.rows;
        if let Some(key) = record
            .properties
            .keys()
            .find(|key| !self.column_index.contains_key(key.as_str()))
        {
            return Err(schema_incompatible(
                "GeoJSON",
                format!(
                    "property '{key}' in feature {row} does not appear in the first {} feature(s) used to infer the schema",
                    self.prefix.features
                ),
            ));
        }
        for column in &mut self.columns {
            let value = record.properties.get(&column.name);
            column.append(value).map_err(|_| {
                schema_incompatible(
                    "GeoJSON",
                    format!(
                        "property '{}' in feature {row} is {}, expected {}",
                        column.name,
                        value.map_or("missing", crate::parser::describe_value),
                        match column.kind {
                            // all-null columns were typed as strings
                            InferredType::Null => InferredType::Utf8.as_str(),
                            kind => kind.as_str(),
                        }
                    ),
                )
            })?;
        }
        match &record.geometry {
            Some(text) => self.geometry.append_value(text),
            None => self.geometry.append_null(),
        }
        Ok(())
    }

    fn read_batch(&mut self) -> Result<Option<RecordBatch>> {
        let mut count = 0;
        while count < self.batch_size {
            let record = match self.pending.pop_front() {
                Some(record) => record,
                None => {
                    let Some(raw) = self.scanner.next_feature()? else {
                        break;
                    };
                    parse_feature(&raw.bytes, self.rows + 1, &SourcePosition::byte(raw.offset))?
                },
            };
            self.rows += 1;
            count += 1;
            self.append(&record)?;
        }
        if count == 0 {
            return Ok(None);
        }

        let mut arrays: Vec<ArrayRef> = self.columns.iter_mut().map(|c| c.builder.finish()).collect();
        arrays.push(Arc::new(self.geometry.finish()));
        let batch = RecordBatch::try_new(self.schema.arrow_schema().clone(), arrays)
            .map_err(|e| schema_incompatible("GeoJSON", e.to_string()))?;
        log::debug!(
            "Read GeoJSON batch of {count} feature(s) from {}",
            self.path.display()
        );
        Ok(Some(batch))
    }
}

impl Iterator for GeoJsonReader {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.done = true;
                log::debug!("Finished reading {} GeoJSON feature(s)", self.rows);
                None
            },
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}

impl BatchReader for GeoJsonReader {
    fn schema(&self) -> &DatasetSchema {
        &self.schema
    }
}

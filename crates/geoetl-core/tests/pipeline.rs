//! Pipeline behavior across driver pairs: ordering, failures and stages.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use arrow_array::cast::AsArray;
use arrow_array::types::Int64Type;
use arrow_array::{ArrayRef, BinaryArray, Int64Array, RecordBatch};
use arrow_schema::{Field, Schema};
use geoetl_core::error::{ErrorKind, PipelineStage};
use geoetl_core::init::default_registry;
use geoetl_core::operations::convert;
use geoetl_core::pipeline::{ConversionRequest, Pipeline, PipelineState};
use geoetl_core::{DriverOptions, DriverRegistry, GeometryFormat};
use geoetl_core_common::geometry::decode_value;
use geoetl_core_common::schema::geometry_field;
use geoetl_core_common::{DatasetSchema, FormatFactory, Geometry, Result};
use geoetl_geoparquet::GeoParquetFormatFactory;
use tempfile::TempDir;

const DRIVERS: [(&str, &str); 3] = [
    ("GeoJSON", "geojson"),
    ("CSV", "csv"),
    ("GeoParquet", "parquet"),
];

fn options() -> DriverOptions {
    DriverOptions::default()
        .with_geometry_column("geometry")
        .with_batch_size(16)
}

fn write_source(dir: &Path, rows: usize) -> PathBuf {
    let features: Vec<String> = (0..rows)
        .map(|i| {
            format!(
                r#"{{"type":"Feature","properties":{{"id":{i}}},"geometry":{{"type":"Point","coordinates":[{x},{y}]}}}}"#,
                x = i as f64 * 1.1,
                y = i as f64 / 3.0 - 5.0
            )
        })
        .collect();
    let path = dir.join("source.geojson");
    fs::write(
        &path,
        format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        ),
    )
    .unwrap();
    path
}

fn read_back(registry: &DriverRegistry, path: &Path, driver: &str) -> Result<Vec<(i64, Geometry)>> {
    let reader = registry.resolve(driver)?.open_reader(path, &options())?;
    let schema = reader.schema().clone();
    let geometry = schema.primary_geometry().unwrap().clone();
    let id = schema.arrow_schema().index_of("id").unwrap();
    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        let ids = batch.column(id).as_primitive::<Int64Type>();
        for row in 0..batch.num_rows() {
            let value = decode_value(batch.column(geometry.index), row, geometry.format)
                .unwrap()
                .unwrap();
            rows.push((ids.value(row), value));
        }
    }
    Ok(rows)
}

#[test]
fn test_order_preserved_for_every_driver_pair() {
    let dir = TempDir::new().unwrap();
    let registry = default_registry().unwrap();
    let source = write_source(dir.path(), 50);
    let expected = read_back(&registry, &source, "GeoJSON").unwrap();
    assert_eq!(expected.len(), 50);

    for (from, from_ext) in DRIVERS {
        let input = dir.path().join(format!("input.{from_ext}"));
        convert(&registry, &source, &input, "GeoJSON", from, &options()).unwrap();
        for (to, to_ext) in DRIVERS {
            let output = dir.path().join(format!("{from_ext}_to.{to_ext}"));
            let summary = convert(&registry, &input, &output, from, to, &options()).unwrap();
            assert_eq!(summary.rows, 50, "{from} -> {to}");
            let actual = read_back(&registry, &output, to).unwrap();
            assert_eq!(actual, expected, "{from} -> {to}");
        }
    }
}

#[test]
fn test_missing_geometry_column_fails_before_reading() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.geojson");
    let registry = default_registry().unwrap();

    let mut pipeline = Pipeline::new(
        &registry,
        ConversionRequest::new(
            dir.path().join("missing.csv"),
            &output,
            "CSV",
            "GeoJSON",
        ),
    );
    let err = pipeline.run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredOption);
    assert_eq!(err.stage(), Some(PipelineStage::OpenInput));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert!(!output.exists());
}

#[test]
fn test_driver_names_are_case_sensitive() {
    let dir = TempDir::new().unwrap();
    let registry = default_registry().unwrap();
    let source = write_source(dir.path(), 2);

    let err = convert(
        &registry,
        &source,
        &dir.path().join("out.csv"),
        "geojson",
        "CSV",
        &options(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DriverNotFound);
    let message = err.to_string();
    assert!(message.contains("'geojson' not found"), "{message}");
    assert!(message.contains("did you mean 'GeoJSON'"), "{message}");
}

#[test]
fn test_completed_state() {
    let dir = TempDir::new().unwrap();
    let registry = default_registry().unwrap();
    let source = write_source(dir.path(), 3);
    let mut pipeline = Pipeline::new(
        &registry,
        ConversionRequest::new(&source, dir.path().join("out.parquet"), "GeoJSON", "GeoParquet")
            .with_options(options()),
    );
    let summary = pipeline.run().unwrap();
    assert_eq!(summary.rows, 3);
    assert_eq!(pipeline.state(), PipelineState::Completed);
}

#[test]
fn test_bad_geometry_fails_while_streaming() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("points.csv");
    let mut text = String::from("id,geometry\n");
    for i in 1..=1001 {
        text.push_str(&format!("{i},POINT({i} {i})\n"));
    }
    text.push_str("1002,POINT(oops)\n");
    fs::write(&input, text).unwrap();
    let registry = default_registry().unwrap();

    let err = convert(
        &registry,
        &input,
        &dir.path().join("out.geojson"),
        "CSV",
        "GeoJSON",
        &DriverOptions::default().with_geometry_column("geometry"),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryDecode);
    assert_eq!(err.stage(), Some(PipelineStage::Stream));
    let message = err.user_message();
    assert!(message.starts_with("Failed during 'stream'"), "{message}");
    assert!(message.contains("1002"), "{message}");
}

#[test]
fn test_too_many_geometry_columns_fails_resolving_schema() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("two.parquet");
    let output = dir.path().join("two.geojson");
    let point = Geometry::from_wkt("POINT(1 2)").unwrap().to_wkb().unwrap();
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", arrow_schema::DataType::Int64, false),
        geometry_field("a", GeometryFormat::Wkb, true),
        geometry_field("b", GeometryFormat::Wkb, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![1])),
        Arc::new(BinaryArray::from_iter_values([point.as_slice()])),
        Arc::new(BinaryArray::from_iter_values([point.as_slice()])),
    ];
    let batch = RecordBatch::try_new(Arc::clone(&schema), columns).unwrap();
    let mut writer = GeoParquetFormatFactory::default()
        .create_writer(
            &input,
            &DatasetSchema::try_new(schema).unwrap(),
            &DriverOptions::default(),
        )
        .unwrap();
    writer.write_batch(&batch).unwrap();
    writer.finish().unwrap();

    let registry = default_registry().unwrap();
    let err = convert(
        &registry,
        &input,
        &output,
        "GeoParquet",
        "GeoJSON",
        &DriverOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaIncompatible);
    assert_eq!(err.stage(), Some(PipelineStage::ResolveSchema));
    assert!(!output.exists());
}

#[test]
fn test_parallel_conversions_share_registry() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(default_registry().unwrap());
    let source = write_source(dir.path(), 40);

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let registry = Arc::clone(&registry);
            let source = source.clone();
            let output = dir.path().join(format!("parallel-{n}.parquet"));
            thread::spawn(move || {
                convert(&registry, &source, &output, "GeoJSON", "GeoParquet", &options())
                    .map(|summary| (output, summary.rows))
            })
        })
        .collect();

    for handle in handles {
        let (output, rows) = handle.join().unwrap().unwrap();
        assert_eq!(rows, 40);
        assert_eq!(read_back(&registry, &output, "GeoParquet").unwrap().len(), 40);
    }
}

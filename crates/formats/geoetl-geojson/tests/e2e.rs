//! Integration tests for reading `GeoJSON` through the driver factory

use std::fs;
use std::path::PathBuf;

use arrow_array::cast::AsArray;
use arrow_array::types::{Float64Type, Int64Type};
use arrow_array::{Array, RecordBatch};
use arrow_cast::display::array_value_to_string;
use arrow_schema::DataType;
use geoetl_core_common::error::{ErrorKind, FormatError, GeometryErrorKind};
use geoetl_core_common::schema::is_json_field;
use geoetl_core_common::{
    DriverOptions, FormatFactory, GeoEtlError, GeometryFormat, GeometryType, Result,
};
use geoetl_geojson::{GEOMETRY_COLUMN, GeoJsonFormatFactory, GeoJsonFormatOptions};
use serde_json::{Value as JsonValue, json};
use tempfile::TempDir;

const CITIES: &str = r#"{
  "type": "FeatureCollection",
  "name": "cities",
  "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:OGC:1.3:CRS84"}},
  "features": [
    {"type": "Feature", "id": 1, "properties": {"name": "Vatican City", "pop": 832, "area": 0.49, "tags": ["holy", "see"]},
     "geometry": {"type": "Point", "coordinates": [12.4533865, 41.9032822]}},
    {"type": "Feature", "id": 2, "properties": {"name": "San Marino", "pop": 29000, "area": 61, "tags": null},
     "geometry": {"type": "Point", "coordinates": [12.4417702, 43.9360958]}},
    {"type": "Feature", "id": 3, "properties": {"name": "Vaduz", "pop": null, "area": 17.3},
     "geometry": {"type": "Point", "coordinates": [9.5166695, 47.1337238]}},
    {"type": "Feature", "id": 4, "properties": {"name": "Monaco", "pop": 38300, "area": 2.02, "tags": {"coast": true}},
     "geometry": null}
  ]
}"#;

fn write_geojson(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn read_all(path: &PathBuf, options: &DriverOptions) -> Result<Vec<RecordBatch>> {
    GeoJsonFormatFactory::default()
        .open_reader(path, options)?
        .collect()
}

#[test]
fn test_read_cities() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(&dir, "cities.geojson", CITIES);

    let reader = GeoJsonFormatFactory::default()
        .open_reader(&path, &DriverOptions::default())
        .unwrap();
    let schema = reader.schema().clone();
    let batches: Vec<RecordBatch> = reader.collect::<Result<_>>().unwrap();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 4);

    let fields: Vec<_> = schema
        .arrow_schema()
        .fields()
        .iter()
        .map(|f| (f.name().clone(), f.data_type().clone()))
        .collect();
    assert_eq!(fields[0], ("name".to_string(), DataType::Utf8));
    assert_eq!(fields[1], ("pop".to_string(), DataType::Int64));
    assert_eq!(fields[2], ("area".to_string(), DataType::Float64));
    assert!(is_json_field(schema.arrow_schema().field(3)));
    assert_eq!(fields[4].0, GEOMETRY_COLUMN);

    let geometry = schema.primary_geometry().unwrap();
    assert_eq!(geometry.index, 4);
    assert_eq!(geometry.format, GeometryFormat::GeoJson);

    let pop = batch.column(1).as_primitive::<Int64Type>();
    assert!(pop.is_null(2));
    let area = batch.column(2).as_primitive::<Float64Type>();
    assert!((area.value(1) - 61.0).abs() < f64::EPSILON);

    let tags = batch.column(3).as_string::<i32>();
    let first: JsonValue = serde_json::from_str(tags.value(0)).unwrap();
    assert_eq!(first, json!(["holy", "see"]));
    assert!(tags.is_null(1));
    assert!(tags.is_null(2));

    let geometries = batch.column(4).as_string::<i32>();
    let point: JsonValue = serde_json::from_str(geometries.value(0)).unwrap();
    assert_eq!(point["type"], "Point");
    assert_eq!(point["coordinates"], json!([12.4533865, 41.9032822]));
    assert!(geometries.is_null(3));
}

#[test]
fn test_batches_preserve_order() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(&dir, "cities.geojson", CITIES);
    let batches = read_all(&path, &DriverOptions::default().with_batch_size(3)).unwrap();
    assert_eq!(
        batches.iter().map(RecordBatch::num_rows).collect::<Vec<_>>(),
        vec![3, 1]
    );
    let names: Vec<String> = batches
        .iter()
        .flat_map(|b| {
            let names = b.column(0).as_string::<i32>();
            (0..names.len())
                .map(|i| names.value(i).to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(names, vec!["Vatican City", "San Marino", "Vaduz", "Monaco"]);
}

#[test]
fn test_info_reports_types_and_count() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(&dir, "cities.geojson", CITIES);
    let summary = GeoJsonFormatFactory::default()
        .info(&path, &DriverOptions::default())
        .unwrap();
    let count = summary.feature_count.unwrap();
    assert_eq!(count.count, 4);
    assert!(count.exact);
    assert_eq!(
        summary.geometry_types[GEOMETRY_COLUMN].iter().copied().collect::<Vec<_>>(),
        vec![GeometryType::Point]
    );
}

#[test]
fn test_single_feature_document() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(
        &dir,
        "single.geojson",
        r#"{"type":"Feature","properties":{"k":"v"},"geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]}}"#,
    );
    let batches = read_all(&path, &DriverOptions::default()).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].num_rows(), 1);
    assert_eq!(batches[0].column(0).as_string::<i32>().value(0), "v");
}

#[test]
fn test_empty_collection() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(&dir, "empty.geojson", r#"{"type":"FeatureCollection","features":[]}"#);
    let reader = GeoJsonFormatFactory::default()
        .open_reader(&path, &DriverOptions::default())
        .unwrap();
    assert_eq!(reader.schema().arrow_schema().fields().len(), 1);
    assert_eq!(reader.count(), 0);
}

#[test]
fn test_conflict_within_first_batch() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(
        &dir,
        "conflict.geojson",
        r#"{"type":"FeatureCollection","features":[
{"type":"Feature","properties":{"v":"a"},"geometry":null},
{"type":"Feature","properties":{"v":true},"geometry":null}
]}"#,
    );
    let err = read_all(&path, &DriverOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaIncompatible);
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("feature 2"), "{err}");
}

/// Every cell of every batch as display text, `None` for nulls.
fn rows(batches: &[RecordBatch]) -> Vec<Vec<Option<String>>> {
    batches
        .iter()
        .flat_map(|batch| {
            (0..batch.num_rows()).map(move |row| {
                batch
                    .columns()
                    .iter()
                    .map(|column| {
                        (!column.is_null(row))
                            .then(|| array_value_to_string(column.as_ref(), row).unwrap())
                    })
                    .collect()
            })
        })
        .collect()
}

fn sampling(features: usize) -> GeoJsonFormatFactory {
    GeoJsonFormatFactory::new(GeoJsonFormatOptions::default().with_infer_max_features(features))
}

#[test]
fn test_batch_size_does_not_change_rows_or_schema() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(
        &dir,
        "widen.geojson",
        r#"{"type":"FeatureCollection","features":[
{"type":"Feature","properties":{"v":1,"a":"x"},"geometry":{"type":"Point","coordinates":[0,0]}},
{"type":"Feature","properties":{"v":2.5,"a":"y","b":true},"geometry":null},
{"type":"Feature","properties":{"v":3,"a":null,"b":false},"geometry":{"type":"Point","coordinates":[1,1]}}
]}"#,
    );

    let read = |batch_size: Option<usize>| {
        let mut options = DriverOptions::default();
        if let Some(size) = batch_size {
            options = options.with_batch_size(size);
        }
        let reader = GeoJsonFormatFactory::default()
            .open_reader(&path, &options)
            .unwrap();
        let schema = reader.schema().arrow_schema().clone();
        let batches: Vec<RecordBatch> = reader.collect::<Result<_>>().unwrap();
        (schema, rows(&batches))
    };

    let (schema, expected) = read(None);
    assert_eq!(schema.field(0).data_type(), &DataType::Float64);
    assert_eq!(schema.field(2).name(), "b");
    assert_eq!(expected.len(), 3);
    assert_eq!(expected[1][0].as_deref(), Some("2.5"));
    assert_eq!(expected[0][2], None);
    for size in [1, 2] {
        let (actual_schema, actual) = read(Some(size));
        assert_eq!(actual_schema, schema, "batch size {size}");
        assert_eq!(actual, expected, "batch size {size}");
    }
}

#[test]
fn test_conflict_after_schema_is_frozen() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(
        &dir,
        "late.geojson",
        r#"{"type":"FeatureCollection","features":[
{"type":"Feature","properties":{"v":1.5},"geometry":null},
{"type":"Feature","properties":{"v":2},"geometry":null},
{"type":"Feature","properties":{"v":"three"},"geometry":null}
]}"#,
    );
    let options = DriverOptions::default().with_batch_size(1);
    let mut reader = sampling(1).open_reader(&path, &options).unwrap();
    assert_eq!(reader.next().unwrap().unwrap().num_rows(), 1);
    // integers still fit the float column
    let second = reader.next().unwrap().unwrap();
    let v = second.column(0).as_primitive::<Float64Type>();
    assert!((v.value(0) - 2.0).abs() < f64::EPSILON);
    let err = reader.next().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaIncompatible);
    assert!(err.to_string().contains("property 'v' in feature 3"), "{err}");
    assert!(reader.next().is_none());
}

#[test]
fn test_new_property_after_schema_is_frozen() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(
        &dir,
        "late-key.geojson",
        r#"{"type":"FeatureCollection","features":[
{"type":"Feature","properties":{"a":1},"geometry":null},
{"type":"Feature","properties":{"a":2,"b":3},"geometry":null}
]}"#,
    );
    let err = sampling(1)
        .open_reader(&path, &DriverOptions::default())
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaIncompatible);
    assert!(err.to_string().contains("'b'"), "{err}");

    // the default sample covers both features
    let batches = read_all(&path, &DriverOptions::default().with_batch_size(1)).unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].schema().field(1).name(), "b");
}

#[test]
fn test_invalid_geometry() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(
        &dir,
        "bad.geojson",
        r#"{"type":"FeatureCollection","features":[
{"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[1,2]}},
{"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":"nope"}}
]}"#,
    );
    let err = read_all(&path, &DriverOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryDecode);
    let GeoEtlError::Format(FormatError::InvalidGeometry { row, source, .. }) = err.root() else {
        panic!("expected an invalid geometry error, got {err:?}");
    };
    assert_eq!(*row, 2);
    assert_eq!(source.decode_kind(), Some(GeometryErrorKind::InvalidStructure));
}

#[test]
fn test_malformed_document() {
    let dir = TempDir::new().unwrap();
    let path = write_geojson(
        &dir,
        "broken.geojson",
        r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{}"#,
    );
    let err = read_all(&path, &DriverOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    assert!(err.to_string().starts_with("Failed to parse GeoJSON"), "{err}");
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = read_all(&dir.path().join("nope.geojson"), &DriverOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceNotFound);
}

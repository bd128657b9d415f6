//! Integration tests for the `GeoParquet` driver

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::{Float64Type, Int32Type};
use arrow_array::{
    Array, ArrayRef, BinaryArray, Float64Array, Int32Array, LargeBinaryArray, RecordBatch,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use geoetl_core_common::error::ErrorKind;
use geoetl_core_common::schema::{CRS_KEY, geometry_field};
use geoetl_core_common::{
    DatasetSchema, DriverOptions, FormatFactory, Geometry, GeometryFormat, GeometryType, Result,
};
use geoetl_geoparquet::{GEO_METADATA_KEY, GeoParquetFormatFactory, GeoParquetMetadata};
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::reader::{FileReader, SerializedFileReader};
use tempfile::TempDir;

fn wkb(wkt: &str) -> Vec<u8> {
    Geometry::from_wkt(wkt).unwrap().to_wkb().unwrap()
}

fn parks() -> RecordBatch {
    let geometry = geometry_field("geometry", GeometryFormat::Wkb, true);
    let mut metadata = geometry.metadata().clone();
    metadata.insert(
        CRS_KEY.to_string(),
        r#"{"id":{"authority":"OGC","code":"CRS84"}}"#.to_string(),
    );
    let geometry = geometry.with_metadata(metadata);
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("area", DataType::Float64, true),
        geometry,
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from(vec![1, 2, 3])),
        Arc::new(StringArray::from(vec![Some("Golden Gate"), None, Some("Presidio")])),
        Arc::new(Float64Array::from(vec![Some(4.12), Some(0.1 + 0.2), None])),
        Arc::new(BinaryArray::from_iter(vec![
            Some(wkb("POLYGON((0 0,4 0,4 4,0 4,0 0))")),
            Some(wkb("POINT(-1 7)")),
            None,
        ])),
    ];
    RecordBatch::try_new(schema, columns).unwrap()
}

fn write(path: &Path, batches: &[RecordBatch]) -> Result<()> {
    let schema = DatasetSchema::try_new(batches[0].schema())?;
    let mut writer =
        GeoParquetFormatFactory::default().create_writer(path, &schema, &DriverOptions::default())?;
    for batch in batches {
        writer.write_batch(batch)?;
    }
    writer.finish().map(|_| ())
}

fn read_all(path: &Path, batch_size: usize) -> Result<Vec<RecordBatch>> {
    GeoParquetFormatFactory::default()
        .open_reader(path, &DriverOptions::default().with_batch_size(batch_size))?
        .collect()
}

#[test]
fn test_write_then_read_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("parks.parquet");
    let batch = parks();
    write(&path, &[batch.clone(), batch]).unwrap();

    let batches = read_all(&path, 4).unwrap();
    assert_eq!(
        batches.iter().map(RecordBatch::num_rows).collect::<Vec<_>>(),
        vec![4, 2]
    );
    let first = &batches[0];
    assert_eq!(first.schema().field(0).data_type(), &DataType::Int32);
    assert_eq!(first.column(0).as_primitive::<Int32Type>().value(3), 1);
    assert!(first.column(1).is_null(1));
    let area = first.column(2).as_primitive::<Float64Type>();
    assert_eq!(area.value(1).to_bits(), (0.1_f64 + 0.2).to_bits());

    let geometry = first.column(3).as_binary::<i32>();
    assert_eq!(
        Geometry::from_wkb(geometry.value(1)).unwrap(),
        Geometry::from_wkt("POINT(-1 7)").unwrap()
    );
    assert!(geometry.is_null(2));

    let reader = GeoParquetFormatFactory::default()
        .open_reader(&path, &DriverOptions::default())
        .unwrap();
    let column = reader.schema().primary_geometry().unwrap().clone();
    assert_eq!(column.name, "geometry");
    assert_eq!(column.format, GeometryFormat::Wkb);
    assert_eq!(
        column.crs.as_deref(),
        Some(r#"{"id":{"authority":"OGC","code":"CRS84"}}"#)
    );
}

#[test]
fn test_geo_metadata_written() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("parks.parquet");
    write(&path, &[parks()]).unwrap();

    let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
    let geo = reader
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|kv| kv.iter().find(|e| e.key == GEO_METADATA_KEY).cloned())
        .and_then(|e| e.value)
        .unwrap();
    let geo = GeoParquetMetadata::parse(&geo).unwrap();
    assert_eq!(geo.version, "1.1.0");
    assert_eq!(geo.primary_column, "geometry");
    let column = &geo.columns["geometry"];
    assert_eq!(column.encoding, "WKB");
    assert_eq!(column.geometry_types, vec!["Point", "Polygon"]);
    assert_eq!(column.bbox, Some(vec![-1.0, 0.0, 4.0, 7.0]));
    assert_eq!(reader.metadata().num_row_groups(), 1);
}

#[test]
fn test_info_reads_footer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("parks.parquet");
    write(&path, &[parks(), parks(), parks()]).unwrap();

    let summary = GeoParquetFormatFactory::default()
        .info(&path, &DriverOptions::default())
        .unwrap();
    let count = summary.feature_count.unwrap();
    assert_eq!(count.count, 9);
    assert!(count.exact);
    assert_eq!(
        summary.geometry_types["geometry"].iter().copied().collect::<Vec<_>>(),
        vec![GeometryType::Point, GeometryType::Polygon]
    );
    assert_eq!(summary.schema.arrow_schema().fields().len(), 4);
}

#[test]
fn test_plain_parquet_reads_as_table() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.parquet");
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("blob", DataType::LargeBinary, true),
    ]));
    let batch = RecordBatch::try_new(
        Arc::clone(&schema),
        vec![
            Arc::new(Int32Array::from(vec![7])),
            Arc::new(LargeBinaryArray::from_iter_values([b"raw".as_slice()])),
        ],
    )
    .unwrap();
    let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let reader = GeoParquetFormatFactory::default()
        .open_reader(&path, &DriverOptions::default())
        .unwrap();
    assert!(reader.schema().geometry_columns().is_empty());
    let batches: Vec<RecordBatch> = reader.collect::<Result<_>>().unwrap();
    assert_eq!(batches[0].column(1).data_type(), &DataType::LargeBinary);
}

#[test]
fn test_large_binary_geometry_is_cast() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.parquet");
    let schema = Arc::new(Schema::new(vec![Field::new("geom", DataType::LargeBinary, true)]));
    let batch = RecordBatch::try_new(
        Arc::clone(&schema),
        vec![Arc::new(LargeBinaryArray::from_iter_values([wkb("POINT(3 4)")]))],
    )
    .unwrap();
    let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
    writer.append_key_value_metadata(KeyValue::new(
        GEO_METADATA_KEY.to_string(),
        r#"{"version":"1.0.0","primary_column":"geom","columns":{"geom":{"encoding":"WKB","geometry_types":["Point"]}}}"#.to_string(),
    ));
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let batches = read_all(&path, 10).unwrap();
    let geometry = batches[0].column(0);
    assert_eq!(geometry.data_type(), &DataType::Binary);
    assert_eq!(
        Geometry::from_wkb(geometry.as_binary::<i32>().value(0)).unwrap(),
        Geometry::from_wkt("POINT(3 4)").unwrap()
    );
}

#[test]
fn test_non_wkb_encoding_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("native.parquet");
    let schema = Arc::new(Schema::new(vec![Field::new("geom", DataType::Binary, true)]));
    let batch = RecordBatch::try_new(
        Arc::clone(&schema),
        vec![Arc::new(BinaryArray::from_iter_values([wkb("POINT(0 0)")]))],
    )
    .unwrap();
    let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
    writer.append_key_value_metadata(KeyValue::new(
        GEO_METADATA_KEY.to_string(),
        r#"{"version":"1.1.0","primary_column":"geom","columns":{"geom":{"encoding":"point","geometry_types":[]}}}"#.to_string(),
    ));
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let err = read_all(&path, 10).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaIncompatible);
}

#[test]
fn test_failed_write_keeps_previous_output() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("parks.parquet");
    fs::write(&path, b"previous contents").unwrap();

    let good = parks();
    let bad = RecordBatch::try_new(
        good.schema(),
        vec![
            Arc::new(Int32Array::from(vec![9])),
            Arc::new(StringArray::from(vec!["broken"])),
            Arc::new(Float64Array::from(vec![1.0])),
            Arc::new(BinaryArray::from_iter_values([[0u8, 0, 0, 0, 1].as_slice()])),
        ],
    )
    .unwrap();

    let err = write(&path, &[good, bad]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometryDecode);
    assert_eq!(fs::read(&path).unwrap(), b"previous contents");
    let leftovers = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn test_not_parquet() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fake.parquet");
    fs::write(&path, b"not a parquet file").unwrap();
    let err = GeoParquetFormatFactory::default()
        .info(&path, &DriverOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
}

//! Display utilities for formatting CLI output.
//!
//! This module provides table row structures and formatting functions
//! for presenting geospatial data information in a human-readable format.

use std::fmt::Write as _;

use geoetl_core::Driver;
use geoetl_core::types::DatasetInfo;
use tabled::{Table, Tabled};

/// Table row representation for displaying geometry column information.
#[derive(Tabled)]
pub struct GeometryRow {
    #[tabled(rename = "Column")]
    pub name: String,
    /// Raw encoding of the values (WKT, WKB, GeoJSON).
    #[tabled(rename = "Encoding")]
    pub encoding: String,
    #[tabled(rename = "Geometry Type")]
    pub geometry_type: String,
    /// Coordinate Reference System information.
    #[tabled(rename = "CRS")]
    pub crs: String,
}

/// Table row representation for displaying field/column information.
#[derive(Tabled)]
pub struct FieldRow {
    #[tabled(rename = "Field")]
    pub name: String,
    #[tabled(rename = "Type")]
    pub data_type: String,
    #[tabled(rename = "Nullable")]
    pub nullable: String,
}

/// Table row representation for displaying driver information.
#[derive(Tabled)]
pub struct DriverRow {
    /// Short identifier for the driver (e.g., `GeoJSON`, `CSV`).
    #[tabled(rename = "Short Name")]
    pub short_name: String,
    #[tabled(rename = "Long Name")]
    pub long_name: String,
    #[tabled(rename = "Info")]
    pub info: String,
    #[tabled(rename = "Read")]
    pub read: String,
    #[tabled(rename = "Write")]
    pub write: String,
}

/// Renders dataset metadata, geometry columns and the field schema.
pub fn render_dataset_info(info: &DatasetInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nDataset: {}", info.dataset);
    let _ = writeln!(out, "Driver: {} ({})", info.driver, info.driver_long_name);
    let _ = writeln!(out, "Features: {}", info.feature_count_label());

    if !info.geometry_columns.is_empty() {
        let _ = writeln!(out, "\n=== Geometry Columns ===");
        let rows: Vec<GeometryRow> = info
            .geometry_columns
            .iter()
            .map(|g| GeometryRow {
                name: g.name.clone(),
                encoding: g.encoding.clone(),
                geometry_type: g.geometry_type_label(),
                crs: g.crs.clone().unwrap_or_else(|| "N/A".to_string()),
            })
            .collect();
        let _ = writeln!(out, "{}", Table::new(rows));
    }

    if !info.fields.is_empty() {
        let _ = writeln!(out, "\n=== Fields ===");
        let rows: Vec<FieldRow> = info
            .fields
            .iter()
            .map(|f| FieldRow {
                name: f.name.clone(),
                data_type: f.data_type.clone(),
                nullable: if f.nullable { "Yes" } else { "No" }.to_string(),
            })
            .collect();
        let _ = writeln!(out, "{}", Table::new(rows));
    }
    out
}

/// Display dataset information in formatted tables on standard output.
pub fn display_dataset_info(info: &DatasetInfo) {
    print!("{}", render_dataset_info(info));
}

/// Renders the driver table with its header line.
pub fn render_drivers(drivers: &[Driver]) -> String {
    let rows: Vec<DriverRow> = drivers
        .iter()
        .map(|d| DriverRow {
            short_name: d.short_name.to_string(),
            long_name: d.long_name.to_string(),
            info: d.capabilities.info.as_str().to_string(),
            read: d.capabilities.read.as_str().to_string(),
            write: d.capabilities.write.as_str().to_string(),
        })
        .collect();
    format!(
        "\nAvailable Drivers ({} total):\n\n{}\n",
        drivers.len(),
        Table::new(rows)
    )
}

pub fn display_drivers(drivers: &[Driver]) {
    print!("{}", render_drivers(drivers));
}

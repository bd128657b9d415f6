//! The conversion pipeline.
//!
//! A conversion moves through `Idle → InputOpened → SchemaResolved →
//! Streaming → Completed`, or to `Failed` from any state. Each batch is read,
//! its geometry columns re-encoded when the two formats store geometry
//! differently, and written before the next batch is pulled, so memory stays
//! bounded by one batch.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use arrow_array::{ArrayRef, RecordBatch};
use geoetl_core_common::error::{GeoEtlError, PipelineStage, Result, schema_incompatible};
use geoetl_core_common::geometry::transcode_array;
use geoetl_core_common::{
    BatchReader, BatchWriter, Capability, DatasetSchema, DriverOptions, DriverRegistry,
    FormatFactory,
};
use log::{debug, info, warn};

use crate::types::ConversionSummary;

/// States of a single conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    InputOpened,
    SchemaResolved,
    Streaming,
    Completed,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::InputOpened => "InputOpened",
            Self::SchemaResolved => "SchemaResolved",
            Self::Streaming => "Streaming",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Everything a conversion needs besides the registry.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub input_driver: String,
    pub output_driver: String,
    pub options: DriverOptions,
}

impl ConversionRequest {
    #[must_use]
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        input_driver: impl Into<String>,
        output_driver: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            input_driver: input_driver.into(),
            output_driver: output_driver.into(),
            options: DriverOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }
}

/// One conversion over a borrowed, read-only driver registry.
pub struct Pipeline<'a> {
    registry: &'a DriverRegistry,
    request: ConversionRequest,
    state: PipelineState,
}

struct Drivers<'a> {
    input: &'a dyn FormatFactory,
    output: &'a dyn FormatFactory,
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub fn new(registry: &'a DriverRegistry, request: ConversionRequest) -> Self {
        Self {
            registry,
            request,
            state: PipelineState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline state {} -> {next}", self.state);
        self.state = next;
    }

    /// Runs the conversion to completion.
    ///
    /// # Errors
    ///
    /// Any failure moves the pipeline to [`PipelineState::Failed`] and is
    /// returned wrapped with the stage it happened in.
    pub fn run(&mut self) -> Result<ConversionSummary> {
        info!(
            "Converting {} ({}) to {} ({})",
            self.request.input.display(),
            self.request.input_driver,
            self.request.output.display(),
            self.request.output_driver
        );
        match self.execute() {
            Ok(summary) => {
                info!(
                    "Conversion completed: {} row(s) in {} batch(es)",
                    summary.rows, summary.batches
                );
                Ok(summary)
            },
            Err(err) => {
                let from = self.state;
                self.transition(PipelineState::Failed);
                warn!("Conversion failed in state {from}: {err}");
                Err(err)
            },
        }
    }

    fn execute(&mut self) -> Result<ConversionSummary> {
        let registry = self.registry;
        let drivers = self
            .resolve_drivers(registry)
            .map_err(|e| e.in_stage(PipelineStage::OpenInput))?;
        // readers that decode geometry anyway emit it in the output's form
        let read_options = self
            .request
            .options
            .clone()
            .with_geometry_format(drivers.output.geometry_format());
        let reader = drivers
            .input
            .open_reader(&self.request.input, &read_options)
            .map_err(|e| e.in_stage(PipelineStage::OpenInput))?;
        self.transition(PipelineState::InputOpened);

        let (target, writer) = self
            .prepare_output(&drivers, reader.schema())
            .map_err(|e| e.in_stage(PipelineStage::ResolveSchema))?;
        self.transition(PipelineState::SchemaResolved);

        let source = reader.schema().clone();
        let (rows_read, writer) = self.stream(reader, writer, &source, &target, &drivers)?;

        let summary = writer
            .finish()
            .map_err(|e| e.in_stage(PipelineStage::FinalizeOutput))?;
        if summary.rows != rows_read {
            return Err(GeoEtlError::Other(anyhow!(
                "read {rows_read} row(s) but the {} writer reported {}",
                drivers.output.driver().short_name,
                summary.rows
            ))
            .in_stage(PipelineStage::FinalizeOutput));
        }
        self.transition(PipelineState::Completed);
        Ok(ConversionSummary {
            batches: summary.batches,
            rows: summary.rows,
        })
    }

    /// Resolves both drivers and checks capabilities and required options
    /// before anything is opened.
    fn resolve_drivers<'r>(&self, registry: &'r DriverRegistry) -> Result<Drivers<'r>> {
        let input = registry.resolve(&self.request.input_driver)?;
        let output = registry.resolve(&self.request.output_driver)?;
        input.driver().require(Capability::Read)?;
        output.driver().require(Capability::Write)?;
        input
            .driver()
            .check_required_options(Capability::Read, &self.request.options)?;
        output
            .driver()
            .check_required_options(Capability::Write, &self.request.options)?;
        Ok(Drivers { input, output })
    }

    fn prepare_output(
        &self,
        drivers: &Drivers<'_>,
        source: &DatasetSchema,
    ) -> Result<(DatasetSchema, Box<dyn BatchWriter>)> {
        let output = drivers.output.driver();
        source.check_geometry_limit(output.short_name, output.max_geometry_columns)?;
        let target = source.with_geometry_format(drivers.output.geometry_format());
        debug!(
            "Resolved schema with {} field(s), {} geometry column(s), writing geometry as {}",
            target.arrow_schema().fields().len(),
            target.geometry_columns().len(),
            drivers.output.geometry_format()
        );
        let writer =
            drivers
                .output
                .create_writer(&self.request.output, &target, &self.request.options)?;
        Ok((target, writer))
    }

    fn stream(
        &mut self,
        reader: Box<dyn BatchReader>,
        mut writer: Box<dyn BatchWriter>,
        source: &DatasetSchema,
        target: &DatasetSchema,
        drivers: &Drivers<'_>,
    ) -> Result<(usize, Box<dyn BatchWriter>)> {
        let mut rows = 0;
        for batch in reader {
            if self.state != PipelineState::Streaming {
                self.transition(PipelineState::Streaming);
            }
            let batch = batch
                .and_then(|batch| convert_batch(&batch, source, target, drivers, rows))
                .map_err(|e| e.in_stage(PipelineStage::Stream))?;
            writer
                .write_batch(&batch)
                .map_err(|e| e.in_stage(PipelineStage::Stream))?;
            rows += batch.num_rows();
            debug!("Streamed batch of {} row(s), {rows} so far", batch.num_rows());
        }
        Ok((rows, writer))
    }
}

/// Re-encodes the geometry columns of `batch` into the target representation.
/// `offset` is the number of rows already streamed.
fn convert_batch(
    batch: &RecordBatch,
    source: &DatasetSchema,
    target: &DatasetSchema,
    drivers: &Drivers<'_>,
    offset: usize,
) -> Result<RecordBatch> {
    if batch.num_columns() != source.arrow_schema().fields().len() {
        return Err(schema_incompatible(
            drivers.input.driver().short_name,
            format!(
                "batch has {} column(s), schema has {}",
                batch.num_columns(),
                source.arrow_schema().fields().len()
            ),
        ));
    }
    let columns = batch
        .columns()
        .iter()
        .enumerate()
        .map(|(index, array)| {
            let (Some(from), Some(to)) = (source.geometry_at(index), target.geometry_at(index))
            else {
                return Ok(Arc::clone(array));
            };
            transcode_array(array, from.format, to.format).map_err(|e| {
                let driver = if e.error.decode_kind().is_some() {
                    drivers.input.driver().short_name
                } else {
                    drivers.output.driver().short_name
                };
                e.error
                    .at(driver, &from.name, (offset + e.index + 1) as u64)
            })
        })
        .collect::<Result<Vec<ArrayRef>>>()?;
    RecordBatch::try_new(Arc::clone(target.arrow_schema()), columns)
        .map_err(|e| schema_incompatible(drivers.output.driver().short_name, e.to_string()))
}

//! Pipeline metrics.
//!
//! Metrics are declared as [`Metric`] constants and recorded through the
//! `metrics` facade. Nothing is exported unless the host application installs
//! a recorder.
//!
//! ```rust
//! use fdsm_pipeline::metrics::{metric_defs, describe_metrics};
//!
//! describe_metrics();
//! metrics::counter!(metric_defs::TILES_DOWNLOADED.name).increment(2);
//! ```

use metrics::{describe_counter, describe_histogram, Unit};

/// The kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A histogram for recording distributions.
    Histogram,
}

/// A metric declaration with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name.
    pub name: &'static str,
    /// Counter or histogram.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// Unit of measurement.
    pub unit: Unit,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// A counter with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: Unit::Count,
            labels: &[],
        }
    }

    /// A histogram with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Histogram,
            description: "",
            unit: Unit::Seconds,
            labels: &[],
        }
    }

    /// Set the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Set the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    /// Set the expected label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register the description with the installed recorder.
    pub fn describe(&self) {
        match self.kind {
            MetricKind::Counter => describe_counter!(self.name, self.unit, self.description),
            MetricKind::Histogram => describe_histogram!(self.name, self.unit, self.description),
        }
    }
}

/// All pipeline metric declarations.
pub mod metric_defs {
    use super::{Metric, Unit};

    pub const CATALOG_ITEMS: Metric = Metric::counter("fdsm.catalog.items")
        .with_description("Catalog items returned for foundation queries")
        .with_unit(Unit::Count);

    pub const TILES_DOWNLOADED: Metric = Metric::counter("fdsm.fetch.tiles")
        .with_description("Foundation tiles downloaded")
        .with_unit(Unit::Count);

    pub const BYTES_DOWNLOADED: Metric = Metric::counter("fdsm.fetch.bytes")
        .with_description("Bytes of foundation tiles downloaded")
        .with_unit(Unit::Bytes);

    pub const TILES_REPROJECTED: Metric = Metric::counter("fdsm.reconcile.tiles_reprojected")
        .with_description("Tiles reprojected into the majority CRS")
        .with_unit(Unit::Count);

    pub const PIPELINE_RUNS: Metric = Metric::counter("fdsm.pipeline.runs")
        .with_description("Foundation assemblies by outcome")
        .with_unit(Unit::Count)
        .with_labels(&["outcome"]);

    pub const STAGE_DURATION: Metric = Metric::histogram("fdsm.pipeline.stage_seconds")
        .with_description("Wall time spent in each pipeline stage")
        .with_unit(Unit::Seconds)
        .with_labels(&["stage"]);

    /// Every declared metric.
    pub const ALL: &[Metric] = &[
        CATALOG_ITEMS,
        TILES_DOWNLOADED,
        BYTES_DOWNLOADED,
        TILES_REPROJECTED,
        PIPELINE_RUNS,
        STAGE_DURATION,
    ];
}

/// Register descriptions for every pipeline metric.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

pub(crate) fn record_counter(metric: &Metric, value: u64) {
    metrics::counter!(metric.name).increment(value);
}

pub(crate) fn record_run(outcome: &'static str) {
    metrics::counter!(metric_defs::PIPELINE_RUNS.name, "outcome" => outcome).increment(1);
}

pub(crate) fn record_stage(stage: &'static str, seconds: f64) {
    metrics::histogram!(metric_defs::STAGE_DURATION.name, "stage" => stage).record(seconds);
}

//! Per-asset outlier detection and cleaning for multi-entity time-series panels.
//!
//! A [`Panel`] is keyed by (entity, timestamp). [`detect`] runs one
//! [`Method`] independently per entity and returns an [`OutlierReport`] with
//! exactly the input's keys and fields.

pub mod error;
mod types;
pub use types::*;

pub mod circular;
pub mod frequency;
pub mod stats;

pub mod panel;

pub mod decompose;
pub mod forecast;

pub mod detector;

pub mod report;
pub mod runner;

pub mod clean;
pub mod filter;
pub mod impute;

pub use clean::{CleanPipeline, CleanStep, CleanSummary, StepSummary};
pub use detector::{Method, MethodKind};
pub use error::{PanelError, Result};
pub use frequency::Frequency;
pub use panel::{CsvOptions, EntityFrame, Panel, PanelBuilder};
pub use report::{FieldSummary, OutlierReport, ReportKey, ReportSummary};
pub use runner::{detect, DetectionRequest};

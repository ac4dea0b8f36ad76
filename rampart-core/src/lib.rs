//! Load-generation engine: virtual users ramped over declarative stage
//! profiles, weighted scenario selection, streaming metric aggregation, and
//! SLO threshold evaluation.
//!
//! The HTTP transport is a seam ([`Transport`]); [`HyperTransport`] is the
//! real client, tests substitute stubs.

mod client;
mod collector;
mod config;
mod error;
mod progress;
mod response;
mod result;
mod run;
mod scenario;
mod schedule;
mod selector;
mod thresholds;
mod transport;
mod vu;

pub use client::HyperTransport;
pub use collector::{Collector, RequestMeta, RunSnapshot};
pub use config::{
    Config, ConfigError, LoadProfile, MAX_VUS, Pagination, Stage, ThinkTime, ThresholdSpec,
};
pub use error::{Error, Result};
pub use progress::{ProgressFn, ProgressUpdate};
pub use response::{CategorySummary, Envelope, ProductDetail, ProductSummary, decode};
pub use result::{RunMeta, RunResult};
pub use run::{RunOptions, run};
pub use scenario::ScenarioKind;
pub use schedule::StageSchedule;
pub use selector::WeightedSelector;
pub use thresholds::{
    ThresholdExpr, ThresholdOutcome, ThresholdVerdict, evaluate_thresholds, parse_threshold_expr,
};
pub use transport::{
    ApiRequest, ApiResponse, Transport, TransportError, TransportErrorKind, TransportResult,
};
pub use vu::StopSignal;

pub use rampart_metrics::{MetricValue, SeriesSummary, TrendSummary};

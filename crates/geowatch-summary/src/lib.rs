//! Per-tick snapshots, event aggregation, and range reports.
//!
//! - `snapshot`: `WindowSummarizer` builds one immutable `Snapshot` per tick
//! - `events`: contiguous same-level runs grouped into `Event`s
//! - `report`: `TickLog` range queries, shift reports, and the run report

pub mod error;
pub mod events;
pub mod report;
pub mod snapshot;

pub use error::{SummaryError, SummaryResult};
pub use events::{segments, ClassifiedTick, Event, EventAggregator, Segment};
pub use report::{
    LevelDistribution, RankedTick, RunReport, ShiftReport, TickLog, TickRecord, ValueStats,
};
pub use snapshot::{
    CurrentState, HistoryContext, IndicatorValues, SeriesContext, SlicePoint, Snapshot,
    SummaryConfig, SummaryRequest, WindowMetrics, WindowSummarizer, DEFAULT_LOOKBACK_POINTS,
};

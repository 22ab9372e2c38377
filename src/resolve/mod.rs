//! The fan-out-then-reduce join between geography kinds.

mod accumulate;
mod diagnostics;
mod metric;
mod resolver;
mod rows;

pub(crate) use accumulate::Accumulator;
pub use diagnostics::Diagnostics;
pub use metric::{MetricKind, MetricTags};
pub use resolver::{Resolution, ResolveOptions, Resolver};
pub use rows::{AggregatedRow, MappedRow, SourceRow};

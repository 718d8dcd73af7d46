// Aggregation engine: per-file aggregation, incremental merge, percentile ranks.

pub mod aggregate;
pub mod merge;
pub mod rank;

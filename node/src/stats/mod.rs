mod stats;
mod stats_enums;
mod stats_log_sink;

pub use stats::{StatCategory, Stats, StatsConfig};
pub use stats_enums::{DetailType, Direction, Sample, StatType};
pub use stats_log_sink::{StatsJsonWriter, StatsLogSink};

mod online_reps;

pub use online_reps::{OnlineReps, OnlineRepsConfig, DEFAULT_ONLINE_WEIGHT_MINIMUM};

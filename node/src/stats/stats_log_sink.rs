use anyhow::Result;
use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use std::time::SystemTime;

pub trait StatsLogSink {
    /// Called before logging starts
    fn begin(&mut self) -> Result<()>;

    /// Called after logging is completed
    fn finalize(&mut self);

    /// Write a header entry to the log
    fn write_header(&mut self, header: &str, walltime: SystemTime) -> Result<()>;

    fn write_counter_entry(
        &mut self,
        time: SystemTime,
        entry_type: &str,
        detail: &str,
        dir: &str,
        value: u64,
    ) -> Result<()>;

    fn write_sampler_entry(
        &mut self,
        time: SystemTime,
        sample: &str,
        values: Vec<i64>,
        expected_min_max: (i64, i64),
    ) -> Result<()>;
}

/// Collects counters or samples into a JSON tree
pub struct StatsJsonWriter {
    tree: Map<String, Value>,
    entries: Vec<Value>,
}

impl StatsJsonWriter {
    pub fn new() -> Self {
        Self {
            tree: Map::new(),
            entries: Vec::new(),
        }
    }

    pub fn finish(self) -> Value {
        Value::Object(self.tree)
    }
}

impl Default for StatsJsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn time_of_day(time: SystemTime) -> Value {
    Value::String(DateTime::<Local>::from(time).format("%H:%M:%S").to_string())
}

impl StatsLogSink for StatsJsonWriter {
    fn begin(&mut self) -> Result<()> {
        self.tree.clear();
        self.entries.clear();
        Ok(())
    }

    fn finalize(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        self.tree.insert("entries".to_owned(), Value::Array(entries));
    }

    fn write_header(&mut self, header: &str, walltime: SystemTime) -> Result<()> {
        let now = DateTime::<Local>::from(walltime);
        self.tree
            .insert("type".to_owned(), Value::String(header.to_owned()));
        self.tree.insert(
            "created".to_owned(),
            Value::String(now.format("%Y.%m.%d %H:%M:%S").to_string()),
        );
        Ok(())
    }

    fn write_counter_entry(
        &mut self,
        time: SystemTime,
        entry_type: &str,
        detail: &str,
        dir: &str,
        value: u64,
    ) -> Result<()> {
        let mut entry = Map::new();
        entry.insert("time".to_owned(), time_of_day(time));
        entry.insert("type".to_owned(), Value::String(entry_type.to_owned()));
        entry.insert("detail".to_owned(), Value::String(detail.to_owned()));
        entry.insert("dir".to_owned(), Value::String(dir.to_owned()));
        entry.insert("value".to_owned(), Value::String(value.to_string()));
        self.entries.push(Value::Object(entry));
        Ok(())
    }

    fn write_sampler_entry(
        &mut self,
        time: SystemTime,
        sample: &str,
        values: Vec<i64>,
        expected_min_max: (i64, i64),
    ) -> Result<()> {
        let mut entry = Map::new();
        entry.insert("time".to_owned(), time_of_day(time));
        entry.insert("sample".to_owned(), Value::String(sample.to_owned()));
        entry.insert(
            "min".to_owned(),
            Value::String(expected_min_max.0.to_string()),
        );
        entry.insert(
            "max".to_owned(),
            Value::String(expected_min_max.1.to_string()),
        );
        let values = values
            .into_iter()
            .map(|v| Value::String(v.to_string()))
            .collect();
        entry.insert("values".to_owned(), Value::Array(values));
        self.entries.push(Value::Object(entry));
        Ok(())
    }
}

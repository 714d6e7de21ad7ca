//! Test doubles.
//!
//! [`RecordingLogger`] keeps every record in memory so tests can assert on
//! what the middleware logged, down to the redacted body.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::log::{Field, FieldValue, Level, Logger};

/// Owned copy of a [`FieldValue`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Recorded {
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
}

impl From<FieldValue<'_>> for Recorded {
    fn from(value: FieldValue<'_>) -> Self {
        match value {
            FieldValue::Int(n) => Self::Int(n),
            FieldValue::Str(s) => Self::Str(s.to_owned()),
            FieldValue::Bytes(b) => Self::Bytes(b.to_vec()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(&'static str, Recorded)>,
}

impl Record {
    pub fn field(&self, key: &str) -> Option<Recorded> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone())
    }
}

/// A [`Logger`] that remembers. Clones share one record list.
#[derive(Clone, Default)]
pub struct RecordingLogger {
    records: Arc<Mutex<Vec<Record>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: Level, message: &str, fields: &[Field<'_>]) {
        let fields = fields.iter().map(|f| (f.key, Recorded::from(f.value))).collect();
        self.records.lock().push(Record { level, message: message.to_owned(), fields });
    }
}

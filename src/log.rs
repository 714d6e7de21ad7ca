//! Structured log sink used by the middleware.
//!
//! The filters report through a [`Logger`] rather than calling `tracing`
//! directly so the redacted body can be routed somewhere other than the
//! process log, and so tests can assert on exactly what was recorded.

use std::fmt;

use tracing::{debug, error, info, warn};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue<'a> {
    Int(i64),
    Str(&'a str),
    Bytes(&'a [u8]),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Field<'a> {
    pub key: &'static str,
    pub value: FieldValue<'a>,
}

impl<'a> Field<'a> {
    pub fn int(key: &'static str, value: impl Into<i64>) -> Self {
        Self { key, value: FieldValue::Int(value.into()) }
    }

    pub fn str(key: &'static str, value: &'a str) -> Self {
        Self { key, value: FieldValue::Str(value) }
    }

    pub fn bytes(key: &'static str, value: &'a [u8]) -> Self {
        Self { key, value: FieldValue::Bytes(value) }
    }
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
        }
    }
}

/// Fire-and-forget structured sink.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str, fields: &[Field<'_>]);
}

/// Forwards records to `tracing` with fields rendered as `key=value` pairs.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

struct Pairs<'a>(&'a [Field<'a>]);

impl fmt::Display for Pairs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", field.key, field.value)?;
        }
        Ok(())
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str, fields: &[Field<'_>]) {
        let fields = Pairs(fields);
        match level {
            Level::Debug => debug!(fields = %fields, "{message}"),
            Level::Info => info!(fields = %fields, "{message}"),
            Level::Warn => warn!(fields = %fields, "{message}"),
            Level::Error => error!(fields = %fields, "{message}"),
        }
    }
}

//! Pipeline configuration.
//!
//! Plain data lives here and can be read from TOML. Callbacks and the
//! renderer/logger collaborators are code, so they are attached on the
//! [`PipelineBuilder`](crate::PipelineBuilder) instead.
//!
//! ```toml
//! default_error_message = "Something went wrong"
//! server_fault_threshold = 500
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

pub const DEFAULT_ERROR_MESSAGE: &str = "Internal Server Error";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Message sent to the client in place of a redacted body.
    pub default_error_message: String,
    /// Lowest status treated as a server fault and redacted.
    pub server_fault_threshold: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_error_message: DEFAULT_ERROR_MESSAGE.to_owned(),
            server_fault_threshold: 500,
        }
    }
}

impl Config {
    pub fn from_toml(src: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.default_error_message = message.into();
        self
    }

    /// The threshold must name a 5xx status: client-fault responses are
    /// never rewritten.
    pub fn validate(&self) -> Result<(), Error> {
        match self.server_fault_threshold {
            500..=599 => Ok(()),
            other => Err(Error::Threshold(other)),
        }
    }
}

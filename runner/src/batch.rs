pub mod engine;
pub mod provider;
pub mod template;

#[cfg(test)]
mod provider_test;

use crate::{database::ConnectionError, jobs::JobError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Failed to parse batch template")]
    Template(#[from] serde_yaml::Error),
    #[error("Failed to read or write {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("Failed to run submission command '{command}'")]
    Submit {
        command: String,
        #[source]
        error: std::io::Error,
    },
    #[error("The submission command is empty")]
    EmptySubmitCommand,
    #[error("Template defines no cookie for tag '{0}'")]
    MissingCookie(String),
    #[error("Cookie '{tag}' has the non numeric value '{value}'")]
    InvalidCookie { tag: String, value: String },
    #[error("Cannot overwrite a cookie with an empty tag")]
    BlankCookieTag,
    #[error("Invalid job selection")]
    Job(#[from] JobError),
    #[error("Failed to resolve job ids")]
    Connection(#[from] ConnectionError),
}

impl BatchError {
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            error,
        }
    }
}

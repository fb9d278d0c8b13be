//! Execution identifiers
//!
//! An execution identifier is the local wall-clock time at second resolution,
//! formatted `YYYYMMDDHHMMSS`. It names the results directory of one run, so
//! identifiers sort chronologically. Two runs started within the same second
//! share an identifier; that precision limit is accepted.

use std::fmt;
use std::sync::OnceLock;

use chrono::Local;
use log::info;

use crate::domain::{Result, TraceError};

/// Number of characters in an identifier
pub const IDENTIFIER_LEN: usize = 14;

const IDENTIFIER_FORMAT: &str = "%Y%m%d%H%M%S";

static SESSION_IDENTIFIER: OnceLock<ExecutionId> = OnceLock::new();

/// Validated execution identifier (14 ASCII digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId(String);

impl ExecutionId {
    /// Parse an identifier produced by an earlier run
    ///
    /// # Errors
    /// Returns [`TraceError::InvalidUsage`] unless `s` is exactly 14 ASCII digits.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != IDENTIFIER_LEN || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TraceError::InvalidUsage(format!(
                "execution identifier must be {IDENTIFIER_LEN} digits (YYYYMMDDHHMMSS), got '{s}'"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExecutionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generate a fresh identifier from the local wall clock
#[must_use]
pub fn generate_identifier() -> ExecutionId {
    ExecutionId(Local::now().format(IDENTIFIER_FORMAT).to_string())
}

/// Identifier shared by the whole process
///
/// The first call generates it; later calls return the same value so that
/// every record and the final trace land in one directory.
pub fn session_identifier() -> &'static ExecutionId {
    SESSION_IDENTIFIER.get_or_init(|| {
        let id = generate_identifier();
        info!("Execution identifier: {id}");
        id
    })
}

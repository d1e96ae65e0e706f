//! Store error type with backend error-code classification.
//!
//! Retry decisions key off backend-reported error codes (SQLSTATE for
//! PostgreSQL, vendor codes elsewhere), so [`StoreError`] splits errors
//! that carry a code from everything else the driver can report.

/// An error returned by the event store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend reported an error with an error code attached.
    #[error("Database error {code}: {message}")]
    Backend { code: String, message: String },

    /// Any other driver failure (connectivity, decoding, pool teardown).
    #[error("Database driver error: {0}")]
    Driver(#[source] sqlx::Error),
}

impl StoreError {
    /// The backend error code, if the backend reported one.
    pub fn backend_code(&self) -> Option<&str> {
        match self {
            Self::Backend { code, .. } => Some(code),
            Self::Driver(_) => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if let Some(code) = db_err.code() {
                return Self::Backend {
                    code: code.into_owned(),
                    message: db_err.message().to_string(),
                };
            }
        }
        Self::Driver(err)
    }
}

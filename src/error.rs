//! Error types for the circuit breaker library.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

/// Result type for circuit breaker operations.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// Error type for circuit breaker operations.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The circuit is open, the operation was never invoked.
    Open,

    /// The operation did not finish within the configured timeout.
    Timeout(Duration),

    /// The caller cancelled the execution before the operation finished.
    Cancelled,

    /// The underlying operation failed.
    Operation(E),

    /// The circuit breaker encountered an internal error.
    Internal(InternalError),
}

/// Internal errors that can occur within the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalError {
    /// The operation task panicked or was aborted before delivering a result.
    OperationAborted,

    /// The call was made outside of a tokio runtime, so the operation could
    /// not be spawned.
    NoRuntime,
}

impl<E> BreakerError<E> {
    /// Returns true if the call was rejected because the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open)
    }

    /// Returns true if the operation exceeded its time budget.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout(_))
    }

    /// Returns true if the caller withdrew interest in the result.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BreakerError::Cancelled)
    }

    /// Consumes the error, returning the operation's own error if there is one.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> Display for BreakerError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open => write!(f, "Circuit breaker is open"),
            BreakerError::Timeout(after) => write!(f, "Operation timed out after {:?}", after),
            BreakerError::Cancelled => write!(f, "Operation was cancelled by the caller"),
            BreakerError::Operation(e) => write!(f, "Operation error: {}", e),
            BreakerError::Internal(e) => write!(f, "Circuit breaker internal error: {}", e),
        }
    }
}

impl Display for InternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InternalError::OperationAborted => {
                write!(f, "Operation task aborted before delivering a result")
            }
            InternalError::NoRuntime => {
                write!(f, "No tokio runtime available to run the operation")
            }
        }
    }
}

impl<E: Error + 'static> Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BreakerError::Operation(e) => Some(e),
            BreakerError::Internal(e) => Some(e),
            _ => None,
        }
    }
}

impl Error for InternalError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Upstream;

    impl Display for Upstream {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "upstream refused")
        }
    }

    impl Error for Upstream {}

    #[test]
    fn display_distinguishes_kinds() {
        let open: BreakerError<Upstream> = BreakerError::Open;
        let timeout: BreakerError<Upstream> = BreakerError::Timeout(Duration::from_secs(3));
        let op = BreakerError::Operation(Upstream);

        assert_eq!(open.to_string(), "Circuit breaker is open");
        assert_eq!(timeout.to_string(), "Operation timed out after 3s");
        assert_eq!(op.to_string(), "Operation error: upstream refused");
    }

    #[test]
    fn source_points_at_operation_error() {
        let op = BreakerError::Operation(Upstream);
        assert_eq!(op.source().map(|e| e.to_string()), Some("upstream refused".into()));

        let cancelled: BreakerError<Upstream> = BreakerError::Cancelled;
        assert!(cancelled.source().is_none());
    }

    #[test]
    fn internal_errors_are_sources() {
        let err: BreakerError<Upstream> = BreakerError::Internal(InternalError::NoRuntime);
        assert_eq!(
            err.to_string(),
            "Circuit breaker internal error: No tokio runtime available to run the operation"
        );
        assert_eq!(
            err.source().map(|e| e.to_string()),
            Some(InternalError::NoRuntime.to_string())
        );
    }

    #[test]
    fn predicates() {
        let timeout: BreakerError<Upstream> = BreakerError::Timeout(Duration::from_millis(5));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_open());
        assert!(BreakerError::<Upstream>::Open.is_open());
        assert!(BreakerError::<Upstream>::Cancelled.is_cancelled());
        assert!(BreakerError::Operation(Upstream).into_operation().is_some());
        assert!(BreakerError::<Upstream>::Open.into_operation().is_none());
    }
}

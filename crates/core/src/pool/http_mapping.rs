//! Pure functions for mapping pool errors to HTTP status codes.

use super::PoolError;

/// Maps a [`PoolError`] to an HTTP status code.
///
/// - `Connect`, `Timeout`, `Exhausted`, `Closed` -> 503 (Service Unavailable)
/// - `Create`, `InvalidConfig` -> 500 (Internal Server Error)
///
/// # Examples
///
/// ```
/// use bomhub_core::pool::{pool_error_to_status_code, PoolError};
///
/// let error = PoolError::Exhausted { attempts: 3, last_error: "probe failed".into() };
/// assert_eq!(pool_error_to_status_code(&error), 503);
/// ```
pub fn pool_error_to_status_code(error: &PoolError) -> u16 {
    match error {
        PoolError::Connect(_) => 503,
        PoolError::Timeout(_) => 503,
        PoolError::Exhausted { .. } => 503,
        PoolError::Closed => 503,
        PoolError::Create(_) => 500,
        PoolError::InvalidConfig(_) => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DriverError;
    use std::time::Duration;

    #[test]
    fn test_unavailable_errors_map_to_503() {
        assert_eq!(
            pool_error_to_status_code(&PoolError::Connect(DriverError::new("x"))),
            503
        );
        assert_eq!(
            pool_error_to_status_code(&PoolError::Timeout(Duration::from_secs(1))),
            503
        );
        assert_eq!(pool_error_to_status_code(&PoolError::Closed), 503);
    }

    #[test]
    fn test_fatal_errors_map_to_500() {
        assert_eq!(
            pool_error_to_status_code(&PoolError::Create(DriverError::new("x"))),
            500
        );
        assert_eq!(
            pool_error_to_status_code(&PoolError::InvalidConfig("x".into())),
            500
        );
    }
}

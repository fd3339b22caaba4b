//! Connection health probe.

use std::time::Duration;

use super::{AsyncConnector, Connector};

/// Statement sent to test a connection.
pub const PROBE_QUERY: &str = "SELECT 1";

/// Statement that discards any transaction left open on a connection.
pub const ROLLBACK: &str = "ROLLBACK";

/// Returns true if the connection answers [`PROBE_QUERY`] within `timeout`.
///
/// Never fails: driver errors and timeouts are logged and reported as
/// unhealthy.
pub async fn is_healthy<C: AsyncConnector>(
    connector: &C,
    conn: &mut C::Connection,
    timeout: Duration,
) -> bool {
    match tokio::time::timeout(timeout, connector.batch_execute(conn, PROBE_QUERY)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Connection health probe failed");
            false
        }
        Err(_) => {
            tracing::warn!(timeout = ?timeout, "Connection health probe timed out");
            false
        }
    }
}

/// Blocking flavor of [`is_healthy`]. The timeout is left to the driver.
pub fn is_healthy_blocking<C: Connector>(connector: &C, conn: &mut C::Connection) -> bool {
    match connector.batch_execute(conn, PROBE_QUERY) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Connection health probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBlockingConnector, MockConnector};

    #[tokio::test]
    async fn test_healthy_connection() {
        let connector = MockConnector::new();
        let mut conn = connector.connect().await.unwrap();

        assert!(is_healthy(&connector, &mut conn, Duration::from_secs(1)).await);
        assert_eq!(connector.executed(), vec![PROBE_QUERY.to_string()]);
    }

    #[tokio::test]
    async fn test_probe_error_is_unhealthy() {
        let connector = MockConnector::new().with_probe_results([false]);
        let mut conn = connector.connect().await.unwrap();

        assert!(!is_healthy(&connector, &mut conn, Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_is_unhealthy() {
        let connector = MockConnector::new().with_probe_delay(Duration::from_secs(5));
        let mut conn = connector.connect().await.unwrap();

        assert!(!is_healthy(&connector, &mut conn, Duration::from_millis(100)).await);
    }

    #[test]
    fn test_blocking_probe() {
        let connector = MockBlockingConnector::new().with_probe_results([true, false]);
        let mut conn = connector.connect().unwrap();

        assert!(is_healthy_blocking(&connector, &mut conn));
        assert!(!is_healthy_blocking(&connector, &mut conn));
    }
}

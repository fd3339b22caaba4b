//! Redis error mapping to CacheError.

use bomhub_core::cache::CacheError;

/// Maps Redis errors to CacheError.
///
/// Unreachable servers become `ConnectionFailed` so callers fall back to the
/// in-process store; rejected credentials become `Authentication`.
pub fn map_redis_error(err: redis::RedisError) -> CacheError {
    if err.kind() == redis::ErrorKind::AuthenticationFailed
        || matches!(err.code(), Some("NOAUTH") | Some("WRONGPASS"))
    {
        CacheError::Authentication(err.to_string())
    } else if err.is_connection_refusal()
        || err.is_timeout()
        || err.is_connection_dropped()
        || err.is_io_error()
    {
        CacheError::ConnectionFailed(err.to_string())
    } else {
        CacheError::OperationFailed(err.to_string())
    }
}

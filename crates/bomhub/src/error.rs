use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bomhub_core::pool::{pool_error_to_status_code, PoolError};

const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable";

pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = if let Some(pool_error) = self.0.downcast_ref::<PoolError>() {
            let code = pool_error_to_status_code(pool_error);
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        // Pool internals stay in the logs.
        if status_code == StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self.0, "Database unavailable");
            return (status_code, UNAVAILABLE_MESSAGE).into_response();
        }

        (status_code, self.0.to_string()).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

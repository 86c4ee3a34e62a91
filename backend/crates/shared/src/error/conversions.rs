//! Conversions into [`AppError`]

use super::app_error::AppError;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() {
            AppError::bad_request(format!("JSON parse error: {}", err)).with_source(err)
        } else {
            AppError::internal("JSON serialization error").with_source(err)
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::not_found("Record not found").with_source(err),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                AppError::service_unavailable("Database unavailable").with_source(err)
            }
            sqlx::Error::Database(db_err) => {
                // https://www.postgresql.org/docs/current/errcodes-appendix.html
                let app_err = match db_err.code().as_deref() {
                    Some("23505") => AppError::conflict("Duplicate key value"),
                    Some("23503") => AppError::conflict("Foreign key violation"),
                    Some("23502") | Some("23514") => AppError::bad_request("Constraint violation"),
                    Some(code) if code.starts_with("53") || code.starts_with("57") => {
                        AppError::service_unavailable("Database unavailable")
                    }
                    _ => AppError::internal("Database error"),
                };
                app_err.with_source(err)
            }
            _ => AppError::internal("Database error").with_source(err),
        }
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // RFC 7807 Problem Details
        let body = serde_json::json!({
            "type": format!("https://httpstatuses.io/{}", self.status_code()),
            "title": self.kind().as_str(),
            "status": self.status_code(),
            "detail": self.message(),
            "action": self.action(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind::ErrorKind;

    #[test]
    fn test_json_syntax_error_is_bad_request() {
        let json_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let app_err: AppError = json_err.into();
        assert_eq!(app_err.kind(), ErrorKind::BadRequest);
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn test_pool_timeout_is_unavailable() {
        let app_err: AppError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(app_err.kind(), ErrorKind::ServiceUnavailable);
    }

    #[cfg(feature = "axum")]
    #[test]
    fn test_into_response_status() {
        use axum::response::IntoResponse;

        let response = AppError::forbidden("Admins only").into_response();
        assert_eq!(response.status().as_u16(), 403);
    }
}

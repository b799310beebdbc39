use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    /// One message for both unknown email and wrong password, so the
    /// response never reveals which emails are registered.
    #[error("your email or password does not match")]
    CredentialMismatch,

    #[error("login required")]
    LoginRequired,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("blocking task canceled")]
    Canceled,

    #[error("{0}")]
    Internal(&'static str),
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(_: actix_web::error::BlockingError) -> Self {
        AppError::Canceled
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::CredentialMismatch | AppError::LoginRequired => StatusCode::UNAUTHORIZED,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Hash(_)
            | AppError::Canceled
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("internal error: {self}");
            return HttpResponse::InternalServerError()
                .json(json!({ "error": "internal server error" }));
        }
        HttpResponse::build(status).json(json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_map_to_expected_statuses() {
        assert_eq!(
            AppError::NotFound("post").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::CredentialMismatch.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::LoginRequired.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Canceled.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn internal_error_bodies_carry_no_details() {
        let resp = AppError::Internal("pool is missing from app data").error_response();
        let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("internal server error"));
        assert!(!body.contains("pool"));
    }

    #[actix_web::test]
    async fn client_error_bodies_carry_the_message() {
        let resp = AppError::Validation("username already taken".into()).error_response();
        let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("username already taken"));
    }
}

//! Application error type.
//!
//! Anything a user can fix themselves (bad form input, a taken username, a wrong
//! password) is flashed and redirected instead. `AppError` covers the rest and
//! renders as a small error page, except `Unauthorized`, which sends the visitor
//! to the login form.

use actix_web::{
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use log::error;
use thiserror::Error;

use crate::pages;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not logged in")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("upload exceeds {0}")]
    PayloadTooLarge(bytesize::ByteSize),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("not found".into()),
            err => AppError::Database(err),
        }
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AppError::Internal(format!("password hashing failed: {err}"))
    }
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        AppError::BadRequest(format!("malformed upload: {err}"))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::SEE_OTHER,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Database(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let message = match self {
            AppError::Unauthorized => {
                return HttpResponse::SeeOther()
                    .append_header((header::LOCATION, "/login"))
                    .finish();
            }
            AppError::Database(_) | AppError::Io(_) | AppError::Internal(_) => {
                error!("{self}");
                "internal server error".to_string()
            }
            x => x.to_string(),
        };

        HttpResponse::build(status)
            .content_type(mime::TEXT_HTML_UTF_8)
            .body(pages::error_page(status, &message).into_string())
    }
}

/// SQLite reports UNIQUE as 2067 and PRIMARY KEY conflicts as 1555.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(x) => x
            .code()
            .map_or(false, |code| code == "2067" || code == "1555"),
        _ => false,
    }
}

#[test]
fn error_statuses() {
    assert_eq!(
        AppError::Unauthorized.error_response().status(),
        StatusCode::SEE_OTHER
    );
    assert_eq!(
        AppError::Forbidden("no".into()).error_response().status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        AppError::from(sqlx::Error::RowNotFound)
            .error_response()
            .status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        AppError::PayloadTooLarge(bytesize::ByteSize::kib(1))
            .error_response()
            .status(),
        StatusCode::PAYLOAD_TOO_LARGE
    );
    assert_eq!(
        AppError::Internal("boom".into()).error_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn unauthorized_redirects_to_login() {
    let response = AppError::Unauthorized.error_response();

    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login"
    );
}

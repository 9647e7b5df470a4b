use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use natursur::{
    application::{account::AccountError, booking::BookingError, notify::MailError},
    domain::{BoxError, DataAccessError},
};
use thiserror::Error;
use tracing::error;

use crate::pages;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Forbidden")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    #[error("Internal error: {0}")]
    InternalError(#[from] BoxError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::InternalError(e) = &self {
            error!("アプリケーションエラー: {}", e);
        }
        (status, Html(pages::error_page(status))).into_response()
    }
}

impl From<DataAccessError> for AppError {
    fn from(value: DataAccessError) -> Self {
        AppError::InternalError(Box::new(value))
    }
}

impl From<MailError> for AppError {
    fn from(value: MailError) -> Self {
        AppError::InternalError(Box::new(value))
    }
}

impl From<BookingError> for AppError {
    fn from(value: BookingError) -> Self {
        match value {
            BookingError::NotFound => AppError::NotFound,
            BookingError::Invalid(errors) => AppError::BadRequest(errors.to_string()),
            other => AppError::InternalError(Box::new(other)),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(value: AccountError) -> Self {
        match value {
            AccountError::NotFound => AppError::NotFound,
            AccountError::Protected => AppError::Forbidden,
            AccountError::Invalid(errors) => AppError::BadRequest(errors.to_string()),
            other => AppError::InternalError(Box::new(other)),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

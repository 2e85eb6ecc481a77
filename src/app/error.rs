use actix_web::{
  error::ResponseError,
  http::{header, StatusCode},
  HttpResponse
};
use derive_more::Display;
use log::error;
use crate::convert::ConvertError;
use crate::storage::StorageError;
use super::contact_relay::RelayError;
use super::dtos::ErrorResponse;

// Display is the "message" part of the JSON body, the
// String inside is the "error" detail. For the upstream
// failures the detail is kept generic and the real cause
// only goes to the logs, random internet people don't need
// to see what the database said.
#[derive(Debug, Display)]
pub enum Error {
  #[display(fmt = "Bad request")]
  BadRequest(String),
  #[display(fmt = "{}", message)]
  NotFound { message: String, detail: String },
  #[display(fmt = "Wrong password")]
  WrongPassword,
  #[display(fmt = "Database error")]
  DatabaseError(String),
  #[display(fmt = "Storage error")]
  StorageError(String),
  #[display(fmt = "Processing error")]
  ProcessingError(String),
  #[display(fmt = "Payload too large")]
  PayloadTooLarge(String),
  #[display(fmt = "Too many requests")]
  TooManyRequests,
  #[display(fmt = "Service unavailable")]
  RelayUnavailable
}

impl Error {

  pub fn not_found(message: &str, detail: &str) -> Self {
    Error::NotFound {
      message: message.to_string(),
      detail: detail.to_string()
    }
  }

  fn detail(&self) -> String {
    match self {
      Error::BadRequest(d)
      | Error::PayloadTooLarge(d)
      | Error::ProcessingError(d) => d.clone(),
      Error::NotFound { detail, .. } => detail.clone(),
      Error::DatabaseError(_) => "The data store could not complete the request".to_string(),
      Error::StorageError(_) => "The file could not be stored".to_string(),
      Error::WrongPassword => "Invalid credentials".to_string(),
      Error::TooManyRequests => "Try again later".to_string(),
      Error::RelayUnavailable => "Contact relay is not configured".to_string()
    }
  }

}

impl ResponseError for Error {

  fn status_code(&self) -> StatusCode {
    match self {
      Error::BadRequest(_) => StatusCode::BAD_REQUEST,
      Error::NotFound { .. } => StatusCode::NOT_FOUND,
      Error::WrongPassword => StatusCode::UNAUTHORIZED,
      Error::DatabaseError(_)
      | Error::StorageError(_)
      | Error::ProcessingError(_) => StatusCode::INTERNAL_SERVER_ERROR,
      Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      Error::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
      Error::RelayUnavailable => StatusCode::SERVICE_UNAVAILABLE
    }
  }

  fn error_response(&self) -> HttpResponse {
    HttpResponse::build(self.status_code())
      .insert_header((header::CACHE_CONTROL, "no-store"))
      .json(ErrorResponse {
        success: false,
        message: self.to_string(),
        error: self.detail()
      })
  }

}

// Data access functions return eyre Reports, whatever
// they say only goes to the logs.
pub fn map_db_error(e: eyre::Report) -> Error {
  error!("Database error: {:?}", e);
  Error::DatabaseError(e.to_string())
}

impl From<StorageError> for Error {
  fn from(e: StorageError) -> Self {
    error!("Storage error: {}", e);
    Error::StorageError(e.to_string())
  }
}

impl From<ConvertError> for Error {
  fn from(e: ConvertError) -> Self {
    error!("Document conversion failed: {}", e);
    match e {
      ConvertError::Upload(storage) => Error::StorageError(storage.to_string()),
      other => Error::ProcessingError(other.to_string())
    }
  }
}

impl From<RelayError> for Error {
  fn from(e: RelayError) -> Self {
    error!("Contact relay error: {}", e);
    Error::ProcessingError("Message could not be sent".to_string())
  }
}

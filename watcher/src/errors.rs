use actix_web::{HttpResponse, ResponseError};
use std::fmt;

use crate::services::store::StoreError;

#[derive(Debug)]
pub enum ServiceError {
    NotFound(String),
    StoreError(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ServiceError::StoreError(msg) => write!(f, "Store Error: {}", msg),
        }
    }
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::NotFound(msg) => HttpResponse::NotFound().json(serde_json::json!({
                "error": "Not Found",
                "message": msg
            })),
            ServiceError::StoreError(msg) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Store Error",
                    "message": msg
                }))
            }
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        ServiceError::StoreError(error.to_string())
    }
}

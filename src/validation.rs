use crate::error::AppError;
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;
use validator::Validate;

/// Player identifiers look like `S3-0042`; ids past 9999 simply grow wider.
pub static PLAYER_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^S3-\d{4,}$").expect("player id pattern is valid"));

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, Vec<String>>,
}

impl ErrorResponse {
    pub fn detail(message: &str) -> Self {
        Self {
            detail: message.to_string(),
            errors: HashMap::new(),
        }
    }

    pub fn with_errors(errors: HashMap<String, Vec<String>>) -> Self {
        Self {
            detail: "Invalid input.".to_string(),
            errors,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    #[instrument]
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut error_map = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let error_messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();

            error_map.insert(field.to_string(), error_messages);
        }

        AppError::InvalidFields(error_map)
    }
}

pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> Result<T, AppError>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_custom(self) -> Result<T, AppError> {
        let inner = self.into_inner();
        inner.validate()?;
        Ok(inner)
    }
}

use axum::{
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::{ActivationResponse, ActivationResult, DenialReason};

/// Client-facing messages. Diagnostic details never appear here.
pub mod msg {
    pub const PURCHASE_CODE_EMPTY: &str = "No Purchase Code entered.";
    pub const DOMAIN_EMPTY: &str = "No domain entered.";
    pub const VALID_SERVER: &str = "Purchase Code valid and registered with server.";
    pub const VALID_NO_SERVER: &str = "License valid but not registered with server.";
    pub const INVALID: &str = "Purchase Code is not valid.";
    pub const INVALID_WRONG_SERVER: &str = "License already registered with different server.";
    pub const OWNERSHIP_UNPROVEN: &str = "Could not verify that this server controls the domain.";
    pub const AUTHORITY_UNREACHABLE: &str =
        "The purchase authority could not be reached. Please try again later.";
    pub const STORAGE_FAILURE: &str = "Could not store the license. Please try again later.";
    pub const MAINTENANCE: &str = "The license server is in maintenance mode.";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid purchase")]
    InvalidPurchase,

    #[error("Purchase authority unreachable: {0}")]
    AuthorityUnreachable(String),

    #[error("Ownership unproven")]
    OwnershipUnproven,

    #[error("Slot occupied")]
    SlotOccupied,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Maintenance mode")]
    Maintenance,
}

impl AppError {
    /// Reason code reported to the client.
    pub fn reason(&self) -> DenialReason {
        match self {
            AppError::InvalidInput(_) => DenialReason::InvalidInput,
            AppError::InvalidPurchase => DenialReason::InvalidPurchase,
            AppError::AuthorityUnreachable(_) => DenialReason::AuthorityUnreachable,
            AppError::OwnershipUnproven => DenialReason::OwnershipUnproven,
            AppError::SlotOccupied => DenialReason::SlotOccupied,
            AppError::Database(_) | AppError::Pool(_) => {
                DenialReason::StorageFailure
            }
            AppError::Maintenance => DenialReason::Maintenance,
        }
    }

    /// Whether the caller may usefully repeat the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.reason(),
            DenialReason::AuthorityUnreachable | DenialReason::StorageFailure
        )
    }

    fn status(&self) -> StatusCode {
        match self.reason() {
            DenialReason::InvalidInput => StatusCode::BAD_REQUEST,
            DenialReason::InvalidPurchase | DenialReason::OwnershipUnproven => {
                StatusCode::FORBIDDEN
            }
            DenialReason::SlotOccupied => StatusCode::CONFLICT,
            DenialReason::AuthorityUnreachable => StatusCode::BAD_GATEWAY,
            DenialReason::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
            DenialReason::Maintenance => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput(detail) => detail.clone(),
            AppError::InvalidPurchase => msg::INVALID.to_string(),
            AppError::OwnershipUnproven => msg::OWNERSHIP_UNPROVEN.to_string(),
            AppError::SlotOccupied => msg::INVALID_WRONG_SERVER.to_string(),
            AppError::AuthorityUnreachable(_) => msg::AUTHORITY_UNREACHABLE.to_string(),
            AppError::Database(_) | AppError::Pool(_) => {
                msg::STORAGE_FAILURE.to_string()
            }
            AppError::Maintenance => msg::MAINTENANCE.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

/// An [`AppError`] rendered as a structured activation denial.
///
/// Activation failures report `access_denied`, revocation failures `revoke_denied`.
#[derive(Debug)]
pub struct Denial {
    pub result: ActivationResult,
    pub error: AppError,
}

impl Denial {
    pub fn revoke(error: AppError) -> Self {
        Self {
            result: ActivationResult::RevokeDenied,
            error,
        }
    }
}

impl From<AppError> for Denial {
    fn from(error: AppError) -> Self {
        Self {
            result: ActivationResult::AccessDenied,
            error,
        }
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        let error = &self.error;

        // Operator-only diagnostics: logged here, never serialized.
        match error {
            AppError::AuthorityUnreachable(detail) => {
                tracing::error!(detail = %detail, "Purchase authority unreachable");
            }
            AppError::Database(e) => tracing::error!("Database error: {}", e),
            AppError::Pool(e) => tracing::error!("Pool error: {}", e),
            _ => {}
        }

        let body = ActivationResponse::denied(self.result, error.reason(), error.client_message());
        (error.status(), axum::Json(body)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        Denial::from(self).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

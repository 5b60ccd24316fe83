use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Stable error codes carried in the wire envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    PaymentCreationFailed,
    PaymentConfirmationFailed,
    PaymentMethodFailed,
    WebhookVerificationFailed,
    OrderNotFound,
    ValidationFailed,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::PaymentCreationFailed => "PAYMENT_CREATION_FAILED",
            ErrorCode::PaymentConfirmationFailed => "PAYMENT_CONFIRMATION_FAILED",
            ErrorCode::PaymentMethodFailed => "PAYMENT_METHOD_FAILED",
            ErrorCode::WebhookVerificationFailed => "WEBHOOK_VERIFICATION_FAILED",
            ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Error taxonomy of the orchestration layer.
///
/// `Gateway` covers both rejections (declined card, expired instrument) and
/// availability problems (timeout, rate limit, open circuit); the
/// `retryable` flag distinguishes them. `OrderNotFound` during a payment
/// update is fatal to the calling flow: it means order data was lost
/// upstream and must never be swallowed.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{message}")]
    Gateway {
        code: ErrorCode,
        message: String,
        decline_code: Option<String>,
        retryable: bool,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Webhook verification failed: {0}")]
    WebhookVerification(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PaymentError::Gateway { code, .. } => *code,
            PaymentError::Validation(_) => ErrorCode::ValidationFailed,
            PaymentError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            PaymentError::WebhookVerification(_) => ErrorCode::WebhookVerificationFailed,
            PaymentError::Internal(_) => ErrorCode::InternalError,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::Gateway { retryable: true, .. } => StatusCode::SERVICE_UNAVAILABLE,
            PaymentError::Gateway { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PaymentError::Validation(_) => StatusCode::BAD_REQUEST,
            PaymentError::WebhookVerification(_) => StatusCode::BAD_REQUEST,
            // Data loss upstream, not a client mistake.
            PaymentError::OrderNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Diagnostic detail, only exposed outside production.
    fn detail(&self) -> Option<String> {
        match self {
            PaymentError::Gateway {
                decline_code: Some(code),
                ..
            } => Some(format!("gateway decline code: {code}")),
            PaymentError::OrderNotFound(id) => Some(format!("order id: {id}")),
            _ => None,
        }
    }

    /// Builds the wire envelope: `{"success": false, "error": {...}}`.
    pub fn into_envelope(self, include_detail: bool) -> Response {
        let status = self.status_code();
        let mut error = json!({
            "code": self.code().as_str(),
            "message": self.to_string(),
        });
        if include_detail {
            if let Some(detail) = self.detail() {
                error["detail"] = json!(detail);
            }
        }
        let body = Json(json!({ "success": false, "error": error }));
        (status, body).into_response()
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        // Safe default: no diagnostic detail unless the handler opts in.
        self.into_envelope(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_maps_to_bad_request() {
        let error = PaymentError::Validation("amount must be positive".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.code(), ErrorCode::ValidationFailed);
    }

    #[test]
    fn rejected_gateway_error_is_unprocessable() {
        let error = PaymentError::Gateway {
            code: ErrorCode::PaymentConfirmationFailed,
            message: "The card was declined.".to_string(),
            decline_code: Some("card_declined".to_string()),
            retryable: false,
        };
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.code(), ErrorCode::PaymentConfirmationFailed);
    }

    #[test]
    fn unavailable_gateway_error_is_retryable() {
        let error = PaymentError::Gateway {
            code: ErrorCode::PaymentCreationFailed,
            message: "gateway request timed out".to_string(),
            decline_code: None,
            retryable: true,
        };
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn order_not_found_is_a_server_error() {
        let error = PaymentError::OrderNotFound("ORD-9".to_string());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn detail_is_omitted_without_opt_in() {
        let error = PaymentError::Gateway {
            code: ErrorCode::PaymentConfirmationFailed,
            message: "The card was declined.".to_string(),
            decline_code: Some("card_declined".to_string()),
            retryable: false,
        };
        let response = error.into_envelope(false);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}

use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use pi_market_engine::{
    traits::{AuthApiError, OrderFlowError, PaymentStoreError, PayoutStoreError, StoreApiError},
    PaymentFlowError,
    PayoutApiError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error. {0}")]
    CouldNotDeserializePayload(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("Illegal state transition. {0}")]
    TransitionError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CouldNotDeserializePayload(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::TransitionError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::AccountNotFound => StatusCode::FORBIDDEN,
                AuthError::NetworkTokenRejected(_) => StatusCode::UNAUTHORIZED,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Access token signature is invalid. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("User account not found.")]
    AccountNotFound,
    #[error("The payment network rejected the access token. {0}")]
    NetworkTokenRejected(String),
}

impl From<AuthApiError> for ServerError {
    fn from(e: AuthApiError) -> Self {
        match e {
            AuthApiError::InvalidNonce => Self::AuthenticationError(AuthError::ValidationError(e.to_string())),
            AuthApiError::UserNotFound(_) => Self::AuthenticationError(AuthError::AccountNotFound),
            AuthApiError::RoleNotAllowed(_) => {
                Self::AuthenticationError(AuthError::InsufficientPermissions(e.to_string()))
            },
            AuthApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}

impl From<PaymentStoreError> for ServerError {
    fn from(e: PaymentStoreError) -> Self {
        match e {
            PaymentStoreError::PaymentNotFound(id) => Self::NoRecordFound(format!("payment {id}")),
            PaymentStoreError::InvalidStatusChange { .. } => Self::TransitionError(e.to_string()),
            PaymentStoreError::DatabaseError(e) => Self::BackendError(e),
        }
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::Unauthorized(m) => Self::InsufficientPermissions(m),
            OrderFlowError::OrderNotFound(id) => Self::NoRecordFound(format!("order {id}")),
            OrderFlowError::InvalidTransition { .. } | OrderFlowError::DriverNotAssigned => {
                Self::TransitionError(e.to_string())
            },
            OrderFlowError::InsufficientStock { .. }
            | OrderFlowError::ProductNotFound(_)
            | OrderFlowError::ChoiceNotFound { .. }
            | OrderFlowError::DiscountNotUsable(_)
            | OrderFlowError::ConversationArchived(_) => Self::ValidationError(e.to_string()),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::PaymentStore(e) => e.into(),
            PaymentFlowError::OrderFlow(e) => e.into(),
        }
    }
}

impl From<PayoutApiError> for ServerError {
    fn from(e: PayoutApiError) -> Self {
        match e {
            PayoutApiError::Unauthorized(m) => Self::InsufficientPermissions(m),
            PayoutApiError::NotRetryable(_) => Self::TransitionError(e.to_string()),
            PayoutApiError::StoreNotFound(id) => Self::NoRecordFound(format!("store {id}")),
            PayoutApiError::Store(PayoutStoreError::PayoutNotFound(id)) => {
                Self::NoRecordFound(format!("payout {id}"))
            },
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<StoreApiError> for ServerError {
    fn from(e: StoreApiError) -> Self {
        match e {
            StoreApiError::Unauthorized(m) => Self::InsufficientPermissions(m),
            StoreApiError::StoreNotFound(id) => Self::NoRecordFound(format!("store {id}")),
            StoreApiError::ProductNotFound(id) => Self::NoRecordFound(format!("product {id}")),
            StoreApiError::DuplicateDiscountCode(_) => Self::ValidationError(e.to_string()),
            StoreApiError::DatabaseError(e) => Self::BackendError(e),
        }
    }
}

impl From<PayoutStoreError> for ServerError {
    fn from(e: PayoutStoreError) -> Self {
        match e {
            PayoutStoreError::PayoutNotFound(id) => Self::NoRecordFound(format!("payout {id}")),
            PayoutStoreError::TaskNotFound(id) => Self::NoRecordFound(format!("payout task {id}")),
            PayoutStoreError::DatabaseError(e) => Self::BackendError(e),
        }
    }
}

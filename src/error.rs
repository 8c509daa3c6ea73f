//! Error types for the mailbox-otp crate.
//!
//! All errors implement [`std::error::Error`] and provide context about what went wrong.
//! Errors are categorized by their retryability - see [`Error::is_retryable`].

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during extraction, token exchange and mailbox polling.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Validation errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid email address format.
    #[error("invalid email format: {email}")]
    InvalidEmailFormat {
        /// The invalid email address.
        email: String,
    },

    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// A required request parameter was missing or empty.
    #[error("missing required parameter: {name}")]
    MissingParameter {
        /// Name of the missing parameter.
        name: &'static str,
    },

    /// Requested extraction count outside the accepted range.
    #[error("invalid extraction quantity {requested}, expected {min}..={max}")]
    InvalidQuota {
        /// The requested count.
        requested: u32,
        /// Smallest accepted count.
        min: u32,
        /// Largest accepted count.
        max: u32,
    },

    /// The SOCKS5 proxy could not be turned into an HTTP client proxy.
    #[error("invalid proxy {proxy}")]
    InvalidProxy {
        /// Masked proxy URL.
        proxy: String,
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    BuildHttpClient {
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Authentication errors (NOT retryable - single attempt by contract)
    // ─────────────────────────────────────────────────────────────────────────
    /// The identity endpoint rejected the refresh token exchange.
    #[error("token exchange failed with status {status}")]
    TokenExchange {
        /// HTTP status returned by the identity endpoint.
        status: u16,
        /// Response body, truncated.
        details: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Mail resource errors
    // ─────────────────────────────────────────────────────────────────────────
    /// The mail resource kept answering "service unavailable" (RETRYABLE).
    #[error("{operation} unavailable after {attempts} attempts")]
    ServiceUnavailable {
        /// The operation that was attempted.
        operation: &'static str,
        /// How many requests were issued.
        attempts: u32,
    },

    /// The mail resource answered with a non-success status (NOT retryable).
    #[error("{operation} failed with status {status}")]
    ResourceStatus {
        /// The operation that failed.
        operation: &'static str,
        /// HTTP status returned by the resource.
        status: u16,
        /// Response body, truncated.
        details: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Vendor errors
    // ─────────────────────────────────────────────────────────────────────────
    /// The vendor inventory answered with a non-success status.
    #[error("vendor {operation} failed with status {status}")]
    VendorStatus {
        /// The vendor query that failed.
        operation: &'static str,
        /// HTTP status returned by the vendor.
        status: u16,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Network / decoding errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Transport failure while talking to a remote endpoint (RETRYABLE).
    #[error("network error during {operation}")]
    Network {
        /// The operation that was attempted.
        operation: &'static str,
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// A response body could not be decoded.
    #[error("failed to decode {operation} response")]
    Decode {
        /// The operation whose response was malformed.
        operation: &'static str,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Session errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// An operation needed an active credential but none was set.
    #[error("no active credential")]
    NoActiveCredential,

    /// The message id is not part of the current message list.
    #[error("message {id} not found")]
    MessageNotFound {
        /// The requested message id.
        id: String,
    },
}

impl Error {
    /// Returns `true` if this error represents a transient failure that might succeed on retry.
    ///
    /// Use this to implement retry logic:
    ///
    /// ```ignore
    /// if error.is_retryable() {
    ///     // Backoff and retry
    /// } else {
    ///     // Fail permanently
    /// }
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ServiceUnavailable { .. } | Error::Network { .. } => true,

            // Token exchange is single-attempt: the caller decides on the next tick.
            Error::InvalidEmailFormat { .. }
            | Error::InvalidConfig { .. }
            | Error::MissingParameter { .. }
            | Error::InvalidQuota { .. }
            | Error::InvalidProxy { .. }
            | Error::BuildHttpClient { .. }
            | Error::TokenExchange { .. }
            | Error::ResourceStatus { .. }
            | Error::VendorStatus { .. }
            | Error::Decode { .. }
            | Error::NoActiveCredential
            | Error::MessageNotFound { .. } => false,
        }
    }

    /// Returns the error category for metrics/logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidEmailFormat { .. }
            | Error::InvalidConfig { .. }
            | Error::MissingParameter { .. }
            | Error::InvalidQuota { .. }
            | Error::InvalidProxy { .. }
            | Error::BuildHttpClient { .. } => ErrorCategory::Validation,

            Error::TokenExchange { .. } => ErrorCategory::Auth,

            Error::ServiceUnavailable { .. }
            | Error::ResourceStatus { .. }
            | Error::VendorStatus { .. } => ErrorCategory::Resource,

            Error::Network { .. } => ErrorCategory::Network,

            Error::Decode { .. } => ErrorCategory::Decode,

            Error::NoActiveCredential | Error::MessageNotFound { .. } => ErrorCategory::NotFound,
        }
    }

    pub(crate) fn network(operation: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Error::Network { operation, source }
    }

    pub(crate) fn decode(operation: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Error::Decode { operation, source }
    }
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or invalid parameters and configuration.
    Validation,
    /// Refresh token exchange failures.
    Auth,
    /// Non-success answers from the mail resource or vendor.
    Resource,
    /// Transport failures.
    Network,
    /// Malformed response bodies.
    Decode,
    /// Missing session state.
    NotFound,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Auth => write!(f, "auth"),
            ErrorCategory::Resource => write!(f, "resource"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Decode => write!(f, "decode"),
            ErrorCategory::NotFound => write!(f, "not_found"),
        }
    }
}

/// Shortens a response body for inclusion in an error.
pub(crate) fn truncate_details(body: &str) -> String {
    const MAX_DETAILS_LEN: usize = 200;

    match body.char_indices().nth(MAX_DETAILS_LEN) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

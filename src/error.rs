//! Error taxonomy shared by every layer of the client
//!
//! Callers distinguish failures by matching on [`Error`] variants or on
//! [`Error::kind`]; the rendered message is for humans only.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse discriminant of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    InvalidArgument,
    Authentication,
    Authorization,
    NotFound,
    Api,
    Timeout,
    Http,
    Decode,
    Io,
    SizeLimit,
    Aggregation,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The configuration value handed to the client is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The identity provider rejected the client-credentials exchange.
    #[error("authentication failed{}: {message}", status_suffix(.status))]
    Authentication {
        status: Option<u16>,
        message: String,
    },

    /// HTTP 401/403 on a resource call.
    #[error("access denied (HTTP {status}) for {request}: {body}")]
    Authorization {
        status: u16,
        request: String,
        code: Option<String>,
        body: String,
    },

    /// HTTP 404, or a lookup that matched nothing.
    #[error("not found: {resource}")]
    NotFound {
        resource: String,
        status: Option<u16>,
        code: Option<String>,
        body: String,
    },

    /// Any other non-2xx response. The payload is kept verbatim.
    #[error("HTTP {status} for {request}: {body}")]
    Api {
        status: u16,
        request: String,
        code: Option<String>,
        body: String,
    },

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("{context}")]
    Http {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode {context}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Raised locally, before any request is sent.
    #[error(
        "{} is {size} bytes, above the {limit} byte simple-upload limit (resumable upload is not supported)",
        .path.display()
    )]
    SizeLimit { path: PathBuf, size: u64, limit: u64 },

    #[error("permission aggregation failed: user '{email}' could not be resolved")]
    UserNotResolved {
        email: String,
        #[source]
        source: Box<Error>,
    },

    #[error("permission aggregation failed: membership of {group} could not be read")]
    MembershipUnavailable {
        group: String,
        #[source]
        source: Box<Error>,
    },

    #[error("permission aggregation failed: {group} nests groups deeper than {max_depth} levels")]
    GroupDepthExceeded { group: String, max_depth: usize },

    /// A group principal whose claim names neither a directory group nor a
    /// known tenant-wide audience.
    #[error("permission aggregation failed: cannot resolve claim '{claim}' of {principal}")]
    UnsupportedClaim { principal: String, claim: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::Authorization { .. } => ErrorKind::Authorization,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Api { .. } => ErrorKind::Api,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Http { .. } => ErrorKind::Http,
            Error::Decode { .. } => ErrorKind::Decode,
            Error::Io { .. } => ErrorKind::Io,
            Error::SizeLimit { .. } => ErrorKind::SizeLimit,
            Error::UserNotResolved { .. }
            | Error::MembershipUnavailable { .. }
            | Error::GroupDepthExceeded { .. }
            | Error::UnsupportedClaim { .. } => ErrorKind::Aggregation,
        }
    }

    /// HTTP status reported by the remote side, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Authentication { status, .. } | Error::NotFound { status, .. } => *status,
            Error::Authorization { status, .. } | Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Error code from the remote payload (`error.code` / `odata.error.code`).
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            Error::Authorization { code, .. }
            | Error::NotFound { code, .. }
            | Error::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Relabel the resource of a `NotFound`; every other error passes through.
    pub fn not_found_as(self, resource: impl Into<String>) -> Self {
        match self {
            Error::NotFound {
                status, code, body, ..
            } => Error::NotFound {
                resource: resource.into(),
                status,
                code,
                body,
            },
            other => other,
        }
    }

    pub(crate) fn not_found(resource: impl Into<String>) -> Self {
        Error::NotFound {
            resource: resource.into(),
            status: None,
            code: None,
            body: String::new(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn from_reqwest(source: reqwest::Error, context: impl Into<String>) -> Self {
        let context = context.into();
        if source.is_timeout() {
            Error::Timeout(context)
        } else {
            Error::Http { context, source }
        }
    }
}

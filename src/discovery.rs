//! Model discovery.
//!
//! Discovery asks each known provider which models it currently offers. The
//! per-provider protocol lives behind the [`DiscoveryStrategy`] trait;
//! strategies are registered by provider name in a
//! [`registry::StrategyRegistry`], so wiring a new provider is a
//! registration, not a new match arm.
//!
//! The [`orchestrator::DiscoveryOrchestrator`] fans out over strategies with
//! isolated failure domains: a provider that errors yields an empty list and
//! a warning, never an aborted sweep. Results are cached per provider with a
//! TTL.
//!
//! ## Error handling
//!
//! Strategies return [`Error`], a category ([`ErrorKind`]) plus an optional
//! source. Errors never leave the orchestrator; they are logged at the
//! per-provider boundary and converted to "no models".

pub(crate) mod openai_compat;
pub(crate) mod orchestrator;
pub(crate) mod registry;
pub(crate) mod static_list;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;

use crate::catalog::ModelDescriptor;
use crate::credentials::CredentialResolver;

pub(crate) use orchestrator::DiscoveryOrchestrator;
pub(crate) use registry::StrategyRegistry;

/// General categories of discovery failures.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ErrorKind {
    /// Failed to connect to the provider's API service.
    Connection,
    /// A request timed out.
    TimedOut,
    /// No credential was available, or the provider rejected it.
    Authentication,
    /// A rate limit was reached or a quota was exceeded.
    ExcessUsage,
    /// The listing endpoint was not found. Usually a wrong API base.
    NotFound,
    /// The request was malformed. HTTP 400s other than the above.
    BadRequest,
    /// The provider encountered an error. HTTP 500s.
    InternalError,
    /// The response could not be deserialized or violated assumptions.
    UnexpectedResponse,
    /// Anything that fits no other category.
    UnspecifiedError,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub(crate) fn from_kind(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    pub(crate) fn from_source(kind: ErrorKind, source: Box<dyn StdError + Send + Sync>) -> Error {
        Error {
            kind,
            source: Some(source),
        }
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Connection => "failed to connect to the API service",
            ErrorKind::TimedOut => "request timed out",
            ErrorKind::Authentication => "authentication failed or not provided",
            ErrorKind::ExcessUsage => "rate limit exceeded or quota crossed",
            ErrorKind::NotFound => "the listing endpoint was not found",
            ErrorKind::BadRequest => "the request was bad or malformed",
            ErrorKind::InternalError => "the provider encountered an internal error",
            ErrorKind::UnexpectedResponse => "API response was unexpected or malformed",
            ErrorKind::UnspecifiedError => "an unspecified error occurred",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

/// One provider's model-listing protocol.
///
/// A strategy consults the [`CredentialResolver`] for whatever secret it
/// needs; it must not cache credentials itself. The descriptors it returns
/// must carry the strategy's own provider name.
#[async_trait]
pub(crate) trait DiscoveryStrategy: Send + Sync {
    /// Canonical provider name. Matching is case-insensitive.
    fn provider_name(&self) -> &str;

    async fn discover(
        &self,
        resolver: &CredentialResolver,
    ) -> Result<Vec<ModelDescriptor>, Error>;
}

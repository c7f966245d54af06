use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{DiscoveryStrategy, Error, ErrorKind};
use crate::catalog::ModelDescriptor;
use crate::credentials::CredentialResolver;

/// Model listing over the OpenAI-compatible `GET {base}/models` endpoint.
///
/// Most hosted providers (OpenAI, OpenRouter, Groq, Mistral, ...) expose
/// this shape, so one strategy type covers them all; only the provider name
/// and API base differ per registration.
pub(crate) struct OpenAiCompatStrategy {
    provider: String,
    api_base: Url,
    client: Client,
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum ApiError {
    /// The API base is not a URL that can be used in a network request
    #[error("invalid api base")]
    InvalidApiBase(
        #[from]
        #[source]
        url::ParseError,
    ),

    /// Some issue with the request itself
    #[error("request failed")]
    Request(
        #[from]
        #[source]
        reqwest::Error,
    ),

    /// The endpoint answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },
}

impl From<ApiError> for Error {
    fn from(value: ApiError) -> Self {
        let kind = match &value {
            ApiError::InvalidApiBase(_) => ErrorKind::Connection,
            ApiError::Request(err) => {
                if err.is_timeout() {
                    ErrorKind::TimedOut
                } else if err.is_connect() {
                    ErrorKind::Connection
                } else if err.is_decode() {
                    ErrorKind::UnexpectedResponse
                } else {
                    ErrorKind::UnspecifiedError
                }
            }
            ApiError::Status { status, .. } => kind_from_status(*status),
        };

        Error::from_source(kind, Box::new(value))
    }
}

fn kind_from_status(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        401 | 403 => ErrorKind::Authentication,
        404 => ErrorKind::NotFound,
        429 => ErrorKind::ExcessUsage,
        400..=499 => ErrorKind::BadRequest,
        500..=599 => ErrorKind::InternalError,
        _ => ErrorKind::UnspecifiedError,
    }
}

/* Listing payload. Providers extend it freely; unknown fields are ignored. */

#[derive(Deserialize, Debug)]
struct ModelsPayload {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize, Debug)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    // OpenRouter calls it "context_length", others "context_window".
    #[serde(default, alias = "context_window")]
    context_length: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
struct ApiErrorPayload {
    #[serde(default)]
    message: String,
}

impl From<ModelEntry> for ModelDescriptor {
    fn from(entry: ModelEntry) -> Self {
        let mut descriptor = ModelDescriptor::new("", &entry.id);

        if let Some(name) = entry.name {
            descriptor.display_name = name;
        }

        if let Some(context) = entry.context_length {
            descriptor.max_context = context.min(u32::MAX as u64) as u32;
        }

        descriptor.capabilities.streaming = true;

        descriptor
    }
}

impl OpenAiCompatStrategy {
    pub(crate) fn new(provider: &str, api_base: &str) -> Result<OpenAiCompatStrategy, ApiError> {
        Ok(OpenAiCompatStrategy {
            provider: provider.to_string(),
            api_base: Url::parse(api_base)?,
            client: Client::new(),
        })
    }

    fn models_endpoint(&self) -> String {
        format!("{}/models", self.api_base.as_str().trim_end_matches('/'))
    }

    async fn list(&self, secret: &str) -> Result<Vec<ModelEntry>, ApiError> {
        let response = self
            .client
            .get(self.models_endpoint())
            .bearer_auth(secret)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let payload: ApiErrorPayload = response.json().await.unwrap_or_default();

            return Err(ApiError::Status {
                status,
                message: payload.message,
            });
        }

        let payload: ModelsPayload = response.json().await?;

        Ok(payload.data)
    }
}

#[async_trait]
impl DiscoveryStrategy for OpenAiCompatStrategy {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn discover(
        &self,
        resolver: &CredentialResolver,
    ) -> Result<Vec<ModelDescriptor>, Error> {
        let credential = resolver
            .resolve(&self.provider, None)
            .await
            .ok_or_else(|| Error::from_kind(ErrorKind::Authentication))?;

        let entries = self.list(&credential.secret).await?;

        let models = entries
            .into_iter()
            .map(|entry| {
                let mut descriptor: ModelDescriptor = entry.into();

                descriptor.provider = self.provider.clone();

                descriptor
            })
            .collect();

        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_map_onto_descriptors() {
        let entry = ModelEntry {
            id: "llama3-70b".to_string(),
            name: Some("LLaMA 3 70B".to_string()),
            context_length: Some(131072),
        };

        let descriptor: ModelDescriptor = entry.into();

        assert_eq!(descriptor.model, "llama3-70b");
        assert_eq!(descriptor.display_name, "LLaMA 3 70B");
        assert_eq!(descriptor.max_context, 131072);
        assert!(descriptor.capabilities.streaming);
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let strategy = OpenAiCompatStrategy::new("groq", "https://api.groq.com/openai/v1/").unwrap();

        assert_eq!(
            strategy.models_endpoint(),
            "https://api.groq.com/openai/v1/models"
        );
    }

    #[test]
    fn invalid_api_base_is_rejected() {
        assert!(OpenAiCompatStrategy::new("groq", "not a url").is_err());
    }

    #[test]
    fn statuses_map_onto_error_kinds() {
        assert!(matches!(
            kind_from_status(StatusCode::UNAUTHORIZED),
            ErrorKind::Authentication
        ));
        assert!(matches!(
            kind_from_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorKind::ExcessUsage
        ));
        assert!(matches!(
            kind_from_status(StatusCode::BAD_GATEWAY),
            ErrorKind::InternalError
        ));
    }

    #[test]
    fn listing_payload_accepts_both_context_spellings() {
        let raw = r#"{"data":[
            {"id":"a","context_length":1000},
            {"id":"b","context_window":2000},
            {"id":"c"}
        ]}"#;

        let payload: ModelsPayload = serde_json::from_str(raw).unwrap();

        assert_eq!(payload.data[0].context_length, Some(1000));
        assert_eq!(payload.data[1].context_length, Some(2000));
        assert_eq!(payload.data[2].context_length, None);
    }
}

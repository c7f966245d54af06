use async_trait::async_trait;

use super::{DiscoveryStrategy, Error};
use crate::catalog::ModelDescriptor;
use crate::credentials::CredentialResolver;

/// A strategy with a fixed model list.
///
/// Some providers have no listing endpoint, so their lineup is shipped with
/// the client and updated on release. Also the workhorse of the test suite.
pub(crate) struct StaticStrategy {
    provider: String,
    models: Vec<ModelDescriptor>,
}

impl StaticStrategy {
    pub(crate) fn new(provider: &str, models: Vec<ModelDescriptor>) -> StaticStrategy {
        StaticStrategy {
            provider: provider.to_string(),
            models,
        }
    }
}

#[async_trait]
impl DiscoveryStrategy for StaticStrategy {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn discover(
        &self,
        _resolver: &CredentialResolver,
    ) -> Result<Vec<ModelDescriptor>, Error> {
        Ok(self.models.clone())
    }
}

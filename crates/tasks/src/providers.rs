// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use purge_data_model::CodeRepository;

/// An integration with a version-control provider, notified when one of its
/// repositories is deleted
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Tell the provider that the repository is gone, so that it can remove
    /// webhooks and the like
    ///
    /// # Errors
    ///
    /// Returns an error if the provider could not be reached. This is logged
    /// and otherwise ignored.
    async fn deregister(&self, repository: &CodeRepository) -> anyhow::Result<()>;
}

/// The known [`RepositoryProvider`]s, by name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn RepositoryProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under a name, replacing any previous one
    #[must_use]
    pub fn register(
        mut self,
        name: impl Into<String>,
        provider: impl RepositoryProvider + 'static,
    ) -> Self {
        self.providers.insert(name.into(), Arc::new(provider));
        self
    }

    /// Get a provider by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn RepositoryProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    /// Deregister a repository from its provider, on a best-effort basis
    #[tracing::instrument(
        name = "provider.deregister",
        skip_all,
        fields(
            repository.id = %repository.id,
            repository.provider = repository.provider.as_deref(),
        ),
    )]
    pub async fn deregister(&self, repository: &CodeRepository) {
        let Some(name) = repository.provider.as_deref() else {
            tracing::warn!("Repository has no provider, skipping deregistration");
            return;
        };

        let Some(provider) = self.get(name) else {
            tracing::warn!("Unknown repository provider, skipping deregistration");
            return;
        };

        match provider.deregister(repository).await {
            Ok(()) => tracing::info!("Deregistered repository from its provider"),
            Err(e) => tracing::error!(
                error = &*e as &dyn std::error::Error,
                "Failed to deregister repository from its provider"
            ),
        }
    }
}

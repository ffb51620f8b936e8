// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod database;
mod deletions;

pub use self::{database::DatabaseConfig, deletions::DeletionsConfig};
use crate::util::ConfigurationSection;

/// Application configuration root
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct RootConfig {
    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Configuration of the deletion scheduler and reaper
    #[serde(default)]
    pub deletions: DeletionsConfig,
}

impl ConfigurationSection for RootConfig {
    fn validate(
        &self,
        figment: &figment::Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        self.database.validate(figment)?;
        self.deletions.validate(figment)?;

        Ok(())
    }
}

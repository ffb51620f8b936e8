// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{ConfigurationSection, util::error_on_field};

const PATH: &str = "deletions";

fn default_scheduler_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_reaper_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_staleness_threshold() -> chrono::Duration {
    chrono::Duration::hours(6)
}

fn default_delay() -> chrono::Duration {
    chrono::Duration::days(30)
}

fn default_batch_size() -> usize {
    100
}

/// Configuration of the deletion scheduler and reaper
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeletionsConfig {
    /// Seconds between two scheduler passes. Defaults to one minute.
    #[schemars(with = "u64", range(min = 1))]
    #[serde(default = "default_scheduler_interval")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub scheduler_interval: Duration,

    /// Seconds between two reaper passes. Defaults to 15 minutes.
    #[schemars(with = "u64", range(min = 1))]
    #[serde(default = "default_reaper_interval")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub reaper_interval: Duration,

    /// How long, in seconds, a job may stay in progress before the reaper
    /// hands it back to the scheduler. Defaults to 6 hours.
    ///
    /// This has to be longer than the slowest cascade, or a job could run
    /// twice concurrently.
    #[schemars(with = "u64", range(min = 60))]
    #[serde(default = "default_staleness_threshold")]
    #[serde_as(as = "serde_with::DurationSeconds<i64>")]
    pub staleness_threshold: chrono::Duration,

    /// Delay, in seconds, applied to new deletions when none is given.
    /// Defaults to 30 days.
    #[schemars(with = "u64")]
    #[serde(default = "default_delay")]
    #[serde_as(as = "serde_with::DurationSeconds<i64>")]
    pub default_delay: chrono::Duration,

    /// Maximum number of jobs claimed by a single scheduler pass
    #[schemars(range(min = 1))]
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for DeletionsConfig {
    fn default() -> Self {
        Self {
            scheduler_interval: default_scheduler_interval(),
            reaper_interval: default_reaper_interval(),
            staleness_threshold: default_staleness_threshold(),
            default_delay: default_delay(),
            batch_size: default_batch_size(),
        }
    }
}

impl ConfigurationSection for DeletionsConfig {
    const PATH: Option<&'static str> = Some(PATH);

    fn validate(
        &self,
        figment: &figment::Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        let error = |field, message: &str| error_on_field(figment, PATH, field, message.to_owned());

        if self.scheduler_interval.is_zero() {
            return Err(error("scheduler_interval", "must not be zero").into());
        }

        if self.reaper_interval.is_zero() {
            return Err(error("reaper_interval", "must not be zero").into());
        }

        if self.staleness_threshold < chrono::Duration::minutes(1) {
            return Err(error("staleness_threshold", "must be at least one minute").into());
        }

        if self.default_delay < chrono::Duration::zero() {
            return Err(error("default_delay", "must not be negative").into());
        }

        if self.batch_size == 0 {
            return Err(error("batch_size", "must not be zero").into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use figment::{
        Figment, Jail,
        providers::{Format, Yaml},
    };

    use super::*;
    use crate::{ConfigurationSectionExt, RootConfig, load};

    #[test]
    fn load_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "database: {}")?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let config = DeletionsConfig::extract_or_default(&figment).unwrap();

            assert_eq!(config, DeletionsConfig::default());
            assert_eq!(config.scheduler_interval, Duration::from_secs(60));
            assert_eq!(config.staleness_threshold, chrono::Duration::hours(6));
            assert_eq!(config.batch_size, 100);

            Ok(())
        });
    }

    #[test]
    fn load_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    deletions:
                      scheduler_interval: 5
                      staleness_threshold: 3600
                      default_delay: 0
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let config = DeletionsConfig::extract(&figment).unwrap();

            assert_eq!(config.scheduler_interval, Duration::from_secs(5));
            assert_eq!(config.reaper_interval, Duration::from_secs(15 * 60));
            assert_eq!(config.staleness_threshold, chrono::Duration::hours(1));
            assert_eq!(config.default_delay, chrono::Duration::zero());

            Ok(())
        });
    }

    #[test]
    fn environment_overrides_files() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    deletions:
                      batch_size: 50
                ",
            )?;
            jail.set_env("PURGE_DELETIONS__BATCH_SIZE", "10");

            let config = RootConfig::extract(&load(&["config.yaml"])).unwrap();
            assert_eq!(config.deletions.batch_size, 10);
            assert_eq!(config.database, crate::DatabaseConfig::default());

            Ok(())
        });
    }

    #[test]
    fn reject_invalid_values() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "short.yaml",
                r"
                    deletions:
                      staleness_threshold: 30
                ",
            )?;
            jail.create_file(
                "zero.yaml",
                r"
                    deletions:
                      reaper_interval: 0
                ",
            )?;

            let error = RootConfig::extract(&load(&["short.yaml"])).unwrap_err();
            assert!(error.to_string().contains("at least one minute"));

            let error = RootConfig::extract(&load(&["zero.yaml"])).unwrap_err();
            assert!(error.to_string().contains("must not be zero"));

            Ok(())
        });
    }
}

// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::de::DeserializeOwned;

/// Prefix of the environment variables overriding the configuration files
pub const ENV_PREFIX: &str = "PURGE_";

/// A part of the configuration, loaded from a [`Figment`]
pub trait ConfigurationSection: Sized + DeserializeOwned {
    /// Where this section lives relative to the root. `None` means the root
    /// itself.
    const PATH: Option<&'static str> = None;

    /// Validate the configuration section
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    fn validate(
        &self,
        _figment: &Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        Ok(())
    }

    /// Extract and validate the section
    ///
    /// # Errors
    ///
    /// Returns an error if the section is missing or invalid
    fn extract(
        figment: &Figment,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync + 'static>> {
        let this: Self = match Self::PATH {
            Some(path) => figment.extract_inner(path)?,
            None => figment.extract()?,
        };

        this.validate(figment)?;
        Ok(this)
    }
}

/// Extension of [`ConfigurationSection`] for sections which have a sensible
/// default
pub trait ConfigurationSectionExt: ConfigurationSection + Default {
    /// Extract the section, or fall back to its default value when it is
    /// absent
    ///
    /// # Errors
    ///
    /// Returns an error if the section is present but invalid
    fn extract_or_default(
        figment: &Figment,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync + 'static>> {
        let this: Self = match Self::PATH {
            Some(path) if !figment.contains(path) => return Ok(Self::default()),
            Some(path) => figment.extract_inner(path)?,
            None => figment.extract()?,
        };

        this.validate(figment)?;
        Ok(this)
    }
}

impl<T: ConfigurationSection + Default> ConfigurationSectionExt for T {}

/// Build the [`Figment`] from a list of YAML files, later files taking
/// precedence, and the `PURGE_` environment variables on top
///
/// Nested keys are separated by double underscores in the environment, like
/// `PURGE_DELETIONS__BATCH_SIZE`.
#[must_use]
pub fn load<P: AsRef<std::path::Path>>(files: &[P]) -> Figment {
    files
        .iter()
        .fold(Figment::new(), |figment, file| {
            figment.merge(Yaml::file(file.as_ref()))
        })
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Annotate an error with the location of a field of a section
pub(crate) fn error_on_field(
    figment: &Figment,
    section: &'static str,
    field: &'static str,
    message: String,
) -> figment::Error {
    let mut error = figment::Error::from(message);
    error.metadata = figment.find_metadata(section).cloned();
    error.profile = Some(figment::Profile::Default);
    error.path = vec![section.to_owned(), field.to_owned()];
    error
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Configuration files. Everything has a default, so an empty file is a valid
//! configuration.

mod error;

pub use error::ConfigError;

use std::{fs::File, io::Read, path::Path, str::FromStr};

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    apply::{ApplyDirection, ApplyOptions},
    fit::{ContinuumFitter, FitConfig},
    transform::{ChannelTransform, TransformConfig},
};

#[derive(Debug, Display, EnumIter, EnumString)]
enum ConfigFileType {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

lazy_static::lazy_static! {
    pub static ref CONFIG_FILE_TYPES_COMMA_SEPARATED: String = ConfigFileType::iter().join(", ");
}

/// How calibration is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApplyConfig {
    pub direction: ApplyDirection,

    pub update_weights: bool,

    pub via_mueller: bool,
}

impl ApplyConfig {
    pub fn options(&self) -> ApplyOptions {
        ApplyOptions {
            update_weights: self.update_weights,
            via_mueller: self.via_mueller,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViscalConfig {
    pub transform: TransformConfig,

    pub fit: FitConfig,

    pub apply: ApplyConfig,
}

impl ViscalConfig {
    /// Read a configuration from a toml or json file, depending on the file's
    /// extension.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<ViscalConfig, ConfigError> {
        let file = file.as_ref();
        debug!("Attempting to parse config file {}", file.display());

        let file_type = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ConfigFileType::from_str(&e).ok());
        let mut contents = String::new();
        match file_type {
            Some(ConfigFileType::Toml) => {
                debug!("Parsing toml file...");
                File::open(file)?.read_to_string(&mut contents)?;
                toml::from_str(&contents).map_err(|err| ConfigError::Toml {
                    file: file.to_path_buf(),
                    err: err.to_string(),
                })
            }

            Some(ConfigFileType::Json) => {
                debug!("Parsing json file...");
                File::open(file)?.read_to_string(&mut contents)?;
                serde_json::from_str(&contents).map_err(|err| ConfigError::Json {
                    file: file.to_path_buf(),
                    err: err.to_string(),
                })
            }

            None => Err(ConfigError::UnknownExtension {
                file: file.to_path_buf(),
                valid: CONFIG_FILE_TYPES_COMMA_SEPARATED.clone(),
            }),
        }
    }

    pub fn channel_transform(&self) -> Result<ChannelTransform, ConfigError> {
        Ok(ChannelTransform::from_config(&self.transform)?)
    }

    pub fn continuum_fitter(&self) -> Result<ContinuumFitter, ConfigError> {
        Ok(ContinuumFitter::new(&self.fit)?)
    }

    /// Check that everything in the configuration can be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.channel_transform()?;
        self.continuum_fitter()?;
        Ok(())
    }
}

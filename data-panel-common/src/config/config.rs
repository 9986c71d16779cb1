use std::fs::File;
use std::io::Read;

use serde::Deserialize;
use serde::Serialize;

use crate::common::{Error, Result};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct MeshConfig {
    app: AppConfig,
    props: ConfigurationProperties,
}

impl MeshConfig {
    pub fn new(app: AppConfig, props: ConfigurationProperties) -> Self {
        MeshConfig { app, props }
    }

    pub fn from_str(config_str: &str) -> Result<Self> {
        Ok(toml::from_str(config_str)?)
    }

    pub fn from_file(config_file: &str) -> Result<Self> {
        let mut file = File::open(config_file).map_err(|source| Error::Io {
            path: config_file.to_string(),
            source,
        })?;
        let mut config_str = String::new();
        file.read_to_string(&mut config_str).map_err(|source| Error::Io {
            path: config_file.to_string(),
            source,
        })?;
        Self::from_str(&*config_str)
    }

    pub fn get_app(&self) -> &AppConfig {
        &self.app
    }

    pub fn get_props(&self) -> &ConfigurationProperties {
        &self.props
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    name: String,
    version: String,
    /// Filter handed to `env_logger`, e.g. `info` or `data_panel_kernel=debug`.
    log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            name: "Database Mesh".to_string(),
            version: "0.1.0".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_version(&self) -> &str {
        &self.version
    }

    pub fn get_log_level(&self) -> &str {
        &self.log_level
    }
}

/**
 * Properties that tune the kernel behaviour.
 */
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ConfigurationProperties {
    /// Log logic SQL and every actual SQL after rewriting.
    sql_show: bool,
    /// Omit parameters from the SQL log.
    sql_simple: bool,
}

impl ConfigurationProperties {
    pub fn new(sql_show: bool, sql_simple: bool) -> Self {
        ConfigurationProperties { sql_show, sql_simple }
    }

    pub fn is_sql_show(&self) -> bool {
        self.sql_show
    }

    pub fn is_sql_simple(&self) -> bool {
        self.sql_simple
    }
}

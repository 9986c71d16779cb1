//! Rule configuration as it is written in the YAML rule file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RulesConfiguration {
    /// Storage units of the logic database.
    pub data_sources: Vec<String>,
    pub sharding: Option<ShardingRuleConfiguration>,
    pub single: Option<SingleRuleConfiguration>,
    pub readwrite_splitting: Option<ReadwriteSplittingRuleConfiguration>,
    pub shadow: Option<ShadowRuleConfiguration>,
    pub encrypt: Option<EncryptRuleConfiguration>,
}

impl RulesConfiguration {
    pub fn from_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| KernelError::invalid_rule(e.to_string()))
    }

    pub fn from_file(rule_file: &str) -> Result<Self> {
        let mut file = File::open(rule_file).map_err(|e| KernelError::invalid_rule(format!("can not open `{}`: {}", rule_file, e)))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| KernelError::invalid_rule(format!("can not read `{}`: {}", rule_file, e)))?;
        Self::from_str(&contents)
    }
}

/// `type` + `props` of any pluggable algorithm.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AlgorithmConfiguration {
    #[serde(rename = "type")]
    pub algorithm_type: String,
    #[serde(default)]
    pub props: BTreeMap<String, serde_yaml::Value>,
}

impl AlgorithmConfiguration {
    pub fn new(algorithm_type: &str) -> Self {
        AlgorithmConfiguration {
            algorithm_type: algorithm_type.to_string(),
            props: BTreeMap::new(),
        }
    }

    pub fn with_prop<V: Into<serde_yaml::Value>>(mut self, key: &str, value: V) -> Self {
        self.props.insert(key.to_string(), value.into());
        self
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.props.get(key)? {
            serde_yaml::Value::String(v) => Some(v.clone()),
            serde_yaml::Value::Number(v) => Some(v.to_string()),
            serde_yaml::Value::Bool(v) => Some(v.to_string()),
            _ => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.props.get(key)? {
            serde_yaml::Value::Number(v) => v.as_u64(),
            serde_yaml::Value::String(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    /// A list prop, written either as a YAML sequence or as `"10,20,30"`.
    pub fn get_i64_list(&self, key: &str) -> Option<Vec<i64>> {
        match self.props.get(key)? {
            serde_yaml::Value::Sequence(values) => values.iter().map(|each| each.as_i64()).collect(),
            serde_yaml::Value::String(v) => v.split(',').map(|each| each.trim().parse().ok()).collect(),
            serde_yaml::Value::Number(v) => v.as_i64().map(|each| vec![each]),
            _ => None,
        }
    }

    pub fn require_string(&self, algorithm: &str, key: &str) -> Result<String> {
        self.get_string(key)
            .ok_or_else(|| KernelError::invalid_rule(format!("`{}` property is required by algorithm `{}`", key, algorithm)))
    }

    pub fn require_u64(&self, algorithm: &str, key: &str) -> Result<u64> {
        self.get_u64(key)
            .ok_or_else(|| KernelError::invalid_rule(format!("`{}` property is required by algorithm `{}`", key, algorithm)))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ShardingStrategyConfiguration {
    pub sharding_column: String,
    pub algorithm: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ShardingTableConfiguration {
    pub actual_data_nodes: Vec<String>,
    pub database_strategy: Option<ShardingStrategyConfiguration>,
    pub table_strategy: Option<ShardingStrategyConfiguration>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ShardingRuleConfiguration {
    pub tables: BTreeMap<String, ShardingTableConfiguration>,
    pub binding_tables: Vec<Vec<String>>,
    pub broadcast_tables: Vec<String>,
    pub default_database_strategy: Option<ShardingStrategyConfiguration>,
    pub default_table_strategy: Option<ShardingStrategyConfiguration>,
    pub algorithms: BTreeMap<String, AlgorithmConfiguration>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SingleRuleConfiguration {
    pub default_data_source: Option<String>,
    /// Table to the data sources it exists in.
    pub tables: BTreeMap<String, Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ReadwriteSplittingDataSourceConfiguration {
    pub write_data_source: String,
    pub read_data_sources: Vec<String>,
    pub load_balancer: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ReadwriteSplittingRuleConfiguration {
    pub data_sources: BTreeMap<String, ReadwriteSplittingDataSourceConfiguration>,
    pub load_balancers: BTreeMap<String, AlgorithmConfiguration>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ShadowDataSourceConfiguration {
    pub production_data_source: String,
    pub shadow_data_source: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ShadowTableConfiguration {
    pub shadow_algorithms: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ShadowRuleConfiguration {
    pub data_sources: BTreeMap<String, ShadowDataSourceConfiguration>,
    pub tables: BTreeMap<String, ShadowTableConfiguration>,
    pub default_shadow_algorithm: Option<String>,
    pub algorithms: BTreeMap<String, AlgorithmConfiguration>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct EncryptColumnConfiguration {
    pub cipher: String,
    pub assisted_query: Option<String>,
    pub like_query: Option<String>,
    pub plain: Option<String>,
    pub encryptor: String,
    pub assisted_query_encryptor: Option<String>,
    pub like_query_encryptor: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct EncryptTableConfiguration {
    /// Logic column name to its storage columns.
    pub columns: BTreeMap<String, EncryptColumnConfiguration>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct EncryptRuleConfiguration {
    pub tables: BTreeMap<String, EncryptTableConfiguration>,
    pub encryptors: BTreeMap<String, AlgorithmConfiguration>,
}

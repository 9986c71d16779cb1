// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use log::debug;

use crate::error::Result;
use crate::rule::config::RulesConfiguration;
use crate::rule::encrypt::EncryptRule;
use crate::rule::readwrite::ReadwriteSplittingRule;
use crate::rule::shadow::ShadowRule;
use crate::rule::sharding::ShardingRule;
use crate::rule::single::SingleRule;

pub mod algorithm;
pub mod config;
pub mod encrypt;
pub mod readwrite;
pub mod shadow;
pub mod sharding;
pub mod single;

/// Every kind of rule the kernel knows, read-only once built.
#[derive(Debug, Clone)]
pub enum Rule {
    Sharding(ShardingRule),
    Single(SingleRule),
    ReadwriteSplitting(ReadwriteSplittingRule),
    Shadow(ShadowRule),
    Encrypt(EncryptRule),
}

impl Rule {
    /// Lower runs first. Rules that resolve data nodes precede rules that decorate them.
    pub fn get_order(&self) -> i32 {
        match self {
            Rule::Sharding(_) => 0,
            Rule::Single(_) => 5,
            Rule::ReadwriteSplitting(_) => 10,
            Rule::Shadow(_) => 20,
            Rule::Encrypt(_) => 30,
        }
    }

    pub fn get_type(&self) -> &'static str {
        match self {
            Rule::Sharding(_) => "sharding",
            Rule::Single(_) => "single",
            Rule::ReadwriteSplitting(_) => "readwrite_splitting",
            Rule::Shadow(_) => "shadow",
            Rule::Encrypt(_) => "encrypt",
        }
    }
}

/**
 * Immutable snapshot of the rules of one logic database.
 *
 * Built explicitly, ordered by rule priority, and shared between statements
 * through an `Arc`. A configuration change builds a new snapshot.
 */
#[derive(Debug, Clone, Default)]
pub struct RuleMetaData {
    rules: Vec<Rule>,
}

impl RuleMetaData {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by_key(|each| each.get_order());
        RuleMetaData { rules }
    }

    pub fn from_configuration(config: &RulesConfiguration) -> Result<Self> {
        let mut rules = vec![];
        if let Some(each) = &config.sharding {
            rules.push(Rule::Sharding(ShardingRule::from_configuration(each, &config.data_sources)?));
        }
        if let Some(each) = &config.single {
            rules.push(Rule::Single(SingleRule::from_configuration(each, &config.data_sources)?));
        }
        if let Some(each) = &config.readwrite_splitting {
            rules.push(Rule::ReadwriteSplitting(ReadwriteSplittingRule::from_configuration(each)?));
        }
        if let Some(each) = &config.shadow {
            rules.push(Rule::Shadow(ShadowRule::from_configuration(each)?));
        }
        if let Some(each) = &config.encrypt {
            rules.push(Rule::Encrypt(EncryptRule::from_configuration(each)?));
        }
        let result = RuleMetaData::new(rules);
        debug!("Loaded rules {:?}", result.rules.iter().map(Rule::get_type).collect::<Vec<_>>());
        Ok(result)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_configuration(&RulesConfiguration::from_str(yaml)?)
    }

    pub fn get_rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn find_sharding_rule(&self) -> Option<&ShardingRule> {
        self.rules.iter().find_map(|each| match each {
            Rule::Sharding(rule) => Some(rule),
            _ => None,
        })
    }

    pub fn find_single_rule(&self) -> Option<&SingleRule> {
        self.rules.iter().find_map(|each| match each {
            Rule::Single(rule) => Some(rule),
            _ => None,
        })
    }

    pub fn find_readwrite_splitting_rule(&self) -> Option<&ReadwriteSplittingRule> {
        self.rules.iter().find_map(|each| match each {
            Rule::ReadwriteSplitting(rule) => Some(rule),
            _ => None,
        })
    }

    pub fn find_shadow_rule(&self) -> Option<&ShadowRule> {
        self.rules.iter().find_map(|each| match each {
            Rule::Shadow(rule) => Some(rule),
            _ => None,
        })
    }

    pub fn find_encrypt_rule(&self) -> Option<&EncryptRule> {
        self.rules.iter().find_map(|each| match each {
            Rule::Encrypt(rule) => Some(rule),
            _ => None,
        })
    }
}

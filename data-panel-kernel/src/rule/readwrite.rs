use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::distributions::WeightedIndex;
use rand::prelude::*;

use crate::error::{KernelError, Result};
use crate::rule::config::{AlgorithmConfiguration, ReadwriteSplittingRuleConfiguration};

/// Picks one replica out of the read data sources of a group.
pub enum LoadBalanceAlgorithm {
    RoundRobin(AtomicUsize),
    Random,
    /// Weight per read data source, absent ones weigh nothing.
    Weight(BTreeMap<String, f64>),
}

impl LoadBalanceAlgorithm {
    pub fn create(name: &str, config: &AlgorithmConfiguration) -> Result<Self> {
        match config.algorithm_type.to_uppercase().as_str() {
            "ROUND_ROBIN" => Ok(LoadBalanceAlgorithm::RoundRobin(AtomicUsize::new(0))),
            "RANDOM" => Ok(LoadBalanceAlgorithm::Random),
            "WEIGHT" => {
                let mut weights = BTreeMap::new();
                for (data_source, value) in &config.props {
                    let weight = value.as_f64().filter(|each| *each >= 0.0).ok_or_else(|| {
                        KernelError::invalid_rule(format!("Weight of `{}` in load balancer `{}` must be a non negative number", data_source, name))
                    })?;
                    weights.insert(data_source.clone(), weight);
                }
                Ok(LoadBalanceAlgorithm::Weight(weights))
            }
            other => Err(KernelError::invalid_rule(format!("Unknown load balancer type `{}` of `{}`", other, name))),
        }
    }

    pub fn get_data_source<'a>(&self, read_data_sources: &'a [String]) -> Option<&'a str> {
        if read_data_sources.is_empty() {
            return None;
        }
        let index = match self {
            LoadBalanceAlgorithm::RoundRobin(counter) => counter.fetch_add(1, Ordering::Relaxed) % read_data_sources.len(),
            LoadBalanceAlgorithm::Random => thread_rng().gen_range(0..read_data_sources.len()),
            LoadBalanceAlgorithm::Weight(weights) => {
                let items: Vec<f64> = read_data_sources.iter().map(|each| weights.get(each).copied().unwrap_or(0.0)).collect();
                match WeightedIndex::new(&items) {
                    Ok(distribution) => distribution.sample(&mut thread_rng()),
                    // every weight is zero
                    Err(_) => thread_rng().gen_range(0..read_data_sources.len()),
                }
            }
        };
        read_data_sources.get(index).map(String::as_str)
    }
}

impl fmt::Debug for LoadBalanceAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadBalanceAlgorithm::RoundRobin(_) => f.write_str("RoundRobin"),
            LoadBalanceAlgorithm::Random => f.write_str("Random"),
            LoadBalanceAlgorithm::Weight(weights) => write!(f, "Weight({:?})", weights),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadwriteSplittingDataSourceRule {
    name: String,
    write_data_source: String,
    read_data_sources: Vec<String>,
    load_balancer: Arc<LoadBalanceAlgorithm>,
}

impl ReadwriteSplittingDataSourceRule {
    pub fn new(name: &str, write_data_source: &str, read_data_sources: Vec<String>, load_balancer: Arc<LoadBalanceAlgorithm>) -> Self {
        ReadwriteSplittingDataSourceRule {
            name: name.to_string(),
            write_data_source: write_data_source.to_string(),
            read_data_sources,
            load_balancer,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_write_data_source(&self) -> &str {
        &self.write_data_source
    }

    pub fn get_read_data_sources(&self) -> &[String] {
        &self.read_data_sources
    }

    /// A replica chosen by the load balancer, the primary when there is none.
    pub fn get_read_data_source(&self) -> &str {
        self.load_balancer
            .get_data_source(&self.read_data_sources)
            .unwrap_or(&self.write_data_source)
    }
}

/// Logic data sources backed by a primary and its replicas.
#[derive(Debug, Clone, Default)]
pub struct ReadwriteSplittingRule {
    data_source_rules: Vec<ReadwriteSplittingDataSourceRule>,
}

impl ReadwriteSplittingRule {
    pub fn new(data_source_rules: Vec<ReadwriteSplittingDataSourceRule>) -> Self {
        ReadwriteSplittingRule { data_source_rules }
    }

    pub fn from_configuration(config: &ReadwriteSplittingRuleConfiguration) -> Result<Self> {
        let mut load_balancers = BTreeMap::new();
        for (name, each) in &config.load_balancers {
            load_balancers.insert(name.clone(), Arc::new(LoadBalanceAlgorithm::create(name, each)?));
        }
        let mut data_source_rules = Vec::with_capacity(config.data_sources.len());
        for (name, each) in &config.data_sources {
            if each.write_data_source.is_empty() {
                return Err(KernelError::invalid_rule(format!("Write data source of `{}` is required", name)));
            }
            let load_balancer = match &each.load_balancer {
                Some(balancer) => load_balancers
                    .get(balancer)
                    .cloned()
                    .ok_or_else(|| KernelError::invalid_rule(format!("Load balancer `{}` is not defined", balancer)))?,
                // each group gets its own counter
                None => Arc::new(LoadBalanceAlgorithm::RoundRobin(AtomicUsize::new(0))),
            };
            data_source_rules.push(ReadwriteSplittingDataSourceRule::new(name, &each.write_data_source, each.read_data_sources.clone(), load_balancer));
        }
        Ok(ReadwriteSplittingRule::new(data_source_rules))
    }

    pub fn get_data_source_rules(&self) -> &[ReadwriteSplittingDataSourceRule] {
        &self.data_source_rules
    }

    pub fn find_data_source_rule(&self, name: &str) -> Option<&ReadwriteSplittingDataSourceRule> {
        self.data_source_rules.iter().find(|each| each.name == name)
    }
}

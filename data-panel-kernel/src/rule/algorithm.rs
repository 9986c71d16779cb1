//! Sharding algorithms: map a sharding value onto the available targets
//! (data sources or actual tables). Targets are matched by their numeric
//! suffix, `t_order_1` is the target of shard `1`.

use std::collections::BTreeSet;
use std::fmt;

use rhai::{Dynamic, Engine, Scope, AST};

use crate::error::{KernelError, Result};
use crate::rule::config::AlgorithmConfiguration;
use crate::value::SQLValue;

/// Values a sharding column is restricted to by one sharding condition.
#[derive(Debug, Clone, PartialEq)]
pub enum ShardingValue {
    List(Vec<SQLValue>),
    /// Inclusive `BETWEEN lower AND upper`.
    Range { lower: SQLValue, upper: SQLValue },
}

pub enum ShardingAlgorithm {
    Mod { sharding_count: u64 },
    HashMod { sharding_count: u64 },
    BoundaryRange { boundaries: Vec<i64> },
    Inline(InlineShardingAlgorithm),
}

impl ShardingAlgorithm {
    pub fn create(name: &str, config: &AlgorithmConfiguration) -> Result<Self> {
        match config.algorithm_type.to_uppercase().as_str() {
            "MOD" => Ok(ShardingAlgorithm::Mod {
                sharding_count: Self::sharding_count(name, config)?,
            }),
            "HASH_MOD" => Ok(ShardingAlgorithm::HashMod {
                sharding_count: Self::sharding_count(name, config)?,
            }),
            "BOUNDARY_RANGE" => {
                let boundaries = config.get_i64_list("sharding-ranges").ok_or_else(|| {
                    KernelError::invalid_rule(format!("`sharding-ranges` property is required by algorithm `{}`", name))
                })?;
                if boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
                    return Err(KernelError::invalid_rule(format!("`sharding-ranges` of algorithm `{}` must be ascending", name)));
                }
                Ok(ShardingAlgorithm::BoundaryRange { boundaries })
            }
            "INLINE" => {
                let expression = config.require_string(name, "algorithm-expression")?;
                Ok(ShardingAlgorithm::Inline(InlineShardingAlgorithm::new(name, &expression)?))
            }
            other => Err(KernelError::invalid_rule(format!("Unknown sharding algorithm type `{}` of `{}`", other, name))),
        }
    }

    fn sharding_count(name: &str, config: &AlgorithmConfiguration) -> Result<u64> {
        match config.require_u64(name, "sharding-count")? {
            0 => Err(KernelError::invalid_rule(format!("`sharding-count` of algorithm `{}` must be positive", name))),
            count => Ok(count),
        }
    }

    pub fn get_type(&self) -> &'static str {
        match self {
            ShardingAlgorithm::Mod { .. } => "MOD",
            ShardingAlgorithm::HashMod { .. } => "HASH_MOD",
            ShardingAlgorithm::BoundaryRange { .. } => "BOUNDARY_RANGE",
            ShardingAlgorithm::Inline(_) => "INLINE",
        }
    }

    /// Targets out of `available_targets` that may hold rows with `column` in `value`.
    /// The result keeps the order of `available_targets`.
    pub fn do_sharding(&self, available_targets: &[String], column: &str, value: &ShardingValue) -> Result<Vec<String>> {
        match value {
            ShardingValue::List(values) => {
                let mut result = BTreeSet::new();
                for each in values {
                    result.extend(self.do_precise_sharding(available_targets, column, each)?);
                }
                Ok(available_targets.iter().filter(|each| result.contains(*each)).cloned().collect())
            }
            ShardingValue::Range { lower, upper } => self.do_range_sharding(available_targets, lower, upper),
        }
    }

    fn do_precise_sharding(&self, available_targets: &[String], column: &str, value: &SQLValue) -> Result<Vec<String>> {
        let suffix = match self {
            ShardingAlgorithm::Mod { sharding_count } => self.integer_value(value)?.rem_euclid(*sharding_count as i64) as u64,
            ShardingAlgorithm::HashMod { sharding_count } => (java_hash_code(&value.as_plain_string()) as i64).abs() as u64 % sharding_count,
            ShardingAlgorithm::BoundaryRange { boundaries } => partition(boundaries, self.integer_value(value)?),
            ShardingAlgorithm::Inline(inline) => {
                let target = inline.evaluate(column, value)?;
                return Ok(available_targets
                    .iter()
                    .filter(|each| each.eq_ignore_ascii_case(&target))
                    .cloned()
                    .collect());
            }
        };
        Ok(find_targets_by_suffix(available_targets, &[suffix]))
    }

    fn do_range_sharding(&self, available_targets: &[String], lower: &SQLValue, upper: &SQLValue) -> Result<Vec<String>> {
        match self {
            ShardingAlgorithm::Mod { sharding_count } => {
                let (lower, upper) = (self.integer_value(lower)?, self.integer_value(upper)?);
                if lower > upper {
                    return Ok(vec![]);
                }
                if (upper as i128 - lower as i128) >= *sharding_count as i128 - 1 {
                    return Ok(available_targets.to_vec());
                }
                let suffixes: Vec<u64> = (lower..=upper).map(|each| each.rem_euclid(*sharding_count as i64) as u64).collect();
                Ok(find_targets_by_suffix(available_targets, &suffixes))
            }
            ShardingAlgorithm::BoundaryRange { boundaries } => {
                let (lower, upper) = (self.integer_value(lower)?, self.integer_value(upper)?);
                if lower > upper {
                    return Ok(vec![]);
                }
                let suffixes: Vec<u64> = (partition(boundaries, lower)..=partition(boundaries, upper)).collect();
                Ok(find_targets_by_suffix(available_targets, &suffixes))
            }
            // hashes and scripts can not prune a range
            ShardingAlgorithm::HashMod { .. } | ShardingAlgorithm::Inline(_) => Ok(available_targets.to_vec()),
        }
    }

    fn integer_value(&self, value: &SQLValue) -> Result<i64> {
        value.as_i64().ok_or_else(|| KernelError::AlgorithmEvaluation {
            algorithm: self.get_type().to_string(),
            message: format!("sharding value `{}` is not an integer", value),
        })
    }
}

impl fmt::Debug for ShardingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardingAlgorithm::Mod { sharding_count } => write!(f, "Mod({})", sharding_count),
            ShardingAlgorithm::HashMod { sharding_count } => write!(f, "HashMod({})", sharding_count),
            ShardingAlgorithm::BoundaryRange { boundaries } => write!(f, "BoundaryRange({:?})", boundaries),
            ShardingAlgorithm::Inline(inline) => write!(f, "Inline({})", inline.expression),
        }
    }
}

/// Index of the range a value falls in: `[.., b0)` is 0, `[b0, b1)` is 1 and so on.
fn partition(boundaries: &[i64], value: i64) -> u64 {
    boundaries.iter().filter(|each| value >= **each).count() as u64
}

fn find_targets_by_suffix(available_targets: &[String], suffixes: &[u64]) -> Vec<String> {
    available_targets
        .iter()
        .filter(|each| target_suffix(each).map_or(false, |suffix| suffixes.contains(&suffix)))
        .cloned()
        .collect()
}

/// Trailing number of a target name, `ds_12` -> 12.
pub fn target_suffix(target: &str) -> Option<u64> {
    let digits: String = target.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    digits.chars().rev().collect::<String>().parse().ok()
}

/// `String.hashCode()` of the JVM, kept for shard compatibility with existing data.
fn java_hash_code(value: &str) -> i32 {
    value
        .encode_utf16()
        .fold(0i32, |hash, each| hash.wrapping_mul(31).wrapping_add(each as i32))
}

enum InlinePart {
    Text(String),
    Script(AST),
}

/**
 * `t_order_${order_id % 2}`: text with embedded expressions (`${...}` or
 * `$->{...}`) evaluated by rhai with the sharding column in scope.
 */
pub struct InlineShardingAlgorithm {
    name: String,
    expression: String,
    parts: Vec<InlinePart>,
    engine: Engine,
}

impl InlineShardingAlgorithm {
    pub fn new(name: &str, expression: &str) -> Result<Self> {
        let engine = Engine::new();
        let mut parts = vec![];
        let mut rest = expression;
        while let Some(start) = rest.find('$') {
            let body_start = if rest[start..].starts_with("${") {
                start + 2
            } else if rest[start..].starts_with("$->{") {
                start + 4
            } else {
                parts.push(InlinePart::Text(rest[..=start].to_string()));
                rest = &rest[start + 1..];
                continue;
            };
            let body_len = rest[body_start..].find('}').ok_or_else(|| {
                KernelError::invalid_rule(format!("Unclosed inline expression `{}` of algorithm `{}`", expression, name))
            })?;
            if start > 0 {
                parts.push(InlinePart::Text(rest[..start].to_string()));
            }
            let script = &rest[body_start..body_start + body_len];
            let ast = engine.compile_expression(script).map_err(|e| KernelError::AlgorithmEvaluation {
                algorithm: name.to_string(),
                message: format!("can not compile `{}`: {}", script, e),
            })?;
            parts.push(InlinePart::Script(ast));
            rest = &rest[body_start + body_len + 1..];
        }
        if !rest.is_empty() {
            parts.push(InlinePart::Text(rest.to_string()));
        }
        Ok(InlineShardingAlgorithm {
            name: name.to_string(),
            expression: expression.to_string(),
            parts,
            engine,
        })
    }

    pub fn get_expression(&self) -> &str {
        &self.expression
    }

    pub fn evaluate(&self, column: &str, value: &SQLValue) -> Result<String> {
        let mut scope = Scope::new();
        match value.as_i64() {
            Some(v) if !matches!(value, SQLValue::Text(_)) => scope.push(column.to_string(), v),
            _ => scope.push(column.to_string(), value.as_plain_string()),
        };
        let mut result = String::new();
        for each in &self.parts {
            match each {
                InlinePart::Text(text) => result.push_str(text),
                InlinePart::Script(ast) => {
                    let evaluated = self
                        .engine
                        .eval_ast_with_scope::<Dynamic>(&mut scope, ast)
                        .map_err(|e| KernelError::AlgorithmEvaluation {
                            algorithm: self.name.clone(),
                            message: e.to_string(),
                        })?;
                    result.push_str(&evaluated.to_string());
                }
            }
        }
        Ok(result)
    }
}

use thiserror::Error;

/// Failures raised while binding, routing or rewriting one statement.
///
/// None of them is retried by the kernel, they are terminal for the statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("`{operation} {object_type}` can not route correctly for {object_type} `[{}]`", .object_names.join(", "))]
    Route {
        operation: String,
        object_type: String,
        object_names: Vec<String>,
    },

    #[error("`{object}` can be routed to more than one data source `[{}]`", .candidates.join(", "))]
    AmbiguousRoute {
        object: String,
        candidates: Vec<String>,
    },

    #[error("Column '{column}' in {clause} is ambiguous.")]
    AmbiguousColumn { column: String, clause: String },

    #[error("Unknown column '{column}' in '{clause}'.")]
    UnknownColumn { column: String, clause: String },

    #[error("Unknown table '{table}' in {clause}.")]
    UnknownTable { table: String, clause: String },

    #[error("SQL tokens overlap: [{previous_start}, {previous_stop}] and [{next_start}, {next_stop}]")]
    TokenOverlap {
        previous_start: usize,
        previous_stop: isize,
        next_start: usize,
        next_stop: isize,
    },

    #[error("SQL token [{start}, {stop}] is outside of the {length} characters of the SQL")]
    TokenOutOfRange { start: usize, stop: isize, length: usize },

    #[error("Rewritten SQL for `{data_source}` has {expected} placeholders but {actual} parameters")]
    ParameterMismatch {
        data_source: String,
        expected: usize,
        actual: usize,
    },

    #[error("Parameter index {index} out of range, only {count} parameters were bound")]
    ParameterIndexOutOfRange { index: usize, count: usize },

    #[error("{0}")]
    UnsupportedSharding(String),

    #[error("Invalid rule configuration: {0}")]
    InvalidRuleConfiguration(String),

    #[error("Algorithm `{algorithm}` failed: {message}")]
    AlgorithmEvaluation { algorithm: String, message: String },

    #[error("Invalid numeric `{0}`")]
    InvalidNumeric(String),
}

pub type Result<T> = std::result::Result<T, KernelError>;

impl KernelError {
    pub fn route<S: Into<String>>(operation: S, object_names: Vec<String>) -> Self {
        KernelError::Route {
            operation: operation.into(),
            object_type: "table".to_string(),
            object_names,
        }
    }

    pub fn invalid_rule<S: Into<String>>(message: S) -> Self {
        KernelError::InvalidRuleConfiguration(message.into())
    }
}

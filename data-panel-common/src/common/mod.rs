use thiserror::Error;

/// Data panel common error
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    General(String),

    #[error("can not read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid mesh configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("can not initialise logger: {0}")]
    Logger(#[from] log::SetLoggerError),
}

/// Data panel common result type
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::fmt::Error> for Error {
    fn from(e: std::fmt::Error) -> Self {
        Error::General(e.to_string())
    }
}

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or expanding a benchmark descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("could not read descriptor template {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("descriptor template is not valid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("descriptor root must be a mapping")]
    NotAMapping,
    #[error("descriptor is missing mandatory field `{0}`")]
    MissingField(&'static str),
    #[error("descriptor scenario is missing `{0}`")]
    MissingScenarioField(&'static str),
}

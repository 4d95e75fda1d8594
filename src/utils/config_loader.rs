use dotenvy::dotenv;
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use std::{env, fs};
use thiserror::Error;

static ENV_VAR: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\$\{([a-zA-Z_][0-9a-zA-Z_]*)\}").ok());

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Error loading config: {0}")]
    ConfigError(String),
}

pub trait SectionLoaderSync {
    type SectionType;

    fn load_section_from_file_sync(file_name: String) -> Result<Self::SectionType, LoadConfigError>;
}

pub fn load_from_file_sync<T: DeserializeOwned>(file_name: String) -> Result<T, LoadConfigError> {
    dotenv().ok();
    let contents = fs::read_to_string(file_name)?;
    parse_config(&contents)
}

pub fn parse_config<T: DeserializeOwned>(raw_config: &str) -> Result<T, LoadConfigError> {
    let contents = expand_vars(raw_config)?;
    let config: T = toml::from_str(&contents)?;
    Ok(config)
}

fn expand_vars(raw_config: &str) -> Result<String, LoadConfigError> {
    let re = ENV_VAR.as_ref().ok_or_else(|| LoadConfigError::ConfigError("invalid variable pattern".to_string()))?;
    Ok(re
        .replace_all(raw_config, |caps: &Captures| match env::var(&caps[1]) {
            Ok(val) => val,
            Err(_) => caps[0].to_string(),
        })
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Section {
        url: String,
    }

    #[test]
    fn test_unknown_variables_are_left_in_place() {
        let section: Section = parse_config("url = \"${LEDGER_SNAPSHOT_SYNC_SURELY_UNSET}/rpc\"").unwrap();
        assert_eq!(section.url, "${LEDGER_SNAPSHOT_SYNC_SURELY_UNSET}/rpc");
    }

    #[test]
    fn test_known_variables_are_expanded() {
        // PATH is set in every test environment
        let path = env::var("PATH").unwrap();
        let section: Section = parse_config("url = \"${PATH}\"").unwrap();
        assert_eq!(section.url, path);
    }
}

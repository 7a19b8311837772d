use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(inner) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), inner),
        )),
        other => other,
    })
}

/// Parses and validates a config from YAML text.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;
    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded.is_empty() {
        return Ok(());
    }

    unexpanded.sort();
    unexpanded.dedup();

    let error_msg = if unexpanded.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with the actual value",
            unexpanded[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             Set them or replace the placeholders in the config file",
            unexpanded.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn expand_paths(config: &mut Config) {
    config.request.output_dir = expand_tilde(&config.request.output_dir);
    config.checkpoint.path = expand_tilde(&config.checkpoint.path);
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.saas.host.trim().is_empty() {
        errors.push("saas.host must not be empty".to_string());
    }
    if config.saas.user_id.trim().is_empty() {
        errors.push("saas.user_id must not be empty".to_string());
    }
    if config.saas.scheme != "https" && config.saas.scheme != "http" {
        errors.push(format!(
            "saas.scheme must be 'https' or 'http', got '{}'",
            config.saas.scheme
        ));
    }

    let chunk = config.request.chunk_increment;
    if chunk.as_secs() == 0 {
        errors.push("request.chunk_increment must be at least 1s".to_string());
    } else if chunk.subsec_nanos() != 0 {
        errors.push(format!(
            "request.chunk_increment must be a whole number of seconds, got {:?}",
            chunk
        ));
    }
    if config.request.connection_timeout.is_zero() {
        errors.push("request.connection_timeout must be greater than zero".to_string());
    }
    if config.request.output_prefix.trim().is_empty() {
        errors.push("request.output_prefix must not be empty".to_string());
    }
    if config.request.start_from < 0 {
        errors.push("request.start_from must not be negative".to_string());
    }

    if config.forward.enabled {
        if config.forward.host.trim().is_empty() {
            errors.push("forward.host must be set when forwarding is enabled".to_string());
        }
        if config.forward.port == 0 {
            errors.push("forward.port must be set when forwarding is enabled".to_string());
        }
    }

    if config.checkpoint.path.as_os_str().is_empty() {
        errors.push("checkpoint.path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MINIMAL: &str = r#"
saas:
  customer_id: 1234567
  user_id: api@example.com
  password: secret
  host: msg.example.com
request:
  chunk_increment: 1h
checkpoint:
  path: /var/lib/logpuller/checkpoint.json
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.saas.customer_id, 1234567);
        assert_eq!(config.saas.scheme, "https");
        assert_eq!(config.saas.api_version, 5);
        assert_eq!(config.request.chunk_increment, Duration::from_secs(3600));
        assert_eq!(config.request.connection_timeout, Duration::from_secs(180));
        assert_eq!(config.request.initial_lookback, Duration::from_secs(86400));
        assert_eq!(config.request.output_prefix, "OutputLog");
        assert_eq!(config.request.start_from, 0);
        assert!(config.proxy.url.is_none());
        assert!(!config.forward.enabled);
        assert!(config.forward.keep_file);
        assert_eq!(config.forward.protocol, ForwardProtocol::Tcp);
    }

    #[test]
    fn test_protocol_accepts_uppercase() {
        let yaml = format!(
            "{}forward:\n  enabled: true\n  host: siem.local\n  port: 5140\n  protocol: UDP\n  keep_file: false\n",
            MINIMAL
        );
        let config = parse_config(&yaml).unwrap();
        assert_eq!(config.forward.protocol, ForwardProtocol::Udp);
        assert_eq!(config.forward.port, 5140);
        assert!(!config.forward.keep_file);
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let yaml = MINIMAL.replace("chunk_increment: 1h", "chunk_increment: 0s");
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("chunk_increment"));
    }

    #[test]
    fn test_subsecond_chunk_rejected() {
        let yaml = MINIMAL.replace("chunk_increment: 1h", "chunk_increment: 1500ms");
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("whole number of seconds"));
    }

    #[test]
    fn test_forward_enabled_requires_host() {
        let yaml = format!("{}forward:\n  enabled: true\n", MINIMAL);
        match parse_config(&yaml) {
            Err(ConfigError::ValidationList(errors)) => {
                assert!(errors.iter().any(|e| e.contains("forward.host")));
            }
            other => panic!("expected validation list, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unexpanded_env_var_reported() {
        let yaml = MINIMAL.replace("password: secret", "password: $env{LOGPULLER_MISSING_PW}");
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("LOGPULLER_MISSING_PW"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = parse_config(MINIMAL).unwrap();
        let debug = format!("{:?}", config.saas);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }
}

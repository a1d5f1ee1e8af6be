use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use content_crawler::config::load_config;
///
/// let config = load_config(Path::new("crawler.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Loads the configuration at `path` if it exists, defaults otherwise
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!("No config at {}, using defaults", path.display());
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DomainPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
max-workers = 20
max-depth = 2
max-pages = 500
rate-limit-delay = 250
allow-cross-domain = true
domain-policy = "once-per-domain"

[http]
user-agent = "TestCrawler/1.0"

[output]
database-path = "./test.db"
content-dir = "./content"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_workers, 20);
        assert_eq!(config.crawler.max_depth, 2);
        assert_eq!(config.crawler.page_cap(), Some(500));
        assert!(config.crawler.allow_cross_domain);
        assert_eq!(config.crawler.domain_policy, DomainPolicy::OncePerDomain);
        assert_eq!(config.http.user_agent, "TestCrawler/1.0");
        assert_eq!(config.output.content_dir, "./content");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.crawler.max_workers, 10);
        assert_eq!(config.crawler.max_retries, 3);
        assert_eq!(config.crawler.request_timeout, 30);
        assert!(config.crawler.enable_loop_prevention);
        assert!(!config.crawler.allow_cross_domain);
        assert_eq!(config.crawler.domain_policy, DomainPolicy::PerUrl);
    }

    #[test]
    fn test_omitted_max_pages_is_uncapped() {
        let config = parse_config("[crawler]\nmax-depth = 2\n").unwrap();
        assert_eq!(config.crawler.max_pages, None);
        assert_eq!(config.crawler.page_cap(), None);
    }

    #[test]
    fn test_zero_max_pages_is_uncapped() {
        let config = parse_config("[crawler]\nmax-pages = 0\n").unwrap();
        assert_eq!(config.crawler.page_cap(), None);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.crawler.max_depth, 3);
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_domain_policy_rejected() {
        let result = parse_config("[crawler]\ndomain-policy = \"sometimes\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let result = parse_config("[crawler]\nmax-workers = 0\n");
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }
}

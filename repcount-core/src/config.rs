use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_SCREEN_NAME: &str = "BCApushups";
/// Largest page the user-timeline endpoint serves per request.
pub const MAX_PAGE_SIZE: u32 = 200;

pub const CONFIG_PATH_VAR: &str = "REPCOUNT_CONFIG";
pub const SECRETS_PATH_VAR: &str = "REPCOUNT_SECRETS";
pub const SCREEN_NAME_VAR: &str = "REPCOUNT_SCREEN_NAME";

const DEFAULT_CONFIG_PATH: &str = "repcount.toml";
const DEFAULT_SECRETS_PATH: &str = "secrets.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub screen_name: String,
    pub page_size: u32,
    pub cache_ttl_secs: u64,
    pub output_path: PathBuf,
    pub api_base: String,
    pub user_agent: String,
    pub wait_on_rate_limit: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            screen_name: DEFAULT_SCREEN_NAME.to_string(),
            page_size: MAX_PAGE_SIZE,
            cache_ttl_secs: 900,
            output_path: PathBuf::from("pushups.html"),
            api_base: "https://api.twitter.com/1.1".to_string(),
            user_agent: concat!("repcount/", env!("CARGO_PKG_VERSION")).to_string(),
            wait_on_rate_limit: true,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = read_config_file(path)?;
        Self::from_toml_str(&contents)
    }

    /// Loads `repcount.toml` (or the file named by `REPCOUNT_CONFIG`) and
    /// applies environment overrides. A missing default file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => {
                debug!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                Self::default()
            }
        };

        if let Some(screen_name) = lookup(SCREEN_NAME_VAR) {
            config.screen_name = screen_name;
        }
        config.validate()
    }

    /// Replaces the screen name, e.g. from the command line.
    pub fn with_screen_name(mut self, screen_name: &str) -> Result<Self, ConfigError> {
        self.screen_name = screen_name.to_string();
        self.validate()
    }

    fn validate(mut self) -> Result<Self, ConfigError> {
        self.screen_name = self.screen_name.trim().trim_start_matches('@').to_string();
        if self.screen_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "screen_name".to_string(),
                value: String::new(),
            });
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            let clamped = self.page_size.clamp(1, MAX_PAGE_SIZE);
            warn!(
                "page_size {} out of range, using {}",
                self.page_size, clamped
            );
            self.page_size = clamped;
        }

        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "api_base".to_string(),
                value: self.api_base,
            });
        }
        self.api_base = self.api_base.trim_end_matches('/').to_string();

        Ok(self)
    }
}

/// The four OAuth 1.0a values identifying the app and the account it acts for.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct SecretsFile {
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
    access_token: Option<String>,
    access_token_secret: Option<String>,
}

const CREDENTIAL_FIELDS: [(&str, &str); 4] = [
    ("consumer_key", "TWITTER_CONSUMER_KEY"),
    ("consumer_secret", "TWITTER_CONSUMER_SECRET"),
    ("access_token", "TWITTER_ACCESS_TOKEN"),
    ("access_token_secret", "TWITTER_ACCESS_TOKEN_SECRET"),
];

impl Credentials {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    /// Reads the secrets file, then lets `TWITTER_*` variables replace any
    /// of its values. The file may be absent when every variable is set.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup(SECRETS_PATH_VAR).unwrap_or_else(|| DEFAULT_SECRETS_PATH.to_string());
        let file = if Path::new(&path).exists() {
            toml::from_str::<SecretsFile>(&read_config_file(Path::new(&path))?)?
        } else {
            debug!("Secrets file {} not present, relying on environment", path);
            SecretsFile::default()
        };

        let resolve = |index: usize, file_value: Option<String>| {
            let (field, var) = CREDENTIAL_FIELDS[index];
            lookup(var)
                .or(file_value)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingField {
                    field: field.to_string(),
                })
        };

        Ok(Self {
            consumer_key: resolve(0, file.consumer_key)?,
            consumer_secret: resolve(1, file.consumer_secret)?,
            access_token: resolve(2, file.access_token)?,
            access_token_secret: resolve(3, file.access_token_secret)?,
        })
    }
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => ConfigError::InvalidFormat {
            details: format!("{}: {}", path.display(), e),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.screen_name, "BCApushups");
        assert_eq!(config.page_size, 200);
        assert!(config.wait_on_rate_limit);
    }

    #[test]
    fn test_partial_file_and_normalisation() {
        let config = AppConfig::from_toml_str(
            r#"
            screen_name = "@someone"
            page_size = 500
            api_base = "https://example.test/1.1/"
            "#,
        )
        .unwrap();
        assert_eq!(config.screen_name, "someone");
        assert_eq!(config.page_size, MAX_PAGE_SIZE);
        assert_eq!(config.api_base, "https://example.test/1.1");
        assert_eq!(config.cache_ttl_secs, 900);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            AppConfig::from_toml_str("screen_name = \"  \""),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            AppConfig::from_toml_str("api_base = \"ftp://nope\""),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            AppConfig::from_toml_str("page_size = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_with_explicit_file_and_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "screen_name = \"from_file\"\ncache_ttl_secs = 60").unwrap();
        let path = file.path().display().to_string();

        let config = AppConfig::load_with(env(&[(CONFIG_PATH_VAR, path.as_str())])).unwrap();
        assert_eq!(config.screen_name, "from_file");
        assert_eq!(config.cache_ttl_secs, 60);

        let config = AppConfig::load_with(env(&[
            (CONFIG_PATH_VAR, path.as_str()),
            (SCREEN_NAME_VAR, "from_env"),
        ]))
        .unwrap();
        assert_eq!(config.screen_name, "from_env");
    }

    #[test]
    fn test_load_with_missing_explicit_file() {
        let result = AppConfig::load_with(env(&[(CONFIG_PATH_VAR, "/nonexistent/repcount.toml")]));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_screen_name_override() {
        let config = AppConfig::default().with_screen_name(" @someone ").unwrap();
        assert_eq!(config.screen_name, "someone");

        assert!(matches!(
            AppConfig::default().with_screen_name("@"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_credentials_from_file_with_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "consumer_key = \"ck\"\nconsumer_secret = \"cs\"\naccess_token = \"at\"\naccess_token_secret = \"ats\""
        )
        .unwrap();
        let path = file.path().display().to_string();

        let credentials = Credentials::load_with(env(&[
            (SECRETS_PATH_VAR, path.as_str()),
            ("TWITTER_ACCESS_TOKEN", "at-env"),
        ]))
        .unwrap();
        assert_eq!(credentials.consumer_key, "ck");
        assert_eq!(credentials.consumer_secret, "cs");
        assert_eq!(credentials.access_token, "at-env");
        assert_eq!(credentials.access_token_secret, "ats");
    }

    #[test]
    fn test_credentials_missing_field() {
        let result = Credentials::load_with(env(&[
            (SECRETS_PATH_VAR, "/nonexistent/secrets.toml"),
            ("TWITTER_CONSUMER_KEY", "ck"),
            ("TWITTER_CONSUMER_SECRET", "cs"),
            ("TWITTER_ACCESS_TOKEN", "at"),
        ]));
        match result {
            Err(ConfigError::MissingField { field }) => assert_eq!(field, "access_token_secret"),
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = Credentials {
            consumer_key: "ck".to_string(),
            consumer_secret: "super-secret".to_string(),
            access_token: "token".to_string(),
            access_token_secret: "token-secret".to_string(),
        };
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("ck"));
        assert!(!printed.contains("super-secret"));
        assert!(!printed.contains("token-secret"));
    }
}

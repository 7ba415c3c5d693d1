//! Configuration resolution for the filegate server.
//!
//! Settings come from four layers, highest precedence first:
//!
//! 1. command-line flags
//! 2. environment variables (`FILEGATE_` + key path, `.` becomes `_`)
//! 3. the TOML config file (default `~/.config/filegate/config.toml`)
//! 4. built-in defaults
//!
//! Scalars take the value of the highest layer that sets them. Directory
//! mappings are additive: file entries come first, followed by `--dir` flags.
//!
//! Resolution runs once before the listener binds and either produces a
//! complete [`Config`] or fails; there is no partially valid result.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use access::{parse_quota, QuotaFormatError, MIN_SECRET_LENGTH};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::{resolve_root, DirectoryMapping, DirectoryMappingTable, MappingError, RootError};

/// Listen address used when no layer sets one.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "FILEGATE";

const SECRET_KEY: &str = "jwt.secret";

/// Configuration resolution errors. All of them are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    ReadFile { path: PathBuf, reason: String },

    #[error("failed to parse config file {path}: {reason}")]
    ParseFile { path: PathBuf, reason: String },

    #[error("--base-dir is required when --jwt-secret is given")]
    BaseDirRequiredForFlagSecret,

    #[error("jwt.base_dir is required when jwt.secret is set in the configuration")]
    BaseDirRequired,

    #[error("jwt secret must be at least {min} bytes long, got {len}")]
    SecretTooShort { len: usize, min: usize },

    #[error("jwt base directory {path:?} {reason}")]
    InvalidBaseDir { path: String, reason: RootError },

    #[error("--jwt-secret and --dir cannot be combined: token mode serves only the base directory")]
    FlagSecretWithFlagDirs,

    #[error("--jwt-secret conflicts with [[directories]] in the config file: remove the directories or drop the flag")]
    FlagSecretWithFileDirs,

    #[error("--dir conflicts with jwt.secret in the configuration: remove the secret or drop the flag")]
    ConfigSecretWithFlagDirs,

    #[error("jwt.secret and [[directories]] are mutually exclusive in the configuration")]
    ConfigSecretWithFileDirs,

    #[error("no directories configured: pass --dir SRC[:VIRTUAL], add [[directories]] to the config file, or set jwt.secret for token mode")]
    NoDirectories,

    #[error("invalid server.quota: {0}")]
    InvalidQuota(#[from] QuotaFormatError),

    #[error("invalid server.listen {value:?}: expected HOST:PORT")]
    InvalidListen { value: String },

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Default,
    File,
    Env,
    Flag,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Default => "default",
            Source::File => "config file",
            Source::Env => "environment",
            Source::Flag => "command line",
        };
        f.write_str(name)
    }
}

/// The config file as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FileConfig {
    /// Listener and quota settings.
    pub server: ServerSection,

    /// Token mode settings.
    pub jwt: JwtSection,

    /// Static directory mappings.
    pub directories: Vec<DirectoryMapping>,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ServerSection {
    /// Address to listen on, `HOST:PORT`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,

    /// Storage quota, e.g. `10GB`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<String>,
}

/// `[jwt]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct JwtSection {
    /// Shared HMAC secret. Setting it enables token mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Directory token sessions are confined to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,
}

impl FileConfig {
    /// Load the config file.
    ///
    /// With `required` false a missing file yields the empty configuration.
    pub fn load<P: AsRef<Path>>(path: P, required: bool) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !required && !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml(&contents).map_err(|reason| ConfigError::ParseFile {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse a config file from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format_toml_error(&e))
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filegate")
        .join("config.toml")
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}

/// Environment variable name for a dotted key path.
///
/// `server.listen` becomes `FILEGATE_SERVER_LISTEN`.
pub fn env_key(path: &str) -> String {
    format!("{}_{}", ENV_PREFIX, path.replace('.', "_").to_uppercase())
}

/// Snapshot of the `FILEGATE_*` environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the process environment.
    pub fn from_process() -> Self {
        let prefix = format!("{}_", ENV_PREFIX);
        Self {
            vars: std::env::vars()
                .filter(|(key, _)| key.starts_with(&prefix))
                .collect(),
        }
    }

    /// Build from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value for a dotted key path. Empty values count as unset.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.vars
            .get(&env_key(path))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    /// Explicit config file; must exist when given.
    pub config_path: Option<PathBuf>,
    /// `--dir` values in `SRC[:VIRTUAL]` form.
    pub dirs: Vec<String>,
    pub listen: Option<String>,
    pub quota: Option<String>,
    pub jwt_secret: Option<String>,
    pub base_dir: Option<String>,
}

/// Parse a `SRC[:VIRTUAL]` mapping.
///
/// Splits on the first colon only; everything after it, further colons
/// included, is the virtual path. Without a colon the virtual path is `/`.
pub fn parse_dir_mapping(value: &str) -> Result<DirectoryMapping, MappingError> {
    let (source, virtual_path) = match value.split_once(':') {
        Some((source, virtual_path)) => (source.trim(), virtual_path.trim()),
        None => (value.trim(), "/"),
    };

    if source.is_empty() {
        return Err(MappingError::EmptyFlagSource {
            value: value.to_string(),
        });
    }
    if virtual_path.is_empty() {
        return Err(MappingError::EmptyFlagVirtual {
            value: value.to_string(),
        });
    }

    Ok(DirectoryMapping::new(source, virtual_path))
}

/// Shared-secret token mode settings.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSettings {
    /// HMAC secret, at least [`MIN_SECRET_LENGTH`] bytes.
    pub secret: String,
    /// Canonical base directory all token sessions live under.
    pub base_dir: PathBuf,
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"<redacted>")
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

/// Which of the two mutually exclusive access modes is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessMode {
    /// Fixed virtual namespace from directory mappings.
    Static(DirectoryMappingTable),
    /// Per-request scope from bearer tokens.
    Token(TokenSettings),
}

/// Fully resolved and validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `HOST:PORT` to bind.
    pub listen: String,
    /// Quota as configured, possibly empty.
    pub quota: String,
    /// Parsed quota; zero means unlimited.
    pub quota_bytes: u64,
    /// Active access mode.
    pub mode: AccessMode,
}

impl Config {
    /// Resolve configuration from the process environment, the config file
    /// and `overrides`.
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        ConfigResolver::new(overrides.clone()).load()
    }

    /// Directory mappings; empty in token mode.
    pub fn directories(&self) -> &[DirectoryMapping] {
        match &self.mode {
            AccessMode::Static(table) => table.as_slice(),
            AccessMode::Token(_) => &[],
        }
    }

    /// Shared secret, in token mode.
    pub fn secret(&self) -> Option<&str> {
        match &self.mode {
            AccessMode::Token(settings) => Some(&settings.secret),
            AccessMode::Static(_) => None,
        }
    }

    /// Base directory, in token mode.
    pub fn base_dir(&self) -> Option<&Path> {
        match &self.mode {
            AccessMode::Token(settings) => Some(&settings.base_dir),
            AccessMode::Static(_) => None,
        }
    }
}

/// A scalar together with the layer that supplied it.
#[derive(Debug, Clone, PartialEq)]
struct Setting {
    value: String,
    source: Source,
}

/// Merges the four configuration layers and validates the result.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    overrides: Overrides,
    env: Environment,
}

impl ConfigResolver {
    /// Resolver over the process environment.
    pub fn new(overrides: Overrides) -> Self {
        Self {
            overrides,
            env: Environment::from_process(),
        }
    }

    /// Replace the environment snapshot.
    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Read the config file and resolve.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let file = match &self.overrides.config_path {
            Some(path) => {
                tracing::info!("Using config file: {:?}", path);
                FileConfig::load(path, true)?
            }
            None => FileConfig::load(default_config_path(), false)?,
        };

        self.resolve(file)
    }

    /// Resolve against an already-parsed config file.
    pub fn resolve(&self, file: FileConfig) -> Result<Config, ConfigError> {
        let listen = self.pick(
            "server.listen",
            self.overrides.listen.as_deref(),
            file.server.listen.as_deref(),
        );
        let quota = self.pick(
            "server.quota",
            self.overrides.quota.as_deref(),
            file.server.quota.as_deref(),
        );
        let secret = self.pick(
            SECRET_KEY,
            self.overrides.jwt_secret.as_deref(),
            file.jwt.secret.as_deref(),
        );
        let base_dir = self.pick(
            "jwt.base_dir",
            self.overrides.base_dir.as_deref(),
            file.jwt.base_dir.as_deref(),
        );

        let dirs_from_flag = !self.overrides.dirs.is_empty();
        let mut directories = file.directories;
        for value in &self.overrides.dirs {
            directories.push(parse_dir_mapping(value)?);
        }

        let listen = normalize_listen(
            listen
                .map(|s| s.value)
                .unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
        )?;

        let quota = quota.map(|s| s.value).unwrap_or_default();
        let quota_bytes = parse_quota(&quota)?;

        let mode = match secret {
            Some(secret) => AccessMode::Token(token_settings(
                secret,
                base_dir,
                !directories.is_empty(),
                dirs_from_flag,
            )?),
            None => {
                if directories.is_empty() {
                    return Err(ConfigError::NoDirectories);
                }
                AccessMode::Static(DirectoryMappingTable::build(directories)?)
            }
        };

        Ok(Config {
            listen,
            quota,
            quota_bytes,
            mode,
        })
    }

    /// Highest-precedence non-empty value for a key.
    fn pick(&self, key: &str, flag: Option<&str>, file: Option<&str>) -> Option<Setting> {
        let (raw, source) = if let Some(value) = non_empty(flag) {
            (value, Source::Flag)
        } else if let Some(value) = non_empty(self.env.get(key)) {
            (value, Source::Env)
        } else {
            (non_empty(file)?, Source::File)
        };

        // The secret is key material and is used byte for byte.
        let value = if key == SECRET_KEY { raw } else { raw.trim() };
        let setting = Setting {
            value: value.to_string(),
            source,
        };

        if matches!(setting.source, Source::Flag | Source::Env) {
            if key == SECRET_KEY {
                tracing::info!("Overriding {} from {}", key, setting.source);
            } else {
                tracing::info!("Overriding {} from {}: {}", key, setting.source, setting.value);
            }
        }

        Some(setting)
    }
}

/// The value itself, or `None` when blank.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validate token mode settings.
fn token_settings(
    secret: Setting,
    base_dir: Option<Setting>,
    has_dirs: bool,
    dirs_from_flag: bool,
) -> Result<TokenSettings, ConfigError> {
    let secret_from_flag = secret.source == Source::Flag;

    let base_dir = match base_dir {
        Some(base_dir) => base_dir.value,
        None if secret_from_flag => return Err(ConfigError::BaseDirRequiredForFlagSecret),
        None => return Err(ConfigError::BaseDirRequired),
    };

    if secret.value.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::SecretTooShort {
            len: secret.value.len(),
            min: MIN_SECRET_LENGTH,
        });
    }

    let resolved = resolve_root(Path::new(&base_dir)).map_err(|reason| {
        ConfigError::InvalidBaseDir {
            path: base_dir.clone(),
            reason,
        }
    })?;

    if has_dirs {
        return Err(match (secret_from_flag, dirs_from_flag) {
            (true, true) => ConfigError::FlagSecretWithFlagDirs,
            (true, false) => ConfigError::FlagSecretWithFileDirs,
            (false, true) => ConfigError::ConfigSecretWithFlagDirs,
            (false, false) => ConfigError::ConfigSecretWithFileDirs,
        });
    }

    Ok(TokenSettings {
        secret: secret.value,
        base_dir: resolved,
    })
}

/// Check `HOST:PORT` shape; an empty host means all interfaces.
fn normalize_listen(value: String) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidListen {
        value: value.clone(),
    };

    let (host, port) = value.rsplit_once(':').ok_or_else(invalid)?;
    port.parse::<u16>().map_err(|_| invalid())?;

    if host.is_empty() {
        Ok(format!("0.0.0.0:{}", port))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn resolver(overrides: Overrides) -> ConfigResolver {
        ConfigResolver::new(overrides).with_environment(Environment::default())
    }

    fn mkdir(temp: &TempDir, name: &str) -> String {
        let path = temp.path().join(name);
        fs::create_dir_all(&path).unwrap();
        path.to_string_lossy().to_string()
    }

    fn file_with_dirs(dirs: &[(&str, &str)]) -> FileConfig {
        FileConfig {
            directories: dirs
                .iter()
                .map(|(s, v)| DirectoryMapping::new(*s, *v))
                .collect(),
            ..FileConfig::default()
        }
    }

    fn file_with_secret(secret: &str, base_dir: &str) -> FileConfig {
        let mut file = FileConfig::default();
        file.jwt.secret = Some(secret.to_string());
        file.jwt.base_dir = Some(base_dir.to_string());
        file
    }

    #[test]
    fn test_parse_dir_mapping_source_only() {
        assert_eq!(
            parse_dir_mapping("/var/www").unwrap(),
            DirectoryMapping::new("/var/www", "/")
        );
    }

    #[test]
    fn test_parse_dir_mapping_with_virtual() {
        assert_eq!(
            parse_dir_mapping("/var/www:/web").unwrap(),
            DirectoryMapping::new("/var/www", "/web")
        );
    }

    #[test]
    fn test_parse_dir_mapping_trims() {
        assert_eq!(
            parse_dir_mapping("  /var/www  :  /web  ").unwrap(),
            DirectoryMapping::new("/var/www", "/web")
        );
        assert_eq!(
            parse_dir_mapping("  /var/www  ").unwrap(),
            DirectoryMapping::new("/var/www", "/")
        );
    }

    #[test]
    fn test_parse_dir_mapping_empty_sides() {
        assert_eq!(
            parse_dir_mapping(":/virtual"),
            Err(MappingError::EmptyFlagSource {
                value: ":/virtual".to_string()
            })
        );
        assert_eq!(
            parse_dir_mapping("/source:"),
            Err(MappingError::EmptyFlagVirtual {
                value: "/source:".to_string()
            })
        );
        assert!(parse_dir_mapping("   ").is_err());
        assert!(parse_dir_mapping(" : ").is_err());

        let err = parse_dir_mapping(":/virtual").unwrap_err();
        assert!(err.to_string().contains("source"));
        let err = parse_dir_mapping("/source:").unwrap_err();
        assert!(err.to_string().contains("virtual"));
    }

    #[test]
    fn test_parse_dir_mapping_first_colon_only() {
        assert_eq!(
            parse_dir_mapping("/path:with:colons:/virtual").unwrap(),
            DirectoryMapping::new("/path", "with:colons:/virtual")
        );
    }

    #[test]
    fn test_env_key() {
        assert_eq!(env_key("server.listen"), "FILEGATE_SERVER_LISTEN");
        assert_eq!(env_key("jwt.base_dir"), "FILEGATE_JWT_BASE_DIR");
    }

    #[test]
    fn test_from_toml_empty() {
        let config = FileConfig::from_toml("").unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_from_toml_full() {
        let toml = r#"
[server]
listen = "127.0.0.1:9000"
quota = "10GB"

[jwt]
secret = "s"
base_dir = "/data"

[[directories]]
source = "/srv/www"
virtual = "/web"

[[directories]]
source = "/srv/music"
virtual = "/music"
"#;
        let config = FileConfig::from_toml(toml).unwrap();
        assert_eq!(config.server.listen.as_deref(), Some("127.0.0.1:9000"));
        assert_eq!(config.server.quota.as_deref(), Some("10GB"));
        assert_eq!(config.jwt.secret.as_deref(), Some("s"));
        assert_eq!(config.jwt.base_dir.as_deref(), Some("/data"));
        assert_eq!(
            config.directories,
            vec![
                DirectoryMapping::new("/srv/www", "/web"),
                DirectoryMapping::new("/srv/music", "/music"),
            ]
        );
    }

    #[test]
    fn test_from_toml_invalid_syntax() {
        let err = FileConfig::from_toml("[server\nlisten = 1").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn test_from_toml_wrong_type() {
        assert!(FileConfig::from_toml("[server]\nlisten = 8080").is_err());
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let mut original = file_with_dirs(&[("/srv", "/")]);
        original.server.quota = Some("1GB".to_string());
        let toml = original.to_toml().unwrap();
        assert!(toml.contains("virtual = \"/\""));
        assert_eq!(FileConfig::from_toml(&toml).unwrap(), original);
    }

    #[test]
    fn test_load_missing_optional_file() {
        let config = FileConfig::load("/nonexistent/path/config.toml", false).unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_load_missing_required_file() {
        let err = FileConfig::load("/nonexistent/path/config.toml", true).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "invalid [ toml").unwrap();

        let err = FileConfig::load(&config_path, true).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFile { .. }));
        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("filegate"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_static_mode_from_flags() {
        let temp = TempDir::new().unwrap();
        let www = mkdir(&temp, "www");

        let config = resolver(Overrides {
            dirs: vec![format!("{}:/web", www)],
            ..Overrides::default()
        })
        .resolve(FileConfig::default())
        .unwrap();

        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(config.quota_bytes, 0);
        assert_eq!(config.directories().len(), 1);
        assert_eq!(config.directories()[0].virtual_path, "/web");
        assert_eq!(
            config.directories()[0].source,
            fs::canonicalize(&www).unwrap()
        );
        assert!(config.secret().is_none());
        assert!(config.base_dir().is_none());
    }

    #[test]
    fn test_directories_are_additive() {
        let temp = TempDir::new().unwrap();
        let a = mkdir(&temp, "a");
        let b = mkdir(&temp, "b");

        let config = resolver(Overrides {
            dirs: vec![format!("{}:/b", b)],
            ..Overrides::default()
        })
        .resolve(file_with_dirs(&[(&a, "/a")]))
        .unwrap();

        let virtuals: Vec<&str> = config
            .directories()
            .iter()
            .map(|d| d.virtual_path.as_str())
            .collect();
        assert_eq!(virtuals, vec!["/a", "/b"]);
    }

    #[test]
    fn test_duplicate_across_file_and_flag() {
        let temp = TempDir::new().unwrap();
        let a = mkdir(&temp, "a");
        let b = mkdir(&temp, "b");

        let err = resolver(Overrides {
            dirs: vec![format!("{}:/shared", b)],
            ..Overrides::default()
        })
        .resolve(file_with_dirs(&[(&a, "/shared")]))
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::Mapping(MappingError::DuplicateVirtual {
                path: "/shared".to_string()
            })
        );
    }

    #[test]
    fn test_no_directories_no_secret() {
        let err = resolver(Overrides::default())
            .resolve(FileConfig::default())
            .unwrap_err();
        assert_eq!(err, ConfigError::NoDirectories);
    }

    #[test]
    fn test_bad_flag_mapping_is_fatal() {
        let err = resolver(Overrides {
            dirs: vec![":/web".to_string()],
            ..Overrides::default()
        })
        .resolve(FileConfig::default())
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Mapping(MappingError::EmptyFlagSource { .. })
        ));
    }

    #[test]
    fn test_token_mode_from_file() {
        let temp = TempDir::new().unwrap();
        let base = mkdir(&temp, "data");

        let config = resolver(Overrides::default())
            .resolve(file_with_secret(SECRET, &format!("{}/../data", base)))
            .unwrap();

        assert_eq!(config.secret(), Some(SECRET));
        assert_eq!(config.base_dir(), Some(fs::canonicalize(&base).unwrap().as_path()));
        assert!(config.directories().is_empty());
    }

    #[test]
    fn test_token_mode_base_dir_required() {
        let err = resolver(Overrides {
            jwt_secret: Some(SECRET.to_string()),
            ..Overrides::default()
        })
        .resolve(FileConfig::default())
        .unwrap_err();
        assert_eq!(err, ConfigError::BaseDirRequiredForFlagSecret);

        let mut file = FileConfig::default();
        file.jwt.secret = Some(SECRET.to_string());
        let err = resolver(Overrides::default()).resolve(file).unwrap_err();
        assert_eq!(err, ConfigError::BaseDirRequired);
        assert_ne!(
            ConfigError::BaseDirRequired.to_string(),
            ConfigError::BaseDirRequiredForFlagSecret.to_string()
        );
    }

    #[test]
    fn test_token_mode_short_secret() {
        let temp = TempDir::new().unwrap();
        let base = mkdir(&temp, "data");
        let short = "x".repeat(MIN_SECRET_LENGTH - 1);

        let err = resolver(Overrides::default())
            .resolve(file_with_secret(&short, &base))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::SecretTooShort {
                len: MIN_SECRET_LENGTH - 1,
                min: MIN_SECRET_LENGTH
            }
        );

        let exact = "x".repeat(MIN_SECRET_LENGTH);
        assert!(resolver(Overrides::default())
            .resolve(file_with_secret(&exact, &base))
            .is_ok());
    }

    #[test]
    fn test_token_mode_missing_base_dir() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing").to_string_lossy().to_string();

        let err = resolver(Overrides::default())
            .resolve(file_with_secret(SECRET, &missing))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidBaseDir {
                path: missing.clone(),
                reason: RootError::NotFound
            }
        );
        assert!(err.to_string().contains(&missing));
    }

    #[test]
    fn test_token_mode_base_dir_is_file() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("plain.txt");
        fs::write(&file_path, "x").unwrap();

        let err = resolver(Overrides::default())
            .resolve(file_with_secret(SECRET, &file_path.to_string_lossy()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidBaseDir {
                reason: RootError::NotADirectory,
                ..
            }
        ));
    }

    #[test]
    fn test_mode_conflict_all_provenances() {
        let temp = TempDir::new().unwrap();
        let base = mkdir(&temp, "data");
        let www = mkdir(&temp, "www");

        let flag_secret = Overrides {
            jwt_secret: Some(SECRET.to_string()),
            base_dir: Some(base.clone()),
            ..Overrides::default()
        };
        let flag_dirs = vec![format!("{}:/web", www)];
        let file_dirs = file_with_dirs(&[(&www, "/web")]);

        let both_flags = resolver(Overrides {
            dirs: flag_dirs.clone(),
            ..flag_secret.clone()
        })
        .resolve(FileConfig::default())
        .unwrap_err();

        let flag_secret_file_dirs = resolver(flag_secret.clone())
            .resolve(file_dirs.clone())
            .unwrap_err();

        let file_secret_flag_dirs = resolver(Overrides {
            dirs: flag_dirs,
            ..Overrides::default()
        })
        .resolve(file_with_secret(SECRET, &base))
        .unwrap_err();

        let mut both_file = file_with_secret(SECRET, &base);
        both_file.directories = file_dirs.directories;
        let both_in_file = resolver(Overrides::default())
            .resolve(both_file)
            .unwrap_err();

        assert_eq!(both_flags, ConfigError::FlagSecretWithFlagDirs);
        assert_eq!(flag_secret_file_dirs, ConfigError::FlagSecretWithFileDirs);
        assert_eq!(file_secret_flag_dirs, ConfigError::ConfigSecretWithFlagDirs);
        assert_eq!(both_in_file, ConfigError::ConfigSecretWithFileDirs);

        let messages: std::collections::HashSet<String> = [
            &both_flags,
            &flag_secret_file_dirs,
            &file_secret_flag_dirs,
            &both_in_file,
        ]
        .iter()
        .map(|e| e.to_string())
        .collect();
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn test_precedence_flag_env_file_default() {
        let temp = TempDir::new().unwrap();
        let www = mkdir(&temp, "www");
        let mut file = file_with_dirs(&[(&www, "/")]);
        file.server.listen = Some("10.0.0.1:1000".to_string());
        file.server.quota = Some("1MB".to_string());

        // file only
        let config = resolver(Overrides::default())
            .resolve(file.clone())
            .unwrap();
        assert_eq!(config.listen, "10.0.0.1:1000");
        assert_eq!(config.quota_bytes, 1 << 20);

        // env beats file
        let env = Environment::from_pairs([
            ("FILEGATE_SERVER_LISTEN", "10.0.0.2:2000"),
            ("FILEGATE_SERVER_QUOTA", "1GB"),
        ]);
        let config = resolver(Overrides::default())
            .with_environment(env.clone())
            .resolve(file.clone())
            .unwrap();
        assert_eq!(config.listen, "10.0.0.2:2000");
        assert_eq!(config.quota_bytes, 1 << 30);

        // flag beats env
        let config = resolver(Overrides {
            listen: Some("10.0.0.3:3000".to_string()),
            quota: Some("1TB".to_string()),
            ..Overrides::default()
        })
        .with_environment(env)
        .resolve(file)
        .unwrap();
        assert_eq!(config.listen, "10.0.0.3:3000");
        assert_eq!(config.quota, "1TB");
        assert_eq!(config.quota_bytes, 1 << 40);
    }

    #[test]
    fn test_empty_values_do_not_override() {
        let temp = TempDir::new().unwrap();
        let www = mkdir(&temp, "www");
        let mut file = file_with_dirs(&[(&www, "/")]);
        file.server.listen = Some("10.0.0.1:1000".to_string());

        let config = resolver(Overrides {
            listen: Some("  ".to_string()),
            ..Overrides::default()
        })
        .with_environment(Environment::from_pairs([("FILEGATE_SERVER_LISTEN", "")]))
        .resolve(file)
        .unwrap();
        assert_eq!(config.listen, "10.0.0.1:1000");
    }

    #[test]
    fn test_secret_used_verbatim() {
        let temp = TempDir::new().unwrap();
        let base = mkdir(&temp, "data");
        let padded = format!(" {}\t", SECRET);

        let config = resolver(Overrides {
            jwt_secret: Some(padded.clone()),
            base_dir: Some(format!("  {}  ", base)),
            ..Overrides::default()
        })
        .resolve(FileConfig::default())
        .unwrap();
        assert_eq!(config.secret(), Some(padded.as_str()));
        assert_eq!(config.base_dir(), Some(fs::canonicalize(&base).unwrap().as_path()));

        let err = resolver(Overrides {
            jwt_secret: Some("   ".to_string()),
            ..Overrides::default()
        })
        .resolve(FileConfig::default())
        .unwrap_err();
        assert_eq!(err, ConfigError::NoDirectories);
    }

    #[test]
    fn test_env_secret_enables_token_mode() {
        let temp = TempDir::new().unwrap();
        let base = mkdir(&temp, "data");
        let env = Environment::from_pairs([
            ("FILEGATE_JWT_SECRET", SECRET.to_string()),
            ("FILEGATE_JWT_BASE_DIR", base.clone()),
        ]);

        let config = resolver(Overrides::default())
            .with_environment(env)
            .resolve(FileConfig::default())
            .unwrap();
        assert!(matches!(config.mode, AccessMode::Token(_)));
    }

    #[test]
    fn test_env_secret_conflicts_with_flag_dirs() {
        let temp = TempDir::new().unwrap();
        let base = mkdir(&temp, "data");
        let www = mkdir(&temp, "www");
        let env = Environment::from_pairs([
            ("FILEGATE_JWT_SECRET", SECRET.to_string()),
            ("FILEGATE_JWT_BASE_DIR", base),
        ]);

        let err = resolver(Overrides {
            dirs: vec![www],
            ..Overrides::default()
        })
        .with_environment(env)
        .resolve(FileConfig::default())
        .unwrap_err();
        assert_eq!(err, ConfigError::ConfigSecretWithFlagDirs);
    }

    #[test]
    fn test_invalid_quota_names_value() {
        let temp = TempDir::new().unwrap();
        let www = mkdir(&temp, "www");
        let err = resolver(Overrides {
            dirs: vec![www],
            quota: Some("100XB".to_string()),
            ..Overrides::default()
        })
        .resolve(FileConfig::default())
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQuota(_)));
        assert!(err.to_string().contains("100XB"));
    }

    #[test]
    fn test_listen_validation() {
        assert_eq!(normalize_listen(":9090".to_string()).unwrap(), "0.0.0.0:9090");
        assert_eq!(
            normalize_listen("[::1]:9090".to_string()).unwrap(),
            "[::1]:9090"
        );
        assert_eq!(
            normalize_listen("localhost:80".to_string()).unwrap(),
            "localhost:80"
        );
        assert!(normalize_listen("localhost".to_string()).is_err());
        assert!(normalize_listen("localhost:http".to_string()).is_err());
        assert!(normalize_listen("host:70000".to_string()).is_err());
    }

    #[test]
    fn test_token_settings_debug_redacts_secret() {
        let settings = TokenSettings {
            secret: SECRET.to_string(),
            base_dir: PathBuf::from("/data"),
        };
        let debug = format!("{:?}", settings);
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("redacted"));
    }

    #[test]
    #[serial]
    fn test_environment_from_process() {
        std::env::set_var("FILEGATE_SERVER_QUOTA", "2GB");
        std::env::set_var("FILEGATE_SERVER_LISTEN", "");
        std::env::set_var("UNRELATED_FILEGATE_VAR", "x");

        let env = Environment::from_process();
        assert_eq!(env.get("server.quota"), Some("2GB"));
        assert_eq!(env.get("server.listen"), None);
        assert!(!env.vars.contains_key("UNRELATED_FILEGATE_VAR"));

        std::env::remove_var("FILEGATE_SERVER_QUOTA");
        std::env::remove_var("FILEGATE_SERVER_LISTEN");
        std::env::remove_var("UNRELATED_FILEGATE_VAR");
    }

    #[test]
    #[serial]
    fn test_load_applies_process_env() {
        let temp = TempDir::new().unwrap();
        let www = mkdir(&temp, "www");
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            format!(
                "[server]\nlisten = \"127.0.0.1:1\"\n\n[[directories]]\nsource = {:?}\nvirtual = \"/\"\n",
                www
            ),
        )
        .unwrap();

        std::env::set_var("FILEGATE_SERVER_LISTEN", "127.0.0.1:2");
        let config = Config::load(&Overrides {
            config_path: Some(config_path),
            ..Overrides::default()
        });
        std::env::remove_var("FILEGATE_SERVER_LISTEN");

        assert_eq!(config.unwrap().listen, "127.0.0.1:2");
    }
}

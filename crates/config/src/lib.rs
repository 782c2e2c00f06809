//! Layered configuration for stratus.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults,
//! 2. a configuration file (TOML, YAML or JSON, chosen by extension),
//! 3. `STRATUS_`-prefixed environment variables, with `__` separating nested
//!    keys (`STRATUS_COMPARISON__TIMEZONE=+02:00`).
//!
//! ```toml
//! [comparison]
//! timezone = "UTC"
//!
//! [backends.archive]
//! type = "b2"
//! part_size = 104857600
//!
//! [backends.mirror]
//! type = "s3"
//! region = "us-west-004"
//! endpoint = "https://s3.us-west-004.backblazeb2.com"
//! key_id = "..."
//! key_secret = "..."
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use stratus_storage::backend::b2::{B2Options, BucketType, MINIMUM_PART_SIZE};
use time::UtcOffset;
use time::macros::format_description;

pub const ENV_PREFIX: &str = "STRATUS_";
const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub comparison: ComparisonConfig,
    /// Named backends; the name becomes the session name.
    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Offset applied to remote timestamps of providers that report local
    /// time without a zone: `UTC`, `Z` or `±HH:MM`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}
impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl ComparisonConfig {
    pub fn utc_offset(&self) -> Result<UtcOffset> {
        parse_offset(&self.timezone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    B2(B2Config),
    S3(S3Config),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct B2Config {
    #[serde(default = "default_b2_threshold")]
    pub large_upload_threshold: u64,
    #[serde(default = "default_b2_part_size")]
    pub part_size: u64,
    /// Type of buckets created without an explicit region.
    #[serde(default = "default_bucket_type")]
    pub bucket_type: String,
}
impl Default for B2Config {
    fn default() -> Self {
        Self {
            large_upload_threshold: default_b2_threshold(),
            part_size: default_b2_part_size(),
            bucket_type: default_bucket_type(),
        }
    }
}

fn default_b2_threshold() -> u64 {
    200 * MIB
}

fn default_b2_part_size() -> u64 {
    100 * MIB
}

fn default_bucket_type() -> String {
    BucketType::AllPrivate.to_string()
}

impl B2Config {
    pub fn options(&self) -> Result<B2Options> {
        let default_bucket_type = self
            .bucket_type
            .parse::<BucketType>()
            .or_raise(|| ErrorKind::Invalid(format!("unknown bucket type `{}`", self.bucket_type)))?;
        Ok(B2Options {
            large_upload_threshold: self.large_upload_threshold,
            part_size: self.part_size,
            default_bucket_type,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint for S3-compatible services; AWS when absent.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub key_id: String,
    pub key_secret: String,
    #[serde(default = "default_s3_threshold")]
    pub large_upload_threshold: u64,
    #[serde(default = "default_s3_part_size")]
    pub part_size: u64,
}

fn default_s3_threshold() -> u64 {
    100 * MIB
}

fn default_s3_part_size() -> u64 {
    10 * MIB
}

#[cfg(feature = "s3")]
impl S3Config {
    pub fn backend(&self) -> stratus_storage::backend::s3::S3Backend {
        let options = stratus_storage::backend::s3::S3Options {
            large_upload_threshold: self.large_upload_threshold,
            part_size: self.part_size,
        };
        stratus_storage::backend::s3::S3Backend::new(
            self.region.clone(),
            self.endpoint.clone(),
            self.key_id.clone(),
            self.key_secret.clone(),
            options,
        )
    }
}

impl BackendConfig {
    fn part_sizes(&self) -> (u64, u64) {
        match self {
            Self::B2(b2) => (b2.large_upload_threshold, b2.part_size),
            Self::S3(s3) => (s3.large_upload_threshold, s3.part_size),
        }
    }
}

impl Config {
    /// Check values that deserialize fine but can't be used.
    pub fn validate(&self) -> Result<()> {
        self.comparison.utc_offset()?;
        for (name, backend) in &self.backends {
            let (threshold, part_size) = backend.part_sizes();
            if part_size < MINIMUM_PART_SIZE {
                exn::bail!(ErrorKind::Invalid(format!(
                    "backend `{name}`: part size {part_size} is below the minimum of {MINIMUM_PART_SIZE}"
                )));
            }
            if threshold < part_size {
                exn::bail!(ErrorKind::Invalid(format!(
                    "backend `{name}`: large upload threshold {threshold} is below the part size {part_size}"
                )));
            }
            if let BackendConfig::B2(b2) = backend {
                b2.options()?;
            }
        }
        Ok(())
    }
}

/// Default configuration file location, e.g. `~/.config/stratus/config.toml`.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "stratus").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Build the layered configuration sources without extracting them.
pub fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::new();
    if let Some(path) = path {
        figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Toml::file(path)),
        };
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Extract and validate a configuration from any set of sources.
pub fn from_figment(figment: &Figment) -> Result<Config> {
    let config: Config = figment.extract().or_raise(|| ErrorKind::Parse)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path`, or from [`default_path()`] if it exists.
///
/// An explicitly given path must exist; a missing default file just means
/// defaults and environment variables apply.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) if !path.exists() => exn::bail!(ErrorKind::Missing(path.to_path_buf())),
        Some(path) => Some(path.to_path_buf()),
        None => default_path().filter(|path| path.exists()),
    };
    match &path {
        Some(path) => tracing::debug!(path = %path.display(), "Loading configuration"),
        None => tracing::debug!("No configuration file, using defaults and environment"),
    }
    from_figment(&figment(path.as_deref()))
}

fn parse_offset(timezone: &str) -> Result<UtcOffset> {
    let timezone = timezone.trim();
    if timezone.eq_ignore_ascii_case("utc") || timezone == "Z" {
        return Ok(UtcOffset::UTC);
    }
    let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
    let offset = UtcOffset::parse(timezone, &format)
        .or_raise(|| ErrorKind::Invalid(format!("invalid timezone offset `{timezone}`")))?;
    Ok(offset)
}

use std::env;
use std::num::NonZeroU32;
use thiserror::Error;

pub const GITHUB_WEBHOOK_SECRET: &str = "GITHUB_WEBHOOK_SECRET";
pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const RETENTION_PERIOD_DAYS: &str = "RETENTION_PERIOD_DAYS";
pub const APPWRITE_BUCKET_ID: &str = "APPWRITE_BUCKET_ID";
pub const APPWRITE_ENDPOINT: &str = "APPWRITE_FUNCTION_API_ENDPOINT";
pub const APPWRITE_PROJECT_ID: &str = "APPWRITE_FUNCTION_PROJECT_ID";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required fields: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Looks up every key and fails listing all of those that are absent or empty.
///
/// A zero retention period counts as absent so that it can never turn into
/// "delete everything".
pub fn require<F>(lookup: F, keys: &[&str]) -> Result<Vec<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut values = Vec::with_capacity(keys.len());
    let mut missing = Vec::new();

    for key in keys {
        match lookup(key) {
            Some(value) if !is_blank(key, &value) => values.push(value),
            _ => missing.push(key.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(values)
    } else {
        Err(ConfigError::Missing(missing))
    }
}

fn is_blank(key: &str, value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || (key == RETENTION_PERIOD_DAYS && value.parse::<i64>().is_ok_and(|n| n == 0))
}

pub fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

#[derive(Clone)]
pub struct WebhookConfig {
    pub webhook_secret: String,
    pub github_token: String,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("webhook_secret", &"<redacted>")
            .field("github_token", &"<redacted>")
            .finish()
    }
}

impl WebhookConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = require(lookup, &[GITHUB_WEBHOOK_SECRET, GITHUB_TOKEN])?.into_iter();

        match (values.next(), values.next()) {
            (Some(webhook_secret), Some(github_token)) => Ok(Self {
                webhook_secret,
                github_token,
            }),
            _ => Err(ConfigError::Missing(vec![
                GITHUB_WEBHOOK_SECRET.to_string(),
                GITHUB_TOKEN.to_string(),
            ])),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    pub retention_days: NonZeroU32,
    pub bucket_id: String,
}

impl CleanupConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let values = require(lookup, &[RETENTION_PERIOD_DAYS, APPWRITE_BUCKET_ID])?;
        let [retention, bucket_id]: [String; 2] = values.try_into().map_err(|_| {
            ConfigError::Missing(vec![
                RETENTION_PERIOD_DAYS.to_string(),
                APPWRITE_BUCKET_ID.to_string(),
            ])
        })?;

        Ok(Self {
            retention_days: parse_retention_days(&retention)?,
            bucket_id,
        })
    }
}

pub fn parse_retention_days(value: &str) -> Result<NonZeroU32, ConfigError> {
    value
        .trim()
        .parse::<NonZeroU32>()
        .map_err(|_| ConfigError::Invalid {
            key: RETENTION_PERIOD_DAYS.to_string(),
            value: value.to_string(),
        })
}

/// Where the storage client sends its requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEndpoint {
    pub endpoint: String,
    pub project_id: String,
}

impl StorageEndpoint {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let values = require(lookup, &[APPWRITE_ENDPOINT, APPWRITE_PROJECT_ID])?;
        let [endpoint, project_id]: [String; 2] = values.try_into().map_err(|_| {
            ConfigError::Missing(vec![
                APPWRITE_ENDPOINT.to_string(),
                APPWRITE_PROJECT_ID.to_string(),
            ])
        })?;

        Ok(Self {
            endpoint,
            project_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_require_lists_all_missing_keys_in_order() {
        let err = require(lookup_from(&[("B", "set")]), &["A", "B", "C"]).unwrap_err();
        assert_eq!(err, ConfigError::Missing(vec!["A".into(), "C".into()]));
        assert_eq!(err.to_string(), "Missing required fields: A, C");
    }

    #[test]
    fn test_require_rejects_empty() {
        let err = require(lookup_from(&[("A", ""), ("B", "  "), ("C", "x")]), &["A", "B", "C"])
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing(vec!["A".into(), "B".into()]));
    }

    #[test]
    fn test_require_only_treats_zero_retention_as_missing() {
        let values = require(
            lookup_from(&[(APPWRITE_BUCKET_ID, "0"), (GITHUB_TOKEN, "00")]),
            &[APPWRITE_BUCKET_ID, GITHUB_TOKEN],
        )
        .unwrap();
        assert_eq!(values, vec!["0".to_string(), "00".to_string()]);

        let err = require(
            lookup_from(&[(RETENTION_PERIOD_DAYS, "00")]),
            &[RETENTION_PERIOD_DAYS],
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing(vec![RETENTION_PERIOD_DAYS.into()]));
    }

    #[test]
    fn test_cleanup_config_accepts_zero_like_bucket_id() {
        let config = CleanupConfig::from_lookup(lookup_from(&[
            (RETENTION_PERIOD_DAYS, "7"),
            (APPWRITE_BUCKET_ID, "0"),
        ]))
        .unwrap();
        assert_eq!(config.bucket_id, "0");
    }

    #[test]
    fn test_webhook_config() {
        let config = WebhookConfig::from_lookup(lookup_from(&[
            (GITHUB_WEBHOOK_SECRET, "secret"),
            (GITHUB_TOKEN, "token"),
        ]))
        .unwrap();
        assert_eq!(config.webhook_secret, "secret");
        assert_eq!(config.github_token, "token");

        let debug = format!("{config:?}");
        assert!(!debug.contains("\"secret\""));
        assert!(!debug.contains("\"token\""));
    }

    #[test]
    fn test_webhook_config_missing_token() {
        let err =
            WebhookConfig::from_lookup(lookup_from(&[(GITHUB_WEBHOOK_SECRET, "secret")])).unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields: GITHUB_TOKEN");
    }

    #[test]
    fn test_cleanup_config() {
        let config = CleanupConfig::from_lookup(lookup_from(&[
            (RETENTION_PERIOD_DAYS, "30"),
            (APPWRITE_BUCKET_ID, "uploads"),
        ]))
        .unwrap();
        assert_eq!(config.retention_days.get(), 30);
        assert_eq!(config.bucket_id, "uploads");
    }

    #[test]
    fn test_cleanup_config_zero_retention() {
        let err = CleanupConfig::from_lookup(lookup_from(&[
            (RETENTION_PERIOD_DAYS, "0"),
            (APPWRITE_BUCKET_ID, "uploads"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing(vec![RETENTION_PERIOD_DAYS.into()]));
    }

    #[test]
    fn test_cleanup_config_absent_retention() {
        let err =
            CleanupConfig::from_lookup(lookup_from(&[(APPWRITE_BUCKET_ID, "uploads")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(vec![RETENTION_PERIOD_DAYS.into()]));
    }

    #[test]
    fn test_cleanup_config_non_integer_retention() {
        let err = CleanupConfig::from_lookup(lookup_from(&[
            (RETENTION_PERIOD_DAYS, "thirty"),
            (APPWRITE_BUCKET_ID, "uploads"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_parse_retention_days_rejects_negative() {
        assert!(parse_retention_days("-5").is_err());
        assert_eq!(parse_retention_days(" 7 ").unwrap().get(), 7);
    }

    #[test]
    fn test_storage_endpoint() {
        let endpoint = StorageEndpoint::from_lookup(lookup_from(&[
            (APPWRITE_ENDPOINT, "https://cloud.appwrite.io/v1"),
            (APPWRITE_PROJECT_ID, "project"),
        ]))
        .unwrap();
        assert_eq!(endpoint.endpoint, "https://cloud.appwrite.io/v1");
        assert_eq!(endpoint.project_id, "project");
    }
}

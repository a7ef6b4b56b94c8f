//! Configuration loaded from environment variables with sensible defaults.

use anyhow::{Context, Result};
use serde::Serialize;
use std::env;
use std::str::FromStr;

use crate::application::service::DEFAULT_MAX_RETRIES;
use crate::domain::services::pricing::ShippingRates;
use crate::domain::value_objects::{Metres, Money};

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// PostgreSQL storage when set, in-memory otherwise.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Order events go to NATS when set, to the log otherwise.
    pub nats_url: Option<String>,
    pub nats_subject_prefix: String,
    pub shipping: ShippingRates,
    pub max_update_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8083,
            database_url: None,
            database_max_connections: 10,
            nats_url: None,
            nats_subject_prefix: "orders".into(),
            shipping: ShippingRates::default(),
            max_update_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] against an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT", defaults.port)?,
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", defaults.database_max_connections)?,
            nats_url: non_empty("NATS_URL"),
            nats_subject_prefix: non_empty("NATS_SUBJECT_PREFIX").unwrap_or(defaults.nats_subject_prefix),
            shipping: ShippingRates {
                base_fee: Money::new(parse(&lookup, "SHIPPING_BASE_FEE", defaults.shipping.base_fee.amount())?),
                per_km_fee: Money::new(parse(&lookup, "SHIPPING_PER_KM_FEE", defaults.shipping.per_km_fee.amount())?),
                average_distance: Metres::new(parse(&lookup, "SHIPPING_AVERAGE_DISTANCE_M", defaults.shipping.average_distance.value())?),
            },
            max_update_retries: parse(&lookup, "ORDER_UPDATE_MAX_RETRIES", defaults.max_update_retries)?,
        })
    }

    pub fn bind_address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn parse<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().with_context(|| format!("invalid value for {key}: {raw:?}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8083);
        assert!(config.database_url.is_none());
        assert_eq!(config.shipping, ShippingRates::default());
        assert_eq!(config.max_update_retries, 3);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "9000"), ("DATABASE_URL", "postgres://localhost/orders"),
            ("SHIPPING_BASE_FEE", "12000"), ("ORDER_UPDATE_MAX_RETRIES", "5"), ("NATS_URL", " "),
        ])).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/orders"));
        assert_eq!(config.shipping.base_fee, Money::new(12_000));
        assert_eq!(config.max_update_retries, 5);
        assert!(config.nats_url.is_none());
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let err = Config::from_lookup(lookup(&[("SHIPPING_PER_KM_FEE", "-5")])).unwrap_err();
        assert!(err.to_string().contains("SHIPPING_PER_KM_FEE"));
    }
}

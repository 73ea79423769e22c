//! Command-line interface for inspecting the on-disk cache
//!
//! This module handles parsing of CLI arguments using clap and runs each
//! subcommand against a `ReadThroughCache` backed by a `FileStore`.

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{
    derive_key, parse_namespace, CacheConfig, ConfigError, FileStore, QueryParams,
    ReadThroughCache, DEFAULT_NAMESPACE,
};

/// Error types for the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// A value argument is not valid JSON
    #[error("Invalid JSON value '{input}': {source}")]
    InvalidJson {
        input: String,
        source: serde_json::Error,
    },

    /// A query parameter argument is not of the form name=value
    #[error("Invalid parameter: '{0}'. Expected name=value")]
    InvalidParam(String),

    /// The namespace cannot own durable keys
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No --dir was given and no default cache directory exists
    #[error("No cache directory available; pass --dir")]
    NoCacheDir,

    /// Writing output failed
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    /// Encoding output failed
    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// SprintSaaS cache tool - inspect and edit cached storefront queries
#[derive(Parser, Debug)]
#[command(name = "sprintcache")]
#[command(about = "Inspect and manage the SprintSaaS storefront query cache")]
#[command(version)]
pub struct Cli {
    /// Directory holding cache files (defaults to the XDG cache directory)
    #[arg(long, value_name = "DIR", global = true)]
    pub dir: Option<PathBuf>,

    /// Namespace identifying entries owned by the cache
    #[arg(
        long,
        value_name = "NAME",
        default_value = DEFAULT_NAMESPACE,
        value_parser = parse_namespace,
        global = true
    )]
    pub namespace: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Cache operations
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print the cached value for a key and whether it is stale
    Get { key: String },

    /// Cache a JSON value under a key
    ///
    /// Examples:
    ///   sprintcache set categories '["ui-kits","saas"]'
    ///   sprintcache set 'kits?page=1' '{"total":42}' --ttl-secs 60
    Set {
        key: String,
        /// Value as JSON
        value: String,
        /// Seconds until the entry goes stale (defaults to 300)
        #[arg(long, value_name = "SECS")]
        ttl_secs: Option<u64>,
    },

    /// Remove a key
    Evict { key: String },

    /// Remove every key owned by the cache
    EvictAll,

    /// List cached keys
    List,

    /// Print the cache key for a resource and its query parameters
    ///
    /// Examples:
    ///   sprintcache key listings page=2 category=saas
    Key {
        base: String,
        /// Parameters as name=value
        params: Vec<String>,
    },
}

/// Parses a `name=value` argument; the value may itself contain `=`
pub fn parse_param_arg(s: &str) -> Result<(String, String), CliError> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(CliError::InvalidParam(s.to_string())),
    }
}

/// Parses a JSON value argument
pub fn parse_json_arg(s: &str) -> Result<Value, CliError> {
    serde_json::from_str(s).map_err(|source| CliError::InvalidJson {
        input: s.to_string(),
        source,
    })
}

impl Cli {
    /// Cache settings derived from the global flags
    pub fn cache_config(&self) -> Result<CacheConfig, CliError> {
        Ok(CacheConfig::new().with_namespace(&self.namespace)?)
    }

    /// The store selected by `--dir`, or the default cache directory
    pub fn store(&self) -> Result<FileStore, CliError> {
        match &self.dir {
            Some(dir) => Ok(FileStore::with_dir(dir.clone())),
            None => FileStore::new().ok_or(CliError::NoCacheDir),
        }
    }

    /// The file-backed cache the commands operate on
    fn cache(&self) -> Result<ReadThroughCache, CliError> {
        Ok(ReadThroughCache::new(self.cache_config()?).with_durable(self.store()?))
    }

    /// Runs the selected command, writing results to `out`
    pub fn execute(&self, out: &mut impl Write) -> Result<(), CliError> {
        match &self.command {
            Command::Get { key } => {
                let cached = self.cache()?.get::<Value>(key);
                let report = json!({
                    "key": key,
                    "value": cached.value,
                    "is_stale": cached.is_stale,
                });
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            }
            Command::Set {
                key,
                value,
                ttl_secs,
            } => {
                let value = parse_json_arg(value)?;
                let cache = self.cache()?;
                let ttl = ttl_secs
                    .map(Duration::from_secs)
                    .unwrap_or(cache.config().default_ttl);
                cache.set_with_ttl(key, &value, ttl);
            }
            Command::Evict { key } => self.cache()?.evict(key),
            Command::EvictAll => self.cache()?.evict_all(),
            Command::List => {
                for key in self.cache()?.durable_keys() {
                    writeln!(out, "{}", key)?;
                }
            }
            Command::Key { base, params } => {
                let params = params
                    .iter()
                    .map(|p| parse_param_arg(p).map(|(name, value)| (name, Some(value))))
                    .collect::<Result<QueryParams, _>>()?;
                writeln!(out, "{}", derive_key(base, &params))?;
            }
        }

        Ok(())
    }
}

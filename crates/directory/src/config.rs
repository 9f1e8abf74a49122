// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Configuration for the switch directory service.
#[derive(Debug, Clone, Parser)]
#[command(name = "switchdir", version, about = "Group space switch directory")]
pub struct DirectoryConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "SWITCHDIR_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9810, env = "SWITCHDIR_PORT")]
    pub port: u16,

    /// Bearer token for API auth. If unset, auth is disabled.
    #[arg(long, env = "SWITCHDIR_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Path to a world seed JSON file (spaces and characters).
    #[arg(long, env = "SWITCHDIR_WORLD")]
    pub world: Option<PathBuf>,

    /// Abort a switch when one stage stays open this long. 0 disables.
    #[arg(long, default_value_t = 30_000, env = "SWITCHDIR_STAGE_TIMEOUT_MS")]
    pub stage_timeout_ms: u64,

    /// Log filter (tracing `EnvFilter` syntax).
    #[arg(long, default_value = "info", env = "SWITCHDIR_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: `text` or `json`.
    #[arg(long, default_value = "text", env = "SWITCHDIR_LOG_FORMAT")]
    pub log_format: String,
}

impl DirectoryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("invalid log format: {other} (expected text or json)"),
        }
        if self.auth_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            anyhow::bail!("--auth-token must not be blank");
        }
        if let Some(ref path) = self.world {
            if !path.is_file() {
                anyhow::bail!("world file not found: {}", path.display());
            }
        }
        Ok(())
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        (self.stage_timeout_ms > 0).then(|| Duration::from_millis(self.stage_timeout_ms))
    }

    /// Config for in-process use (tests, embedding): no auth, no seed file.
    pub fn test() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            auth_token: None,
            world: None,
            stage_timeout_ms: 5_000,
            log_level: "debug".into(),
            log_format: "text".into(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

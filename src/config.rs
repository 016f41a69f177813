// Copyright 2025 The gitserv Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "GITSERV_CONFIG";

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Public base URL of the server, with trailing slash. Used for the
    /// LFS endpoint and exported to hooks.
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// "prod" suppresses diagnostic detail on stderr; anything else is a
    /// development profile.
    #[serde(default = "default_run_mode")]
    pub run_mode: String,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub internal: InternalConfig,

    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub lfs: LfsConfig,

    #[serde(default)]
    pub annex: AnnexConfig,

    #[serde(default)]
    pub pprof: PprofConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Root directory holding all bare repositories; the dispatcher's fixed
    /// working directory.
    #[serde(default = "default_repo_root")]
    pub root: PathBuf,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            root: default_repo_root(),
        }
    }
}

/// Private administrative API used for authorization decisions.
#[derive(Debug, Serialize, Deserialize)]
pub struct InternalConfig {
    #[serde(default = "default_internal_url")]
    pub api_url: String,

    /// Shared secret presented as a bearer token on every internal call.
    #[serde(default)]
    pub token: String,
}

impl Default for InternalConfig {
    fn default() -> Self {
        Self {
            api_url: default_internal_url(),
            token: String::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SshConfig {
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LfsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Symmetric secret for signing LFS bearer tokens.
    #[serde(default)]
    pub jwt_secret: String,

    /// Token lifetime in seconds.
    #[serde(default = "default_lfs_expiry")]
    pub auth_expiry_secs: u64,
}

impl Default for LfsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jwt_secret: String::new(),
            auth_expiry_secs: default_lfs_expiry(),
        }
    }
}

impl LfsConfig {
    pub fn auth_expiry(&self) -> Duration {
        Duration::from_secs(self.auth_expiry_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct AnnexConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PprofConfig {
    #[serde(default = "default_pprof_path")]
    pub data_path: PathBuf,
}

impl Default for PprofConfig {
    fn default() -> Self {
        Self {
            data_path: default_pprof_path(),
        }
    }
}

fn default_app_url() -> String {
    "http://localhost:3000/".to_string()
}

fn default_run_mode() -> String {
    "prod".to_string()
}

fn default_repo_root() -> PathBuf {
    PathBuf::from("/data/git/repositories")
}

fn default_internal_url() -> String {
    "http://localhost:3000/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_lfs_expiry() -> u64 {
    3600
}

fn default_pprof_path() -> PathBuf {
    PathBuf::from("/tmp/gitserv-pprof")
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        let expanded_path = expand_tilde(path);

        let content = fs::read_to_string(&expanded_path)
            .await
            .with_context(|| format!("Failed to read configuration file at {expanded_path:?}"))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML configuration at {expanded_path:?}"))?;

        Ok(config)
    }

    /// Load configuration with priority order:
    /// 1. Explicit path from `GITSERV_CONFIG`
    /// 2. Current directory `gitserv.yaml`
    /// 3. User config `~/.config/gitserv/config.yaml`
    ///
    /// An explicitly named file that fails to load is an error; the probed
    /// locations fall through to built-in defaults.
    pub async fn load_with_priority() -> Result<Self> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&explicit)).await;
        }

        let current_dir_config = PathBuf::from("gitserv.yaml");
        if current_dir_config.exists() {
            if let Ok(config) = Self::load(&current_dir_config).await {
                return Ok(config);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".config").join("gitserv").join("config.yaml");
            if home_config.exists() {
                if let Ok(config) = Self::load(&home_config).await {
                    return Ok(config);
                }
            }
        }

        tracing::debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    pub fn is_prod(&self) -> bool {
        self.run_mode != "dev"
    }

    pub fn lfs_secret_bytes(&self) -> &[u8] {
        self.lfs.jwt_secret.as_bytes()
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if path_str.starts_with("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(path_str.replacen('~', &home, 1));
            }
        }
    }
    path.to_path_buf()
}

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

//! Client for the private authorization API.
//!
//! This is the single enforcement point: no subprocess is dispatched and no
//! token issued without a successful decision from `serv_command`. Denials
//! with a client-error status surface their message to the caller; anything
//! else collapses to a generic internal error.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::command::AccessMode;
use crate::config::InternalConfig;
use crate::error::ServError;

/// Request sent to the authorization service for a forwarded command.
#[derive(Debug, Serialize)]
pub struct AccessRequest<'a> {
    pub key_id: i64,
    pub owner_name: &'a str,
    pub repo_name: &'a str,
    pub mode: u8,
    pub verb: &'a str,
    pub lfs_verb: &'a str,
}

impl<'a> AccessRequest<'a> {
    pub fn new(
        key_id: i64,
        owner_name: &'a str,
        repo_name: &'a str,
        mode: AccessMode,
        verb: &'a str,
        lfs_verb: &'a str,
    ) -> Self {
        Self {
            key_id,
            owner_name,
            repo_name,
            mode: mode.as_u8(),
            verb,
            lfs_verb,
        }
    }
}

/// Successful authorization decision. Consumed once, never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessDecision {
    pub repo_id: i64,
    pub owner_name: String,
    pub repo_name: String,
    pub user_id: i64,
    pub user_name: String,
    pub user_email: String,
    pub is_wiki: bool,
    pub key_id: i64,
    pub deploy_key_id: i64,
}

/// Key/user lookup for the interactive-login greeting.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyUserInfo {
    pub key_name: String,
    /// "user", "deploy", or "principal".
    pub key_type: String,
    /// Key content, shown for principals in place of a name.
    #[serde(default)]
    pub key_content: String,
    #[serde(default)]
    pub user_name: String,
}

/// Denial payload; the service reports a bare message.
#[derive(Debug, Deserialize)]
struct DenialBody {
    #[serde(default)]
    message: String,
}

pub struct AuthClient {
    client: Client,
    base_url: String,
    token: String,
}

impl AuthClient {
    pub fn new(config: &InternalConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    /// Ask for a decision on a forwarded command.
    pub async fn serv_command(
        &self,
        request: &AccessRequest<'_>,
    ) -> Result<AccessDecision, ServError> {
        let url = format!("{}/api/internal/serv/command", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| ServError::Internal {
                detail: format!("authorization service unreachable: {e}"),
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| ServError::Internal {
            detail: format!("failed to read authorization response: {e}"),
        })?;
        interpret_response(status, &body)
    }

    /// Look up the key and user for a connection without a forwarded
    /// command (an interactive login attempt).
    pub async fn serv_no_command(&self, key_id: i64) -> Result<KeyUserInfo, ServError> {
        let url = format!("{}/api/internal/serv/none/{key_id}", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ServError::Internal {
                detail: format!("authorization service unreachable: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(ServError::Internal {
                detail: format!("key lookup failed with status {}", response.status()),
            });
        }
        response.json().await.map_err(|e| ServError::Internal {
            detail: format!("malformed key lookup response: {e}"),
        })
    }

    /// Record key activity against a repository after a successful dispatch.
    /// Losing this update silently would lose audit data, so failure is
    /// fatal for the request.
    pub async fn update_key_activity(&self, key_id: i64, repo_id: i64) -> Result<(), ServError> {
        let url = format!(
            "{}/api/internal/ssh/{key_id}/update/{repo_id}",
            self.base_url
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ServError::Internal {
                detail: format!("key activity update unreachable: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(ServError::Internal {
                detail: format!("key activity update failed with status {}", response.status()),
            });
        }
        Ok(())
    }
}

/// Map an authorization response to a decision or a denial class.
///
/// 2xx carries a decision payload. 4xx is a client-error denial whose
/// message is surfaced verbatim. 5xx (and an unparseable 2xx) is an
/// internal error; its detail is only ever logged.
fn interpret_response(status: StatusCode, body: &[u8]) -> Result<AccessDecision, ServError> {
    if status.is_success() {
        return serde_json::from_slice(body).map_err(|e| ServError::Internal {
            detail: format!("malformed authorization decision: {e}"),
        });
    }

    let message = serde_json::from_slice::<DenialBody>(body)
        .map(|d| d.message)
        .unwrap_or_default();

    if status.is_client_error() {
        Err(ServError::Unauthorized { message })
    } else {
        Err(ServError::Internal {
            detail: format!("authorization service returned {status}: {message}"),
        })
    }
}

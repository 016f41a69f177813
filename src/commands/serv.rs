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

//! The `serv` driver: one forwarded SSH command, start to finish.
//!
//! Sequential flow with no internal parallelism: tokenize → normalize →
//! resolve → authorize → {dispatch | issue token} → record activity. A
//! session teardown or OS interrupt cancels whichever of the authorization
//! call or the subprocess is in flight.

use tokio_util::sync::CancellationToken;

use crate::auth::{AccessRequest, AuthClient, KeyUserInfo};
use crate::cli::parse_key_id;
use crate::command::{tokenize, Dialect, ParsedCommand, LFS_AUTHENTICATE_VERB};
use crate::config::Config;
use crate::dispatch::{self, HookEnv};
use crate::error::ServError;
use crate::{lfs, repo};

/// Environment variable in which sshd forwards the original command line.
pub const SSH_ORIGINAL_COMMAND_ENV: &str = "SSH_ORIGINAL_COMMAND";

/// Serve one forwarded command for the given `key-<id>` argument.
pub async fn run(
    key_arg: &str,
    debug: bool,
    enable_pprof: bool,
    config: &Config,
) -> Result<(), ServError> {
    if config.ssh.disabled {
        println!("gitserv: SSH has been disabled");
        return Ok(());
    }

    let key_id = parse_key_id(key_arg)?;
    let client = AuthClient::new(&config.internal);

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let raw = std::env::var(SSH_ORIGINAL_COMMAND_ENV).unwrap_or_default();
    if raw.is_empty() {
        // An interactive login attempt: greet and leave with status 0.
        let info = lookup_key(&client, key_id, &cancel).await?;
        greet(&info);
        return Ok(());
    }
    if debug {
        tracing::debug!("{SSH_ORIGINAL_COMMAND_ENV}: {raw}");
    }

    // AGit clients probe capabilities before pushing.
    if raw == "ssh_info" {
        println!("{}", serde_json::json!({"type": "gitserv", "version": 1}));
        return Ok(());
    }

    let parsed = ParsedCommand::from_words(tokenize(&raw)?)?;
    let annex_dialect = matches!(parsed.dialect, Dialect::Annex { .. });
    let (repo_path, coordinate) = repo::normalize(parsed.repo_path_token(), annex_dialect)?;
    let mode = parsed.required_mode(config.lfs.enabled, config.annex.enabled)?;

    let request = AccessRequest::new(
        key_id,
        &coordinate.owner,
        &coordinate.repo,
        mode,
        &parsed.verb,
        parsed.lfs_sub_verb(),
    );
    let decision = tokio::select! {
        result = client.serv_command(&request) => result?,
        _ = cancel.cancelled() => {
            return Err(ServError::Internal {
                detail: "session cancelled during authorization".to_string(),
            });
        }
    };

    // LFS token authentication: no subprocess on this path.
    if parsed.verb == LFS_AUTHENTICATE_VERB {
        let response = lfs::token_response(
            config.lfs_secret_bytes(),
            config.lfs.auth_expiry(),
            &config.app_url,
            &decision,
            parsed.lfs_sub_verb(),
        )?;
        let payload = serde_json::to_string(&response).map_err(|e| ServError::Internal {
            detail: format!("failed to encode LFS response: {e}"),
        })?;
        println!("{payload}");
        return Ok(());
    }

    let hook_env = HookEnv::from_decision(&decision, &config.app_url);
    let invocation = dispatch::build(
        &parsed,
        &repo_path,
        mode,
        &config.repository.root,
        &hook_env,
    );

    #[cfg(unix)]
    let profiler = if enable_pprof {
        Some(crate::profiling::start(
            &config.pprof.data_path,
            &coordinate.owner,
        )?)
    } else {
        None
    };
    #[cfg(not(unix))]
    let _ = enable_pprof;

    let run_result = dispatch::run(&invocation, &cancel).await;

    #[cfg(unix)]
    if let Some(profiler) = profiler {
        profiler.stop()?;
    }

    run_result?;

    // Record key activity; losing the update silently would lose audit data.
    if decision.key_id > 0 {
        client
            .update_key_activity(decision.key_id, decision.repo_id)
            .await?;
    }

    Ok(())
}

async fn lookup_key(
    client: &AuthClient,
    key_id: i64,
    cancel: &CancellationToken,
) -> Result<KeyUserInfo, ServError> {
    tokio::select! {
        result = client.serv_no_command(key_id) => result,
        _ = cancel.cancelled() => Err(ServError::Internal {
            detail: "session cancelled during key lookup".to_string(),
        }),
    }
}

fn greet(info: &KeyUserInfo) {
    match info.key_type.as_str() {
        "deploy" => println!(
            "Hi there! You've successfully authenticated with the deploy key named {}, but gitserv does not provide shell access.",
            info.key_name
        ),
        "principal" => println!(
            "Hi there! You've successfully authenticated with the principal {}, but gitserv does not provide shell access.",
            info.key_content
        ),
        _ => println!(
            "Hi there, {}! You've successfully authenticated with the key named {}, but gitserv does not provide shell access.",
            info.user_name, info.key_name
        ),
    }
    println!("If this is unexpected, please log in with password and setup gitserv under another user.");
}

fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("failed to install SIGTERM handler: {e}");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        cancel.cancel();
    });
}

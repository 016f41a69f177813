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

//! Construction and execution of the approved subprocess.
//!
//! Arguments are a literal vector, never a string re-split by a shell, so a
//! repository name can not smuggle options or commands. The environment is
//! the process environment plus the enumerated [`HookEnv`] set; nothing is
//! mutated ambiently.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::auth::AccessDecision;
use crate::command::{AccessMode, Dialect, ParsedCommand, ANNEX_SHELL_VERB};
use crate::error::ServError;

/// The closed set of variables by which the dispatched subprocess and its
/// hooks learn who is acting. This is the only channel.
#[derive(Debug, Clone)]
pub struct HookEnv {
    pub is_wiki: bool,
    pub repo_name: String,
    pub owner_name: String,
    pub pusher_name: String,
    pub pusher_email: String,
    pub pusher_id: i64,
    pub repo_id: i64,
    /// Placeholder; always 0 for SSH dispatch.
    pub pr_id: i64,
    pub deploy_key_id: i64,
    pub key_id: i64,
    pub app_url: String,
}

impl HookEnv {
    pub fn from_decision(decision: &AccessDecision, app_url: &str) -> Self {
        Self {
            is_wiki: decision.is_wiki,
            repo_name: decision.repo_name.clone(),
            owner_name: decision.owner_name.clone(),
            pusher_name: decision.user_name.clone(),
            pusher_email: decision.user_email.clone(),
            pusher_id: decision.user_id,
            repo_id: decision.repo_id,
            pr_id: 0,
            deploy_key_id: decision.deploy_key_id,
            key_id: decision.key_id,
            app_url: app_url.to_string(),
        }
    }

    /// Render as additive environment pairs.
    pub fn to_env(&self) -> Vec<(String, String)> {
        vec![
            ("GITSERV_REPO_IS_WIKI".to_string(), self.is_wiki.to_string()),
            ("GITSERV_REPO_NAME".to_string(), self.repo_name.clone()),
            ("GITSERV_REPO_USER_NAME".to_string(), self.owner_name.clone()),
            ("GITSERV_PUSHER_NAME".to_string(), self.pusher_name.clone()),
            ("GITSERV_PUSHER_EMAIL".to_string(), self.pusher_email.clone()),
            ("GITSERV_PUSHER_ID".to_string(), self.pusher_id.to_string()),
            ("GITSERV_REPO_ID".to_string(), self.repo_id.to_string()),
            ("GITSERV_PR_ID".to_string(), self.pr_id.to_string()),
            (
                "GITSERV_DEPLOY_KEY_ID".to_string(),
                self.deploy_key_id.to_string(),
            ),
            ("GITSERV_KEY_ID".to_string(), self.key_id.to_string()),
            ("GITSERV_APP_URL".to_string(), self.app_url.clone()),
        ]
    }
}

/// A fully constructed subprocess invocation, inspectable before launch.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
}

/// Rewrite a git-family verb for platforms where the tools are reached
/// through `git.exe` (`git-upload-pack` becomes `git upload-pack`). Exactly
/// the first separator is substituted.
#[cfg_attr(not(windows), allow(dead_code))]
fn rewrite_verb_separator(verb: &str) -> String {
    verb.replacen('-', " ", 1)
}

#[cfg(windows)]
fn platform_verb(verb: &str) -> String {
    rewrite_verb_separator(verb)
}

#[cfg(not(windows))]
fn platform_verb(verb: &str) -> String {
    verb.to_string()
}

/// Build the argument vector and environment for an approved command.
///
/// `repo_path` is the normalized relative path under `repo_root`. The annex
/// dialect gets the path rewritten to an absolute one (git-annex-shell
/// requires it) and a hardened execution environment; sub-Write modes are
/// additionally pinned read-only.
pub fn build(
    parsed: &ParsedCommand,
    repo_path: &str,
    mode: AccessMode,
    repo_root: &Path,
    hook_env: &HookEnv,
) -> Dispatch {
    let mut env = hook_env.to_env();

    if let Dialect::Annex { .. } = parsed.dialect {
        let absolute = repo_root.join(repo_path).to_string_lossy().into_owned();

        let mut args: Vec<String> = parsed.words[1..].to_vec();
        args[1] = absolute.clone();

        // "If set, disallows running git-shell to handle unknown commands."
        // - git-annex-shell(1)
        env.push(("GIT_ANNEX_SHELL_LIMITED".to_string(), "True".to_string()));
        // "If set, git-annex-shell will refuse to run commands that do not
        //  operate on the specified directory." - git-annex-shell(1)
        env.push(("GIT_ANNEX_SHELL_DIRECTORY".to_string(), absolute));
        if mode < AccessMode::Write {
            // "If set, disallows any action that could modify the git-annex
            //  repository." - git-annex-shell(1)
            env.push(("GIT_ANNEX_SHELL_READONLY".to_string(), "True".to_string()));
        }

        return Dispatch {
            program: ANNEX_SHELL_VERB.to_string(),
            args,
            env,
            cwd: repo_root.to_path_buf(),
        };
    }

    let verb = platform_verb(&parsed.verb);
    let mut parts = verb.split_whitespace().map(str::to_string);
    let program = parts.next().unwrap_or_else(|| parsed.verb.clone());
    let mut args: Vec<String> = parts.collect();
    args.push(repo_path.to_string());

    Dispatch {
        program,
        args,
        env,
        cwd: repo_root.to_path_buf(),
    }
}

/// Run the dispatched subprocess with transparent stdio.
///
/// The subprocess is the SSH session's payload: stdin/stdout/stderr are
/// inherited and nothing is buffered or inspected. Cancellation kills the
/// whole process group so a dropped session can not leave a git process
/// holding repository locks.
pub async fn run(dispatch: &Dispatch, cancel: &CancellationToken) -> Result<(), ServError> {
    let mut cmd = Command::new(&dispatch.program);
    cmd.args(&dispatch.args)
        .envs(dispatch.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .current_dir(&dispatch.cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|e| ServError::ExecutionFailed {
        detail: format!("failed to spawn {}: {e}", dispatch.program),
    })?;

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| ServError::ExecutionFailed {
                detail: format!("failed to wait for {}: {e}", dispatch.program),
            })?;
            if status.success() {
                Ok(())
            } else {
                Err(ServError::ExecutionFailed {
                    detail: format!("{} exited with {status}", dispatch.program),
                })
            }
        }
        _ = cancel.cancelled() => {
            tracing::warn!("session cancelled, terminating {}", dispatch.program);
            #[cfg(unix)]
            {
                if let Some(pid) = child.id() {
                    // Negative pid targets the process group we created.
                    // SAFETY: plain signal send, no memory involved.
                    unsafe {
                        libc::kill(-(pid as i32), libc::SIGKILL);
                    }
                }
            }
            let _ = child.kill().await;
            Err(ServError::ExecutionFailed {
                detail: "session cancelled while subprocess was running".to_string(),
            })
        }
    }
}

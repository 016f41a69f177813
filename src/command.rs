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

//! Tokenizing the forwarded command and resolving its verb to an access mode.
//!
//! The verb and sub-verb tables below are the authorization surface of the
//! gateway: they are plain data, closed, and fail-closed. Anything outside
//! them is rejected before the authorization service is ever contacted.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::ServError;

/// Verb that requests an LFS bearer token instead of a subprocess.
pub const LFS_AUTHENTICATE_VERB: &str = "git-lfs-authenticate";

/// Verb for the git-annex shell dialect.
pub const ANNEX_SHELL_VERB: &str = "git-annex-shell";

/// Ordered permission level required to perform an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessMode {
    None,
    Read,
    Write,
}

impl AccessMode {
    /// Wire representation used by the authorization service.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Read => 1,
            Self::Write => 2,
        }
    }
}

/// The closed table of supported verbs. LFS and annex start at `None` and
/// are refined per sub-verb; annex write access is otherwise withheld by
/// `GIT_ANNEX_SHELL_READONLY` in the dispatcher.
static ALLOWED_VERBS: Lazy<HashMap<&'static str, AccessMode>> = Lazy::new(|| {
    HashMap::from([
        ("git-upload-pack", AccessMode::Read),
        ("git-upload-archive", AccessMode::Read),
        ("git-receive-pack", AccessMode::Write),
        (LFS_AUTHENTICATE_VERB, AccessMode::None),
        (ANNEX_SHELL_VERB, AccessMode::None),
    ])
});

/// The closed table of git-annex-shell sub-verbs. Listing, presence, and
/// transfer-status queries are reads; anything that can mutate annexed
/// content, receive keys, set up encryption, or take locks is a write.
static ANNEX_SUB_VERBS: Lazy<HashMap<&'static str, AccessMode>> = Lazy::new(|| {
    HashMap::from([
        ("commit", AccessMode::Write),
        ("configlist", AccessMode::Read),
        ("dropkey", AccessMode::Write),
        ("gcryptsetup", AccessMode::Write),
        ("inannex", AccessMode::Read),
        ("lockcontent", AccessMode::Write),
        ("notifychanges", AccessMode::Read),
        ("p2pstdio", AccessMode::Write),
        ("recvkey", AccessMode::Write),
        ("sendkey", AccessMode::Read),
        ("transferinfo", AccessMode::Read),
    ])
});

/// Which sub-protocol a parsed command belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialect {
    /// Plain git verb: `<verb> <path>`.
    Git,
    /// `git-lfs-authenticate <path> <upload|download>`.
    Lfs { sub_verb: Option<String> },
    /// `git-annex-shell <sub-verb> <path> [args...]` — note the path sits
    /// at the third token, not the second.
    Annex { sub_verb: String },
}

/// An immutable, tokenized forwarded command.
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub verb: String,
    pub dialect: Dialect,
    pub words: Vec<String>,
}

/// Split the raw forwarded command into shell words.
///
/// Unbalanced quoting rejects rather than guesses: mis-tokenization is an
/// injection vector.
pub fn tokenize(raw: &str) -> Result<Vec<String>, ServError> {
    shell_words::split(raw).map_err(|e| ServError::Parse {
        detail: format!("failed to split {raw:?}: {e}"),
    })
}

impl ParsedCommand {
    /// Parse a tokenized command into a verb plus dialect.
    pub fn from_words(words: Vec<String>) -> Result<Self, ServError> {
        if words.len() < 2 {
            return Err(ServError::TooFewArguments {
                cmd: words.join(" "),
            });
        }

        let verb = words[0].clone();
        let dialect = if verb == LFS_AUTHENTICATE_VERB {
            Dialect::Lfs {
                sub_verb: words.get(2).cloned(),
            }
        } else if verb == ANNEX_SHELL_VERB {
            // git-annex-shell puts the repo at words[2], after its sub-verb.
            if words.len() < 3 {
                return Err(ServError::TooFewArguments {
                    cmd: words.join(" "),
                });
            }
            Dialect::Annex {
                sub_verb: words[1].clone(),
            }
        } else {
            Dialect::Git
        };

        Ok(Self {
            verb,
            dialect,
            words,
        })
    }

    /// The raw token holding the repository path for this dialect.
    pub fn repo_path_token(&self) -> &str {
        match self.dialect {
            Dialect::Annex { .. } => &self.words[2],
            _ => &self.words[1],
        }
    }

    /// The LFS sub-verb as sent to the authorization service; empty for
    /// every other dialect.
    pub fn lfs_sub_verb(&self) -> &str {
        match &self.dialect {
            Dialect::Lfs {
                sub_verb: Some(sub),
            } => sub,
            _ => "",
        }
    }

    /// Resolve the access mode this command requires.
    ///
    /// Consults only the closed tables; the authorization service is never
    /// involved here. Disabled subsystems reject before their sub-verb is
    /// even looked at.
    pub fn required_mode(
        &self,
        lfs_enabled: bool,
        annex_enabled: bool,
    ) -> Result<AccessMode, ServError> {
        let base = *ALLOWED_VERBS
            .get(self.verb.as_str())
            .ok_or_else(|| ServError::UnknownCommand {
                verb: self.verb.clone(),
            })?;

        match &self.dialect {
            Dialect::Git => Ok(base),
            Dialect::Lfs { sub_verb } => {
                if !lfs_enabled {
                    return Err(ServError::ServiceDisabled { service: "LFS" });
                }
                match sub_verb.as_deref() {
                    Some("upload") => Ok(AccessMode::Write),
                    Some("download") => Ok(AccessMode::Read),
                    other => Err(ServError::UnknownSubVerb {
                        dialect: "LFS",
                        sub_verb: other.unwrap_or_default().to_string(),
                    }),
                }
            }
            Dialect::Annex { sub_verb } => {
                if !annex_enabled {
                    return Err(ServError::ServiceDisabled { service: "git-annex" });
                }
                ANNEX_SUB_VERBS
                    .get(sub_verb.as_str())
                    .copied()
                    .ok_or_else(|| ServError::UnknownSubVerb {
                        dialect: "annex",
                        sub_verb: sub_verb.clone(),
                    })
            }
        }
    }
}

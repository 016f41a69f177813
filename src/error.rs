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

//! Failure taxonomy and the fail-closed reporter.
//!
//! Every stage of the gateway converts a failure at the point of detection
//! into one of these classes and terminates the request. The text shown to
//! the remote client is deliberately short and generic; the detailed
//! `Display` form only ever reaches the diagnostic channel.

use std::io::Write;

use thiserror::Error;

/// Errors that terminate a forwarded SSH command.
#[derive(Debug, Error)]
pub enum ServError {
    /// The forwarded command string could not be tokenized.
    #[error("failed to parse forwarded command: {detail}")]
    Parse { detail: String },

    /// Fewer than the required number of tokens.
    #[error("too few arguments in forwarded command: {cmd}")]
    TooFewArguments { cmd: String },

    /// The path token did not split into owner/repo.
    #[error("invalid repository path: {path}")]
    InvalidRepositoryPath { path: String },

    /// The repo component failed allow-list validation.
    #[error("invalid repo name: {name}")]
    InvalidRepoName { name: String },

    /// A sub-protocol is administratively disabled.
    #[error("{service} request over SSH denied, {service} support is disabled")]
    ServiceDisabled { service: &'static str },

    /// Verb outside the closed table.
    #[error("unknown git command: {verb}")]
    UnknownCommand { verb: String },

    /// Sub-verb outside the closed table for its dialect.
    #[error("unknown {dialect} verb: {sub_verb}")]
    UnknownSubVerb {
        dialect: &'static str,
        sub_verb: String,
    },

    /// The authorization service denied the request (client-error class).
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Server-error decision, transport failure, signing failure, or a
    /// failed key-activity update.
    #[error("internal error: {detail}")]
    Internal { detail: String },

    /// The dispatched subprocess failed to launch, exited non-zero, or was
    /// cancelled with the session.
    #[error("failed to execute git command: {detail}")]
    ExecutionFailed { detail: String },
}

impl ServError {
    /// Short message shown to the remote client. Internal-error classes
    /// collapse to generic text; subsystem-disabled looks identical to an
    /// unknown command so probing reveals nothing.
    pub fn client_message(&self) -> String {
        match self {
            Self::Parse { .. } => "Error parsing arguments".to_string(),
            Self::TooFewArguments { .. } => "Too few arguments".to_string(),
            Self::InvalidRepositoryPath { .. } => "Invalid repository path".to_string(),
            Self::InvalidRepoName { .. } => "Invalid repo name".to_string(),
            Self::ServiceDisabled { .. } | Self::UnknownCommand { .. } => {
                "Unknown git command".to_string()
            }
            Self::UnknownSubVerb { dialect, .. } => format!("Unknown {dialect} verb"),
            Self::Unauthorized { message } => message.clone(),
            Self::Internal { .. } | Self::ExecutionFailed { .. } => "Internal error".to_string(),
        }
    }

    /// Report this failure to the remote client and the diagnostic channel.
    ///
    /// An empty line is flushed to stdout first: some SSH clients mis-detect
    /// the exit status when the session produced no output at all. Detailed
    /// text is withheld in the production profile.
    pub fn report(&self, is_prod: bool) {
        let mut stdout = std::io::stdout();
        let _ = writeln!(stdout);
        let _ = stdout.flush();

        eprintln!("gitserv: {}", self.client_message());
        if !is_prod {
            eprintln!("{self}");
        }
        tracing::error!("{self}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_classes_are_generic() {
        let err = ServError::Internal {
            detail: "jwt signing failed: key too short".to_string(),
        };
        assert_eq!(err.client_message(), "Internal error");
        assert!(!err.client_message().contains("jwt"));

        let err = ServError::ExecutionFailed {
            detail: "exit status 128".to_string(),
        };
        assert_eq!(err.client_message(), "Internal error");
    }

    #[test]
    fn disabled_service_is_indistinguishable_from_unknown_command() {
        let disabled = ServError::ServiceDisabled { service: "LFS" };
        let unknown = ServError::UnknownCommand {
            verb: "git-frobnicate".to_string(),
        };
        assert_eq!(disabled.client_message(), unknown.client_message());
    }

    #[test]
    fn unauthorized_surfaces_service_message() {
        let err = ServError::Unauthorized {
            message: "repository does not exist or you do not have access".to_string(),
        };
        assert!(err.client_message().contains("access"));
    }

    #[test]
    fn sub_verb_message_names_dialect() {
        let err = ServError::UnknownSubVerb {
            dialect: "LFS",
            sub_verb: "frobnicate".to_string(),
        };
        assert_eq!(err.client_message(), "Unknown LFS verb");
        assert!(!err.client_message().contains("frobnicate"));
    }
}

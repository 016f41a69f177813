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

use clap::{Parser, Subcommand};

use crate::error::ServError;

#[derive(Parser, Debug)]
#[command(
    name = "gitserv",
    version,
    about = "SSH authorization and dispatch gateway for git, git-lfs, and git-annex",
    long_about = "gitserv sits between sshd and the git-family executables on a multi-tenant\ngit host. It is invoked by the SSH shell for an already key-authenticated\nconnection, reads the forwarded command from SSH_ORIGINAL_COMMAND, checks the\nrequested access against the authorization service, and either runs the\napproved git subprocess or issues an LFS bearer token."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Serve a single forwarded SSH command",
        long_about = "This command should only be called by the SSH shell. The positional\nargument identifies the authenticated key as written into authorized_keys\n(key-<id>); the forwarded command is read from SSH_ORIGINAL_COMMAND.\n\nExit codes: 0 (success or benign no-op), 1 (any failure)"
    )]
    Serv {
        #[arg(help = "Authenticated key in key-<id> form, as set in authorized_keys")]
        key: String,

        #[arg(long, help = "Enable debug logging and the development profile")]
        debug: bool,

        #[arg(long, help = "Capture a CPU profile around the dispatched command")]
        enable_pprof: bool,
    },
}

/// Parse the `key-<id>` positional argument into the numeric key id.
pub fn parse_key_id(arg: &str) -> Result<i64, ServError> {
    let id = arg.strip_prefix("key-").ok_or_else(|| ServError::Parse {
        detail: format!("invalid key argument: {arg}"),
    })?;
    id.parse::<i64>().map_err(|_| ServError::Parse {
        detail: format!("invalid key argument: {arg}"),
    })
}

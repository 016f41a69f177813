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

//! Diagnostic logging setup.
//!
//! Stdout belongs to the protocol (LFS JSON, subprocess payload), so all
//! diagnostics go to stderr.

use tracing_subscriber::EnvFilter;

/// Create an environment filter for the requested profile.
pub fn create_env_filter(debug: bool) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        // RUST_LOG overrides, for debugging dependencies too.
        EnvFilter::from_default_env()
    } else if debug {
        EnvFilter::new("gitserv=debug")
    } else {
        EnvFilter::new("gitserv=error")
    }
}

/// Initialize stderr logging.
pub fn init_logging(debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(create_env_filter(debug))
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

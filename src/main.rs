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

use clap::Parser;

use gitserv::cli::{Cli, Commands};
use gitserv::commands;
use gitserv::config::Config;
use gitserv::error::ServError;
use gitserv::utils::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serv {
            key,
            debug,
            enable_pprof,
        } => {
            init_logging(debug);

            let config = match Config::load_with_priority().await {
                Ok(mut config) => {
                    if debug {
                        config.run_mode = "dev".to_string();
                    }
                    config
                }
                Err(e) => {
                    // Configuration detail stays off the remote client's wire.
                    let err = ServError::Internal {
                        detail: format!("failed to load configuration: {e:#}"),
                    };
                    err.report(true);
                    std::process::exit(1);
                }
            };

            if let Err(err) = commands::serv::run(&key, debug, enable_pprof, &config).await {
                err.report(config.is_prod());
                std::process::exit(1);
            }
        }
    }
}

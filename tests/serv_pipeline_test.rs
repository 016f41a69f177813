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

//! End-to-end parse → normalize → resolve pipeline, as the serv driver
//! runs it before ever touching the authorization service.

use gitserv::command::{tokenize, AccessMode, Dialect, ParsedCommand};
use gitserv::error::ServError;
use gitserv::repo;

#[derive(Debug)]
struct Resolved {
    owner: String,
    repo: String,
    mode: AccessMode,
}

fn resolve(raw: &str) -> Result<Resolved, ServError> {
    let parsed = ParsedCommand::from_words(tokenize(raw)?)?;
    let annex = matches!(parsed.dialect, Dialect::Annex { .. });
    let (_, coordinate) = repo::normalize(parsed.repo_path_token(), annex)?;
    let mode = parsed.required_mode(true, true)?;
    Ok(Resolved {
        owner: coordinate.owner,
        repo: coordinate.repo,
        mode,
    })
}

#[test]
fn upload_pack_resolves_to_read() {
    let resolved = resolve("git-upload-pack '/acme/widgets.git'").unwrap();
    assert_eq!(resolved.owner, "acme");
    assert_eq!(resolved.repo, "widgets");
    assert_eq!(resolved.mode, AccessMode::Read);
}

#[test]
fn receive_pack_resolves_to_write() {
    let resolved = resolve("git-receive-pack '/acme/widgets.git'").unwrap();
    assert_eq!(resolved.mode, AccessMode::Write);
}

#[test]
fn lfs_upload_is_write_download_is_read() {
    let resolved = resolve("git-lfs-authenticate '/acme/widgets.git' upload").unwrap();
    assert_eq!(resolved.mode, AccessMode::Write);

    let resolved = resolve("git-lfs-authenticate '/acme/widgets.git' download").unwrap();
    assert_eq!(resolved.mode, AccessMode::Read);
}

#[test]
fn annex_path_sits_at_third_token() {
    let resolved = resolve("git-annex-shell configlist '/~/acme/widgets'").unwrap();
    assert_eq!(resolved.owner, "acme");
    assert_eq!(resolved.repo, "widgets");
    assert_eq!(resolved.mode, AccessMode::Read);
}

#[test]
fn unknown_verbs_never_reach_authorization() {
    for raw in [
        "git-frobnicate '/acme/widgets.git'",
        "scp -f /etc/passwd",
        "bash",
    ] {
        let result = resolve(raw);
        assert!(
            matches!(
                result,
                Err(ServError::UnknownCommand { .. }) | Err(ServError::TooFewArguments { .. })
            ),
            "{raw} should be rejected before authorization"
        );
    }
}

#[test]
fn invalid_repo_names_rejected_for_all_verbs() {
    for raw in [
        "git-upload-pack '/acme/../../../etc/shadow'",
        "git-receive-pack '/acme/widgets;id'",
        "git-lfs-authenticate '/acme/wid gets.git' upload",
        "git-annex-shell configlist '/acme/widgets$(id)'",
        "git-upload-pack '/acme/widgéts.git'",
        "git-upload-pack '/acme/репо'",
    ] {
        let result = resolve(raw);
        assert!(
            matches!(result, Err(ServError::InvalidRepoName { .. })),
            "{raw} should be rejected, got {result:?}"
        );
    }
}

#[test]
fn quoted_paths_with_spaces_round_trip_to_rejection() {
    // The tokenizer must keep the quoted path as a single token; the repo
    // validator then rejects the space. Mis-tokenization would instead
    // produce a bogus owner/repo split.
    let words = tokenize("git-upload-pack '/acme/my widgets.git'").unwrap();
    assert_eq!(words.len(), 2);
    assert!(matches!(
        resolve("git-upload-pack '/acme/my widgets.git'"),
        Err(ServError::InvalidRepoName { .. })
    ));
}

#[test]
fn malformed_quoting_is_a_parse_error() {
    assert!(matches!(
        resolve("git-upload-pack \"/acme/widgets.git"),
        Err(ServError::Parse { .. })
    ));
}

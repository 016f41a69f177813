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

//! Repository path normalization.
//!
//! The allow-list check on the repo name is the sole defense against path
//! traversal into the repository root; rejection is mandatory. This module
//! never touches the filesystem.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ServError;

/// Matches any character outside the repo-name allow-list. The class is
/// spelled out explicitly: `\w` would be Unicode-wide here and admit names
/// like `widgéts`.
static INVALID_REPO_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^0-9A-Za-z_.-]")
        .unwrap_or_else(|e| unreachable!("invalid repo-name pattern: {e}"))
});

/// Normalized (owner, repo) pair identifying a repository on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCoordinate {
    pub owner: String,
    pub repo: String,
}

/// Normalize the raw path token into the relative on-disk path plus the
/// owner/repo coordinate.
///
/// The annex dialect tolerates `/~/owner/repo` forms, as if `$HOME` were
/// going to be expanded server-side; the prefix is stripped, never honored.
/// Everything is lower-cased (repositories are stored that way), a single
/// trailing `.git` is dropped from the repo component, and the repo name is
/// validated against `[A-Za-z0-9_.-]`.
pub fn normalize(token: &str, annex_dialect: bool) -> Result<(String, RepositoryCoordinate), ServError> {
    let mut path = token;
    path = path.strip_prefix('/').unwrap_or(path);
    if annex_dialect {
        path = path.strip_prefix("~/").unwrap_or(path);
    }

    let path = path.trim().to_lowercase();

    let (owner, rest) = path
        .split_once('/')
        .ok_or_else(|| ServError::InvalidRepositoryPath { path: path.clone() })?;
    let repo = rest.strip_suffix(".git").unwrap_or(rest);

    if owner.is_empty() || repo.is_empty() {
        return Err(ServError::InvalidRepositoryPath { path: path.clone() });
    }

    if INVALID_REPO_CHARS.is_match(repo) {
        return Err(ServError::InvalidRepoName {
            name: repo.to_string(),
        });
    }

    Ok((
        path.clone(),
        RepositoryCoordinate {
            owner: owner.to_string(),
            repo: repo.to_string(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path() {
        let (path, coord) = normalize("/acme/widgets.git", false).unwrap();
        assert_eq!(path, "acme/widgets.git");
        assert_eq!(coord.owner, "acme");
        assert_eq!(coord.repo, "widgets");
    }

    #[test]
    fn test_lowercasing() {
        let (_, coord) = normalize("/Acme/Widgets.git", false).unwrap();
        assert_eq!(coord.owner, "acme");
        assert_eq!(coord.repo, "widgets");
    }

    #[test]
    fn test_annex_home_prefixes() {
        // git-annex sometimes writes repos as /~/owner/repo.
        let (path, coord) = normalize("/~/acme/widgets", true).unwrap();
        assert_eq!(path, "acme/widgets");
        assert_eq!(coord.owner, "acme");
        assert_eq!(coord.repo, "widgets");

        let (_, coord) = normalize("/acme/widgets", true).unwrap();
        assert_eq!(coord.repo, "widgets");
    }

    #[test]
    fn test_tilde_not_stripped_for_git_dialect() {
        // For plain git the ~ lands in the owner name, which is harmless;
        // it only has meaning in the annex dialect.
        let (_, coord) = normalize("/~/acme/widgets", false).unwrap();
        assert_eq!(coord.owner, "~");
    }

    #[test]
    fn test_missing_split_rejected() {
        assert!(matches!(
            normalize("widgets.git", false),
            Err(ServError::InvalidRepositoryPath { .. })
        ));
        assert!(matches!(
            normalize("/", false),
            Err(ServError::InvalidRepositoryPath { .. })
        ));
        assert!(matches!(
            normalize("/acme/", false),
            Err(ServError::InvalidRepositoryPath { .. })
        ));
        assert!(matches!(
            normalize("//widgets", false),
            Err(ServError::InvalidRepositoryPath { .. })
        ));
    }

    #[test]
    fn test_traversal_characters_rejected() {
        for token in [
            "/acme/widgets/../../etc",
            "/acme/widgets;id",
            "/acme/wid gets",
            "/acme/widgets$",
            "/acme/wi*dgets",
            // Unicode word characters are outside the allow-list too.
            "/acme/widgéts",
            "/acme/репо",
            "/acme/ウィジェット",
        ] {
            let result = normalize(token, false);
            assert!(
                matches!(result, Err(ServError::InvalidRepoName { .. })),
                "{token} should be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn test_allowed_characters() {
        let (_, coord) = normalize("/acme/my-repo_v2.0.git", false).unwrap();
        assert_eq!(coord.repo, "my-repo_v2.0");
    }

    #[test]
    fn test_idempotent() {
        let (_, first) = normalize("/Acme/Widgets.git", false).unwrap();
        let rejoined = format!("{}/{}", first.owner, first.repo);
        let (_, second) = normalize(&rejoined, false).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_git_suffix_stripped_once() {
        let (_, coord) = normalize("/acme/widgets.git.git", false).unwrap();
        assert_eq!(coord.repo, "widgets.git");
    }
}

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

use std::time::Duration;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use gitserv::auth::AccessDecision;
use gitserv::lfs::{self, LfsClaims, LfsTokenResponse};

const SECRET: &[u8] = b"integration-test-secret-0123456789";

fn decision() -> AccessDecision {
    AccessDecision {
        repo_id: 42,
        owner_name: "acme".to_string(),
        repo_name: "widgets".to_string(),
        user_id: 7,
        user_name: "jdoe".to_string(),
        user_email: "jdoe@example.com".to_string(),
        is_wiki: false,
        key_id: 99,
        deploy_key_id: 0,
    }
}

#[test]
fn emitted_json_carries_bearer_token_and_endpoint() {
    let response = lfs::token_response(
        SECRET,
        Duration::from_secs(1800),
        "https://git.example.com/",
        &decision(),
        "upload",
    )
    .unwrap();

    // The wire shape the LFS client expects.
    let json = serde_json::to_string(&response).unwrap();
    let parsed: LfsTokenResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.href, "https://git.example.com/acme/widgets.git/info/lfs");

    let auth = parsed.header.get("Authorization").unwrap();
    let token = auth.strip_prefix("Bearer ").unwrap();

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_nbf = true;
    let claims = decode::<LfsClaims>(token, &DecodingKey::from_secret(SECRET), &validation)
        .unwrap()
        .claims;

    assert_eq!(claims.repo, 42);
    assert_eq!(claims.uid, 7);
    assert_eq!(claims.op, "upload");
    assert_eq!(claims.exp - claims.nbf, 1800, "expiry is exactly the configured duration");
}

#[test]
fn token_is_scoped_per_operation() {
    let upload = lfs::issue_token(SECRET, Duration::from_secs(60), &decision(), "upload").unwrap();
    let download =
        lfs::issue_token(SECRET, Duration::from_secs(60), &decision(), "download").unwrap();
    assert_ne!(upload, download);
}

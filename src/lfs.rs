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

//! LFS bearer-token issuance.
//!
//! For `git-lfs-authenticate` no subprocess runs; an authorized request is
//! answered with a scoped, time-bound HS256 token and the repository's LFS
//! endpoint URL, as a single JSON object on stdout.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, EncodingKey, Header};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};

use crate::auth::AccessDecision;
use crate::error::ServError;

/// Characters escaped in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%');

/// Claims carried by an issued token. Lifetime is `exp - nbf`; the token is
/// scoped to one repository, one operation, and one user.
#[derive(Debug, Serialize, Deserialize)]
pub struct LfsClaims {
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub repo: i64,
    pub op: String,
    pub uid: i64,
}

/// The single JSON object emitted on stdout for the LFS path.
#[derive(Debug, Serialize, Deserialize)]
pub struct LfsTokenResponse {
    pub header: HashMap<String, String>,
    pub href: String,
}

/// Build the repository's LFS endpoint URL from the public base URL.
pub fn endpoint_url(app_url: &str, owner: &str, repo: &str) -> String {
    format!(
        "{}{}/{}.git/info/lfs",
        app_url,
        utf8_percent_encode(owner, PATH_SEGMENT),
        utf8_percent_encode(repo, PATH_SEGMENT),
    )
}

/// Sign a token for the authorized decision, valid from now until
/// now + `expiry`.
pub fn issue_token(
    secret: &[u8],
    expiry: Duration,
    decision: &AccessDecision,
    operation: &str,
) -> Result<String, ServError> {
    let now = unix_now();
    let claims = LfsClaims {
        iat: now,
        nbf: now,
        exp: now + expiry.as_secs() as i64,
        repo: decision.repo_id,
        op: operation.to_string(),
        uid: decision.user_id,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).map_err(|e| {
        ServError::Internal {
            detail: format!("failed to sign LFS token: {e}"),
        }
    })
}

/// Assemble the full response payload.
pub fn token_response(
    secret: &[u8],
    expiry: Duration,
    app_url: &str,
    decision: &AccessDecision,
    operation: &str,
) -> Result<LfsTokenResponse, ServError> {
    let token = issue_token(secret, expiry, decision, operation)?;
    let mut header = HashMap::new();
    header.insert("Authorization".to_string(), format!("Bearer {token}"));
    Ok(LfsTokenResponse {
        header,
        href: endpoint_url(app_url, &decision.owner_name, &decision.repo_name),
    })
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

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
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("https://git.example.com/", "acme", "widgets"),
            "https://git.example.com/acme/widgets.git/info/lfs"
        );
    }

    #[test]
    fn test_endpoint_url_escapes_segments() {
        let url = endpoint_url("https://git.example.com/", "acme corp", "widgets");
        assert_eq!(
            url,
            "https://git.example.com/acme%20corp/widgets.git/info/lfs"
        );
    }

    #[test]
    fn test_token_claims_round_trip() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let token = issue_token(secret, Duration::from_secs(1800), &decision(), "upload").unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;
        let data = decode::<LfsClaims>(&token, &DecodingKey::from_secret(secret), &validation)
            .expect("token should decode with the signing secret");

        assert_eq!(data.claims.repo, 42);
        assert_eq!(data.claims.uid, 7);
        assert_eq!(data.claims.op, "upload");
        assert_eq!(data.claims.exp - data.claims.nbf, 1800);
        assert_eq!(data.claims.iat, data.claims.nbf);
    }

    #[test]
    fn test_token_rejects_wrong_secret() {
        let token = issue_token(b"secret-a", Duration::from_secs(1800), &decision(), "download")
            .unwrap();
        let validation = Validation::new(Algorithm::HS256);
        assert!(decode::<LfsClaims>(
            &token,
            &DecodingKey::from_secret(b"secret-b"),
            &validation
        )
        .is_err());
    }

    #[test]
    fn test_response_shape() {
        let response = token_response(
            b"0123456789abcdef",
            Duration::from_secs(1800),
            "https://git.example.com/",
            &decision(),
            "download",
        )
        .unwrap();

        assert_eq!(
            response.href,
            "https://git.example.com/acme/widgets.git/info/lfs"
        );
        let auth = response.header.get("Authorization").unwrap();
        assert!(auth.starts_with("Bearer "));
        assert_eq!(response.header.len(), 1);

        let json = serde_json::to_value(&response).unwrap();
        assert!(json["header"]["Authorization"].is_string());
        assert!(json["href"].is_string());
    }
}

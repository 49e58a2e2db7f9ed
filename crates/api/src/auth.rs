//! Authentication and authorization (spec §6).
//!
//! Two transparently-combined modes: a bearer `Authorization` header (either
//! the configured bootstrap key, or a hashed [`tessera_core::domain::ApiKey`]
//! looked up by its SHA-256 digest), or a signed session cookie carrying a
//! user id. Session cookies are HMAC-signed with `session_secret_key` rather
//! than pulling in a dedicated session crate, the same way
//! `tessera-webhooks::sign` signs outbound payloads with `hmac`/`sha2`.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tessera_core::domain::{ApiKeyScope, UserRole};
use tessera_core::DomainError;
use uuid::Uuid;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

const SESSION_COOKIE: &str = "tessera_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Read,
    Write,
    Admin,
}

impl From<ApiKeyScope> for Scope {
    fn from(scope: ApiKeyScope) -> Self {
        match scope {
            ApiKeyScope::Read => Scope::Read,
            ApiKeyScope::Write => Scope::Write,
            ApiKeyScope::Admin => Scope::Admin,
        }
    }
}

impl Scope {
    fn rank(self) -> u8 {
        match self {
            Scope::Read => 0,
            Scope::Write => 1,
            Scope::Admin => 2,
        }
    }

    pub fn satisfies(self, required: Scope) -> bool {
        self.rank() >= required.rank()
    }
}

/// The authenticated caller. `user_id`/`team_id` are only populated for
/// session auth or an api key tied to a specific user; a bare api key
/// authenticates a scope without an identity.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub role: Option<UserRole>,
    pub scope: Scope,
}

impl Actor {
    fn from_role(user_id: Uuid, team_id: Option<Uuid>, role: UserRole) -> Self {
        let scope = match role {
            UserRole::Admin => Scope::Admin,
            UserRole::TeamAdmin => Scope::Write,
            UserRole::User => Scope::Read,
        };
        Self { user_id: Some(user_id), team_id, role: Some(role), scope }
    }

    fn bootstrap() -> Self {
        Self { user_id: None, team_id: None, role: None, scope: Scope::Admin }
    }

    fn from_api_key(owning_user: Option<Uuid>, owning_team: Option<Uuid>, scope: ApiKeyScope) -> Self {
        Self { user_id: owning_user, team_id: owning_team, role: None, scope: scope.into() }
    }

    pub fn require(&self, required: Scope) -> Result<(), DomainError> {
        if self.scope.satisfies(required) {
            Ok(())
        } else {
            Err(DomainError::forbidden("insufficient scope for this operation"))
        }
    }

    pub fn must_be_admin(&self) -> Result<(), DomainError> {
        self.require(Scope::Admin)
    }

    /// A team admin may act for their own team; a bare admin scope may act
    /// for any team.
    pub fn must_own_team(&self, team_id: Uuid) -> Result<(), DomainError> {
        if self.scope == Scope::Admin {
            return Ok(());
        }
        if self.team_id == Some(team_id) {
            return Ok(());
        }
        Err(DomainError::forbidden("caller does not belong to this team"))
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn sign_session(secret: &str, user_id: Uuid) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(user_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn verify_session_cookie(secret: &str, value: &str) -> Option<Uuid> {
    let (user_id_str, signature) = value.split_once('.')?;
    let user_id = Uuid::parse_str(user_id_str).ok()?;
    let expected = sign_session(secret, user_id);
    if expected == signature {
        Some(user_id)
    } else {
        None
    }
}

pub fn make_session_cookie_value(secret: &str, user_id: Uuid) -> String {
    format!("{user_id}.{}", sign_session(secret, user_id))
}

fn extract_cookie<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    let header = parts.headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    header.split(';').map(str::trim).find_map(|kv| {
        let (k, v) = kv.split_once('=')?;
        (k == name).then_some(v)
    })
}

impl<S> FromRequestParts<S> for Actor
where
    Arc<AppState>: FromRef<S>,
    S: Sync,
{
    type Rejection = crate::error::ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = Arc::<AppState>::from_ref(state);

        if app.settings.auth_disabled {
            return Ok(Actor::bootstrap());
        }

        if let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) {
            let raw = header
                .to_str()
                .map_err(|_| DomainError::unauthorized("malformed authorization header"))?;
            let token = raw
                .strip_prefix("Bearer ")
                .ok_or_else(|| DomainError::unauthorized("expected a bearer token"))?;

            if let Some(bootstrap) = &app.settings.bootstrap_api_key {
                if constant_time_eq(bootstrap, token) {
                    return Ok(Actor::bootstrap());
                }
            }

            let hashed = hash_token(token);
            let key = app
                .api_keys
                .authenticate(&hashed)
                .await?
                .ok_or_else(|| DomainError::unauthorized("invalid or revoked api key"))?;
            return Ok(Actor::from_api_key(key.owning_user, key.owning_team, key.scope));
        }

        if let Some(cookie) = extract_cookie(parts, SESSION_COOKIE) {
            let user_id = verify_session_cookie(&app.settings.session_secret_key, cookie)
                .ok_or_else(|| DomainError::unauthorized("invalid session"))?;
            let user = app.users.get(user_id).await?;
            if !user.is_active() {
                return Err(DomainError::unauthorized("user account is deactivated").into());
            }
            return Ok(Actor::from_role(user.id, user.team_id, user.role));
        }

        Err(DomainError::unauthorized("missing credentials").into())
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_round_trips() {
        let secret = "test-secret";
        let user_id = Uuid::new_v4();
        let value = make_session_cookie_value(secret, user_id);
        assert_eq!(verify_session_cookie(secret, &value), Some(user_id));
    }

    #[test]
    fn session_cookie_rejects_tampering() {
        let secret = "test-secret";
        let user_id = Uuid::new_v4();
        let mut value = make_session_cookie_value(secret, user_id);
        value.push('f');
        assert_eq!(verify_session_cookie(secret, &value), None);
    }

    #[test]
    fn scope_satisfies_matches_rank_order() {
        assert!(Scope::Admin.satisfies(Scope::Write));
        assert!(!Scope::Read.satisfies(Scope::Admin));
    }

    #[test]
    fn constant_time_eq_rejects_different_lengths() {
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("abc", "abc"));
    }
}

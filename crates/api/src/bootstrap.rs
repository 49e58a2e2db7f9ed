//! Bootstrap admin provisioning (spec §6): on every start, if `admin_email`
//! and `admin_password` are configured, upsert an admin user (creating the
//! `admin` team first if needed) so a fresh deployment always has one usable
//! login.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use tessera_core::domain::UserRole;
use tessera_core::Result;

use crate::state::AppState;

const ADMIN_TEAM_NAME: &str = "admin";

pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| tessera_core::DomainError::Internal(format!("hashing bootstrap admin password: {e}")))
}

pub async fn run(state: &AppState) -> Result<()> {
    let (Some(email), Some(password)) = (&state.settings.admin_email, &state.settings.admin_password) else {
        return Ok(());
    };

    let admin_team = match state.teams.list().await?.into_iter().find(|t| t.name == ADMIN_TEAM_NAME) {
        Some(team) => team,
        None => state.teams.create(ADMIN_TEAM_NAME, serde_json::json!({})).await?,
    };

    match state.users.get_by_email(email).await? {
        Some(existing) => {
            tracing::info!(user_id = %existing.id, "bootstrap admin already exists");
        }
        None => {
            let password_hash = hash_password(password)?;
            let user = state
                .users
                .create(email, &state.settings.admin_name, Some(&password_hash), UserRole::Admin, Some(admin_team.id))
                .await?;
            tracing::info!(user_id = %user.id, %email, "created bootstrap admin user");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_password_produces_a_verifiable_argon2_hash() {
        use argon2::password_hash::PasswordVerifier;
        use argon2::PasswordHash;

        let hash = hash_password("correct horse battery staple").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"correct horse battery staple", &parsed)
            .is_ok());
        assert!(Argon2::default().verify_password(b"wrong password", &parsed).is_err());
    }
}

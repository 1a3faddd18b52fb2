use anyhow::Context;
use axum::extract::FromRef;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{normalize_email, LoginRequest, LoginResponse, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_decoy, verify_password},
        repo::RepoError,
        repo_types::{NewUser, User},
        validation::validate_registration,
    },
    avatar::fetch_avatar_or_none,
    error::{AppError, AppResult},
    state::AppState,
};

/// Validates, hashes and stores a new account. Issues no token.
pub async fn register_user(state: &AppState, mut req: RegisterRequest) -> AppResult<User> {
    req.email = normalize_email(&req.email);

    // A taken email wins over any input rule.
    let existing = state
        .users
        .find_by_email(&req.email)
        .await
        .context("find_by_email")?;
    if existing.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(AppError::UserExists);
    }

    if let Err(rule) = validate_registration(&req) {
        warn!(email = %req.email, %rule, "registration rejected");
        return Err(rule.into());
    }

    let password_hash = hash_password(&req.password).context("hash password")?;
    let avatar = fetch_avatar_or_none(state.avatars.as_ref()).await;

    let new_user = NewUser {
        name: req.name,
        email: req.email,
        password_hash,
        avatar,
    };
    let user = match state.users.insert(new_user).await {
        Ok(u) => u,
        Err(RepoError::DuplicateEmail) => {
            // lost a race with a concurrent registration
            warn!("email already registered");
            return Err(AppError::UserExists);
        }
        Err(e) => return Err(anyhow::Error::new(e).context("insert user").into()),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Checks credentials and mints a session token.
pub async fn authenticate(state: &AppState, mut req: LoginRequest) -> AppResult<LoginResponse> {
    req.email = normalize_email(&req.email);

    let Some(user) = state
        .users
        .find_by_email(&req.email)
        .await
        .context("find_by_email")?
    else {
        verify_decoy(&req.password);
        warn!(email = %req.email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&req.password, &user.password_hash).context("verify password")? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = JwtKeys::from_ref(state).sign(user.id, &user.email)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(LoginResponse { user, token })
}

/// Loads the stored record of an already verified identity.
pub async fn load_profile(state: &AppState, user_id: Uuid) -> AppResult<User> {
    let user = state
        .users
        .find_by_id(user_id)
        .await
        .context("find_by_id")?
        .ok_or_else(|| anyhow::anyhow!("user {user_id} not found"))?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::auth::{repo::MemoryUserStore, validation::ValidationError};
    use crate::avatar::AvatarSource;
    use crate::config::AppConfig;

    struct BrokenAvatars;
    #[async_trait]
    impl AvatarSource for BrokenAvatars {
        async fn fetch(&self) -> anyhow::Result<String> {
            anyhow::bail!("avatar service down")
        }
    }

    fn register_req(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_stores_hashed_password_and_avatar() {
        let state = AppState::fake();
        let user = register_user(&state, register_req("Ada Lovelace", " Ada@Example.com", "s3cret!pw"))
            .await
            .unwrap();

        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.name, "Ada Lovelace");
        assert_eq!(user.avatar.as_deref(), Some("https://fake.local/avatar.png"));
        assert_ne!(user.password_hash, "s3cret!pw");
        assert!(verify_password("s3cret!pw", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email_with_other_name_and_password() {
        let state = AppState::fake();
        register_user(&state, register_req("Ada Lovelace", "ada@example.com", "s3cret!pw"))
            .await
            .unwrap();

        let err = register_user(&state, register_req("Someone Else", "ADA@example.com", "0ther#pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserExists));
    }

    #[tokio::test]
    async fn taken_email_is_reported_before_input_rules() {
        let state = AppState::fake();
        register_user(&state, register_req("Ada Lovelace", "ada@example.com", "s3cret!pw"))
            .await
            .unwrap();

        let err = register_user(&state, register_req("Ada", "ada@example.com", "short"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserExists));
    }

    #[tokio::test]
    async fn login_with_corrupt_stored_hash_is_internal_error() {
        let state = AppState::fake();
        state
            .users
            .insert(NewUser {
                name: "Ada Lovelace".into(),
                email: "ada@example.com".into(),
                password_hash: "not-a-phc-string".into(),
                avatar: None,
            })
            .await
            .unwrap();

        let err = authenticate(&state, login_req("ada@example.com", "s3cret!pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn register_reports_first_broken_rule() {
        let state = AppState::fake();
        let err = register_user(&state, register_req("Ada Lovelace", "ada@example.com", "secretpw!"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::PasswordMissingDigit)
        ));
    }

    #[tokio::test]
    async fn avatar_failure_does_not_abort_registration() {
        let users = Arc::new(MemoryUserStore::new());
        let state = AppState::from_parts(
            Arc::new(AppConfig::for_tests()),
            users.clone(),
            Arc::new(BrokenAvatars),
        );

        let user = register_user(&state, register_req("Ada Lovelace", "ada@example.com", "s3cret!pw"))
            .await
            .unwrap();
        assert_eq!(user.avatar, None);
        assert_eq!(users.len().await, 1);
    }

    #[tokio::test]
    async fn login_token_matches_stored_identity() {
        let state = AppState::fake();
        let stored = register_user(&state, register_req("Ada Lovelace", "ada@example.com", "s3cret!pw"))
            .await
            .unwrap();

        let res = authenticate(&state, login_req("ada@example.com", "s3cret!pw"))
            .await
            .unwrap();
        assert_eq!(res.user, stored);

        let claims = JwtKeys::from_ref(&state).verify(&res.token).unwrap();
        assert_eq!(claims.user_id, stored.id);
        assert_eq!(claims.email, stored.email);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let state = AppState::fake();
        register_user(&state, register_req("Ada Lovelace", "ada@example.com", "s3cret!pw"))
            .await
            .unwrap();

        let wrong_pw = authenticate(&state, login_req("ada@example.com", "wrong!pw1"))
            .await
            .unwrap_err();
        let unknown = authenticate(&state, login_req("nobody@example.com", "s3cret!pw"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_pw, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
        assert_eq!(wrong_pw.status(), unknown.status());
    }

    #[tokio::test]
    async fn profile_returns_stored_record() {
        let state = AppState::fake();
        let stored = register_user(&state, register_req("Ada Lovelace", "ada@example.com", "s3cret!pw"))
            .await
            .unwrap();

        let loaded = load_profile(&state, stored.id).await.unwrap();
        assert_eq!(loaded, stored);
    }

    #[tokio::test]
    async fn profile_of_missing_user_is_internal_error() {
        let state = AppState::fake();
        let err = load_profile(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}

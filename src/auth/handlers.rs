use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest},
        extractors::{AuthUser, JsonBody},
        repo_types::User,
        services,
    },
    error::AppResult,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/profile", get(profile))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    services::register_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::new("User added"))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let res = services::authenticate(&state, payload).await?;
    Ok(Json(res))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn profile(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    let user = services::load_profile(&state, auth.user_id).await?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[test]
    fn user_json_hides_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            avatar: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["email"], "ada@example.com");
        assert!(json["avatar"].is_null());
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
        assert!(json.get("password_hash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }
}

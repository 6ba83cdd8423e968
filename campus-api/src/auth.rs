use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use campus_core::repository::StudentRepository as _;
use campus_core::CoreError;

use crate::error::ApiError;
use crate::middleware::auth::{StudentClaims, TeacherClaims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct TokenRequest {
    subject_id: Uuid,
    role: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
    role: String,
    subject_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/token", post(issue_token))
}

/// Development token issuer. Credential verification belongs to the
/// external identity subsystem; this endpoint only mints a token for an
/// already-resolved principal.
async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let exp = (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize;

    let token = match req.role.as_str() {
        "STUDENT" => {
            if !state.students.student_exists(req.subject_id).await? {
                return Err(CoreError::StudentNotFound(req.subject_id).into());
            }
            let claims = StudentClaims {
                sub: req.subject_id,
                role: "STUDENT".to_owned(),
                exp,
            };
            encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(state.auth.secret.as_bytes()),
            )
        }
        "TEACHER" => {
            let claims = TeacherClaims {
                sub: req.subject_id,
                role: "TEACHER".to_owned(),
                exp,
            };
            encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(state.auth.secret.as_bytes()),
            )
        }
        other => {
            return Err(CoreError::Validation(format!("unknown role: {}", other)).into());
        }
    }
    .map_err(|e| ApiError::Core(CoreError::Storage(format!("token encoding failed: {}", e))))?;

    Ok(Json(TokenResponse {
        token,
        role: req.role,
        subject_id: req.subject_id,
    }))
}

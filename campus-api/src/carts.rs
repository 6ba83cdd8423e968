use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use campus_core::model::Cart;

use crate::error::ApiError;
use crate::middleware::auth::StudentClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ReplaceCartRequest {
    course_ids: Vec<Uuid>,
}

/// All cart routes act on the authenticated student's own cart; the
/// student id comes from the token, never from the path.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/cart", get(get_cart).put(replace_cart).delete(clear_cart))
        .route(
            "/v1/cart/courses/{course_id}",
            post(add_course).delete(remove_course),
        )
}

async fn get_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<StudentClaims>,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(state.carts.get(claims.sub).await?))
}

async fn add_course(
    State(state): State<AppState>,
    Extension(claims): Extension<StudentClaims>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(state.carts.add_course(claims.sub, course_id).await?))
}

async fn remove_course(
    State(state): State<AppState>,
    Extension(claims): Extension<StudentClaims>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(state.carts.remove_course(claims.sub, course_id).await?))
}

async fn clear_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<StudentClaims>,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(state.carts.clear(claims.sub).await?))
}

async fn replace_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<StudentClaims>,
    Json(req): Json<ReplaceCartRequest>,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(
        state.carts.replace_all(claims.sub, req.course_ids).await?,
    ))
}

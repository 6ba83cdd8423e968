use axum::{http::Method, middleware::from_fn_with_state, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod carts;
pub mod courses;
pub mod error;
pub mod middleware;
pub mod orders;
pub mod state;
pub mod stats;
pub mod students;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let public = Router::new()
        .merge(auth::routes())
        .merge(students::routes())
        .merge(stats::routes())
        .merge(courses::public_routes());

    let student = Router::new()
        .merge(carts::routes())
        .merge(orders::routes())
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::student_auth_middleware,
        ));

    let teacher = courses::teacher_routes().layer(from_fn_with_state(
        state.clone(),
        middleware::auth::teacher_auth_middleware,
    ));

    Router::new()
        .merge(public)
        .merge(student)
        .merge(teacher)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

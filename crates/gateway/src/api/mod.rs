pub mod auth;
pub mod error;
pub mod health;
pub mod method;

use axum::middleware;
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no identity required) and
/// **protected** (every `/method/*` route, behind the identity middleware).
///
/// `state` is needed to wire up the identity middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health::health));

    let protected = Router::new()
        .route(
            "/method/create",
            get(method::summary)
                .post(method::create)
                .delete(method::delete),
        )
        .route(
            "/method/control",
            get(method::start).post(method::iterate),
        )
        .route(
            "/method/interaction",
            get(method::interaction_types).post(method::set_interaction_type),
        )
        .route_layer(middleware::from_fn_with_state(state, auth::identify));

    public.merge(protected)
}

/// Router with state attached and no outer layers. Tests drive this
/// directly with `tower::ServiceExt::oneshot`.
pub fn app(state: AppState) -> Router {
    router(state.clone()).with_state(state)
}

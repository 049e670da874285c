//! Route definitions for the Cooperative Management Platform

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/me", get(handlers::me))
        .nest("/cooperatives", cooperative_routes())
        .nest("/users", user_routes())
        .nest("/farmers", farmer_routes())
        .nest("/harvests", harvest_routes())
        .nest("/batches", batch_routes())
        .nest("/prices", price_routes())
        .nest("/payments", payment_routes())
        .route("/dashboard", get(handlers::get_dashboard))
        .nest("/reports", report_routes())
        .nest("/portal", portal_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .nest("/auth", auth_routes())
        .merge(protected)
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .route("/logout", post(handlers::logout))
}

/// Cooperative administration (super-admin)
fn cooperative_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_cooperatives).post(handlers::create_cooperative))
        .route(
            "/:cooperative_id",
            get(handlers::get_cooperative).put(handlers::update_cooperative),
        )
        .route("/:cooperative_id/activate", post(handlers::activate_cooperative))
        .route("/:cooperative_id/deactivate", post(handlers::deactivate_cooperative))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route(
            "/:user_id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
}

fn farmer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_farmers).post(handlers::register_farmer))
        .route(
            "/:farmer_id",
            get(handlers::get_farmer)
                .put(handlers::update_farmer)
                .delete(handlers::delete_farmer),
        )
}

fn harvest_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_harvests).post(handlers::record_harvest))
        .route(
            "/:harvest_id",
            get(handlers::get_harvest)
                .put(handlers::update_harvest)
                .delete(handlers::delete_harvest),
        )
        .route("/:harvest_id/verify", post(handlers::verify_harvest))
}

fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::create_batch))
        .route("/:batch_id", get(handlers::get_batch))
        .route("/:batch_id/harvests", post(handlers::add_batch_harvests))
        .route("/:batch_id/harvests/:harvest_id", delete(handlers::remove_batch_harvest))
        .route("/:batch_id/close", post(handlers::close_batch))
        .route("/:batch_id/dispatch", post(handlers::dispatch_batch))
}

fn price_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_prices).put(handlers::set_prices))
        .route("/history", get(handlers::get_price_history))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_payments))
        .route("/preview", post(handlers::preview_payments))
        .route("/generate", post(handlers::generate_payments))
        .route("/:payment_id", get(handlers::get_payment))
        .route("/:payment_id/approve", post(handlers::approve_payment))
        .route("/:payment_id/pay", post(handlers::pay_payment))
        .route("/:payment_id/cancel", post(handlers::cancel_payment))
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/deliveries", get(handlers::get_delivery_report))
        .route("/payments", get(handlers::get_payment_report))
}

/// Farmer self-service routes
fn portal_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(handlers::get_profile))
        .route("/harvests", get(handlers::get_my_harvests))
        .route("/payments", get(handlers::get_my_payments))
        .route("/prices", get(handlers::get_current_prices))
}

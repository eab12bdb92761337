use axum::{
    http::Method,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod complaints;
pub mod error;
pub mod events;
pub mod extract;
pub mod middleware;
pub mod orders;
pub mod payments;
pub mod response;
pub mod state;

pub use state::{AppState, AuthConfig, Repositories};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let protected = Router::new()
        .merge(order_routes())
        .merge(payment_routes())
        .merge(complaint_routes())
        .route("/events/stream", get(events::stream_events))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), middleware::auth_middleware));

    Router::new()
        .route("/health", get(response::health))
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/order/create", post(orders::create_order))
        .route("/order/all", get(orders::list_orders))
        .route("/order/buyer/orders", get(orders::buyer_orders))
        .route("/order/seller/orders", get(orders::seller_orders))
        .route("/order/{id}", get(orders::get_order).delete(orders::delete_order))
        .route("/order/{id}/status", put(orders::update_order_status))
        .route("/order/{id}/payment", put(orders::update_payment_status))
        .route("/order/{id}/reconcile", post(orders::reconcile_order))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payment/create", post(payments::create_payment))
        .route("/payment/order/{order_id}", get(payments::order_payment))
        .route("/payment/{payment_id}", get(payments::get_payment))
        .route("/payment/{payment_id}/process", post(payments::process_payment))
        .route("/payment/{payment_id}/refund", post(payments::refund_payment))
        .route("/payment/{payment_id}/status", put(payments::update_payment_status))
}

fn complaint_routes() -> Router<AppState> {
    Router::new()
        .route("/complaint/create", post(complaints::create_complaint))
        .route("/complaint/all", get(complaints::list_complaints))
        .route("/complaint/buyer/complaints", get(complaints::buyer_complaints))
        .route("/complaint/seller/complaints", get(complaints::seller_complaints))
        .route("/complaint/{id}", get(complaints::get_complaint).put(complaints::update_complaint).delete(complaints::delete_complaint))
}

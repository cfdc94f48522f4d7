use super::{error::handle_panic, handlers};
use axum::{Router, extract::DefaultBodyLimit, routing::post};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

pub fn create_app(max_body_bytes: usize) -> Router {
    Router::new()
        .route("/converter", post(handlers::converter))
        .route("/resizer", post(handlers::resizer))
        .route("/compressor", post(handlers::compressor))
        // Unknown paths and wrong methods get the JSON envelope too
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        // Limit the maximum size of request bodies
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        // Add tracing for HTTP requests and responses
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::INFO)))
}

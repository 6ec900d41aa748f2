//! REST surface over the item repository.
//!
//! | Method & path | Operation | Success |
//! |---------------|-----------|---------|
//! | `GET /db` | list all items | 200 |
//! | `GET /db/{id}` | fetch one item | 200 |
//! | `POST /db` | create an item | 201 |
//! | `POST /db/{id}` | replace an item | 200 |
//! | `DELETE /db/{id}` | delete one item | 200 |
//! | `DELETE /db` | delete all items | 200 |
//!
//! Responses carry `{ "Result": ... }` on success and `{ "Error": "..." }`
//! otherwise, including unknown paths (404) and unsupported methods (405).
//! Every response echoes an `x-request-id` header.

mod response;
mod routes;

pub use response::{ApiError, ApiResponse, INTERNAL_ERROR, ITEM_NOT_FOUND, failure, success};

use crate::observability::{REQUEST_ID_HEADER, RequestContext, scope_request_context};
use crate::services::ItemRepository;
use crate::{Error, Result};
use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderValue, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

/// Builds the item router.
pub fn router(repository: ItemRepository) -> Router {
    Router::new()
        .route(
            "/db",
            get(routes::list_items)
                .post(routes::create_item)
                .delete(routes::delete_all_items),
        )
        .route(
            "/db/{id}",
            get(routes::get_item)
                .post(routes::update_item)
                .delete(routes::delete_item),
        )
        .fallback(routes::not_found)
        .method_not_allowed_fallback(routes::method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(propagate_request_id))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(repository)
}

/// Serves the router until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve(listener: TcpListener, repository: ItemRepository) -> Result<()> {
    serve_with_shutdown(listener, repository, shutdown_signal()).await
}

/// Serves the router until `shutdown` resolves, then drains open requests.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    repository: ItemRepository,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Item API listening");
    }

    axum::serve(listener, router(repository))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "serve".to_string(),
            cause: e.to_string(),
        })?;

    tracing::info!("Item API stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(e) => {
            // Without a signal handler the server runs until killed.
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        },
    }
}

/// Scopes a request ID over the request and echoes it in the response.
async fn propagate_request_id(request: Request, next: Next) -> Response {
    let context = RequestContext::from_header(
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
    );
    let request_id = context.request_id().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path()
    );

    let mut response = scope_request_context(context, next.run(request))
        .instrument(span)
        .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

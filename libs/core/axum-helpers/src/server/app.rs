use super::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::errors::handlers::not_found;
use axum::Router;
use core_config::server::ServerConfig;
use std::future::{Future, IntoFuture};
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info, warn};

/// Wraps the application routes with the cross-cutting layers every relay
/// endpoint shares: request tracing and a JSON 404 fallback.
pub fn create_router(routes: Router) -> Router {
    routes.fallback(not_found).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Serve `router` until a shutdown signal arrives, then run `cleanup`.
///
/// `cleanup` runs exactly once on every exit path: after a signal, after the
/// server fails, and when the listener cannot be bound. It receives the
/// signal that triggered it ([`ShutdownSignal::Requested`] for failures) and
/// is bounded by `server_config.shutdown_timeout`.
///
/// Returns the cleanup output, or `None` if cleanup timed out or panicked.
/// Bind and serve errors are returned after cleanup has finished.
///
/// # Example
/// ```ignore
/// let report = serve_with_cleanup(router, &config.server, move |signal| async move {
///     lifecycle.stop().await
/// })
/// .await?;
/// ```
pub async fn serve_with_cleanup<F, Fut>(
    router: Router,
    server_config: &ServerConfig,
    cleanup: F,
) -> io::Result<Option<Fut::Output>>
where
    F: FnOnce(ShutdownSignal) -> Fut + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let shutdown_timeout = server_config.shutdown_timeout;

    let listener = match TcpListener::bind(server_config.address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", server_config.address(), e);
            run_cleanup(cleanup, ShutdownSignal::Requested, shutdown_timeout).await;
            return Err(e);
        }
    };

    let (coordinator, _) = ShutdownCoordinator::new();
    serve_listener(listener, router, coordinator, shutdown_timeout, cleanup).await
}

/// Serve on an already bound `listener` until `coordinator` fires.
///
/// Once shutdown starts, open connections get `shutdown_timeout` to finish.
/// Requests still running after that are abandoned, not drained.
pub async fn serve_listener<F, Fut>(
    listener: TcpListener,
    router: Router,
    coordinator: ShutdownCoordinator,
    shutdown_timeout: Duration,
    cleanup: F,
) -> io::Result<Option<Fut::Output>>
where
    F: FnOnce(ShutdownSignal) -> Fut + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Server starting on {}", addr);
    }

    let shutdown_handle = coordinator.clone();
    let cleanup_handle = tokio::spawn(async move {
        let signal = shutdown_handle.wait_for_signal().await;
        run_cleanup(cleanup, signal, shutdown_timeout).await
    });

    let stop_accepting = shutdown_started(&coordinator);
    let mut drain_started = shutdown_started(&coordinator);

    let serve = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(stop_accepting)
        .into_future();
    let mut serve = std::pin::pin!(serve);

    let serve_result = tokio::select! {
        result = &mut serve => result,
        _ = &mut drain_started => {
            match tokio::time::timeout(shutdown_timeout, &mut serve).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "Open connections still busy after {:?}, abandoning them",
                        shutdown_timeout
                    );
                    Ok(())
                }
            }
        }
    }
    .inspect_err(|e| {
        error!("Server encountered an error: {:?}", e);
    });

    if serve_result.is_err() {
        coordinator.shutdown(ShutdownSignal::Requested);
    }

    let output = cleanup_handle.await.unwrap_or_else(|e| {
        error!("Cleanup task failed: {}", e);
        None
    });

    serve_result.map(|_| output)
}

/// Resolves once `coordinator` has fired. Subscribes eagerly so a shutdown
/// requested before the first poll is not missed.
fn shutdown_started(coordinator: &ShutdownCoordinator) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let mut rx = coordinator.subscribe();
    let already = coordinator.is_shutting_down();
    Box::pin(async move {
        if !already {
            let _ = rx.recv().await;
        }
    })
}

async fn run_cleanup<F, Fut>(cleanup: F, signal: ShutdownSignal, timeout: Duration) -> Option<Fut::Output>
where
    F: FnOnce(ShutdownSignal) -> Fut,
    Fut: Future,
{
    info!(signal = %signal, "Starting cleanup tasks (timeout: {:?})", timeout);

    match tokio::time::timeout(timeout, cleanup(signal)).await {
        Ok(output) => {
            info!("Cleanup completed");
            Some(output)
        }
        Err(_) => {
            warn!("Cleanup exceeded timeout of {:?}, forcing shutdown", timeout);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode, routing::get};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_create_router_falls_back_to_json_404() {
        let app = create_router(Router::new().route("/ping", get(|| async { "pong" })));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cleanup_runs_when_bind_fails() {
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = blocker.local_addr().unwrap().port();
        let mut config = ServerConfig::new("127.0.0.1".to_string(), port);
        config.shutdown_timeout = Duration::from_secs(1);

        let (tx, rx) = tokio::sync::oneshot::channel();
        let result = serve_with_cleanup(Router::new(), &config, move |signal| async move {
            let _ = tx.send(signal);
        })
        .await;

        assert!(result.is_err());
        assert_eq!(rx.await.unwrap(), ShutdownSignal::Requested);
    }

    #[tokio::test]
    async fn test_run_cleanup_times_out() {
        let output = run_cleanup(
            |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                1
            },
            ShutdownSignal::Terminate,
            Duration::from_millis(20),
        )
        .await;
        assert!(output.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_abandons_hung_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let entered = Arc::new(Notify::new());
        let router = Router::new().route(
            "/hang",
            get({
                let entered = entered.clone();
                move || {
                    let entered = entered.clone();
                    async move {
                        entered.notify_one();
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        "late"
                    }
                }
            }),
        );

        let (coordinator, _) = ShutdownCoordinator::new();
        let trigger = coordinator.clone();
        let server = tokio::spawn(serve_listener(
            listener,
            router,
            coordinator,
            Duration::from_millis(200),
            |_signal| async { "cleaned" },
        ));

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /hang HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        entered.notified().await;

        trigger.shutdown(ShutdownSignal::Terminate);

        let output = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server still waiting on the hung request")
            .unwrap()
            .unwrap();
        assert_eq!(output, Some("cleaned"));
    }

    #[tokio::test]
    async fn test_shutdown_requested_before_serving() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (coordinator, _) = ShutdownCoordinator::new();
        coordinator.shutdown(ShutdownSignal::Interrupt);

        let output = tokio::time::timeout(
            Duration::from_secs(5),
            serve_listener(
                listener,
                Router::new(),
                coordinator,
                Duration::from_secs(1),
                |signal| async move { signal },
            ),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(output, Some(ShutdownSignal::Requested));
    }
}

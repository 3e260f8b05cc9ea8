use std::{convert::Infallible, sync::Arc, time::Duration};

use rama::{
    Layer as _, Service,
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    http::{
        HeaderValue, Request, Response,
        layer::{required_header::AddRequiredResponseHeadersLayer, trace::TraceLayer},
        server::HttpServer,
        service::web::Router,
    },
    layer::TimeoutLayer,
    net::{socket::Interface, stream::layer::http::BodyLimitLayer},
    rt::Executor,
    tcp::server::TcpListener,
    telemetry::tracing,
};

use crate::{
    chaos::{BehaviorStore, RequestLog, UploadResponder},
    config::{UploadMethod, UploadRouteConfig},
    utils::env::server_identifier,
};

mod control;
mod panel;

/// Maximum allowed body size for requests and responses,
/// uploads are buffered in memory.
const MAX_BODY_SIZE: usize = 64 * 1024 * 1024; // 64 MB

/// State shared by the upload responder and the control api.
#[derive(Debug, Clone)]
pub struct MockState {
    pub behavior: BehaviorStore,
    pub inbox: RequestLog,
    pub upload_route: Arc<UploadRouteConfig>,
}

impl MockState {
    pub fn new(upload_route: UploadRouteConfig) -> Self {
        let behavior = BehaviorStore::new();
        let inbox = RequestLog::new(behavior.clone());
        Self {
            behavior,
            inbox,
            upload_route: Arc::new(upload_route),
        }
    }
}

/// Runs the PrintAPI mock http server until the guard is cancelled.
///
/// No timeout is applied to connections unless `connection_timeout` is set,
/// requests answered in timeout mode keep their connection open forever.
pub async fn run_mock_server(
    bind: Interface,
    connection_timeout: Option<Duration>,
    guard: ShutdownGuard,
    state: MockState,
) -> Result<(), BoxError> {
    let http_svc = (
        TraceLayer::new_for_http(),
        AddRequiredResponseHeadersLayer::new()
            .with_server_header_value(HeaderValue::from_static(server_identifier())),
    )
        .into_layer(web_svc(state));

    let exec = Executor::graceful(guard);
    let http_server = HttpServer::auto(exec.clone()).service(Arc::new(http_svc));
    let tcp_svc = BodyLimitLayer::symmetric(MAX_BODY_SIZE).into_layer(http_server);

    let tcp_listener = TcpListener::bind(bind, exec)
        .await
        .context("bind printapi mock http server")?;

    let addr = tcp_listener
        .local_addr()
        .context("get bound address for printapi mock http server")?;
    tracing::info!(server.address = %addr, "printapi mock http server ready");

    match connection_timeout {
        Some(timeout) => {
            tracing::info!("tcp connections are closed after {timeout:?}");
            tcp_listener
                .serve(TimeoutLayer::new(timeout).into_layer(tcp_svc))
                .await;
        }
        None => tcp_listener.serve(tcp_svc).await,
    }

    Ok(())
}

/// Web service serving the configured upload route(s)
/// as well as the control api and panel.
pub fn web_svc(
    state: MockState,
) -> impl Service<Request, Output = Response, Error = Infallible> + Clone {
    let upload_route = state.upload_route.clone();
    let responder = UploadResponder::new(state.behavior.clone(), state.inbox.clone());

    let mut router = Router::new_with_state(state)
        .with_get("/", self::panel::control_panel)
        .with_get("/health", self::control::health)
        .with_get("/printapi/ping", self::control::ping)
        .with_get("/api/behavior", self::control::get_behavior)
        .with_post("/api/behavior", self::control::set_behavior)
        .with_post("/api/behavior/reset", self::control::reset_behavior)
        .with_get("/api/inbox", self::control::list_inbox)
        .with_post("/api/inbox/clear", self::control::clear_inbox)
        .with_get("/api/routes", self::control::list_routes);

    for path in upload_route.paths.iter() {
        tracing::info!("bind upload responder to: {} {path}", upload_route.method);

        let responder = responder.clone();
        let upload = move |req: Request| {
            let responder = responder.clone();
            async move { responder.respond(req).await }
        };

        router = match upload_route.method {
            UploadMethod::Get => router.with_get(path, upload),
            UploadMethod::Post => router.with_post(path, upload),
            UploadMethod::Put => router.with_put(path, upload),
            UploadMethod::Patch => router.with_patch(path, upload),
            UploadMethod::Delete => router.with_delete(path, upload),
        };
    }

    Arc::new(router)
}

#[cfg(test)]
mod tests;

//! HTTP request handler

use http::{header, Method, Request, Response, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;
use wikigate_core::middleware::{HandlerFn, HandlerFuture, Middleware, Next};
use wikigate_core::response::{responses, ResponseBuilder};
use wikigate_core::{body, Body, Error, Result};
use wikigate_proxy::{HttpClient, ProxyHandler};
use wikigate_router::Router;

/// Path answered by the gateway itself
pub const HEALTH_PATH: &str = "/health";

/// Routing tree at the end of the middleware chain
///
/// Answers `/health`, forwards matched prefixes to their upstream and returns
/// `404 Not Found` for everything else.
#[derive(Clone)]
pub struct Dispatcher {
    router: Arc<Router>,
    proxies: Arc<HashMap<String, ProxyHandler>>,
}

impl Dispatcher {
    /// Build one proxy handler per route, all sharing `client`
    pub fn new(router: Router, client: HttpClient) -> Result<Self> {
        let proxies = router
            .routes()
            .iter()
            .map(|route| {
                let proxy = ProxyHandler::new(
                    route.upstream.as_str(),
                    route.prefix.as_str(),
                    client.clone(),
                )?;
                Ok((route.service.clone(), proxy))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self {
            router: Arc::new(router),
            proxies: Arc::new(proxies),
        })
    }

    /// The route registry
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle a request that made it through the middleware chain
    pub async fn dispatch(&self, req: Request<Body>) -> Result<Response<Body>> {
        let path = req.uri().path();

        if path == HEALTH_PATH {
            return match req.method() {
                &Method::GET | &Method::HEAD => responses::ok("OK"),
                _ => ResponseBuilder::new(StatusCode::METHOD_NOT_ALLOWED)
                    .header(header::ALLOW, "GET, HEAD")
                    .text("Method Not Allowed"),
            };
        }

        let Some(route) = self.router.match_route(path) else {
            debug!(path = %path, "No route found");
            return responses::not_found();
        };

        let proxy = self.proxies.get(&route.service).ok_or_else(|| {
            Error::Internal(format!("no proxy handler for service '{}'", route.service))
        })?;

        debug!(service = %route.service, upstream = %proxy.target(), "Route matched");

        Ok(proxy.forward(req).await)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.router.len())
            .finish()
    }
}

/// Count of requests whose response has not finished streaming
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    /// Register a request; the count drops when the guard does
    pub fn enter(&self) -> InFlightGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(&self.0))
    }

    /// Requests currently in flight
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Keeps a request counted in [`InFlight`] while alive
#[derive(Debug)]
pub struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// HTTP request handler
///
/// Runs every request through the middleware chain and into the
/// [`Dispatcher`]. Errors that escape the chain are mapped to a status
/// response here, so the connection always gets an answer.
#[derive(Clone)]
pub struct RequestHandler {
    middleware_chain: Arc<[Arc<dyn Middleware>]>,
    final_handler: Arc<HandlerFn>,
    dispatcher: Dispatcher,
    in_flight: InFlight,
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("in_flight", &self.in_flight.count())
            .field("middleware_count", &self.middleware_chain.len())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl RequestHandler {
    /// Create a new request handler
    pub fn new(dispatcher: Dispatcher, middleware_chain: Arc<[Arc<dyn Middleware>]>) -> Self {
        let routes = dispatcher.clone();
        let final_handler: HandlerFn = Box::new(move |req: Request<Body>| -> HandlerFuture {
            let routes = routes.clone();
            Box::pin(async move { routes.dispatch(req).await })
        });

        Self {
            middleware_chain,
            final_handler: Arc::new(final_handler),
            dispatcher,
            in_flight: InFlight::default(),
        }
    }

    /// The routing tree behind the middleware chain
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Gauge of requests currently being handled
    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Handle an incoming HTTP request
    ///
    /// The request stays counted in [`RequestHandler::in_flight`] until the
    /// returned body has been streamed to its end or dropped.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let guard = self.in_flight.enter();

        let next = Next::with_shared_handler(
            Arc::clone(&self.middleware_chain),
            Arc::clone(&self.final_handler),
        );

        let response = match next.run(req).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Request handler error");
                responses::status(e.to_status_code())
            }
        };

        response.map(|inner| body::on_complete(inner, move |_| drop(guard)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use http_body::Frame;
    use http_body_util::{BodyExt, StreamBody};
    use tokio::sync::oneshot;
    use wikigate_config::ConfigBuilder;
    use wikigate_core::Bytes;

    fn dispatcher() -> Dispatcher {
        let config = ConfigBuilder::new()
            .listen("127.0.0.1:0".parse().unwrap())
            .service("wikis", "http://127.0.0.1:9")
            .build()
            .unwrap();
        let router = Router::from_config(&config).unwrap();
        Dispatcher::new(router, HttpClient::new()).unwrap()
    }

    fn request(method: Method, path: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(body::empty())
            .unwrap()
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = dispatcher()
            .dispatch(request(Method::GET, "/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK");
    }

    #[tokio::test]
    async fn test_health_rejects_other_methods() {
        let response = dispatcher()
            .dispatch(request(Method::POST, "/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, HEAD");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = dispatcher()
            .dispatch(request(Method::GET, "/api/media/1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "Not Found");
    }

    #[tokio::test]
    async fn test_error_from_chain_is_mapped() {
        #[derive(Debug)]
        struct Failing;

        #[async_trait]
        impl Middleware for Failing {
            async fn call(&self, _req: Request<Body>, _next: Next) -> Result<Response<Body>> {
                Err(Error::InvalidRequest("bad input".to_string()))
            }
        }

        let chain: Arc<[Arc<dyn Middleware>]> = Arc::new([Arc::new(Failing)]);
        let handler = RequestHandler::new(dispatcher(), chain);

        let response = handler.handle(request(Method::GET, "/health")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Bad Request");
        assert_eq!(handler.in_flight().count(), 0);
    }

    /// Answers with a body whose only chunk arrives when the test sends it
    struct Streaming {
        body: std::sync::Mutex<Option<Body>>,
    }

    impl fmt::Debug for Streaming {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Streaming").finish()
        }
    }

    #[async_trait]
    impl Middleware for Streaming {
        async fn call(&self, _req: Request<Body>, _next: Next) -> Result<Response<Body>> {
            let body = self.body.lock().unwrap().take().unwrap_or_else(body::empty);
            Ok(Response::new(body))
        }
    }

    fn streaming_handler() -> (oneshot::Sender<&'static str>, RequestHandler) {
        let (tx, rx) = oneshot::channel::<&'static str>();
        let frames = futures::stream::once(async move {
            rx.await
                .map(|chunk| Frame::data(Bytes::from_static(chunk.as_bytes())))
        });
        let streaming = Streaming {
            body: std::sync::Mutex::new(Some(body::boxed(StreamBody::new(frames)))),
        };
        let chain: Arc<[Arc<dyn Middleware>]> = Arc::new([Arc::new(streaming)]);
        (tx, RequestHandler::new(dispatcher(), chain))
    }

    #[tokio::test]
    async fn test_in_flight_until_body_streamed() {
        let (tx, handler) = streaming_handler();

        let response = handler.handle(request(Method::GET, "/api/wikis/1")).await;
        assert_eq!(handler.in_flight().count(), 1);

        tx.send("page").unwrap();
        assert_eq!(body_string(response).await, "page");
        assert_eq!(handler.in_flight().count(), 0);
    }

    #[tokio::test]
    async fn test_in_flight_released_when_body_dropped() {
        let (_tx, handler) = streaming_handler();

        let response = handler.handle(request(Method::GET, "/api/wikis/1")).await;
        assert_eq!(handler.in_flight().count(), 1);

        drop(response);
        assert_eq!(handler.in_flight().count(), 0);
    }

    #[test]
    fn test_in_flight_guard() {
        let gauge = InFlight::default();
        let first = gauge.enter();
        let second = gauge.enter();
        assert_eq!(gauge.count(), 2);

        drop(first);
        assert_eq!(gauge.count(), 1);
        drop(second);
        assert_eq!(gauge.count(), 0);
    }
}

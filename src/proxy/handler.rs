use crate::balance::Balancer;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::proxy::envelope::{self, BoxBody};
use crate::registry::{ServiceInstance, ServiceRegistry};
use http::header::{HeaderName, HeaderValue, CONNECTION, TRANSFER_ENCODING};
use http::{Request, Response, Uri};
use http_body_util::BodyExt;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Derives the service name from a request path.
/// The default takes the first path segment.
pub type ServiceNameFn = fn(&str) -> String;

/// Maps a balanced instance + original path to the target URL.
/// The default composes `http://{host}:{port}{path}`.
pub type TargetUrlFn = fn(&ServiceInstance, &str) -> Result<Uri, GatewayError>;

type LocalHandler = fn(&Dispatcher) -> Response<BoxBody>;

/// Paths served by the gateway itself (matched by prefix, checked before
/// any routing).
const LOCAL_PATHS: &[(&str, LocalHandler)] = &[
    ("/gateway/getServices", Dispatcher::local_get_services),
    ("/gateway/refreshServices", Dispatcher::local_refresh_services),
];

/// Path routing + load balancing + single-host reverse proxying.
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
    balancer: Balancer,
    client: Client<HttpConnector, BoxBody>,
    /// Wall-clock budget for the upstream round-trip.
    upstream_timeout: Duration,
    service_name_fn: ServiceNameFn,
    target_url_fn: TargetUrlFn,
}

impl Dispatcher {
    pub fn new(cfg: &GatewayConfig, registry: Arc<ServiceRegistry>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            registry,
            balancer: Balancer::new(cfg.router.balance_policy),
            client,
            upstream_timeout: Duration::from_secs(cfg.write_timeout_secs),
            service_name_fn: default_service_name,
            target_url_fn: default_target_url,
        }
    }

    /// Handle one admitted request: local-path interception, then
    /// resolve → balance → forward.
    pub async fn serve(&self, req: Request<BoxBody>, client_ip: IpAddr) -> Response<BoxBody> {
        let path = req.uri().path().to_string();

        for (prefix, handler) in LOCAL_PATHS {
            if path.starts_with(prefix) {
                return handler(self);
            }
        }

        let instance = match self.resolve(&path) {
            Ok(instance) => instance,
            Err(e) => return envelope::json_error(&e.to_string()),
        };

        let target = match (self.target_url_fn)(&instance, &path) {
            Ok(target) => target,
            Err(e) => return envelope::json_error(&e.to_string()),
        };

        let out_uri = match outgoing_uri(&target, req.uri()) {
            Ok(uri) => uri,
            Err(e) => return envelope::json_error(&e.to_string()),
        };

        self.forward(req, out_uri, client_ip).await
    }

    /// Path → service name → one balanced instance.
    fn resolve(&self, path: &str) -> Result<ServiceInstance, GatewayError> {
        let service_name = (self.service_name_fn)(path);
        let instances = self.registry.lookup(&service_name).unwrap_or_default();
        self.balancer.pick(&service_name, &instances)
    }

    /// Forward the request to the target and stream the response back,
    /// tagged with `X-Proxy: Gateway`.
    async fn forward(
        &self,
        req: Request<BoxBody>,
        out_uri: Uri,
        client_ip: IpAddr,
    ) -> Response<BoxBody> {
        let start = Instant::now();
        let (parts, body) = req.into_parts();

        let mut builder = Request::builder()
            .method(parts.method.clone())
            .uri(out_uri.clone());
        let mut headers = parts.headers;
        remove_hop_headers(&mut headers);
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }

        let out_req = match builder.body(body) {
            Ok(r) => r,
            Err(e) => {
                warn!("proxy: failed to build upstream request, error={}", e);
                return envelope::json_error("bad gateway");
            }
        };

        match tokio::time::timeout(self.upstream_timeout, self.client.request(out_req)).await {
            Ok(Ok(resp)) => {
                let status = resp.status().as_u16();
                let mut resp = resp.map(BodyExt::boxed);
                resp.headers_mut().insert(
                    HeaderName::from_static("x-proxy"),
                    HeaderValue::from_static("Gateway"),
                );

                info!(
                    client_ip = %client_ip,
                    method = %parts.method,
                    path = %parts.uri.path(),
                    status = status,
                    upstream = %out_uri,
                    latency_ms = %start.elapsed().as_millis(),
                    "access"
                );

                resp
            }
            Ok(Err(e)) => {
                warn!("proxy: upstream error, target={}, error={}", out_uri, e);
                envelope::json_error("bad gateway")
            }
            Err(_) => {
                warn!("proxy: upstream timeout, target={}", out_uri);
                envelope::json_error("gateway timeout")
            }
        }
    }

    fn local_get_services(&self) -> Response<BoxBody> {
        envelope::json_success(self.registry.snapshot().as_ref())
    }

    fn local_refresh_services(&self) -> Response<BoxBody> {
        match self.registry.reload_once() {
            Ok(()) => envelope::json_success("success"),
            Err(e) => envelope::json_error(&e.to_string()),
        }
    }
}

pub fn default_service_name(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or("")
        .to_string()
}

pub fn default_target_url(instance: &ServiceInstance, path: &str) -> Result<Uri, GatewayError> {
    if instance.is_empty() {
        return Err(GatewayError::TargetUrlInvalid);
    }
    format!("http://{}:{}{}", instance.host, instance.port, path)
        .parse::<Uri>()
        .map_err(|_| GatewayError::TargetUrlInvalid)
}

/// Build the URI actually sent upstream: the target's scheme/authority, the
/// target's path exactly as mapped (never re-composed from the inbound
/// path), and the original query string.
fn outgoing_uri(target: &Uri, original: &Uri) -> Result<Uri, GatewayError> {
    let authority = target
        .authority()
        .cloned()
        .ok_or(GatewayError::TargetUrlInvalid)?;

    let path_and_query = match original.query() {
        Some(q) => format!("{}?{}", target.path(), q),
        None => target.path().to_string(),
    };

    Uri::builder()
        .scheme("http")
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|_| GatewayError::TargetUrlInvalid)
}

fn remove_hop_headers(headers: &mut http::HeaderMap) {
    let hop_headers: &[HeaderName] = &[
        CONNECTION,
        HeaderName::from_static("keep-alive"),
        HeaderName::from_static("proxy-authenticate"),
        HeaderName::from_static("proxy-authorization"),
        HeaderName::from_static("te"),
        HeaderName::from_static("trailers"),
        TRANSFER_ENCODING,
        HeaderName::from_static("upgrade"),
    ];

    for h in hop_headers {
        headers.remove(h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ServiceMap, StaticProvider};
    use http_body_util::BodyExt;

    #[test]
    fn test_default_service_name() {
        assert_eq!(default_service_name("/show/stats"), "show");
        assert_eq!(default_service_name("/show"), "show");
        assert_eq!(default_service_name("/"), "");
        assert_eq!(default_service_name(""), "");
    }

    #[test]
    fn test_default_target_url() {
        let inst = ServiceInstance {
            host: "127.0.0.1".to_string(),
            port: "8007".to_string(),
            weight: 0,
        };
        let uri = default_target_url(&inst, "/show/stats").unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:8007/show/stats");

        assert_eq!(
            default_target_url(&ServiceInstance::default(), "/show/stats"),
            Err(GatewayError::TargetUrlInvalid)
        );
    }

    #[test]
    fn test_outgoing_uri_preserves_query() {
        let target: Uri = "http://127.0.0.1:8007/show/stats".parse().unwrap();
        let original: Uri = "/show/stats?page=2&size=10".parse().unwrap();
        let out = outgoing_uri(&target, &original).unwrap();
        assert_eq!(
            out.to_string(),
            "http://127.0.0.1:8007/show/stats?page=2&size=10"
        );

        let bare: Uri = "/show/stats".parse().unwrap();
        let out = outgoing_uri(&target, &bare).unwrap();
        assert_eq!(out.to_string(), "http://127.0.0.1:8007/show/stats");
    }

    #[test]
    fn test_remove_hop_headers() {
        let mut headers = http::HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("te", HeaderValue::from_static("trailers"));
        headers.insert("accept", HeaderValue::from_static("application/json"));
        remove_hop_headers(&mut headers);
        assert!(!headers.contains_key(CONNECTION));
        assert!(!headers.contains_key("te"));
        assert!(headers.contains_key("accept"));
    }

    fn dispatcher_with(services: ServiceMap) -> Dispatcher {
        let registry = Arc::new(ServiceRegistry::new(
            Arc::new(StaticProvider::new(services)),
            Duration::from_secs(600),
            false,
        ));
        registry.reload_once().unwrap();
        Dispatcher::new(&GatewayConfig::default(), registry)
    }

    async fn body_string(resp: Response<BoxBody>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_service_gets_error_envelope() {
        let d = dispatcher_with(ServiceMap::new());
        let req = Request::builder()
            .uri("/nope/anything")
            .body(envelope::empty_body())
            .unwrap();
        let resp = d.serve(req, "127.0.0.1".parse().unwrap()).await;
        assert_eq!(
            body_string(resp).await,
            r#"{"code":5000,"msg":"can not match the specified service: nope","data":""}"#
        );
    }

    #[tokio::test]
    async fn test_local_get_services() {
        let mut services = ServiceMap::new();
        services.insert(
            "show".to_string(),
            vec![ServiceInstance {
                host: "127.0.0.1".to_string(),
                port: "8007".to_string(),
                weight: 0,
            }],
        );
        let d = dispatcher_with(services);
        let req = Request::builder()
            .uri("/gateway/getServices")
            .body(envelope::empty_body())
            .unwrap();
        let resp = d.serve(req, "127.0.0.1".parse().unwrap()).await;
        let body = body_string(resp).await;
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["code"], 0);
        assert_eq!(v["data"]["show"][0]["port"], "8007");
    }

    #[tokio::test]
    async fn test_local_refresh_services() {
        let d = dispatcher_with(ServiceMap::new());
        let req = Request::builder()
            .uri("/gateway/refreshServices")
            .body(envelope::empty_body())
            .unwrap();
        let resp = d.serve(req, "127.0.0.1".parse().unwrap()).await;
        assert_eq!(
            body_string(resp).await,
            r#"{"code":0,"msg":"","data":"success"}"#
        );
    }
}

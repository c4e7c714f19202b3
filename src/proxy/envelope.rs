use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use http_body_util::{BodyExt, Full};
use hyper::Response;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Default error code for gateway-level failures.
pub const RESPONSE_CODE_ERROR: i64 = 5000;

/// Every gateway-produced response uses this envelope; proxied responses
/// pass through untouched.
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    code: i64,
    msg: &'a str,
    data: T,
}

pub fn json_error(msg: &str) -> Response<BoxBody> {
    json_error_with_code(RESPONSE_CODE_ERROR, msg)
}

pub fn json_error_with_code(code: i64, msg: &str) -> Response<BoxBody> {
    let body = serde_json::to_string(&Envelope {
        code,
        msg,
        data: "",
    })
    .unwrap_or_default();
    json_response(body)
}

pub fn json_success<T: Serialize>(data: T) -> Response<BoxBody> {
    let body = serde_json::to_string(&Envelope {
        code: 0,
        msg: "",
        data,
    })
    .unwrap_or_default();
    json_response(body)
}

fn json_response(body: String) -> Response<BoxBody> {
    Response::builder()
        .header(CONTENT_TYPE, "application/json; charset=utf-8")
        .body(full_body(body))
        .unwrap()
}

/// Derive the client IP: the left-most `X-Forwarded-For` entry when a
/// trusted proxy sits in front, otherwise the TCP peer address.
pub fn client_ip(headers: &HeaderMap, peer_addr: SocketAddr) -> Option<IpAddr> {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }
    Some(peer_addr.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    async fn body_string(resp: Response<BoxBody>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_error_envelope_shape() {
        let resp = json_error("boom");
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
        assert_eq!(
            body_string(resp).await,
            r#"{"code":5000,"msg":"boom","data":""}"#
        );
    }

    #[tokio::test]
    async fn test_success_envelope_shape() {
        let resp = json_success("success");
        assert_eq!(
            body_string(resp).await,
            r#"{"code":0,"msg":"","data":"success"}"#
        );
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let peer: SocketAddr = "192.168.1.9:41000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.0.0.7, 172.16.0.1"),
        );
        assert_eq!(
            client_ip(&headers, peer),
            Some("10.0.0.7".parse().unwrap())
        );
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let peer: SocketAddr = "192.168.1.9:41000".parse().unwrap();
        let headers = HeaderMap::new();
        assert_eq!(
            client_ip(&headers, peer),
            Some("192.168.1.9".parse().unwrap())
        );

        let mut garbage = HeaderMap::new();
        garbage.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        assert_eq!(
            client_ip(&garbage, peer),
            Some("192.168.1.9".parse().unwrap())
        );
    }
}

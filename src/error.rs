use std::fmt;

/// Gateway-level failures that reach the client as a code-5000 JSON envelope.
///
/// The admission and routing messages are part of the wire contract and are
/// kept byte-identical across releases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Global rate threshold exceeded, or the global limit is configured to 0.
    ServiceBusy,
    /// The client IP could not be derived from the connection.
    ClientIpUnknown,
    Blacklisted(String),
    /// Reject-list hit or per-IP threshold exceeded.
    RateLimited(String),
    ServiceNameEmpty,
    ServiceNotFound(String),
    /// The balanced instance could not be turned into a target URL
    /// (empty host/port from an under-weighted pool, or an unparsable URI).
    TargetUrlInvalid,
    /// Service provider (registry reload) failure.
    Provider(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::ServiceBusy => write!(f, "服务器繁忙，请稍后再试."),
            GatewayError::ClientIpUnknown => write!(f, "未获取到客户端IP."),
            GatewayError::Blacklisted(ip) => write!(f, "当前IP：{}已被加入到黑名单.", ip),
            GatewayError::RateLimited(ip) => {
                write!(f, "当前IP：{}访问过于频繁，请稍后再试.", ip)
            }
            GatewayError::ServiceNameEmpty => write!(f, "serviceName can not be empty."),
            GatewayError::ServiceNotFound(name) => {
                write!(f, "can not match the specified service: {}", name)
            }
            GatewayError::TargetUrlInvalid => write!(f, "404 Not Found"),
            GatewayError::Provider(msg) => write!(f, "service provider error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

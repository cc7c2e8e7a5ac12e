use axum::http::HeaderMap;
use clap::ValueEnum;
use sha2::{Digest, Sha256};

pub const UNKNOWN_CLIENT: &str = "unknown";

// How the quota key is derived from request metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum IdentityScheme {
    // raw client address
    #[default]
    Ip,
    // sha256 of address + user agent
    Fingerprint,
}

/// Caller address: `client-ip`, then the first `x-forwarded-for` hop, then "unknown".
pub fn client_ip(headers: &HeaderMap) -> String {
    let direct = headers
        .get("client-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = direct {
        return ip.to_string();
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

pub fn client_id(scheme: IdentityScheme, headers: &HeaderMap) -> String {
    let ip = client_ip(headers);
    match scheme {
        IdentityScheme::Ip => ip,
        IdentityScheme::Fingerprint => {
            let user_agent = headers
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            fingerprint(&ip, user_agent)
        }
    }
}

// hex sha256 of "ip|user-agent"
pub fn fingerprint(ip: &str, user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip);
    hasher.update("|");
    hasher.update(user_agent);
    format!("{:x}", hasher.finalize())
}

// Loopback and home-network addresses seen during local development
pub fn is_local_dev(ip: &str) -> bool {
    ip == "::1" || ip == "127.0.0.1" || ip.starts_with("192.168.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn client_ip_header_wins() {
        let h = headers(&[("client-ip", "203.0.113.1"), ("x-forwarded-for", "198.51.100.2")]);
        assert_eq!(client_ip(&h), "203.0.113.1");
    }

    #[test]
    fn forwarded_for_uses_first_hop() {
        let h = headers(&[("x-forwarded-for", "198.51.100.2, 10.0.0.1")]);
        assert_eq!(client_ip(&h), "198.51.100.2");
    }

    #[test]
    fn missing_headers_fall_back_to_sentinel() {
        assert_eq!(client_ip(&HeaderMap::new()), UNKNOWN_CLIENT);
        assert_eq!(client_ip(&headers(&[("client-ip", "  ")])), UNKNOWN_CLIENT);
    }

    #[test]
    fn fingerprint_depends_on_user_agent() {
        let a = headers(&[("client-ip", "203.0.113.1"), ("user-agent", "curl/8")]);
        let b = headers(&[("client-ip", "203.0.113.1"), ("user-agent", "firefox")]);
        let id_a = client_id(IdentityScheme::Fingerprint, &a);

        assert_eq!(id_a.len(), 64);
        assert_ne!(id_a, client_id(IdentityScheme::Fingerprint, &b));
        assert_eq!(id_a, client_id(IdentityScheme::Fingerprint, &a));
        assert_eq!(client_id(IdentityScheme::Ip, &a), "203.0.113.1");
    }

    #[test]
    fn local_dev_addresses() {
        assert!(is_local_dev("127.0.0.1"));
        assert!(is_local_dev("::1"));
        assert!(is_local_dev("192.168.1.20"));
        assert!(!is_local_dev("203.0.113.1"));
        assert!(!is_local_dev(UNKNOWN_CLIENT));
    }
}

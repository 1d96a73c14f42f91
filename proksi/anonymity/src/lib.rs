//! Classifies a candidate proxy's anonymity level by asking an echo
//! service what headers it saw, the way
//! `examples/original_source/pkg/utils/http.go`'s `HTTPBinUtil` does: a
//! request routed through the candidate reveals whether it added a `Via`
//! header and whether it leaked the caller's real IP in
//! `X-Forwarded-For`/`X-Real-Ip`.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use proksi_core::Anonymity;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("request through candidate proxy failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("echo service response did not include a headers object")]
    MissingHeaders,
    #[error("direct echo request did not reveal a public ip")]
    NoPublicIp,
}

#[derive(Debug, Deserialize)]
struct EchoBody {
    headers: EchoHeaders,
}

#[derive(Debug, Default, Deserialize)]
struct EchoHeaders {
    #[serde(rename = "X-Forwarded-For", default)]
    x_forwarded_for: Option<String>,
    #[serde(rename = "X-Real-Ip", default)]
    x_real_ip: Option<String>,
    #[serde(rename = "Via", default)]
    via: Option<String>,
}

impl EchoHeaders {
    fn leaks(&self, real_ip: IpAddr) -> bool {
        let real = real_ip.to_string();
        self.x_forwarded_for
            .as_deref()
            .map(|xff| xff.split(',').any(|ip| ip.trim() == real))
            .unwrap_or(false)
            || self.x_real_ip.as_deref().map(|ip| ip.trim() == real).unwrap_or(false)
    }

    /// The first valid IP from a comma-separated `X-Forwarded-For`, else
    /// `X-Real-Ip`, else `None` — used against the *direct* echo response to
    /// discover our own public IP.
    fn public_ip(&self) -> Option<IpAddr> {
        self.x_forwarded_for
            .as_deref()
            .and_then(|xff| xff.split(',').next())
            .and_then(|ip| ip.trim().parse().ok())
            .or_else(|| self.x_real_ip.as_deref().and_then(|ip| ip.trim().parse().ok()))
    }
}

/// Classifies candidate proxies by routing a request through them at a
/// configurable echo endpoint, rather than hardcoding `httpbin.org` — so
/// tests can point it at a local stand-in.
///
/// Grounded on the same file's `GetRequestHeadersUsingProxy`.
pub struct Classifier {
    echo_url: String,
    direct: reqwest::Client,
}

impl Classifier {
    pub fn new(echo_url: impl Into<String>) -> Self {
        Self {
            echo_url: echo_url.into(),
            direct: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .expect("reqwest client config is static and known-good"),
        }
    }

    /// Classifies `addr`'s anonymity level. Per the echo service's own
    /// contract this makes two requests every call — direct (to discover
    /// our current public IP) and through `addr` — rather than caching the
    /// direct result, since our own egress IP can change between calls.
    pub async fn classify(&self, addr: SocketAddr) -> Result<Anonymity, ClassifyError> {
        let direct: EchoBody = self.direct.get(&self.echo_url).send().await?.json().await?;
        let real_ip = direct.headers.public_ip().ok_or(ClassifyError::NoPublicIp)?;

        let proxy = reqwest::Proxy::http(format!("http://{addr}"))?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(Duration::from_secs(20))
            .build()?;

        let proxied: EchoBody = client.get(&self.echo_url).send().await?.json().await?;
        Ok(classify_headers(&proxied.headers, real_ip))
    }
}

/// The actual classification decision, pulled out of [`Classifier::classify`]
/// so it can be exercised directly against fixed header fixtures instead of
/// a live proxied request.
///
/// Leak detection is checked first and unconditionally: a proxy that leaks
/// the real IP is Transparent whether or not it also adds a `Via` header.
fn classify_headers(headers: &EchoHeaders, real_ip: IpAddr) -> Anonymity {
    if headers.leaks(real_ip) {
        Anonymity::Transparent
    } else if headers.via.is_some() {
        Anonymity::Anonymous
    } else {
        Anonymity::Elite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaks_detects_matching_forwarded_for_entry() {
        let headers = EchoHeaders {
            x_forwarded_for: Some("1.2.3.4, 5.6.7.8".to_string()),
            x_real_ip: None,
            via: Some("1.1 squid".to_string()),
        };
        assert!(headers.leaks("5.6.7.8".parse().unwrap()));
        assert!(!headers.leaks("9.9.9.9".parse().unwrap()));
    }

    #[test]
    fn leaks_falls_back_to_real_ip_header() {
        let headers = EchoHeaders {
            x_forwarded_for: None,
            x_real_ip: Some(" 1.2.3.4 ".to_string()),
            via: Some("1.1 squid".to_string()),
        };
        assert!(headers.leaks("1.2.3.4".parse().unwrap()));
    }

    /// Direct echo saw `X-Forwarded-For: "1.2.3.4, 5.6.7.8"`; proxied echo
    /// sees `X-Forwarded-For: "1.2.3.4"` plus a `Via` header — the proxy
    /// appended its own hop onto the chain without stripping the client's
    /// real IP, so this is Transparent.
    #[test]
    fn classifies_transparent_when_via_present_and_real_ip_leaks() {
        let headers = EchoHeaders {
            x_forwarded_for: Some("1.2.3.4".to_string()),
            x_real_ip: None,
            via: Some("1.1 squid".to_string()),
        };
        assert_eq!(
            classify_headers(&headers, "1.2.3.4".parse().unwrap()),
            Anonymity::Transparent
        );
    }

    /// Proxied echo sees `X-Forwarded-For: "5.6.7.8"` (the proxy's own
    /// address, not the client's) plus a `Via` header — the proxy
    /// identifies itself but doesn't leak the real IP, so this is
    /// Anonymous.
    #[test]
    fn classifies_anonymous_when_via_present_but_real_ip_absent() {
        let headers = EchoHeaders {
            x_forwarded_for: Some("5.6.7.8".to_string()),
            x_real_ip: None,
            via: Some("1.1 squid".to_string()),
        };
        assert_eq!(
            classify_headers(&headers, "1.2.3.4".parse().unwrap()),
            Anonymity::Anonymous
        );
    }

    #[test]
    fn classifies_elite_when_via_absent() {
        let headers = EchoHeaders::default();
        assert_eq!(
            classify_headers(&headers, "1.2.3.4".parse().unwrap()),
            Anonymity::Elite
        );
    }

    /// A proxy that leaks the real IP via `X-Forwarded-For` without ever
    /// adding its own `Via` header is still Transparent, not Elite — leak
    /// detection takes priority over the `Via` check.
    #[test]
    fn classifies_transparent_even_without_a_via_header() {
        let headers = EchoHeaders {
            x_forwarded_for: Some("1.2.3.4".to_string()),
            x_real_ip: None,
            via: None,
        };
        assert_eq!(
            classify_headers(&headers, "1.2.3.4".parse().unwrap()),
            Anonymity::Transparent
        );
    }

    #[test]
    fn public_ip_reads_first_entry_of_forwarded_for() {
        let headers = EchoHeaders {
            x_forwarded_for: Some("1.2.3.4, 5.6.7.8".to_string()),
            x_real_ip: None,
            via: None,
        };
        assert_eq!(headers.public_ip(), Some("1.2.3.4".parse().unwrap()));
    }

    #[test]
    fn public_ip_falls_back_to_real_ip_header() {
        let headers = EchoHeaders {
            x_forwarded_for: None,
            x_real_ip: Some(" 9.9.9.9 ".to_string()),
            via: None,
        };
        assert_eq!(headers.public_ip(), Some("9.9.9.9".parse().unwrap()));
    }

    #[test]
    fn public_ip_is_none_when_no_header_present() {
        assert_eq!(EchoHeaders::default().public_ip(), None);
    }
}

use std::net::IpAddr;
use url::{Host, Url};

/// Checks whether a URL's literal host is loopback, private or local-only
///
/// Covers IP literals in private, loopback, link-local, shared and
/// unspecified ranges, plus `localhost` and single-label or `.local`,
/// `.localhost`, `.internal` and `.lan` names. No DNS lookup happens here;
/// see [`resolves_to_private_address`] for that.
pub fn is_private_host(url: &Url) -> bool {
    match url.host() {
        None => true,
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost"
                || !domain.contains('.')
                || [".localhost", ".local", ".internal", ".lan"]
                    .iter()
                    .any(|suffix| domain.ends_with(suffix))
        }
        Some(Host::Ipv4(ip)) => is_private_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_private_ip(IpAddr::V6(ip)),
    }
}

/// Checks whether an address belongs to a non-public range
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                // 100.64.0.0/10 carrier-grade NAT
                || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}

/// Resolves a domain host and reports whether any address is private
///
/// Resolution failures are not treated as private: the crawl itself will
/// fail softly, which lets a cached snapshot serve as fallback when offline.
pub async fn resolves_to_private_address(url: &Url) -> bool {
    let Some(Host::Domain(domain)) = url.host() else {
        return is_private_host(url);
    };
    let port = url.port_or_known_default().unwrap_or(443);

    match tokio::net::lookup_host((domain, port)).await {
        Ok(mut addrs) => addrs.any(|addr| is_private_ip(addr.ip())),
        Err(e) => {
            tracing::debug!("DNS lookup for {} failed: {}", domain, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_public_hosts() {
        assert!(!is_private_host(&url("https://docs.rs/tokio")));
        assert!(!is_private_host(&url("https://93.184.216.34/")));
        assert!(!is_private_host(&url("https://[2606:4700::1111]/")));
    }

    #[test]
    fn test_local_names() {
        assert!(is_private_host(&url("https://localhost/")));
        assert!(is_private_host(&url("https://app.localhost/")));
        assert!(is_private_host(&url("https://printer.local/")));
        assert!(is_private_host(&url("https://db.internal/")));
        assert!(is_private_host(&url("https://intranet/")));
    }

    #[test]
    fn test_private_ipv4() {
        assert!(is_private_host(&url("https://127.0.0.1/")));
        assert!(is_private_host(&url("https://10.1.2.3/")));
        assert!(is_private_host(&url("https://172.16.0.1/")));
        assert!(is_private_host(&url("https://192.168.1.1/")));
        assert!(is_private_host(&url("https://169.254.169.254/")));
        assert!(is_private_host(&url("https://100.64.0.1/")));
        assert!(is_private_host(&url("https://0.0.0.0/")));
    }

    #[test]
    fn test_private_ipv6() {
        assert!(is_private_host(&url("https://[::1]/")));
        assert!(is_private_host(&url("https://[fd00::1]/")));
        assert!(is_private_host(&url("https://[fe80::1]/")));
        assert!(is_private_host(&url("https://[::ffff:192.168.0.1]/")));
    }

    #[tokio::test]
    async fn test_ip_literal_skips_dns() {
        assert!(resolves_to_private_address(&url("https://127.0.0.1/")).await);
        assert!(!resolves_to_private_address(&url("https://93.184.216.34/")).await);
    }
}

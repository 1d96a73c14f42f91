use std::fmt;

/// A single protocol a proxy endpoint may speak.
///
/// Grounded on `examples/original_source/pkg/protocol/protocol.go`: a plain
/// bitflag enum rather than a trait hierarchy, since the set of protocols a
/// proxy supports is small, fixed, and needs to be stored compactly on
/// every [`crate::Endpoint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Protocol {
    Http = 0b0001,
    Https = 0b0010,
    Socks4 = 0b0100,
    Socks5 = 0b1000,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [
        Protocol::Http,
        Protocol::Https,
        Protocol::Socks4,
        Protocol::Socks5,
    ];
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Socks4 => "socks4",
            Protocol::Socks5 => "socks5",
        })
    }
}

/// Parses a protocol name case-insensitively, ignoring surrounding
/// whitespace. Unrecognized names return `None` (callers generally fold
/// this into [`Protocols::EMPTY`], there is no `Unknown` protocol variant
/// distinct from "not present in the bitset").
impl std::str::FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(' ', "").as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            "socks4" => Ok(Protocol::Socks4),
            "socks5" => Ok(Protocol::Socks5),
            _ => Err(()),
        }
    }
}

/// A bitset over [`Protocol`]. Empty means "unknown / unsupported".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Protocols(u8);

impl Protocols {
    pub const EMPTY: Protocols = Protocols(0);

    pub fn new(protocols: impl IntoIterator<Item = Protocol>) -> Self {
        let mut bits = 0u8;
        for p in protocols {
            bits |= p as u8;
        }
        Protocols(bits)
    }

    pub fn supports(&self, proto: Protocol) -> bool {
        self.0 & (proto as u8) != 0
    }

    pub fn combine(self, other: Protocols) -> Protocols {
        Protocols(self.0 | other.0)
    }

    pub fn insert(&mut self, proto: Protocol) {
        self.0 |= proto as u8;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Protocol> + '_ {
        Protocol::ALL.into_iter().filter(|p| self.supports(*p))
    }

    /// Derives which payload kinds this wire protocol set can relay. An
    /// HTTP-protocol proxy relays `Http` traffic directly and `Https`
    /// only once it also answers `CONNECT` (the `Https` wire probe);
    /// a SOCKS4/5 proxy tunnels arbitrary TCP, so it relays both.
    pub fn supported_traffic(&self) -> crate::Traffics {
        let mut kinds = Vec::new();
        if self.supports(Protocol::Http) {
            kinds.push(crate::Traffic::Http);
        }
        if self.supports(Protocol::Https) {
            kinds.push(crate::Traffic::Http);
            kinds.push(crate::Traffic::Https);
        }
        if self.supports(Protocol::Socks4) || self.supports(Protocol::Socks5) {
            kinds.push(crate::Traffic::Http);
            kinds.push(crate::Traffic::Https);
        }
        crate::Traffics::new(kinds)
    }
}

impl fmt::Display for Protocols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", names.join(","))
    }
}

impl FromIterator<Protocol> for Protocols {
    fn from_iter<T: IntoIterator<Item = Protocol>>(iter: T) -> Self {
        Protocols::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn protocol_round_trips() {
        for p in Protocol::ALL {
            assert_eq!(Protocol::from_str(&p.to_string()).unwrap(), p);
        }
    }

    #[test]
    fn protocols_combine_is_union() {
        let a = Protocols::new([Protocol::Http]);
        let b = Protocols::new([Protocol::Socks5]);
        let c = a.combine(b);
        assert!(c.supports(Protocol::Http));
        assert!(c.supports(Protocol::Socks5));
        assert!(!c.supports(Protocol::Https));
    }

    #[test]
    fn new_protocols_round_trips_components() {
        let p = Protocols::new([Protocol::Http, Protocol::Socks4]);
        let rebuilt = Protocols::new(p.iter());
        assert_eq!(p, rebuilt);
    }

    #[test]
    fn empty_protocols_supports_nothing() {
        assert!(Protocols::EMPTY.is_empty());
        for p in Protocol::ALL {
            assert!(!Protocols::EMPTY.supports(p));
        }
    }

    #[test]
    fn http_only_supports_http_traffic_only() {
        let traffic = Protocols::new([Protocol::Http]).supported_traffic();
        assert!(traffic.supports(crate::Traffic::Http));
        assert!(!traffic.supports(crate::Traffic::Https));
    }

    #[test]
    fn https_capable_proxy_supports_both_traffic_kinds() {
        let traffic = Protocols::new([Protocol::Http, Protocol::Https]).supported_traffic();
        assert!(traffic.supports(crate::Traffic::Http));
        assert!(traffic.supports(crate::Traffic::Https));
    }

    #[test]
    fn socks_proxy_supports_both_traffic_kinds() {
        let traffic = Protocols::new([Protocol::Socks5]).supported_traffic();
        assert!(traffic.supports(crate::Traffic::Http));
        assert!(traffic.supports(crate::Traffic::Https));
    }
}

use std::fmt;

/// A kind of payload an endpoint has been observed relaying, independent of
/// which wire [`crate::Protocol`] it speaks to do so — an HTTP-protocol
/// proxy can relay both `Http` and `Https` traffic (via `CONNECT`), while a
/// SOCKS4/5 proxy can relay arbitrary TCP.
///
/// **[ADDED]** mirrors `examples/original_source/pkg/traffic/traffic.go`'s
/// role as a dimension kept separate from `Protocol`; spec.md does not name
/// it, but the original keeps the two orthogonal and proksi follows suit
/// rather than overloading `Protocols`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Traffic {
    Http = 0b01,
    Https = 0b10,
}

impl fmt::Display for Traffic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Traffic::Http => "http",
            Traffic::Https => "https",
        })
    }
}

/// A bitset over [`Traffic`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Traffics(u8);

impl Traffics {
    pub const EMPTY: Traffics = Traffics(0);

    pub fn new(kinds: impl IntoIterator<Item = Traffic>) -> Self {
        let mut bits = 0u8;
        for k in kinds {
            bits |= k as u8;
        }
        Traffics(bits)
    }

    pub fn supports(&self, kind: Traffic) -> bool {
        self.0 & (kind as u8) != 0
    }

    pub fn insert(&mut self, kind: Traffic) {
        self.0 |= kind as u8;
    }
}

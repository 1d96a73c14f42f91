use std::fmt;

/// How well an upstream proxy conceals the client's IP and its own
/// presence. Grounded on
/// `examples/original_source/pkg/proxy/anonymity.go`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Anonymity {
    #[default]
    Unknown,
    /// The destination server can see the client's real IP.
    Transparent,
    /// The destination server knows a proxy is in use, but not the real IP.
    Anonymous,
    /// The destination server cannot tell a proxy is in use at all.
    Elite,
}

impl fmt::Display for Anonymity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Anonymity::Unknown => "unknown",
            Anonymity::Transparent => "transparent",
            Anonymity::Anonymous => "anonymous",
            Anonymity::Elite => "elite",
        })
    }
}

impl std::str::FromStr for Anonymity {
    type Err = std::convert::Infallible;

    /// Unlike [`crate::Protocol::from_str`] this never fails: an
    /// unrecognized string simply parses as `Unknown`, matching
    /// `ParseAnonymity` in the original source.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().replace(' ', "").as_str() {
            "transparent" => Anonymity::Transparent,
            "anonymous" => Anonymity::Anonymous,
            "elite" => Anonymity::Elite,
            _ => Anonymity::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_named_variants() {
        for a in [
            Anonymity::Unknown,
            Anonymity::Transparent,
            Anonymity::Anonymous,
            Anonymity::Elite,
        ] {
            assert_eq!(Anonymity::from_str(&a.to_string()).unwrap(), a);
        }
    }

    #[test]
    fn unrecognized_string_parses_unknown() {
        assert_eq!(Anonymity::from_str("bogus").unwrap(), Anonymity::Unknown);
    }
}

//! Algorithm selection.

use crate::error::{Error, Result};

/// The call-graph construction algorithms, ordered by increasing
/// precision in their treatment of dynamic calls (and cost).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Static,
    Cha,
    Rta,
    Vta,
}

impl Algorithm {
    /// Parse an `--algo` value. The `pta` name is reserved and disabled.
    pub fn parse(name: &str) -> Result<Algorithm> {
        match name {
            "static" => Ok(Algorithm::Static),
            "cha" => Ok(Algorithm::Cha),
            "rta" => Ok(Algorithm::Rta),
            "vta" => Ok(Algorithm::Vta),
            "pta" => Err(Error::Unsupported {
                what: "pointer analysis is no longer supported".to_string(),
            }),
            other => Err(Error::UnknownAlgorithm {
                name: other.to_string(),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Static => "static",
            Algorithm::Cha => "cha",
            Algorithm::Rta => "rta",
            Algorithm::Vta => "vta",
        }
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Rta
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_algorithms() {
        assert_eq!(Algorithm::parse("static").unwrap(), Algorithm::Static);
        assert_eq!(Algorithm::parse("cha").unwrap(), Algorithm::Cha);
        assert_eq!(Algorithm::parse("rta").unwrap(), Algorithm::Rta);
        assert_eq!(Algorithm::parse("vta").unwrap(), Algorithm::Vta);
    }

    #[test]
    fn test_pta_is_reserved() {
        assert!(matches!(
            Algorithm::parse("pta"),
            Err(Error::Unsupported { .. })
        ));
    }

    #[test]
    fn test_unknown_algorithm() {
        assert!(matches!(
            Algorithm::parse("magic"),
            Err(Error::UnknownAlgorithm { name }) if name == "magic"
        ));
    }
}

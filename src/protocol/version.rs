//! Client version gate.
//!
//! BOINC clients report their version as a free-form string such as `7.16.3`
//! or `8.0.2 (x64)`. Capability detection fails safe: a version that cannot be
//! parsed is ranked below every threshold, so the client only ever receives the
//! legacy encodings.

use std::fmt;

/// First client release that understands `<no_rsc>` resource exclusion lists.
pub const MULTI_RESOURCE_EXCLUSION_MIN: ClientVersion = ClientVersion::new(7, 0, 0);

/// First client release that accepts weak (underscore-containing) account keys
/// from an account manager.
pub const WEAK_ACCOUNT_KEY_MIN: ClientVersion = ClientVersion::new(7, 2, 0);

/// Resource names used in `<no_rsc>` elements.
pub const RESOURCE_CPU: &str = "CPU";
pub const RESOURCE_NVIDIA: &str = "NVIDIA";
pub const RESOURCE_AMD: &str = "ATI";
pub const RESOURCE_INTEL: &str = "intel_gpu";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ClientVersion {
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Result of parsing a client-reported version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedVersion {
    Known(ClientVersion),
    Unparseable,
}

impl ParsedVersion {
    /// Parses the leading `major[.minor[.patch]]` token of `raw`.
    ///
    /// Anything after the first whitespace is ignored (clients append build
    /// notes such as `(x64)`). More than three components, empty components
    /// or non-digit characters make the version unparseable.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let Some(token) = raw.split_whitespace().next() else {
            return Self::Unparseable;
        };

        let mut parts = [0u32; 3];
        let mut count = 0;

        for component in token.split('.') {
            if count == parts.len()
                || component.is_empty()
                || !component.bytes().all(|b| b.is_ascii_digit())
            {
                return Self::Unparseable;
            }

            let Ok(value) = component.parse::<u32>() else {
                return Self::Unparseable;
            };

            parts[count] = value;
            count += 1;
        }

        Self::Known(ClientVersion::new(parts[0], parts[1], parts[2]))
    }

    /// Ordered comparison against a capability threshold.
    ///
    /// Unparseable versions never meet a threshold.
    #[must_use]
    pub fn at_least(self, threshold: ClientVersion) -> bool {
        match self {
            Self::Known(version) => version >= threshold,
            Self::Unparseable => false,
        }
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(version) => version.fmt(f),
            Self::Unparseable => f.write_str("unparseable"),
        }
    }
}

/// A weak account key is the legacy `<userid>_<hash>` form.
#[must_use]
pub fn is_weak_account_key(key: &str) -> bool {
    key.contains('_')
}

/// Resources an attachment keeps the client from using for a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExcludedResources {
    pub cpu: bool,
    pub nvidia: bool,
    pub amd: bool,
    pub intel: bool,
}

/// Wire dialect for resource exclusion, chosen per client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceExclusion {
    /// `<no_rsc>` elements, one per excluded resource.
    Named(Vec<String>),
    /// Pre-7.0 individual flags. Intel GPUs cannot be expressed.
    Legacy {
        no_cpu: bool,
        no_cuda: bool,
        no_ati: bool,
    },
}

/// What a given client is able to consume, derived once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientCapabilities {
    pub version: ParsedVersion,
    pub multi_resource_exclusion: bool,
    pub weak_account_keys: bool,
}

impl ClientCapabilities {
    #[must_use]
    pub fn detect(client_version: &str) -> Self {
        Self::from_version(ParsedVersion::parse(client_version))
    }

    #[must_use]
    pub fn from_version(version: ParsedVersion) -> Self {
        Self {
            version,
            multi_resource_exclusion: version.at_least(MULTI_RESOURCE_EXCLUSION_MIN),
            weak_account_keys: version.at_least(WEAK_ACCOUNT_KEY_MIN),
        }
    }

    /// Whether `key` may be sent to this client.
    #[must_use]
    pub fn accepts_account_key(&self, key: &str) -> bool {
        self.weak_account_keys || !is_weak_account_key(key)
    }

    #[must_use]
    pub fn resource_exclusion(&self, excluded: ExcludedResources) -> ResourceExclusion {
        if self.multi_resource_exclusion {
            let names = [
                (excluded.cpu, RESOURCE_CPU),
                (excluded.nvidia, RESOURCE_NVIDIA),
                (excluded.amd, RESOURCE_AMD),
                (excluded.intel, RESOURCE_INTEL),
            ]
            .into_iter()
            .filter(|(set, _)| *set)
            .map(|(_, name)| name.to_string())
            .collect();

            ResourceExclusion::Named(names)
        } else {
            ResourceExclusion::Legacy {
                no_cpu: excluded.cpu,
                no_cuda: excluded.nvidia,
                no_ati: excluded.amd,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_versions() {
        assert_eq!(
            ParsedVersion::parse("7.16.3"),
            ParsedVersion::Known(ClientVersion::new(7, 16, 3))
        );
        assert_eq!(
            ParsedVersion::parse("8.0"),
            ParsedVersion::Known(ClientVersion::new(8, 0, 0))
        );
        assert_eq!(
            ParsedVersion::parse("  7.24.1 (x64)"),
            ParsedVersion::Known(ClientVersion::new(7, 24, 1))
        );
    }

    #[test]
    fn test_parse_garbage_is_unparseable() {
        for raw in ["", "   ", "seven", "7..1", "7.1.2.3", "7.x", "-7.1", "v7.16.3"] {
            assert_eq!(ParsedVersion::parse(raw), ParsedVersion::Unparseable, "{raw}");
        }
    }

    #[test]
    fn test_unparseable_is_treated_as_oldest() {
        let caps = ClientCapabilities::detect("not a version");
        assert!(!caps.multi_resource_exclusion);
        assert!(!caps.weak_account_keys);
        assert!(!caps.accepts_account_key("123_abcdef"));
        assert!(caps.accepts_account_key("abcdef"));
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        assert!(ParsedVersion::parse("7.2.0").at_least(WEAK_ACCOUNT_KEY_MIN));
        assert!(!ParsedVersion::parse("7.1.99").at_least(WEAK_ACCOUNT_KEY_MIN));
        assert!(ParsedVersion::parse("7.0.0").at_least(MULTI_RESOURCE_EXCLUSION_MIN));
        assert!(!ParsedVersion::parse("6.12.34").at_least(MULTI_RESOURCE_EXCLUSION_MIN));
    }

    #[test]
    fn test_modern_exclusion_lists_names() {
        let caps = ClientCapabilities::detect("7.16.3");
        let excluded = ExcludedResources {
            cpu: true,
            nvidia: false,
            amd: true,
            intel: true,
        };

        assert_eq!(
            caps.resource_exclusion(excluded),
            ResourceExclusion::Named(vec![
                "CPU".to_string(),
                "ATI".to_string(),
                "intel_gpu".to_string()
            ])
        );
    }

    #[test]
    fn test_legacy_exclusion_drops_intel() {
        let caps = ClientCapabilities::detect("6.10.58");
        let excluded = ExcludedResources {
            cpu: false,
            nvidia: true,
            amd: false,
            intel: true,
        };

        assert_eq!(
            caps.resource_exclusion(excluded),
            ResourceExclusion::Legacy {
                no_cpu: false,
                no_cuda: true,
                no_ati: false,
            }
        );
    }
}

//! Host version numbers and applicability ranges

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A host application version (`major.minor.patch`).
///
/// Versions order numerically per component, which is what rule
/// applicability checks rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl HostVersion {
    /// Create a version from components
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Numeric encoding used to compare range widths.
    ///
    /// Components are weighted so that any minor step outranks any patch
    /// step. Components above 9999 saturate rather than overflow into the
    /// next weight.
    fn encode(&self) -> u64 {
        let clamp = |v: u32| u64::from(v.min(9_999));
        clamp(self.major) * 100_000_000 + clamp(self.minor) * 10_000 + clamp(self.patch)
    }
}

impl std::fmt::Display for HostVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for HostVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, '.');
        let major = parse_component(s, parts.next())?;
        let minor = parse_component(s, parts.next().or(Some("0")))?;
        let patch = parse_component(s, parts.next().or(Some("0")))?;
        Ok(Self { major, minor, patch })
    }
}

fn parse_component(full: &str, part: Option<&str>) -> Result<u32, VersionError> {
    let part = part.ok_or_else(|| VersionError::Malformed(full.to_string()))?;
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::Malformed(full.to_string()));
    }
    part.parse()
        .map_err(|_| VersionError::Malformed(full.to_string()))
}

impl TryFrom<String> for HostVersion {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HostVersion> for String {
    fn from(v: HostVersion) -> String {
        v.to_string()
    }
}

/// A half-open host version interval: `min` inclusive, `max` exclusive.
///
/// Either bound may be absent, meaning unbounded on that side. An
/// unbounded side counts as the widest possible span when ranges are
/// compared for rule precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VersionRange {
    /// Lowest host version the range applies to (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<HostVersion>,

    /// First host version the range no longer applies to (exclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<HostVersion>,
}

impl VersionRange {
    /// The unbounded range, applicable to every host version
    pub fn any() -> Self {
        Self { min: None, max: None }
    }

    /// Range bounded on both sides
    pub fn between(min: HostVersion, max: HostVersion) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Range applying to `min` and everything after it
    pub fn from_version(min: HostVersion) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Whether the given host version falls inside the range
    pub fn contains(&self, version: &HostVersion) -> bool {
        if let Some(min) = &self.min {
            if version < min {
                return false;
            }
        }
        if let Some(max) = &self.max {
            if version >= max {
                return false;
            }
        }
        true
    }

    /// Approximate width of the range, for precedence comparisons.
    ///
    /// Smaller is narrower. Unbounded ends saturate at `u64::MAX`.
    pub fn span(&self) -> u64 {
        let lo = self.min.as_ref().map(HostVersion::encode).unwrap_or(0);
        let hi = self.max.as_ref().map(HostVersion::encode).unwrap_or(u64::MAX);
        hi.saturating_sub(lo)
    }

    /// Whether this range is strictly narrower than `other`
    pub fn narrower_than(&self, other: &VersionRange) -> bool {
        self.span() < other.span()
    }
}

impl std::fmt::Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => write!(f, "[{min}, {max})"),
            (Some(min), None) => write!(f, "[{min}, *)"),
            (None, Some(max)) => write!(f, "[*, {max})"),
            (None, None) => write!(f, "[*, *)"),
        }
    }
}

/// Version parsing errors
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("malformed version string: '{0}'")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_version() {
        let v: HostVersion = "1.6.15".parse().unwrap();
        assert_eq!(v, HostVersion::new(1, 6, 15));
    }

    #[test]
    fn parse_short_version() {
        let v: HostVersion = "1.6".parse().unwrap();
        assert_eq!(v, HostVersion::new(1, 6, 0));
    }

    #[test]
    fn reject_malformed_versions() {
        assert!("".parse::<HostVersion>().is_err());
        assert!("1.x.3".parse::<HostVersion>().is_err());
        assert!("1..3".parse::<HostVersion>().is_err());
    }

    #[test]
    fn version_ordering() {
        let a = HostVersion::new(1, 5, 6);
        let b = HostVersion::new(1, 6, 0);
        assert!(a < b);
        assert!(HostVersion::new(2, 0, 0) > b);
    }

    #[test]
    fn range_contains_half_open() {
        let range = VersionRange::between(HostVersion::new(1, 6, 0), HostVersion::new(1, 7, 0));
        assert!(range.contains(&HostVersion::new(1, 6, 0)));
        assert!(range.contains(&HostVersion::new(1, 6, 15)));
        assert!(!range.contains(&HostVersion::new(1, 7, 0)));
        assert!(!range.contains(&HostVersion::new(1, 5, 6)));
    }

    #[test]
    fn unbounded_range_contains_everything() {
        let range = VersionRange::any();
        assert!(range.contains(&HostVersion::new(0, 0, 1)));
        assert!(range.contains(&HostVersion::new(99, 0, 0)));
    }

    #[test]
    fn narrower_range_wins() {
        let narrow = VersionRange::between(HostVersion::new(1, 6, 0), HostVersion::new(1, 6, 9));
        let wide = VersionRange::between(HostVersion::new(1, 0, 0), HostVersion::new(2, 0, 0));
        assert!(narrow.narrower_than(&wide));
        assert!(!wide.narrower_than(&narrow));
        assert!(narrow.narrower_than(&VersionRange::any()));
    }

    #[test]
    fn version_serializes_as_string() {
        let v = HostVersion::new(1, 6, 0);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"1.6.0\"");
        let back: HostVersion = serde_json::from_str("\"1.6.0\"").unwrap();
        assert_eq!(back, v);
    }
}

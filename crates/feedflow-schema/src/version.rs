//! Package versions and version-range expressions.
//!
//! [`Version`] is a semantic version with lenient parsing (`1.2` is `1.2.0`,
//! a leading `v` is accepted, build metadata is dropped). [`VersionRange`]
//! is a single interval with optional lower and upper bounds, parsed from
//! any of these forms:
//!
//! - `*` or an empty string: any version
//! - `1.2.0`: inclusive minimum
//! - `[1.0,2.0)`, `(,1.0]`, `[1.0]`: interval notation
//! - `>=1.0.0 <2.0.0`, `>=1.0.0, <2.0.0`, `^1.2`, `~1.2.3`, `=1.0.0`: comparator lists

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Errors produced while parsing versions and range expressions.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The string is not a valid semantic version.
    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    /// The package name cannot be used as a path component.
    #[error("invalid package name '{0}'")]
    InvalidName(String),

    /// The range expression is malformed or can never match.
    #[error("invalid version range '{range}': {reason}")]
    InvalidRange {
        /// The expression as written.
        range: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl VersionError {
    fn range(range: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            range: range.to_string(),
            reason: reason.into(),
        }
    }
}

/// A concrete package version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(semver::Version);

impl Version {
    /// Create a release version from its numeric components.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidVersion`] if the string has more than
    /// three numeric components, a non-numeric component, or an invalid
    /// prerelease tag.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let (core, suffix) = match body.find(|c: char| c == '-' || c == '+') {
            Some(idx) => (&body[..idx], &body[idx..]),
            None => (body, ""),
        };

        let parts: Vec<&str> = core.split('.').collect();
        let numeric = |p: &&str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if parts.len() > 3 || !parts.iter().all(numeric) {
            return Err(VersionError::InvalidVersion(s.to_string()));
        }

        let padded = format!(
            "{}.{}.{}{suffix}",
            parts[0],
            parts.get(1).unwrap_or(&"0"),
            parts.get(2).unwrap_or(&"0"),
        );
        let mut version = semver::Version::parse(&padded)
            .map_err(|_| VersionError::InvalidVersion(s.to_string()))?;
        version.build = semver::BuildMetadata::EMPTY;
        Ok(Self(version))
    }

    /// The smallest possible version (`0.0.0-0`).
    pub fn lowest() -> Self {
        let mut version = semver::Version::new(0, 0, 0);
        version.pre = semver::Prerelease::new("0").unwrap_or_default();
        Self(version)
    }

    /// The smallest version strictly greater than this one.
    ///
    /// For a release `x.y.z` that is `x.y.(z+1)-0`; for a prerelease
    /// `x.y.z-tag` it is `x.y.z-tag.0`.
    pub fn successor(&self) -> Self {
        let mut next = self.0.clone();
        if next.pre.is_empty() {
            next.patch += 1;
            next.pre = semver::Prerelease::new("0").unwrap_or_default();
        } else {
            let extended = format!("{}.0", next.pre.as_str());
            next.pre = semver::Prerelease::new(&extended).unwrap_or_default();
        }
        Self(next)
    }

    /// Returns `true` if this version carries a prerelease tag.
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// The normalized `major.minor.patch[-pre]` form used in paths.
    pub fn normalized(&self) -> String {
        self.0.to_string()
    }

    /// The underlying semantic version.
    pub fn semver(&self) -> &semver::Version {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.normalized())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// One end of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    /// The bounding version.
    pub version: Version,
    /// Whether the bounding version itself is inside the range.
    pub inclusive: bool,
}

impl Bound {
    /// An inclusive bound.
    pub fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    /// An exclusive bound.
    pub fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// A contiguous interval of versions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionRange {
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl VersionRange {
    /// The range that matches every version.
    pub fn any() -> Self {
        Self::default()
    }

    /// `>= version`.
    pub fn at_least(version: Version) -> Self {
        Self {
            lower: Some(Bound::inclusive(version)),
            upper: None,
        }
    }

    /// Exactly `version`.
    pub fn exact(version: Version) -> Self {
        Self {
            lower: Some(Bound::inclusive(version.clone())),
            upper: Some(Bound::inclusive(version)),
        }
    }

    /// Parse a range expression.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidRange`] for malformed expressions and
    /// for ranges whose lower bound lies above the upper bound.
    pub fn parse(expr: &str) -> Result<Self, VersionError> {
        let trimmed = expr.trim();
        let range = if trimmed.is_empty() || trimmed == "*" {
            Self::any()
        } else if trimmed.starts_with('[') || trimmed.starts_with('(') {
            Self::parse_interval(trimmed)?
        } else {
            Self::parse_comparators(trimmed)?
        };
        range.validate(expr)
    }

    fn parse_interval(expr: &str) -> Result<Self, VersionError> {
        let open_inclusive = expr.starts_with('[');
        let close_inclusive = match expr.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(VersionError::range(expr, "missing closing bracket")),
        };
        if expr.len() < 2 {
            return Err(VersionError::range(expr, "empty interval"));
        }
        let inner = &expr[1..expr.len() - 1];
        let version = |s: &str| {
            Version::parse(s).map_err(|_| VersionError::range(expr, format!("bad version '{s}'")))
        };

        let Some((lo, hi)) = inner.split_once(',') else {
            if !(open_inclusive && close_inclusive) {
                return Err(VersionError::range(expr, "exact match needs '[' and ']'"));
            }
            return Ok(Self::exact(version(inner.trim())?));
        };
        if hi.contains(',') {
            return Err(VersionError::range(expr, "too many commas"));
        }

        let (lo, hi) = (lo.trim(), hi.trim());
        if lo.is_empty() && hi.is_empty() {
            return Err(VersionError::range(expr, "interval has no bounds"));
        }

        let lower = if lo.is_empty() {
            None
        } else {
            Some(Bound {
                version: version(lo)?,
                inclusive: open_inclusive,
            })
        };
        let upper = if hi.is_empty() {
            None
        } else {
            Some(Bound {
                version: version(hi)?,
                inclusive: close_inclusive,
            })
        };
        Ok(Self { lower, upper })
    }

    fn parse_comparators(expr: &str) -> Result<Self, VersionError> {
        let raw: Vec<&str> = expr
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();

        let mut range = Self::any();
        let mut i = 0;
        while i < raw.len() {
            let mut token = raw[i].to_string();
            // ">= 1.0" arrives as two tokens
            if token.chars().all(is_operator_char) {
                i += 1;
                let Some(next) = raw.get(i) else {
                    return Err(VersionError::range(expr, "operator without a version"));
                };
                token.push_str(next);
            }
            range.apply_comparator(&token, expr)?;
            i += 1;
        }
        Ok(range)
    }

    fn apply_comparator(&mut self, token: &str, expr: &str) -> Result<(), VersionError> {
        if token == "*" {
            return Ok(());
        }
        let split = token
            .find(|c: char| !is_operator_char(c))
            .unwrap_or(token.len());
        let (op, rest) = token.split_at(split);
        let version = Version::parse(rest)
            .map_err(|_| VersionError::range(expr, format!("bad version '{rest}'")))?;

        match op {
            "" | ">=" => self.constrain_lower(Bound::inclusive(version)),
            ">" => self.constrain_lower(Bound::exclusive(version)),
            "<=" => self.constrain_upper(Bound::inclusive(version)),
            "<" => self.constrain_upper(Bound::exclusive(version)),
            "=" | "==" => {
                self.constrain_lower(Bound::inclusive(version.clone()));
                self.constrain_upper(Bound::inclusive(version));
            }
            "^" => {
                let upper = caret_ceiling(&version);
                self.constrain_lower(Bound::inclusive(version));
                self.constrain_upper(Bound::exclusive(upper));
            }
            "~" => {
                let s = version.semver();
                let upper = Version::new(s.major, s.minor + 1, 0);
                self.constrain_lower(Bound::inclusive(version));
                self.constrain_upper(Bound::exclusive(upper));
            }
            other => {
                return Err(VersionError::range(
                    expr,
                    format!("unknown operator '{other}'"),
                ));
            }
        }
        Ok(())
    }

    fn constrain_lower(&mut self, bound: Bound) {
        self.lower = Some(match self.lower.take() {
            None => bound,
            Some(current) => match current.version.cmp(&bound.version) {
                std::cmp::Ordering::Greater => current,
                std::cmp::Ordering::Less => bound,
                std::cmp::Ordering::Equal => Bound {
                    version: current.version,
                    inclusive: current.inclusive && bound.inclusive,
                },
            },
        });
    }

    fn constrain_upper(&mut self, bound: Bound) {
        self.upper = Some(match self.upper.take() {
            None => bound,
            Some(current) => match current.version.cmp(&bound.version) {
                std::cmp::Ordering::Less => current,
                std::cmp::Ordering::Greater => bound,
                std::cmp::Ordering::Equal => Bound {
                    version: current.version,
                    inclusive: current.inclusive && bound.inclusive,
                },
            },
        });
    }

    fn validate(self, expr: &str) -> Result<Self, VersionError> {
        if let (Some(lower), Some(upper)) = (&self.lower, &self.upper) {
            let empty = match lower.version.cmp(&upper.version) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Equal => !(lower.inclusive && upper.inclusive),
                std::cmp::Ordering::Less => false,
            };
            if empty {
                return Err(VersionError::range(expr, "range can never match"));
            }
        }
        Ok(self)
    }

    /// The lower bound, if any.
    pub fn lower(&self) -> Option<&Bound> {
        self.lower.as_ref()
    }

    /// The upper bound, if any.
    pub fn upper(&self) -> Option<&Bound> {
        self.upper.as_ref()
    }

    /// The version named by the lower bound, inclusive or not.
    pub fn min_version(&self) -> Option<&Version> {
        self.lower.as_ref().map(|b| &b.version)
    }

    /// Returns `true` if the range has no bounds at all.
    pub fn is_any(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// Returns `true` if `version` lies inside the range.
    pub fn contains(&self, version: &Version) -> bool {
        let above = self.lower.as_ref().is_none_or(|b| {
            if b.inclusive {
                version >= &b.version
            } else {
                version > &b.version
            }
        });
        let below = self.upper.as_ref().is_none_or(|b| {
            if b.inclusive {
                version <= &b.version
            } else {
                version < &b.version
            }
        });
        above && below
    }

    /// The highest of `versions` inside the range.
    pub fn best_match<'a, I>(&self, versions: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        versions.into_iter().filter(|v| self.contains(v)).max()
    }

    /// The lowest of `versions` inside the range.
    pub fn lowest_match<'a, I>(&self, versions: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        versions.into_iter().filter(|v| self.contains(v)).min()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lower, &self.upper) {
            (None, None) => write!(f, "*"),
            (Some(l), Some(u)) if l.version == u.version => write!(f, "={}", l.version),
            (lower, upper) => {
                let mut parts = Vec::new();
                if let Some(b) = lower {
                    let op = if b.inclusive { ">=" } else { ">" };
                    parts.push(format!("{op}{}", b.version));
                }
                if let Some(b) = upper {
                    let op = if b.inclusive { "<=" } else { "<" };
                    parts.push(format!("{op}{}", b.version));
                }
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '^' | '~')
}

fn caret_ceiling(version: &Version) -> Version {
    let s = version.semver();
    if s.major > 0 {
        Version::new(s.major + 1, 0, 0)
    } else if s.minor > 0 {
        Version::new(0, s.minor + 1, 0)
    } else {
        Version::new(0, 0, s.patch + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_lenient_version_parsing() {
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("v3"), Version::new(3, 0, 0));
        assert_eq!(v("1.0.0+build.5"), Version::new(1, 0, 0));
        assert!(v("1.0.0-beta").is_prerelease());
        assert_eq!(v("2.1.0-rc.1").normalized(), "2.1.0-rc.1");
    }

    #[test]
    fn test_invalid_versions() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
        assert!(Version::parse("one.two").is_err());
        assert!(Version::parse("1..2").is_err());
    }

    #[test]
    fn test_prerelease_orders_before_release() {
        assert!(v("1.0.0-beta") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
    }

    #[test]
    fn test_successor_is_tight() {
        let release = v("1.0.0");
        let next = release.successor();
        assert!(next > release);
        assert!(next < v("1.0.1"));
        assert!(next < v("1.0.1-alpha"));

        let pre = v("1.0.0-beta");
        let next = pre.successor();
        assert!(next > pre);
        assert!(next < v("1.0.0-beta.1"));
        assert!(next < v("1.0.0"));

        assert!(Version::lowest() < v("0.0.0"));
    }

    #[test]
    fn test_space_separated_comparators() {
        let range = VersionRange::parse(">=1.0.0 <2.0.0").unwrap();
        assert!(range.contains(&v("1.0.0")));
        assert!(range.contains(&v("1.9.9")));
        assert!(!range.contains(&v("2.0.0")));
        assert_eq!(range, VersionRange::parse(">=1.0.0, <2.0.0").unwrap());
        assert_eq!(range, VersionRange::parse(">= 1.0.0, < 2.0.0").unwrap());
    }

    #[test]
    fn test_interval_notation() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.contains(&v("1.0.0")));
        assert!(!range.contains(&v("2.0.0")));

        let range = VersionRange::parse("(,1.5]").unwrap();
        assert!(range.lower().is_none());
        assert!(range.contains(&v("1.5.0")));
        assert!(!range.contains(&v("1.5.1")));

        let range = VersionRange::parse("[1.2.3]").unwrap();
        assert_eq!(range, VersionRange::exact(v("1.2.3")));

        let range = VersionRange::parse("(1.0,)").unwrap();
        assert!(!range.contains(&v("1.0.0")));
        assert!(range.contains(&v("1.0.1")));
    }

    #[test]
    fn test_bare_version_is_minimum() {
        let range = VersionRange::parse("1.2").unwrap();
        assert_eq!(range, VersionRange::at_least(v("1.2.0")));
        assert_eq!(range.min_version(), Some(&v("1.2.0")));
        assert!(range.contains(&v("9.0.0")));
    }

    #[test]
    fn test_caret_and_tilde() {
        let caret = VersionRange::parse("^1.2").unwrap();
        assert!(caret.contains(&v("1.9.0")));
        assert!(!caret.contains(&v("2.0.0")));

        let caret_zero = VersionRange::parse("^0.3.1").unwrap();
        assert!(caret_zero.contains(&v("0.3.9")));
        assert!(!caret_zero.contains(&v("0.4.0")));

        let tilde = VersionRange::parse("~1.2.3").unwrap();
        assert!(tilde.contains(&v("1.2.9")));
        assert!(!tilde.contains(&v("1.3.0")));
    }

    #[test]
    fn test_malformed_ranges() {
        for expr in ["[1.0", "(1.0]", "[,]", ">=", ">=abc", "!1.0", "[2.0,1.0]", ">2.0 <1.0"] {
            assert!(
                VersionRange::parse(expr).is_err(),
                "expected '{expr}' to be rejected"
            );
        }
    }

    #[test]
    fn test_best_match_takes_highest_in_range() {
        let versions = [v("1.0.0"), v("2.0.0"), v("1.5.0")];
        let range = VersionRange::parse(">=1.0.0 <2.0.0").unwrap();
        assert_eq!(range.best_match(&versions), Some(&v("1.5.0")));
        assert_eq!(range.lowest_match(&versions), Some(&v("1.0.0")));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for expr in ["*", ">=1.0.0, <2.0.0", "=1.2.3", ">1.0.0", "<=3.0.0"] {
            let range = VersionRange::parse(expr).unwrap();
            assert_eq!(range.to_string(), expr);
            assert_eq!(VersionRange::parse(&range.to_string()).unwrap(), range);
        }
    }
}

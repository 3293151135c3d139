//! Version requirement strings (`^1.2`, `>=1.0, <2.0 || ==3.1.*`).
//!
//! A requirement is a disjunction (`||`) of comparator sets; the comparators
//! of a set (separated by commas or spaces) are conjoined. Every requirement
//! translates into a [`VersionRange`] that the resolver works with.

use std::fmt;
use std::str::FromStr;

use super::range::series_floor;
use super::{Version, VersionError, VersionRange};

/// Version requirement, a union of comparator sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReq {
    pub clauses: Vec<Vec<Comparator>>,
}

/// Individual version comparator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: PartialVersion,
}

/// Comparison operator for version requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Exact,      // ==1.0.0, =1.0.0, 1.0.0
    NotEqual,   // !=1.0.0
    Greater,    // >1.0.0
    GreaterEq,  // >=1.0.0
    Less,       // <1.0.0
    LessEq,     // <=1.0.0
    Tilde,      // ~1.0.0
    Caret,      // ^1.0.0
    Compatible, // ~=1.0
    Wildcard,   // *, 1.*, 1.2.*
}

/// Partial version for comparisons (may have missing components)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialVersion {
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    pub prerelease: Option<String>,
    pub local: Option<String>,
    /// Written with a trailing `*` component
    pub wildcard: bool,
}

const OPERATORS: [(&str, Op); 10] = [
    ("==", Op::Exact),
    ("!=", Op::NotEqual),
    (">=", Op::GreaterEq),
    ("<=", Op::LessEq),
    ("~=", Op::Compatible),
    (">", Op::Greater),
    ("<", Op::Less),
    ("=", Op::Exact),
    ("^", Op::Caret),
    ("~", Op::Tilde),
];

fn invalid(input: &str, reason: impl Into<String>) -> VersionError {
    VersionError::InvalidRequirement {
        input: input.to_string(),
        reason: reason.into(),
    }
}

// The release after a series. `None` when every component is already at its
// maximum, in which case the series has no upper bound.
fn next_major(major: u64) -> Option<Version> {
    major.checked_add(1).map(|major| Version::new(major, 0, 0))
}

fn next_minor(major: u64, minor: u64) -> Option<Version> {
    match minor.checked_add(1) {
        Some(minor) => Some(Version::new(major, minor, 0)),
        None => next_major(major),
    }
}

fn next_patch(major: u64, minor: u64, patch: u64) -> Option<Version> {
    match patch.checked_add(1) {
        Some(patch) => Some(Version::new(major, minor, patch)),
        None => next_minor(major, minor),
    }
}

/// `floor` up to, but excluding, the series starting at `upper`
fn series_below(floor: Version, upper: Option<Version>) -> VersionRange {
    match upper {
        Some(upper) => VersionRange::between(floor, series_floor(upper)),
        None => VersionRange::higher_than(floor),
    }
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '!' | '~' | '^')
}

impl VersionReq {
    /// Requirement matching every version
    pub fn any() -> Self {
        Self {
            clauses: vec![vec![Comparator {
                op: Op::Wildcard,
                version: PartialVersion::default(),
            }]],
        }
    }

    /// Parse a version requirement string
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid(input, "requirement is empty"));
        }

        let mut clauses = Vec::new();
        for alternative in trimmed.split("||") {
            let mut comparators = Vec::new();
            let mut pending_op = String::new();

            for token in alternative
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
            {
                // Allow a space between the operator and its version: ">= 1.0"
                if token.chars().all(is_operator_char) {
                    pending_op.push_str(token);
                    continue;
                }
                let joined = format!("{}{}", pending_op, token);
                pending_op.clear();
                comparators.push(Comparator::parse(&joined).map_err(|e| match e {
                    VersionError::InvalidRequirement { reason, .. } => invalid(input, reason),
                    other => invalid(input, other.to_string()),
                })?);
            }

            if !pending_op.is_empty() {
                return Err(invalid(
                    input,
                    format!("operator '{}' has no version", pending_op),
                ));
            }
            if comparators.is_empty() {
                return Err(invalid(input, "empty alternative"));
            }
            clauses.push(comparators);
        }

        Ok(Self { clauses })
    }

    /// Check if a version matches this requirement
    pub fn matches(&self, version: &Version) -> bool {
        self.to_range().contains(version)
    }

    /// The set of versions this requirement allows
    pub fn to_range(&self) -> VersionRange {
        self.clauses
            .iter()
            .map(|comparators| {
                comparators
                    .iter()
                    .fold(VersionRange::full(), |acc, c| acc.intersection(&c.to_range()))
            })
            .fold(VersionRange::empty(), |acc, r| acc.union(&r))
    }

    /// Whether any comparator names a pre-release explicitly
    pub fn mentions_prerelease(&self) -> bool {
        self.clauses
            .iter()
            .flatten()
            .any(|c| c.version.prerelease.is_some())
    }
}

impl FromStr for VersionReq {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Comparator {
    fn parse(token: &str) -> Result<Self, VersionError> {
        let (op, rest) = OPERATORS
            .iter()
            .find_map(|(prefix, op)| token.strip_prefix(prefix).map(|rest| (Some(*op), rest)))
            .unwrap_or((None, token));

        if rest.starts_with(is_operator_char) {
            return Err(invalid(token, "unknown operator"));
        }

        let version = PartialVersion::parse(rest)?;
        let op = match op {
            None | Some(Op::Exact) if version.is_wildcard() => Op::Wildcard,
            None => Op::Exact,
            Some(op) => op,
        };

        if op == Op::Compatible && version.minor.is_none() {
            return Err(invalid(token, "'~=' needs at least major.minor"));
        }
        if version.is_wildcard() && !matches!(op, Op::Wildcard | Op::NotEqual) {
            return Err(invalid(token, "wildcards are only allowed with '==' or '!='"));
        }

        Ok(Self { op, version })
    }

    /// Translate this comparator into a version range
    pub fn to_range(&self) -> VersionRange {
        let partial = &self.version;
        let Some(major) = partial.major else {
            return match self.op {
                Op::NotEqual => VersionRange::empty(),
                _ => VersionRange::full(),
            };
        };
        let floor = partial.to_version();

        match self.op {
            Op::Wildcard => partial.prefix_range(),
            Op::Exact => {
                if partial.patch.is_some() {
                    VersionRange::singleton(floor)
                } else {
                    partial.prefix_range()
                }
            },
            Op::NotEqual => {
                if partial.patch.is_some() && !partial.is_wildcard() {
                    VersionRange::singleton(floor).complement()
                } else {
                    partial.prefix_range().complement()
                }
            },
            Op::Greater => VersionRange::strictly_higher_than(floor),
            Op::GreaterEq => VersionRange::higher_than(floor),
            Op::Less => {
                let bound = if floor.is_prerelease() {
                    floor
                } else {
                    series_floor(floor)
                };
                VersionRange::strictly_lower_than(bound)
            },
            Op::LessEq => VersionRange::lower_than(floor),
            Op::Caret => {
                let minor = partial.minor.unwrap_or(0);
                let upper = if major > 0 || partial.minor.is_none() {
                    next_major(major)
                } else if minor > 0 || partial.patch.is_none() {
                    next_minor(0, minor)
                } else {
                    next_patch(0, 0, partial.patch.unwrap_or(0))
                };
                series_below(floor, upper)
            },
            Op::Tilde => {
                let upper = match partial.minor {
                    Some(minor) => next_minor(major, minor),
                    None => next_major(major),
                };
                series_below(floor, upper)
            },
            Op::Compatible => {
                let minor = partial.minor.unwrap_or(0);
                let upper = if partial.patch.is_some() {
                    next_minor(major, minor)
                } else {
                    next_major(major)
                };
                series_below(floor, upper)
            },
        }
    }
}

impl Default for PartialVersion {
    fn default() -> Self {
        Self {
            major: None,
            minor: None,
            patch: None,
            prerelease: None,
            local: None,
            wildcard: false,
        }
    }
}

impl PartialVersion {
    fn parse(input: &str) -> Result<Self, VersionError> {
        let body = input.strip_prefix('v').unwrap_or(input);
        if body.is_empty() {
            return Err(invalid(input, "missing version"));
        }

        let (core, qualifiers) = match body.find(|c| c == '-' || c == '+') {
            Some(idx) => (&body[..idx], Some(&body[idx..])),
            None => (body, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() > 3 {
            return Err(VersionError::InvalidFormat {
                input: input.to_string(),
            });
        }

        let mut numbers: [Option<u64>; 3] = [None, None, None];
        let mut wildcard_seen = false;
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if matches!(*part, "*" | "x" | "X") {
                wildcard_seen = true;
                continue;
            }
            if wildcard_seen {
                return Err(invalid(input, "numbers cannot follow a wildcard"));
            }
            *slot = Some(part.parse().map_err(|_| VersionError::InvalidNumber {
                component: part.to_string(),
            })?);
        }

        let mut partial = Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            prerelease: None,
            local: None,
            wildcard: wildcard_seen,
        };

        if let Some(qualifiers) = qualifiers {
            if partial.patch.is_none() || partial.wildcard {
                return Err(invalid(input, "qualifiers need a full major.minor.patch"));
            }
            let full = Version::parse(&format!("0.0.0{}", qualifiers))?;
            partial.prerelease = full.prerelease;
            partial.local = full.local;
        }

        Ok(partial)
    }

    /// True when the version ends in a wildcard component or is missing
    fn is_wildcard(&self) -> bool {
        self.major.is_none() || self.wildcard
    }

    /// Convert to a full version (filling missing parts with 0)
    pub fn to_version(&self) -> Version {
        Version {
            major: self.major.unwrap_or(0),
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            prerelease: self.prerelease.clone(),
            local: self.local.clone(),
        }
    }

    /// All versions sharing the given leading components
    fn prefix_range(&self) -> VersionRange {
        match (self.major, self.minor, self.patch) {
            (None, _, _) => VersionRange::full(),
            (Some(major), None, _) => series_below(Version::new(major, 0, 0), next_major(major)),
            (Some(major), Some(minor), None) => {
                series_below(Version::new(major, minor, 0), next_minor(major, minor))
            },
            (Some(_), Some(_), Some(_)) => VersionRange::singleton(self.to_version()),
        }
    }
}

impl fmt::Display for PartialVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(major) = self.major else {
            return write!(f, "*");
        };
        write!(f, "{}", major)?;
        if let Some(minor) = self.minor {
            write!(f, ".{}", minor)?;
            if let Some(patch) = self.patch {
                write!(f, ".{}", patch)?;
            }
        }
        if self.wildcard {
            write!(f, ".*")?;
        }
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(ref local) = self.local {
            write!(f, "+{}", local)?;
        }
        Ok(())
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Op::Exact => "==",
            Op::NotEqual => "!=",
            Op::Greater => ">",
            Op::GreaterEq => ">=",
            Op::Less => "<",
            Op::LessEq => "<=",
            Op::Tilde => "~",
            Op::Caret => "^",
            Op::Compatible => "~=",
            Op::Wildcard => "==",
        };
        f.write_str(text)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.op, self.version.major) {
            (Op::Wildcard, None) => write!(f, "*"),
            (Op::Wildcard, Some(_)) => write!(f, "=={}", self.version),
            (op, _) => write!(f, "{}{}", op, self.version),
        }
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, clause) in self.clauses.iter().enumerate() {
            if idx > 0 {
                write!(f, " || ")?;
            }
            for (pos, comparator) in clause.iter().enumerate() {
                if pos > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", comparator)?;
            }
        }
        Ok(())
    }
}

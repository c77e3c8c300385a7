//! Version interval parsing and matching
//!
//! Accepted forms:
//!
//! - an exact version: `1.2.3`
//! - `latest`
//! - a single bound: `>1.0.0`, `>=1.0.0`, `<2.0.0`, `<=2.0.0`
//! - two bounds joined by `and`: `>=1.0.0 and <2.0.0`
//!
//! Versions are compared by semver precedence; build metadata is ignored.

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;

use crate::core::{KilnError, KilnResult};

static BOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(>=|<=|>|<)\s*(\S+)$").expect("bound regex"));

static CONJUNCTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+and\s+").expect("and regex"));

/// Comparison operator of a bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Op {
    fn parse(s: &str) -> Option<Self> {
        match s {
            ">" => Some(Op::Greater),
            ">=" => Some(Op::GreaterOrEqual),
            "<" => Some(Op::Less),
            "<=" => Some(Op::LessOrEqual),
            _ => None,
        }
    }

    fn is_lower(self) -> bool {
        matches!(self, Op::Greater | Op::GreaterOrEqual)
    }

    fn is_inclusive(self) -> bool {
        matches!(self, Op::GreaterOrEqual | Op::LessOrEqual)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Greater => ">",
            Op::GreaterOrEqual => ">=",
            Op::Less => "<",
            Op::LessOrEqual => "<=",
        };
        f.write_str(s)
    }
}

/// One side of an interval (e.g. `>=1.0.0`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub op: Op,
    pub version: Version,
}

impl Bound {
    fn parse(interval: &str, s: &str) -> KilnResult<Self> {
        let caps = BOUND.captures(s.trim()).ok_or_else(|| {
            KilnError::interval_syntax(interval, format!("`{}` is not a comparison bound", s.trim()))
        })?;
        let op = Op::parse(&caps[1]).ok_or_else(|| {
            KilnError::interval_syntax(interval, format!("unknown operator `{}`", &caps[1]))
        })?;
        let version = parse_version(interval, &caps[2])?;
        Ok(Self { op, version })
    }

    /// Check if a version is on the accepted side of this bound
    pub fn admits(&self, version: &Version) -> bool {
        let ord = precedence(version, &self.version);
        match self.op {
            Op::Greater => ord == Ordering::Greater,
            Op::GreaterOrEqual => ord != Ordering::Less,
            Op::Less => ord == Ordering::Less,
            Op::LessOrEqual => ord != Ordering::Greater,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.version)
    }
}

/// A parsed version requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionInterval {
    /// `1.2.3`
    Exact(Version),
    /// `latest`: only the newest published version
    Latest,
    /// `>=1.2.3`
    Bounded(Bound),
    /// `>=1.0.0 and <2.0.0`, stored as (lower, upper)
    Range(Bound, Bound),
}

impl VersionInterval {
    /// Parse an interval expression, rejecting redundant or empty ranges
    pub fn parse(s: &str) -> KilnResult<Self> {
        let interval = s.trim();

        if interval.is_empty() {
            return Err(KilnError::interval_syntax(s, "empty interval"));
        }

        if interval == "latest" {
            return Ok(VersionInterval::Latest);
        }

        let parts: Vec<&str> = CONJUNCTION.split(interval).collect();
        match parts.as_slice() {
            [single] if single.starts_with(|c: char| c == '<' || c == '>') => {
                Ok(VersionInterval::Bounded(Bound::parse(interval, single)?))
            }
            [single] => Ok(VersionInterval::Exact(parse_version(interval, single)?)),
            [first, second] => {
                let first = Bound::parse(interval, first)?;
                let second = Bound::parse(interval, second)?;
                Self::range(interval, first, second)
            }
            _ => Err(KilnError::interval_syntax(
                interval,
                "expected at most two bounds joined by `and`",
            )),
        }
    }

    fn range(interval: &str, first: Bound, second: Bound) -> KilnResult<Self> {
        if first.op.is_lower() == second.op.is_lower() {
            return Err(KilnError::RedundantInterval {
                interval: interval.to_string(),
                suggestion: first.to_string(),
            });
        }

        let (lower, upper) = if first.op.is_lower() {
            (first, second)
        } else {
            (second, first)
        };

        match precedence(&lower.version, &upper.version) {
            Ordering::Greater => Err(KilnError::UnboundedInterval {
                interval: interval.to_string(),
                reason: format!("lower bound {} is above upper bound {}", lower, upper),
            }),
            Ordering::Equal if lower.op.is_inclusive() && upper.op.is_inclusive() => {
                Err(KilnError::RedundantInterval {
                    interval: interval.to_string(),
                    suggestion: lower.version.to_string(),
                })
            }
            Ordering::Equal => Err(KilnError::UnboundedInterval {
                interval: interval.to_string(),
                reason: format!("{} and {} exclude each other", lower, upper),
            }),
            Ordering::Less => Ok(VersionInterval::Range(lower, upper)),
        }
    }

    /// Check if a version satisfies this interval
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            VersionInterval::Exact(v) => precedence(version, v) == Ordering::Equal,
            VersionInterval::Latest => true,
            VersionInterval::Bounded(bound) => bound.admits(version),
            VersionInterval::Range(lower, upper) => lower.admits(version) && upper.admits(version),
        }
    }

    /// Published versions that satisfy this interval, in registry order.
    ///
    /// `latest` is reduced to the single highest version.
    pub fn select_candidates(&self, available: &[String]) -> KilnResult<Vec<String>> {
        let mut matching: Vec<(Version, &String)> = Vec::new();
        for raw in available {
            match Version::parse(raw.trim()) {
                Ok(v) if self.satisfies(&v) => matching.push((v, raw)),
                Ok(_) => {}
                Err(e) => tracing::debug!("Skipping unparsable version {}: {}", raw, e),
            }
        }

        if let VersionInterval::Latest = self {
            matching = matching
                .into_iter()
                .max_by(|(a, _), (b, _)| precedence(a, b))
                .into_iter()
                .collect();
        }

        if matching.is_empty() {
            return Err(KilnError::NoMatchingVersion {
                interval: self.to_string(),
            });
        }

        Ok(matching.into_iter().map(|(_, raw)| raw.clone()).collect())
    }
}

impl fmt::Display for VersionInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionInterval::Exact(v) => write!(f, "{}", v),
            VersionInterval::Latest => write!(f, "latest"),
            VersionInterval::Bounded(b) => write!(f, "{}", b),
            VersionInterval::Range(l, u) => write!(f, "{} and {}", l, u),
        }
    }
}

/// Semver precedence: major, minor, patch, then pre-release. Build metadata
/// does not take part.
pub fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

fn parse_version(interval: &str, s: &str) -> KilnResult<Version> {
    Version::parse(s.trim()).map_err(|e| {
        KilnError::interval_syntax(interval, format!("`{}` is not a version: {}", s.trim(), e))
    })
}

//! Package versions and version constraints.
//!
//! Versions are compared piecewise: a version string is split on `.`, `-`
//! and `_`, and at every boundary between digits and letters.  Numeric
//! pieces compare numerically, word pieces lexically, and a word sorts
//! below any number, so `1.0.rc1 < 1.0 < 1.0.1`.  Missing trailing pieces
//! count as zero, so `1.0 == 1.0.0`.
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Num(u64),
    Word(String),
}

impl Piece {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Num(a), Self::Num(b)) => a.cmp(b),
            (Self::Word(a), Self::Word(b)) => a.cmp(b),
            (Self::Word(_), Self::Num(_)) => Ordering::Less,
            (Self::Num(_), Self::Word(_)) => Ordering::Greater,
        }
    }
}

/// A comparable package version.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    pieces: Vec<Piece>,
}

impl Version {
    /// Parse a version string.
    ///
    /// Returns `None` if the string contains no alphanumeric pieces.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let mut pieces = Vec::new();
        for segment in raw.split(['.', '-', '_']) {
            let mut current = String::new();
            for c in segment.chars() {
                if !c.is_ascii_alphanumeric() {
                    return None;
                }
                if current
                    .chars()
                    .last()
                    .is_some_and(|p| p.is_ascii_digit() != c.is_ascii_digit())
                {
                    pieces.push(Self::piece(&std::mem::take(&mut current)));
                }
                current.push(c);
            }
            if !current.is_empty() {
                pieces.push(Self::piece(&current));
            }
        }
        if pieces.is_empty() {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            pieces,
        })
    }

    fn piece(s: &str) -> Piece {
        s.parse::<u64>()
            .map_or_else(|_| Piece::Word(s.to_ascii_lowercase()), Piece::Num)
    }

    /// The string this version was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Upper bound for a pessimistic (`~>`) constraint: drop the last
    /// numeric piece (unless it is the only one) and bump the one before.
    fn pessimistic_bound(&self) -> Self {
        let mut nums: Vec<u64> = self
            .pieces
            .iter()
            .map_while(|p| match p {
                Piece::Num(n) => Some(*n),
                Piece::Word(_) => None,
            })
            .collect();
        if nums.len() > 1 {
            nums.pop();
        }
        if let Some(last) = nums.last_mut() {
            *last = last.saturating_add(1);
        }
        let raw = nums
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        Self {
            raw,
            pieces: nums.into_iter().map(Piece::Num).collect(),
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.pieces.len().max(other.pieces.len());
        let zero = Piece::Num(0);
        (0..len)
            .map(|i| {
                let a = self.pieces.get(i).unwrap_or(&zero);
                let b = other.pieces.get(i).unwrap_or(&zero);
                a.compare(b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ConfigError::MalformedVersionSpec {
            input: s.to_string(),
        })
    }
}

/// Comparison operator of a version constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `~>`: at least this version, below the next release at the
    /// second-to-last precision.
    Pessimistic,
}

impl VersionOp {
    const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Pessimistic => "~>",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "=" | "==" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Ge,
            "<=" => Self::Le,
            "~>" => Self::Pessimistic,
            _ => return None,
        })
    }
}

/// A version constraint such as `>= 1.2.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    /// Comparison operator.
    pub op: VersionOp,
    /// Version compared against.
    pub version: Version,
}

impl VersionSpec {
    /// Parse `"<op> <version>"`; a bare version means `=`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedVersionSpec`] for unknown operators
    /// or unparsable versions.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let malformed = || ConfigError::MalformedVersionSpec {
            input: input.to_string(),
        };
        let trimmed = input.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_alphanumeric())
            .ok_or_else(malformed)?;
        let (op, version) = trimmed.split_at(split);
        let op = match op.trim() {
            "" => VersionOp::Eq,
            other => VersionOp::parse(other).ok_or_else(malformed)?,
        };
        let version = Version::parse(version).ok_or_else(malformed)?;
        Ok(Self { op, version })
    }

    /// Whether `candidate` satisfies this constraint.
    #[must_use]
    pub fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            VersionOp::Eq => candidate == &self.version,
            VersionOp::Ne => candidate != &self.version,
            VersionOp::Gt => candidate > &self.version,
            VersionOp::Lt => candidate < &self.version,
            VersionOp::Ge => candidate >= &self.version,
            VersionOp::Le => candidate <= &self.version,
            VersionOp::Pessimistic => {
                candidate >= &self.version && candidate < &self.version.pessimistic_bound()
            }
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.symbol(), self.version)
    }
}

impl FromStr for VersionSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A package name with an optional version constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Package name.
    pub name: String,
    /// Constraint; `None` accepts any version.
    pub version: Option<VersionSpec>,
}

impl PackageSpec {
    /// Build a spec from a name and an optional constraint string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedVersionSpec`] if `version` is given
    /// but does not parse.
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Result<Self, ConfigError> {
        Ok(Self {
            name: name.into(),
            version: version.map(VersionSpec::parse).transpose()?,
        })
    }

    /// Parse `"name"` or `"name <constraint>"`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedVersionSpec`] if the constraint part
    /// does not parse.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let input = input.trim();
        match input.split_once(char::is_whitespace) {
            Some((name, constraint)) => Self::new(name, Some(constraint)),
            None => Self::new(input, None),
        }
    }

    /// Whether `candidate` satisfies the constraint; no constraint matches
    /// every version.
    #[must_use]
    pub fn matches(&self, candidate: &Version) -> bool {
        self.version.as_ref().is_none_or(|spec| spec.matches(candidate))
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(spec) => write!(f, "{} {}", self.name, spec),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn numeric_pieces_compare_numerically() {
        assert!(v("1.10.0") > v("1.9.3"));
        assert!(v("2.0.0") > v("1.99"));
    }

    #[test]
    fn missing_pieces_are_zero() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert!(v("1.0.1") > v("1.0"));
    }

    #[test]
    fn words_sort_below_numbers() {
        assert!(v("1.0.rc1") < v("1.0"));
        assert!(v("1.0.beta") < v("1.0.rc"));
        assert!(v("4.0.0.beta2") > v("4.0.0.beta1"));
    }

    #[test]
    fn letters_split_from_digits() {
        assert_eq!(v("1.0rc1"), v("1.0.rc.1"));
    }

    #[test]
    fn unparsable_versions_are_none() {
        assert!(Version::parse("").is_none());
        assert!(Version::parse("1.0 beta").is_none());
        assert!("".parse::<Version>().is_err());
    }

    #[test]
    fn spec_parsing_accepts_all_operators() {
        for (input, op) in [
            ("= 1.0", VersionOp::Eq),
            ("== 1.0", VersionOp::Eq),
            ("!= 1.0", VersionOp::Ne),
            ("> 1.0", VersionOp::Gt),
            ("< 1.0", VersionOp::Lt),
            (">= 1.0", VersionOp::Ge),
            ("<=1.0", VersionOp::Le),
            ("~> 1.0", VersionOp::Pessimistic),
            ("1.0", VersionOp::Eq),
        ] {
            assert_eq!(VersionSpec::parse(input).unwrap().op, op, "{input}");
        }
    }

    #[test]
    fn malformed_specs_are_config_errors() {
        for input in [">>> 1", "~>", ">= ", "=> 1.0"] {
            assert!(
                matches!(
                    VersionSpec::parse(input),
                    Err(ConfigError::MalformedVersionSpec { .. })
                ),
                "{input} should be malformed"
            );
        }
    }

    #[test]
    fn pessimistic_constraint_bounds() {
        let spec = VersionSpec::parse("~> 1.2.3").unwrap();
        assert!(spec.matches(&v("1.2.3")));
        assert!(spec.matches(&v("1.2.9")));
        assert!(!spec.matches(&v("1.3")));
        let spec = VersionSpec::parse("~> 1.2").unwrap();
        assert!(spec.matches(&v("1.9")));
        assert!(!spec.matches(&v("2.0")));
        assert!(!spec.matches(&v("1.1")));
    }

    #[test]
    fn package_spec_parse_and_display() {
        let spec = PackageSpec::parse("rails >= 3.2").unwrap();
        assert_eq!(spec.name, "rails");
        assert_eq!(spec.to_string(), "rails >= 3.2");
        let bare = PackageSpec::parse("rake").unwrap();
        assert!(bare.matches(&v("0.0.1")));
        assert_eq!(bare.to_string(), "rake");
    }
}

use regex::Regex;
use std::cmp::Ordering;

/// Normalized (major, minor, patch) triple.
/// Everything after the first `+` and every character outside `[0-9.]`
/// is ignored; missing or non-numeric segments read as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn parse(raw: &str) -> Version {
        let body = raw.split('+').next().unwrap_or("");
        let cleaned: String = body
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let mut parts = cleaned.split('.').map(|s| s.parse::<u64>().unwrap_or(0));
        Version {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
        }
    }

    fn next_minor(self) -> Version {
        Version {
            major: self.major,
            minor: self.minor + 1,
            patch: 0,
        }
    }
}

/// Compare two version strings after normalization
pub fn compare(a: &str, b: &str) -> Ordering {
    Version::parse(a).cmp(&Version::parse(b))
}

/// Whether `version` satisfies `range`.
///
/// Handles the range grammars found in the wild: bare versions,
/// `>=`/`>`/`<=`/`<` comparators, `~` next-minor ranges, `x`/`*`
/// wildcards, maven-style `[..]`/`(..)` intervals, and space-separated
/// conjunctions of any of these.
pub fn satisfies(version: &str, range: &str) -> bool {
    let range = range.trim();

    if range.is_empty() || range == "*" || range.eq_ignore_ascii_case("any") {
        return true;
    }

    // Space-separated parts are ANDed, unless this is a bracketed interval
    if range.contains(' ') && !range.starts_with('[') && !range.starts_with('(') {
        return range.split_whitespace().all(|part| satisfies(version, part));
    }

    if range.contains('x') || range.contains('*') {
        if leading_operator(range).is_none() {
            return wildcard_matches(version, range);
        }
        // Operator ranges treat a wildcard segment as 0
        let substituted = range.replace(['x', '*'], "0");
        return satisfies_plain(version, &substituted);
    }

    satisfies_plain(version, range)
}

fn leading_operator(range: &str) -> Option<&'static str> {
    for op in [">=", "<=", ">", "<", "~"] {
        if range.starts_with(op) {
            return Some(op);
        }
    }
    None
}

/// Compile a wildcard range like `1.19.x` into an anchored regex and
/// match it against the raw version string (tolerating a `+build` tail)
fn wildcard_matches(version: &str, range: &str) -> bool {
    let mut pattern = String::from("^");
    for c in range.chars() {
        match c {
            'x' | '*' => pattern.push_str(".*"),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push_str(r"(\+.*)?$");

    match Regex::new(&pattern) {
        Ok(re) => re.is_match(version),
        Err(_) => false,
    }
}

fn satisfies_plain(version: &str, range: &str) -> bool {
    if let Some(rest) = range.strip_prefix('~') {
        let base = Version::parse(rest);
        let v = Version::parse(version);
        return v >= base && v < base.next_minor();
    }
    if let Some(rest) = range.strip_prefix(">=") {
        return Version::parse(version) >= Version::parse(rest);
    }
    if let Some(rest) = range.strip_prefix("<=") {
        return Version::parse(version) <= Version::parse(rest);
    }
    if let Some(rest) = range.strip_prefix('>') {
        return Version::parse(version) > Version::parse(rest);
    }
    if let Some(rest) = range.strip_prefix('<') {
        return Version::parse(version) < Version::parse(rest);
    }
    if let Some(result) = interval_matches(version, range) {
        return result;
    }
    Version::parse(version) == Version::parse(range)
}

/// Maven-style interval: `[` / `]` inclusive, `(` / `)` exclusive,
/// empty bound unbounded. Returns None when `range` is not an interval.
fn interval_matches(version: &str, range: &str) -> Option<bool> {
    let low_inclusive = match range.chars().next()? {
        '[' => true,
        '(' => false,
        _ => return None,
    };
    let high_inclusive = match range.chars().last()? {
        ']' => true,
        ')' => false,
        _ => return None,
    };

    let inner = &range[1..range.len() - 1];
    let bounds: Vec<&str> = inner.split(',').collect();
    if bounds.len() != 2 {
        return None;
    }
    let (low, high) = (bounds[0].trim(), bounds[1].trim());

    let v = Version::parse(version);
    if !low.is_empty() {
        let lo = Version::parse(low);
        let ok = if low_inclusive { v >= lo } else { v > lo };
        if !ok {
            return Some(false);
        }
    }
    if !high.is_empty() {
        let hi = Version::parse(high);
        let ok = if high_inclusive { v <= hi } else { v < hi };
        if !ok {
            return Some(false);
        }
    }
    Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalization() {
        assert_eq!(Version::parse("1.20.1"), Version { major: 1, minor: 20, patch: 1 });
        assert_eq!(Version::parse("1.20.1+build.7"), Version { major: 1, minor: 20, patch: 1 });
        assert_eq!(Version::parse("v2.3"), Version { major: 2, minor: 3, patch: 0 });
        assert_eq!(Version::parse("1.2.3.4"), Version { major: 1, minor: 2, patch: 3 });
        assert_eq!(Version::parse("unknown"), Version { major: 0, minor: 0, patch: 0 });
    }

    #[test]
    fn test_compare_is_an_order() {
        let versions = ["0.9.9", "1.0", "1.0.0", "1.2.0", "1.10.0", "2.0"];
        for v in versions {
            assert_eq!(compare(v, v), Ordering::Equal);
        }
        assert_eq!(compare("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare("1.2.0", "1.10.0"), Ordering::Less);
        assert_eq!(compare("1.10.0", "1.2.0"), Ordering::Greater);
        // transitivity across the sorted list
        for pair in versions.windows(2) {
            assert_ne!(compare(pair[0], pair[1]), Ordering::Greater);
        }
    }

    #[test]
    fn test_satisfies_any() {
        for v in ["1.0.0", "0.0.1", "99.99.99"] {
            assert!(satisfies(v, "*"));
            assert!(satisfies(v, ""));
            assert!(satisfies(v, "any"));
        }
    }

    #[test]
    fn test_satisfies_tilde() {
        assert!(satisfies("1.2.3", "~1.2.3"));
        assert!(satisfies("1.2.99", "~1.2.3"));
        assert!(!satisfies("1.3.0", "~1.2.3"));
        assert!(!satisfies("1.2.2", "~1.2.3"));
    }

    #[test]
    fn test_satisfies_comparators() {
        assert!(satisfies("2.0.0", ">=2.0.0"));
        assert!(!satisfies("1.5.0", ">=2.0.0"));
        assert!(satisfies("2.0.1", ">2.0.0"));
        assert!(!satisfies("2.0.0", ">2.0.0"));
        assert!(satisfies("2.0.0", "<=2.0.0"));
        assert!(satisfies("1.9.9", "<2.0.0"));
        assert!(!satisfies("2.0.0", "<2.0.0"));
    }

    #[test]
    fn test_satisfies_interval() {
        assert!(satisfies("1.0", "[1.0,2.0)"));
        assert!(satisfies("1.9.9", "[1.0,2.0)"));
        assert!(!satisfies("0.9.9", "[1.0,2.0)"));
        assert!(!satisfies("2.0", "[1.0,2.0)"));
        assert!(satisfies("2.0", "[1.0,2.0]"));
        assert!(!satisfies("1.0", "(1.0,2.0]"));
        // unbounded sides
        assert!(satisfies("99.0", "[1.0,)"));
        assert!(satisfies("0.1", "(,2.0]"));
    }

    #[test]
    fn test_satisfies_wildcard() {
        assert!(satisfies("1.19.2", "1.19.x"));
        assert!(satisfies("1.19.2+build.1", "1.19.x"));
        assert!(!satisfies("1.18.2", "1.19.x"));
        assert!(satisfies("1.20.1", "1.*"));
    }

    #[test]
    fn test_satisfies_wildcard_with_operator() {
        // wildcard collapses to 0 under an operator
        assert!(satisfies("1.19.2", ">=1.19.x"));
        assert!(satisfies("1.19.0", ">=1.19.x"));
        assert!(!satisfies("1.18.9", ">=1.19.x"));
    }

    #[test]
    fn test_satisfies_conjunction() {
        assert!(satisfies("1.5.0", ">=1.0.0 <2.0.0"));
        assert!(!satisfies("2.1.0", ">=1.0.0 <2.0.0"));
        // interval with an interior space is not a conjunction
        assert!(satisfies("1.5.0", "[1.0, 2.0)"));
    }

    #[test]
    fn test_satisfies_exact() {
        assert!(satisfies("1.2.3", "1.2.3"));
        assert!(satisfies("1.2.3+forge", "1.2.3"));
        assert!(!satisfies("1.2.4", "1.2.3"));
    }
}

//! Path matching primitives.
//!
//! Subject and object paths may contain shell wildcards (`*`, `?`,
//! character classes). Matching is a prefix match with per-component
//! globbing: `/usr/*` covers `/usr/bin/sh`, but `*` never crosses a
//! `/` boundary. [`PathSet`] keeps a set of such patterns with their
//! components pre-compiled so that greatest-matching-path lookups stay
//! cheap inside the state-space fixed point.

use glob::Pattern;

/// Split a path into its `/`-separated components.
///
/// `/` is the single-empty-component path, so it prefix-matches every
/// absolute path. A trailing `/` produces a trailing empty component,
/// which only matches another trailing empty component.
pub fn components(path: &str) -> Vec<&str> {
    if path == "/" {
        vec![""]
    } else {
        path.split('/').collect()
    }
}

/// A path pattern pre-split into compiled per-component globs.
#[derive(Debug, Clone)]
pub struct GlobPath {
    raw: String,
    comps: Vec<Pattern>,
}

impl GlobPath {
    pub fn new(path: &str) -> Self {
        let comps = components(path)
            .into_iter()
            .map(|c| {
                // A malformed class like `[` is taken literally.
                Pattern::new(c).unwrap_or_else(|_| {
                    Pattern::new(&Pattern::escape(c)).expect("escaped pattern is valid")
                })
            })
            .collect();
        Self {
            raw: path.to_string(),
            comps,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether this pattern prefix-matches `path` component-wise.
    pub fn matches_prefix_of(&self, path: &str) -> bool {
        let comps = components(path);
        if self.comps.len() > comps.len() {
            return false;
        }
        self.comps
            .iter()
            .zip(comps.iter())
            .all(|(pattern, comp)| pattern.matches(comp))
    }
}

/// `pathmatch(pattern, path)`: does `path` fall under `pattern`?
pub fn pathmatch(pattern: &str, path: &str) -> bool {
    GlobPath::new(pattern).matches_prefix_of(path)
}

/// Greatest matching path.
///
/// # Arguments
///
/// * `patterns` - The candidate patterns.
/// * `path` - The concrete path to cover.
///
/// # Returns
///
/// Among the patterns matching `path`, the one of maximum length.
/// Equal lengths resolve to the lexicographically greatest pattern,
/// so lookups are deterministic.
pub fn gmp<'a, I>(patterns: I, path: &str) -> Option<&'a GlobPath>
where
    I: IntoIterator<Item = &'a GlobPath>,
{
    patterns
        .into_iter()
        .filter(|p| p.matches_prefix_of(path))
        .max_by_key(|p| (p.raw().len(), p.raw().to_string()))
}

/// An insertion-ordered set of path patterns with compiled components.
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    paths: Vec<GlobPath>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pattern; duplicates are ignored.
    pub fn insert(&mut self, path: &str) {
        if !self.contains(path) {
            self.paths.push(GlobPath::new(path));
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// The compiled pattern for an exact member, if present.
    pub fn get(&self, path: &str) -> Option<&GlobPath> {
        self.paths.iter().find(|p| p.raw() == path)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(|p| p.raw())
    }

    /// Greatest matching path for `path` within this set.
    pub fn gmp(&self, path: &str) -> Option<&str> {
        gmp(self.paths.iter(), path).map(|p| p.raw())
    }

    /// Greatest matching path, ignoring one member of the set.
    ///
    /// Used by the inheritance closure, where a subject must not be
    /// its own parent.
    pub fn gmp_excluding(&self, path: &str, excluded: &str) -> Option<&str> {
        gmp(self.paths.iter().filter(|p| p.raw() != excluded), path).map(|p| p.raw())
    }
}

impl<S: AsRef<str>> FromIterator<S> for PathSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = PathSet::new();
        for path in iter {
            set.insert(path.as_ref());
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_matches_everything() {
        assert!(pathmatch("/", "/"));
        assert!(pathmatch("/", "/etc"));
        assert!(pathmatch("/", "/usr/bin/sh"));
    }

    #[test]
    fn test_prefix_match_component_wise() {
        assert!(pathmatch("/usr", "/usr/bin/sh"));
        assert!(pathmatch("/usr/bin", "/usr/bin"));
        assert!(!pathmatch("/usr/bin", "/usr"));
        assert!(!pathmatch("/usr", "/usrlocal"));
    }

    #[test]
    fn test_glob_components() {
        assert!(pathmatch("/usr/*", "/usr/bin"));
        assert!(pathmatch("/usr/*", "/usr/bin/sh"));
        assert!(pathmatch("/dev/tty?", "/dev/tty1"));
        assert!(pathmatch("/dev/tty[0-9]", "/dev/tty3"));
        assert!(!pathmatch("/dev/tty[0-9]", "/dev/ttyS"));
        // `*` stays within one component.
        assert!(!pathmatch("/usr*bin", "/usr/bin"));
    }

    #[test]
    fn test_trailing_slash_is_literal_empty_component() {
        assert!(!pathmatch("/usr/", "/usr/bin"));
        assert!(pathmatch("/usr/", "/usr/"));
    }

    #[test]
    fn test_gmp_prefers_longest() {
        let set: PathSet = ["/", "/usr", "/usr/bin"].into_iter().collect();
        assert_eq!(set.gmp("/usr/bin/sh"), Some("/usr/bin"));
        assert_eq!(set.gmp("/usr/lib"), Some("/usr"));
        assert_eq!(set.gmp("/etc"), Some("/"));
    }

    #[test]
    fn test_gmp_tie_breaks_lexicographically() {
        let set: PathSet = ["/usr/b?n", "/usr/bi*"].into_iter().collect();
        assert_eq!(set.gmp("/usr/bin"), Some("/usr/bi*"));
    }

    #[test]
    fn test_gmp_excluding_self() {
        let set: PathSet = ["/", "/usr", "/usr/bin"].into_iter().collect();
        assert_eq!(set.gmp_excluding("/usr/bin", "/usr/bin"), Some("/usr"));
    }

    #[test]
    fn test_no_match() {
        let set: PathSet = ["/usr"].into_iter().collect();
        assert_eq!(set.gmp("/etc/passwd"), None);
    }

    #[test]
    fn test_malformed_class_taken_literally() {
        assert!(pathmatch("/weird/[", "/weird/["));
        assert!(!pathmatch("/weird/[", "/weird/x"));
    }
}

use std::path::{Component, Path};

use glob::{MatchOptions, Pattern, PatternError};

/// A set of glob patterns matched against paths component by component.
///
/// A relative pattern such as `*.txt` or `folder1/*.rs` matches when it
/// matches the trailing components of the path; a pattern starting with `/`
/// must match the whole path. A path matches the set if any pattern matches.
#[derive(Debug, Clone)]
pub struct PathPatterns {
    patterns: Vec<CompiledPattern>,
    options: MatchOptions,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    anchored: bool,
    components: Vec<Pattern>,
}

impl PathPatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let patterns = patterns
            .iter()
            .map(|pattern| CompiledPattern::new(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            options: MatchOptions::new(),
        })
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.options.case_sensitive = case_sensitive;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, path: &Path) -> bool {
        let components: Vec<String> = path
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        self.patterns
            .iter()
            .any(|pattern| pattern.matches(&components, self.options))
    }
}

impl CompiledPattern {
    fn new(pattern: &str) -> Result<Self, PatternError> {
        let anchored = pattern.starts_with('/');
        let components = pattern
            .split('/')
            .filter(|part| !part.is_empty())
            .map(Pattern::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            anchored,
            components,
        })
    }

    fn matches(&self, path: &[String], options: MatchOptions) -> bool {
        if self.components.is_empty() || self.components.len() > path.len() {
            return false;
        }
        if self.anchored && self.components.len() != path.len() {
            return false;
        }

        let tail = &path[path.len() - self.components.len()..];
        self.components
            .iter()
            .zip(tail)
            .all(|(pattern, part)| pattern.matches_with(part, options))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::PathPatterns;

    #[test]
    fn relative_patterns_match_from_the_right() {
        let patterns = PathPatterns::new(&["*.txt"]).unwrap();
        assert!(patterns.matches(Path::new("content/folder1/file1.txt")));
        assert!(!patterns.matches(Path::new("content/folder1/file1.rs")));

        let patterns = PathPatterns::new(&["folder1/*.txt"]).unwrap();
        assert!(patterns.matches(Path::new("content/folder1/file2.txt")));
        assert!(!patterns.matches(Path::new("content/file1.txt")));
    }

    #[test]
    fn anchored_patterns_match_whole_path() {
        let patterns = PathPatterns::new(&["/tmp/*.txt"]).unwrap();
        assert!(patterns.matches(Path::new("/tmp/a.txt")));
        assert!(!patterns.matches(Path::new("/var/tmp/a.txt")));
    }

    #[test]
    fn any_pattern_may_match() {
        let patterns = PathPatterns::new(&["*.rs", "*.toml"]).unwrap();
        assert!(patterns.matches(Path::new("Cargo.toml")));
        assert!(patterns.matches(Path::new("src/lib.rs")));
        assert!(!patterns.matches(Path::new("README.md")));
    }

    #[test]
    fn case_sensitivity_is_configurable() {
        let patterns = PathPatterns::new(&["*.TXT"]).unwrap();
        assert!(!patterns.matches(Path::new("a.txt")));
        assert!(patterns.case_sensitive(false).matches(Path::new("a.txt")));
    }
}

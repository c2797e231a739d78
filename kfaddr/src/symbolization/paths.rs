//! Path Normalizer
//!
//! `addr2line` reports the absolute paths the compiler saw. Those are made
//! relative to the first matching root, tried in order: the kernel source
//! root, the caller's alternate prefixes, then module source roots.

use std::path::{Component, Path, PathBuf};

/// Rewrites absolute source paths into project-relative form
#[derive(Debug, Clone, Default)]
pub struct PathNormalizer {
    kernel_root: Option<PathBuf>,
    path_prefixes: Vec<String>,
    module_roots: Vec<PathBuf>,
    basenames: bool,
    cwd: PathBuf,
}

impl PathNormalizer {
    /// A normalizer resolving relative prefixes against `cwd`
    #[must_use]
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_path_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.path_prefixes = prefixes;
        self
    }

    #[must_use]
    pub fn with_module_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.module_roots = roots;
        self
    }

    #[must_use]
    pub fn with_basenames(mut self, basenames: bool) -> Self {
        self.basenames = basenames;
        self
    }

    pub fn set_kernel_root(&mut self, root: impl Into<PathBuf>) {
        self.kernel_root = Some(root.into());
    }

    #[must_use]
    pub fn kernel_root(&self) -> Option<&Path> {
        self.kernel_root.as_deref()
    }

    /// Shorten `file` for display
    #[must_use]
    pub fn normalize(&self, file: &str) -> String {
        let shortened = self.relativize(file).unwrap_or_else(|| strip_annotations(file));
        if self.basenames {
            Path::new(&shortened)
                .file_name()
                .map_or(shortened.clone(), |name| name.to_string_lossy().into_owned())
        } else {
            shortened
        }
    }

    fn relativize(&self, file: &str) -> Option<String> {
        let file = lexical_normalize(Path::new(file));

        if let Some(rel) = self.kernel_root.as_deref().and_then(|root| strip_root(&file, &self.absolutize(root))) {
            return Some(rel);
        }

        for prefix in &self.path_prefixes {
            let root = self.absolutize(Path::new(prefix));
            if let Some(rel) = strip_root(&file, &root).or_else(|| strip_segment_run(&file, prefix)) {
                return Some(rel);
            }
        }

        self.module_roots.iter().find_map(|root| strip_root(&file, &self.absolutize(root)))
    }

    fn absolutize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            lexical_normalize(path)
        } else {
            lexical_normalize(&self.cwd.join(path))
        }
    }
}

fn strip_root(file: &Path, root: &Path) -> Option<String> {
    let rel = file.strip_prefix(lexical_normalize(root)).ok()?;
    let rel = rel.to_string_lossy();
    (!rel.is_empty()).then(|| rel.into_owned())
}

/// Match `prefix` as a run of whole path segments anywhere in `file`
fn strip_segment_run(file: &Path, prefix: &str) -> Option<String> {
    let wanted: Vec<&str> =
        prefix.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    if wanted.is_empty() {
        return None;
    }
    let segments: Vec<String> = file
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let start = segments
        .windows(wanted.len())
        .position(|window| window.iter().zip(&wanted).all(|(have, want)| have == want))?;
    let rest = &segments[start + wanted.len()..];
    (!rest.is_empty()).then(|| rest.join("/"))
}

/// Resolve `.` and `..` without touching the filesystem
#[must_use]
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Drop cosmetic annotations: `[kernel]` markers and trailing
/// parentheticals such as `(discriminator 3)` or `(inlined)`
#[must_use]
pub fn strip_annotations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open..].find(']') else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);

    let mut trimmed = out.trim_end();
    while trimmed.ends_with(')') {
        let Some(open) = trimmed.rfind('(') else {
            break;
        };
        trimmed = trimmed[..open].trim_end();
    }
    trimmed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> PathNormalizer {
        PathNormalizer::new("/home/dev/work")
    }

    #[test]
    fn test_kernel_root_wins() {
        let mut n = normalizer().with_path_prefixes(vec!["/src".to_string()]);
        n.set_kernel_root("/src/linux");
        assert_eq!(n.normalize("/src/linux/kernel/sched/core.c"), "kernel/sched/core.c");
    }

    #[test]
    fn test_root_match_respects_component_boundaries() {
        let mut n = normalizer();
        n.set_kernel_root("/src/linux");
        assert_eq!(n.normalize("/src/linux-2/mm/slub.c"), "/src/linux-2/mm/slub.c");
    }

    #[test]
    fn test_relative_prefix_resolved_against_cwd() {
        let n = normalizer().with_path_prefixes(vec!["../build/".to_string()]);
        assert_eq!(n.normalize("/home/dev/build/fs/open.c"), "fs/open.c");
    }

    #[test]
    fn test_prefix_matched_as_segment_run() {
        let n = normalizer().with_path_prefixes(vec!["linux-6.1/".to_string()]);
        assert_eq!(n.normalize("/tmp/ci/linux-6.1/net/core/dev.c"), "net/core/dev.c");

        let n = normalizer().with_path_prefixes(vec!["linux".to_string()]);
        assert_eq!(n.normalize("/tmp/ci/linux-6.1/net/core/dev.c"), "/tmp/ci/linux-6.1/net/core/dev.c");
    }

    #[test]
    fn test_module_roots_are_last() {
        let n = normalizer().with_module_roots(vec![PathBuf::from("/opt/drv")]);
        assert_eq!(n.normalize("/opt/drv/src/main.c"), "src/main.c");
    }

    #[test]
    fn test_unmatched_path_only_loses_annotations() {
        let n = normalizer();
        assert_eq!(n.normalize("/x/y.c (discriminator 9)"), "/x/y.c");
        assert_eq!(n.normalize("/x/y.c (inlined)"), "/x/y.c");
        assert_eq!(n.normalize("/x/y.c [kernel]"), "/x/y.c");
    }

    #[test]
    fn test_basenames() {
        let mut n = normalizer().with_basenames(true);
        assert_eq!(n.normalize("/x/y/z.c"), "z.c");
        n.set_kernel_root("/x");
        assert_eq!(n.normalize("/x/y/z.c"), "z.c");
    }

    #[test]
    fn test_lexical_normalize() {
        assert_eq!(lexical_normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(lexical_normalize(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(lexical_normalize(Path::new("../a")), PathBuf::from("../a"));
    }
}

//! Kernel-Source-Root Detector
//!
//! The compiler records absolute paths from the build machine. Resolving
//! `start_kernel`, which every kernel image has and which lives in
//! `init/main.c`, tells us where that source tree was.

use log::debug;
use std::path::Path;

/// Well-known symbol resolved to calibrate the source root
pub const ANCHOR_SYMBOL: &str = "start_kernel";

/// Top-level directories of a kernel source tree
const CANONICAL_DIRS: &[&str] = &[
    "/arch/", "/block/", "/crypto/", "/drivers/", "/fs/", "/include/", "/init/", "/ipc/",
    "/kernel/", "/lib/", "/mm/", "/net/", "/samples/", "/scripts/", "/security/", "/sound/",
    "/tools/", "/usr/", "/virt/",
];

const INIT_MAIN: &str = "/init/main.c";

/// Infer the source root from the records returned for the anchor symbol
///
/// Tried in order: the longest prefix in front of a canonical top-level
/// directory, the parent of `init/main.c`, and finally the directory of the
/// reported file.
#[must_use]
pub fn detect_source_root<S: AsRef<str>>(records: &[S]) -> Option<String> {
    let text = records.iter().map(|r| r.as_ref()).collect::<Vec<&str>>().join("\n");
    let Some(path) = source_paths(&text).next() else {
        debug!("No source path in anchor output: {text}");
        return None;
    };
    debug!("Found source path: {path}");

    if let Some(root) = canonical_prefix(path) {
        debug!("Detected kernel source root from common dirs: {root}");
        return Some(root.to_string());
    }

    if let Some(root) = source_paths(&text)
        .find_map(|p| p.strip_suffix(INIT_MAIN))
        .filter(|root| !root.is_empty())
    {
        debug!("Detected kernel source root from init/main.c: {root}");
        return Some(root.to_string());
    }

    let dir = Path::new(path).parent()?.to_string_lossy().into_owned();
    debug!("Using directory of source file as root: {dir}");
    (!dir.is_empty()).then_some(dir)
}

/// Longest prefix in front of the rightmost occurrence of any canonical dir
fn canonical_prefix(path: &str) -> Option<&str> {
    CANONICAL_DIRS
        .iter()
        .filter_map(|dir| path.rfind(dir))
        .filter(|&idx| idx > 0)
        .max()
        .map(|idx| path[..idx].trim_end_matches('/'))
        .filter(|root| !root.is_empty())
}

/// Every `path` of an `at path:line` occurrence in `text`
fn source_paths(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace().zip(text.split_whitespace().skip(1)).filter_map(|(word, next)| {
        if word != "at" {
            return None;
        }
        let (path, line) = next.split_once(':')?;
        let starts_with_digit = line.bytes().next().is_some_and(|b| b.is_ascii_digit());
        (!path.is_empty() && starts_with_digit).then_some(path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_canonical_prefix_wins() {
        let records = ["sched_tick at /home/u/foo/kernel/sched/core.c:10"];
        assert_eq!(detect_source_root(&records).as_deref(), Some("/home/u/foo"));
    }

    #[test]
    fn test_vendor_kernel_dir_does_not_shadow_root() {
        let records = ["start_kernel at /build/kernel/linux-6.6/init/main.c:904"];
        assert_eq!(detect_source_root(&records).as_deref(), Some("/build/kernel/linux-6.6"));
    }

    #[test]
    fn test_inlined_records_are_searched() {
        let records = [
            "arch_call_rest_init at /src/linux/init/main.c:700",
            " (inlined by) start_kernel at /src/linux/init/main.c:1062",
        ];
        assert_eq!(detect_source_root(&records).as_deref(), Some("/src/linux"));
    }

    #[test]
    fn test_falls_back_to_file_directory() {
        let records = ["start_kernel at /weird/place/main.c:5"];
        assert_eq!(detect_source_root(&records).as_deref(), Some("/weird/place"));
    }

    #[test]
    fn test_no_location_means_no_root() {
        assert_eq!(detect_source_root(&["?? ??:0"]), None);
        assert_eq!(detect_source_root::<&str>(&[]), None);
    }
}

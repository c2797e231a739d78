//! Pre-flight checks for kfaddr
//!
//! Validates the target before the symbol table is scanned and the resolver
//! is started. Provides clear, actionable error messages when requirements
//! aren't met.

use anyhow::{bail, Result};
use log::warn;
use object::{Object, ObjectSection};
use std::path::Path;

/// Run all pre-flight checks on the target object
pub fn run_preflight_checks(target: &Path) -> Result<()> {
    check_target_exists(target)?;
    Ok(())
}

/// Check if the target object exists and is a regular file
fn check_target_exists(target: &Path) -> Result<()> {
    if !target.exists() {
        bail!(
            "Target not found: {}\n\n\
             Pass the kernel image or module with -e, e.g. kfaddr -e vmlinux schedule+0x1a/0x80",
            target.display()
        );
    }
    if !target.is_file() {
        bail!(
            "Not a file: {}\n\n\
             The target must be an ELF object (vmlinux or a .ko), not a directory.",
            target.display()
        );
    }
    Ok(())
}

/// Warn when the object has no DWARF line tables; every answer would be `??`
pub fn check_debug_info(obj: &object::File<'_>, target: &Path) -> bool {
    let has_section = |name: &str| obj.section_by_name(name).is_some_and(|s| s.size() > 0);
    let has_debug_info = has_section(".debug_info") && has_section(".debug_line");

    if !has_debug_info {
        warn!(
            "{} has no DWARF line info, source locations unavailable (build with CONFIG_DEBUG_INFO)",
            target.display()
        );
    }
    has_debug_info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_not_found() {
        let result = run_preflight_checks(Path::new("/nonexistent/path/to/vmlinux"));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Target not found"));
    }

    #[test]
    fn test_target_is_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_preflight_checks(dir.path()).unwrap_err().to_string();
        assert!(err.contains("Not a file"));
    }
}

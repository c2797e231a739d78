//! Toolchain selection
//!
//! Mirrors the kernel build's conventions: `CROSS_COMPILE` prefixes binutils
//! tools, while a non-empty `LLVM` switches to the `llvm-` tools (`LLVM=dir/`
//! for a toolchain directory, `LLVM=-<ver>` for a versioned suffix).

use std::env;

const ADDR2LINE: &str = "addr2line";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toolchain {
    prefix: String,
    suffix: String,
}

impl Toolchain {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::var("CROSS_COMPILE").ok(), env::var("LLVM").ok())
    }

    #[must_use]
    pub fn from_vars(cross_compile: Option<String>, llvm: Option<String>) -> Self {
        match llvm.filter(|v| !v.is_empty()) {
            Some(llvm) if llvm.ends_with('/') => {
                Self { prefix: format!("{llvm}llvm-"), suffix: String::new() }
            }
            Some(llvm) if llvm.starts_with('-') => Self { prefix: "llvm-".to_string(), suffix: llvm },
            Some(_) => Self { prefix: "llvm-".to_string(), suffix: String::new() },
            None => {
                let mut prefix = cross_compile.unwrap_or_default();
                if !prefix.is_empty() && !prefix.ends_with('-') {
                    prefix.push('-');
                }
                Self { prefix, suffix: String::new() }
            }
        }
    }

    /// Name of the line-resolution tool to spawn
    #[must_use]
    pub fn addr2line(&self) -> String {
        format!("{}{ADDR2LINE}{}", self.prefix, self.suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(cross: Option<&str>, llvm: Option<&str>) -> String {
        Toolchain::from_vars(cross.map(str::to_string), llvm.map(str::to_string)).addr2line()
    }

    #[test]
    fn test_native() {
        assert_eq!(tool(None, None), "addr2line");
        assert_eq!(tool(Some(""), Some("")), "addr2line");
    }

    #[test]
    fn test_cross_compile_prefix() {
        assert_eq!(tool(Some("aarch64-linux-gnu-"), None), "aarch64-linux-gnu-addr2line");
        assert_eq!(tool(Some("riscv64-linux-gnu"), None), "riscv64-linux-gnu-addr2line");
    }

    #[test]
    fn test_llvm_variants() {
        assert_eq!(tool(Some("aarch64-linux-gnu-"), Some("1")), "llvm-addr2line");
        assert_eq!(tool(None, Some("/opt/llvm/bin/")), "/opt/llvm/bin/llvm-addr2line");
        assert_eq!(tool(None, Some("-17")), "llvm-addr2line-17");
    }
}

//! Structured error types for kfaddr
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! `SymbolizeError` aborts a run; `MatchError` and `SpecError` only ever cost
//! a single query its answer.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SymbolizeError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse ELF object {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: object::Error,
    },

    #[error("No symbol table found in {0} (was it stripped?)")]
    NoSymbolTable(PathBuf),

    #[error("{tool} not found. Please install binutils (or the toolchain named by CROSS_COMPILE/LLVM)")]
    ToolNotFound { tool: String },

    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("Symbol '{0}' not found in symbol table")]
    UnknownSymbol(String),

    #[error("No candidate for {name} has an extent matching offset 0x{offset:x}{}", length_suffix(.length))]
    NoMatchingExtent { name: String, offset: u64, length: Option<u64> },

    #[error("Offset 0x{offset:x} past {name} at 0x{address:x} overflows the address space")]
    AddressOverflow { name: String, address: u64, offset: u64 },
}

#[allow(clippy::ref_option)]
fn length_suffix(length: &Option<u64>) -> String {
    length.map(|l| format!(" / length 0x{l:x}")).unwrap_or_default()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("Invalid address format: {0} (expected func+0xOFFSET[/0xLENGTH])")]
    Malformed(String),

    #[error("Invalid hex number '{value}' in {spec}")]
    BadHex { spec: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_symbol_table_display() {
        let err = SymbolizeError::NoSymbolTable(PathBuf::from("/tmp/vmlinux"));
        assert_eq!(err.to_string(), "No symbol table found in /tmp/vmlinux (was it stripped?)");
    }

    #[test]
    fn test_tool_not_found_is_actionable() {
        let err = SymbolizeError::ToolNotFound { tool: "aarch64-linux-gnu-addr2line".to_string() };
        let msg = err.to_string();
        assert!(msg.contains("aarch64-linux-gnu-addr2line"));
        assert!(msg.contains("install binutils"));
    }

    #[test]
    fn test_no_matching_extent_display() {
        let err = MatchError::NoMatchingExtent {
            name: "schedule".to_string(),
            offset: 0x10,
            length: Some(0x80),
        };
        assert_eq!(
            err.to_string(),
            "No candidate for schedule has an extent matching offset 0x10 / length 0x80"
        );

        let err = MatchError::NoMatchingExtent { name: "schedule".to_string(), offset: 0x10, length: None };
        assert_eq!(err.to_string(), "No candidate for schedule has an extent matching offset 0x10");
    }

    #[test]
    fn test_address_overflow_display() {
        let err = MatchError::AddressOverflow {
            name: "foo".to_string(),
            address: 0xffff_ffff_8100_0000,
            offset: 0x8000_0000_0000_0000,
        };
        assert_eq!(
            err.to_string(),
            "Offset 0x8000000000000000 past foo at 0xffffffff81000000 overflows the address space"
        );
    }
}

//! # kfaddr - Fast kernel address to source line resolution
//!
//! kfaddr resolves `function+offset/length` triples, as printed by the
//! kernel's function-graph tracer and in oops backtraces, into `file:line`
//! locations. It is a drop-in replacement for the kernel's
//! `scripts/faddr2line` for batch use: the symbol table is indexed once and a
//! single `addr2line` process answers every query.
//!
//! ## Architecture Overview
//!
//! ```text
//!   vmlinux / module.ko
//!          │
//!          ▼
//!   ┌──────────────┐   start_kernel   ┌──────────────┐
//!   │ SymbolIndex  │─────────────────▶│ Source root  │
//!   │  (.symtab)   │                  │  detection   │
//!   └──────┬───────┘                  └──────┬───────┘
//!          │ name+off/len                    │ root
//!          ▼                                 ▼
//!   ┌──────────────┐  address  ┌──────────┐  records  ┌──────────────┐
//!   │SymbolMatcher │──────────▶│addr2line │──────────▶│PathNormalizer│──▶ stdout
//!   └──────────────┘           └──────────┘           └──────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`symbolization`]: index, matcher, `addr2line` protocol, path rewriting
//! - [`domain`]: address specs, queries and error types
//! - [`config`]: toolchain selection from `CROSS_COMPILE` / `LLVM`
//! - [`preflight`]: target checks with actionable messages
//! - [`cli`]: command-line argument definitions
//!
//! ## Typical Usage
//!
//! ```bash
//! kfaddr vmlinux schedule+0x1a/0x80 do_idle+0x1c8/0x2b0
//!
//! # Module, with its sources checked out elsewhere
//! kfaddr -e drivers/net/foo.ko --module-srcs ~/src/foo foo_xmit+0x44/0x120
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod preflight;
pub mod symbolization;

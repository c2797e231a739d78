//! # Address Symbolication
//!
//! This module converts symbolic kernel return addresses, as captured by the
//! function-graph tracer, into `file:line` source locations.
//!
//! ## The Symbolication Problem
//!
//! A trace records addresses as `function+offset/length`:
//!
//! ```text
//! schedule+0x1a/0x80
//! ```
//!
//! - **function**: the symbol the address falls in
//! - **offset**: distance from the start of that symbol
//! - **length**: the size of the function, as the kernel saw it
//!
//! The kernel's own `scripts/faddr2line` handles this by re-deriving symbol
//! boundaries with `readelf`/`nm` and starting `addr2line` once per query,
//! which is slow for the thousands of addresses in a trace. This module
//! indexes the symbol table once and keeps a single `addr2line` alive.
//!
//! ## Key Concepts
//!
//! ### Same-named statics
//!
//! Two translation units may each define `static int helper(void)`. Both
//! appear in `.symtab` under the same name. The length recorded in the trace
//! is what tells them apart, which is why extents are computed from the
//! addresses of neighbouring symbols.
//!
//! ### Aliases
//!
//! Several symbols may share one address (weak/alias symbols). They are
//! skipped when computing extents, otherwise a function would appear to be
//! zero bytes long.
//!
//! ### Compiler suffixes
//!
//! Optimizations rename functions: `task_tick_fair.isra.0`,
//! `foo.constprop.3`, `bar.llvm.1234`. If the exact name is unknown, any
//! symbol named `name.<suffix>` is a candidate.
//!
//! ## Resolution Flow
//!
//! ```text
//! 1. Index .symtab                    (SymbolIndex::load, once)
//! 2. Resolve start_kernel             (detect_source_root, once)
//!      start_kernel at /build/linux/init/main.c:904
//!      -> kernel root = /build/linux
//! 3. For each spec:
//!      schedule+0x1a/0x80 -> 0xffffffff81c01a1a   (SymbolMatcher)
//!      0xffffffff81c01a1a -> raw records          (LineClient)
//!      raw records -> kernel/sched/core.c:6720    (PathNormalizer)
//! ```
//!
//! ## Module Structure
//!
//! - **`index`**: per-section sorted symbol indexes and the by-name table
//! - **`matcher`**: exact, length-validated and fuzzy symbol lookup
//! - **`protocol`**: sentinel-framed conversation with `addr2line`
//! - **`source_root`**: kernel source root detection
//! - **`location`**: parsed `func at file:line` records
//! - **`paths`**: absolute to project-relative path rewriting
//! - **`engine`**: ties the pieces together and renders output blocks

pub mod engine;
pub mod index;
pub mod location;
pub mod matcher;
pub mod paths;
pub mod protocol;
pub mod source_root;

pub use engine::{Faddr2Line, UNRESOLVED_MARKER};
pub use index::{Section, SectionId, Symbol, SymbolIndex, SymbolRef};
pub use location::ResolvedLocation;
pub use matcher::{MatchResult, SymbolMatcher, FALLBACK_SLACK};
pub use paths::PathNormalizer;
pub use protocol::{Addr2LineProcess, LineClient, LineResolver};
pub use source_root::detect_source_root;

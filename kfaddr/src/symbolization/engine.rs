//! The symbolication engine
//!
//! Owns the index, the resolver and the path normalizer for one target
//! object. Per-query failures never escape: they render as `??:0`.

use log::{debug, info, warn};
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use super::index::SymbolIndex;
use super::location::ResolvedLocation;
use super::matcher::{SymbolMatcher, FALLBACK_SLACK};
use super::paths::PathNormalizer;
use super::protocol::{Addr2LineProcess, LineResolver};
use super::source_root::{detect_source_root, ANCHOR_SYMBOL};
use crate::config::Toolchain;
use crate::domain::{AddressSpec, SymbolizeError};

/// Printed in place of locations when a query cannot be resolved
pub const UNRESOLVED_MARKER: &str = "??:0";

/// Resolves `function+offset/length` specs of one ELF object to source lines
pub struct Faddr2Line<R> {
    index: SymbolIndex,
    resolver: R,
    paths: PathNormalizer,
    slack: u64,
}

impl Faddr2Line<Addr2LineProcess> {
    /// Index `target`, start `addr2line` on it and calibrate the source root
    ///
    /// # Errors
    /// Fails if the target has no symbol table or cannot be parsed, or if the
    /// line-resolution tool cannot be started
    pub fn open(
        target: &Path,
        toolchain: &Toolchain,
        paths: PathNormalizer,
    ) -> Result<Self, SymbolizeError> {
        let index = SymbolIndex::load(target)?;
        let resolver = Addr2LineProcess::spawn(&toolchain.addr2line(), target)?;
        let mut engine = Self::new(index, resolver, paths);
        engine.calibrate();
        Ok(engine)
    }
}

impl<R: LineResolver> Faddr2Line<R> {
    pub fn new(index: SymbolIndex, resolver: R, paths: PathNormalizer) -> Self {
        Self { index, resolver, paths, slack: FALLBACK_SLACK }
    }

    /// Override [`FALLBACK_SLACK`] for the offset fallback pass
    #[must_use]
    pub fn with_slack(mut self, slack: u64) -> Self {
        self.slack = slack;
        self
    }

    #[must_use]
    pub fn index(&self) -> &SymbolIndex {
        &self.index
    }

    #[must_use]
    pub fn paths(&self) -> &PathNormalizer {
        &self.paths
    }

    /// Detect the kernel source root unless the caller supplied one
    pub fn calibrate(&mut self) {
        if let Some(root) = self.paths.kernel_root() {
            debug!("Using supplied kernel source root: {}", root.display());
            return;
        }
        if let Some(root) = self.detect_kernel_root() {
            info!("Detected kernel source root: {root}");
            self.paths.set_kernel_root(root);
        }
    }

    /// Resolve the anchor symbol once and infer the source root from it
    pub fn detect_kernel_root(&mut self) -> Option<String> {
        let Some(anchor) = self.index.occurrences(ANCHOR_SYMBOL).first().copied() else {
            info!("{ANCHOR_SYMBOL} symbol not found, source paths stay absolute");
            return None;
        };

        let start = Instant::now();
        debug!("Detecting kernel source root using {ANCHOR_SYMBOL} at 0x{:x}", anchor.address);
        let records = match self.resolver.resolve(anchor.address) {
            Ok(records) => records,
            Err(e) => {
                warn!("Source root detection failed: {e}");
                return None;
            }
        };
        let root = detect_source_root(&records);
        debug!(
            "Source root detection took {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        root
    }

    /// Formatted location lines for `spec`; empty when unresolved
    pub fn resolve(&mut self, spec: &AddressSpec) -> Vec<String> {
        let matcher = SymbolMatcher::new(&self.index).with_slack(self.slack);
        let matched = match matcher.find(&spec.function, spec.query) {
            Ok(matched) => matched,
            Err(e) => {
                warn!("{spec}: {e}");
                return Vec::new();
            }
        };
        debug!(
            "Resolved {spec} -> 0x{:x} ({} in {})",
            matched.target_addr, matched.symbol, matched.section_name
        );

        let start = Instant::now();
        let records = match self.resolver.resolve(matched.target_addr) {
            Ok(records) => records,
            Err(e) => {
                warn!("{spec}: line resolution failed: {e}");
                return Vec::new();
            }
        };
        debug!(
            "Got {} lines for 0x{:x} in {:.2}ms",
            records.len(),
            matched.target_addr,
            start.elapsed().as_secs_f64() * 1000.0
        );
        if records.is_empty() {
            debug!("No output received for address 0x{:x}", matched.target_addr);
        }

        records.iter().map(|record| self.format_record(record)).collect()
    }

    fn format_record(&self, record: &str) -> String {
        ResolvedLocation::parse(record)
            .map_or_else(|| record.to_string(), |location| location.render(&self.paths))
    }

    /// The output block for one raw spec: a `spec:` header and its lines
    pub fn render_block(&mut self, raw: &str) -> String {
        let lines = match raw.parse::<AddressSpec>() {
            Ok(spec) => self.resolve(&spec),
            Err(e) => {
                warn!("{e}");
                Vec::new()
            }
        };

        let mut block = format!("{raw}:\n");
        if lines.is_empty() {
            block.push_str(UNRESOLVED_MARKER);
            block.push('\n');
        }
        for line in lines {
            block.push_str(&line);
            block.push('\n');
        }
        block
    }

    /// Resolve every spec in order, blocks separated by a blank line
    ///
    /// # Errors
    /// Returns an error only if writing to `out` fails
    pub fn run<S: AsRef<str>, W: Write>(&mut self, specs: &[S], out: &mut W) -> io::Result<()> {
        for (i, spec) in specs.iter().enumerate() {
            debug!("Processing address {}/{}: {}", i + 1, specs.len(), spec.as_ref());
            if i > 0 {
                writeln!(out)?;
            }
            out.write_all(self.render_block(spec.as_ref()).as_bytes())?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Answers from a fixed table, recording every address it was asked
    #[derive(Default)]
    struct Canned {
        answers: HashMap<u64, Vec<String>>,
        asked: Vec<u64>,
    }

    impl Canned {
        fn answer(mut self, address: u64, lines: &[&str]) -> Self {
            self.answers.insert(address, lines.iter().map(ToString::to_string).collect());
            self
        }
    }

    impl LineResolver for Canned {
        fn resolve(&mut self, address: u64) -> io::Result<Vec<String>> {
            self.asked.push(address);
            Ok(self.answers.get(&address).cloned().unwrap_or_default())
        }
    }

    fn kernel_index() -> SymbolIndex {
        let mut builder = SymbolIndex::builder();
        let text = builder.add_section(1, ".text", 0xffff_0000, 0xffff_1000);
        builder.add_symbol(text, "start_kernel", 0xffff_0000, 0x100);
        builder.add_symbol(text, "schedule", 0xffff_0100, 0x80);
        builder.add_symbol(text, "next_fn", 0xffff_0180, 0x80);
        builder.build()
    }

    #[test]
    fn test_calibrate_shortens_following_queries() {
        let resolver = Canned::default()
            .answer(0xffff_0000, &["start_kernel at /build/linux/init/main.c:900"])
            .answer(
                0xffff_0110,
                &[
                    "__schedule at /build/linux/kernel/sched/core.c:6500",
                    " (inlined by) schedule at /build/linux/kernel/sched/core.c:6600 (discriminator 1)",
                ],
            );
        let mut engine = Faddr2Line::new(kernel_index(), resolver, PathNormalizer::new("/"));
        engine.calibrate();
        assert_eq!(engine.paths().kernel_root(), Some(Path::new("/build/linux")));

        let block = engine.render_block("schedule+0x10/0x80");
        assert_eq!(
            block,
            "schedule+0x10/0x80:\n\
             __schedule at kernel/sched/core.c:6500\n \
             (inlined by) schedule at kernel/sched/core.c:6600\n"
        );
    }

    #[test]
    fn test_supplied_root_skips_detection() {
        let mut paths = PathNormalizer::new("/");
        paths.set_kernel_root("/src");
        let mut engine = Faddr2Line::new(kernel_index(), Canned::default(), paths);
        engine.calibrate();
        assert!(engine.resolver.asked.is_empty());
    }

    #[test]
    fn test_unresolved_queries_degrade() {
        let mut engine = Faddr2Line::new(kernel_index(), Canned::default(), PathNormalizer::new("/"));

        let mut out = Vec::new();
        engine.run(&["missing+0x1/0x2", "garbage", "schedule+0x4/0x80"], &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "missing+0x1/0x2:\n??:0\n\ngarbage:\n??:0\n\nschedule+0x4/0x80:\n??:0\n"
        );
        assert_eq!(engine.resolver.asked, [0xffff_0104]);
    }

    #[test]
    fn test_unparsed_records_pass_through() {
        let resolver = Canned::default().answer(0xffff_0104, &["?? ??:0"]);
        let mut engine = Faddr2Line::new(kernel_index(), resolver, PathNormalizer::new("/"));
        assert_eq!(engine.render_block("schedule+0x4"), "schedule+0x4:\n?? ??:0\n");
    }
}

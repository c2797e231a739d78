//! Symbol Matcher
//!
//! Turns `name+offset/length` into an absolute address. Several symbols may
//! share a name (statics from different translation units), so every
//! occurrence is checked against the function length the trace recorded.

use log::debug;
use std::time::Instant;

use super::index::{SymbolIndex, SymbolRef};
use crate::domain::{MatchError, Query};

/// How far past the computed end of a function an offset may still land
///
/// Traces occasionally report the address just past a trailing call. The
/// value is a heuristic carried over for compatibility, not a proven bound,
/// so it is tunable through [`SymbolMatcher::with_slack`].
pub const FALLBACK_SLACK: u64 = 16;

/// The address a query resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Table name of the matched symbol (may carry a compiler suffix)
    pub symbol: String,
    pub matched_symbol_addr: u64,
    /// Owning section, used to route lookups to the right backing object
    pub section_name: String,
    pub target_addr: u64,
}

struct Candidate<'a> {
    name: &'a str,
    symbol: SymbolRef,
    extent: u64,
}

/// Resolves queries against one [`SymbolIndex`]
pub struct SymbolMatcher<'a> {
    index: &'a SymbolIndex,
    slack: u64,
}

impl<'a> SymbolMatcher<'a> {
    #[must_use]
    pub fn new(index: &'a SymbolIndex) -> Self {
        Self { index, slack: FALLBACK_SLACK }
    }

    #[must_use]
    pub fn with_slack(mut self, slack: u64) -> Self {
        self.slack = slack;
        self
    }

    /// Find the occurrence of `name` that `query` points into
    ///
    /// # Errors
    /// [`MatchError::UnknownSymbol`] when neither the exact nor the fuzzy
    /// lookup finds the name, [`MatchError::NoMatchingExtent`] when no
    /// candidate's extent fits the query, [`MatchError::AddressOverflow`]
    /// when the offset runs past the end of the address space
    pub fn find(&self, name: &str, query: Query) -> Result<MatchResult, MatchError> {
        let start = Instant::now();
        let offset = query.offset();
        debug!("Searching for symbol: {name}+0x{offset:x} ({query:?})");

        let candidates = self.candidates(name);
        if candidates.is_empty() {
            debug!("Symbol '{name}' not found in symbol table");
            return Err(MatchError::UnknownSymbol(name.to_string()));
        }
        debug!("Found {} candidate symbols for '{name}'", candidates.len());

        let exact = match query {
            Query::Exact { length, .. } => candidates.iter().find(|c| c.extent == length),
            Query::Unvalidated { .. } => None,
        };
        let chosen = exact.or_else(|| {
            candidates.iter().find(|c| offset <= c.extent.saturating_add(self.slack))
        });

        let Some(chosen) = chosen else {
            debug!(
                "No matching symbol found for {name}+0x{offset:x} (search took {:.2}ms)",
                start.elapsed().as_secs_f64() * 1000.0
            );
            return Err(MatchError::NoMatchingExtent {
                name: name.to_string(),
                offset,
                length: query.length(),
            });
        };

        let Some(target_addr) = chosen.symbol.address.checked_add(offset) else {
            debug!("{name}+0x{offset:x} overflows past 0x{:x}", chosen.symbol.address);
            return Err(MatchError::AddressOverflow {
                name: chosen.name.to_string(),
                address: chosen.symbol.address,
                offset,
            });
        };
        debug!(
            "Match found! {} at 0x{:x}, target address 0x{target_addr:x} (search took {:.2}ms)",
            chosen.name,
            chosen.symbol.address,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(MatchResult {
            symbol: chosen.name.to_string(),
            matched_symbol_addr: chosen.symbol.address,
            section_name: self.index.section(chosen.symbol.section).name.clone(),
            target_addr,
        })
    }

    fn candidates(&self, name: &str) -> Vec<Candidate<'a>> {
        let mut named: Vec<(&'a str, &'a [SymbolRef])> = Vec::new();
        if let Some(exact) = self.index.get(name) {
            named.push(exact);
        } else {
            named.extend(self.index.entries().filter(|(key, _)| is_suffixed_variant(key, name)));
            // Map order is arbitrary; keep "first candidate" deterministic
            named.sort_by_key(|(key, _)| *key);
        }

        let mut candidates = Vec::new();
        for (key, refs) in named {
            for &symbol in refs {
                let section = self.index.section(symbol.section);
                let Some(extent) = section.extent_of(symbol.address) else {
                    debug!("Symbol {key} not found in section {}", section.name);
                    continue;
                };
                debug!("Candidate {key} at 0x{:x}, calculated length: 0x{extent:x}", symbol.address);
                candidates.push(Candidate { name: key, symbol, extent });
            }
        }
        candidates
    }
}

/// `task_tick_fair.llvm.123` and `task_tick_fair.isra.0` are variants of
/// `task_tick_fair`; `task_tick_fairness` is not
#[must_use]
pub fn is_suffixed_variant(candidate: &str, name: &str) -> bool {
    candidate
        .strip_prefix(name)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> SymbolIndex {
        let mut builder = SymbolIndex::builder();
        let text = builder.add_section(1, ".text", 0x1000, 0x2000);
        builder.add_symbol(text, "dup", 0x1000, 0);
        builder.add_symbol(text, "a", 0x1020, 0);
        builder.add_symbol(text, "dup", 0x1100, 0);
        builder.add_symbol(text, "b", 0x1130, 0);
        builder.add_symbol(text, "task_tick_fair.llvm.123", 0x1200, 0);
        builder.add_symbol(text, "task_tick_fairness", 0x1300, 0);
        builder.add_symbol(text, "tail", 0x1400, 0);
        builder.build()
    }

    #[test]
    fn test_exact_length_selects_second_candidate() {
        let index = index();
        let matcher = SymbolMatcher::new(&index);

        // dup@0x1000 spans 0x20, dup@0x1100 spans 0x30
        let m = matcher.find("dup", Query::Exact { offset: 4, length: 0x30 }).unwrap();
        assert_eq!(m.matched_symbol_addr, 0x1100);
        assert_eq!(m.target_addr, 0x1104);
        assert_eq!(m.section_name, ".text");

        let m = matcher.find("dup", Query::Exact { offset: 4, length: 0x20 }).unwrap();
        assert_eq!(m.matched_symbol_addr, 0x1000);
    }

    #[test]
    fn test_length_mismatch_falls_back_to_offset() {
        let index = index();
        let matcher = SymbolMatcher::new(&index);

        let m = matcher.find("dup", Query::Exact { offset: 0x28, length: 0x99 }).unwrap();
        assert_eq!(m.matched_symbol_addr, 0x1000, "0x28 is within 0x20 + slack");

        let m = matcher.find("dup", Query::Exact { offset: 0x3a, length: 0x99 }).unwrap();
        assert_eq!(m.matched_symbol_addr, 0x1100);
    }

    #[test]
    fn test_fallback_slack_boundary() {
        let index = index();
        let matcher = SymbolMatcher::new(&index);

        // tail runs to the end of .text: 0x2000 - 0x1400
        let extent = 0xc00;
        assert!(matcher.find("tail", Query::Unvalidated { offset: extent + 16 }).is_ok());
        assert_eq!(
            matcher.find("tail", Query::Unvalidated { offset: extent + 17 }),
            Err(MatchError::NoMatchingExtent {
                name: "tail".to_string(),
                offset: extent + 17,
                length: None
            })
        );
    }

    #[test]
    fn test_custom_slack() {
        let index = index();
        let matcher = SymbolMatcher::new(&index).with_slack(0);
        assert!(matcher.find("tail", Query::Unvalidated { offset: 0xc00 }).is_ok());
        assert!(matcher.find("tail", Query::Unvalidated { offset: 0xc01 }).is_err());
    }

    #[test]
    fn test_fuzzy_match_requires_separator() {
        let index = index();
        let matcher = SymbolMatcher::new(&index);

        let m = matcher.find("task_tick_fair", Query::Exact { offset: 8, length: 0x100 }).unwrap();
        assert_eq!(m.symbol, "task_tick_fair.llvm.123");
        assert_eq!(m.target_addr, 0x1208);

        assert!(is_suffixed_variant("task_tick_fair.llvm.123", "task_tick_fair"));
        assert!(is_suffixed_variant("task_tick_fair", "task_tick_fair"));
        assert!(!is_suffixed_variant("task_tick_fairness", "task_tick_fair"));
    }

    #[test]
    fn test_exact_name_hit_skips_fuzzy_pass() {
        let index = index();
        let matcher = SymbolMatcher::new(&index);
        let m = matcher.find("task_tick_fairness", Query::Unvalidated { offset: 0 }).unwrap();
        assert_eq!(m.symbol, "task_tick_fairness");
        assert_eq!(m.matched_symbol_addr, 0x1300);
    }

    #[test]
    fn test_oversized_offset_with_exact_length_is_rejected() {
        let mut builder = SymbolIndex::builder();
        let text = builder.add_section(1, ".text", 0xffff_ffff_8100_0000, 0xffff_ffff_8100_1000);
        builder.add_symbol(text, "foo", 0xffff_ffff_8100_0000, 0);
        let index = builder.build();
        let matcher = SymbolMatcher::new(&index);

        // The length matches the extent, so only the add can fail
        assert_eq!(
            matcher.find("foo", Query::Exact { offset: 0x8000_0000_0000_0000, length: 0x1000 }),
            Err(MatchError::AddressOverflow {
                name: "foo".to_string(),
                address: 0xffff_ffff_8100_0000,
                offset: 0x8000_0000_0000_0000,
            })
        );
        let m = matcher.find("foo", Query::Exact { offset: 0x10, length: 0x1000 }).unwrap();
        assert_eq!(m.target_addr, 0xffff_ffff_8100_0010);
    }

    #[test]
    fn test_unknown_symbol() {
        let index = index();
        let matcher = SymbolMatcher::new(&index);
        assert_eq!(
            matcher.find("nope", Query::Unvalidated { offset: 0 }),
            Err(MatchError::UnknownSymbol("nope".to_string()))
        );
    }
}

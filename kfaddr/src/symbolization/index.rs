//! Symbol Index Builder
//!
//! Scans `.symtab` once and keeps, per section, the function symbols sorted
//! by address together with a parallel address array for binary search.
//! Declared symbol sizes are recorded but never trusted: extents are derived
//! from neighbouring addresses instead (see [`Section::extent_of`]).

use log::{debug, info};
use object::{Object, ObjectSection, ObjectSymbol, ObjectSymbolTable, SymbolFlags};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::domain::SymbolizeError;

/// Index of a [`Section`] inside its [`SymbolIndex`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId(pub usize);

/// A function symbol as recorded in the symbol table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u64,
    /// `st_size` from the table; unreliable for aliases and hand-written asm
    pub declared_size: u64,
    pub section: SectionId,
}

/// A reference from the by-name table to one occurrence of a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRef {
    pub section: SectionId,
    pub address: u64,
}

/// An ELF section holding at least one function symbol
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub start_addr: u64,
    pub end_addr: u64,
    symbols: Vec<Symbol>,
    address_index: Vec<u64>,
}

impl Section {
    fn new(name: &str, start_addr: u64, end_addr: u64) -> Self {
        Self {
            name: name.to_string(),
            start_addr,
            end_addr,
            symbols: Vec::new(),
            address_index: Vec::new(),
        }
    }

    fn seal(&mut self) {
        self.symbols.sort_by_key(|s| s.address);
        self.address_index = self.symbols.iter().map(|s| s.address).collect();
    }

    /// Symbols sorted by address
    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Addresses of [`Section::symbols`], co-sorted
    #[must_use]
    pub fn address_index(&self) -> &[u64] {
        &self.address_index
    }

    /// Position of the first symbol at exactly `address`
    #[must_use]
    pub fn position_of(&self, address: u64) -> Option<usize> {
        let pos = self.address_index.partition_point(|&a| a < address);
        (self.address_index.get(pos) == Some(&address)).then_some(pos)
    }

    /// Actual byte length of the function at `address`
    ///
    /// Same-address aliases are skipped; the extent runs to the next distinct
    /// address, or to the end of the section for the last function.
    #[must_use]
    pub fn extent_of(&self, address: u64) -> Option<u64> {
        let pos = self.position_of(address)?;
        let next = self.address_index[pos..].iter().copied().find(|&a| a != address);
        Some(next.unwrap_or(self.end_addr).saturating_sub(address))
    }
}

/// Every function symbol of one ELF object, by section and by name
#[derive(Debug, Clone, Default)]
pub struct SymbolIndex {
    sections: Vec<Section>,
    by_name: HashMap<String, Vec<SymbolRef>>,
}

impl SymbolIndex {
    /// Read and index the ELF object at `path`
    ///
    /// # Errors
    /// Returns [`SymbolizeError::NoSymbolTable`] for stripped objects, and
    /// read/parse errors otherwise
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SymbolizeError> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|source| SymbolizeError::Read { path: path.to_path_buf(), source })?;
        let obj = object::File::parse(&*data)
            .map_err(|source| SymbolizeError::Parse { path: path.to_path_buf(), source })?;
        crate::preflight::check_debug_info(&obj, path);

        Self::from_object(&obj).ok_or_else(|| SymbolizeError::NoSymbolTable(path.to_path_buf()))
    }

    /// Index an already parsed object, `None` when it has no `.symtab`
    #[must_use]
    pub fn from_object(obj: &object::File<'_>) -> Option<Self> {
        let start = Instant::now();
        let symtab = obj.symbol_table()?;

        let mut builder = SymbolIndexBuilder::default();
        for symbol in symtab.symbols() {
            if !is_function(symbol.flags()) {
                continue;
            }
            // Undefined, absolute and common symbols carry no section index
            let Some(section_index) = symbol.section_index() else {
                continue;
            };
            if section_index.0 == 0 {
                continue;
            }
            let Ok(name) = symbol.name() else {
                debug!("Skipping function symbol with unreadable name at 0x{:x}", symbol.address());
                continue;
            };

            let section = match builder.slot(section_index.0) {
                Some(id) => id,
                None => match obj.section_by_index(section_index) {
                    Ok(section) => {
                        let sec_name = section.name().unwrap_or("<unnamed>");
                        let start_addr = section.address();
                        builder.add_section(
                            section_index.0,
                            sec_name,
                            start_addr,
                            start_addr.saturating_add(section.size()),
                        )
                    }
                    Err(e) => {
                        debug!("Error processing symbol {name}: {e}");
                        continue;
                    }
                },
            };

            builder.add_symbol(section, name, symbol.address(), symbol.size());
        }

        let index = builder.build();
        info!(
            "Loaded {} functions across {} sections in {:.2}ms",
            index.function_count(),
            index.sections.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Some(index)
    }

    #[must_use]
    pub fn builder() -> SymbolIndexBuilder {
        SymbolIndexBuilder::default()
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn section(&self, id: SectionId) -> &Section {
        &self.sections[id.0]
    }

    /// All occurrences of exactly `name`
    #[must_use]
    pub fn occurrences(&self, name: &str) -> &[SymbolRef] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// The table entry for exactly `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<(&str, &[SymbolRef])> {
        self.by_name.get_key_value(name).map(|(key, refs)| (key.as_str(), refs.as_slice()))
    }

    /// Every `(name, occurrences)` pair in the table
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[SymbolRef])> {
        self.by_name.iter().map(|(name, refs)| (name.as_str(), refs.as_slice()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    #[must_use]
    pub fn function_count(&self) -> usize {
        self.sections.iter().map(|s| s.symbols.len()).sum()
    }
}

/// Accumulates symbols during the table scan; sorting happens once in `build`
#[derive(Debug, Default)]
pub struct SymbolIndexBuilder {
    sections: Vec<Section>,
    slots: HashMap<usize, SectionId>,
}

impl SymbolIndexBuilder {
    fn slot(&self, key: usize) -> Option<SectionId> {
        self.slots.get(&key).copied()
    }

    /// Register the section identified by `key`, returning the existing slot
    /// when it was already added
    pub fn add_section(&mut self, key: usize, name: &str, start_addr: u64, end_addr: u64) -> SectionId {
        if let Some(id) = self.slot(key) {
            return id;
        }
        let id = SectionId(self.sections.len());
        debug!("Created section {name}: 0x{start_addr:x}-0x{end_addr:x}");
        self.sections.push(Section::new(name, start_addr, end_addr));
        self.slots.insert(key, id);
        id
    }

    pub fn add_symbol(&mut self, section: SectionId, name: &str, address: u64, declared_size: u64) {
        self.sections[section.0].symbols.push(Symbol {
            name: name.to_string(),
            address,
            declared_size,
            section,
        });
    }

    #[must_use]
    pub fn build(mut self) -> SymbolIndex {
        let mut by_name: HashMap<String, Vec<SymbolRef>> = HashMap::new();
        for section in &mut self.sections {
            section.seal();
            debug!("Section {} has {} symbols", section.name, section.symbols.len());
            for symbol in &section.symbols {
                by_name
                    .entry(symbol.name.clone())
                    .or_default()
                    .push(SymbolRef { section: symbol.section, address: symbol.address });
            }
        }
        SymbolIndex { sections: self.sections, by_name }
    }
}

fn is_function<S, T>(flags: SymbolFlags<S, T>) -> bool {
    matches!(flags, SymbolFlags::Elf { st_info, .. } if st_info & 0xf == object::elf::STT_FUNC)
}

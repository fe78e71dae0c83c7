use std::sync::Arc;

use tracing::trace;

use crate::codegen::CompiledUnit;
use crate::util::fast_map::{FastHashMap, fast_hash_map_with_capacity};

const INITIAL_UNITS: usize = 256;

/// Compiled units keyed by the address of their first instruction.
///
/// Entries are never invalidated: a unit compiled for an address stays valid
/// for as long as the same story image is loaded.
#[derive(Default)]
pub struct TranslationCache {
    units: FastHashMap<u32, Arc<CompiledUnit>>,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self {
            units: fast_hash_map_with_capacity(INITIAL_UNITS),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up the unit at `pc`, counting the hit or miss.
    pub fn lookup(&mut self, pc: u32) -> Option<Arc<CompiledUnit>> {
        match self.units.get(&pc) {
            Some(unit) => {
                self.hits += 1;
                trace!(target: "zvm::cache", pc, "hit");
                Some(Arc::clone(unit))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, unit: CompiledUnit) -> Arc<CompiledUnit> {
        let unit = Arc::new(unit);
        self.units.insert(unit.pc, Arc::clone(&unit));
        unit
    }

    #[inline]
    pub fn contains(&self, pc: u32) -> bool {
        self.units.contains_key(&pc)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Drop everything; only valid when a different story image is loaded.
    pub fn clear(&mut self) {
        self.units.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.units.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

//! Process-lifetime converter cache.
//!
//! Owned explicitly (no global state) and safe to share across threads.
//! Compilation runs outside the lock; concurrent misses on the same
//! descriptor may compile twice, and the first finished entry wins. Entries
//! are never mutated or evicted.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::compiler::{Compiler, Converter};
use crate::error::{SchemaError, SchemaErrorKind};
use crate::schema::{SchemaRegistry, Ty};

#[derive(Debug)]
pub struct ConverterCache {
    registry: Arc<SchemaRegistry>,
    table: RwLock<HashMap<Ty, Converter>>,
}

impl ConverterCache {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            table: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn get(&self, ty: &Ty) -> Option<Converter> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ty)
            .cloned()
    }

    /// The converter for `ty`, compiling it on first use.
    ///
    /// Every record and union reached while compiling is cached too, so
    /// later requests for them share the same converters. Failures are
    /// returned and nothing is cached.
    pub fn get_or_compile(&self, ty: &Ty) -> Result<Converter, SchemaError> {
        if let Some(converter) = self.get(ty) {
            tracing::trace!(ty = %self.registry.describe(ty), "converter cache hit");
            return Ok(converter);
        }

        let mut compiler = Compiler::with_cache(&self.registry, self);
        let converter = match compiler.compile(ty) {
            Ok(converter) => converter,
            Err(error) => {
                tracing::warn!(ty = %self.registry.describe(ty), %error, "compilation failed");
                return Err(error);
            }
        };

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        for (key, named) in compiler.into_named() {
            table.entry(key).or_insert(named);
        }
        let stored = table.entry(ty.clone()).or_insert(converter).clone();
        tracing::debug!(
            ty = %self.registry.describe(ty),
            entries = table.len(),
            "converter compiled"
        );
        Ok(stored)
    }

    /// [`get_or_compile`](Self::get_or_compile) for a declared record or
    /// union name.
    pub fn get_or_compile_named(&self, name: &str) -> Result<Converter, SchemaError> {
        let ty = self
            .registry
            .lookup(name)
            .ok_or_else(|| SchemaError::new(SchemaErrorKind::UnknownType(name.to_owned())))?;
        self.get_or_compile(&ty)
    }

    pub fn len(&self) -> usize {
        self.table.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

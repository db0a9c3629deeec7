//! Schema-directed converter compiler.
//!
//! `compile` walks a [`Ty`] once and produces a [`Converter`]: a plan with
//! every source name derived, every nested record and union resolved, and
//! every union validated. Applying the converter to a [`DynamicAccessor`] is
//! then a straight walk of that plan.
//!
//! Named types (records and unions) are memoized *before* their bodies are
//! compiled, so a record that refers to itself (directly or through other
//! records) resolves to the converter under construction instead of
//! recursing forever. A slot reached again while its body is still compiling
//! is flagged recursive; every cycle in the plan graph passes through at least
//! one flagged slot.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;

use crate::accessor::DynamicAccessor;
use crate::cache::ConverterCache;
use crate::dispatch::UnionPlan;
use crate::error::{ConversionError, ConversionErrorKind, SchemaError, SchemaErrorKind, Segment};
use crate::naming::Convention;
use crate::schema::{Field, RecordDecl, RecordId, SchemaRegistry, Ty, UnionId};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// A compiled, reusable transformation for one descriptor.
///
/// Cheap to clone (shared plan) and safe to share across threads.
#[derive(Clone)]
pub struct Converter(Arc<Plan>);

enum Plan {
    /// primitives, literals, string-keyed maps
    PassThrough,
    Optional(Converter),
    Sequence(Converter),
    Tuple(Vec<Converter>),
    Record(Arc<Named<RecordPlan>>),
    Union(Arc<Named<UnionPlan>>),
}

/// Slot for a named plan; filled once its body has compiled.
pub(crate) struct Named<P> {
    name: String,
    plan: OnceCell<P>,
    /// set when the body refers back to this slot; fixed once `plan` is set
    recursive: AtomicBool,
}

struct RecordPlan {
    fields: Vec<FieldPlan>,
}

struct FieldPlan {
    target: String,
    source: String,
    /// coalesce null / absent source values to the null token
    nullable: bool,
    converter: Converter,
}

// ————————————————————————————————————————————————————————————————————————————
// APPLICATION
// ————————————————————————————————————————————————————————————————————————————

impl Converter {
    fn new(plan: Plan) -> Self {
        Self(Arc::new(plan))
    }

    /// Build the target expression for the value behind `accessor`.
    pub fn apply<A: DynamicAccessor>(&self, accessor: &A) -> Result<A::Expr, ConversionError> {
        match &*self.0 {
            Plan::PassThrough => Ok(accessor.raw()),
            Plan::Optional(inner) => accessor.unless_null(|value| inner.apply(value)),
            Plan::Sequence(element) => accessor.map_sequence(|i, value| {
                element
                    .apply(value)
                    .map_err(|e| e.within(Segment::Index(i)))
            }),
            Plan::Tuple(elements) => {
                let mut out = Vec::with_capacity(elements.len());
                for (i, element) in elements.iter().enumerate() {
                    let value = accessor
                        .index(i)
                        .and_then(|value| element.apply(&value))
                        .map_err(|e| e.within(Segment::Index(i)))?;
                    out.push(value);
                }
                Ok(accessor.tuple(out))
            }
            Plan::Record(named) => {
                let plan = named.resolved()?;
                accessor.named(&named.name, named.is_recursive(), |value| plan.apply(value))
            }
            Plan::Union(named) => {
                let plan = named.resolved()?;
                accessor.named(&named.name, named.is_recursive(), |value| plan.apply(value))
            }
        }
    }

    /// Whether both handles share one compiled plan.
    pub fn ptr_eq(&self, other: &Converter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<P> Named<P> {
    fn new(name: String) -> Self {
        Self {
            name,
            plan: OnceCell::new(),
            recursive: AtomicBool::new(false),
        }
    }

    fn is_recursive(&self) -> bool {
        self.recursive.load(Ordering::Relaxed)
    }

    /// Flag the slot when it is met again before its plan is set.
    fn note_reentry(&self) {
        if self.plan.get().is_none() {
            self.recursive.store(true, Ordering::Relaxed);
        }
    }

    fn resolved(&self) -> Result<&P, ConversionError> {
        self.plan
            .get()
            .ok_or_else(|| ConversionError::new(ConversionErrorKind::Unresolved(self.name.clone())))
    }
}

impl RecordPlan {
    fn apply<A: DynamicAccessor>(&self, accessor: &A) -> Result<A::Expr, ConversionError> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = field
                .apply(accessor)
                .map_err(|e| e.within(Segment::Field(field.source.clone())))?;
            fields.push((field.target.clone(), value));
        }
        Ok(accessor.record(fields))
    }
}

impl FieldPlan {
    fn apply<A: DynamicAccessor>(&self, parent: &A) -> Result<A::Expr, ConversionError> {
        if self.nullable {
            // absent or unreadable optional data degrades to null
            match parent.field(&self.source) {
                Ok(value) => value.unless_null(|value| self.converter.apply(value)),
                Err(_) => Ok(parent.null()),
            }
        } else {
            let value = parent.field(&self.source)?;
            self.converter.apply(&value)
        }
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // named plans print by name only; they may be cyclic
        match &*self.0 {
            Plan::PassThrough => f.write_str("PassThrough"),
            Plan::Optional(inner) => f.debug_tuple("Optional").field(inner).finish(),
            Plan::Sequence(element) => f.debug_tuple("Sequence").field(element).finish(),
            Plan::Tuple(elements) => f.debug_tuple("Tuple").field(elements).finish(),
            Plan::Record(named) => write!(f, "Record({})", named.name),
            Plan::Union(named) => write!(f, "Union({})", named.name),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// COMPILATION
// ————————————————————————————————————————————————————————————————————————————

/// Compile `ty` against `registry` with a fresh memo table.
///
/// Pure: depends only on the descriptor and the declarations it reaches.
pub fn compile(registry: &SchemaRegistry, ty: &Ty) -> Result<Converter, SchemaError> {
    Compiler::new(registry).compile(ty)
}

/// One compilation session. Converters for named types reached through the
/// same compiler are shared.
pub struct Compiler<'r> {
    registry: &'r SchemaRegistry,
    cache: Option<&'r ConverterCache>,
    named: HashMap<Ty, Converter>,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            cache: None,
            named: HashMap::new(),
        }
    }

    /// Reuse named converters already in `cache`.
    pub(crate) fn with_cache(registry: &'r SchemaRegistry, cache: &'r ConverterCache) -> Self {
        Self {
            cache: Some(cache),
            ..Self::new(registry)
        }
    }

    /// On error nothing from this call is kept; earlier successful calls on
    /// the same compiler remain memoized.
    pub fn compile(&mut self, ty: &Ty) -> Result<Converter, SchemaError> {
        let snapshot = self.named.clone();
        let result = self.compile_ty(ty);
        if result.is_err() {
            self.named = snapshot;
        }
        result
    }

    /// Converters for every named type compiled (or reused) so far.
    pub(crate) fn into_named(self) -> HashMap<Ty, Converter> {
        self.named
    }

    pub(crate) fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    fn compile_ty(&mut self, ty: &Ty) -> Result<Converter, SchemaError> {
        match ty {
            Ty::Literal(values) if values.is_empty() => {
                Err(SchemaError::new(SchemaErrorKind::EmptyLiteral))
            }
            Ty::Primitive(_) | Ty::Literal(_) | Ty::StringKeyedMap(_) => {
                Ok(Converter::new(Plan::PassThrough))
            }
            Ty::Optional(inner) => {
                if inner.is_optional() {
                    return Err(SchemaError::new(SchemaErrorKind::NestedOptional));
                }
                Ok(Converter::new(Plan::Optional(self.compile_ty(inner)?)))
            }
            Ty::Sequence(element) => Ok(Converter::new(Plan::Sequence(self.compile_ty(element)?))),
            Ty::FixedTuple(elements) => {
                let mut out = Vec::with_capacity(elements.len());
                for (i, element) in elements.iter().enumerate() {
                    out.push(self.compile_ty(element).map_err(|e| e.within(Segment::Index(i)))?);
                }
                Ok(Converter::new(Plan::Tuple(out)))
            }
            Ty::Record(id) => self.compile_record(*id),
            Ty::DiscriminatedUnion(id) => self.compile_union(*id),
        }
    }

    fn memoized(&mut self, key: &Ty) -> Option<Converter> {
        if let Some(converter) = self.named.get(key) {
            match &*converter.0 {
                Plan::Record(named) => named.note_reentry(),
                Plan::Union(named) => named.note_reentry(),
                _ => {}
            }
            return Some(converter.clone());
        }
        let converter = self.cache?.get(key)?;
        self.named.insert(key.clone(), converter.clone());
        Some(converter)
    }

    pub(crate) fn compile_record(&mut self, id: RecordId) -> Result<Converter, SchemaError> {
        let key = Ty::Record(id);
        if let Some(converter) = self.memoized(&key) {
            return Ok(converter);
        }
        let registry = self.registry;
        let decl = registry.record_decl(id)?;
        tracing::trace!(record = %decl.name, "compiling record");

        let slot = Arc::new(Named::new(decl.name.clone()));
        let converter = Converter::new(Plan::Record(Arc::clone(&slot)));
        self.named.insert(key, converter.clone());

        let plan = self
            .record_plan(decl)
            .map_err(|e| e.within(Segment::Type(decl.name.clone())))?;
        // the slot is fresh, so this is its only initialization
        let _ = slot.plan.set(plan);
        Ok(converter)
    }

    fn record_plan(&mut self, decl: &RecordDecl) -> Result<RecordPlan, SchemaError> {
        let convention = self.registry.convention();
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(decl.fields.len());
        for field in &decl.fields {
            let plan = self
                .field_plan(field, &mut seen, convention)
                .map_err(|e| e.within(Segment::Field(field.name.clone())))?;
            fields.push(plan);
        }
        Ok(RecordPlan { fields })
    }

    fn field_plan<'f>(
        &mut self,
        field: &'f Field,
        seen: &mut HashSet<&'f str>,
        convention: Convention,
    ) -> Result<FieldPlan, SchemaError> {
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::new(SchemaErrorKind::DuplicateField(field.name.clone())));
        }
        if field.discriminator && !matches!(field.ty, Ty::Literal(_)) {
            return Err(SchemaError::new(SchemaErrorKind::FlaggedFieldNotLiteral(
                field.name.clone(),
            )));
        }
        // an optional field coalesces once, at the field read
        let converter = match &field.ty {
            Ty::Optional(inner) if inner.is_optional() => {
                return Err(SchemaError::new(SchemaErrorKind::NestedOptional));
            }
            Ty::Optional(inner) => self.compile_ty(inner)?,
            ty => self.compile_ty(ty)?,
        };
        Ok(FieldPlan {
            target: field.name.clone(),
            source: field.source_name(convention),
            nullable: field.is_nullable(),
            converter,
        })
    }

    fn compile_union(&mut self, id: UnionId) -> Result<Converter, SchemaError> {
        let key = Ty::DiscriminatedUnion(id);
        if let Some(converter) = self.memoized(&key) {
            return Ok(converter);
        }
        let registry = self.registry;
        let decl = registry.union_decl(id)?;
        tracing::trace!(union = %decl.name, "compiling union");

        let slot = Arc::new(Named::new(decl.name.clone()));
        let converter = Converter::new(Plan::Union(Arc::clone(&slot)));
        self.named.insert(key, converter.clone());

        let plan = UnionPlan::build(self, decl)
            .map_err(|e| e.within(Segment::Type(decl.name.clone())))?;
        let _ = slot.plan.set(plan);
        Ok(converter)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

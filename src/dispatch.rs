//! Discriminated union dispatch.
//!
//! A union converter reads the discriminator once and selects, in declaration
//! order, the first variant whose tag equals it. Every arm converts the *whole*
//! union value with that variant's record converter. A tag that matches no arm
//! (or a discriminator that cannot be read) yields the null token, never an
//! error.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;

use crate::accessor::DynamicAccessor;
use crate::compiler::{Compiler, Converter};
use crate::error::{ConversionError, SchemaError, SchemaErrorKind, Segment};
use crate::schema::{Literal, RecordId, Ty, UnionDecl};

pub(crate) struct UnionPlan {
    /// source-side name of the discriminator field
    source: String,
    tags: Vec<Literal>,
    /// `arms[i]` handles `tags[i]`
    arms: Vec<Converter>,
}

impl UnionPlan {
    /// Validate `decl` and compile one arm per declared tag.
    pub(crate) fn build(compiler: &mut Compiler<'_>, decl: &UnionDecl) -> Result<Self, SchemaError> {
        let source = validate(compiler, decl)?;
        let mut tags = Vec::with_capacity(decl.variants.len());
        let mut arms = Vec::with_capacity(decl.variants.len());
        for (tag, record) in &decl.variants {
            let arm = compiler
                .compile_record(*record)
                .map_err(|e| e.within(Segment::Tag(tag.clone())))?;
            tags.push(tag.clone());
            arms.push(arm);
        }
        Ok(Self { source, tags, arms })
    }

    pub(crate) fn apply<A: DynamicAccessor>(&self, accessor: &A) -> Result<A::Expr, ConversionError> {
        let Ok(discriminator) = accessor.field(&self.source) else {
            return Ok(accessor.null());
        };
        discriminator.switch(&self.tags, |i| match self.arms.get(i) {
            Some(arm) => arm.apply(accessor),
            None => Ok(accessor.null()),
        })
    }
}

/// Checks every union invariant and returns the discriminator's source name.
fn validate(compiler: &Compiler<'_>, decl: &UnionDecl) -> Result<String, SchemaError> {
    let registry = compiler.registry();
    if decl.variants.is_empty() {
        return Err(SchemaError::new(SchemaErrorKind::EmptyUnion));
    }

    let mut seen = HashSet::new();
    let mut by_record: IndexMap<RecordId, BTreeSet<&Literal>> = IndexMap::new();
    for (tag, record) in &decl.variants {
        if !seen.insert(tag.match_key()) {
            return Err(SchemaError::new(SchemaErrorKind::DuplicateTag(tag.clone()))
                .within(Segment::Tag(tag.clone())));
        }
        by_record.entry(*record).or_default().insert(tag);
    }

    let mut source: Option<String> = None;
    for (record, declared) in by_record {
        let variant = registry.record_decl(record)?;
        let in_variant = |kind| {
            let first = declared.iter().next().map(|tag| (*tag).clone());
            let err = SchemaError::new(kind);
            match first {
                Some(tag) => err.within(Segment::Tag(tag)),
                None => err,
            }
        };

        let Some(field) = variant.field(&decl.discriminator) else {
            return Err(in_variant(SchemaErrorKind::MissingDiscriminator {
                field: decl.discriminator.clone(),
                variant: variant.name.clone(),
            }));
        };
        let Ty::Literal(allowed) = &field.ty else {
            return Err(in_variant(SchemaErrorKind::DiscriminatorNotLiteral {
                field: decl.discriminator.clone(),
                variant: variant.name.clone(),
            }));
        };
        let allowed: BTreeSet<&Literal> = allowed.iter().collect();
        if allowed != declared {
            return Err(in_variant(SchemaErrorKind::TagMismatch {
                variant: variant.name.clone(),
                declared: join(&declared),
                allowed: join(&allowed),
            }));
        }

        let field_source = field.source_name(registry.convention());
        match &source {
            None => source = Some(field_source),
            Some(existing) if *existing != field_source => {
                return Err(in_variant(SchemaErrorKind::DiscriminatorSourceMismatch(
                    existing.clone(),
                    field_source,
                )));
            }
            Some(_) => {}
        }
    }

    // non-empty variants guarantee at least one record was visited
    Ok(source.unwrap_or_default())
}

fn join(tags: &BTreeSet<&Literal>) -> String {
    tags.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

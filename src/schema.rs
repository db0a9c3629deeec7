//! Type descriptors.
//!
//! A [`Ty`] describes the shape a converted value must have. Records and
//! unions are not stored inline: they are declared in a [`SchemaRegistry`] and
//! referenced by identity ([`RecordId`], [`UnionId`]), which is what lets a
//! record mention itself and what the converter cache keys on.

use std::fmt;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde_json::Value;

use crate::error::{SchemaError, SchemaErrorKind, Segment};
use crate::naming::Convention;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Int,
    Float,
    Str,
}

/// A primitive value usable as a literal constraint or union tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnionId(u32);

/// Closed, recursive description of a target shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Primitive(Primitive),
    /// Passes through; membership is checked elsewhere.
    Literal(Vec<Literal>),
    Optional(Box<Ty>),
    Sequence(Box<Ty>),
    FixedTuple(Vec<Ty>),
    /// String keys, primitive values only.
    StringKeyedMap(Primitive),
    Record(RecordId),
    DiscriminatedUnion(UnionId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Name on the reconstructed value.
    pub name: String,
    /// Source-side name override; derived from `name` when absent.
    pub source: Option<String>,
    pub ty: Ty,
    /// Not-required fields are null-coalesced.
    pub required: bool,
    /// Marks the field as a union discriminator; it must then be a literal.
    pub discriminator: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDecl {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionDecl {
    pub name: String,
    /// Target name of the discriminator field shared by every variant.
    pub discriminator: String,
    /// Tag → variant record, in declaration order.
    pub variants: Vec<(Literal, RecordId)>,
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

impl Ty {
    pub fn bool() -> Self {
        Ty::Primitive(Primitive::Bool)
    }
    pub fn int() -> Self {
        Ty::Primitive(Primitive::Int)
    }
    pub fn float() -> Self {
        Ty::Primitive(Primitive::Float)
    }
    pub fn string() -> Self {
        Ty::Primitive(Primitive::Str)
    }
    pub fn optional(inner: Ty) -> Self {
        Ty::Optional(Box::new(inner))
    }
    pub fn sequence(element: Ty) -> Self {
        Ty::Sequence(Box::new(element))
    }
    pub fn tuple(elements: impl IntoIterator<Item = Ty>) -> Self {
        Ty::FixedTuple(elements.into_iter().collect())
    }
    pub fn map(values: Primitive) -> Self {
        Ty::StringKeyedMap(values)
    }
    pub fn literal<L: Into<Literal>>(values: impl IntoIterator<Item = L>) -> Self {
        Ty::Literal(values.into_iter().map(Into::into).collect())
    }
    pub fn is_optional(&self) -> bool {
        matches!(self, Ty::Optional(_))
    }
}

impl Primitive {
    /// Parse a primitive type name as written in schema documents.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Primitive::Bool),
            "int" => Some(Primitive::Int),
            "float" => Some(Primitive::Float),
            "string" => Some(Primitive::Str),
            _ => None,
        }
    }
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Str => "string",
        }
    }
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            source: None,
            ty,
            required: true,
            discriminator: false,
        }
    }
    /// A not-required field: an absent or null source value becomes the null token.
    pub fn optional(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            required: false,
            ..Self::new(name, ty)
        }
    }
    /// A literal discriminator field.
    pub fn tag<L: Into<Literal>>(name: impl Into<String>, values: impl IntoIterator<Item = L>) -> Self {
        Self {
            discriminator: true,
            ..Self::new(name, Ty::literal(values))
        }
    }
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
    pub fn source_name(&self, convention: Convention) -> String {
        match &self.source {
            Some(source) => source.clone(),
            None => convention.source_name(&self.name),
        }
    }
    /// Whether the compiled converter coalesces null for this field.
    pub fn is_nullable(&self) -> bool {
        !self.required || self.ty.is_optional()
    }
}

impl RecordDecl {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LITERALS
// ————————————————————————————————————————————————————————————————————————————

impl Literal {
    /// Parse a JSON scalar; `None` for null, arrays and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Literal::Int(i)),
                None => n.as_f64().map(|f| Literal::Float(OrderedFloat(f))),
            },
            Value::String(s) => Some(Literal::Str(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::from(*i),
            Literal::Float(f) => Value::from(f.0),
            Literal::Str(s) => Value::String(s.clone()),
        }
    }

    /// Strict equality for strings and booleans; numeric equality for numbers
    /// (`1` matches `1.0`).
    /// The literal as told apart by [`Literal::matches`]: integral floats
    /// collapse onto the equal integer.
    pub(crate) fn match_key(&self) -> Literal {
        match self {
            Literal::Float(f) if f.0.fract() == 0.0 && f.0.abs() < i64::MAX as f64 => {
                Literal::Int(f.0 as i64)
            }
            other => other.clone(),
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Bool(a), Value::Bool(b)) => a == b,
            (Literal::Str(a), Value::String(b)) => a == b,
            (Literal::Int(a), Value::Number(n)) => match n.as_i64() {
                Some(b) => *a == b,
                None => n.as_f64() == Some(*a as f64),
            },
            (Literal::Float(a), Value::Number(n)) => n.as_f64() == Some(a.0),
            _ => false,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // JSON text, which is also a valid JavaScript literal
        write!(f, "{}", self.to_json())
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_owned())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Str(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(OrderedFloat(value))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
struct Entry<T> {
    name: String,
    decl: Option<T>,
}

/// Owns every record and union declaration. Built once, then shared
/// read-only (typically behind an `Arc`).
///
/// Records may be declared first and defined later, so that fields can refer
/// to records (including the record itself) that are not yet defined.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    convention: Convention,
    records: Vec<Entry<RecordDecl>>,
    unions: Vec<Entry<UnionDecl>>,
    names: IndexMap<String, Ty>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_convention(convention: Convention) -> Self {
        Self {
            convention,
            ..Self::default()
        }
    }
    pub fn convention(&self) -> Convention {
        self.convention
    }

    fn claim_name(&mut self, name: &str, ty: Ty) -> Result<(), SchemaError> {
        if Primitive::from_name(name).is_some() {
            return Err(SchemaError::new(SchemaErrorKind::ReservedTypeName(name.to_owned())));
        }
        if self.names.contains_key(name) {
            return Err(SchemaError::new(SchemaErrorKind::DuplicateTypeName(name.to_owned())));
        }
        self.names.insert(name.to_owned(), ty);
        Ok(())
    }

    pub fn declare_record(&mut self, name: impl Into<String>) -> Result<RecordId, SchemaError> {
        let name = name.into();
        let id = RecordId(self.records.len() as u32);
        self.claim_name(&name, Ty::Record(id))?;
        self.records.push(Entry { name, decl: None });
        Ok(id)
    }

    /// Supply (or replace) the fields of a declared record.
    pub fn define_record(&mut self, id: RecordId, fields: Vec<Field>) {
        if let Some(entry) = self.records.get_mut(id.0 as usize) {
            entry.decl = Some(RecordDecl {
                name: entry.name.clone(),
                fields,
            });
        }
    }

    pub fn add_record(
        &mut self,
        name: impl Into<String>,
        fields: Vec<Field>,
    ) -> Result<RecordId, SchemaError> {
        let id = self.declare_record(name)?;
        self.define_record(id, fields);
        Ok(id)
    }

    pub fn declare_union(&mut self, name: impl Into<String>) -> Result<UnionId, SchemaError> {
        let name = name.into();
        let id = UnionId(self.unions.len() as u32);
        self.claim_name(&name, Ty::DiscriminatedUnion(id))?;
        self.unions.push(Entry { name, decl: None });
        Ok(id)
    }

    pub fn define_union(
        &mut self,
        id: UnionId,
        discriminator: impl Into<String>,
        variants: Vec<(Literal, RecordId)>,
    ) {
        if let Some(entry) = self.unions.get_mut(id.0 as usize) {
            entry.decl = Some(UnionDecl {
                name: entry.name.clone(),
                discriminator: discriminator.into(),
                variants,
            });
        }
    }

    /// Declare a union with explicit tag → variant pairs.
    pub fn add_union(
        &mut self,
        name: impl Into<String>,
        discriminator: impl Into<String>,
        variants: Vec<(Literal, RecordId)>,
    ) -> Result<UnionId, SchemaError> {
        let id = self.declare_union(name)?;
        self.define_union(id, discriminator, variants);
        Ok(id)
    }

    /// Declare a union whose tags are read off each variant's discriminator
    /// literal set. The variant records must already be defined.
    pub fn add_union_of(
        &mut self,
        name: impl Into<String>,
        discriminator: impl Into<String>,
        records: &[RecordId],
    ) -> Result<UnionId, SchemaError> {
        let name = name.into();
        let discriminator = discriminator.into();
        let variants = self.derive_tags(&name, &discriminator, records)?;
        let id = self.declare_union(name)?;
        self.define_union(id, discriminator, variants);
        Ok(id)
    }

    /// Tags for a union over `records`, in record order then literal order.
    pub fn derive_tags(
        &self,
        union_name: &str,
        discriminator: &str,
        records: &[RecordId],
    ) -> Result<Vec<(Literal, RecordId)>, SchemaError> {
        let mut variants = Vec::new();
        for &id in records {
            let record = self.record_decl(id)?;
            let in_union = |kind| {
                SchemaError::new(kind).within(Segment::Type(union_name.to_owned()))
            };
            let field = record.field(discriminator).ok_or_else(|| {
                in_union(SchemaErrorKind::MissingDiscriminator {
                    field: discriminator.to_owned(),
                    variant: record.name.clone(),
                })
            })?;
            let Ty::Literal(values) = &field.ty else {
                return Err(in_union(SchemaErrorKind::DiscriminatorNotLiteral {
                    field: discriminator.to_owned(),
                    variant: record.name.clone(),
                }));
            };
            variants.extend(values.iter().cloned().map(|tag| (tag, id)));
        }
        Ok(variants)
    }

    pub fn record(&self, id: RecordId) -> Option<&RecordDecl> {
        self.records.get(id.0 as usize)?.decl.as_ref()
    }

    pub fn union(&self, id: UnionId) -> Option<&UnionDecl> {
        self.unions.get(id.0 as usize)?.decl.as_ref()
    }

    /// Like [`record`](Self::record) but reports undeclared/undefined ids.
    pub(crate) fn record_decl(&self, id: RecordId) -> Result<&RecordDecl, SchemaError> {
        match self.records.get(id.0 as usize) {
            Some(Entry { decl: Some(decl), .. }) => Ok(decl),
            Some(Entry { name, decl: None }) => {
                Err(SchemaError::new(SchemaErrorKind::Undefined(name.clone())))
            }
            None => Err(SchemaError::new(SchemaErrorKind::UnknownType(format!("{id:?}")))),
        }
    }

    pub(crate) fn union_decl(&self, id: UnionId) -> Result<&UnionDecl, SchemaError> {
        match self.unions.get(id.0 as usize) {
            Some(Entry { decl: Some(decl), .. }) => Ok(decl),
            Some(Entry { name, decl: None }) => {
                Err(SchemaError::new(SchemaErrorKind::Undefined(name.clone())))
            }
            None => Err(SchemaError::new(SchemaErrorKind::UnknownType(format!("{id:?}")))),
        }
    }

    pub fn record_name(&self, id: RecordId) -> Option<&str> {
        self.records.get(id.0 as usize).map(|e| e.name.as_str())
    }

    pub fn union_name(&self, id: UnionId) -> Option<&str> {
        self.unions.get(id.0 as usize).map(|e| e.name.as_str())
    }

    /// Resolve a declared record or union name.
    pub fn lookup(&self, name: &str) -> Option<Ty> {
        self.names.get(name).cloned()
    }

    /// Every declared name with its descriptor, in declaration order.
    pub fn named_types(&self) -> impl Iterator<Item = (&str, &Ty)> + '_ {
        self.names.iter().map(|(name, ty)| (name.as_str(), ty))
    }

    /// Human-readable rendering of a descriptor, with records and unions by name.
    pub fn describe(&self, ty: &Ty) -> String {
        match ty {
            Ty::Primitive(primitive) => primitive.name().to_owned(),
            Ty::Literal(values) => {
                let values = values.iter().map(Literal::to_string).collect::<Vec<_>>();
                format!("literal[{}]", values.join(", "))
            }
            Ty::Optional(inner) => format!("optional<{}>", self.describe(inner)),
            Ty::Sequence(element) => format!("sequence<{}>", self.describe(element)),
            Ty::FixedTuple(elements) => {
                let elements = elements.iter().map(|t| self.describe(t)).collect::<Vec<_>>();
                format!("({})", elements.join(", "))
            }
            Ty::StringKeyedMap(value) => format!("map<string, {}>", value.name()),
            Ty::Record(id) => self.record_name(*id).unwrap_or("<unknown record>").to_owned(),
            Ty::DiscriminatedUnion(id) => {
                self.union_name(*id).unwrap_or("<unknown union>").to_owned()
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

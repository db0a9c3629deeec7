//! Compile-time (`SchemaError`) and apply-time (`ConversionError`) failures.
//!
//! Both carry a [`Path`] naming where they happened.

use std::fmt;

use crate::schema::Literal;

// ————————————————————————————————————————————————————————————————————————————
// PATHS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A declared record or union, by name.
    Type(String),
    Field(String),
    Index(usize),
    /// A union variant, by tag.
    Tag(Literal),
}

/// Rendered JSON-path style: `$(Shape)[tag="circle"].radius`, `$.touches[2]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<Segment>);

impl Path {
    pub fn root() -> Self {
        Self::default()
    }
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
    /// New path with `segment` appended.
    pub fn join(&self, segment: Segment) -> Self {
        let mut out = self.clone();
        out.0.push(segment);
        out
    }
    fn prepend(&mut self, segment: Segment) {
        self.0.insert(0, segment);
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.0 {
            match segment {
                Segment::Type(name) => write!(f, "({name})")?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(i) => write!(f, "[{i}]")?,
                Segment::Tag(tag) => write!(f, "[tag={tag}]")?,
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA ERRORS
// ————————————————————————————————————————————————————————————————————————————

/// A malformed descriptor. Fatal to the compilation that found it; nothing from
/// that compilation is cached.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("schema error at {path}: {kind}")]
pub struct SchemaError {
    pub path: Path,
    pub kind: SchemaErrorKind,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaErrorKind {
    #[error("duplicate field `{0}`")]
    DuplicateField(String),
    #[error("optional of optional is not allowed")]
    NestedOptional,
    #[error("discriminator field `{field}` is missing from variant `{variant}`")]
    MissingDiscriminator { field: String, variant: String },
    #[error("discriminator field `{field}` of variant `{variant}` must be a literal")]
    DiscriminatorNotLiteral { field: String, variant: String },
    #[error("field `{0}` is flagged as a discriminator but is not a literal")]
    FlaggedFieldNotLiteral(String),
    #[error("variant `{variant}` is registered under tags [{declared}] but its discriminator allows [{allowed}]")]
    TagMismatch {
        variant: String,
        declared: String,
        allowed: String,
    },
    #[error("tag {0} is declared more than once")]
    DuplicateTag(Literal),
    #[error("variants disagree on the discriminator's source name (`{0}` vs `{1}`)")]
    DiscriminatorSourceMismatch(String, String),
    #[error("union declares no variants")]
    EmptyUnion,
    #[error("literal set is empty")]
    EmptyLiteral,
    #[error("literal values must be booleans, numbers or strings, found `{0}`")]
    NonPrimitiveLiteral(String),
    #[error("map values must be primitive, found `{0}`")]
    NonPrimitiveMapValue(String),
    #[error("union variant `{0}` is not a record")]
    VariantNotRecord(String),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("type `{0}` is declared more than once")]
    DuplicateTypeName(String),
    #[error("`{0}` is a primitive type name and cannot be redeclared")]
    ReservedTypeName(String),
    #[error("type `{0}` was declared but never defined")]
    Undefined(String),
}

impl SchemaError {
    pub fn new(kind: SchemaErrorKind) -> Self {
        Self { path: Path::root(), kind }
    }
    pub fn at(path: Path, kind: SchemaErrorKind) -> Self {
        Self { path, kind }
    }
    pub(crate) fn within(mut self, segment: Segment) -> Self {
        self.path.prepend(segment);
        self
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONVERSION ERRORS
// ————————————————————————————————————————————————————————————————————————————

/// Structurally required data was absent or unreadable while applying a
/// converter. Optional fields and unmatched union tags never produce one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("conversion error at {path}: {kind}")]
pub struct ConversionError {
    pub path: Path,
    pub kind: ConversionErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionErrorKind {
    #[error("required field `{0}` is missing")]
    MissingField(String),
    #[error("index {index} is out of range for a sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("variable `{0}` is not bound")]
    UnboundVariable(String),
    #[error("converter for `{0}` was applied before its definition completed")]
    Unresolved(String),
}

impl ConversionError {
    pub fn new(kind: ConversionErrorKind) -> Self {
        Self { path: Path::root(), kind }
    }
    pub fn at(path: Path, kind: ConversionErrorKind) -> Self {
        Self { path, kind }
    }
    pub(crate) fn within(mut self, segment: Segment) -> Self {
        self.path.prepend(segment);
        self
    }
}

//! Schema-directed payload conversion.
//!
//! Declare target shapes in a [`SchemaRegistry`] (by hand or from a JSON
//! [`document`]), compile them once into [`Converter`]s through a shared
//! [`ConverterCache`], and apply converters either eagerly to JSON values
//! ([`eager`]) or symbolically to produce an expression evaluated elsewhere
//! ([`deferred`]).

pub mod accessor;
pub mod cache;
pub mod compiler;
pub mod deferred;
mod dispatch;
pub mod document;
pub mod eager;
pub mod error;
pub mod naming;
pub mod schema;

pub use accessor::DynamicAccessor;
pub use cache::ConverterCache;
pub use compiler::{Compiler, Converter, compile};
pub use document::{DocumentError, SchemaDocument, load_registry};
pub use error::{ConversionError, ConversionErrorKind, Path, SchemaError, SchemaErrorKind, Segment};
pub use naming::{Convention, to_medial_caps};
pub use schema::{Field, Literal, Primitive, RecordId, SchemaRegistry, Ty, UnionId};

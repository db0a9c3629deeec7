//! The capability a converter is applied to.
//!
//! A [`DynamicAccessor`] stands for some opaque source value. It can read
//! fields and indices from it, iterate it, compare it against literals and
//! test it against the source null sentinel, and it builds the target-side
//! expression (`Expr`) the converter assembles. Nothing here assumes the value
//! is locally readable: an eager implementation computes values on the spot
//! ([`crate::eager`]), a deferred one emits an expression to be evaluated
//! elsewhere later ([`crate::deferred`]).

use crate::error::ConversionError;
use crate::schema::Literal;

pub trait DynamicAccessor: Sized {
    /// Target expression type.
    type Expr;

    // ---- source reads ----

    /// Read a field by its source name. Fails when the field is absent or the
    /// value cannot have fields; deferred accessors never fail here.
    fn field(&self, name: &str) -> Result<Self, ConversionError>;

    /// Read the element at `index`.
    fn index(&self, index: usize) -> Result<Self, ConversionError>;

    /// Apply `each` to every member of the sequence, in order, and collect the
    /// results into a sequence expression of the same length.
    fn map_sequence<F>(&self, each: F) -> Result<Self::Expr, ConversionError>
    where
        F: FnMut(usize, &Self) -> Result<Self::Expr, ConversionError>;

    /// Read the raw value once; if it equals the source null sentinel yield
    /// the null token, otherwise yield `present` applied to it.
    fn unless_null<F>(&self, present: F) -> Result<Self::Expr, ConversionError>
    where
        F: FnOnce(&Self) -> Result<Self::Expr, ConversionError>;

    /// Read the raw value once and compare it against `tags` in order. The
    /// first equal tag `i` selects `arm(i)`; no match yields the null token.
    fn switch<F>(&self, tags: &[Literal], arm: F) -> Result<Self::Expr, ConversionError>
    where
        F: FnMut(usize) -> Result<Self::Expr, ConversionError>;

    /// Apply the plan of the named record or union `name` to this value.
    /// `recursive` is set when the plan can reach itself; deferred accessors
    /// tie such plans into a function instead of unrolling them.
    fn named<F>(&self, name: &str, recursive: bool, body: F) -> Result<Self::Expr, ConversionError>
    where
        F: FnOnce(&Self) -> Result<Self::Expr, ConversionError>;

    // ---- target construction ----

    /// The value itself, unchanged.
    fn raw(&self) -> Self::Expr;

    /// The target null token.
    fn null(&self) -> Self::Expr;

    /// A record with fields in the given order.
    fn record(&self, fields: Vec<(String, Self::Expr)>) -> Self::Expr;

    /// A fixed-arity sequence.
    fn tuple(&self, elements: Vec<Self::Expr>) -> Self::Expr;
}

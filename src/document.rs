//! Declarative schema documents.
//!
//! A JSON document names records and unions and is loaded into a
//! [`SchemaRegistry`]. Names may be used before they are declared (and by
//! the type that declares them), so loading runs in passes: claim every
//! name, define records, then define unions.
//!
//! ```json
//! {
//!   "convention": "medial_caps",
//!   "records": {
//!     "Point": { "fields": [ {"name": "x", "type": "float"}, {"name": "y", "type": "float"} ] }
//!   },
//!   "unions": { "Shape": { "discriminator": "kind", "variants": ["Circle", "Square"] } }
//! }
//! ```

use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Path, SchemaError, SchemaErrorKind, Segment};
use crate::naming::Convention;
use crate::schema::{Field, Literal, Primitive, SchemaRegistry, Ty};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    #[serde(default)]
    pub convention: Convention,
    #[serde(default)]
    pub records: IndexMap<String, RecordDoc>,
    #[serde(default)]
    pub unions: IndexMap<String, UnionDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordDoc {
    pub fields: Vec<FieldDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDoc,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub discriminator: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnionDoc {
    pub discriminator: String,
    /// Record names; tags come from each record's discriminator literals.
    pub variants: Vec<String>,
}

/// `"int"`, `"Point"`, `{"sequence": "Point"}`, ...
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeDoc {
    Named(String),
    Compound(CompoundDoc),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum CompoundDoc {
    Optional(Box<TypeDoc>),
    Sequence(Box<TypeDoc>),
    Tuple(Vec<TypeDoc>),
    Map(String),
    Literal(Vec<Value>),
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("at JSON path {path} → {message}")]
    Parse { path: String, message: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

// ————————————————————————————————————————————————————————————————————————————
// PARSING
// ————————————————————————————————————————————————————————————————————————————

/// Deserialize with the JSON path of the failing node in the error.
fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, DocumentError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| DocumentError::Parse {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

/// Parse a schema document and load it into a fresh registry.
pub fn load_registry(src: &str) -> Result<SchemaRegistry, DocumentError> {
    let document = SchemaDocument::parse(src)?;
    Ok(document.into_registry()?)
}

impl SchemaDocument {
    pub fn parse(src: &str) -> Result<Self, DocumentError> {
        from_str_with_path(src)
    }

    pub fn into_registry(self) -> Result<SchemaRegistry, SchemaError> {
        let mut registry = SchemaRegistry::with_convention(self.convention);

        let mut record_ids = Vec::with_capacity(self.records.len());
        for name in self.records.keys() {
            record_ids.push(registry.declare_record(name.as_str()).map_err(in_type(name))?);
        }
        let mut union_ids = Vec::with_capacity(self.unions.len());
        for name in self.unions.keys() {
            union_ids.push(registry.declare_union(name.as_str()).map_err(in_type(name))?);
        }

        for ((name, record), id) in self.records.iter().zip(record_ids) {
            let fields = record
                .fields
                .iter()
                .map(|field| {
                    field
                        .resolve(&registry)
                        .map_err(|e| e.within(Segment::Field(field.name.clone())))
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(in_type(name))?;
            registry.define_record(id, fields);
        }

        for ((name, union), id) in self.unions.iter().zip(union_ids) {
            let records = union
                .variants
                .iter()
                .map(|variant| match registry.lookup(variant) {
                    Some(Ty::Record(id)) => Ok(id),
                    Some(_) => Err(SchemaError::new(SchemaErrorKind::VariantNotRecord(
                        variant.clone(),
                    ))),
                    None => Err(SchemaError::new(SchemaErrorKind::UnknownType(variant.clone()))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(in_type(name))?;
            let variants = registry.derive_tags(name, &union.discriminator, &records)?;
            registry.define_union(id, union.discriminator.as_str(), variants);
        }

        tracing::debug!(
            records = self.records.len(),
            unions = self.unions.len(),
            "schema document loaded"
        );
        Ok(registry)
    }
}

fn in_type(name: &str) -> impl FnOnce(SchemaError) -> SchemaError + use<> {
    let name = name.to_owned();
    move |e| e.within(Segment::Type(name))
}

impl FieldDoc {
    fn resolve(&self, registry: &SchemaRegistry) -> Result<Field, SchemaError> {
        Ok(Field {
            name: self.name.clone(),
            source: self.source.clone(),
            ty: self.ty.resolve(registry)?,
            required: self.required,
            discriminator: self.discriminator,
        })
    }
}

impl TypeDoc {
    pub fn resolve(&self, registry: &SchemaRegistry) -> Result<Ty, SchemaError> {
        match self {
            TypeDoc::Named(name) => Primitive::from_name(name)
                .map(Ty::Primitive)
                .or_else(|| registry.lookup(name))
                .ok_or_else(|| SchemaError::new(SchemaErrorKind::UnknownType(name.clone()))),
            TypeDoc::Compound(CompoundDoc::Optional(inner)) => Ok(Ty::optional(inner.resolve(registry)?)),
            TypeDoc::Compound(CompoundDoc::Sequence(element)) => {
                Ok(Ty::sequence(element.resolve(registry)?))
            }
            TypeDoc::Compound(CompoundDoc::Tuple(elements)) => elements
                .iter()
                .enumerate()
                .map(|(i, element)| {
                    element
                        .resolve(registry)
                        .map_err(|e| e.within(Segment::Index(i)))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Ty::FixedTuple),
            TypeDoc::Compound(CompoundDoc::Map(value)) => Primitive::from_name(value)
                .map(Ty::map)
                .ok_or_else(|| {
                    SchemaError::new(SchemaErrorKind::NonPrimitiveMapValue(value.clone()))
                }),
            TypeDoc::Compound(CompoundDoc::Literal(values)) => values
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    Literal::from_json(value).ok_or_else(|| {
                        SchemaError::at(
                            Path::root().join(Segment::Index(i)),
                            SchemaErrorKind::NonPrimitiveLiteral(value.to_string()),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Ty::Literal),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::eager::convert_value;
    use serde_json::json;

    const SHAPES: &str = r#"{
        "records": {
            "Point": {"fields": [
                {"name": "x", "type": "float"},
                {"name": "y", "type": "float"}
            ]},
            "Circle": {"fields": [
                {"name": "kind", "type": {"literal": ["circle"]}, "discriminator": true},
                {"name": "center", "type": "Point"},
                {"name": "radius", "type": "float"}
            ]},
            "Polygon": {"fields": [
                {"name": "kind", "type": {"literal": ["polygon", "triangle"]}, "discriminator": true},
                {"name": "points", "type": {"sequence": "Point"}},
                {"name": "fill_color", "type": {"optional": "string"}, "required": false}
            ]},
            "Scene": {"fields": [
                {"name": "shapes", "type": {"sequence": "Shape"}},
                {"name": "bounds", "type": {"tuple": ["Point", "Point"]}},
                {"name": "tags", "type": {"map": "string"}, "required": false}
            ]}
        },
        "unions": {
            "Shape": {"discriminator": "kind", "variants": ["Circle", "Polygon"]}
        }
    }"#;

    #[test]
    fn loads_and_converts_a_document() {
        let reg = load_registry(SHAPES).unwrap();
        let scene = reg.lookup("Scene").unwrap();
        let converter = compile(&reg, &scene).unwrap();
        let src = json!({
            "shapes": [
                {"kind": "triangle", "points": [{"x": 0.0, "y": 0.0}], "fillColor": "red"},
                {"kind": "circle", "center": {"x": 1.0, "y": 1.0}, "radius": 2.0}
            ],
            "bounds": [{"x": 0.0, "y": 0.0}, {"x": 9.0, "y": 9.0}]
        });
        let out = convert_value(&converter, &src).unwrap();
        assert_eq!(
            out,
            json!({
                "shapes": [
                    {"kind": "triangle", "points": [{"x": 0.0, "y": 0.0}], "fill_color": "red"},
                    {"kind": "circle", "center": {"x": 1.0, "y": 1.0}, "radius": 2.0}
                ],
                "bounds": [{"x": 0.0, "y": 0.0}, {"x": 9.0, "y": 9.0}],
                "tags": null
            })
        );
    }

    #[test]
    fn union_tags_come_from_variant_literals() {
        let reg = load_registry(SHAPES).unwrap();
        let Some(Ty::DiscriminatedUnion(shape)) = reg.lookup("Shape") else {
            panic!("Shape should be a union");
        };
        let tags: Vec<_> = reg
            .union(shape)
            .unwrap()
            .variants
            .iter()
            .map(|(tag, _)| tag.to_string())
            .collect();
        assert_eq!(tags, vec![r#""circle""#, r#""polygon""#, r#""triangle""#]);
    }

    #[test]
    fn convention_and_overrides() {
        let reg = load_registry(
            r#"{
                "convention": "verbatim",
                "records": {"Label": {"fields": [
                    {"name": "html_for", "type": "string"},
                    {"name": "class_name", "type": "string", "source": "className"}
                ]}}
            }"#,
        )
        .unwrap();
        let converter = compile(&reg, &reg.lookup("Label").unwrap()).unwrap();
        let out = convert_value(&converter, &json!({"html_for": "a", "className": "b"})).unwrap();
        assert_eq!(out, json!({"html_for": "a", "class_name": "b"}));
    }

    #[test]
    fn parse_errors_carry_the_json_path() {
        let err = SchemaDocument::parse(
            r#"{"records": {"A": {"fields": [{"name": "x", "type": "int", "requird": false}]}}}"#,
        )
        .unwrap_err();
        let DocumentError::Parse { path, .. } = err else {
            panic!("expected a parse error, got {err:?}");
        };
        assert!(path.starts_with("records.A.fields[0]"), "path was {path}");
    }

    #[test]
    fn unknown_names_and_bad_variants_are_schema_errors() {
        let err = load_registry(r#"{"records": {"A": {"fields": [{"name": "b", "type": "B"}]}}}"#)
            .unwrap_err();
        let DocumentError::Schema(err) = err else {
            panic!("expected a schema error");
        };
        assert_eq!(err.kind, SchemaErrorKind::UnknownType("B".into()));
        assert_eq!(err.path.to_string(), "$(A).b");

        let err = load_registry(
            r#"{
                "records": {"A": {"fields": [{"name": "kind", "type": {"literal": ["a"]}}]}},
                "unions": {
                    "U": {"discriminator": "kind", "variants": ["A"]},
                    "V": {"discriminator": "kind", "variants": ["U"]}
                }
            }"#,
        )
        .unwrap_err();
        let DocumentError::Schema(err) = err else {
            panic!("expected a schema error");
        };
        assert_eq!(err.kind, SchemaErrorKind::VariantNotRecord("U".into()));
        assert_eq!(err.path.to_string(), "$(V)");
    }

    #[test]
    fn literal_and_map_values_must_be_primitive() {
        let err = load_registry(
            r#"{"records": {"A": {"fields": [{"name": "k", "type": {"literal": ["a", [1]]}}]}}}"#,
        )
        .unwrap_err();
        let DocumentError::Schema(err) = err else {
            panic!("expected a schema error");
        };
        assert_eq!(err.kind, SchemaErrorKind::NonPrimitiveLiteral("[1]".into()));
        assert_eq!(err.path.to_string(), "$(A).k[1]");

        let err = load_registry(
            r#"{"records": {"A": {"fields": [{"name": "m", "type": {"map": "A"}}]}}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Schema(SchemaError { kind: SchemaErrorKind::NonPrimitiveMapValue(_), .. })
        ));
    }

    #[test]
    fn self_referencing_records_load() {
        let reg = load_registry(
            r#"{"records": {"Node": {"fields": [
                {"name": "value", "type": "int"},
                {"name": "next", "type": "Node", "required": false}
            ]}}}"#,
        )
        .unwrap();
        let converter = compile(&reg, &reg.lookup("Node").unwrap()).unwrap();
        let src = json!({"value": 1, "next": {"value": 2}});
        assert_eq!(
            convert_value(&converter, &src).unwrap(),
            json!({"value": 1, "next": {"value": 2, "next": null}})
        );
    }
}

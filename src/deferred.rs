//! Deferred accessor: converters applied to a [`SymbolicAccessor`] build an
//! [`Expr`] tree instead of a value.
//!
//! The tree is meant to be shipped and run somewhere the source value actually
//! lives. It renders as a JavaScript expression over a single parameter
//! (`Display`), and [`Expr::evaluate`] runs it locally against a JSON value
//! with the same results and error paths as the eager backend.
//!
//! Recursive records and unions are not unrolled: a plan flagged recursive is
//! emitted once as a named function, and re-entering it while its body is
//! still being emitted becomes a call. Function identifiers are unique per
//! emitted expression even when type names mangle to the same text.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::accessor::DynamicAccessor;
use crate::compiler::Converter;
use crate::eager::kind_name;
use crate::error::{ConversionError, ConversionErrorKind, Path, Segment};
use crate::schema::Literal;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("static pattern"));

/// Whether `name` can be written as a bare JavaScript identifier.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

// ————————————————————————————————————————————————————————————————————————————
// EXPRESSIONS
// ————————————————————————————————————————————————————————————————————————————

/// A read path rooted at a parameter or a bound variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    Root(String),
    Var(String),
    Field(Box<Source>, String),
    Index(Box<Source>, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Read(Source),
    Record(Vec<(String, Expr)>),
    Tuple(Vec<Expr>),
    /// `source.map((binder) => body)`
    Map {
        source: Source,
        binder: String,
        body: Box<Expr>,
    },
    /// null if `probe` is null or absent, otherwise `present` with `binder`
    /// bound to it
    Coalesce {
        probe: Source,
        binder: String,
        present: Box<Expr>,
    },
    /// first arm whose literal equals `probe`, otherwise null
    Switch {
        probe: Source,
        binder: String,
        arms: Vec<(Literal, Expr)>,
    },
    /// A self-calling function named `function` (a JavaScript identifier):
    /// `body` with `binder` bound to `arg`.
    Define {
        function: String,
        binder: String,
        body: Box<Expr>,
        arg: Source,
    },
    /// Call to an enclosing `Define`.
    Call { function: String, arg: Source },
}

impl Source {
    fn field(&self, name: &str) -> Self {
        Source::Field(Box::new(self.clone()), name.to_owned())
    }
    fn index(&self, index: usize) -> Self {
        Source::Index(Box::new(self.clone()), index)
    }
}

/// Emit the deferred expression for `converter` over a parameter named
/// `param`.
pub fn emit(converter: &Converter, param: &str) -> Result<Expr, ConversionError> {
    converter.apply(&SymbolicAccessor::root(param))
}

// ————————————————————————————————————————————————————————————————————————————
// ACCESSOR
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub struct SymbolicAccessor {
    source: Source,
    /// nesting depth of binders; keeps binder names unique per scope
    depth: usize,
    functions: Rc<RefCell<Functions>>,
}

#[derive(Debug, Default)]
struct Functions {
    /// type names whose function bodies are being emitted, innermost last
    active: Vec<String>,
    /// type name -> function identifier, in order of first use
    assigned: IndexMap<String, String>,
}

impl Functions {
    fn identifier(&mut self, name: &str) -> String {
        if let Some(function) = self.assigned.get(name) {
            return function.clone();
        }
        let base = function_name(name);
        let mut function = base.clone();
        let mut suffix = 1;
        while self.assigned.values().any(|taken| *taken == function) {
            function = format!("{base}_{suffix}");
            suffix += 1;
        }
        self.assigned.insert(name.to_owned(), function.clone());
        function
    }
}

impl SymbolicAccessor {
    pub fn root(param: &str) -> Self {
        Self {
            source: Source::Root(param.to_owned()),
            depth: 0,
            functions: Rc::default(),
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    fn at(&self, source: Source) -> Self {
        Self {
            source,
            depth: self.depth,
            functions: Rc::clone(&self.functions),
        }
    }

    fn bind(&self, prefix: &str) -> (String, Self) {
        let binder = format!("{prefix}{}", self.depth);
        let inner = Self {
            source: Source::Var(binder.clone()),
            depth: self.depth + 1,
            functions: Rc::clone(&self.functions),
        };
        (binder, inner)
    }
}

impl DynamicAccessor for SymbolicAccessor {
    type Expr = Expr;

    fn field(&self, name: &str) -> Result<Self, ConversionError> {
        Ok(self.at(self.source.field(name)))
    }

    fn index(&self, index: usize) -> Result<Self, ConversionError> {
        Ok(self.at(self.source.index(index)))
    }

    fn map_sequence<F>(&self, mut each: F) -> Result<Expr, ConversionError>
    where
        F: FnMut(usize, &Self) -> Result<Expr, ConversionError>,
    {
        // one body stands for every element
        let (binder, element) = self.bind("_v");
        let body = each(0, &element)?;
        Ok(Expr::Map {
            source: self.source.clone(),
            binder,
            body: Box::new(body),
        })
    }

    fn unless_null<F>(&self, present: F) -> Result<Expr, ConversionError>
    where
        F: FnOnce(&Self) -> Result<Expr, ConversionError>,
    {
        let (binder, value) = self.bind("_v");
        let present = present(&value)?;
        Ok(Expr::Coalesce {
            probe: self.source.clone(),
            binder,
            present: Box::new(present),
        })
    }

    fn switch<F>(&self, tags: &[Literal], mut arm: F) -> Result<Expr, ConversionError>
    where
        F: FnMut(usize) -> Result<Expr, ConversionError>,
    {
        let arms = tags
            .iter()
            .enumerate()
            .map(|(i, tag)| Ok((tag.clone(), arm(i)?)))
            .collect::<Result<Vec<_>, ConversionError>>()?;
        Ok(Expr::Switch {
            probe: self.source.clone(),
            binder: format!("_t{}", self.depth),
            arms,
        })
    }

    fn named<F>(&self, name: &str, recursive: bool, body: F) -> Result<Expr, ConversionError>
    where
        F: FnOnce(&Self) -> Result<Expr, ConversionError>,
    {
        if !recursive {
            return body(self);
        }
        let function = {
            let mut functions = self.functions.borrow_mut();
            if functions.active.iter().any(|active| active == name) {
                let function = functions.identifier(name);
                return Ok(Expr::Call {
                    function,
                    arg: self.source.clone(),
                });
            }
            functions.active.push(name.to_owned());
            functions.identifier(name)
        };

        let (binder, param) = self.bind("_r");
        let body = body(&param);
        self.functions.borrow_mut().active.pop();
        Ok(Expr::Define {
            function,
            binder,
            body: Box::new(body?),
            arg: self.source.clone(),
        })
    }

    fn raw(&self) -> Expr {
        Expr::Read(self.source.clone())
    }

    fn null(&self) -> Expr {
        Expr::Null
    }

    fn record(&self, fields: Vec<(String, Expr)>) -> Expr {
        Expr::Record(fields)
    }

    fn tuple(&self, elements: Vec<Expr>) -> Expr {
        Expr::Tuple(elements)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// EVALUATION
// ————————————————————————————————————————————————————————————————————————————

struct Binding<'a> {
    name: &'a str,
    value: &'a Value,
    path: Path,
}

struct Function<'e> {
    name: &'e str,
    binder: &'e str,
    body: &'e Expr,
}

#[derive(Default)]
struct Env<'a> {
    vars: Vec<Binding<'a>>,
    functions: Vec<Function<'a>>,
}

impl Expr {
    /// Run the expression with its parameter bound to `root`.
    pub fn evaluate(&self, root: &Value) -> Result<Value, ConversionError> {
        let mut env = Env::default();
        for param in self.params() {
            env.vars.push(Binding {
                name: param,
                value: root,
                path: Path::root(),
            });
        }
        env.eval(self)
    }

    /// Root parameter names read by this expression.
    fn params(&self) -> Vec<&str> {
        fn root_of(source: &Source) -> Option<&str> {
            match source {
                Source::Root(name) => Some(name.as_str()),
                Source::Var(_) => None,
                Source::Field(inner, _) | Source::Index(inner, _) => root_of(inner),
            }
        }
        fn note<'e>(source: &'e Source, out: &mut Vec<&'e str>) {
            if let Some(name) = root_of(source) {
                if !out.contains(&name) {
                    out.push(name);
                }
            }
        }
        fn walk<'e>(expr: &'e Expr, out: &mut Vec<&'e str>) {
            match expr {
                Expr::Null => {}
                Expr::Read(source) | Expr::Call { arg: source, .. } => note(source, out),
                Expr::Record(fields) => fields.iter().for_each(|(_, e)| walk(e, out)),
                Expr::Tuple(elements) => elements.iter().for_each(|e| walk(e, out)),
                Expr::Map { source, body, .. } => {
                    note(source, out);
                    walk(body, out);
                }
                Expr::Coalesce { probe, present, .. } => {
                    note(probe, out);
                    walk(present, out);
                }
                Expr::Switch { probe, arms, .. } => {
                    note(probe, out);
                    arms.iter().for_each(|(_, e)| walk(e, out));
                }
                Expr::Define { arg, body, .. } => {
                    note(arg, out);
                    walk(body, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }
}

impl<'a> Env<'a> {
    fn eval(&mut self, expr: &'a Expr) -> Result<Value, ConversionError> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Read(source) => self.resolve(source).map(|(value, _)| value.clone()),
            Expr::Record(fields) => {
                let mut out = Map::new();
                for (name, field) in fields {
                    out.insert(name.clone(), self.eval(field)?);
                }
                Ok(Value::Object(out))
            }
            Expr::Tuple(elements) => elements
                .iter()
                .map(|e| self.eval(e))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Map { source, binder, body } => {
                let (value, path) = self.resolve(source)?;
                let Value::Array(items) = value else {
                    return Err(ConversionError::at(path, mismatch("array", value)));
                };
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.scoped(binder, item, path.join(Segment::Index(i)), body)?);
                }
                Ok(Value::Array(out))
            }
            Expr::Coalesce { probe, binder, present } => match self.probe(probe)? {
                Some((value, path)) if !value.is_null() => self.scoped(binder, value, path, present),
                _ => Ok(Value::Null),
            },
            Expr::Switch { probe, arms, .. } => {
                let Some((value, _)) = self.probe(probe)? else {
                    return Ok(Value::Null);
                };
                match arms.iter().find(|(tag, _)| tag.matches(value)) {
                    Some((_, arm)) => self.eval(arm),
                    None => Ok(Value::Null),
                }
            }
            Expr::Define { function, binder, body, arg } => {
                let (value, path) = self.resolve(arg)?;
                self.functions.push(Function {
                    name: function.as_str(),
                    binder: binder.as_str(),
                    body: body.as_ref(),
                });
                let result = self.scoped(binder, value, path, body);
                self.functions.pop();
                result
            }
            Expr::Call { function, arg } => {
                let (value, path) = self.resolve(arg)?;
                let Some(target) = self.functions.iter().rev().find(|f| f.name == function.as_str()) else {
                    return Err(ConversionError::new(ConversionErrorKind::UnboundVariable(
                        function.clone(),
                    )));
                };
                let (binder, body) = (target.binder, target.body);
                self.scoped(binder, value, path, body)
            }
        }
    }

    fn scoped(
        &mut self,
        name: &'a str,
        value: &'a Value,
        path: Path,
        body: &'a Expr,
    ) -> Result<Value, ConversionError> {
        self.vars.push(Binding { name, value, path });
        let result = self.eval(body);
        self.vars.pop();
        result
    }

    fn lookup(&self, name: &str) -> Result<(&'a Value, Path), ConversionError> {
        self.vars
            .iter()
            .rev()
            .find(|b| b.name == name)
            .map(|b| (b.value, b.path.clone()))
            .ok_or_else(|| ConversionError::new(ConversionErrorKind::UnboundVariable(name.to_owned())))
    }

    fn resolve(&self, source: &Source) -> Result<(&'a Value, Path), ConversionError> {
        match source {
            Source::Root(name) | Source::Var(name) => self.lookup(name),
            Source::Field(inner, name) => {
                let (value, path) = self.resolve(inner)?;
                let path = path.join(Segment::Field(name.clone()));
                match value {
                    Value::Object(map) => match map.get(name) {
                        Some(field) => Ok((field, path)),
                        None => Err(ConversionError::at(
                            path,
                            ConversionErrorKind::MissingField(name.clone()),
                        )),
                    },
                    other => Err(ConversionError::at(path, mismatch("object", other))),
                }
            }
            Source::Index(inner, index) => {
                let (value, path) = self.resolve(inner)?;
                let path = path.join(Segment::Index(*index));
                match value {
                    Value::Array(items) => match items.get(*index) {
                        Some(item) => Ok((item, path)),
                        None => Err(ConversionError::at(
                            path,
                            ConversionErrorKind::IndexOutOfRange {
                                index: *index,
                                len: items.len(),
                            },
                        )),
                    },
                    other => Err(ConversionError::at(path, mismatch("array", other))),
                }
            }
        }
    }

    /// Like `resolve`, except a failing final field read counts as absent.
    fn probe(&self, source: &Source) -> Result<Option<(&'a Value, Path)>, ConversionError> {
        let Source::Field(inner, name) = source else {
            return self.resolve(source).map(Some);
        };
        let (value, path) = self.resolve(inner)?;
        Ok(value
            .as_object()
            .and_then(|map| map.get(name))
            .map(|field| (field, path.join(Segment::Field(name.clone())))))
    }
}

fn mismatch(expected: &'static str, found: &Value) -> ConversionErrorKind {
    ConversionErrorKind::TypeMismatch {
        expected,
        found: kind_name(found),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RENDERING
// ————————————————————————————————————————————————————————————————————————————

fn quoted(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

fn function_name(name: &str) -> String {
    let mangled: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    format!("convert{mangled}")
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Root(name) | Source::Var(name) => f.write_str(name),
            Source::Field(inner, name) if is_identifier(name) => write!(f, "{inner}.{name}"),
            Source::Field(inner, name) => write!(f, "{inner}[{}]", quoted(name)),
            Source::Index(inner, index) => write!(f, "{inner}[{index}]"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Null => f.write_str("null"),
            Expr::Read(source) => write!(f, "{source}"),
            Expr::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {value}", quoted(name))?;
                }
                f.write_str("}")
            }
            Expr::Tuple(elements) => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            Expr::Map { source, binder, body } => write!(f, "{source}.map(({binder}) => ({body}))"),
            Expr::Coalesce { probe, binder, present } => {
                write!(f, "(({binder}) => {binder} == null ? null : ({present}))({probe})")
            }
            Expr::Switch { probe, binder, arms } => {
                write!(f, "(({binder}) => ")?;
                for (tag, arm) in arms {
                    write!(f, "{binder} === {tag} ? ({arm}) : ")?;
                }
                write!(f, "null)({probe})")
            }
            Expr::Define { function, binder, body, arg } => {
                write!(f, "(function {function}({binder}) {{ return {body}; }})({arg})")
            }
            Expr::Call { function, arg } => write!(f, "{function}({arg})"),
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
    use crate::schema::{Field, SchemaRegistry, Ty};
    use serde_json::json;

    fn point(reg: &mut SchemaRegistry) -> Ty {
        let id = reg
            .add_record("Point", vec![Field::new("x", Ty::float()), Field::new("y", Ty::float())])
            .unwrap();
        Ty::Record(id)
    }

    #[test]
    fn renders_records_as_object_literals() {
        let mut reg = SchemaRegistry::new();
        let rec = reg
            .add_record(
                "Key",
                vec![
                    Field::new("key_code", Ty::int()),
                    Field::new("aria_label", Ty::string()).with_source("aria-label"),
                ],
            )
            .unwrap();
        let expr = emit(&compile(&reg, &Ty::Record(rec)).unwrap(), "e").unwrap();
        assert_eq!(
            expr.to_string(),
            r#"{"key_code": e.keyCode, "aria_label": e["aria-label"]}"#
        );
    }

    #[test]
    fn renders_optionals_sequences_and_tuples() {
        let mut reg = SchemaRegistry::new();
        let p = point(&mut reg);
        let rec = reg
            .add_record(
                "Path",
                vec![
                    Field::optional("label", Ty::string()),
                    Field::new("points", Ty::sequence(p)),
                    Field::new("span", Ty::tuple([Ty::int(), Ty::int()])),
                ],
            )
            .unwrap();
        let expr = emit(&compile(&reg, &Ty::Record(rec)).unwrap(), "e").unwrap();
        assert_eq!(
            expr.to_string(),
            concat!(
                r#"{"label": ((_v0) => _v0 == null ? null : (_v0))(e.label), "#,
                r#""points": e.points.map((_v0) => ({"x": _v0.x, "y": _v0.y})), "#,
                r#""span": [e.span[0], e.span[1]]}"#
            )
        );
    }

    #[test]
    fn renders_unions_as_switches() {
        let mut reg = SchemaRegistry::new();
        let circle = reg
            .add_record("Circle", vec![Field::tag("kind", ["circle"]), Field::new("r", Ty::float())])
            .unwrap();
        let dot = reg.add_record("Dot", vec![Field::tag("kind", ["dot"])]).unwrap();
        let shape = reg.add_union_of("Shape", "kind", &[circle, dot]).unwrap();
        let expr = emit(&compile(&reg, &Ty::DiscriminatedUnion(shape)).unwrap(), "e").unwrap();
        assert_eq!(
            expr.to_string(),
            concat!(
                r#"((_t0) => _t0 === "circle" ? ({"kind": e.kind, "r": e.r}) : "#,
                r#"_t0 === "dot" ? ({"kind": e.kind}) : null)(e.kind)"#
            )
        );
    }

    #[test]
    fn emission_is_deterministic() {
        let mut reg = SchemaRegistry::new();
        let p = point(&mut reg);
        let converter = compile(&reg, &Ty::sequence(Ty::optional(p))).unwrap();
        assert_eq!(emit(&converter, "e").unwrap(), emit(&converter, "e").unwrap());
    }

    #[test]
    fn self_reference_becomes_a_named_function() {
        let mut reg = SchemaRegistry::new();
        let node = reg.declare_record("Node").unwrap();
        reg.define_record(
            node,
            vec![Field::new("value", Ty::int()), Field::optional("next", Ty::Record(node))],
        );
        let converter = compile(&reg, &Ty::Record(node)).unwrap();
        let expr = emit(&converter, "e").unwrap();
        assert_eq!(
            expr.to_string(),
            concat!(
                r#"(function convertNode(_r0) { return {"value": _r0.value, "#,
                r#""next": ((_v1) => _v1 == null ? null : (convertNode(_v1)))(_r0.next)}; })(e)"#
            )
        );

        let src = json!({"value": 1, "next": {"value": 2, "next": null}});
        let expected = json!({"value": 1, "next": {"value": 2, "next": null}});
        assert_eq!(expr.evaluate(&src).unwrap(), expected);
        assert_eq!(convert_value(&converter, &src).unwrap(), expected);
    }

    #[test]
    fn evaluation_agrees_with_the_eager_backend() {
        let mut reg = SchemaRegistry::new();
        let p = point(&mut reg);
        let circle = reg
            .add_record(
                "Circle",
                vec![Field::tag("kind", ["circle"]), Field::new("center", p.clone())],
            )
            .unwrap();
        let poly = reg
            .add_record(
                "Poly",
                vec![Field::tag("kind", ["poly"]), Field::new("points", Ty::sequence(p))],
            )
            .unwrap();
        let shape = reg.add_union_of("Shape", "kind", &[circle, poly]).unwrap();
        let scene = reg
            .add_record(
                "Scene",
                vec![
                    Field::new("shapes", Ty::sequence(Ty::DiscriminatedUnion(shape))),
                    Field::optional("title", Ty::string()),
                ],
            )
            .unwrap();
        let converter = compile(&reg, &Ty::Record(scene)).unwrap();
        let expr = emit(&converter, "scene").unwrap();

        let sources = [
            json!({"shapes": [
                {"kind": "circle", "center": {"x": 0.0, "y": 1.0}},
                {"kind": "poly", "points": [{"x": 1.0, "y": 1.0}]},
                {"kind": "hexagon"}
            ], "title": "t"}),
            json!({"shapes": []}),
            json!({"shapes": [{"kind": "poly", "points": [{"x": 1.0}]}]}),
            json!({"shapes": {"kind": "circle"}}),
            json!({"title": null}),
        ];
        for src in &sources {
            assert_eq!(expr.evaluate(src), convert_value(&converter, src), "source {src}");
        }
    }

    #[test]
    fn nested_recursive_records_emit_each_body_once() {
        let mut reg = SchemaRegistry::new();
        let ids: Vec<_> = (0..24).map(|i| reg.declare_record(format!("R{i}")).unwrap()).collect();
        for (i, id) in ids.iter().enumerate() {
            let mut fields = vec![Field::optional("next", Ty::Record(*id))];
            if let Some(child) = ids.get(i + 1) {
                fields.push(Field::new("child", Ty::Record(*child)));
            }
            reg.define_record(*id, fields);
        }
        let converter = compile(&reg, &Ty::Record(ids[0])).unwrap();

        let started = std::time::Instant::now();
        let js = emit(&converter, "e").unwrap().to_string();
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert_eq!(js.matches("(function convertR").count(), 24);
        assert!(js.contains("convertR23(_v24)"));
    }

    #[test]
    fn colliding_function_names_stay_distinct() {
        let mut reg = SchemaRegistry::new();
        let dashed = reg.declare_record("A-B").unwrap();
        let underscored = reg.declare_record("A_B").unwrap();
        reg.define_record(
            dashed,
            vec![
                Field::optional("own", Ty::Record(dashed)),
                Field::new("other", Ty::Record(underscored)),
            ],
        );
        reg.define_record(
            underscored,
            vec![
                Field::optional("own", Ty::Record(underscored)),
                Field::optional("back", Ty::Record(dashed)),
            ],
        );
        let converter = compile(&reg, &Ty::Record(dashed)).unwrap();
        let expr = emit(&converter, "e").unwrap();
        let js = expr.to_string();
        assert!(js.starts_with("(function convertA_B(_r0)"));
        assert!(js.contains("(function convertA_B_1(_r1)"));
        assert!(js.contains("convertA_B_1(_v2)"));

        let src = json!({
            "own": null,
            "other": {
                "own": {"own": null, "back": null},
                "back": {"own": null, "other": {"own": null, "back": null}}
            }
        });
        assert_eq!(expr.evaluate(&src), convert_value(&converter, &src));
        assert_eq!(
            expr.evaluate(&src).unwrap()["other"]["back"]["other"],
            json!({"own": null, "back": null})
        );
    }

    #[test]
    fn unbound_calls_are_reported() {
        let expr = Expr::Call {
            function: "convertNode".into(),
            arg: Source::Root("e".into()),
        };
        assert_eq!(
            expr.evaluate(&json!({})).unwrap_err().kind,
            ConversionErrorKind::UnboundVariable("convertNode".into())
        );
    }
}

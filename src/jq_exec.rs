//! jq preprocessing for input documents (via `jaq`).
//!
//! A `--jq-expr` filter runs on each input document before conversion. One
//! document may fan out into several (`.events[]`) or vanish (`empty`); every
//! output must be JSON, since it becomes the source value of a converter.
//! The standard jq definitions are available alongside the JSON ones.

use anyhow::{Context, Result, anyhow};
use jaq_core::{Compiler, Ctx, RcIter, compile::Undefined, load};
use jaq_json::Val;
use serde_json::Value;

type File<'s> = load::File<&'s str, ()>;

/// Run `filter_src` on `input` and collect every output, in order.
///
/// Fails on parse errors, references to undefined filters, and the first
/// runtime error the filter raises.
pub fn run_jaq(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = File {
        code: filter_src,
        path: (),
    };

    let modules = loader.load(&arena, program).map_err(parse_failure)?;
    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(undefined_names)?;

    let inputs = RcIter::new(core::iter::empty());
    filter
        .run((Ctx::new([], &inputs), Val::from(input.clone())))
        .enumerate()
        .map(|(i, output)| {
            let output = output.map_err(|e| anyhow!("jq filter failed on output #{i}: {e:?}"))?;
            to_json(&output).with_context(|| format!("jq output #{i} is not JSON"))
        })
        .collect()
}

/// `Val` displays as JSON text.
fn to_json(output: &Val) -> Result<Value> {
    Ok(serde_json::from_str(&output.to_string())?)
}

fn parse_failure(errs: Vec<(File<'_>, load::Error<&str>)>) -> anyhow::Error {
    let lines: Vec<String> = errs
        .into_iter()
        .map(|(file, err)| format!("cannot parse jq filter `{}`: {err:?}", file.code))
        .collect();
    anyhow!(lines.join("\n"))
}

fn undefined_names(errs: Vec<(File<'_>, Vec<(&str, Undefined)>)>) -> anyhow::Error {
    let lines: Vec<String> = errs
        .into_iter()
        .flat_map(|(file, names)| {
            names.into_iter().map(move |(name, undefined)| {
                format!("undefined `{name}` ({undefined:?}) in jq filter `{}`", file.code)
            })
        })
        .collect();
    anyhow!(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selects_and_splits() {
        let input = json!({"events": [{"type": "click"}, {"type": "keydown"}]});
        let out = run_jaq(".events[]", &input).unwrap();
        assert_eq!(out, vec![json!({"type": "click"}), json!({"type": "keydown"})]);
    }

    #[test]
    fn empty_drops_the_document() {
        assert_eq!(run_jaq("empty", &json!({"a": 1})).unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn reports_parse_errors() {
        let err = run_jaq(".events[", &json!({})).unwrap_err();
        assert!(err.to_string().starts_with("cannot parse jq filter"));
    }

    #[test]
    fn reports_undefined_filters() {
        let err = run_jaq("frobnicate", &json!({})).unwrap_err();
        assert!(err.to_string().contains("undefined `frobnicate`"));
    }

    #[test]
    fn reports_runtime_errors() {
        let err = run_jaq(".a + 1", &json!({"a": "x"})).unwrap_err();
        assert!(err.to_string().starts_with("jq filter failed on output #0"));
    }
}

//! CLI: check | convert | emit
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;

use recast::deferred::{self, is_identifier};
use recast::eager::convert_value;
use recast::{Converter, ConverterCache, load_registry};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile schema documents into converters and apply them to JSON payloads
#[derive(Parser, Debug)]
#[command(name = "recast", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile every declared record and union, reporting each result
    Check(CheckCmd),
    /// convert input documents into the shape of a declared type
    Convert(ConvertCmd),
    /// print the deferred JavaScript expression for a declared type
    Emit(EmitCmd),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// schema document (.json)
    #[arg(long, short)]
    schema: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON); output follows suit
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /detail/event)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths, quoted glob patterns or '-' for stdin
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug)]
struct CheckCmd {
    #[command(flatten)]
    schema: SchemaSettings,
}

#[derive(Args, Debug)]
struct ConvertCmd {
    #[command(flatten)]
    schema: SchemaSettings,

    /// declared record or union to convert into
    #[arg(long)]
    root: String,

    #[command(flatten)]
    input_settings: InputSettings,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EmitCmd {
    #[command(flatten)]
    schema: SchemaSettings,

    /// declared record or union to emit
    #[arg(long)]
    root: String,

    /// name of the expression's parameter
    #[arg(long, default_value = "e")]
    param: String,

    /// output .js file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn load_cache(&self) -> Result<ConverterCache> {
        let source = std::fs::read_to_string(&self.schema)
            .with_context(|| format!("failed to read schema {}", self.schema.display()))?;
        let registry = load_registry(&source)
            .with_context(|| format!("invalid schema {}", self.schema.display()))?;
        Ok(ConverterCache::new(Arc::new(registry)))
    }

    fn converter(&self, root: &str) -> Result<Converter> {
        let cache = self.load_cache()?;
        cache
            .get_or_compile_named(root)
            .with_context(|| format!("cannot compile `{root}`"))
    }
}

impl InputSettings {
    /// Every input document after pointer selection and jq filtering.
    fn load(&self) -> Result<Vec<Value>> {
        let mut documents = Vec::new();
        for source_path in resolve_file_path_patterns(&self.input)? {
            let label = source_path.to_string_lossy().to_string();
            let source = if label == "-" {
                std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?
            } else {
                std::fs::read_to_string(&source_path)
                    .with_context(|| format!("failed to read source file {label}"))?
            };
            let parsed = if self.ndjson {
                source
                    .lines()
                    .enumerate()
                    .filter(|(_, line)| !line.trim().is_empty())
                    .map(|(n, line)| {
                        serde_json::from_str::<Value>(line)
                            .with_context(|| format!("failed to parse {label}:{}", n + 1))
                    })
                    .collect::<Result<Vec<_>>>()?
            } else {
                vec![serde_json::from_str::<Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file {label}"))?]
            };
            for value in parsed {
                let value = self.select(value, &label)?;
                documents.extend(self.filter(value, &label)?);
            }
        }
        tracing::debug!(documents = documents.len(), "inputs loaded");
        Ok(documents)
    }

    fn select(&self, value: Value, label: &str) -> Result<Value> {
        let Some(pointer) = self.json_pointer.as_deref() else {
            return Ok(value);
        };
        value
            .pointer(pointer)
            .cloned()
            .ok_or_else(|| anyhow!("JSON pointer {pointer} selects nothing in {label}"))
    }

    fn filter(&self, value: Value, label: &str) -> Result<Vec<Value>> {
        match self.jq_expr.as_deref() {
            None => Ok(vec![value]),
            Some(jq_expr) => crate::jq_exec::run_jaq(jq_expr, &value)
                .with_context(|| format!("failed to apply jq expression to {label}")),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Check(target) => target.run(),
            Command::Convert(target) => target.run(),
            Command::Emit(target) => target.run(),
        }
    }
}

impl CheckCmd {
    fn run(&self) -> Result<()> {
        let cache = self.schema.load_cache()?;
        let registry = cache.registry();
        let mut failures = 0usize;
        for (name, ty) in registry.named_types() {
            match cache.get_or_compile(ty) {
                Ok(_) => println!("{} {name}", "ok".green()),
                Err(error) => {
                    failures += 1;
                    println!("{} {name}: {error}", "error".red().bold());
                }
            }
        }
        if failures > 0 {
            bail!("{failures} type(s) failed to compile");
        }
        Ok(())
    }
}

impl ConvertCmd {
    fn run(&self) -> Result<()> {
        let converter = self.schema.converter(&self.root)?;
        let documents = self.input_settings.load()?;
        let converted = documents
            .par_iter()
            .enumerate()
            .map(|(i, document)| {
                convert_value(&converter, document).with_context(|| format!("document #{i}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let text = if self.input_settings.ndjson {
            let lines = converted
                .iter()
                .map(serde_json::to_string)
                .collect::<Result<Vec<_>, _>>()?;
            lines.join("\n")
        } else if let [single] = converted.as_slice() {
            serde_json::to_string_pretty(single)?
        } else {
            serde_json::to_string_pretty(&converted)?
        };
        write_output(self.out.as_deref(), &text)
    }
}

impl EmitCmd {
    fn run(&self) -> Result<()> {
        if !is_identifier(&self.param) {
            bail!("`{}` is not a valid parameter name", self.param);
        }
        let converter = self.schema.converter(&self.root)?;
        let expr = deferred::emit(&converter, &self.param)?;
        let text = format!("({}) => {expr}", self.param);
        write_output(self.out.as_deref(), &text)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    let Some(out) = out else {
        println!("{text}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, format!("{text}\n"))
        .with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                matched_any = true;
                out.push(entry?);
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(ndjson: bool, json_pointer: Option<&str>, jq_expr: Option<&str>) -> InputSettings {
        InputSettings {
            ndjson,
            json_pointer: json_pointer.map(str::to_owned),
            jq_expr: jq_expr.map(str::to_owned),
            input: Vec::new(),
        }
    }

    #[test]
    fn pointer_selects_a_subnode() {
        let value = json!({"detail": {"event": {"type": "click"}}});
        let selected = settings(false, Some("/detail/event"), None).select(value, "x").unwrap();
        assert_eq!(selected, json!({"type": "click"}));
        assert!(settings(false, Some("/nope"), None).select(json!({}), "x").is_err());
    }

    #[test]
    fn jq_filter_may_fan_out() {
        let value = json!({"events": [1, 2, 3]});
        let out = settings(false, None, Some(".events[]")).filter(value, "x").unwrap();
        assert_eq!(out, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["a.json", "-"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("-")]);
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = CommandLineInterface::try_parse_from([
            "recast", "convert", "--schema", "s.json", "--root", "MouseEvent", "--input", "a.json",
            "--ndjson",
        ])
        .unwrap();
        let Command::Convert(cmd) = cli.cmd else {
            panic!("expected convert");
        };
        assert_eq!(cmd.root, "MouseEvent");
        assert!(cmd.input_settings.ndjson);
    }
}

//! Rune runtime: compiles each snippet as the body of a synchronous `main`.

use std::sync::Arc;

use rune::runtime::RuntimeContext;
use rune::{Context, Diagnostics, Source, Sources, Unit, Value, Vm};
use serde_json::Value as JsonValue;

use stagehand_events::{ScriptError, ScriptLanguage};

pub(crate) struct RuneBackend {
    context: Context,
    runtime: Arc<RuntimeContext>,
}

impl RuneBackend {
    pub(crate) fn new() -> Result<RuneBackend, ScriptError> {
        let context = Context::with_default_modules().map_err(context_error)?;
        let runtime = Arc::new(context.runtime().map_err(context_error)?);
        Ok(RuneBackend { context, runtime })
    }

    pub(crate) fn eval(&self, source: &str) -> Result<JsonValue, ScriptError> {
        let unit = self.compile(source)?;
        let mut vm = Vm::new(self.runtime.clone(), unit);
        let output = vm
            .call(rune::Hash::type_hash(["main"]), ())
            .map_err(|e| ScriptError::Runtime {
                language: ScriptLanguage::Rune,
                message: e.to_string(),
            })?;
        rune_to_json(output)
    }

    fn compile(&self, source: &str) -> Result<Arc<Unit>, ScriptError> {
        let wrapped = format!("pub fn main() {{ {source} }}");
        let mut sources = Sources::new();
        sources
            .insert(Source::new("callback", &wrapped).map_err(compile_error)?)
            .map_err(compile_error)?;

        let mut diagnostics = Diagnostics::new();
        let result = rune::prepare(&mut sources)
            .with_context(&self.context)
            .with_diagnostics(&mut diagnostics)
            .build();

        let unit = result.map_err(|e| {
            let detail: Vec<String> = diagnostics
                .diagnostics()
                .iter()
                .map(|d| format!("{d:?}"))
                .collect();
            ScriptError::Compile {
                language: ScriptLanguage::Rune,
                message: format!("{e}; {}", detail.join("; ")),
            }
        })?;
        Ok(Arc::new(unit))
    }
}

fn context_error(e: impl std::fmt::Display) -> ScriptError {
    ScriptError::Runtime {
        language: ScriptLanguage::Rune,
        message: format!("runtime context unavailable: {e}"),
    }
}

fn compile_error(e: impl std::fmt::Display) -> ScriptError {
    ScriptError::Compile {
        language: ScriptLanguage::Rune,
        message: e.to_string(),
    }
}

fn conversion_error(e: impl std::fmt::Display) -> ScriptError {
    ScriptError::Runtime {
        language: ScriptLanguage::Rune,
        message: format!("result conversion failed: {e}"),
    }
}

// Converts a Rune runtime value to JSON by matching on its rendered type
// info: String, i64, f64, bool, unit, Vec, Object and Option map to their
// JSON equivalents, anything else falls back to its debug rendering.
fn rune_to_json(value: Value) -> Result<JsonValue, ScriptError> {
    let type_name = format!("{}", value.type_info());

    if type_name.contains("String") {
        let s: String = rune::from_value(value).map_err(conversion_error)?;
        Ok(JsonValue::String(s))
    } else if type_name == "i64" || type_name.ends_with("::i64") {
        let i: i64 = rune::from_value(value).map_err(conversion_error)?;
        Ok(JsonValue::Number(i.into()))
    } else if type_name == "f64" || type_name.ends_with("::f64") {
        let f: f64 = rune::from_value(value).map_err(conversion_error)?;
        match serde_json::Number::from_f64(f) {
            Some(n) => Ok(JsonValue::Number(n)),
            // NaN and infinity have no JSON form
            None => Ok(JsonValue::Null),
        }
    } else if type_name == "bool" || type_name.ends_with("::bool") {
        let b: bool = rune::from_value(value).map_err(conversion_error)?;
        Ok(JsonValue::Bool(b))
    } else if value.into_unit().is_ok() {
        // rune 0.14 renders the unit type as `::std::tuple::Tuple`, so the
        // inline check is the only way to tell `()` apart from real tuples
        Ok(JsonValue::Null)
    } else if type_name.contains("Vec") {
        let vec: Vec<Value> = rune::from_value(value).map_err(conversion_error)?;
        let arr: Vec<JsonValue> = vec
            .into_iter()
            .map(rune_to_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(JsonValue::Array(arr))
    } else if type_name.contains("Object") || type_name.contains("HashMap") {
        let map: std::collections::HashMap<String, Value> =
            rune::from_value(value).map_err(conversion_error)?;
        let obj: serde_json::Map<String, JsonValue> = map
            .into_iter()
            .map(|(k, v)| Ok((k, rune_to_json(v)?)))
            .collect::<Result<_, ScriptError>>()?;
        Ok(JsonValue::Object(obj))
    } else if type_name.contains("Option") {
        match rune::from_value::<Option<Value>>(value) {
            Ok(Some(inner)) => rune_to_json(inner),
            Ok(None) => Ok(JsonValue::Null),
            Err(_) => Ok(JsonValue::Null),
        }
    } else {
        Ok(JsonValue::String(format!("{value:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> RuneBackend {
        RuneBackend::new().expect("rune context should build")
    }

    #[test]
    fn arithmetic_comes_back_as_a_number() {
        assert_eq!(backend().eval("2 + 3").unwrap(), json!(5));
    }

    #[test]
    fn strings_and_booleans_convert() {
        let backend = backend();
        assert_eq!(backend.eval(r#""stage""#).unwrap(), json!("stage"));
        assert_eq!(backend.eval("1 < 2").unwrap(), json!(true));
    }

    #[test]
    fn unit_and_none_become_null() {
        let backend = backend();
        assert!(backend.eval("()").unwrap().is_null());
        assert!(backend.eval("None").unwrap().is_null());
    }

    #[test]
    fn collections_convert_recursively() {
        let backend = backend();
        assert_eq!(backend.eval("[1, 2, 3]").unwrap(), json!([1, 2, 3]));
        assert_eq!(
            backend.eval(r#"#{ answer: 42 }"#).unwrap(),
            json!({ "answer": 42 })
        );
    }

    #[test]
    fn statements_run_before_the_tail_expression() {
        let result = backend().eval("let total = 0; for i in 0..5 { total += i; } total");
        assert_eq!(result.unwrap(), json!(10));
    }

    #[test]
    fn broken_snippets_report_compile_errors() {
        let err = backend().eval("let = ;").unwrap_err();
        assert!(matches!(err, ScriptError::Compile { .. }));
    }
}

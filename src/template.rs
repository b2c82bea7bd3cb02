use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::context::Context;
use crate::value::Value;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap();
    static ref INDEXED: Regex = Regex::new(r"^(\w+)\[(\d+)\]$").unwrap();
}

/// Substitutes `{{path}}` placeholders in strings against the context.
/// Non-string values pass through unchanged. Each placeholder resolves
/// independently; a missing path renders as the empty string, never an
/// error.
pub fn resolve(value: &Value, ctx: &Context) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_str(s, ctx)),
        other => other.clone(),
    }
}

pub fn resolve_str(input: &str, ctx: &Context) -> String {
    PLACEHOLDER
        .replace_all(input, |caps: &Captures| {
            lookup(&caps[1], ctx)
                .map(|value| value.to_string())
                .unwrap_or_default()
        })
        .into_owned()
}

/// Walks a dotted path with optional single-level index segments
/// (`items[3].price`). Any missing intermediate short-circuits to None.
fn lookup(expr: &str, ctx: &Context) -> Option<Value> {
    let mut current: Option<Value> = None;
    for (i, part) in expr.split('.').enumerate() {
        let (key, index) = match INDEXED.captures(part) {
            Some(caps) => (
                caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
                Some(caps[2].parse::<usize>().ok()?),
            ),
            None => (part, None),
        };
        let keyed = if i == 0 {
            ctx.get(key).cloned()
        } else {
            field(current.as_ref()?, key)
        };
        current = match index {
            Some(idx) => item_at(&keyed?, idx),
            None => keyed,
        };
        current.as_ref()?;
    }
    current
}

fn field(value: &Value, key: &str) -> Option<Value> {
    match value {
        Value::Map(map) => map.get(key).cloned(),
        _ => None,
    }
}

fn item_at(value: &Value, index: usize) -> Option<Value> {
    match value {
        Value::List(items) => items.get(index).cloned(),
        Value::Elements(els) => els.get(index).cloned().map(Value::Element),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::value::Map;

    fn ctx() -> Context {
        Context::from_json(&serde_json::json!({
            "user": {"name": "ada", "tags": ["admin", "ops"]},
            "a": {"b": [42]},
            "count": 3,
            "none": null,
        }))
    }

    #[test]
    fn test_resolves_nested_indexed_path() {
        assert_eq!(resolve_str("{{a.b[0]}}", &ctx()), "42");
        assert_eq!(resolve_str("{{user.tags[1]}}", &ctx()), "ops");
    }

    #[test]
    fn test_missing_path_renders_empty() {
        assert_eq!(resolve_str("{{a.missing.deep}}", &ctx()), "");
        assert_eq!(resolve_str("{{a.b[9]}}", &ctx()), "");
        assert_eq!(resolve_str("[{{nope}}]", &ctx()), "[]");
    }

    #[test]
    fn test_multiple_placeholders_all_substitute() {
        assert_eq!(
            resolve_str("{{user.name}} has {{count}} tags", &ctx()),
            "ada has 3 tags"
        );
    }

    #[test]
    fn test_whitespace_inside_braces() {
        assert_eq!(resolve_str("{{ user.name }}", &ctx()), "ada");
    }

    #[test]
    fn test_explicit_null_renders_as_null() {
        assert_eq!(resolve_str("{{none}}", &ctx()), "null");
    }

    #[test]
    fn test_non_string_passes_through() {
        let value = Value::Number(7.0);
        assert_eq!(resolve(&value, &ctx()), Value::Number(7.0));
        let map = Value::Map(Map::new());
        assert_eq!(resolve(&map, &ctx()), map);
    }

    proptest! {
        #[test]
        fn resolve_never_panics(input in ".*") {
            let _ = resolve_str(&input, &ctx());
        }

        #[test]
        fn placeholder_free_strings_are_unchanged(input in "[^{}]*") {
            prop_assert_eq!(resolve_str(&input, &ctx()), input);
        }
    }
}

use core::fmt;
use std::cmp::Ordering;
use std::sync::Arc;

use indexmap::IndexMap;

pub use crate::host::ElementRef;

/// Insertion-ordered record type. Operation trees arrive as JSON and field
/// order is semantically meaningful (foreach over record entries).
pub type Map = IndexMap<String, Value>;

/// Runtime value domain of the interpreter. JSON trees convert in
/// losslessly (numbers widen to f64); element references come from the
/// host's element tree and never round-trip back to JSON.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(Map),
    Element(ElementRef),
    Elements(Vec<ElementRef>),
}

impl Value {
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Element references are not serializable and become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Element(_) | Value::Elements(_) => serde_json::Value::Null,
            Value::Bool(b) => (*b).into(),
            Value::Number(n) => {
                if *n == n.trunc() && n.abs() < 9e15 {
                    (*n as i64).into()
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::String(s) => s.clone().into(),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Whether this is a record carrying an operation discriminator, i.e.
    /// something the interpreter executes rather than walks.
    pub fn is_op_node(&self) -> bool {
        matches!(self, Value::Map(map)
            if map.contains_key("_op") || map.contains_key("_ops") || map.contains_key("_handler"))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            // Records and element references are always truthy, even empty.
            Value::List(_) | Value::Map(_) | Value::Element(_) | Value::Elements(_) => true,
        }
    }

    /// Number coercion matching the wire language: empty string is zero,
    /// unparsable input is NaN, records only coerce through a single item.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::List(items) => match items.as_slice() {
                [] => 0.0,
                [single] => single.to_number(),
                _ => f64::NAN,
            },
            Value::Map(_) | Value::Element(_) | Value::Elements(_) => f64::NAN,
        }
    }

    /// Loose equality with the wire language's coercion rules: numeric
    /// strings compare to numbers, booleans coerce through numbers,
    /// composites coerce through their string form. Composite-to-composite
    /// comparison is structural (values, not references).
    pub fn loose_eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Null, _) | (_, Null) => false,
            (Bool(a), b) => Number(if *a { 1.0 } else { 0.0 }).loose_eq(b),
            (a, Bool(b)) => a.loose_eq(&Number(if *b { 1.0 } else { 0.0 })),
            (Number(a), Number(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Number(_), String(_)) | (String(_), Number(_)) => {
                self.to_number() == other.to_number()
            }
            (List(_) | Map(_) | Element(_) | Elements(_), String(_) | Number(_)) => {
                String(self.to_string()).loose_eq(other)
            }
            (String(_) | Number(_), List(_) | Map(_) | Element(_) | Elements(_)) => {
                self.loose_eq(&String(other.to_string()))
            }
            _ => self.strict_eq(other),
        }
    }

    /// Strict equality: no coercion, structural for lists and maps,
    /// reference identity for elements.
    pub fn strict_eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Number(a), Number(b)) => a == b,
            (String(a), String(b)) => a == b,
            (List(a), List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_eq(y))
            }
            (Map(a), Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|o| v.strict_eq(o)))
            }
            (Element(a), Element(b)) => Arc::ptr_eq(a, b),
            (Elements(a), Elements(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
            }
            _ => false,
        }
    }

    /// Relational ordering: string-to-string is lexicographic, everything
    /// else coerces to numbers. NaN on either side orders nothing.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if let (Value::String(a), Value::String(b)) = (self, other) {
            return Some(a.cmp(b));
        }
        self.to_number().partial_cmp(&other.to_number())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Element(_) => "element",
            Value::Elements(_) => "elements",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => fmt_number(*n, f),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    // nulls render empty inside a joined list
                    if !matches!(item, Value::Null) {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Value::Map(_) => write!(f, "[object Object]"),
            Value::Element(_) => write!(f, "[element]"),
            Value::Elements(_) => write!(f, "[elements]"),
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        write!(f, "{}", if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == n.trunc() && n.abs() < 9e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Element(_) => write!(f, "Element"),
            Value::Elements(els) => write!(f, "Elements({})", els.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

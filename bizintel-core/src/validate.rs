//! Request schema validation.
//!
//! Each request record declares a static field table. [`parse_request`] walks
//! that table over an untyped JSON body, resolves legacy aliases onto their
//! canonical camelCase names, checks types and ranges, and only then hands the
//! normalised object to serde. Every problem is collected so a caller learns
//! about all missing or mistyped fields in one response.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{FieldIssue, ValidationError};

/// Largest accepted monetary amount. Keeps cent arithmetic exact in `f64`.
pub const MAX_AMOUNT: f64 = 1e15;

/// Accepted JSON shape for a single request field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Any string; a required text field must also be non-blank.
    Text,
    /// Non-negative integer.
    Count,
    /// Number between 0 and [`MAX_AMOUNT`].
    Amount,
    /// Any finite number.
    Number,
    /// Array of strings.
    TextList,
    /// Array of strings or objects; objects collapse to their `description`.
    ItemList,
    /// JSON object.
    Object,
}

impl FieldKind {
    fn expected(self, required: bool) -> &'static str {
        match self {
            FieldKind::Text if required => "non-empty string",
            FieldKind::Text => "string",
            FieldKind::Count => "integer >= 0",
            FieldKind::Amount => "number between 0 and 1e15",
            FieldKind::Number => "number",
            FieldKind::TextList => "array of strings",
            FieldKind::ItemList => "array of strings or objects with a description",
            FieldKind::Object => "object",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, aliases: &'static [&'static str], kind: FieldKind) -> Self {
        Self {
            name,
            aliases,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, aliases: &'static [&'static str], kind: FieldKind) -> Self {
        Self {
            name,
            aliases,
            kind,
            required: false,
        }
    }

    fn accepts_key(&self, key: &str) -> bool {
        self.name == key || self.aliases.contains(&key)
    }
}

/// Implemented by request records that are built from untyped JSON.
pub trait RequestSchema: DeserializeOwned {
    const FIELDS: &'static [FieldSpec];
}

/// Validate `body` against `T::FIELDS` and deserialize it.
pub fn parse_request<T: RequestSchema>(
    body: &Value,
    reject_unknown: bool,
) -> Result<T, ValidationError> {
    let normalized = normalize(body, T::FIELDS, reject_unknown)?;
    serde_json::from_value(Value::Object(normalized))
        .map_err(|e| ValidationError::single("$", e.to_string()))
}

/// Check `body` against `fields`, returning an object keyed by canonical names
/// with nulls dropped and item lists flattened to strings.
pub fn normalize(
    body: &Value,
    fields: &[FieldSpec],
    reject_unknown: bool,
) -> Result<Map<String, Value>, ValidationError> {
    let object = body
        .as_object()
        .ok_or_else(|| ValidationError::single("$", "JSON object"))?;

    let mut issues = Vec::new();
    let mut normalized = Map::new();

    for spec in fields {
        let found = std::iter::once(spec.name)
            .chain(spec.aliases.iter().copied())
            .find_map(|key| object.get(key).filter(|v| !v.is_null()));

        match found {
            None if spec.required => issues.push(FieldIssue::new(
                spec.name,
                format!("required {}", spec.kind.expected(true)),
            )),
            None => {}
            Some(value) => match check_value(value, spec.kind, spec.required) {
                Some(v) => {
                    normalized.insert(spec.name.to_string(), v);
                }
                None => issues.push(FieldIssue::new(spec.name, spec.kind.expected(spec.required))),
            },
        }
    }

    if reject_unknown {
        // serde_json's default map is ordered, so unknown keys come out sorted
        for key in object.keys() {
            if !fields.iter().any(|spec| spec.accepts_key(key)) {
                issues.push(FieldIssue::new(key.as_str(), "not an accepted field"));
            }
        }
    }

    if issues.is_empty() {
        Ok(normalized)
    } else {
        Err(ValidationError { issues })
    }
}

fn check_value(value: &Value, kind: FieldKind, required: bool) -> Option<Value> {
    match kind {
        FieldKind::Text => {
            let s = value.as_str()?;
            if required && s.trim().is_empty() {
                return None;
            }
            Some(value.clone())
        }
        FieldKind::Count => value.as_u64().map(Value::from),
        FieldKind::Amount => value
            .as_f64()
            .filter(|n| n.is_finite() && (0.0..=MAX_AMOUNT).contains(n))
            .map(|_| value.clone()),
        FieldKind::Number => value
            .as_f64()
            .filter(|n| n.is_finite())
            .map(|_| value.clone()),
        FieldKind::TextList => {
            let items = value.as_array()?;
            items
                .iter()
                .all(Value::is_string)
                .then(|| value.clone())
        }
        FieldKind::ItemList => {
            let items = value.as_array()?;
            let flattened = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Some(Value::String(s.clone())),
                    Value::Object(obj) => Some(Value::String(
                        obj.get("description")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| item.to_string()),
                    )),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Some(Value::Array(flattened))
        }
        FieldKind::Object => value.is_object().then(|| value.clone()),
    }
}

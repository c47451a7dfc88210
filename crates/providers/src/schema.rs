//! Field schemas: the authoritative contract for what each access payload
//! and each deploy target's `providerConfig` must contain.
//!
//! A schema is a static slice of [`FieldSpec`]s. [`check_fields`] walks it
//! against a JSON object and returns every violation it finds.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Reason, ValidationError};

/// Shape and bounds of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// A string whose trimmed length (in chars) lies in `min..=max`.
    Text { min: usize, max: usize },
    /// An absolute `http`/`https` URL.
    Url,
    /// A JSON integer in `min..=max`.
    Integer { min: i64, max: i64 },
    /// A string drawn from a fixed set.
    OneOf { allowed: &'static [&'static str] },
    /// A YAML document whose root is a mapping, at most `max` chars.
    Yaml { max: usize },
    /// A JSON boolean.
    Bool,
    /// A JSON object with arbitrary members.
    Object,
}

/// When a field has to be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Presence {
    Required,
    Optional,
    /// Required only while the sibling `field` holds one of `values`.
    RequiredWhen {
        field: &'static str,
        values: &'static [&'static str],
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, presence: Presence::Required }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, presence: Presence::Optional }
    }

    pub const fn required_when(
        name: &'static str,
        kind: FieldKind,
        field: &'static str,
        values: &'static [&'static str],
    ) -> Self {
        Self { name, kind, presence: Presence::RequiredWhen { field, values } }
    }

    fn is_required(&self, object: &Map<String, Value>) -> Option<bool> {
        match self.presence {
            Presence::Required => Some(true),
            Presence::Optional => Some(false),
            Presence::RequiredWhen { field, values } => {
                let current = object.get(field).and_then(Value::as_str).map(str::trim);
                // A field whose trigger does not hold is not checked at all.
                current.filter(|v| values.contains(v)).map(|_| true)
            }
        }
    }
}

/// Bounded credential string, the most common field shape.
pub const KEY: FieldKind = FieldKind::Text { min: 1, max: 64 };
/// Optional bounded string.
pub const OPT_KEY: FieldKind = FieldKind::Text { min: 0, max: 64 };
/// Free-form identifier on a deploy target.
pub const IDENT: FieldKind = FieldKind::Text { min: 1, max: 256 };
/// File system path on a deploy target.
pub const PATH: FieldKind = FieldKind::Text { min: 1, max: 256 };
/// Shell snippet run around a deployment.
pub const COMMAND: FieldKind = FieldKind::Text { min: 0, max: 20480 };
/// PEM blob or kubeconfig sized payload.
pub const BLOB: FieldKind = FieldKind::Text { min: 0, max: 20480 };
/// TCP port.
pub const PORT: FieldKind = FieldKind::Integer { min: 1, max: 65535 };

/// Check `config` against `specs`, collecting every violation.
///
/// `null` is treated as an empty object. Keys that no spec names are ignored.
pub fn check_fields(config: &Value, specs: &[FieldSpec]) -> Vec<ValidationError> {
    let empty = Map::new();
    let object = match config {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => {
            return vec![ValidationError::new(
                "config",
                Reason::WrongType { expected: "object".into() },
            )]
        }
    };

    let mut errors = Vec::new();
    for spec in specs {
        let Some(required) = spec.is_required(object) else {
            continue;
        };
        match object.get(spec.name) {
            None | Some(Value::Null) => {
                if required {
                    errors.push(ValidationError::missing(spec.name));
                }
            }
            Some(Value::String(s)) if s.trim().is_empty() && !required => {}
            Some(value) => {
                if let Err(reason) = check_value(value, &spec.kind) {
                    errors.push(ValidationError::new(spec.name, reason));
                }
            }
        }
    }
    errors
}

/// Check one value against a field kind.
pub fn check_value(value: &Value, kind: &FieldKind) -> Result<(), Reason> {
    match *kind {
        FieldKind::Text { min, max } => {
            let len = as_text(value)?.trim().chars().count();
            if len < min {
                Err(Reason::TooShort { min })
            } else if len > max {
                Err(Reason::TooLong { max })
            } else {
                Ok(())
            }
        }
        FieldKind::Url => {
            let text = as_text(value)?.trim();
            let parsed = url::Url::parse(text)
                .map_err(|e| Reason::InvalidFormat { message: e.to_string() })?;
            match parsed.scheme() {
                "http" | "https" => Ok(()),
                other => Err(Reason::InvalidFormat {
                    message: format!("unsupported scheme '{other}'"),
                }),
            }
        }
        FieldKind::Integer { min, max } => {
            let n = value.as_i64().ok_or_else(|| Reason::WrongType {
                expected: "integer".into(),
            })?;
            if (min..=max).contains(&n) {
                Ok(())
            } else {
                Err(Reason::OutOfRange { min, max })
            }
        }
        FieldKind::OneOf { allowed } => {
            // Compared untrimmed.
            let text = as_text(value)?;
            if allowed.contains(&text) {
                Ok(())
            } else {
                Err(Reason::NotOneOf {
                    allowed: allowed.iter().map(|s| s.to_string()).collect(),
                })
            }
        }
        FieldKind::Yaml { max } => {
            let text = as_text(value)?;
            if text.chars().count() > max {
                return Err(Reason::TooLong { max });
            }
            let doc: serde_yaml::Value = serde_yaml::from_str(text)
                .map_err(|e| Reason::InvalidFormat { message: e.to_string() })?;
            if doc.is_mapping() {
                Ok(())
            } else {
                Err(Reason::InvalidFormat {
                    message: "document root must be a mapping".into(),
                })
            }
        }
        FieldKind::Bool => match value {
            Value::Bool(_) => Ok(()),
            _ => Err(Reason::WrongType { expected: "boolean".into() }),
        },
        FieldKind::Object => match value {
            Value::Object(_) => Ok(()),
            _ => Err(Reason::WrongType { expected: "object".into() }),
        },
    }
}

fn as_text(value: &Value) -> Result<&str, Reason> {
    value.as_str().ok_or_else(|| Reason::WrongType { expected: "string".into() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPECS: &[FieldSpec] = &[
        FieldSpec::required("accessKey", KEY),
        FieldSpec::optional("region", OPT_KEY),
        FieldSpec::required("mode", FieldKind::OneOf { allowed: &["a", "b"] }),
        FieldSpec::required_when("listenerId", IDENT, "mode", &["b"]),
    ];

    #[test]
    fn collects_every_violation() {
        let errors = check_fields(&json!({ "accessKey": "", "mode": "c" }), SPECS);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "accessKey");
        assert_eq!(errors[0].reason, Reason::TooShort { min: 1 });
        assert_eq!(errors[1].field, "mode");
    }

    #[test]
    fn conditional_field_follows_its_trigger() {
        let ok = check_fields(&json!({ "accessKey": "k", "mode": "a" }), SPECS);
        assert!(ok.is_empty());

        let errors = check_fields(&json!({ "accessKey": "k", "mode": "b" }), SPECS);
        assert_eq!(errors, vec![ValidationError::missing("listenerId")]);
    }

    #[test]
    fn padded_choice_is_not_one_of_the_allowed_values() {
        let errors = check_fields(&json!({ "accessKey": "k", "mode": " a" }), SPECS);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "mode");
        assert!(matches!(errors[0].reason, Reason::NotOneOf { .. }));
    }

    #[test]
    fn blank_optional_field_is_accepted() {
        let errors = check_fields(&json!({ "accessKey": "k", "mode": "a", "region": "  " }), SPECS);
        assert!(errors.is_empty());
    }

    #[test]
    fn over_long_value_is_rejected() {
        let long = "x".repeat(65);
        let errors = check_fields(&json!({ "accessKey": long, "mode": "a" }), SPECS);
        assert_eq!(errors[0].reason, Reason::TooLong { max: 64 });
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let errors = check_fields(&json!(["not", "an", "object"]), SPECS);
        assert_eq!(errors[0].field, "config");
    }

    #[test]
    fn yaml_must_be_a_mapping() {
        let kind = FieldKind::Yaml { max: 100 };
        assert!(check_value(&json!("apiVersion: v1\nkind: Config\n"), &kind).is_ok());
        assert!(check_value(&json!("- just\n- a list\n"), &kind).is_err());
        assert!(check_value(&json!("key: [unterminated"), &kind).is_err());
    }

    #[test]
    fn bool_and_object_check_json_type() {
        assert!(check_value(&json!(true), &FieldKind::Bool).is_ok());
        assert_eq!(
            check_value(&json!("true"), &FieldKind::Bool),
            Err(Reason::WrongType { expected: "boolean".into() })
        );
        assert!(check_value(&json!({ "k": 1 }), &FieldKind::Object).is_ok());
        assert!(check_value(&json!([]), &FieldKind::Object).is_err());
    }

    #[test]
    fn url_requires_http_scheme() {
        assert!(check_value(&json!("https://example.com/hook"), &FieldKind::Url).is_ok());
        assert!(check_value(&json!("ftp://example.com"), &FieldKind::Url).is_err());
        assert!(check_value(&json!("not a url"), &FieldKind::Url).is_err());
    }
}

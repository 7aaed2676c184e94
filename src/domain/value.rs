//! RDF-style values: references, literals, and inline nested records.
//!
//! Every value carries a canonical string form. The wire representation is an
//! object with a `type` tag (`id`, `lid`, or `lit`), a `v` payload, and
//! optional `dt`/`lang` annotations; a nested record is discriminated by the
//! presence of the reserved `_id` marker instead of a `type` tag.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::deep::DeepRecord;

/// Datatype IRI attached to integer literals on the wire.
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";

/// Reference to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Id {
    /// Absolute-IRI-backed reference with stable global identity.
    Global(String),
    /// Blank-node style reference, scoped to the document it appears in.
    Local(String),
}

impl Id {
    pub fn as_str(&self) -> &str {
        match self {
            Id::Global(iri) => iri,
            Id::Local(name) => name,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Id::Local(_))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single property value of a resource.
///
/// `Nested` only occurs in the transport (deep) shape; the flattener rewrites
/// it to an `Id` reference before storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireValue", try_from = "WireValue")]
pub enum Value {
    Id(Id),
    Str(String),
    LangString { value: String, lang: String },
    Int(i64),
    Nested(DeepRecord),
}

impl Value {
    pub fn global(iri: impl Into<String>) -> Self {
        Value::Id(Id::Global(iri.into()))
    }

    pub fn local(name: impl Into<String>) -> Self {
        Value::Id(Id::Local(name.into()))
    }

    pub fn lang_string(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Value::LangString {
            value: value.into(),
            lang: lang.into(),
        }
    }

    /// Canonical string form. A nested record answers with its own id.
    pub fn as_str(&self) -> String {
        match self {
            Value::Id(id) => id.as_str().to_owned(),
            Value::Str(value) => value.clone(),
            Value::LangString { value, .. } => value.clone(),
            Value::Int(value) => value.to_string(),
            Value::Nested(record) => record.id().as_str().to_owned(),
        }
    }

    /// Consumers that require meaningful content skip empty-string values.
    pub fn is_meaningful(&self) -> bool {
        match self {
            Value::Str(value) | Value::LangString { value, .. } => !value.is_empty(),
            Value::Id(id) => !id.as_str().is_empty(),
            Value::Int(_) => true,
            Value::Nested(_) => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WireValue {
    Nested(DeepRecord),
    Literal(WireLiteral),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireLiteral {
    #[serde(rename = "type")]
    kind: WireKind,
    v: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lang: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum WireKind {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "lid")]
    Lid,
    #[serde(rename = "lit")]
    Lit,
}

impl WireLiteral {
    fn tagged(kind: WireKind, v: String) -> Self {
        Self {
            kind,
            v,
            dt: None,
            lang: None,
        }
    }
}

impl From<Value> for WireValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Id(Id::Global(iri)) => WireValue::Literal(WireLiteral::tagged(WireKind::Id, iri)),
            Value::Id(Id::Local(name)) => {
                WireValue::Literal(WireLiteral::tagged(WireKind::Lid, name))
            }
            Value::Str(v) => WireValue::Literal(WireLiteral::tagged(WireKind::Lit, v)),
            Value::LangString { value, lang } => WireValue::Literal(WireLiteral {
                kind: WireKind::Lit,
                v: value,
                dt: None,
                lang: Some(lang),
            }),
            Value::Int(n) => WireValue::Literal(WireLiteral {
                kind: WireKind::Lit,
                v: n.to_string(),
                dt: Some(XSD_INTEGER.to_owned()),
                lang: None,
            }),
            Value::Nested(record) => WireValue::Nested(record),
        }
    }
}

impl TryFrom<WireValue> for Value {
    type Error = String;

    fn try_from(wire: WireValue) -> Result<Self, Self::Error> {
        let literal = match wire {
            WireValue::Nested(record) => return Ok(Value::Nested(record)),
            WireValue::Literal(literal) => literal,
        };

        match literal.kind {
            WireKind::Id => Ok(Value::Id(Id::Global(literal.v))),
            WireKind::Lid => Ok(Value::Id(Id::Local(literal.v))),
            WireKind::Lit => {
                if let Some(lang) = literal.lang.filter(|lang| !lang.is_empty()) {
                    return Ok(Value::LangString {
                        value: literal.v,
                        lang,
                    });
                }
                match literal.dt.as_deref() {
                    Some(XSD_INTEGER) => literal
                        .v
                        .parse::<i64>()
                        .map(Value::Int)
                        .map_err(|err| format!("invalid integer literal `{}`: {err}", literal.v)),
                    // Unknown datatypes keep their canonical string form.
                    _ => Ok(Value::Str(literal.v)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_id_wire_shape() {
        let value = Value::global("https://example.com/resource/1");
        let json = serde_json::to_value(&value).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({"type": "id", "v": "https://example.com/resource/1"})
        );
    }

    #[test]
    fn local_id_wire_shape() {
        let value = Value::local("_:b1");
        let json = serde_json::to_value(&value).expect("serializable");
        assert_eq!(json, serde_json::json!({"type": "lid", "v": "_:b1"}));
    }

    #[test]
    fn lang_string_round_trip() {
        let value = Value::lang_string("Voorpagina", "nl");
        let json = serde_json::to_value(&value).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({"type": "lit", "v": "Voorpagina", "lang": "nl"})
        );

        let back: Value = serde_json::from_value(json).expect("deserializable");
        assert_eq!(back, value);
    }

    #[test]
    fn integer_carries_datatype() {
        let value = Value::Int(42);
        let json = serde_json::to_value(&value).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({"type": "lit", "v": "42", "dt": XSD_INTEGER})
        );

        let back: Value = serde_json::from_value(json).expect("deserializable");
        assert_eq!(back, Value::Int(42));
    }

    #[test]
    fn unknown_datatype_falls_back_to_string() {
        let json = serde_json::json!({
            "type": "lit",
            "v": "2024-01-01",
            "dt": "http://www.w3.org/2001/XMLSchema#date"
        });
        let value: Value = serde_json::from_value(json).expect("deserializable");
        assert_eq!(value, Value::Str("2024-01-01".to_owned()));
    }

    #[test]
    fn malformed_integer_is_rejected() {
        let json = serde_json::json!({"type": "lit", "v": "forty-two", "dt": XSD_INTEGER});
        assert!(serde_json::from_value::<Value>(json).is_err());
    }

    #[test]
    fn meaningful_filters_empty_strings() {
        assert!(!Value::Str(String::new()).is_meaningful());
        assert!(!Value::lang_string("", "en").is_meaningful());
        assert!(Value::Str("x".to_owned()).is_meaningful());
        assert!(Value::Int(0).is_meaningful());
    }
}

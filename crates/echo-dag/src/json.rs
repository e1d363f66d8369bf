// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON bridge for authoring and displaying nodes.
//!
//! Links are written `{"/": "<cid>"}` and bytes `{"/": {"bytes": "<hex>"}}`,
//! following the dag-json conventions.

use serde_json::{json, Map, Number, Value};

use crate::codec::DecodeError;
use crate::fs::FsNode;
use crate::node::{Link, Node};

fn shape(reason: impl Into<String>) -> DecodeError {
    DecodeError::Shape {
        codec: "json",
        reason: reason.into(),
    }
}

impl Node {
    /// Convert a JSON document into a node.
    pub fn from_json(value: &Value) -> Result<Self, DecodeError> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i128::from(i))
                } else if let Some(u) = n.as_u64() {
                    Self::Integer(i128::from(u))
                } else {
                    Self::Float(n.as_f64().ok_or_else(|| shape("unrepresentable number"))?)
                }
            }
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::List(
                items
                    .iter()
                    .map(Self::from_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Value::Object(fields) => match (fields.len(), fields.get("/")) {
                (1, Some(Value::String(text))) => Self::Link(Link::Cid(
                    text.parse().map_err(|e| shape(format!("bad link {text:?}: {e}")))?,
                )),
                (1, Some(Value::Object(inner))) => match inner.get("bytes") {
                    Some(Value::String(h)) => {
                        Self::Bytes(hex::decode(h).map_err(|e| shape(e.to_string()))?)
                    }
                    _ => return Err(shape("reserved key \"/\" needs a cid or bytes")),
                },
                _ => Self::Map(
                    fields
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), Self::from_json(v)?)))
                        .collect::<Result<_, DecodeError>>()?,
                ),
            },
        })
    }

    /// Render the node as JSON for display.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => i64::try_from(*i).map_or_else(
                |_| Value::String(i.to_string()),
                |small| Value::Number(small.into()),
            ),
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::String(s) => Value::String(s.clone()),
            Self::Bytes(b) => bytes_json(b),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Self::Link(link) => json!({ "/": link.to_string() }),
            Self::Fs(fs) => fs_json(fs),
        }
    }
}

fn bytes_json(bytes: &[u8]) -> Value {
    json!({ "/": { "bytes": hex::encode(bytes) } })
}

fn fs_json(fs: &FsNode) -> Value {
    let links: Vec<Value> = fs
        .links()
        .iter()
        .map(|l| json!({ "Name": l.name, "Hash": { "/": l.cid.to_string() }, "Tsize": l.size }))
        .collect();
    json!({ "Data": bytes_json(fs.data()), "Links": links })
}

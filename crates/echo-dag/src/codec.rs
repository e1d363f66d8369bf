// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Block codecs.
//!
//! * `dag-cbor` (0x71): CBOR with links as tag 42 over `0x00 || cid bytes`.
//! * `dag-fs` (0x70): CBOR map
//!   `{"Data": bytes, "Links": [{"Name": text, "Hash": tag42, "Tsize": uint}]}`.
//! * `raw` (0x55) and anything unrecognized: a single bytes node.
//!
//! Which shape a block decodes into is picked by a [`Prototype`]: the generic
//! shape mirrors the encoded data model, the file/directory shape reinterprets
//! `dag-fs` blocks as [`FsNode`]s.

use std::collections::BTreeMap;

use ciborium::value::{Integer, Value};
use echo_cas::cid::{DAG_CBOR, DAG_FS};
use echo_cas::Cid;

use crate::fs::{FsLink, FsNode};
use crate::node::{Link, Node};

/// CBOR tag for content-identifier links.
const CID_TAG: u64 = 42;

/// Node shape to decode a block into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Prototype {
    /// Generic data-model shape for any codec.
    #[default]
    Any,
    /// File/directory shape; falls back to [`Prototype::Any`] for codecs
    /// other than `dag-fs`.
    Fs,
}

/// Errors raised while encoding or decoding blocks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Bytes are not valid CBOR.
    #[error("cbor error: {0}")]
    Cbor(String),
    /// CBOR is valid but does not fit the codec's data model.
    #[error("malformed {codec} block: {reason}")]
    Shape {
        /// Codec name.
        codec: &'static str,
        /// What was wrong.
        reason: String,
    },
}

fn shape(codec: &'static str, reason: impl Into<String>) -> DecodeError {
    DecodeError::Shape {
        codec,
        reason: reason.into(),
    }
}

/// Decode `bytes` (named by `cid`) into the requested shape.
pub fn decode(prototype: Prototype, cid: &Cid, bytes: &[u8]) -> Result<Node, DecodeError> {
    match (prototype, cid.codec()) {
        (Prototype::Fs, DAG_FS) => decode_fs(bytes).map(Node::Fs),
        (_, DAG_CBOR | DAG_FS) => decode_cbor(bytes),
        _ => Ok(Node::Bytes(bytes.to_vec())),
    }
}

/// Encode a node as a `dag-cbor` block.
pub fn encode_cbor(node: &Node) -> Result<Vec<u8>, DecodeError> {
    let value = node_to_value(node)?;
    write_value(&value)
}

/// Decode a `dag-cbor` block (or a `dag-fs` block in its generic shape).
pub fn decode_cbor(bytes: &[u8]) -> Result<Node, DecodeError> {
    value_to_node(read_value(bytes)?)
}

/// Encode a file/directory node as a `dag-fs` block.
pub fn encode_fs(node: &FsNode) -> Result<Vec<u8>, DecodeError> {
    write_value(&fs_to_value(node))
}

/// Decode a `dag-fs` block into the file/directory shape.
pub fn decode_fs(bytes: &[u8]) -> Result<FsNode, DecodeError> {
    let Value::Map(fields) = read_value(bytes)? else {
        return Err(shape("dag-fs", "top level is not a map"));
    };
    let mut data = Vec::new();
    let mut links = Vec::new();
    for (key, value) in fields {
        match (key.as_text(), value) {
            (Some("Data"), Value::Bytes(b)) => data = b,
            (Some("Links"), Value::Array(items)) => {
                for item in items {
                    links.push(fs_link_from_value(item)?);
                }
            }
            (Some("Data" | "Links"), _) => {
                return Err(shape("dag-fs", "Data must be bytes and Links a list"))
            }
            _ => {}
        }
    }
    Ok(FsNode::new(data, links))
}

fn fs_link_from_value(value: Value) -> Result<FsLink, DecodeError> {
    let Value::Map(fields) = value else {
        return Err(shape("dag-fs", "link is not a map"));
    };
    let mut name = String::new();
    let mut cid = None;
    let mut size = 0u64;
    for (key, value) in fields {
        match (key.as_text(), value) {
            (Some("Name"), Value::Text(t)) => name = t,
            (Some("Hash"), Value::Tag(CID_TAG, inner)) => match link_from_tagged(*inner)? {
                Link::Cid(c) => cid = Some(c),
                Link::Unsupported(_) => return Err(shape("dag-fs", "link hash is not a cid")),
            },
            (Some("Tsize"), Value::Integer(i)) => {
                size = u64::try_from(i).map_err(|_| shape("dag-fs", "Tsize out of range"))?;
            }
            _ => {}
        }
    }
    let cid = cid.ok_or_else(|| shape("dag-fs", "link without Hash"))?;
    Ok(FsLink { name, cid, size })
}

fn fs_to_value(node: &FsNode) -> Value {
    let links = node
        .links()
        .iter()
        .map(|l| {
            Value::Map(vec![
                (Value::Text("Hash".into()), cid_to_value(&l.cid)),
                (Value::Text("Name".into()), Value::Text(l.name.clone())),
                (Value::Text("Tsize".into()), Value::Integer(Integer::from(l.size))),
            ])
        })
        .collect();
    Value::Map(vec![
        (Value::Text("Data".into()), Value::Bytes(node.data().to_vec())),
        (Value::Text("Links".into()), Value::Array(links)),
    ])
}

fn cid_to_value(cid: &Cid) -> Value {
    tagged_link(cid.to_bytes())
}

fn tagged_link(raw: Vec<u8>) -> Value {
    // multibase identity prefix required by dag-cbor
    let mut bytes = Vec::with_capacity(raw.len() + 1);
    bytes.push(0x00);
    bytes.extend(raw);
    Value::Tag(CID_TAG, Box::new(Value::Bytes(bytes)))
}

fn link_from_tagged(inner: Value) -> Result<Link, DecodeError> {
    let Value::Bytes(bytes) = inner else {
        return Err(shape("dag-cbor", "tag 42 must wrap bytes"));
    };
    match bytes.split_first() {
        Some((0x00, raw)) => Ok(Cid::from_bytes(raw).map_or_else(
            |_| Link::Unsupported(raw.to_vec()),
            Link::Cid,
        )),
        _ => Err(shape("dag-cbor", "tag 42 bytes must start with 0x00")),
    }
}

fn node_to_value(node: &Node) -> Result<Value, DecodeError> {
    Ok(match node {
        Node::Null => Value::Null,
        Node::Bool(b) => Value::Bool(*b),
        Node::Integer(i) => Value::Integer(
            Integer::try_from(*i).map_err(|_| shape("dag-cbor", "integer out of range"))?,
        ),
        Node::Float(f) => Value::Float(*f),
        Node::String(s) => Value::Text(s.clone()),
        Node::Bytes(b) => Value::Bytes(b.clone()),
        Node::List(items) => Value::Array(
            items
                .iter()
                .map(node_to_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Node::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| Ok((Value::Text(k.clone()), node_to_value(v)?)))
                .collect::<Result<Vec<_>, DecodeError>>()?,
        ),
        Node::Link(Link::Cid(cid)) => cid_to_value(cid),
        Node::Link(Link::Unsupported(raw)) => tagged_link(raw.clone()),
        Node::Fs(fs) => fs_to_value(fs),
    })
}

fn value_to_node(value: Value) -> Result<Node, DecodeError> {
    Ok(match value {
        Value::Null => Node::Null,
        Value::Bool(b) => Node::Bool(b),
        Value::Integer(i) => Node::Integer(i128::from(i)),
        Value::Float(f) => Node::Float(f),
        Value::Text(s) => Node::String(s),
        Value::Bytes(b) => Node::Bytes(b),
        Value::Array(items) => Node::List(
            items
                .into_iter()
                .map(value_to_node)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Map(fields) => {
            let mut entries = BTreeMap::new();
            for (key, value) in fields {
                let Value::Text(key) = key else {
                    return Err(shape("dag-cbor", "map keys must be strings"));
                };
                entries.insert(key, value_to_node(value)?);
            }
            Node::Map(entries)
        }
        Value::Tag(CID_TAG, inner) => Node::Link(link_from_tagged(*inner)?),
        Value::Tag(tag, _) => return Err(shape("dag-cbor", format!("unsupported tag {tag}"))),
        _ => return Err(shape("dag-cbor", "unsupported cbor value")),
    })
}

fn write_value(value: &Value) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|e| DecodeError::Cbor(e.to_string()))?;
    Ok(out)
}

fn read_value(bytes: &[u8]) -> Result<Value, DecodeError> {
    ciborium::de::from_reader(bytes).map_err(|e| DecodeError::Cbor(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use echo_cas::cid::RAW;

    #[test]
    fn cbor_links_survive_encoding() {
        let target = Cid::of(DAG_CBOR, b"target");
        let node = Node::map([
            ("name", Node::string("x")),
            ("next", Node::link(target)),
            ("list", Node::List(vec![Node::Integer(-3), Node::Null])),
        ]);
        let bytes = encode_cbor(&node).unwrap();
        let cid = Cid::of(DAG_CBOR, &bytes);
        let decoded = decode(Prototype::Any, &cid, &bytes).unwrap();
        assert_eq!(decoded, node);
        assert_eq!(
            decoded.lookup_by_name("next").unwrap().as_link().unwrap(),
            &Link::Cid(target)
        );
    }

    #[test]
    fn foreign_link_payload_is_kept_as_unsupported() {
        let node = Node::map([("odd", Node::Link(Link::Unsupported(vec![0x12, 0x20, 0x01])))]);
        let bytes = encode_cbor(&node).unwrap();
        let decoded = decode_cbor(&bytes).unwrap();
        assert!(matches!(
            decoded.lookup_by_name("odd").unwrap(),
            Node::Link(Link::Unsupported(_))
        ));
    }

    #[test]
    fn fs_block_decodes_per_prototype() {
        let child = Cid::of(DAG_FS, b"child");
        let fs = FsNode::new(b"payload".to_vec(), vec![FsLink::entry("child", child, 10)]);
        let bytes = encode_fs(&fs).unwrap();
        let cid = Cid::of(DAG_FS, &bytes);

        let special = decode(Prototype::Fs, &cid, &bytes).unwrap();
        assert_eq!(special, Node::Fs(fs));
        assert_eq!(special.lookup_by_name("child").unwrap(), Node::link(child));

        // generic shape only exposes the raw Data/Links structure
        let generic = decode(Prototype::Any, &cid, &bytes).unwrap();
        assert!(generic.lookup_by_name("child").is_err());
        let first = generic
            .lookup_by_name("Links")
            .and_then(|l| l.lookup_by_name("0"))
            .unwrap();
        assert_eq!(first.lookup_by_name("Name").unwrap(), Node::string("child"));
    }

    #[test]
    fn fs_prototype_falls_back_for_other_codecs() {
        let bytes = encode_cbor(&Node::map([("a", Node::Bool(true))])).unwrap();
        let cid = Cid::of(DAG_CBOR, &bytes);
        let node = decode(Prototype::Fs, &cid, &bytes).unwrap();
        assert_eq!(node.lookup_by_name("a").unwrap(), Node::Bool(true));
    }

    #[test]
    fn raw_blocks_are_bytes() {
        let cid = Cid::of(RAW, b"\x00\x01");
        assert_eq!(
            decode(Prototype::Any, &cid, b"\x00\x01").unwrap(),
            Node::Bytes(vec![0, 1])
        );
    }

    #[test]
    fn non_string_map_keys_are_rejected() {
        let value = Value::Map(vec![(Value::Integer(1.into()), Value::Null)]);
        let bytes = write_value(&value).unwrap();
        assert!(matches!(
            decode_cbor(&bytes),
            Err(DecodeError::Shape { .. })
        ));
    }

    #[test]
    fn garbage_is_a_cbor_error() {
        assert!(matches!(decode_cbor(&[0xff, 0x00]), Err(DecodeError::Cbor(_))));
    }
}

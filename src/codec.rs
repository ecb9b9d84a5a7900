//! Wire framing for the three message types (§4.1). A frame is a UTF-8 text
//! payload of at most [`MAX_DATAGRAM_BYTES`] bytes, fields newline-separated,
//! modeled as one tagged [`Frame`] enum rather than three parallel code
//! paths (§9, "tagged messages").

use std::collections::BTreeMap;

use serde_json::{Map, Value};

pub const MAX_DATAGRAM_BYTES: usize = 2048;

/// The infinity wire token (§9): a dedicated JSON string rather than a
/// sentinel integer, since `serde_json` cannot round-trip `Infinity` as a
/// JSON number and a string token is unambiguous against any real cost.
const INFINITY_TOKEN: &str = "Infinity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvCost {
    Finite(u32),
    Infinite,
}

impl AdvCost {
    pub fn as_finite(self) -> Option<u32> {
        match self {
            AdvCost::Finite(c) => Some(c),
            AdvCost::Infinite => None,
        }
    }
}

/// A destination's advertised (cost, next_hop) as carried in a TAB frame.
pub type DistanceVector = BTreeMap<u16, (AdvCost, u16)>;

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Tab(DistanceVector),
    Lsa {
        origin: u16,
        neighbors: BTreeMap<u16, u32>,
        seq: f64,
    },
    Cos {
        cost: u32,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("frame exceeds the {MAX_DATAGRAM_BYTES} byte datagram limit")]
    TooLarge,
    #[error("payload is not valid utf-8")]
    NotUtf8,
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("malformed {0} frame")]
    Malformed(&'static str),
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let text = match frame {
        Frame::Tab(vector) => format!("TAB\n{}", encode_distance_vector(vector)),
        Frame::Lsa {
            origin,
            neighbors,
            seq,
        } => format!(
            "LSA\n{}\n{}\n{}",
            origin,
            encode_neighbor_map(neighbors),
            seq
        ),
        Frame::Cos { cost } => format!("COS\n{cost}"),
    };
    text.into_bytes()
}

pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    if bytes.len() > MAX_DATAGRAM_BYTES {
        return Err(CodecError::TooLarge);
    }
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::NotUtf8)?;
    let text = text.strip_suffix('\n').unwrap_or(text);
    let mut parts = text.split('\n');

    match parts.next() {
        Some("TAB") => {
            let json_part = parts.next().ok_or(CodecError::Malformed("TAB"))?;
            let value: Value = serde_json::from_str(json_part)?;
            let vector = decode_distance_vector(&value).ok_or(CodecError::Malformed("TAB"))?;
            Ok(Frame::Tab(vector))
        }
        Some("LSA") => {
            let origin: u16 = parts
                .next()
                .ok_or(CodecError::Malformed("LSA"))?
                .parse()
                .map_err(|_| CodecError::Malformed("LSA"))?;
            let json_part = parts.next().ok_or(CodecError::Malformed("LSA"))?;
            let value: Value = serde_json::from_str(json_part)?;
            let neighbors = decode_neighbor_map(&value).ok_or(CodecError::Malformed("LSA"))?;
            let seq: f64 = parts
                .next()
                .ok_or(CodecError::Malformed("LSA"))?
                .parse()
                .map_err(|_| CodecError::Malformed("LSA"))?;
            Ok(Frame::Lsa {
                origin,
                neighbors,
                seq,
            })
        }
        Some("COS") => {
            let cost: u32 = parts
                .next()
                .ok_or(CodecError::Malformed("COS"))?
                .parse()
                .map_err(|_| CodecError::Malformed("COS"))?;
            Ok(Frame::Cos { cost })
        }
        Some(other) => Err(CodecError::UnknownType(other.to_string())),
        None => Err(CodecError::Malformed("empty")),
    }
}

fn encode_distance_vector(table: &DistanceVector) -> Value {
    let mut obj = Map::new();
    for (&dest, &(cost, next_hop)) in table {
        let cost_value = match cost {
            AdvCost::Finite(c) => Value::from(c),
            AdvCost::Infinite => Value::String(INFINITY_TOKEN.to_string()),
        };
        obj.insert(
            dest.to_string(),
            Value::Array(vec![cost_value, Value::from(next_hop)]),
        );
    }
    Value::Object(obj)
}

fn decode_distance_vector(value: &Value) -> Option<DistanceVector> {
    let obj = value.as_object()?;
    let mut out = BTreeMap::new();
    for (k, v) in obj {
        let dest: u16 = k.parse().ok()?;
        let arr = v.as_array()?;
        if arr.len() != 2 {
            return None;
        }
        let cost = match &arr[0] {
            Value::Number(n) => AdvCost::Finite(n.as_u64()? as u32),
            Value::String(s) if s == INFINITY_TOKEN => AdvCost::Infinite,
            _ => return None,
        };
        let next_hop = arr[1].as_u64()? as u16;
        out.insert(dest, (cost, next_hop));
    }
    Some(out)
}

fn encode_neighbor_map(neighbors: &BTreeMap<u16, u32>) -> Value {
    let obj: Map<String, Value> = neighbors
        .iter()
        .map(|(&p, &c)| (p.to_string(), Value::from(c)))
        .collect();
    Value::Object(obj)
}

fn decode_neighbor_map(value: &Value) -> Option<BTreeMap<u16, u32>> {
    let obj = value.as_object()?;
    let mut out = BTreeMap::new();
    for (k, v) in obj {
        let port: u16 = k.parse().ok()?;
        let cost = v.as_u64()? as u32;
        out.insert(port, cost);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_roundtrips_finite_and_infinite_costs() {
        let mut vector = DistanceVector::new();
        vector.insert(2001, (AdvCost::Finite(3), 2001));
        vector.insert(2002, (AdvCost::Infinite, 2001));
        let frame = Frame::Tab(vector.clone());

        let encoded = encode_frame(&frame);
        let text = std::str::from_utf8(&encoded).unwrap();
        assert!(text.starts_with("TAB\n"));

        let decoded = decode_frame(&encoded).unwrap();
        assert_eq!(decoded, Frame::Tab(vector));
    }

    #[test]
    fn tab_tolerates_one_trailing_newline() {
        let mut bytes = encode_frame(&Frame::Tab(DistanceVector::new()));
        bytes.push(b'\n');
        let decoded = decode_frame(&bytes).unwrap();
        assert_eq!(decoded, Frame::Tab(DistanceVector::new()));
    }

    #[test]
    fn lsa_roundtrips() {
        let mut neighbors = BTreeMap::new();
        neighbors.insert(2000, 1);
        neighbors.insert(2002, 4);
        let frame = Frame::Lsa {
            origin: 2001,
            neighbors: neighbors.clone(),
            seq: 1700000000.123,
        };
        let encoded = encode_frame(&frame);
        let decoded = decode_frame(&encoded).unwrap();
        assert_eq!(
            decoded,
            Frame::Lsa {
                origin: 2001,
                neighbors,
                seq: 1700000000.123
            }
        );
    }

    #[test]
    fn cos_roundtrips() {
        let frame = Frame::Cos { cost: 10 };
        let encoded = encode_frame(&frame);
        assert_eq!(std::str::from_utf8(&encoded).unwrap(), "COS\n10");
        assert_eq!(decode_frame(&encoded).unwrap(), frame);
    }

    #[test]
    fn unknown_type_is_reported_not_panicked() {
        let err = decode_frame(b"BOGUS\nstuff").unwrap_err();
        assert!(matches!(err, CodecError::UnknownType(ref s) if s == "BOGUS"));
    }

    #[test]
    fn oversize_payload_is_rejected() {
        let huge = vec![b'a'; MAX_DATAGRAM_BYTES + 1];
        assert!(matches!(decode_frame(&huge), Err(CodecError::TooLarge)));
    }

    #[test]
    fn malformed_cos_is_reported() {
        let err = decode_frame(b"COS\nnot-a-number").unwrap_err();
        assert!(matches!(err, CodecError::Malformed("COS")));
    }
}

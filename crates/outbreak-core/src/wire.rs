//! Fixed-width wire formats for node/edge records and the remote-action
//! byte stream (§6). These are hand-rolled little-endian layouts, not a
//! general-purpose serde framing, because the format is a cross-language
//! contract shared with non-Rust producers/consumers.

use crate::error::{CoreError, Result};
use crate::value::TraitBits;

pub const NODE_RECORD_LEN: usize = 56;
/// Edge records are 56 bytes without a location id, 64 with one; the
/// build-time flag is fixed per deployment (§6).
pub const EDGE_RECORD_LEN_NO_LOCATION: usize = 56;
pub const EDGE_RECORD_LEN_WITH_LOCATION: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: u64,
    pub state_index: u32,
    pub susceptibility_factor: f64,
    pub susceptibility: f64,
    pub infectivity_factor: f64,
    pub infectivity: f64,
    pub node_trait: TraitBits,
}

impl NodeRecord {
    pub fn encode(&self) -> [u8; NODE_RECORD_LEN] {
        let mut buf = [0u8; NODE_RECORD_LEN];
        buf[0..8].copy_from_slice(&self.id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.state_index.to_le_bytes());
        // 4 bytes padding to keep f64 fields 8-byte aligned within the buffer.
        buf[16..24].copy_from_slice(&self.susceptibility_factor.to_le_bytes());
        buf[24..32].copy_from_slice(&self.susceptibility.to_le_bytes());
        buf[32..40].copy_from_slice(&self.infectivity_factor.to_le_bytes());
        buf[40..48].copy_from_slice(&self.infectivity.to_le_bytes());
        buf[48..56].copy_from_slice(&self.node_trait.0.to_le_bytes()[0..8]);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NODE_RECORD_LEN {
            return Err(CoreError::WireTruncated { expected: NODE_RECORD_LEN, actual: bytes.len() });
        }
        Ok(NodeRecord {
            id: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            state_index: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            susceptibility_factor: f64::from_le_bytes(bytes[16..24].try_into().unwrap()),
            susceptibility: f64::from_le_bytes(bytes[24..32].try_into().unwrap()),
            infectivity_factor: f64::from_le_bytes(bytes[32..40].try_into().unwrap()),
            infectivity: f64::from_le_bytes(bytes[40..48].try_into().unwrap()),
            node_trait: TraitBits(u64::from_le_bytes(bytes[48..56].try_into().unwrap()), 0),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub target_id: u64,
    pub source_id: u64,
    pub duration: f64,
    pub location_id: Option<u64>,
    pub active: bool,
    pub weight: f64,
}

impl EdgeRecord {
    pub fn record_len(&self) -> usize {
        if self.location_id.is_some() {
            EDGE_RECORD_LEN_WITH_LOCATION
        } else {
            EDGE_RECORD_LEN_NO_LOCATION
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.record_len()];
        buf[0..8].copy_from_slice(&self.target_id.to_le_bytes());
        buf[8..16].copy_from_slice(&self.source_id.to_le_bytes());
        buf[16..24].copy_from_slice(&self.duration.to_le_bytes());
        let mut offset = 24;
        if let Some(loc) = self.location_id {
            buf[offset..offset + 8].copy_from_slice(&loc.to_le_bytes());
            offset += 8;
        }
        buf[offset] = self.active as u8;
        offset += 1;
        // pad to 8-byte alignment before the trailing weight field.
        let weight_offset = self.record_len() - 8;
        buf[weight_offset..weight_offset + 8].copy_from_slice(&self.weight.to_le_bytes());
        let _ = offset;
        buf
    }

    pub fn decode(bytes: &[u8], has_location: bool) -> Result<Self> {
        let expected = if has_location { EDGE_RECORD_LEN_WITH_LOCATION } else { EDGE_RECORD_LEN_NO_LOCATION };
        if bytes.len() < expected {
            return Err(CoreError::WireTruncated { expected, actual: bytes.len() });
        }
        let target_id = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let source_id = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let duration = f64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let mut offset = 24;
        let location_id = if has_location {
            let loc = u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap());
            offset += 8;
            Some(loc)
        } else {
            None
        };
        let active = bytes[offset] != 0;
        let weight_offset = expected - 8;
        let weight = f64::from_le_bytes(bytes[weight_offset..weight_offset + 8].try_into().unwrap());
        Ok(EdgeRecord { target_id, source_id, duration, location_id, active, weight })
    }
}

/// Remote-action relay records (§4.9, §6): `(actionId, 'N', nodeId)` for a
/// node target or `(actionId, 'E', targetId, sourceId)` for an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteActionRecord {
    Node { action_id: u64, node_id: u64 },
    Edge { action_id: u64, target_id: u64, source_id: u64 },
}

const KIND_NODE: u8 = b'N';
const KIND_EDGE: u8 = b'E';

impl RemoteActionRecord {
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            RemoteActionRecord::Node { action_id, node_id } => {
                out.extend_from_slice(&action_id.to_le_bytes());
                out.push(KIND_NODE);
                out.extend_from_slice(&node_id.to_le_bytes());
            }
            RemoteActionRecord::Edge { action_id, target_id, source_id } => {
                out.extend_from_slice(&action_id.to_le_bytes());
                out.push(KIND_EDGE);
                out.extend_from_slice(&target_id.to_le_bytes());
                out.extend_from_slice(&source_id.to_le_bytes());
            }
        }
    }

    /// Decodes one record from the front of `bytes`, returning it along
    /// with the number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < 9 {
            return Err(CoreError::WireTruncated { expected: 9, actual: bytes.len() });
        }
        let action_id = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        match bytes[8] {
            KIND_NODE => {
                if bytes.len() < 17 {
                    return Err(CoreError::WireTruncated { expected: 17, actual: bytes.len() });
                }
                let node_id = u64::from_le_bytes(bytes[9..17].try_into().unwrap());
                Ok((RemoteActionRecord::Node { action_id, node_id }, 17))
            }
            KIND_EDGE => {
                if bytes.len() < 25 {
                    return Err(CoreError::WireTruncated { expected: 25, actual: bytes.len() });
                }
                let target_id = u64::from_le_bytes(bytes[9..17].try_into().unwrap());
                let source_id = u64::from_le_bytes(bytes[17..25].try_into().unwrap());
                Ok((RemoteActionRecord::Edge { action_id, target_id, source_id }, 25))
            }
            other => Err(CoreError::UnknownRemoteActionKind(other)),
        }
    }

    /// Decodes every record in a concatenated stream.
    pub fn decode_stream(mut bytes: &[u8]) -> Result<Vec<Self>> {
        let mut records = Vec::new();
        while !bytes.is_empty() {
            let (record, consumed) = Self::decode(bytes)?;
            records.push(record);
            bytes = &bytes[consumed..];
        }
        Ok(records)
    }
}

// Message part tables and position-dependent offset arithmetic
//
// Basic offsets are calibrated for the message as it arrives at the last
// relay (hops_remaining = 0). An offset is dynamic when it lies at or past
// the payload boundary: it then shifts by the per-hop header length for
// every relay still ahead. The accumulated header length must be a
// multiple of the symmetric cipher's block size, which is what lets each
// relay strip its header without re-aligning the remainder.

use crate::config::{MacAlgorithm, SymmetricAlgorithm};
use crate::crypto::keys::secret_block_len;
use crate::crypto::seal::SEAL_OVERHEAD;
use crate::wire::WireError;

/// Length of the MESSAGE_ID field in bytes.
pub const MESSAGE_ID_LEN: usize = 4;
/// Length of the RESERVED field in bytes.
pub const RESERVED_LEN: usize = 12;
/// Payload field capacity at the last relay, in bytes.
pub const PAYLOAD_CAPACITY: usize = 1056;

/// Message kinds with distinct wire layouts.
///
/// Release messages have no layout: they are the zero-length wire marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Establish,
    Data,
    Reply,
}

/// Named message fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Per-hop authentication tag
    Mac,
    /// Informational message identifier
    MessageId,
    /// Random filler keeping the header block-aligned
    Reserved,
    /// Sealed session-key block (establish only)
    AsymPart,
    /// Payload region; carries the next onion layer or the application data
    Payload,
    /// Overlay spanning everything the MAC covers (data messages)
    SignedData,
}

/// One named field with its basic offsets and stripping behavior.
#[derive(Debug, Clone)]
pub struct MessagePart {
    pub field: Field,
    /// Start offset at hops_remaining = 0, inclusive
    pub basic_start: usize,
    /// End offset at hops_remaining = 0, exclusive
    pub basic_end: usize,
    /// Header fields are stripped by each relay and excluded from the
    /// forwarded length; body fields are forwarded unchanged.
    pub header: bool,
}

impl MessagePart {
    fn new(field: Field, basic_start: usize, basic_end: usize, header: bool) -> Self {
        Self {
            field,
            basic_start,
            basic_end,
            header,
        }
    }

    pub fn basic_len(&self) -> usize {
        self.basic_end - self.basic_start
    }
}

/// The complete part table for one message kind.
///
/// Construction validates the header alignment invariant; instances are
/// immutable afterwards and all queries are pure functions of
/// `hops_remaining`.
#[derive(Debug, Clone)]
pub struct MessageLayout {
    kind: MessageKind,
    parts: Vec<MessagePart>,
    per_hop_header_len: usize,
    basic_total_len: usize,
    payload_boundary: usize,
    block_len: usize,
}

impl MessageLayout {
    /// Layout for data messages.
    pub fn data(sym: SymmetricAlgorithm, mac: MacAlgorithm) -> Result<Self, WireError> {
        let mac_len = mac.tag_len();
        let id_end = mac_len + MESSAGE_ID_LEN;
        let header_end = id_end + RESERVED_LEN;
        let payload_end = header_end + PAYLOAD_CAPACITY;
        Self::build(
            MessageKind::Data,
            vec![
                MessagePart::new(Field::Mac, 0, mac_len, true),
                MessagePart::new(Field::MessageId, mac_len, id_end, true),
                MessagePart::new(Field::Reserved, id_end, header_end, true),
                MessagePart::new(Field::Payload, header_end, payload_end, false),
                MessagePart::new(Field::SignedData, mac_len, payload_end, false),
            ],
            sym.block_len(),
        )
    }

    /// Layout for establish messages. The sealed key block's length depends
    /// on the configured algorithms, so alignment is checked per
    /// configuration rather than once.
    pub fn establish(sym: SymmetricAlgorithm, mac: MacAlgorithm) -> Result<Self, WireError> {
        let mac_len = mac.tag_len();
        let id_end = mac_len + MESSAGE_ID_LEN;
        let reserved_end = id_end + RESERVED_LEN;
        let sealed_len = SEAL_OVERHEAD + secret_block_len(sym, mac);
        let asym_end = reserved_end + sealed_len;
        let payload_end = asym_end + PAYLOAD_CAPACITY;
        Self::build(
            MessageKind::Establish,
            vec![
                MessagePart::new(Field::Mac, 0, mac_len, true),
                MessagePart::new(Field::MessageId, mac_len, id_end, true),
                MessagePart::new(Field::Reserved, id_end, reserved_end, true),
                MessagePart::new(Field::AsymPart, reserved_end, asym_end, true),
                MessagePart::new(Field::Payload, asym_end, payload_end, false),
            ],
            sym.block_len(),
        )
    }

    /// Layout for reply messages: a bare payload block, no per-hop header.
    pub fn reply(sym: SymmetricAlgorithm) -> Result<Self, WireError> {
        Self::build(
            MessageKind::Reply,
            vec![MessagePart::new(Field::Payload, 0, PAYLOAD_CAPACITY, false)],
            sym.block_len(),
        )
    }

    fn build(
        kind: MessageKind,
        parts: Vec<MessagePart>,
        block_len: usize,
    ) -> Result<Self, WireError> {
        if parts.is_empty() {
            return Err(WireError::InvalidLayout("no message parts".to_string()));
        }
        for part in &parts {
            if part.basic_start >= part.basic_end {
                return Err(WireError::InvalidLayout(format!(
                    "part {:?} has empty range {}..{}",
                    part.field, part.basic_start, part.basic_end
                )));
            }
        }
        let per_hop_header_len: usize = parts
            .iter()
            .filter(|p| p.header)
            .map(MessagePart::basic_len)
            .sum();
        if block_len == 0 || per_hop_header_len % block_len != 0 {
            return Err(WireError::MisalignedHeader {
                header_len: per_hop_header_len,
                block_len,
            });
        }
        let basic_total_len = parts.iter().map(|p| p.basic_end).max().unwrap_or(0);
        let payload_boundary = parts
            .iter()
            .filter(|p| !p.header)
            .map(|p| p.basic_end)
            .max()
            .ok_or_else(|| WireError::InvalidLayout("no body field".to_string()))?;
        if payload_boundary != basic_total_len {
            return Err(WireError::InvalidLayout(format!(
                "body region ends at {} but the message ends at {}",
                payload_boundary, basic_total_len
            )));
        }
        Ok(Self {
            kind,
            parts,
            per_hop_header_len,
            basic_total_len,
            payload_boundary,
            block_len,
        })
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Bytes of header stripped by each relay.
    pub fn per_hop_header_len(&self) -> usize {
        self.per_hop_header_len
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    fn part(&self, field: Field) -> Result<&MessagePart, WireError> {
        self.parts
            .iter()
            .find(|p| p.field == field)
            .ok_or(WireError::UnknownField {
                kind: self.kind,
                field,
            })
    }

    fn offset_at(&self, basic_offset: usize, hops_remaining: usize) -> usize {
        if basic_offset >= self.payload_boundary {
            basic_offset + hops_remaining * self.per_hop_header_len
        } else {
            basic_offset
        }
    }

    /// Start offset of `field` with `hops_remaining` relays still ahead.
    pub fn start_position(&self, field: Field, hops_remaining: usize) -> Result<usize, WireError> {
        let part = self.part(field)?;
        Ok(self.offset_at(part.basic_start, hops_remaining))
    }

    /// Exclusive end offset of `field` with `hops_remaining` relays ahead.
    pub fn end_position(&self, field: Field, hops_remaining: usize) -> Result<usize, WireError> {
        let part = self.part(field)?;
        Ok(self.offset_at(part.basic_end, hops_remaining))
    }

    /// Effective length of `field` with `hops_remaining` relays ahead.
    pub fn length(&self, field: Field, hops_remaining: usize) -> Result<usize, WireError> {
        Ok(self.end_position(field, hops_remaining)? - self.start_position(field, hops_remaining)?)
    }

    /// Total message length with `hops_remaining` relays ahead.
    pub fn total_len(&self, hops_remaining: usize) -> usize {
        self.basic_total_len + self.per_hop_header_len * hops_remaining
    }

    /// Capacity of the payload field with `hops_remaining` relays ahead.
    pub fn payload_capacity(&self, hops_remaining: usize) -> usize {
        // Payload is present in every layout.
        self.length(Field::Payload, hops_remaining)
            .expect("layout without payload field")
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.parts.iter().any(|p| p.field == field)
    }
}

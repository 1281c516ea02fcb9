//! Wire codec for the bootstrap control channel.
//!
//! Four control messages share the document channel with the transport's
//! own sync traffic. Every frame starts with a varint message tag; the
//! payload layout depends on the tag:
//!
//! | Tag | Direction    | Payload                  |
//! |-----|--------------|--------------------------|
//! | 124 | client→relay | full snapshot bytes      |
//! | 125 | client→relay | none                     |
//! | 125 | relay→client | snapshot bytes (may be empty) |
//! | 126 | client→relay | lock token (u32, 4 bytes LE) |
//! | 127 | client→relay | none                     |
//! | 127 | relay→client | lock token (u32, 4 bytes LE) |
//!
//! Tags below 128 encode as a single varint byte, so a bare one-byte
//! frame is a tag with an implicitly empty payload. Snapshot payloads are
//! read-all-remaining; token payloads are exactly 4 bytes. This is a
//! wire-compatibility contract; do not change it.

use std::fmt;

/// Errors produced while decoding a control frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,
    #[error("unterminated varint tag")]
    UnterminatedVarint,
    #[error("varint exceeds 64 bits")]
    VarintOverflow,
    /// The tag belongs to the transport's base protocol (e.g. the CRDT
    /// sync messages multiplexed on the same channel). Not ours to handle.
    #[error("tag {0} is reserved by the transport base protocol")]
    ReservedTag(u64),
    #[error("{kind:?} token payload must be 4 bytes, got {len}")]
    BadTokenPayload { kind: MessageKind, len: usize },
    #[error("{kind:?} carries no payload, got {len} extra bytes")]
    UnexpectedPayload { kind: MessageKind, len: usize },
    #[error("{0:?} is not valid in this direction")]
    WrongDirection(MessageKind),
}

/// The four control message tags owned by this protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Seed = 124,
    ContentQuery = 125,
    Release = 126,
    Acquire = 127,
}

impl MessageKind {
    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            124 => Some(Self::Seed),
            125 => Some(Self::ContentQuery),
            126 => Some(Self::Release),
            127 => Some(Self::Acquire),
            _ => None,
        }
    }

    pub fn tag(self) -> u64 {
        self as u64
    }
}

/// Opaque lock lease identifier issued by the relay on grant and handed
/// back on release.
///
/// The relay happens to mint these from a timestamp; clients must not
/// interpret the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockToken(pub(crate) u32);

impl LockToken {
    fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    fn from_payload(kind: MessageKind, payload: &[u8]) -> Result<Self, CodecError> {
        let bytes: [u8; 4] = payload
            .try_into()
            .map_err(|_| CodecError::BadTokenPayload {
                kind,
                len: payload.len(),
            })?;
        Ok(Self(u32::from_le_bytes(bytes)))
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Write `num` as a varint: 7-bit little-endian groups, high bit set on
/// every byte but the last.
pub fn write_var_uint(buf: &mut Vec<u8>, mut num: u64) {
    while num > 127 {
        buf.push(0x80 | (num as u8 & 0x7f));
        num >>= 7;
    }
    buf.push(num as u8);
}

/// Read a varint from the front of `bytes`. Returns the value and how
/// many bytes it consumed.
pub fn read_var_uint(bytes: &[u8]) -> Result<(u64, usize), CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Empty);
    }
    let mut num: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        // Bound the shift; an adversarial run of continuation bytes must
        // be a decode error, not an overflow.
        if shift >= 64 {
            return Err(CodecError::VarintOverflow);
        }
        num |= u64::from(byte & 0x7f) << shift;
        if byte < 0x80 {
            return Ok((num, i + 1));
        }
        shift += 7;
    }
    Err(CodecError::UnterminatedVarint)
}

fn split_frame(frame: &[u8]) -> Result<(MessageKind, &[u8]), CodecError> {
    let (tag, consumed) = read_var_uint(frame)?;
    let kind = MessageKind::from_tag(tag).ok_or(CodecError::ReservedTag(tag))?;
    Ok((kind, &frame[consumed..]))
}

/// Control messages sent by the client to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// "Here is the authoritative initial state; store it."
    Seed(Vec<u8>),
    /// "Do you have content? Send it if so."
    ContentQuery,
    /// Return a granted lock token to the relay.
    Release(LockToken),
    /// Request (or retry) lock acquisition.
    Acquire,
}

impl ClientMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Seed(_) => MessageKind::Seed,
            Self::ContentQuery => MessageKind::ContentQuery,
            Self::Release(_) => MessageKind::Release,
            Self::Acquire => MessageKind::Acquire,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        write_var_uint(&mut buf, self.kind().tag());
        match self {
            Self::Seed(snapshot) => buf.extend_from_slice(snapshot),
            Self::Release(token) => buf.extend_from_slice(&token.to_le_bytes()),
            Self::ContentQuery | Self::Acquire => {}
        }
        buf
    }

    /// Relay-side view of a client frame. Exercised by tests to verify
    /// exactly what went out on the wire.
    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        let (kind, payload) = split_frame(frame)?;
        match kind {
            MessageKind::Seed => Ok(Self::Seed(payload.to_vec())),
            MessageKind::ContentQuery | MessageKind::Acquire => {
                if !payload.is_empty() {
                    return Err(CodecError::UnexpectedPayload {
                        kind,
                        len: payload.len(),
                    });
                }
                Ok(match kind {
                    MessageKind::ContentQuery => Self::ContentQuery,
                    _ => Self::Acquire,
                })
            }
            MessageKind::Release => {
                Ok(Self::Release(LockToken::from_payload(kind, payload)?))
            }
        }
    }
}

/// Replies delivered by the relay to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// CONTENT_QUERY reply. Empty payload means the document has not been
    /// seeded yet; a non-empty payload is a CRDT update to apply.
    Content(Vec<u8>),
    /// ACQUIRE reply: the lock was granted.
    LockGrant(LockToken),
}

impl RelayMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Content(_) => MessageKind::ContentQuery,
            Self::LockGrant(_) => MessageKind::Acquire,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        write_var_uint(&mut buf, self.kind().tag());
        match self {
            Self::Content(snapshot) => buf.extend_from_slice(snapshot),
            Self::LockGrant(token) => buf.extend_from_slice(&token.to_le_bytes()),
        }
        buf
    }

    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        let (kind, payload) = split_frame(frame)?;
        match kind {
            MessageKind::ContentQuery => Ok(Self::Content(payload.to_vec())),
            MessageKind::Acquire => {
                Ok(Self::LockGrant(LockToken::from_payload(kind, payload)?))
            }
            MessageKind::Seed | MessageKind::Release => Err(CodecError::WrongDirection(kind)),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────

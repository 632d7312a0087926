//! Envelopes carry table fields and union variants out of line, together with
//! the byte and handle counts a reader needs to skip content it does not know.

use crate::buffer::{Decoder, Encoder, ALLOC_ABSENT, ALLOC_PRESENT, ALIGNMENT};
use crate::codec::{Decode, Encode};
use crate::error::Error;
use crate::handle::Handle;

/// `num_bytes: u32`, `num_handles: u32`, `presence: u64`.
pub const ENVELOPE_SIZE: usize = 16;

/// `ordinal: u64` followed by one envelope.
pub const UNION_SIZE: usize = 8 + ENVELOPE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub num_bytes:   u32,
    pub num_handles: u32,
    pub presence:    u64,
}

impl Envelope {
    /// Reads and validates the envelope header at `offset`.
    pub fn read(decoder: &Decoder<'_>, offset: usize) -> Result<Envelope, Error> {
        let envelope = Envelope {
            num_bytes:   decoder.read_u32(offset)?,
            num_handles: decoder.read_u32(offset + 4)?,
            presence:    decoder.read_u64(offset + 8)?,
        };
        match envelope.presence {
            ALLOC_PRESENT if envelope.num_bytes as usize % ALIGNMENT != 0 => {
                Err(Error::MisalignedEnvelope(envelope.num_bytes))
            }
            ALLOC_PRESENT => Ok(envelope),
            ALLOC_ABSENT if envelope.num_bytes == 0 && envelope.num_handles == 0 => Ok(envelope),
            other => Err(Error::InvalidPresence(other)),
        }
    }

    pub fn is_present(&self) -> bool {
        self.presence == ALLOC_PRESENT
    }
}

/// Bytes and handles of an envelope whose ordinal the reader does not know.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnknownData {
    pub bytes:   Vec<u8>,
    pub handles: Vec<Handle>,
}

/// Writes `value` out of line and fills in the envelope header at `offset`.
pub fn encode_envelope<T: Encode>(
    encoder: &mut Encoder,
    offset: usize,
    value: &T,
) -> Result<(), Error> {
    let bytes_before = encoder.len();
    let handles_before = encoder.handle_count();
    let content = encoder.alloc(T::INLINE_SIZE);
    value.encode(encoder, content)?;
    let num_bytes = encoder.len() - bytes_before;
    let num_handles = encoder.handle_count() - handles_before;
    write_envelope_header(encoder, offset, num_bytes, num_handles)
}

fn write_envelope_header(
    encoder: &mut Encoder,
    offset: usize,
    num_bytes: usize,
    num_handles: usize,
) -> Result<(), Error> {
    (num_bytes as u32).encode(encoder, offset)?;
    (num_handles as u32).encode(encoder, offset + 4)?;
    ALLOC_PRESENT.encode(encoder, offset + 8)
}

/// Decodes the content of a present envelope, checking that it used exactly
/// the bytes and handles the header declared.
pub fn decode_envelope<T: Decode>(decoder: &mut Decoder<'_>, envelope: &Envelope) -> Result<T, Error> {
    let bytes_before = decoder.position();
    let handles_before = decoder.handle_position();
    let content = decoder.claim(T::INLINE_SIZE)?;
    let value = decoder.nested(|decoder| T::decode(decoder, content))?;
    let used_bytes = decoder.position() - bytes_before;
    let used_handles = decoder.handle_position() - handles_before;
    if used_bytes != envelope.num_bytes as usize || used_handles != envelope.num_handles as usize {
        return Err(Error::EnvelopeMismatch {
            declared_bytes: envelope.num_bytes,
            declared_handles: envelope.num_handles,
            used_bytes,
            used_handles,
        });
    }
    Ok(value)
}

/// Claims the content of an envelope without interpreting it.
pub fn skip_envelope(decoder: &mut Decoder<'_>, envelope: &Envelope) -> Result<UnknownData, Error> {
    if !envelope.is_present() {
        return Ok(UnknownData::default());
    }
    let content = decoder.claim(envelope.num_bytes as usize)?;
    let bytes = decoder.read_bytes(content, envelope.num_bytes as usize)?.to_vec();
    let handles = decoder.take_handles(envelope.num_handles as usize)?;
    Ok(UnknownData { bytes, handles })
}

/// Writes the inline vector header of a table holding `max_ordinal`
/// envelopes and returns the offset of the first envelope.
pub fn encode_table_header(
    encoder: &mut Encoder,
    offset: usize,
    max_ordinal: u64,
) -> Result<usize, Error> {
    max_ordinal.encode(encoder, offset)?;
    ALLOC_PRESENT.encode(encoder, offset + 8)?;
    Ok(encoder.alloc(max_ordinal as usize * ENVELOPE_SIZE))
}

/// The decoded inline part of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    pub max_ordinal: u64,
    envelopes:       usize,
}

impl TableHeader {
    pub fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<TableHeader, Error> {
        let max_ordinal = decoder.read_u64(offset)?;
        match decoder.read_u64(offset + 8)? {
            ALLOC_PRESENT => {}
            ALLOC_ABSENT => return Err(Error::UnexpectedNull("table")),
            other => return Err(Error::InvalidPresence(other)),
        }
        let envelopes = decoder.claim_elements(max_ordinal, ENVELOPE_SIZE)?;
        Ok(TableHeader { max_ordinal, envelopes })
    }

    /// Reads the envelope for `ordinal` (1-based).
    pub fn envelope(&self, decoder: &Decoder<'_>, ordinal: u64) -> Result<Envelope, Error> {
        Envelope::read(decoder, self.envelopes + (ordinal as usize - 1) * ENVELOPE_SIZE)
    }
}

/// Writes a union variant: its ordinal followed by an envelope.
pub fn encode_union<T: Encode>(
    encoder: &mut Encoder,
    offset: usize,
    ordinal: u64,
    value: &T,
) -> Result<(), Error> {
    ordinal.encode(encoder, offset)?;
    encode_envelope(encoder, offset + 8, value)
}

/// Writes a preserved unknown union variant back out verbatim.
pub fn encode_unknown_union(
    encoder: &mut Encoder,
    offset: usize,
    ordinal: u64,
    data: &UnknownData,
) -> Result<(), Error> {
    ordinal.encode(encoder, offset)?;
    let content = encoder.alloc(data.bytes.len());
    encoder.write_bytes(content, &data.bytes)?;
    for handle in &data.handles {
        encoder.push_handle(handle.clone());
    }
    let num_bytes = encoder.len() - content;
    write_envelope_header(encoder, offset + 8, num_bytes, data.handles.len())
}

/// The decoded inline part of a union.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnionHeader {
    pub ordinal:  u64,
    pub envelope: Envelope,
}

impl UnionHeader {
    /// Reads the header of a non-nullable union.
    pub fn decode(decoder: &Decoder<'_>, offset: usize) -> Result<UnionHeader, Error> {
        let ordinal = decoder.read_u64(offset)?;
        let envelope = Envelope::read(decoder, offset + 8)?;
        if ordinal == 0 || !envelope.is_present() {
            return Err(Error::UnexpectedNull("union"));
        }
        Ok(UnionHeader { ordinal, envelope })
    }
}

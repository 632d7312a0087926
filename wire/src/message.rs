use std::sync::atomic::{AtomicU32, Ordering};

use crate::buffer::{Decoder, Encoder};
use crate::codec::{Decode, Encode};
use crate::error::Error;
use crate::handle::Handle;

/// Size of the header that starts every transactional message.
pub const HEADER_SIZE: usize = 16;

/// Current wire format magic number.
pub const MAGIC_NUMBER: u8 = 1;

/// `txid: u32`, `flags: [u8; 3]`, `magic: u8`, `ordinal: u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub txid:    u32,
    pub flags:   [u8; 3],
    pub magic:   u8,
    pub ordinal: u64,
}

impl MessageHeader {
    pub fn new(txid: u32, ordinal: u64) -> MessageHeader {
        MessageHeader { txid, flags: [0; 3], magic: MAGIC_NUMBER, ordinal }
    }

    /// Events and one-way calls carry transaction id zero.
    pub fn is_event(&self) -> bool {
        self.txid == 0
    }

    fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
        self.txid.encode(encoder, offset)?;
        encoder.write_bytes(offset + 4, &self.flags)?;
        self.magic.encode(encoder, offset + 7)?;
        self.ordinal.encode(encoder, offset + 8)
    }

    fn decode(decoder: &Decoder<'_>) -> Result<MessageHeader, Error> {
        let header = MessageHeader {
            txid:    decoder.read_u32(0)?,
            flags:   decoder.read_array(4)?,
            magic:   decoder.read_array::<1>(7)?[0],
            ordinal: decoder.read_u64(8)?,
        };
        if header.magic != MAGIC_NUMBER {
            return Err(Error::InvalidMagic(header.magic));
        }
        Ok(header)
    }
}

/// A header plus an encoded body, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub bytes:   Vec<u8>,
    pub handles: Vec<Handle>,
}

impl Message {
    /// Encodes `body` behind a header for `ordinal`.
    pub fn encode<T: Encode>(txid: u32, ordinal: u64, body: &T) -> Result<Message, Error> {
        let mut encoder = Encoder::new();
        let header = encoder.alloc(HEADER_SIZE);
        MessageHeader::new(txid, ordinal).encode(&mut encoder, header)?;
        let offset = encoder.alloc(T::INLINE_SIZE);
        body.encode(&mut encoder, offset)?;
        let (bytes, handles) = encoder.finish();
        Ok(Message { bytes, handles })
    }

    pub fn header(&self) -> Result<MessageHeader, Error> {
        MessageHeader::decode(&Decoder::new(&self.bytes, &self.handles))
    }

    /// Decodes the body, requiring every byte and handle to be used.
    pub fn decode_body<T: Decode>(&self) -> Result<T, Error> {
        let mut decoder = Decoder::new(&self.bytes, &self.handles);
        decoder.claim(HEADER_SIZE)?;
        MessageHeader::decode(&decoder)?;
        let offset = decoder.claim(T::INLINE_SIZE)?;
        let body = T::decode(&mut decoder, offset)?;
        decoder.finish()?;
        Ok(body)
    }

    /// Decodes the body of a reply after checking it answers `ordinal`.
    pub fn decode_reply<T: Decode>(&self, ordinal: u64) -> Result<T, Error> {
        let header = self.header()?;
        if header.ordinal != ordinal {
            return Err(Error::UnexpectedOrdinal { expected: ordinal, actual: header.ordinal });
        }
        self.decode_body()
    }
}

/// Hands out non-zero transaction ids for two-way calls.
#[derive(Debug)]
pub struct TxidGenerator {
    next: AtomicU32,
}

impl TxidGenerator {
    pub fn new() -> TxidGenerator {
        TxidGenerator { next: AtomicU32::new(1) }
    }

    pub fn next(&self) -> u32 {
        loop {
            let txid = self.next.fetch_add(1, Ordering::Relaxed);
            if txid != 0 {
                return txid;
            }
        }
    }
}

impl Default for TxidGenerator {
    fn default() -> Self {
        TxidGenerator::new()
    }
}

use crate::buffer::{Decoder, Encoder, ALLOC_ABSENT, ALLOC_PRESENT};
use crate::envelope::{Envelope, UNION_SIZE};
use crate::error::Error;
use crate::handle::{ClientEnd, Handle, ServerEnd, HANDLE_ABSENT, HANDLE_PRESENT};

/// Inline shape of a type on the wire.
pub trait Layout {
    const INLINE_SIZE: usize;
    const INLINE_ALIGN: usize;
}

/// Writes a value into space the caller has already allocated.
pub trait Encode: Layout {
    fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error>;
}

/// Reads a value from its inline slot, claiming out-of-line space as needed.
pub trait Decode: Layout + Sized {
    fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error>;
}

/// Encodes `value` as a standalone object.
pub fn encode<T: Encode>(value: &T) -> Result<(Vec<u8>, Vec<Handle>), Error> {
    let mut encoder = Encoder::new();
    let offset = encoder.alloc(T::INLINE_SIZE);
    value.encode(&mut encoder, offset)?;
    Ok(encoder.finish())
}

/// Decodes a standalone object, requiring every byte and handle to be used.
pub fn decode<T: Decode>(bytes: &[u8], handles: &[Handle]) -> Result<T, Error> {
    let mut decoder = Decoder::new(bytes, handles);
    let offset = decoder.claim(T::INLINE_SIZE)?;
    let value = T::decode(&mut decoder, offset)?;
    decoder.finish()?;
    Ok(value)
}

macro_rules! primitive {
    ($($ty:ty => $size:expr),* $(,)?) => {
        $(
            impl Layout for $ty {
                const INLINE_SIZE: usize = $size;
                const INLINE_ALIGN: usize = $size;
            }

            impl Encode for $ty {
                fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
                    encoder.write_bytes(offset, &self.to_le_bytes())
                }
            }

            impl Decode for $ty {
                fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error> {
                    Ok(<$ty>::from_le_bytes(decoder.read_array(offset)?))
                }
            }
        )*
    };
}

primitive! {
    u8 => 1, i8 => 1,
    u16 => 2, i16 => 2,
    u32 => 4, i32 => 4, f32 => 4,
    u64 => 8, i64 => 8, f64 => 8,
}

impl Layout for bool {
    const INLINE_SIZE: usize = 1;
    const INLINE_ALIGN: usize = 1;
}

impl Encode for bool {
    fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
        encoder.write_bytes(offset, &[*self as u8])
    }
}

impl Decode for bool {
    fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error> {
        match decoder.read_array::<1>(offset)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::InvalidBool(other)),
        }
    }
}

// Empty payloads.
impl Layout for () {
    const INLINE_SIZE: usize = 0;
    const INLINE_ALIGN: usize = 1;
}

impl Encode for () {
    fn encode(&self, _encoder: &mut Encoder, _offset: usize) -> Result<(), Error> {
        Ok(())
    }
}

impl Decode for () {
    fn decode(_decoder: &mut Decoder<'_>, _offset: usize) -> Result<Self, Error> {
        Ok(())
    }
}

impl<T: Layout, const N: usize> Layout for [T; N] {
    const INLINE_SIZE: usize = T::INLINE_SIZE * N;
    const INLINE_ALIGN: usize = T::INLINE_ALIGN;
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
        for (i, element) in self.iter().enumerate() {
            element.encode(encoder, offset + i * T::INLINE_SIZE)?;
        }
        Ok(())
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error> {
        let mut elements = Vec::with_capacity(N);
        for i in 0..N {
            elements.push(T::decode(decoder, offset + i * T::INLINE_SIZE)?);
        }
        match <[T; N]>::try_from(elements) {
            Ok(array) => Ok(array),
            Err(elements) => Err(Error::BoundExceeded { len: elements.len(), max: N }),
        }
    }
}

/// Writes a count/presence header and returns the offset of `len` bytes of
/// freshly allocated content.
fn encode_sequence_header(
    encoder: &mut Encoder,
    offset: usize,
    count: usize,
    len: usize,
) -> Result<usize, Error> {
    (count as u64).encode(encoder, offset)?;
    ALLOC_PRESENT.encode(encoder, offset + 8)?;
    Ok(encoder.alloc(len))
}

fn encode_absent_sequence(encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
    0u64.encode(encoder, offset)?;
    ALLOC_ABSENT.encode(encoder, offset + 8)
}

/// Reads a count/presence header. Returns `None` for an absent sequence.
fn decode_sequence_header(decoder: &Decoder<'_>, offset: usize) -> Result<Option<u64>, Error> {
    let count = decoder.read_u64(offset)?;
    match decoder.read_u64(offset + 8)? {
        ALLOC_PRESENT => Ok(Some(count)),
        ALLOC_ABSENT if count == 0 => Ok(None),
        other => Err(Error::InvalidPresence(other)),
    }
}

impl Layout for String {
    const INLINE_SIZE: usize = 16;
    const INLINE_ALIGN: usize = 8;
}

impl Encode for String {
    fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
        let content = encode_sequence_header(encoder, offset, self.len(), self.len())?;
        encoder.write_bytes(content, self.as_bytes())
    }
}

impl Decode for String {
    fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error> {
        Option::<String>::decode(decoder, offset)?.ok_or(Error::UnexpectedNull("string"))
    }
}

impl Layout for Option<String> {
    const INLINE_SIZE: usize = 16;
    const INLINE_ALIGN: usize = 8;
}

impl Encode for Option<String> {
    fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
        match self {
            Some(value) => value.encode(encoder, offset),
            None => encode_absent_sequence(encoder, offset),
        }
    }
}

impl Decode for Option<String> {
    fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error> {
        let Some(len) = decode_sequence_header(decoder, offset)? else {
            return Ok(None);
        };
        let content = decoder.claim_elements(len, 1)?;
        let bytes = decoder.read_bytes(content, len as usize)?;
        match std::str::from_utf8(bytes) {
            Ok(value) => Ok(Some(value.to_owned())),
            Err(_) => Err(Error::InvalidUtf8),
        }
    }
}

impl<T: Layout> Layout for Vec<T> {
    const INLINE_SIZE: usize = 16;
    const INLINE_ALIGN: usize = 8;
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
        let content =
            encode_sequence_header(encoder, offset, self.len(), self.len() * T::INLINE_SIZE)?;
        for (i, element) in self.iter().enumerate() {
            element.encode(encoder, content + i * T::INLINE_SIZE)?;
        }
        Ok(())
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error> {
        Option::<Vec<T>>::decode(decoder, offset)?.ok_or(Error::UnexpectedNull("vector"))
    }
}

impl<T: Layout> Layout for Option<Vec<T>> {
    const INLINE_SIZE: usize = 16;
    const INLINE_ALIGN: usize = 8;
}

impl<T: Encode> Encode for Option<Vec<T>> {
    fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
        match self {
            Some(value) => value.encode(encoder, offset),
            None => encode_absent_sequence(encoder, offset),
        }
    }
}

impl<T: Decode> Decode for Option<Vec<T>> {
    fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error> {
        let Some(count) = decode_sequence_header(decoder, offset)? else {
            return Ok(None);
        };
        let capacity = decoder.remaining() / T::INLINE_SIZE.max(1);
        let content = decoder.claim_elements(count, T::INLINE_SIZE)?;
        // The claim succeeded, so `count` fits in a usize.
        let count = count as usize;
        decoder.nested(|decoder| {
            let mut elements = Vec::with_capacity(count.min(capacity));
            for i in 0..count {
                elements.push(T::decode(decoder, content + i * T::INLINE_SIZE)?);
            }
            Ok(Some(elements))
        })
    }
}

/// Length checks for bounded strings and vectors.
pub trait Bounded {
    fn bounded_len(&self) -> usize;
}

impl Bounded for String {
    fn bounded_len(&self) -> usize {
        self.len()
    }
}

impl<T> Bounded for Vec<T> {
    fn bounded_len(&self) -> usize {
        self.len()
    }
}

impl<T: Bounded> Bounded for Option<T> {
    fn bounded_len(&self) -> usize {
        self.as_ref().map_or(0, Bounded::bounded_len)
    }
}

/// Fails when `value` is longer than `max`.
pub fn check_bound<T: Bounded + ?Sized>(value: &T, max: usize) -> Result<(), Error> {
    let len = value.bounded_len();
    if len > max {
        return Err(Error::BoundExceeded { len, max });
    }
    Ok(())
}

/// Passes a decoded value through when it is within `max`.
pub fn bounded<T: Bounded>(value: T, max: usize) -> Result<T, Error> {
    check_bound(&value, max)?;
    Ok(value)
}

impl Layout for Handle {
    const INLINE_SIZE: usize = 4;
    const INLINE_ALIGN: usize = 4;
}

impl Encode for Handle {
    fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
        if !self.is_valid() {
            return Err(Error::UnexpectedNull("handle"));
        }
        HANDLE_PRESENT.encode(encoder, offset)?;
        encoder.push_handle(self.clone());
        Ok(())
    }
}

impl Decode for Handle {
    fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error> {
        Option::<Handle>::decode(decoder, offset)?.ok_or(Error::UnexpectedNull("handle"))
    }
}

impl Layout for Option<Handle> {
    const INLINE_SIZE: usize = 4;
    const INLINE_ALIGN: usize = 4;
}

impl Encode for Option<Handle> {
    fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
        match self {
            Some(handle) => handle.encode(encoder, offset),
            None => HANDLE_ABSENT.encode(encoder, offset),
        }
    }
}

impl Decode for Option<Handle> {
    fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error> {
        match decoder.read_u32(offset)? {
            HANDLE_PRESENT => Ok(Some(decoder.take_handle()?)),
            HANDLE_ABSENT => Ok(None),
            other => Err(Error::InvalidHandleMarker(other)),
        }
    }
}

macro_rules! endpoint_codec {
    ($($name:ident),*) => {
        $(
            impl<P> Layout for $name<P> {
                const INLINE_SIZE: usize = 4;
                const INLINE_ALIGN: usize = 4;
            }

            impl<P> Encode for $name<P> {
                fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
                    self.handle().encode(encoder, offset)
                }
            }

            impl<P> Decode for $name<P> {
                fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error> {
                    Ok($name::new(Handle::decode(decoder, offset)?))
                }
            }

            impl<P> Layout for Option<$name<P>> {
                const INLINE_SIZE: usize = 4;
                const INLINE_ALIGN: usize = 4;
            }

            impl<P> Encode for Option<$name<P>> {
                fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
                    match self {
                        Some(end) => end.encode(encoder, offset),
                        None => HANDLE_ABSENT.encode(encoder, offset),
                    }
                }
            }

            impl<P> Decode for Option<$name<P>> {
                fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error> {
                    Ok(Option::<Handle>::decode(decoder, offset)?.map($name::new))
                }
            }
        )*
    };
}

endpoint_codec!(ClientEnd, ServerEnd);

/// How an absent value of a boxable type is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullableLayout {
    /// An 8-byte presence marker; the value lives out of line.
    OutOfLine,
    /// Ordinal zero with an absent envelope.
    Union,
    /// A table header with zero count and an absent marker.
    Table,
}

impl NullableLayout {
    pub const fn inline_size(self) -> usize {
        match self {
            NullableLayout::OutOfLine => 8,
            NullableLayout::Union => UNION_SIZE,
            NullableLayout::Table => 16,
        }
    }
}

/// Implemented by generated structs, tables and unions so that
/// `Option<Box<T>>` has a codec.
pub trait Boxed: Encode + Decode {
    const NULLABLE: NullableLayout;
}

impl<T: Boxed> Layout for Option<Box<T>> {
    const INLINE_SIZE: usize = T::NULLABLE.inline_size();
    const INLINE_ALIGN: usize = 8;
}

impl<T: Boxed> Encode for Option<Box<T>> {
    fn encode(&self, encoder: &mut Encoder, offset: usize) -> Result<(), Error> {
        match (T::NULLABLE, self) {
            (NullableLayout::OutOfLine, Some(value)) => {
                ALLOC_PRESENT.encode(encoder, offset)?;
                let content = encoder.alloc(T::INLINE_SIZE);
                value.encode(encoder, content)
            }
            (NullableLayout::OutOfLine, None) => ALLOC_ABSENT.encode(encoder, offset),
            (_, Some(value)) => value.encode(encoder, offset),
            // An absent union or table is all zeroes, which the allocation
            // already holds.
            (_, None) => Ok(()),
        }
    }
}

impl<T: Boxed> Decode for Option<Box<T>> {
    fn decode(decoder: &mut Decoder<'_>, offset: usize) -> Result<Self, Error> {
        let present = match T::NULLABLE {
            NullableLayout::OutOfLine => match decoder.read_u64(offset)? {
                ALLOC_PRESENT => {
                    let content = decoder.claim(T::INLINE_SIZE)?;
                    let value = decoder.nested(|decoder| T::decode(decoder, content))?;
                    return Ok(Some(Box::new(value)));
                }
                ALLOC_ABSENT => false,
                other => return Err(Error::InvalidPresence(other)),
            },
            NullableLayout::Union => {
                let ordinal = decoder.read_u64(offset)?;
                let envelope = Envelope::read(decoder, offset + 8)?;
                if ordinal == 0 && envelope.is_present() {
                    return Err(Error::InvalidPresence(envelope.presence));
                }
                ordinal != 0
            }
            NullableLayout::Table => {
                decode_sequence_header(decoder, offset)?.is_some()
            }
        };
        if present {
            Ok(Some(Box::new(T::decode(decoder, offset)?)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_little_endian() {
        let (bytes, handles) = encode(&-2i32).unwrap();
        assert_eq!(bytes, vec![0xfe, 0xff, 0xff, 0xff, 0, 0, 0, 0]);
        assert!(handles.is_empty());
        assert_eq!(decode::<i32>(&bytes, &[]), Ok(-2));

        let (bytes, _) = encode(&1.5f64).unwrap();
        assert_eq!(decode::<f64>(&bytes, &[]), Ok(1.5));
    }

    #[test]
    fn bool_rejects_other_bytes() {
        let bytes = [2, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode::<bool>(&bytes, &[]), Err(Error::InvalidBool(2)));
        assert_eq!(decode::<bool>(&encode(&true).unwrap().0, &[]), Ok(true));
    }

    #[test]
    fn string_layout() {
        let (bytes, _) = encode(&"hi".to_string()).unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[0..8], &2u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &ALLOC_PRESENT.to_le_bytes());
        assert_eq!(&bytes[16..18], b"hi");
        assert_eq!(&bytes[18..24], &[0; 6]);
        assert_eq!(decode::<String>(&bytes, &[]), Ok("hi".to_string()));
    }

    #[test]
    fn absent_string() {
        let (bytes, _) = encode(&Option::<String>::None).unwrap();
        assert_eq!(bytes, vec![0; 16]);
        assert_eq!(decode::<Option<String>>(&bytes, &[]), Ok(None));
        assert_eq!(decode::<String>(&bytes, &[]), Err(Error::UnexpectedNull("string")));
    }

    #[test]
    fn invalid_utf8() {
        let mut bytes = vec![0u8; 24];
        bytes[0] = 1;
        bytes[8..16].copy_from_slice(&ALLOC_PRESENT.to_le_bytes());
        bytes[16] = 0xff;
        assert_eq!(decode::<String>(&bytes, &[]), Err(Error::InvalidUtf8));
    }

    fn sequence_header(count: u64) -> Vec<u8> {
        let mut bytes = count.to_le_bytes().to_vec();
        bytes.extend_from_slice(&ALLOC_PRESENT.to_le_bytes());
        bytes
    }

    #[test]
    fn huge_vector_counts_are_rejected() {
        let bytes = sequence_header(1 << 61);
        assert!(matches!(decode::<Vec<u64>>(&bytes, &[]), Err(Error::OutOfBounds { .. })));

        let bytes = sequence_header(u64::MAX);
        assert!(matches!(decode::<Vec<u8>>(&bytes, &[]), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn huge_string_lengths_are_rejected() {
        let bytes = sequence_header(u64::MAX);
        assert!(matches!(decode::<String>(&bytes, &[]), Err(Error::OutOfBounds { .. })));

        let bytes = sequence_header(u64::MAX - 7);
        assert!(matches!(decode::<Option<String>>(&bytes, &[]), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn vector_count_beyond_the_buffer() {
        let mut bytes = sequence_header(1000);
        bytes.extend_from_slice(&[0; 16]);
        assert_eq!(
            decode::<Vec<u32>>(&bytes, &[]),
            Err(Error::OutOfBounds { offset: 16, len: 4000, available: 32 })
        );
    }

    #[test]
    fn vector_of_vectors() {
        let value: Vec<Vec<u16>> = vec![vec![1, 2, 3], vec![], vec![4]];
        let (bytes, _) = encode(&value).unwrap();
        // header, 3 inline headers, then each element's content in order
        assert_eq!(bytes.len(), 16 + 48 + 8 + 0 + 8);
        assert_eq!(decode::<Vec<Vec<u16>>>(&bytes, &[]), Ok(value));
    }

    #[test]
    fn arrays_are_inline() {
        let value = [1u8, 2, 3];
        let (bytes, _) = encode(&value).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 0, 0, 0, 0, 0]);
        assert_eq!(decode::<[u8; 3]>(&bytes, &[]), Ok(value));
    }

    #[test]
    fn bounds() {
        assert_eq!(check_bound(&"abc".to_string(), 3), Ok(()));
        assert_eq!(check_bound(&vec![1, 2], 1), Err(Error::BoundExceeded { len: 2, max: 1 }));
        assert_eq!(check_bound(&Option::<String>::None, 0), Ok(()));
    }

    #[test]
    fn handles_move_through_the_table() {
        let value = vec![Some(Handle::from_raw(7)), None];
        let (bytes, handles) = encode(&value).unwrap();
        assert_eq!(handles, vec![Handle::from_raw(7)]);
        assert_eq!(&bytes[16..20], &HANDLE_PRESENT.to_le_bytes());
        assert_eq!(&bytes[20..24], &HANDLE_ABSENT.to_le_bytes());
        assert_eq!(decode::<Vec<Option<Handle>>>(&bytes, &handles), Ok(value));
        assert_eq!(decode::<Vec<Option<Handle>>>(&bytes, &[]), Err(Error::MissingHandle));
    }

    #[test]
    fn invalid_handle_cannot_be_encoded() {
        assert_eq!(encode(&Handle::invalid()), Err(Error::UnexpectedNull("handle")));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let bytes = [0u8; 16];
        assert_eq!(decode::<u32>(&bytes, &[]), Err(Error::ExtraBytes(8)));
    }
}

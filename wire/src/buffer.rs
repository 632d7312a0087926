use crate::error::Error;
use crate::handle::Handle;

/// Every out-of-line object starts on an 8-byte boundary.
pub const ALIGNMENT: usize = 8;

/// Presence marker for an out-of-line object that follows.
pub const ALLOC_PRESENT: u64 = u64::MAX;

/// Presence marker for an absent out-of-line object.
pub const ALLOC_ABSENT: u64 = 0;

/// Out-of-line nesting deeper than this is rejected by the decoder.
pub const MAX_DEPTH: usize = 32;

/// Rounds `len` up to the next multiple of [`ALIGNMENT`].
pub const fn round_up(len: usize) -> usize {
    (len + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Like [`round_up`], but `None` when the padded length does not fit in a
/// `usize`. Lengths read off the wire go through this.
pub const fn checked_round_up(len: usize) -> Option<usize> {
    match len.checked_add(ALIGNMENT - 1) {
        Some(padded) => Some(padded & !(ALIGNMENT - 1)),
        None => None,
    }
}

/// A buffer meant for writing encoded values.
///
/// Space is handed out by [`Encoder::alloc`] in zero-filled, 8-byte aligned
/// blocks, so any byte a codec does not write stays zero.
///
/// Example usage:
///
/// ```
/// let mut encoder = wiregen_wire::Encoder::new();
/// let offset = encoder.alloc(4);
/// encoder.write_bytes(offset, &7u32.to_le_bytes()).unwrap();
/// assert_eq!(encoder.finish().0, vec![7, 0, 0, 0, 0, 0, 0, 0]);
/// ```
#[derive(Debug, Default)]
pub struct Encoder {
    bytes:   Vec<u8>,
    handles: Vec<Handle>,
}

impl Encoder {
    /// Creates an empty encoder.
    pub fn new() -> Encoder {
        Encoder::default()
    }

    /// The number of bytes allocated so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when nothing has been allocated yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The number of handles written so far.
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Reserves `len` bytes (padded to the alignment) at the end of the
    /// buffer and returns their offset.
    pub fn alloc(&mut self, len: usize) -> usize {
        let offset = self.bytes.len();
        self.bytes.resize(offset + round_up(len), 0);
        offset
    }

    /// Copies `value` into previously allocated space.
    pub fn write_bytes(&mut self, offset: usize, value: &[u8]) -> Result<(), Error> {
        let available = self.bytes.len();
        match self.bytes.get_mut(offset..offset + value.len()) {
            Some(slot) => {
                slot.copy_from_slice(value);
                Ok(())
            }
            None => Err(Error::OutOfBounds { offset, len: value.len(), available }),
        }
    }

    /// Appends a handle to the handle table.
    pub fn push_handle(&mut self, handle: Handle) {
        self.handles.push(handle);
    }

    /// Consumes the encoder, returning the bytes and handles written.
    pub fn finish(self) -> (Vec<u8>, Vec<Handle>) {
        (self.bytes, self.handles)
    }
}

/// A buffer meant for reading encoded values.
///
/// Out-of-line objects are claimed in the same depth-first order the
/// [`Encoder`] allocated them in.
///
/// Example usage:
///
/// ```
/// let bytes = [5, 0, 0, 0, 0, 0, 0, 0];
/// let mut decoder = wiregen_wire::Decoder::new(&bytes, &[]);
/// let offset = decoder.claim(4).unwrap();
/// assert_eq!(decoder.read_array::<4>(offset), Ok([5, 0, 0, 0]));
/// assert_eq!(decoder.finish(), Ok(()));
/// ```
#[derive(Debug)]
pub struct Decoder<'a> {
    bytes:            &'a [u8],
    handles:          &'a [Handle],
    next_out_of_line: usize,
    next_handle:      usize,
    depth:            usize,
}

impl<'a> Decoder<'a> {
    /// Create a new Decoder that wraps the provided bytes and handles.
    pub fn new(bytes: &'a [u8], handles: &'a [Handle]) -> Decoder<'a> {
        Decoder { bytes, handles, next_out_of_line: 0, next_handle: 0, depth: 0 }
    }

    /// Offset of the next unclaimed out-of-line byte.
    pub fn position(&self) -> usize {
        self.next_out_of_line
    }

    /// Index of the next unclaimed handle.
    pub fn handle_position(&self) -> usize {
        self.next_handle
    }

    /// Unclaimed out-of-line bytes.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.next_out_of_line
    }

    /// Claims the next `len` bytes (padded to the alignment) of out-of-line
    /// storage and returns their offset.
    pub fn claim(&mut self, len: usize) -> Result<usize, Error> {
        let offset = self.next_out_of_line;
        let end = checked_round_up(len)
            .and_then(|padded| offset.checked_add(padded))
            .filter(|&end| end <= self.bytes.len())
            .ok_or(Error::OutOfBounds { offset, len, available: self.bytes.len() })?;
        self.next_out_of_line = end;
        Ok(offset)
    }

    /// Claims out-of-line storage for `count` elements of `size` bytes each.
    /// `count` comes straight off the wire, so the product is checked.
    pub fn claim_elements(&mut self, count: u64, size: usize) -> Result<usize, Error> {
        let len = usize::try_from(count)
            .ok()
            .and_then(|count| count.checked_mul(size))
            .ok_or(Error::OutOfBounds {
                offset:    self.next_out_of_line,
                len:       usize::MAX,
                available: self.bytes.len(),
            })?;
        self.claim(len)
    }

    /// Try to read `len` bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], Error> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or(Error::OutOfBounds { offset, len, available: self.bytes.len() })
    }

    /// Try to read a fixed number of bytes starting at `offset`.
    pub fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], Error> {
        let mut value = [0u8; N];
        value.copy_from_slice(self.read_bytes(offset, N)?);
        Ok(value)
    }

    /// Try to read a little-endian `u32` starting at `offset`.
    pub fn read_u32(&self, offset: usize) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.read_array(offset)?))
    }

    /// Try to read a little-endian `u64` starting at `offset`.
    pub fn read_u64(&self, offset: usize) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(self.read_array(offset)?))
    }

    /// Takes the next handle from the handle table.
    pub fn take_handle(&mut self) -> Result<Handle, Error> {
        let handle = self.handles.get(self.next_handle).cloned().ok_or(Error::MissingHandle)?;
        self.next_handle += 1;
        Ok(handle)
    }

    /// Takes the next `count` handles from the handle table.
    pub fn take_handles(&mut self, count: usize) -> Result<Vec<Handle>, Error> {
        (0..count).map(|_| self.take_handle()).collect()
    }

    /// Runs `f` one out-of-line level deeper, failing once nesting passes
    /// [`MAX_DEPTH`].
    pub fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::MaxDepthExceeded(MAX_DEPTH));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Checks that every byte and handle has been consumed.
    pub fn finish(&self) -> Result<(), Error> {
        if self.next_out_of_line != self.bytes.len() {
            return Err(Error::ExtraBytes(self.bytes.len() - self.next_out_of_line));
        }
        if self.next_handle != self.handles.len() {
            return Err(Error::ExtraHandles(self.handles.len() - self.next_handle));
        }
        Ok(())
    }
}

#[test]
fn round_up_to_alignment() {
    assert_eq!(round_up(0), 0);
    assert_eq!(round_up(1), 8);
    assert_eq!(round_up(8), 8);
    assert_eq!(round_up(9), 16);
    assert_eq!(round_up(24), 24);
}

#[test]
fn alloc_zero_fills_and_aligns() {
    let mut encoder = Encoder::new();
    assert_eq!(encoder.alloc(3), 0);
    assert_eq!(encoder.alloc(0), 8);
    assert_eq!(encoder.alloc(12), 8);
    assert_eq!(encoder.len(), 24);
    assert_eq!(encoder.finish().0, vec![0; 24]);
}

#[test]
fn write_bytes_out_of_bounds() {
    let mut encoder = Encoder::new();
    encoder.alloc(4);
    assert_eq!(encoder.write_bytes(6, &[1, 2, 3]), Err(Error::OutOfBounds { offset: 6, len: 3, available: 8 }));
    assert_eq!(encoder.write_bytes(5, &[1, 2, 3]), Ok(()));
    assert_eq!(encoder.finish().0, vec![0, 0, 0, 0, 0, 1, 2, 3]);
}

#[test]
fn claim_in_order() {
    let bytes = [0u8; 24];
    let mut decoder = Decoder::new(&bytes, &[]);
    assert_eq!(decoder.claim(4), Ok(0));
    assert_eq!(decoder.claim(9), Ok(8));
    assert!(decoder.claim(1).is_err());
    assert_eq!(decoder.finish(), Ok(()));
}

#[test]
fn checked_round_up_overflow() {
    assert_eq!(checked_round_up(9), Some(16));
    assert_eq!(checked_round_up(usize::MAX - 7), Some(usize::MAX - 7));
    assert_eq!(checked_round_up(usize::MAX), None);
}

#[test]
fn claim_rejects_lengths_that_overflow() {
    let bytes = [0u8; 16];
    let mut decoder = Decoder::new(&bytes, &[]);
    decoder.claim(8).unwrap();
    assert_eq!(decoder.claim(usize::MAX), Err(Error::OutOfBounds { offset: 8, len: usize::MAX, available: 16 }));
    assert_eq!(decoder.claim(usize::MAX - 7), Err(Error::OutOfBounds { offset: 8, len: usize::MAX - 7, available: 16 }));
    assert_eq!(decoder.remaining(), 8);
    assert!(decoder.read_bytes(usize::MAX, 2).is_err());
}

#[test]
fn claim_elements_checks_the_product() {
    let bytes = [0u8; 32];
    let mut decoder = Decoder::new(&bytes, &[]);
    assert_eq!(decoder.claim_elements(3, 8), Ok(0));
    assert_eq!(
        decoder.claim_elements(1 << 61, 8),
        Err(Error::OutOfBounds { offset: 24, len: usize::MAX, available: 32 })
    );
    assert_eq!(decoder.claim_elements(u64::MAX, 1), Err(Error::OutOfBounds { offset: 24, len: usize::MAX, available: 32 }));
    assert_eq!(decoder.remaining(), 8);
}

#[test]
fn finish_reports_leftovers() {
    let bytes = [0u8; 16];
    let handles = [Handle::from_raw(3)];
    let mut decoder = Decoder::new(&bytes, &handles);
    decoder.claim(8).unwrap();
    assert_eq!(decoder.finish(), Err(Error::ExtraBytes(8)));
    decoder.claim(8).unwrap();
    assert_eq!(decoder.finish(), Err(Error::ExtraHandles(1)));
    assert_eq!(decoder.take_handle(), Ok(Handle::from_raw(3)));
    assert_eq!(decoder.take_handle(), Err(Error::MissingHandle));
    assert_eq!(decoder.finish(), Ok(()));
}

#[test]
fn nesting_is_bounded() {
    fn descend(decoder: &mut Decoder<'_>, levels: usize) -> Result<(), Error> {
        if levels == 0 {
            return Ok(());
        }
        decoder.nested(|decoder| descend(decoder, levels - 1))
    }

    let mut decoder = Decoder::new(&[], &[]);
    assert_eq!(descend(&mut decoder, MAX_DEPTH), Ok(()));
    assert_eq!(descend(&mut decoder, MAX_DEPTH + 1), Err(Error::MaxDepthExceeded(MAX_DEPTH)));
}

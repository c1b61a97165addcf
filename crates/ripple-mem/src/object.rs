//! The object encoding: how a tagged object is laid out in heap bytes.
//!
//! Every object is a LEB128 tag followed by a kind-specific payload. The
//! functions here work on raw byte slices so they can be shared by the
//! heap, the garbage collector, and the persistence loader, which must
//! validate bytes before they are trusted.

use ripple_core::{leb128, Error, Op, Result};

/// A reference to an object: its byte offset in the heap region.
///
/// References are invalidated by any allocation unless pinned; see the
/// pinning API on [`crate::Heap`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ObjRef(pub(crate) u32);

impl ObjRef {
    pub fn offset(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn new(offset: usize) -> Self {
        Self(offset as u32)
    }
}

/// Decode the tag at `at`, returning the op and the payload offset.
pub fn tag_at(mem: &[u8], at: usize) -> Result<(Op, usize)> {
    let mut off = at;
    let tag = leb128::read(mem, &mut off).ok_or(Error::InvalidObject)?;
    let op = Op::from_tag(tag).ok_or(Error::InvalidObject)?;
    Ok((op, off))
}

/// Total encoded size of the object at `at`, including its tag.
pub fn size_at(mem: &[u8], at: usize) -> Result<usize> {
    let (op, payload) = tag_at(mem, at)?;
    let mut off = payload;
    match op {
        // One LEB128 value.
        Op::BasedInteger | Op::Integer | Op::NegInteger | Op::Local => {
            leb128::read(mem, &mut off).ok_or(Error::InvalidObject)?;
        }
        // LEB128 byte length plus that many bytes.
        Op::BasedBignum
        | Op::Bignum
        | Op::NegBignum
        | Op::Text
        | Op::Symbol
        | Op::Comment => {
            let len = leb128::read(mem, &mut off).ok_or(Error::InvalidObject)?;
            off = off.checked_add(len as usize).ok_or(Error::InvalidObject)?;
        }
        // Two embedded sub-objects, no length prefix.
        Op::Fraction
        | Op::NegFraction
        | Op::BigFraction
        | Op::NegBigFraction
        | Op::Rectangular
        | Op::Polar => {
            off += size_at(mem, off)?;
            off += size_at(mem, off)?;
        }
        Op::Decimal => {
            off += 8;
        }
        Op::Grob => {
            let w = leb128::read(mem, &mut off).ok_or(Error::InvalidObject)?;
            let h = leb128::read(mem, &mut off).ok_or(Error::InvalidObject)?;
            let bits = w.checked_mul(h).ok_or(Error::InvalidObject)?;
            off = off
                .checked_add(((bits + 7) / 8) as usize)
                .ok_or(Error::InvalidObject)?;
        }
        // Byte-length prefixed child concatenation.
        _ if is_composite(op) => {
            let len = leb128::read(mem, &mut off).ok_or(Error::InvalidObject)?;
            off = off.checked_add(len as usize).ok_or(Error::InvalidObject)?;
        }
        // Commands carry no payload.
        _ => {}
    }
    if off > mem.len() {
        return Err(Error::InvalidObject);
    }
    Ok(off - at)
}

/// Kinds whose payload is a LEB128 byte length followed by child objects.
pub fn is_composite(op: Op) -> bool {
    matches!(
        op,
        Op::List
            | Op::Array
            | Op::Program
            | Op::Block
            | Op::Expression
            | Op::Tagged
            | Op::Directory
            | Op::Locals
    ) || op.is_control()
}

/// Deep well-formedness check. Returns the total size on success.
///
/// Verifies that every nested child lands exactly on the declared
/// boundary, that text payloads are valid UTF-8, and that declared sizes
/// never escape the buffer.
pub fn validate_at(mem: &[u8], at: usize) -> Result<usize> {
    let (op, payload) = tag_at(mem, at)?;
    let size = size_at(mem, at)?;
    let end = at + size;

    match op {
        Op::Text | Op::Symbol | Op::Comment => {
            let mut off = payload;
            let len = leb128::read(mem, &mut off).ok_or(Error::InvalidObject)? as usize;
            std::str::from_utf8(&mem[off..off + len]).map_err(|_| Error::InvalidObject)?;
        }
        Op::Fraction | Op::NegFraction | Op::BigFraction | Op::NegBigFraction => {
            let mut off = payload;
            for _ in 0..2 {
                let (child, _) = tag_at(mem, off)?;
                if !child.is_integer() || child.is_neg() || child.is_based() {
                    return Err(Error::InvalidObject);
                }
                off += validate_at(mem, off)?;
            }
            if off != end {
                return Err(Error::InvalidObject);
            }
        }
        Op::Rectangular | Op::Polar => {
            let mut off = payload;
            for _ in 0..2 {
                let (child, _) = tag_at(mem, off)?;
                if !child.is_algebraic() {
                    return Err(Error::InvalidObject);
                }
                off += validate_at(mem, off)?;
            }
            if off != end {
                return Err(Error::InvalidObject);
            }
        }
        _ if is_composite(op) => {
            let mut off = payload;
            let len = leb128::read(mem, &mut off).ok_or(Error::InvalidObject)? as usize;
            let body_end = off + len;
            if body_end != end {
                return Err(Error::InvalidObject);
            }
            if op == Op::Locals {
                let count = leb128::read(mem, &mut off).ok_or(Error::InvalidObject)?;
                for _ in 0..count {
                    let (child, _) = tag_at(mem, off)?;
                    if child != Op::Symbol {
                        return Err(Error::InvalidObject);
                    }
                    off += validate_at(mem, off)?;
                }
            }
            while off < body_end {
                off += validate_at(mem, off)?;
            }
            if off != body_end {
                return Err(Error::InvalidObject);
            }
        }
        _ => {}
    }
    Ok(size)
}

/// Iterator over the children of a length-prefixed composite.
pub struct Children<'a> {
    mem: &'a [u8],
    off: usize,
    end: usize,
}

impl<'a> Children<'a> {
    pub fn new(mem: &'a [u8], at: usize) -> Result<Self> {
        let (op, payload) = tag_at(mem, at)?;
        if !is_composite(op) {
            return Err(Error::InvalidObject);
        }
        let mut off = payload;
        let len = leb128::read(mem, &mut off).ok_or(Error::InvalidObject)? as usize;
        Ok(Self {
            mem,
            off,
            end: off + len,
        })
    }

    /// Start the iteration past the locals header (name count and names).
    pub fn rest(mem: &'a [u8], off: usize, end: usize) -> Self {
        Self { mem, off, end }
    }
}

impl Iterator for Children<'_> {
    type Item = Result<ObjRef>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.off >= self.end {
            return None;
        }
        let at = self.off;
        match size_at(self.mem, at) {
            Ok(size) => {
                self.off += size;
                Some(Ok(ObjRef::new(at)))
            }
            Err(e) => {
                self.off = self.end;
                Some(Err(e))
            }
        }
    }
}

//! Typed object constructors and readers.
//!
//! Constructors compute the required size, allocate (which may trigger a
//! collection), and initialize tag and payload in one step; an object is
//! never observable half-built. Anything the caller holds across a
//! constructor call must be pinned.

use ripple_core::magnitude::{self, Magnitude};
use ripple_core::{leb128, Error, Op, Result};

use crate::heap::Heap;
use crate::object::{self, Children, ObjRef};

impl Heap {
    /// Allocate and fill an object from pre-encoded bytes.
    fn make_raw(&mut self, bytes: &[u8]) -> Result<ObjRef> {
        let at = self.alloc(bytes.len())?;
        self.mem[at..at + bytes.len()].copy_from_slice(bytes);
        Ok(ObjRef::new(at))
    }

    /// Allocate an object from externally produced encoded bytes,
    /// validating them first. Used by the persistence loader and the
    /// expression engine.
    pub fn make_from_bytes(&mut self, bytes: &[u8]) -> Result<ObjRef> {
        let size = object::validate_at(bytes, 0)?;
        if size != bytes.len() {
            return Err(Error::InvalidObject);
        }
        self.make_raw(bytes)
    }

    /// A small integer of the given kind with a LEB128 magnitude.
    pub fn make_small(&mut self, op: Op, value: u64) -> Result<ObjRef> {
        let mut bytes = Vec::with_capacity(12);
        leb128::write(op.tag(), &mut bytes);
        leb128::write(value, &mut bytes);
        self.make_raw(&bytes)
    }

    /// A signed 64-bit integer, choosing the tag from the sign.
    pub fn make_int(&mut self, value: i64) -> Result<ObjRef> {
        if value < 0 {
            self.make_small(Op::NegInteger, value.unsigned_abs())
        } else {
            self.make_small(Op::Integer, value as u64)
        }
    }

    /// A bignum-kind object from a little-endian magnitude.
    pub fn make_bignum(&mut self, op: Op, mag: &[u8]) -> Result<ObjRef> {
        let mag = &mag[..mag.len() - mag.iter().rev().take_while(|&&b| b == 0).count()];
        let mut bytes = Vec::with_capacity(mag.len() + 8);
        leb128::write(op.tag(), &mut bytes);
        leb128::write(mag.len() as u64, &mut bytes);
        bytes.extend_from_slice(mag);
        self.make_raw(&bytes)
    }

    /// An integer from sign and magnitude, demoted to a small kind when
    /// the magnitude fits 64 bits.
    pub fn make_integer(&mut self, neg: bool, mag: &[u8]) -> Result<ObjRef> {
        match magnitude::to_u64(mag) {
            Some(value) => {
                let op = if neg && value != 0 {
                    Op::NegInteger
                } else {
                    Op::Integer
                };
                self.make_small(op, value)
            }
            None => {
                let op = if neg { Op::NegBignum } else { Op::Bignum };
                self.make_bignum(op, mag)
            }
        }
    }

    /// A based integer from a magnitude, small kind when it fits.
    pub fn make_based(&mut self, mag: &[u8]) -> Result<ObjRef> {
        match magnitude::to_u64(mag) {
            Some(value) => self.make_small(Op::BasedInteger, value),
            None => self.make_bignum(Op::BasedBignum, mag),
        }
    }

    pub fn make_decimal(&mut self, value: f64) -> Result<ObjRef> {
        let mut bytes = Vec::with_capacity(10);
        leb128::write(Op::Decimal.tag(), &mut bytes);
        bytes.extend_from_slice(&value.to_le_bytes());
        self.make_raw(&bytes)
    }

    /// Text, symbol or comment: length-prefixed UTF-8.
    pub fn make_str(&mut self, op: Op, s: &str) -> Result<ObjRef> {
        let mut bytes = Vec::with_capacity(s.len() + 8);
        leb128::write(op.tag(), &mut bytes);
        leb128::write(s.len() as u64, &mut bytes);
        bytes.extend_from_slice(s.as_bytes());
        self.make_raw(&bytes)
    }

    /// A bare command object.
    pub fn make_command(&mut self, op: Op) -> Result<ObjRef> {
        let mut bytes = Vec::with_capacity(4);
        leb128::write(op.tag(), &mut bytes);
        self.make_raw(&bytes)
    }

    pub fn make_local(&mut self, index: usize) -> Result<ObjRef> {
        self.make_small(Op::Local, index as u64)
    }

    /// A length-prefixed composite from already-built children. The
    /// children are pinned across the allocation.
    pub fn make_composite(&mut self, op: Op, children: &[ObjRef]) -> Result<ObjRef> {
        debug_assert!(object::is_composite(op));
        let pins: Vec<_> = children.iter().map(|&c| self.pin(c)).collect();
        let result = self.build_composite(op, &pins, &[]);
        self.unpin_all(pins);
        result
    }

    /// A locals declaration: name count, name symbols, then the body.
    pub fn make_locals(&mut self, names: &[ObjRef], body: ObjRef) -> Result<ObjRef> {
        let mut pins: Vec<_> = names.iter().map(|&c| self.pin(c)).collect();
        pins.push(self.pin(body));
        let mut head = Vec::new();
        leb128::write(names.len() as u64, &mut head);
        let result = self.build_composite(Op::Locals, &pins, &head);
        self.unpin_all(pins);
        result
    }

    /// Shared tail of the composite builders: computes the payload size
    /// from pinned children, allocates, then copies each child in.
    fn build_composite(
        &mut self,
        op: Op,
        pins: &[crate::heap::PinHandle],
        head: &[u8],
    ) -> Result<ObjRef> {
        let mut payload = head.len();
        for pin in pins {
            let child = self.pinned(pin).expect("strong pin");
            payload += self.size(child)?;
        }
        let mut header = Vec::with_capacity(8);
        leb128::write(op.tag(), &mut header);
        leb128::write(payload as u64, &mut header);

        let at = self.alloc(header.len() + payload)?;
        let mut off = at;
        self.mem[off..off + header.len()].copy_from_slice(&header);
        off += header.len();
        self.mem[off..off + head.len()].copy_from_slice(head);
        off += head.len();
        for pin in pins {
            let child = self.pinned(pin).expect("strong pin").offset();
            let size = object::size_at(&self.mem, child)?;
            self.mem.copy_within(child..child + size, off);
            off += size;
        }
        Ok(ObjRef::new(at))
    }

    /// A composite from a raw pre-encoded payload (used by the rewrite
    /// engine and the rule builder, which assemble payload bytes).
    pub fn make_composite_raw(&mut self, op: Op, payload: &[u8]) -> Result<ObjRef> {
        debug_assert!(object::is_composite(op));
        let mut bytes = Vec::with_capacity(payload.len() + 8);
        leb128::write(op.tag(), &mut bytes);
        leb128::write(payload.len() as u64, &mut bytes);
        bytes.extend_from_slice(payload);
        self.make_raw(&bytes)
    }

    /// A fraction built from sign and component magnitudes. Components
    /// are embedded as unsigned integer objects; big components promote
    /// the whole fraction to a big kind.
    pub fn make_fraction(&mut self, neg: bool, num: &[u8], den: &[u8]) -> Result<ObjRef> {
        let small = num.len() <= 8 && den.len() <= 8;
        let op = match (neg, small) {
            (false, true) => Op::Fraction,
            (true, true) => Op::NegFraction,
            (false, false) => Op::BigFraction,
            (true, false) => Op::NegBigFraction,
        };
        let mut bytes = Vec::new();
        leb128::write(op.tag(), &mut bytes);
        if small {
            leb128::write(Op::Integer.tag(), &mut bytes);
            leb128::write(magnitude::to_u64(num).expect("fits"), &mut bytes);
            leb128::write(Op::Integer.tag(), &mut bytes);
            leb128::write(magnitude::to_u64(den).expect("fits"), &mut bytes);
        } else {
            for mag in [num, den] {
                leb128::write(Op::Bignum.tag(), &mut bytes);
                leb128::write(mag.len() as u64, &mut bytes);
                bytes.extend_from_slice(mag);
            }
        }
        self.make_raw(&bytes)
    }

    /// A complex number from two algebraic parts.
    pub fn make_complex(&mut self, op: Op, re: ObjRef, im: ObjRef) -> Result<ObjRef> {
        debug_assert!(matches!(op, Op::Rectangular | Op::Polar));
        let pins = vec![self.pin(re), self.pin(im)];
        let result = (|heap: &mut Heap| {
            let mut payload = 0;
            for pin in &pins {
                payload += heap.size(heap.pinned(pin).expect("strong pin"))?;
            }
            let mut header = Vec::with_capacity(4);
            leb128::write(op.tag(), &mut header);
            let at = heap.alloc(header.len() + payload)?;
            let mut off = at;
            heap.mem[off..off + header.len()].copy_from_slice(&header);
            off += header.len();
            for pin in &pins {
                let child = heap.pinned(pin).expect("strong pin").offset();
                let size = object::size_at(&heap.mem, child)?;
                heap.mem.copy_within(child..child + size, off);
                off += size;
            }
            Ok(ObjRef::new(at))
        })(self);
        self.unpin_all(pins);
        result
    }

    /// A graphic object from dimensions and packed bits.
    pub fn make_grob(&mut self, width: u32, height: u32, data: &[u8]) -> Result<ObjRef> {
        let expected = ((width as usize * height as usize) + 7) / 8;
        if data.len() != expected {
            return Err(Error::Dimension);
        }
        let mut bytes = Vec::with_capacity(data.len() + 12);
        leb128::write(Op::Grob.tag(), &mut bytes);
        leb128::write(width as u64, &mut bytes);
        leb128::write(height as u64, &mut bytes);
        bytes.extend_from_slice(data);
        self.make_raw(&bytes)
    }

    // ========================================================================
    // Readers
    // ========================================================================

    /// The LEB128 payload of a small integer, based integer or local.
    pub fn small_value(&self, r: ObjRef) -> Result<u64> {
        let (op, mut off) = object::tag_at(&self.mem, r.offset())?;
        match op {
            Op::BasedInteger | Op::Integer | Op::NegInteger | Op::Local => {
                leb128::read(&self.mem, &mut off).ok_or(Error::InvalidObject)
            }
            _ => Err(Error::Type),
        }
    }

    /// Signed value of a small integer kind.
    pub fn int_value(&self, r: ObjRef) -> Result<i64> {
        let op = self.op_of(r)?;
        let value = self.small_value(r)? as i64;
        Ok(if op == Op::NegInteger { -value } else { value })
    }

    /// The magnitude of any integer kind, as an owned buffer.
    pub fn magnitude_of(&self, r: ObjRef) -> Result<Magnitude> {
        let (op, mut off) = object::tag_at(&self.mem, r.offset())?;
        match op {
            Op::BasedInteger | Op::Integer | Op::NegInteger => {
                let value = leb128::read(&self.mem, &mut off).ok_or(Error::InvalidObject)?;
                Ok(magnitude::from_u64(value))
            }
            Op::BasedBignum | Op::Bignum | Op::NegBignum => {
                let len =
                    leb128::read(&self.mem, &mut off).ok_or(Error::InvalidObject)? as usize;
                Ok(Magnitude::from_slice(&self.mem[off..off + len]))
            }
            _ => Err(Error::Type),
        }
    }

    pub fn decimal_value(&self, r: ObjRef) -> Result<f64> {
        let (op, off) = object::tag_at(&self.mem, r.offset())?;
        if op != Op::Decimal {
            return Err(Error::Type);
        }
        let bytes: [u8; 8] = self.mem[off..off + 8]
            .try_into()
            .map_err(|_| Error::InvalidObject)?;
        Ok(f64::from_le_bytes(bytes))
    }

    /// The UTF-8 payload of a text, symbol or comment.
    pub fn str_value(&self, r: ObjRef) -> Result<&str> {
        let (op, mut off) = object::tag_at(&self.mem, r.offset())?;
        match op {
            Op::Text | Op::Symbol | Op::Comment => {
                let len =
                    leb128::read(&self.mem, &mut off).ok_or(Error::InvalidObject)? as usize;
                std::str::from_utf8(&self.mem[off..off + len]).map_err(|_| Error::InvalidObject)
            }
            _ => Err(Error::Type),
        }
    }

    /// Children of a length-prefixed composite, collected up front so the
    /// caller can allocate while iterating.
    pub fn children_of(&self, r: ObjRef) -> Result<Vec<ObjRef>> {
        Children::new(&self.mem, r.offset())?.collect()
    }

    /// The raw child-concatenation bytes of a length-prefixed composite.
    pub fn composite_payload(&self, r: ObjRef) -> Result<&[u8]> {
        let (op, mut off) = object::tag_at(&self.mem, r.offset())?;
        if !object::is_composite(op) {
            return Err(Error::Type);
        }
        let len = leb128::read(&self.mem, &mut off).ok_or(Error::InvalidObject)? as usize;
        Ok(&self.mem[off..off + len])
    }

    /// The two embedded sub-objects of a fraction or complex.
    pub fn pair_of(&self, r: ObjRef) -> Result<(ObjRef, ObjRef)> {
        let (op, payload) = object::tag_at(&self.mem, r.offset())?;
        if !op.is_fraction() && !op.is_complex() {
            return Err(Error::Type);
        }
        let first = ObjRef::new(payload);
        let second = ObjRef::new(payload + object::size_at(&self.mem, payload)?);
        Ok((first, second))
    }

    pub fn local_index(&self, r: ObjRef) -> Result<usize> {
        let (op, mut off) = object::tag_at(&self.mem, r.offset())?;
        if op != Op::Local {
            return Err(Error::Type);
        }
        Ok(leb128::read(&self.mem, &mut off).ok_or(Error::InvalidObject)? as usize)
    }

    /// Declared names and body of a locals block.
    pub fn locals_parts(&self, r: ObjRef) -> Result<(Vec<ObjRef>, ObjRef)> {
        let (op, mut off) = object::tag_at(&self.mem, r.offset())?;
        if op != Op::Locals {
            return Err(Error::Type);
        }
        let len = leb128::read(&self.mem, &mut off).ok_or(Error::InvalidObject)? as usize;
        let end = off + len;
        let count = leb128::read(&self.mem, &mut off).ok_or(Error::InvalidObject)? as usize;
        let mut names = Vec::with_capacity(count);
        for _ in 0..count {
            names.push(ObjRef::new(off));
            off += object::size_at(&self.mem, off)?;
        }
        if off >= end {
            return Err(Error::InvalidObject);
        }
        Ok((names, ObjRef::new(off)))
    }

    /// Width, height and packed bits of a grob.
    pub fn grob_parts(&self, r: ObjRef) -> Result<(u32, u32, &[u8])> {
        let (op, mut off) = object::tag_at(&self.mem, r.offset())?;
        if op != Op::Grob {
            return Err(Error::Type);
        }
        let w = leb128::read(&self.mem, &mut off).ok_or(Error::InvalidObject)? as u32;
        let h = leb128::read(&self.mem, &mut off).ok_or(Error::InvalidObject)? as u32;
        let bytes = ((w as usize * h as usize) + 7) / 8;
        Ok((w, h, &self.mem[off..off + bytes]))
    }

    /// Is the integer object zero?
    pub fn is_zero_int(&self, r: ObjRef) -> Result<bool> {
        Ok(magnitude::is_zero(&self.magnitude_of(r)?))
    }
}

//! Mark-compact collection of the temporaries zone.
//!
//! Children are embedded in their parents, so reachability reduces to
//! the byte ranges referenced by the roots: the operand stack, locals
//! frames, the argument and undo snapshots, and strong pins. Overlapping
//! ranges (a root pointing at a child inside another live object) merge
//! into a single block, which preserves parent-relative offsets when the
//! block slides.
//!
//! The globals zone is always live and never moves here; the scratchpad
//! sits at the top of the region and is not touched, but its contents
//! are only tracked across a collection when pinned.

use crate::heap::Heap;
use crate::object::{self, ObjRef};

/// A maximal run of live bytes and where it slides to.
#[derive(Copy, Clone, Debug)]
struct Block {
    old: usize,
    len: usize,
    new: usize,
}

impl Heap {
    /// Collect the temporaries zone. Returns the number of bytes
    /// reclaimed. Every root and pin is rewritten to the new layout;
    /// weak pins whose referent died read back as `None` afterwards.
    pub fn gc(&mut self) -> usize {
        self.gc_runs += 1;
        let before = self.temps_end;

        // Mark: gather the ranges reachable from the roots.
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        let mut roots: Vec<ObjRef> = Vec::new();
        roots.extend_from_slice(&self.stack);
        roots.extend_from_slice(&self.last_args);
        roots.extend_from_slice(&self.undo);
        roots.extend_from_slice(&self.undo_staged);
        for frame in &self.frames {
            for (_, value) in &frame.slots {
                roots.push(*value);
            }
        }
        for slot in &self.pins {
            if slot.strong {
                if let Some(at) = slot.at {
                    roots.push(ObjRef(at));
                }
            }
        }

        for root in roots {
            let at = root.offset();
            if at < self.globals_end || at >= self.temps_end {
                continue; // globals are permanent; stale refs are dead
            }
            if let Ok(size) = object::size_at(&self.mem, at) {
                ranges.push((at, size));
            }
        }

        // Merge nested, overlapping and adjacent ranges into blocks.
        ranges.sort_unstable();
        let mut blocks: Vec<Block> = Vec::with_capacity(ranges.len());
        for (start, len) in ranges {
            let end = start + len;
            match blocks.last_mut() {
                Some(block) if start <= block.old + block.len => {
                    let block_end = block.old + block.len;
                    if end > block_end {
                        block.len = end - block.old;
                    }
                }
                _ => blocks.push(Block {
                    old: start,
                    len,
                    new: 0,
                }),
            }
        }

        // Compact: slide blocks down toward the globals zone.
        let mut cursor = self.globals_end;
        for block in &mut blocks {
            block.new = cursor;
            self.mem.copy_within(block.old..block.old + block.len, cursor);
            cursor += block.len;
        }
        self.temps_end = cursor;

        // Remap every tracked reference.
        let remap = |r: ObjRef, blocks: &[Block], globals_end: usize| -> Option<ObjRef> {
            let at = r.offset();
            if at < globals_end {
                return Some(r);
            }
            let idx = blocks.partition_point(|b| b.old + b.len <= at);
            let block = blocks.get(idx)?;
            if at >= block.old && at < block.old + block.len {
                Some(ObjRef::new(at - block.old + block.new))
            } else {
                None
            }
        };

        let globals_end = self.globals_end;
        for r in self
            .stack
            .iter_mut()
            .chain(self.last_args.iter_mut())
            .chain(self.undo.iter_mut())
            .chain(self.undo_staged.iter_mut())
        {
            *r = remap(*r, &blocks, globals_end).expect("root survives its own collection");
        }
        for frame in &mut self.frames {
            for (_, value) in &mut frame.slots {
                *value = remap(*value, &blocks, globals_end)
                    .expect("root survives its own collection");
            }
        }
        for slot in &mut self.pins {
            if let Some(at) = slot.at {
                slot.at = remap(ObjRef(at), &blocks, globals_end).map(|r| r.0);
            }
        }

        before - self.temps_end
    }
}

//! The heap: one contiguous byte region holding every object.
//!
//! Layout, low to high address:
//!
//! ```text
//! [ globals | temporaries | ...free... | scratchpad ]
//! ```
//!
//! Globals are owned by directory entries and never collected;
//! temporaries are reclaimed by mark-compact GC; the scratchpad grows
//! downward from the top and is strictly LIFO per kernel call. The
//! operand stack, locals frames and pin table hold typed offsets into
//! the region and are rewritten whenever objects move.

use ripple_core::{Error, Op, Result};

use crate::directory::DirectoryTree;
use crate::object::{self, ObjRef};

/// Default heap capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 1 << 20;

/// Default operand stack depth limit.
const DEFAULT_MAX_DEPTH: usize = 8192;

/// A locals frame: named slots bound on program entry.
#[derive(Clone, Debug, Default)]
pub struct Frame {
    pub(crate) slots: Vec<(String, ObjRef)>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: String, value: ObjRef) {
        self.slots.push((name, value));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A registered reference slot, rewritten by the collector.
#[derive(Copy, Clone, Debug)]
pub(crate) struct PinSlot {
    pub(crate) at: Option<u32>,
    pub(crate) strong: bool,
}

/// Handle to a pinned reference. Handles must be released in LIFO order.
#[derive(Debug)]
#[must_use]
pub struct PinHandle(usize);

pub struct Heap {
    pub(crate) mem: Box<[u8]>,
    /// End of the globals zone.
    pub(crate) globals_end: usize,
    /// End of the temporaries zone (the allocation cursor).
    pub(crate) temps_end: usize,
    /// Bytes currently allocated at the top of the region.
    pub(crate) scratch_len: usize,
    /// Operand stack: references into globals or temporaries.
    pub(crate) stack: Vec<ObjRef>,
    /// Locals frames, outermost first.
    pub(crate) frames: Vec<Frame>,
    /// LIFO pinned-reference table.
    pub(crate) pins: Vec<PinSlot>,
    /// Snapshot of the last command's arguments.
    pub(crate) last_args: Vec<ObjRef>,
    /// Snapshot of the stack before the previous top-level evaluation.
    pub(crate) undo: Vec<ObjRef>,
    /// Snapshot taken at the start of the current evaluation, promoted
    /// into `undo` when it completes.
    pub(crate) undo_staged: Vec<ObjRef>,
    /// Named-variable tree; values point into the globals zone.
    pub(crate) dirs: DirectoryTree,
    max_depth: usize,
    pub(crate) gc_runs: u64,
}

impl Heap {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            mem: vec![0u8; capacity].into_boxed_slice(),
            globals_end: 0,
            temps_end: 0,
            scratch_len: 0,
            stack: Vec::new(),
            frames: Vec::new(),
            pins: Vec::new(),
            last_args: Vec::new(),
            undo: Vec::new(),
            undo_staged: Vec::new(),
            dirs: DirectoryTree::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            gc_runs: 0,
        }
    }

    /// Raw bytes, for readers (parser spans, renderer, persistence).
    pub fn bytes(&self) -> &[u8] {
        &self.mem
    }

    /// Free bytes between the temporaries zone and the scratchpad.
    pub fn free(&self) -> usize {
        self.mem.len() - self.scratch_len - self.temps_end
    }

    pub fn capacity(&self) -> usize {
        self.mem.len()
    }

    pub fn globals_bytes(&self) -> usize {
        self.globals_end
    }

    pub fn temps_bytes(&self) -> usize {
        self.temps_end - self.globals_end
    }

    pub fn gc_runs(&self) -> u64 {
        self.gc_runs
    }

    pub fn in_globals(&self, r: ObjRef) -> bool {
        r.offset() < self.globals_end
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Allocate `n` bytes in the temporaries zone, collecting garbage if
    /// needed. Every unpinned reference is invalidated by this call.
    pub(crate) fn alloc(&mut self, n: usize) -> Result<usize> {
        if self.free() < n {
            self.gc();
            if self.free() < n {
                return Err(Error::OutOfMemory);
            }
        }
        let at = self.temps_end;
        self.temps_end += n;
        Ok(at)
    }

    /// Allocate `n` bytes of scratchpad, zero-filled.
    ///
    /// Scratch allocations survive GC without moving, but must be freed
    /// in LIFO order before the allocating operation returns.
    pub fn scratch_alloc(&mut self, n: usize) -> Result<usize> {
        if self.free() < n {
            self.gc();
            if self.free() < n {
                return Err(Error::OutOfMemory);
            }
        }
        self.scratch_len += n;
        let at = self.mem.len() - self.scratch_len;
        self.mem[at..at + n].fill(0);
        Ok(at)
    }

    /// Release the most recent `n` bytes of scratchpad.
    pub fn scratch_free(&mut self, n: usize) {
        debug_assert!(n <= self.scratch_len);
        self.scratch_len -= n;
    }

    // ========================================================================
    // Pinned references
    // ========================================================================

    /// Register a strong pin: a GC root that keeps the referent alive and
    /// tracks it across compaction.
    pub fn pin(&mut self, r: ObjRef) -> PinHandle {
        self.pins.push(PinSlot {
            at: Some(r.0),
            strong: true,
        });
        PinHandle(self.pins.len() - 1)
    }

    /// Register a relocating view: rewritten by GC, but not a root. If
    /// nothing else keeps the referent alive it reads back as `None`.
    pub fn pin_weak(&mut self, r: ObjRef) -> PinHandle {
        self.pins.push(PinSlot {
            at: Some(r.0),
            strong: false,
        });
        PinHandle(self.pins.len() - 1)
    }

    /// Current address of a pinned reference.
    pub fn pinned(&self, handle: &PinHandle) -> Option<ObjRef> {
        self.pins[handle.0].at.map(ObjRef)
    }

    /// Release a pin. Pins are a LIFO discipline.
    pub fn unpin(&mut self, handle: PinHandle) {
        debug_assert_eq!(handle.0, self.pins.len() - 1, "pins are LIFO");
        self.pins.truncate(handle.0);
    }

    /// Release a batch of pins acquired in order.
    pub fn unpin_all(&mut self, handles: Vec<PinHandle>) {
        for handle in handles.into_iter().rev() {
            self.unpin(handle);
        }
    }

    /// Drop every pin. Used by top-level error recovery, which unwinds
    /// all in-flight operations at once.
    pub fn clear_pins(&mut self) {
        self.pins.clear();
    }

    // ========================================================================
    // Operand stack
    // ========================================================================

    pub fn push(&mut self, r: ObjRef) -> Result<()> {
        if self.stack.len() >= self.max_depth {
            return Err(Error::OutOfMemory);
        }
        self.stack.push(r);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<ObjRef> {
        self.stack.pop().ok_or(Error::MissingArgument)
    }

    /// Depth 0 is the top of the stack.
    pub fn peek(&self, depth: usize) -> Result<ObjRef> {
        if depth >= self.stack.len() {
            return Err(Error::MissingArgument);
        }
        Ok(self.stack[self.stack.len() - 1 - depth])
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    /// Drop the top `n` entries.
    pub fn drop_n(&mut self, n: usize) -> Result<()> {
        if n > self.stack.len() {
            return Err(Error::MissingArgument);
        }
        let keep = self.stack.len() - n;
        self.stack.truncate(keep);
        Ok(())
    }

    /// Move level `n` (1-based) to the top.
    pub fn roll(&mut self, n: usize) -> Result<()> {
        if n == 0 || n > self.stack.len() {
            return Err(Error::MissingArgument);
        }
        let start = self.stack.len() - n;
        self.stack[start..].rotate_left(1);
        Ok(())
    }

    /// Move the top to level `n` (1-based).
    pub fn roll_down(&mut self, n: usize) -> Result<()> {
        if n == 0 || n > self.stack.len() {
            return Err(Error::MissingArgument);
        }
        let start = self.stack.len() - n;
        self.stack[start..].rotate_right(1);
        Ok(())
    }

    /// Copy level `n` (1-based) to the top.
    pub fn pick(&mut self, n: usize) -> Result<()> {
        if n == 0 {
            return Err(Error::Value);
        }
        let r = self.peek(n - 1)?;
        self.push(r)
    }

    pub fn stack_snapshot(&self) -> Vec<ObjRef> {
        self.stack.clone()
    }

    pub fn restore_stack(&mut self, snapshot: Vec<ObjRef>) {
        self.stack = snapshot;
    }

    /// Record the arguments a command is about to consume.
    pub fn save_last_args(&mut self, args: Vec<ObjRef>) {
        self.last_args = args;
    }

    /// Push the saved arguments back, deepest first.
    pub fn push_last_args(&mut self) -> Result<()> {
        for r in self.last_args.clone() {
            self.push(r)?;
        }
        Ok(())
    }

    pub fn save_undo(&mut self) {
        self.undo = self.stack.clone();
    }

    pub fn apply_undo(&mut self) {
        self.stack = self.undo.clone();
    }

    /// Record the current stack at the start of a top-level evaluation.
    /// `undo` keeps serving the previous snapshot until [`promote_undo`]
    /// runs, so an `undo` inside this evaluation reaches back one line.
    ///
    /// [`promote_undo`]: Heap::promote_undo
    pub fn stage_undo(&mut self) {
        self.undo_staged = self.stack.clone();
    }

    pub fn promote_undo(&mut self) {
        self.undo = std::mem::take(&mut self.undo_staged);
    }

    // ========================================================================
    // Locals frames
    // ========================================================================

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Resolve a flat local index: slot 0 is the first binding of the
    /// innermost frame, continuing outward.
    pub fn local(&self, index: usize) -> Result<ObjRef> {
        let mut idx = index;
        for frame in self.frames.iter().rev() {
            if idx < frame.slots.len() {
                return Ok(frame.slots[idx].1);
            }
            idx -= frame.slots.len();
        }
        Err(Error::InvalidLocal)
    }

    /// Name of the slot at a flat index, for rendering and diagnostics.
    pub fn local_name(&self, index: usize) -> Result<&str> {
        let mut idx = index;
        for frame in self.frames.iter().rev() {
            if idx < frame.slots.len() {
                return Ok(&frame.slots[idx].0);
            }
            idx -= frame.slots.len();
        }
        Err(Error::InvalidLocal)
    }

    /// Rebind a flat local slot.
    pub fn set_local(&mut self, index: usize, value: ObjRef) -> Result<()> {
        let mut idx = index;
        for frame in self.frames.iter_mut().rev() {
            if idx < frame.slots.len() {
                frame.slots[idx].1 = value;
                return Ok(());
            }
            idx -= frame.slots.len();
        }
        Err(Error::InvalidLocal)
    }

    /// Find a local by name, innermost frame first, returning its flat
    /// index and value.
    pub fn local_by_name(&self, name: &str) -> Option<(usize, ObjRef)> {
        let mut base = 0;
        for frame in self.frames.iter().rev() {
            for (i, (slot, value)) in frame.slots.iter().enumerate() {
                if slot == name {
                    return Some((base + i, *value));
                }
            }
            base += frame.slots.len();
        }
        None
    }

    // ========================================================================
    // Object inspection
    // ========================================================================

    pub fn op_of(&self, r: ObjRef) -> Result<Op> {
        object::tag_at(&self.mem, r.offset()).map(|(op, _)| op)
    }

    pub fn size(&self, r: ObjRef) -> Result<usize> {
        object::size_at(&self.mem, r.offset())
    }

    /// The full encoded bytes of an object.
    pub fn obj_bytes(&self, r: ObjRef) -> Result<&[u8]> {
        let size = self.size(r)?;
        Ok(&self.mem[r.offset()..r.offset() + size])
    }

    /// Bit-exact object equality.
    pub fn obj_eq(&self, a: ObjRef, b: ObjRef) -> Result<bool> {
        Ok(self.obj_bytes(a)? == self.obj_bytes(b)?)
    }

    /// Rebuild a child reference from its (pinned) parent and the
    /// child's offset relative to the parent. The evaluator walks
    /// composite children this way so the references survive motion of
    /// the parent.
    pub fn child_ref(&self, parent: ObjRef, rel: usize) -> ObjRef {
        ObjRef::new(parent.offset() + rel)
    }

    /// Copy an object's bytes into fresh temporaries.
    pub fn copy_object(&mut self, r: ObjRef) -> Result<ObjRef> {
        let pin = self.pin(r);
        let size = self.size(r)?;
        let at = match self.alloc(size) {
            Ok(at) => at,
            Err(e) => {
                self.unpin(pin);
                return Err(e);
            }
        };
        let src = self.pinned(&pin).expect("strong pin").offset();
        self.mem.copy_within(src..src + size, at);
        self.unpin(pin);
        Ok(ObjRef::new(at))
    }

    // ========================================================================
    // Globals zone
    // ========================================================================

    /// Copy the object at `r` to the end of the globals zone, shifting
    /// the temporaries zone up. Returns the new global reference.
    pub(crate) fn insert_global(&mut self, r: ObjRef) -> Result<ObjRef> {
        let pin = self.pin(r);
        let size = self.size(r)?;
        if self.free() < size {
            self.gc();
            if self.free() < size {
                self.unpin(pin);
                return Err(Error::OutOfMemory);
            }
        }
        let src = self.pinned(&pin).expect("strong pin").offset();
        self.unpin(pin);

        let at = self.globals_end;
        // Slide the temporaries zone up to open the gap.
        self.mem.copy_within(at..self.temps_end, at + size);
        // The source itself moved if it was a temporary.
        let src = if src >= at { src + size } else { src };
        self.mem.copy_within(src..src + size, at);
        self.globals_end += size;
        self.temps_end += size;
        let threshold = at;
        self.shift_refs(threshold, size as isize);
        Ok(ObjRef::new(at))
    }

    /// Remove the object at `at` from the globals zone, closing the gap.
    pub(crate) fn remove_global(&mut self, r: ObjRef) -> Result<()> {
        debug_assert!(self.in_globals(r));
        let size = self.size(r)?;
        let at = r.offset();
        self.mem.copy_within(at + size..self.temps_end, at);
        self.globals_end -= size;
        self.temps_end -= size;
        self.shift_refs(at, -(size as isize));
        Ok(())
    }

    /// Adjust every tracked reference at or above `threshold` by `delta`.
    /// Used when the globals zone grows or shrinks.
    fn shift_refs(&mut self, threshold: usize, delta: isize) {
        let fix = |r: &mut ObjRef| {
            if r.offset() >= threshold {
                *r = ObjRef::new((r.offset() as isize + delta) as usize);
            }
        };
        self.stack.iter_mut().for_each(fix);
        self.last_args.iter_mut().for_each(fix);
        self.undo.iter_mut().for_each(fix);
        self.undo_staged.iter_mut().for_each(fix);
        for frame in &mut self.frames {
            for (_, value) in &mut frame.slots {
                fix(value);
            }
        }
        for slot in &mut self.pins {
            if let Some(at) = slot.at {
                if at as usize >= threshold {
                    slot.at = Some((at as isize + delta) as u32);
                }
            }
        }
        self.dirs.shift_refs(threshold, delta);
    }

    /// The directory tree.
    pub fn dirs(&self) -> &DirectoryTree {
        &self.dirs
    }

    pub fn dirs_mut(&mut self) -> &mut DirectoryTree {
        &mut self.dirs
    }

    /// Store `value` under `name` in the current directory. Replaces any
    /// existing variable of that name.
    pub fn sto(&mut self, name: &str, value: ObjRef) -> Result<()> {
        // Removing the old binding shifts the temporaries zone, so track
        // the incoming value across it.
        let pin = self.pin(value);
        if let Some(old) = self.dirs.unbind(name) {
            if let Err(e) = self.remove_global(old) {
                self.unpin(pin);
                return Err(e);
            }
        }
        let value = self.pinned(&pin).expect("strong pin");
        self.unpin(pin);
        let global = self.insert_global(value)?;
        self.dirs.bind(name.to_string(), global);
        Ok(())
    }

    /// Recall `name` from the current directory (no parent walk),
    /// copying the object back into temporaries.
    pub fn rcl(&mut self, name: &str) -> Result<ObjRef> {
        let global = self.dirs.recall(name).ok_or(Error::UndefinedName)?;
        self.copy_object(global)
    }

    /// Recall `name`, walking parent directories as symbol resolution
    /// does. Returns a fresh temporary copy.
    pub fn rcl_walk(&mut self, name: &str) -> Option<ObjRef> {
        let global = self.dirs.recall_walk(name)?;
        self.copy_object(global).ok()
    }

    /// Delete `name` from the current directory.
    pub fn purge(&mut self, name: &str) -> Result<()> {
        let old = self.dirs.unbind(name).ok_or(Error::UndefinedName)?;
        self.remove_global(old)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

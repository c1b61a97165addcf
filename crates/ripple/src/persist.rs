//! Bit-exact object persistence.
//!
//! Saves the directory tree and the operand stack as the objects' heap
//! bytes, verbatim. Tag values are stable (the opcode table only ever
//! grows at the end), so saved images remain loadable across versions.
//! The loader validates every object before it enters the heap.
//!
//! Layout: magic, format version, then the root directory (recursively:
//! variable count, name/object pairs, subdirectory count, named
//! subdirectories), then the stack bottom to top.

use ripple_core::{leb128, Error, Result};
use ripple_vm::Runtime;

const MAGIC: &[u8; 4] = b"RPLO";
const VERSION: u64 = 1;

/// Serialize the runtime's directories and stack.
pub fn save(rt: &Runtime) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    leb128::write(VERSION, &mut out);

    write_directory(rt, rt.heap.dirs().root(), &mut out)?;

    let depth = rt.heap.depth();
    leb128::write(depth as u64, &mut out);
    for i in (0..depth).rev() {
        let obj = rt.heap.peek(i)?;
        write_object(rt, obj, &mut out)?;
    }
    Ok(out)
}

fn write_object(rt: &Runtime, obj: ripple_mem::ObjRef, out: &mut Vec<u8>) -> Result<()> {
    let bytes = rt.heap.obj_bytes(obj)?;
    leb128::write(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
    Ok(())
}

fn write_directory(
    rt: &Runtime,
    dir: &ripple_mem::Directory,
    out: &mut Vec<u8>,
) -> Result<()> {
    leb128::write(dir.var_count() as u64, out);
    for name in dir.var_names() {
        write_str(name, out);
        let obj = dir.recall(name).expect("listed name resolves");
        write_object(rt, obj, out)?;
    }
    let subdirs: Vec<&String> = dir.subdir_names().collect();
    leb128::write(subdirs.len() as u64, out);
    for name in subdirs {
        write_str(name, out);
        let sub = dir.get_subdir(name).expect("listed name resolves");
        write_directory(rt, sub, out)?;
    }
    Ok(())
}

fn write_str(s: &str, out: &mut Vec<u8>) {
    leb128::write(s.len() as u64, out);
    out.extend_from_slice(s.as_bytes());
}

/// Load a saved image into a runtime, replacing its directories and
/// stack. Every object is validated byte for byte before use.
pub fn load(rt: &mut Runtime, bytes: &[u8]) -> Result<()> {
    let mut off = 0;
    if bytes.len() < 4 || &bytes[..4] != MAGIC {
        return Err(Error::InvalidObject);
    }
    off += 4;
    let version = leb128::read(bytes, &mut off).ok_or(Error::InvalidObject)?;
    if version != VERSION {
        return Err(Error::InvalidObject);
    }

    rt.heap.clear_stack();
    rt.heap.dirs_mut().home();
    read_directory(rt, bytes, &mut off)?;
    rt.heap.dirs_mut().home();

    let depth = leb128::read(bytes, &mut off).ok_or(Error::InvalidObject)?;
    for _ in 0..depth {
        let obj = read_object(rt, bytes, &mut off)?;
        rt.heap.push(obj)?;
    }
    Ok(())
}

fn read_object(rt: &mut Runtime, bytes: &[u8], off: &mut usize) -> Result<ripple_mem::ObjRef> {
    let len = leb128::read(bytes, off).ok_or(Error::InvalidObject)? as usize;
    let end = off.checked_add(len).ok_or(Error::InvalidObject)?;
    if end > bytes.len() {
        return Err(Error::InvalidObject);
    }
    let obj = rt.heap.make_from_bytes(&bytes[*off..end])?;
    *off = end;
    Ok(obj)
}

fn read_str(bytes: &[u8], off: &mut usize) -> Result<String> {
    let len = leb128::read(bytes, off).ok_or(Error::InvalidObject)? as usize;
    let end = off.checked_add(len).ok_or(Error::InvalidObject)?;
    if end > bytes.len() {
        return Err(Error::InvalidObject);
    }
    let s = std::str::from_utf8(&bytes[*off..end]).map_err(|_| Error::InvalidObject)?;
    *off = end;
    Ok(s.to_string())
}

fn read_directory(rt: &mut Runtime, bytes: &[u8], off: &mut usize) -> Result<()> {
    let vars = leb128::read(bytes, off).ok_or(Error::InvalidObject)?;
    for _ in 0..vars {
        let name = read_str(bytes, off)?;
        let obj = read_object(rt, bytes, off)?;
        rt.heap.sto(&name, obj)?;
    }
    let subdirs = leb128::read(bytes, off).ok_or(Error::InvalidObject)?;
    for _ in 0..subdirs {
        let name = read_str(bytes, off)?;
        if !rt.heap.dirs_mut().create_subdir(name.clone()) {
            return Err(Error::NameExists);
        }
        rt.heap.dirs_mut().enter_subdir(&name);
        read_directory(rt, bytes, off)?;
        rt.heap.dirs_mut().updir();
    }
    Ok(())
}

//! Named variables: a tree of directories whose entries reference
//! objects in the globals zone.
//!
//! The tree keeps insertion order so `vars` and rendering are stable.
//! Entry names are unique within a directory; storing over an existing
//! name replaces its object.

use crate::object::ObjRef;

/// A single directory node.
#[derive(Clone, Debug, Default)]
pub struct Directory {
    vars: Vec<(String, ObjRef)>,
    subdirs: Vec<(String, Directory)>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recall(&self, name: &str) -> Option<ObjRef> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| *r)
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.vars.iter().any(|(n, _)| n == name)
    }

    pub fn var_names(&self) -> impl Iterator<Item = &String> {
        self.vars.iter().map(|(n, _)| n)
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    fn bind(&mut self, name: String, value: ObjRef) {
        debug_assert!(!self.has_var(&name));
        self.vars.push((name, value));
    }

    fn unbind(&mut self, name: &str) -> Option<ObjRef> {
        let idx = self.vars.iter().position(|(n, _)| n == name)?;
        Some(self.vars.remove(idx).1)
    }

    pub fn has_subdir(&self, name: &str) -> bool {
        self.subdirs.iter().any(|(n, _)| n == name)
    }

    pub fn get_subdir(&self, name: &str) -> Option<&Directory> {
        self.subdirs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    fn get_subdir_mut(&mut self, name: &str) -> Option<&mut Directory> {
        self.subdirs
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    /// Create a subdirectory. Fails when the name is taken by a variable
    /// or another subdirectory.
    pub fn create_subdir(&mut self, name: String) -> bool {
        if self.has_subdir(&name) || self.has_var(&name) {
            return false;
        }
        self.subdirs.push((name, Directory::new()));
        true
    }

    pub fn subdir_names(&self) -> impl Iterator<Item = &String> {
        self.subdirs.iter().map(|(n, _)| n)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty() && self.subdirs.is_empty()
    }

    /// All variable references in this directory and below.
    fn collect_refs(&self, out: &mut Vec<ObjRef>) {
        for (_, r) in &self.vars {
            out.push(*r);
        }
        for (_, d) in &self.subdirs {
            d.collect_refs(out);
        }
    }

    fn shift_refs(&mut self, threshold: usize, delta: isize) {
        for (_, r) in &mut self.vars {
            if r.offset() >= threshold {
                *r = ObjRef::new((r.offset() as isize + delta) as usize);
            }
        }
        for (_, d) in &mut self.subdirs {
            d.shift_refs(threshold, delta);
        }
    }
}

/// The full tree with the current directory tracked as a path of names
/// from the root (HOME).
#[derive(Clone, Debug, Default)]
pub struct DirectoryTree {
    root: Directory,
    current_path: Vec<String>,
}

impl DirectoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> &[String] {
        &self.current_path
    }

    pub fn is_at_home(&self) -> bool {
        self.current_path.is_empty()
    }

    pub fn home(&mut self) {
        self.current_path.clear();
    }

    /// Move up one level. Returns false at the root.
    pub fn updir(&mut self) -> bool {
        self.current_path.pop().is_some()
    }

    pub fn current_dir(&self) -> &Directory {
        let mut dir = &self.root;
        for name in &self.current_path {
            dir = dir.get_subdir(name).expect("path is validated on entry");
        }
        dir
    }

    fn current_dir_mut(&mut self) -> &mut Directory {
        let mut dir = &mut self.root;
        for name in &self.current_path {
            dir = dir.get_subdir_mut(name).expect("path is validated on entry");
        }
        dir
    }

    pub fn root(&self) -> &Directory {
        &self.root
    }

    pub(crate) fn bind(&mut self, name: String, value: ObjRef) {
        self.current_dir_mut().bind(name, value);
    }

    pub(crate) fn unbind(&mut self, name: &str) -> Option<ObjRef> {
        self.current_dir_mut().unbind(name)
    }

    /// Look up a name in the current directory only.
    pub fn recall(&self, name: &str) -> Option<ObjRef> {
        self.current_dir().recall(name)
    }

    /// Look up a name, walking parent directories toward the root.
    /// Writes never walk; reads do.
    pub fn recall_walk(&self, name: &str) -> Option<ObjRef> {
        let mut chain = Vec::with_capacity(self.current_path.len() + 1);
        let mut dir = &self.root;
        chain.push(dir);
        for part in &self.current_path {
            dir = dir.get_subdir(part).expect("path is validated on entry");
            chain.push(dir);
        }
        chain.iter().rev().find_map(|d| d.recall(name))
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.current_dir().has_var(name)
    }

    pub fn var_names(&self) -> Vec<String> {
        self.current_dir().var_names().cloned().collect()
    }

    pub fn create_subdir(&mut self, name: String) -> bool {
        self.current_dir_mut().create_subdir(name)
    }

    pub fn enter_subdir(&mut self, name: &str) -> bool {
        if self.current_dir().has_subdir(name) {
            self.current_path.push(name.to_string());
            true
        } else {
            false
        }
    }

    /// Remove an empty subdirectory of the current directory.
    pub fn remove_subdir(&mut self, name: &str) -> Result<(), &'static str> {
        let dir = self.current_dir_mut();
        let idx = dir
            .subdirs
            .iter()
            .position(|(n, _)| n == name)
            .ok_or("directory not found")?;
        if !dir.subdirs[idx].1.is_empty() {
            return Err("directory not empty");
        }
        dir.subdirs.remove(idx);
        Ok(())
    }

    /// Every variable reference in the whole tree.
    pub fn all_refs(&self) -> Vec<ObjRef> {
        let mut out = Vec::new();
        self.root.collect_refs(&mut out);
        out
    }

    pub(crate) fn shift_refs(&mut self, threshold: usize, delta: isize) {
        self.root.shift_refs(threshold, delta);
    }
}

//! Hierarchical view over the flat entry list.
//!
//! ZIP archives only store slash-delimited paths; directories may or may
//! not have entries of their own. [`EntryTree`] folds the paths into a tree
//! once at open time, inferring any directory that only shows up as a path
//! prefix. Children keep first-seen order so enumeration matches the
//! archive.

use std::collections::HashMap;

use crate::error::{Result, ZipError};

use super::structures::ZipFileEntry;

/// Normalize a stored entry path.
///
/// Backslashes become slashes, leading separators and `.` or empty segments
/// are dropped, and the trailing slash that marks a directory is removed.
/// Returns the normalized path and whether it named a directory. A `..`
/// segment anywhere is rejected.
pub fn normalize_entry_path(raw: &str) -> Result<(String, bool)> {
    let unified = raw.replace('\\', "/");
    let is_directory = unified.ends_with('/');

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(ZipError::bad_zip(format!(
                    "entry path escapes the archive root: {raw}"
                )));
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(ZipError::bad_zip(format!("empty entry path: {raw:?}")));
    }
    Ok((segments.join("/"), is_directory))
}

/// A node of the entry tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTreeNode {
    name: String,
    path: String,
    entry: Option<usize>,
    is_directory: bool,
    children: Vec<EntryTreeNode>,
    lookup: HashMap<String, usize>,
}

impl EntryTreeNode {
    fn directory(name: &str, path: String) -> Self {
        Self {
            name: name.to_string(),
            path,
            entry: None,
            is_directory: true,
            children: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Path segment of this node. Empty for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path from the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Index of the entry backing this node, if the archive has one.
    pub fn entry_index(&self) -> Option<usize> {
        self.entry
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn children(&self) -> &[EntryTreeNode] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&EntryTreeNode> {
        self.lookup.get(name).map(|&i| &self.children[i])
    }

    fn child_or_insert(&mut self, name: &str, is_directory: bool) -> &mut EntryTreeNode {
        let idx = match self.lookup.get(name) {
            Some(&idx) => idx,
            None => {
                let path = if self.path.is_empty() {
                    name.to_string()
                } else {
                    format!("{}/{}", self.path, name)
                };
                let mut node = Self::directory(name, path);
                node.is_directory = is_directory;
                self.children.push(node);
                self.lookup.insert(name.to_string(), self.children.len() - 1);
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }
}

/// Directory tree derived from entry paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTree {
    root: EntryTreeNode,
}

impl EntryTree {
    /// Build the tree from normalized entries.
    ///
    /// # Errors
    ///
    /// `BadZipFile` when one path is used both as a file and as a directory,
    /// such as a file `a` next to `a/b.txt`.
    pub fn build(entries: &[ZipFileEntry]) -> Result<Self> {
        let mut root = EntryTreeNode::directory("", String::new());

        for (index, entry) in entries.iter().enumerate() {
            let mut node = &mut root;
            let mut segments = entry.file_name.split('/').peekable();
            while let Some(segment) = segments.next() {
                let is_last = segments.peek().is_none();
                let wants_directory = !is_last || entry.is_directory;
                node = node.child_or_insert(segment, wants_directory);
                if node.is_directory != wants_directory {
                    return Err(ZipError::bad_zip(format!(
                        "'{}' is both a file and a directory",
                        node.path
                    )));
                }
            }

            if node.entry.is_some() {
                log::warn!("duplicate entry path '{}', keeping the first", entry.file_name);
                continue;
            }
            node.entry = Some(index);
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &EntryTreeNode {
        &self.root
    }

    /// Resolve a node by its slash-delimited path.
    pub fn find(&self, path: &str) -> Option<&EntryTreeNode> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(&self.root, |node, segment| node.child(segment))
    }
}

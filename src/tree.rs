//! In-memory dentry tree, kept as an arena of nodes addressed by [`NodeId`].
//! Parent and child links are indices; a node owns its inode once loaded,
//! and a directory inode lists its children in sibling order.

use std::ops::{Index, IndexMut};

use crate::config::MAX_DIRECT;
use crate::structs::{DiskInode, FileType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

/// One direct slot of a regular file.
#[derive(Debug, Clone, Default)]
pub enum Page {
    /// No data for this slot.
    #[default]
    Absent,
    /// Data lives in the slot's on-disk block and has not been paged in.
    OnDisk,
    /// Data paged in (or freshly created); `dirty` pages are written at sync.
    Cached { buf: Box<[u8]>, dirty: bool },
}

#[derive(Debug, Clone)]
pub struct Inode {
    pub ino: u32,
    pub size: u32,
    pub link: u32,
    pub ftype: FileType,
    pub direct: [u32; MAX_DIRECT],
    /// Regular files only.
    pub pages: [Page; MAX_DIRECT],
    /// Directories only, in sibling order.
    pub children: Vec<NodeId>,
}

impl Inode {
    pub fn new(ino: u32, ftype: FileType) -> Self {
        Self::from_disk(DiskInode::new(ino, ftype))
    }

    pub fn from_disk(d: DiskInode) -> Self {
        Self {
            ino: d.ino,
            size: d.size,
            link: d.link,
            ftype: d.ftype,
            direct: d.direct,
            pages: Default::default(),
            children: Vec::new(),
        }
    }

    pub fn to_disk(&self) -> DiskInode {
        DiskInode {
            ino: self.ino,
            size: self.size,
            link: self.link,
            ftype: self.ftype,
            direct: self.direct,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.ftype == FileType::Directory
    }
}

#[derive(Debug, Clone)]
pub struct Dentry {
    pub name: String,
    pub ftype: FileType,
    pub ino: u32,
    pub parent: Option<NodeId>,
    /// `None` until the inode is loaded.
    pub inode: Option<Inode>,
}

impl Dentry {
    /// An unattached dentry: no inode, no parent.
    pub fn new(name: &str, ftype: FileType) -> Self {
        Self {
            name: name.to_string(),
            ftype,
            ino: 0,
            parent: None,
            inode: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.ftype == FileType::Directory
    }
}

#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Option<Dentry>>,
    // Bumped each time a slot is freed, so handles of removed nodes go stale.
    generations: Vec<u32>,
    free: Vec<NodeId>,
}

impl Tree {
    /// A tree holding only the root dentry at [`NodeId::ROOT`].
    pub fn new(root: Dentry) -> Self {
        Self {
            nodes: vec![Some(root)],
            generations: vec![0],
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, dentry: Dentry) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = Some(dentry);
                id
            }
            None => {
                self.nodes.push(Some(dentry));
                self.generations.push(0);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Frees a slot. The caller has already detached it from its parent.
    pub fn remove(&mut self, id: NodeId) -> Option<Dentry> {
        let dentry = self.nodes.get_mut(id.0)?.take()?;
        self.generations[id.0] = self.generations[id.0].wrapping_add(1);
        self.free.push(id);
        Some(dentry)
    }

    pub fn get(&self, id: NodeId) -> Option<&Dentry> {
        self.nodes.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Dentry> {
        self.nodes.get_mut(id.0)?.as_mut()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// A number naming `id` for the life of the mount. The low half is the slot
    /// plus one (the root is 1), the high half the slot's generation, so a
    /// reused slot never repeats an earlier handle.
    pub fn handle(&self, id: NodeId) -> u64 {
        let generation = self.generations.get(id.0).copied().unwrap_or(0);
        ((generation as u64) << 32) | (id.0 as u64 + 1)
    }

    /// The live node named by `handle`, or `None` if it was removed since.
    pub fn resolve_handle(&self, handle: u64) -> Option<NodeId> {
        let index = (handle & u32::MAX as u64).checked_sub(1)? as usize;
        let id = NodeId(index);
        let current = *self.generations.get(index)?;
        (self.contains(id) && current as u64 == handle >> 32).then_some(id)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Children of a loaded directory; empty for files and unloaded nodes.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id)
            .and_then(|d| d.inode.as_ref())
            .map(|inode| inode.children.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `id` is `ancestor` or lies below it.
    pub fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(node) = cur {
            if node == ancestor {
                return true;
            }
            cur = self.get(node).and_then(|d| d.parent);
        }
        false
    }

    /// Live inode numbers of every loaded node.
    pub fn loaded_inos(&self) -> Vec<u32> {
        self.nodes
            .iter()
            .flatten()
            .filter_map(|d| d.inode.as_ref().map(|inode| inode.ino))
            .collect()
    }

    /// Drops every node at once.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.generations.clear();
        self.free.clear();
    }
}

impl Index<NodeId> for Tree {
    type Output = Dentry;

    fn index(&self, id: NodeId) -> &Dentry {
        self.get(id).expect("stale node id")
    }
}

impl IndexMut<NodeId> for Tree {
    fn index_mut(&mut self, id: NodeId) -> &mut Dentry {
        self.get_mut(id).expect("stale node id")
    }
}

//! FUSE adapter. Kernel inode numbers are tree handles, so the root is `FUSE_ROOT_ID`
//! and a removed node's number is never handed out again during the mount.
//! Recoverable errors become errnos; fatal device or corruption errors abort the process.

use std::ffi::OsStr;
use std::time::{Duration, UNIX_EPOCH};

use fuser::{
    FileAttr, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyWrite, Request, TimeOrNow,
};
use libc::{c_int, EINVAL, EIO, ENOENT};

use crate::config::DEFAULT_PERM;
use crate::error::FsError;
use crate::fs::{Attr, FileSystem};
use crate::structs::FileType;
use crate::tree::NodeId;
use crate::BlockDevice;

const TTL: Duration = Duration::from_secs(1);

pub struct TauFuse<D: BlockDevice> {
    fs: Option<FileSystem<D>>,
}

fn kind(ftype: FileType) -> fuser::FileType {
    match ftype {
        FileType::Regular => fuser::FileType::RegularFile,
        FileType::Directory => fuser::FileType::Directory,
    }
}

fn file_attr(ino: u64, attr: &Attr) -> FileAttr {
    FileAttr {
        ino,
        size: attr.size,
        blocks: attr.blocks,
        atime: UNIX_EPOCH,
        mtime: UNIX_EPOCH,
        ctime: UNIX_EPOCH,
        crtime: UNIX_EPOCH,
        kind: kind(attr.ftype),
        perm: DEFAULT_PERM,
        nlink: attr.links,
        uid: unsafe { libc::getuid() },
        gid: unsafe { libc::getgid() },
        rdev: 0,
        blksize: attr.block_size,
        flags: 0,
    }
}

impl<D: BlockDevice> TauFuse<D> {
    pub fn new(fs: FileSystem<D>) -> Self {
        Self { fs: Some(fs) }
    }

    /// Maps an error to an errno, aborting on anything that leaves the image untrustworthy.
    fn errno(&self, op: &str, e: FsError) -> c_int {
        if e.is_fatal() {
            log::error!("{}: fatal: {}", op, e);
            std::process::abort();
        }
        log::debug!("{}: {}", op, e);
        e.to_errno()
    }

    fn node(&self, ino: u64) -> Option<NodeId> {
        let fs = self.fs.as_ref()?;
        fs.tree().resolve_handle(ino)
    }

    /// Resolves a kernel inode and the mounted filesystem together.
    fn target(&mut self, ino: u64) -> Result<(&mut FileSystem<D>, NodeId), c_int> {
        let node = self.node(ino).ok_or(ENOENT)?;
        let fs = self.fs.as_mut().ok_or(EIO)?;
        Ok((fs, node))
    }

    fn entry(&mut self, op: &str, parent: u64, name: &OsStr, create: Option<FileType>) -> Result<FileAttr, c_int> {
        let name = name.to_str().ok_or(EINVAL)?;
        let (fs, dir) = self.target(parent)?;
        let result = match create {
            Some(ftype) => fs.create_in(dir, name, ftype),
            None => fs.lookup_in(dir, name),
        }
        .and_then(|node| fs.attr(node).map(|attr| file_attr(fs.tree().handle(node), &attr)));
        result.map_err(|e| self.errno(op, e))
    }
}

impl<D: BlockDevice> Filesystem for TauFuse<D> {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        log::info!("fuse session started");
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(fs) = self.fs.take() {
            if let Err(e) = fs.unmount() {
                log::error!("unmount failed: {}", e);
            }
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.entry("lookup", parent, name, None) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let (fs, node) = match self.target(ino) {
            Ok(t) => t,
            Err(errno) => return reply.error(errno),
        };
        match fs.attr(node) {
            Ok(attr) => reply.attr(&TTL, &file_attr(ino, &attr)),
            Err(e) => reply.error(self.errno("getattr", e)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<std::time::SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<std::time::SystemTime>,
        _chgtime: Option<std::time::SystemTime>,
        _bkuptime: Option<std::time::SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let (fs, node) = match self.target(ino) {
            Ok(t) => t,
            Err(errno) => return reply.error(errno),
        };
        let result = match size {
            Some(size) => fs.truncate_node(node, size as usize),
            None => Ok(()),
        }
        .and_then(|_| fs.attr(node));
        match result {
            Ok(attr) => reply.attr(&TTL, &file_attr(ino, &attr)),
            Err(e) => reply.error(self.errno("setattr", e)),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let (fs, node) = match self.target(ino) {
            Ok(t) => t,
            Err(errno) => return reply.error(errno),
        };
        let parent = fs.tree().get(node).and_then(|d| d.parent).unwrap_or(NodeId::ROOT);
        let parent = fs.tree().handle(parent);

        // Offsets 1 and 2 are "." and ".."; entry i resumes at i + 3.
        let mut offset = offset.max(0) as usize;
        if offset == 0 {
            if reply.add(ino, 1, fuser::FileType::Directory, ".") {
                return reply.ok();
            }
            offset = 1;
        }
        if offset == 1 {
            if reply.add(parent, 2, fuser::FileType::Directory, "..") {
                return reply.ok();
            }
            offset = 2;
        }
        let result = fs.read_dir_node(node, offset - 2, |entry| {
            !reply.add(entry.handle, (entry.next + 2) as i64, kind(entry.ftype), entry.name)
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(self.errno("readdir", e)),
        }
    }

    fn mkdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, _mode: u32, _umask: u32, reply: ReplyEntry) {
        match self.entry("mkdir", parent, name, Some(FileType::Directory)) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        if mode & libc::S_IFMT != libc::S_IFREG {
            return reply.error(libc::ENOSYS);
        }
        match self.entry("mknod", parent, name, Some(FileType::Regular)) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        match self.entry("create", parent, name, Some(FileType::Regular)) {
            Ok(attr) => reply.created(&TTL, &attr, 0, 0, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if offset < 0 {
            return reply.error(EINVAL);
        }
        let (fs, node) = match self.target(ino) {
            Ok(t) => t,
            Err(errno) => return reply.error(errno),
        };
        match fs.read_node(node, offset as usize, size as usize) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(self.errno("read", e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        if offset < 0 {
            return reply.error(EINVAL);
        }
        let (fs, node) = match self.target(ino) {
            Ok(t) => t,
            Err(errno) => return reply.error(errno),
        };
        match fs.write_node(node, offset as usize, data) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(self.errno("write", e)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.remove("unlink", parent, name, FileType::Regular, reply)
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.remove("rmdir", parent, name, FileType::Directory, reply)
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (Some(name), Some(newname)) = (name.to_str(), newname.to_str()) else {
            return reply.error(EINVAL);
        };
        let Some(new_dir) = self.node(newparent) else {
            return reply.error(ENOENT);
        };
        let (fs, dir) = match self.target(parent) {
            Ok(t) => t,
            Err(errno) => return reply.error(errno),
        };
        match fs.rename_in(dir, name, new_dir, newname) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(self.errno("rename", e)),
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        let Some(fs) = self.fs.as_mut() else {
            return reply.error(EIO);
        };
        match fs.sync() {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(self.errno("fsync", e)),
        }
    }
}

impl<D: BlockDevice> TauFuse<D> {
    fn remove(&mut self, op: &str, parent: u64, name: &OsStr, expect: FileType, reply: ReplyEmpty) {
        let Some(name) = name.to_str() else {
            return reply.error(EINVAL);
        };
        let (fs, dir) = match self.target(parent) {
            Ok(t) => t,
            Err(errno) => return reply.error(errno),
        };
        match fs.remove_in(dir, name, expect) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(self.errno(op, e)),
        }
    }
}

/// Serves `fs` at `mountpoint` until the kernel unmounts it.
pub fn serve<D: BlockDevice>(fs: FileSystem<D>, mountpoint: &str) -> std::io::Result<()> {
    let options = [
        fuser::MountOption::FSName("tau".to_string()),
        fuser::MountOption::DefaultPermissions,
    ];
    fuser::mount2(TauFuse::new(fs), mountpoint, &options)
}

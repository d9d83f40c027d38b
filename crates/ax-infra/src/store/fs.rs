//! Filesystem-backed block store.
//!
//! Layout: `<root>/blobs/<blob_id>.<type_code>/{meta.json,data.bin}`. The
//! written length is the length of `data.bin`; the reserved capacity lives in
//! `meta.json`.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use ax_core::ports::{BlobStorePort, LockKind, StoreError};
use ax_core::{BlobId, BlobKey};
use serde::{Deserialize, Serialize};

use super::locks::LockTable;

const BLOBS_DIR: &str = "blobs";
const BLOB_META_FILE_NAME: &str = "meta.json";
const BLOB_DATA_FILE_NAME: &str = "data.bin";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BlockMeta {
    blob_id: BlobId,
    blob_type: i32,
    max_size: u64,
    created_at_ms: i64,
}

pub struct FsBlockStore {
    root: PathBuf,
    locks: LockTable,
}

impl FsBlockStore {
    /// Create a new FsBlockStore rooted at the given filesystem path.
    ///
    /// Blocks are stored under `<root>/blobs/`. Nothing is created until the
    /// first block is reserved.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: LockTable::default(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn block_dir(&self, key: &BlobKey) -> PathBuf {
        self.root
            .join(BLOBS_DIR)
            .join(format!("{}.{}", key.id, key.blob_type.code()))
    }

    fn read_meta(&self, key: &BlobKey) -> Result<BlockMeta, StoreError> {
        let path = self.block_dir(key).join(BLOB_META_FILE_NAME);
        let bytes = fs::read(path).map_err(|err| not_found_or_io(key, err))?;
        serde_json::from_slice(&bytes).map_err(|err| StoreError::Io(format!("corrupt meta: {err}")))
    }

    fn write_meta(&self, key: &BlobKey, meta: &BlockMeta) -> Result<(), StoreError> {
        let path = self.block_dir(key).join(BLOB_META_FILE_NAME);
        let bytes = serde_json::to_vec(meta).map_err(|err| StoreError::Io(err.to_string()))?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn data_path(&self, key: &BlobKey) -> PathBuf {
        self.block_dir(key).join(BLOB_DATA_FILE_NAME)
    }
}

fn not_found_or_io(key: &BlobKey, err: std::io::Error) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound(*key)
    } else {
        StoreError::from(err)
    }
}

impl BlobStorePort for FsBlockStore {
    fn exists(&self, key: &BlobKey) -> bool {
        self.block_dir(key).join(BLOB_META_FILE_NAME).is_file()
    }

    fn size(&self, key: &BlobKey) -> Result<u64, StoreError> {
        // meta is the existence marker; data.bin may legitimately be missing
        self.read_meta(key)?;
        match fs::metadata(self.data_path(key)) {
            Ok(md) => Ok(md.len()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn max_size(&self, key: &BlobKey) -> Result<u64, StoreError> {
        Ok(self.read_meta(key)?.max_size)
    }

    fn set_max_size(&self, key: &BlobKey, size: u64) -> Result<(), StoreError> {
        let meta = match self.read_meta(key) {
            Ok(meta) => BlockMeta {
                max_size: size,
                ..meta
            },
            Err(StoreError::NotFound(_)) => {
                fs::create_dir_all(self.block_dir(key))?;
                BlockMeta {
                    blob_id: key.id,
                    blob_type: key.blob_type.code(),
                    max_size: size,
                    created_at_ms: chrono::Utc::now().timestamp_millis(),
                }
            }
            Err(err) => return Err(err),
        };
        self.write_meta(key, &meta)?;

        let data = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.data_path(key))?;
        if data.metadata()?.len() > size {
            data.set_len(size)?;
        }
        Ok(())
    }

    fn read_at(&self, key: &BlobKey, offset: u64, buf: &mut [u8]) -> Result<usize, StoreError> {
        self.read_meta(key)?;
        let mut file = match File::open(self.data_path(key)) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        if offset >= file.metadata()?.len() {
            return Ok(0);
        }
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(filled)
    }

    fn write_at(&self, key: &BlobKey, offset: u64, data: &[u8]) -> Result<usize, StoreError> {
        let meta = self.read_meta(key)?;
        if offset + data.len() as u64 > meta.max_size {
            return Err(StoreError::ExceedsMaxSize {
                key: *key,
                offset,
                len: data.len(),
                max_size: meta.max_size,
            });
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.data_path(key))?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(data.len())
    }

    fn rename(&self, from: &BlobKey, to: &BlobKey) -> Result<(), StoreError> {
        let meta = self.read_meta(from)?;
        let target = self.block_dir(to);
        if target.exists() {
            tracing::debug!(from = %from, to = %to, "rename replaces existing block");
            fs::remove_dir_all(&target)?;
        }
        fs::rename(self.block_dir(from), &target)?;
        self.write_meta(
            to,
            &BlockMeta {
                blob_id: to.id,
                blob_type: to.blob_type.code(),
                ..meta
            },
        )
    }

    fn remove(&self, key: &BlobKey) -> Result<(), StoreError> {
        fs::remove_dir_all(self.block_dir(key)).map_err(|err| not_found_or_io(key, err))
    }

    fn inc_lock(&self, key: &BlobKey, kind: LockKind) {
        self.locks.inc(key, kind)
    }

    fn dec_lock(&self, key: &BlobKey, kind: LockKind) {
        self.locks.dec(key, kind)
    }

    fn is_locked(&self, key: &BlobKey, kind: LockKind) -> bool {
        self.locks.is_locked(key, kind)
    }
}

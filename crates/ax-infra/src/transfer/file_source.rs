//! File transfer source: streams a named file out of a served directory.

use std::any::Any;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::Weak;

use ax_core::ports::TransferRegistryPort;
use ax_core::transfer::{
    PacketResponse, ParamsError, TransferError, TransferParamsFile, TransferSource,
    TransferSourceType, TransferStatus, STATIC_PRIORITY,
};
use ax_core::TransferId;
use tracing::{debug, error, info, warn};

pub struct FileTransferSource {
    id: TransferId,
    priority: f32,
    params: TransferParamsFile,
    root: PathBuf,
    registry: Weak<dyn TransferRegistryPort>,
    path: Option<PathBuf>,
    file: Option<File>,
    cursor: u64,
    last_packet_id: i32,
}

impl FileTransferSource {
    /// `root` is the only directory this source may serve from.
    pub fn new(
        id: TransferId,
        priority: f32,
        root: PathBuf,
        registry: Weak<dyn TransferRegistryPort>,
    ) -> Self {
        Self {
            id,
            priority,
            params: TransferParamsFile::default(),
            root,
            registry,
            path: None,
            file: None,
            cursor: 0,
            last_packet_id: -1,
        }
    }

    pub fn with_params(mut self, params: TransferParamsFile) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> &TransferParamsFile {
        &self.params
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    fn send_status(&self, status: TransferStatus) {
        if let Some(registry) = self.registry.upgrade() {
            registry.send_status(&self.id, status);
        }
    }
}

/// A served name must be one plain path segment.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
        && !name.contains("..")
}

impl TransferSource for FileTransferSource {
    fn id(&self) -> &TransferId {
        &self.id
    }

    fn source_type(&self) -> TransferSourceType {
        TransferSourceType::File
    }

    fn priority(&self) -> f32 {
        self.priority
    }

    fn init_transfer(&mut self) {
        let name = &self.params.file_name;
        if !is_plain_file_name(name) {
            warn!(
                transfer_id = %self.id,
                file_name = %name,
                "Rejected file transfer outside served directory"
            );
            self.send_status(TransferStatus::Error);
            return;
        }

        // symlinks could point anywhere, so only regular files are served
        let path = self.root.join(name);
        match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                warn!(transfer_id = %self.id, path = %path.display(), "Rejected symlinked file");
                self.send_status(TransferStatus::Error);
                return;
            }
            Ok(meta) if meta.is_file() => {}
            _ => {
                info!(
                    transfer_id = %self.id,
                    path = %path.display(),
                    "file transfer source missing"
                );
                self.send_status(TransferStatus::UnknownSource);
                return;
            }
        }

        self.path = Some(path);
        self.send_status(TransferStatus::Ok);
    }

    fn update_priority(&mut self) -> f32 {
        STATIC_PRIORITY
    }

    fn data_callback(
        &mut self,
        packet_id: i32,
        max_bytes: usize,
    ) -> Result<PacketResponse, TransferError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(PacketResponse::error());
        };

        if packet_id != self.last_packet_id + 1 {
            error!(
                transfer_id = %self.id,
                expected = self.last_packet_id + 1,
                got = packet_id,
                "Can't handle out of order file transfer"
            );
            return Err(TransferError::OutOfOrderPacket {
                transfer_id: self.id,
                expected: self.last_packet_id + 1,
                got: packet_id,
            });
        }
        if max_bytes == 0 {
            return Ok(PacketResponse::error());
        }

        if self.file.is_none() {
            match File::open(path) {
                Ok(file) => self.file = Some(file),
                Err(err) => {
                    warn!(
                        transfer_id = %self.id,
                        path = %path.display(),
                        error = %err,
                        "open failed"
                    );
                    return Ok(PacketResponse::error());
                }
            }
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(PacketResponse::error());
        };

        if let Err(err) = file.seek(SeekFrom::Start(self.cursor)) {
            warn!(transfer_id = %self.id, cursor = self.cursor, error = %err, "seek failed");
            return Ok(PacketResponse::error());
        }

        let mut buf = vec![0u8; max_bytes];
        let mut filled = 0;
        while filled < max_bytes {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(transfer_id = %self.id, error = %err, "read failed");
                    return Ok(PacketResponse::error());
                }
            }
        }

        self.cursor += filled as u64;
        self.last_packet_id = packet_id;
        buf.truncate(filled);

        if filled < max_bytes {
            let payload = (filled > 0).then_some(buf);
            return Ok(PacketResponse::done(payload));
        }
        Ok(PacketResponse::ok(buf))
    }

    fn completion_callback(&mut self, status: TransferStatus) {
        self.file = None;
        if status != TransferStatus::Done || !self.params.delete_on_completion {
            return;
        }
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!(transfer_id = %self.id, path = %path.display(), "removed served file");
                }
                Err(err) => {
                    warn!(
                        transfer_id = %self.id,
                        path = %path.display(),
                        error = %err,
                        "failed to remove served file"
                    );
                }
            }
        }
    }

    fn unpack_params(&mut self, block: &[u8]) -> Result<(), ParamsError> {
        self.params = TransferParamsFile::from_bytes(block)?;
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Result code a transfer source hands back to the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Packet delivered, more to come.
    Ok,
    /// Last packet delivered. May carry data.
    Done,
    /// Nothing available yet; ask for the same packet again later.
    Skip,
    /// Stopped from outside.
    Abort,
    Error,
    /// The store explicitly reports the blob does not exist.
    UnknownSource,
    InsufficientPermissions,
}

impl TransferStatus {
    pub fn code(&self) -> i32 {
        match self {
            TransferStatus::Ok => 0,
            TransferStatus::Done => 1,
            TransferStatus::Skip => 2,
            TransferStatus::Abort => 3,
            TransferStatus::Error => -1,
            TransferStatus::UnknownSource => -2,
            TransferStatus::InsufficientPermissions => -3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => TransferStatus::Ok,
            1 => TransferStatus::Done,
            2 => TransferStatus::Skip,
            3 => TransferStatus::Abort,
            -1 => TransferStatus::Error,
            -2 => TransferStatus::UnknownSource,
            -3 => TransferStatus::InsufficientPermissions,
            _ => return None,
        })
    }

    /// No packet activity is expected after a terminal status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Ok | TransferStatus::Skip)
    }

    pub fn is_failure(&self) -> bool {
        self.code() < 0
    }
}

impl Display for TransferStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransferStatus::Ok => "ok",
            TransferStatus::Done => "done",
            TransferStatus::Skip => "skip",
            TransferStatus::Abort => "abort",
            TransferStatus::Error => "error",
            TransferStatus::UnknownSource => "unknown source",
            TransferStatus::InsufficientPermissions => "insufficient permissions",
        };
        f.write_str(name)
    }
}

/// One answer to a packet pull. The payload is owned by whoever holds the
/// response; there is no separate "who frees this" flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketResponse {
    pub status: TransferStatus,
    pub payload: Option<Vec<u8>>,
}

impl PacketResponse {
    pub fn skip() -> Self {
        Self::bare(TransferStatus::Skip)
    }

    pub fn error() -> Self {
        Self::bare(TransferStatus::Error)
    }

    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            status: TransferStatus::Ok,
            payload: Some(payload),
        }
    }

    pub fn done(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: TransferStatus::Done,
            payload,
        }
    }

    pub fn bare(status: TransferStatus) -> Self {
        Self {
            status,
            payload: None,
        }
    }

    pub fn payload_len(&self) -> usize {
        self.payload.as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_wire_values() {
        for status in [
            TransferStatus::Ok,
            TransferStatus::Done,
            TransferStatus::Skip,
            TransferStatus::Abort,
            TransferStatus::Error,
            TransferStatus::UnknownSource,
            TransferStatus::InsufficientPermissions,
        ] {
            assert_eq!(TransferStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(TransferStatus::from_code(99), None);
    }

    #[test]
    fn terminal_classification() {
        assert!(!TransferStatus::Ok.is_terminal());
        assert!(!TransferStatus::Skip.is_terminal());
        assert!(TransferStatus::Done.is_terminal());
        assert!(TransferStatus::UnknownSource.is_terminal());
        assert!(TransferStatus::Error.is_failure());
        assert!(!TransferStatus::Done.is_failure());
    }
}

//! Append-only transaction log: binary protobuf frames.
//!
//! Storage format: length-prefixed protobuf frames.
//!   [4-byte LE length][protobuf bytes][4-byte LE length][protobuf bytes]...
//!
//! Rules:
//!   - Strict append only; no mutation, deletion, or reordering
//!   - fsync after every write
//!   - Sequence strictly increasing from 1 (validated on append and on read)
//!   - Only successfully executed submissions are ever appended

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use prost::Message;
use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};
use crate::proto_types::ProtoTransaction;

/// Frames larger than this are treated as corruption.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Append-only transaction log backed by a binary file.
pub struct TransactionLog {
    path: PathBuf,
    last_sequence: u64,
}

impl TransactionLog {
    /// Open or create a log at the given path.
    /// Reads existing frames to determine the last sequence number.
    pub fn open(path: &Path) -> RuntimeResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let last_sequence = if path.exists() {
            let txs = Self::read_all_from_file(path)?;
            txs.last().map(|t| t.sequence).unwrap_or(0)
        } else {
            0
        };

        Ok(Self {
            path: path.to_path_buf(),
            last_sequence,
        })
    }

    /// Append one committed transaction. Its sequence must be exactly
    /// `last_sequence() + 1`.
    pub fn append(&mut self, tx: &ProtoTransaction) -> RuntimeResult<()> {
        let expected = self.last_sequence + 1;
        if tx.sequence != expected {
            return Err(RuntimeError::Sequence {
                expected,
                got: tx.sequence,
            });
        }

        let buf = tx.encode_to_vec();
        if buf.is_empty() || buf.len() > MAX_FRAME_LEN {
            return Err(RuntimeError::FrameTooLarge {
                len: buf.len(),
                max: MAX_FRAME_LEN,
            });
        }
        let len = buf.len() as u32;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        {
            let mut writer = BufWriter::new(&mut file);
            writer.write_all(&len.to_le_bytes())?;
            writer.write_all(&buf)?;
            writer.flush()?;
        }
        file.sync_all()?;

        self.last_sequence = tx.sequence;
        debug!(sequence = tx.sequence, bytes = buf.len(), "transaction appended");
        Ok(())
    }

    /// Load every committed transaction in sequence order.
    pub fn load_all(&self) -> RuntimeResult<Vec<ProtoTransaction>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Self::read_all_from_file(&self.path)
    }

    /// Load transactions with sequence strictly greater than `sequence`.
    pub fn load_after(&self, sequence: u64) -> RuntimeResult<Vec<ProtoTransaction>> {
        let mut txs = self.load_all()?;
        txs.retain(|t| t.sequence > sequence);
        Ok(txs)
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all frames from a file, validating framing and sequence order.
    fn read_all_from_file(path: &Path) -> RuntimeResult<Vec<ProtoTransaction>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut txs: Vec<ProtoTransaction> = Vec::new();
        let mut len_buf = [0u8; 4];

        loop {
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len == 0 || len > MAX_FRAME_LEN {
                return Err(RuntimeError::CorruptLog(format!("invalid frame length: {}", len)));
            }

            let mut frame = vec![0u8; len];
            reader.read_exact(&mut frame).map_err(|e| {
                RuntimeError::CorruptLog(format!("truncated frame after sequence {}: {}", txs.len(), e))
            })?;

            let tx = ProtoTransaction::decode(frame.as_slice())
                .map_err(|e| RuntimeError::CorruptLog(format!("protobuf decode error: {}", e)))?;

            let expected = txs.last().map(|t| t.sequence).unwrap_or(0) + 1;
            if tx.sequence != expected {
                return Err(RuntimeError::CorruptLog(format!(
                    "out-of-order frame: expected sequence {}, found {}",
                    expected, tx.sequence
                )));
            }
            txs.push(tx);
        }

        Ok(txs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto_types::{ProtoIdentity, ProtoInvocation};

    fn frame(sequence: u64, operation: &str) -> ProtoTransaction {
        ProtoTransaction {
            sequence,
            identity: Some(ProtoIdentity {
                principal: "x509::admin".into(),
                org: "Org1MSP".into(),
            }),
            invocation: Some(ProtoInvocation {
                operation: operation.into(),
                args: vec![],
            }),
        }
    }

    #[test]
    fn append_reopen_and_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger").join("tx.log");
        {
            let mut log = TransactionLog::open(&path).unwrap();
            log.append(&frame(1, "init")).unwrap();
            log.append(&frame(2, "owner")).unwrap();
            log.append(&frame(3, "owner")).unwrap();
        }
        let log = TransactionLog::open(&path).unwrap();
        assert_eq!(log.last_sequence(), 3);
        assert_eq!(log.load_all().unwrap().len(), 3);
        let tail = log.load_after(1).unwrap();
        assert_eq!(tail.iter().map(|t| t.sequence).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn sequence_gaps_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TransactionLog::open(&dir.path().join("tx.log")).unwrap();
        let err = log.append(&frame(2, "init")).unwrap_err();
        assert!(matches!(err, RuntimeError::Sequence { expected: 1, got: 2 }));
    }

    #[test]
    fn oversized_frame_is_refused_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.log");
        let mut log = TransactionLog::open(&path).unwrap();
        log.append(&frame(1, "init")).unwrap();
        let size_before = std::fs::metadata(&path).unwrap().len();

        let mut big = frame(2, "addOrg");
        if let Some(inv) = big.invocation.as_mut() {
            inv.args = vec!["Org1MSP".into(), "x".repeat(MAX_FRAME_LEN + 1), "16".into()];
        }
        let err = log.append(&big).unwrap_err();
        assert!(matches!(err, RuntimeError::FrameTooLarge { max: MAX_FRAME_LEN, .. }));
        assert_eq!(log.last_sequence(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), size_before);

        let reopened = TransactionLog::open(&path).unwrap();
        assert_eq!(reopened.last_sequence(), 1);
        log.append(&frame(2, "owner")).unwrap();
    }

    #[test]
    fn zero_length_frame_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.log");
        std::fs::write(&path, 0u32.to_le_bytes()).unwrap();
        assert!(matches!(TransactionLog::open(&path), Err(RuntimeError::CorruptLog(_))));
    }

    #[test]
    fn truncated_frame_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.log");
        {
            let mut log = TransactionLog::open(&path).unwrap();
            log.append(&frame(1, "init")).unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 2);
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(TransactionLog::open(&path), Err(RuntimeError::CorruptLog(_))));
    }
}

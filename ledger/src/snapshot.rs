//! Ledger snapshots: the whole ledger written to disk after every accepted write.
//!
//! Files are written to a temporary path and atomically renamed over the
//! previous snapshot, so a crash leaves either the old or the new file intact.
//! A snapshot carries a Blake2b hash of its encoded ledger and is rejected on
//! load if the hash does not match.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bftb_crypto::blake2b_256;

use crate::{Ledger, SnapshotError};

const SNAPSHOT_VERSION: u32 = 1;

/// A ledger plus integrity metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Snapshot format version.
    pub version: u32,
    /// Blake2b-256 of the bincode-encoded ledger.
    pub hash: [u8; 32],
    pub ledger: Ledger,
}

impl LedgerSnapshot {
    pub fn create(ledger: Ledger) -> Self {
        let hash = Self::compute_hash(&ledger);
        Self {
            version: SNAPSHOT_VERSION,
            hash,
            ledger,
        }
    }

    fn compute_hash(ledger: &Ledger) -> [u8; 32] {
        blake2b_256(&encode(ledger))
    }

    /// Verify the snapshot hash matches the ledger data.
    pub fn verify(&self) -> bool {
        self.hash == Self::compute_hash(&self.ledger)
    }

    /// Serialize the snapshot to bytes (bincode).
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("snapshot serialization should not fail")
    }

    /// Decode and verify a snapshot.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self =
            bincode::deserialize(bytes).map_err(|e| SnapshotError::Decode(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        if !snapshot.verify() {
            return Err(SnapshotError::HashMismatch);
        }
        Ok(snapshot)
    }
}

fn encode(ledger: &Ledger) -> Vec<u8> {
    bincode::serialize(ledger).expect("ledger serialization should not fail")
}

/// Snapshot files for one replica inside a data directory.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_dir: impl AsRef<Path>, replica_id: usize) -> Self {
        let dir = data_dir.as_ref();
        Self {
            path: dir.join(format!("replica_{replica_id}.snapshot")),
            tmp_path: dir.join(format!("replica_{replica_id}.snapshot.tmp")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `ledger` to the temp file, then rename it over the main file.
    pub fn save(&self, ledger: &Ledger) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = LedgerSnapshot::create(ledger.clone()).to_bytes();
        fs::write(&self.tmp_path, &bytes)?;
        fs::rename(&self.tmp_path, &self.path)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot saved");
        Ok(())
    }

    /// Load the main snapshot, falling back to a leftover temp file.
    ///
    /// Returns `Ok(None)` when neither file exists.
    pub fn load(&self) -> Result<Option<Ledger>, SnapshotError> {
        match Self::read(&self.path) {
            Ok(Some(ledger)) => return Ok(Some(ledger)),
            Ok(None) => {}
            Err(e) if self.tmp_path.exists() => {
                warn!(error = %e, "main snapshot unreadable, trying temp file");
            }
            Err(e) => return Err(e),
        }
        Self::read(&self.tmp_path)
    }

    fn read(path: &Path) -> Result<Option<Ledger>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        Ok(Some(LedgerSnapshot::from_bytes(&bytes)?.ledger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bftb_types::{PublicKey, WriteTimestamp};

    fn sample_ledger() -> Ledger {
        let mut ledger = Ledger::default();
        ledger.open_account(PublicKey([1; 32])).unwrap();
        ledger.open_account(PublicKey([2; 32])).unwrap();
        ledger
            .send_amount(&PublicKey([1; 32]), &PublicKey([2; 32]), 5)
            .unwrap();
        ledger.advance_timestamp(WriteTimestamp::new(3));
        ledger
    }

    #[test]
    fn create_and_verify() {
        let snap = LedgerSnapshot::create(sample_ledger());
        assert!(snap.verify());
        assert_eq!(snap.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn tampered_snapshot_fails_verify() {
        let mut snap = LedgerSnapshot::create(sample_ledger());
        snap.ledger.advance_timestamp(WriteTimestamp::new(99));
        assert!(!snap.verify());
        assert!(matches!(
            LedgerSnapshot::from_bytes(&snap.to_bytes()),
            Err(SnapshotError::HashMismatch)
        ));
    }

    #[test]
    fn store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), 2);
        assert!(store.load().unwrap().is_none());

        let ledger = sample_ledger();
        store.save(&ledger).unwrap();
        assert_eq!(store.load().unwrap(), Some(ledger));
        assert!(!dir.path().join("replica_2.snapshot.tmp").exists());
    }

    #[test]
    fn recovers_from_leftover_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), 0);
        let ledger = sample_ledger();
        // Simulate a crash between write and rename.
        fs::write(
            dir.path().join("replica_0.snapshot.tmp"),
            LedgerSnapshot::create(ledger.clone()).to_bytes(),
        )
        .unwrap();
        assert_eq!(store.load().unwrap(), Some(ledger));
    }

    #[test]
    fn corrupt_main_file_falls_back_to_temp() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), 1);
        let ledger = sample_ledger();
        fs::write(store.path(), b"not a snapshot").unwrap();
        fs::write(
            dir.path().join("replica_1.snapshot.tmp"),
            LedgerSnapshot::create(ledger.clone()).to_bytes(),
        )
        .unwrap();
        assert_eq!(store.load().unwrap(), Some(ledger));
    }

    #[test]
    fn corrupt_main_file_without_temp_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), 1);
        fs::write(store.path(), b"garbage").unwrap();
        assert!(store.load().is_err());
    }
}

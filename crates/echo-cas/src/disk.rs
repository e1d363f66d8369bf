// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed block store: one file per block, named by the text form
//! of its identifier.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{BlockStore, CasError, Cid};

/// Block store rooted at a directory.
///
/// Reads are hash-verified, so a corrupted file surfaces as
/// [`CasError::HashMismatch`] rather than bad data.
#[derive(Debug, Clone)]
pub struct DiskTier {
    base: PathBuf,
}

impl DiskTier {
    /// Open (creating if needed) a store under `base`.
    pub fn open(base: impl AsRef<Path>) -> Result<Self, CasError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, cid: &Cid) -> PathBuf {
        self.base.join(cid.to_string())
    }

    fn write(&self, cid: &Cid, bytes: &[u8]) -> Result<(), CasError> {
        if matches!(self.get(cid), Ok(Some(_))) {
            return Ok(());
        }
        // each writer gets its own temp file; readers never see a partial block
        let mut tmp = tempfile::NamedTempFile::new_in(&self.base)?;
        tmp.write_all(bytes)?;
        tmp.persist(self.path_for(cid)).map_err(|err| err.error)?;
        Ok(())
    }
}

impl BlockStore for DiskTier {
    fn put(&mut self, codec: u64, bytes: &[u8]) -> Result<Cid, CasError> {
        let cid = Cid::of(codec, bytes);
        self.write(&cid, bytes)?;
        Ok(cid)
    }

    fn put_verified(&mut self, cid: Cid, bytes: &[u8]) -> Result<(), CasError> {
        cid.verify(bytes)?;
        self.write(&cid, bytes)
    }

    fn get(&self, cid: &Cid) -> Result<Option<Arc<[u8]>>, CasError> {
        match fs::read(self.path_for(cid)) {
            Ok(bytes) => {
                cid.verify(&bytes)?;
                Ok(Some(Arc::from(bytes)))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CasError::Io(err)),
        }
    }

    fn has(&self, cid: &Cid) -> bool {
        self.path_for(cid).is_file()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cid::DAG_CBOR;

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let cid = {
            let mut store = DiskTier::open(dir.path()).unwrap();
            store.put(DAG_CBOR, b"durable").unwrap()
        };
        let store = DiskTier::open(dir.path()).unwrap();
        assert!(store.has(&cid));
        assert_eq!(&*store.get(&cid).unwrap().unwrap(), b"durable");
    }

    #[test]
    fn corrupted_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DiskTier::open(dir.path()).unwrap();
        let cid = store.put(DAG_CBOR, b"pristine").unwrap();
        fs::write(dir.path().join(cid.to_string()), b"garbage").unwrap();
        assert!(matches!(
            store.get(&cid),
            Err(CasError::HashMismatch { .. })
        ));
    }

    #[test]
    fn put_repairs_a_corrupted_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DiskTier::open(dir.path()).unwrap();
        let cid = store.put(DAG_CBOR, b"pristine").unwrap();
        fs::write(dir.path().join(cid.to_string()), b"garbage").unwrap();

        assert_eq!(store.put(DAG_CBOR, b"pristine").unwrap(), cid);
        assert_eq!(&*store.get(&cid).unwrap().unwrap(), b"pristine");
    }

    #[test]
    fn concurrent_writers_leave_one_intact_block() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskTier::open(dir.path()).unwrap();
        let payload = vec![7u8; 256 * 1024];
        std::thread::scope(|s| {
            for _ in 0..8 {
                let mut store = store.clone();
                let payload = &payload;
                s.spawn(move || store.put(DAG_CBOR, payload).unwrap());
            }
        });
        let cid = Cid::of(DAG_CBOR, &payload);
        assert_eq!(store.get(&cid).unwrap().unwrap().len(), payload.len());
        // no temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_block_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskTier::open(dir.path()).unwrap();
        let cid = Cid::of(DAG_CBOR, b"never stored");
        assert!(!store.has(&cid));
        assert!(store.get(&cid).unwrap().is_none());
    }
}

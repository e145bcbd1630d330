//! Integrity-verified transfer
//!
//! `safe_move` copies a file in fixed-size chunks while hashing the stream,
//! then re-reads the destination and hashes it independently. The source is
//! deleted only when byte counts and digests agree; this is the only place
//! in the pipeline that deletes an artifact.
//!
//! An existing destination is never overwritten: the copy opens it with
//! `create_new`, and `verified_move` falls back to a numbered sibling name.
//!
//! The two phases are public so the verification step can be exercised
//! against a destination that was tampered with after the copy.

use crate::error::{AcquireError, AcquireResult};
use crate::services::naming::numbered_variant;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Chunk size used for both the copy and the verification read
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Numbered names tried after the requested destination is taken
pub const MAX_NAME_ATTEMPTS: u32 = 100;

/// Byte count and SHA-256 of one pass over a byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDigest {
    pub bytes: u64,
    pub sha256: String,
}

/// Outcome of comparing the copied stream against the destination on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified,
    SizeMismatch { copied: u64, on_disk: u64 },
    DigestMismatch { copied: String, on_disk: String },
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified)
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verification::Verified => f.write_str("verified"),
            Verification::SizeMismatch { copied, on_disk } => write!(
                f,
                "size mismatch: copied {} bytes, destination has {} bytes",
                copied, on_disk
            ),
            Verification::DigestMismatch { copied, on_disk } => write!(
                f,
                "checksum mismatch: copied {}, destination {}",
                copied, on_disk
            ),
        }
    }
}

/// Chunked, checksum-verified file transfer
#[derive(Debug, Clone)]
pub struct Transfer {
    chunk_size: usize,
}

impl Default for Transfer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl Transfer {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Stream `src` into `dst`, hashing exactly the bytes written
    ///
    /// Creates missing parent directories of `dst`. Never touches `src`.
    /// Fails with `AlreadyExists` when `dst` exists.
    pub fn copy_phase(&self, src: &Path, dst: &Path) -> io::Result<StreamDigest> {
        if same_file(src, dst)? {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("source and destination are the same file: {}", src.display()),
            ));
        }

        if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut reader = File::open(src)?;
        let mut writer = OpenOptions::new().write(true).create_new(true).open(dst)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];
        let mut bytes = 0u64;

        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read])?;
            hasher.update(&buffer[..read]);
            bytes += read as u64;
        }
        writer.sync_all()?;

        Ok(StreamDigest {
            bytes,
            sha256: format!("{:x}", hasher.finalize()),
        })
    }

    /// Hash a file from disk in chunks
    pub fn digest_file(&self, path: &Path) -> io::Result<StreamDigest> {
        let mut reader = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];
        let mut bytes = 0u64;

        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            bytes += read as u64;
        }

        Ok(StreamDigest {
            bytes,
            sha256: format!("{:x}", hasher.finalize()),
        })
    }

    /// Verify `dst` against the digest of the copy, deleting `src` only on a match
    pub fn commit(&self, src: &Path, dst: &Path, copied: &StreamDigest) -> io::Result<Verification> {
        let on_disk = self.digest_file(dst)?;

        let verification = if on_disk.bytes != copied.bytes {
            Verification::SizeMismatch {
                copied: copied.bytes,
                on_disk: on_disk.bytes,
            }
        } else if on_disk.sha256 != copied.sha256 {
            Verification::DigestMismatch {
                copied: copied.sha256.clone(),
                on_disk: on_disk.sha256,
            }
        } else {
            Verification::Verified
        };

        if verification.is_verified() {
            fs::remove_file(src)?;
        }

        Ok(verification)
    }

    /// Copy, verify, and delete the source on success
    pub fn transfer(&self, src: &Path, dst: &Path) -> io::Result<Verification> {
        let copied = self.copy_phase(src, dst)?;
        self.commit(src, dst, &copied)
    }

    /// Transfer to `dst`, or to `name (2).ext`, `name (3).ext`, ... when taken
    pub fn transfer_to_free_path(&self, src: &Path, dst: &Path) -> io::Result<(PathBuf, Verification)> {
        let mut target = dst.to_path_buf();
        for attempt in 2..=MAX_NAME_ATTEMPTS + 1 {
            match self.copy_phase(src, &target) {
                Ok(copied) => {
                    let verification = self.commit(src, &target, &copied)?;
                    return Ok((target, verification));
                }
                // create_dir_all also reports AlreadyExists when a parent is a file
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && target.exists() => {
                    tracing::debug!(taken = %target.display(), "Destination exists, trying next name");
                    target = numbered_variant(dst, attempt);
                }
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free name for {} within {} numbered names", dst.display(), MAX_NAME_ATTEMPTS),
        ))
    }

    /// `true` only when the destination was proven identical and the source removed
    pub fn safe_move(&self, src: &Path, dst: &Path) -> io::Result<bool> {
        Ok(self.transfer(src, dst)?.is_verified())
    }
}

fn same_file(src: &Path, dst: &Path) -> io::Result<bool> {
    if !dst.exists() {
        return Ok(false);
    }
    Ok(fs::canonicalize(src)? == fs::canonicalize(dst)?)
}

/// Verified move on the blocking pool, mismatches mapped to `IntegrityMismatch`
///
/// Returns the path actually written, which differs from `dst` when `dst`
/// already existed.
pub async fn verified_move(src: PathBuf, dst: PathBuf) -> AcquireResult<PathBuf> {
    tracing::debug!(src = %src.display(), dst = %dst.display(), "Starting verified move");

    let (task_src, task_dst) = (src.clone(), dst.clone());
    let (written, verification) =
        tokio::task::spawn_blocking(move || Transfer::default().transfer_to_free_path(&task_src, &task_dst))
            .await
            .map_err(|e| AcquireError::IntegrityMismatch {
                src: src.clone(),
                dst: dst.clone(),
                detail: format!("transfer task failed: {}", e),
            })?
            .map_err(|e| AcquireError::IntegrityMismatch {
                src: src.clone(),
                dst: dst.clone(),
                detail: e.to_string(),
            })?;

    if !verification.is_verified() {
        tracing::warn!(
            src = %src.display(),
            dst = %written.display(),
            detail = %verification,
            "Transfer verification failed, both files kept"
        );
        return Err(AcquireError::IntegrityMismatch {
            src,
            dst: written,
            detail: verification.to_string(),
        });
    }

    tracing::debug!(dst = %written.display(), "Verified move complete");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};
    use tempfile::TempDir;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn test_safe_move_success_deletes_source() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp3");
        let dst = dir.path().join("nested/out/b.mp3");
        let data = payload(200_000);
        fs::write(&src, &data).unwrap();

        assert!(Transfer::default().safe_move(&src, &dst).unwrap());
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), data);
    }

    #[test]
    fn test_corrupted_destination_keeps_source() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp3");
        let dst = dir.path().join("b.mp3");
        let data = payload(100_000);
        fs::write(&src, &data).unwrap();

        let transfer = Transfer::new(4096);
        let copied = transfer.copy_phase(&src, &dst).unwrap();

        let mut file = fs::OpenOptions::new().write(true).open(&dst).unwrap();
        file.seek(SeekFrom::Start(50_000)).unwrap();
        file.write_all(&[data[50_000] ^ 0xFF]).unwrap();
        drop(file);

        let verification = transfer.commit(&src, &dst, &copied).unwrap();
        assert!(matches!(verification, Verification::DigestMismatch { .. }));
        assert_eq!(fs::read(&src).unwrap(), data);
        assert!(dst.exists());
    }

    #[test]
    fn test_truncated_destination_is_size_mismatch() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.bin");
        let dst = dir.path().join("b.bin");
        fs::write(&src, payload(10_000)).unwrap();

        let transfer = Transfer::default();
        let copied = transfer.copy_phase(&src, &dst).unwrap();
        fs::write(&dst, payload(9_999)).unwrap();

        let verification = transfer.commit(&src, &dst, &copied).unwrap();
        assert_eq!(
            verification,
            Verification::SizeMismatch {
                copied: 10_000,
                on_disk: 9_999
            }
        );
        assert!(src.exists());
    }

    #[test]
    fn test_empty_file_moves() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("empty");
        let dst = dir.path().join("moved");
        fs::write(&src, b"").unwrap();

        assert!(Transfer::default().safe_move(&src, &dst).unwrap());
        assert_eq!(fs::metadata(&dst).unwrap().len(), 0);
    }

    #[test]
    fn test_missing_source_is_error_and_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("out.mp3");
        assert!(Transfer::default()
            .safe_move(&dir.path().join("missing.mp3"), &dst)
            .is_err());
        assert!(!dst.exists());
    }

    #[test]
    fn test_same_path_is_rejected() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp3");
        fs::write(&src, b"data").unwrap();
        assert!(Transfer::default().safe_move(&src, &src).is_err());
        assert_eq!(fs::read(&src).unwrap(), b"data");
    }

    #[test]
    fn test_existing_destination_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.mp3");
        let dst = dir.path().join("existing.mp3");
        fs::write(&src, b"new download").unwrap();
        fs::write(&dst, b"library copy").unwrap();

        let err = Transfer::default().safe_move(&src, &dst).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&dst).unwrap(), b"library copy");
        assert_eq!(fs::read(&src).unwrap(), b"new download");
    }

    #[test]
    fn test_free_path_skips_taken_names() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.mp3");
        let dst = dir.path().join("Halo.mp3");
        fs::write(&src, b"second").unwrap();
        fs::write(&dst, b"first").unwrap();
        fs::write(dir.path().join("Halo (2).mp3"), b"also taken").unwrap();

        let (written, verification) = Transfer::default().transfer_to_free_path(&src, &dst).unwrap();
        assert!(verification.is_verified());
        assert_eq!(written, dir.path().join("Halo (3).mp3"));
        assert_eq!(fs::read(&dst).unwrap(), b"first");
        assert_eq!(fs::read(&written).unwrap(), b"second");
        assert!(!src.exists());
    }

    #[tokio::test]
    async fn test_verified_move_async() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp3");
        let dst = dir.path().join("b.mp3");
        fs::write(&src, b"audio").unwrap();

        let moved = verified_move(src.clone(), dst.clone()).await.unwrap();
        assert_eq!(moved, dst);
        assert!(!src.exists());
    }
}

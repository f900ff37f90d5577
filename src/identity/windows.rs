//! Windows file identity.
//!
//! `std::fs::Metadata` on Windows does not expose the volume serial number,
//! the file index or the link count on stable Rust, so they are queried with
//! `GetFileInformationByHandle`. Opening the handle is expensive; the answer
//! is computed on first use and cached for the lifetime of the object.
//!
//! Attribute matching compares the volume, the file attribute bits and the
//! owner SID. The owner is read with `GetSecurityInfo` on a second handle
//! opened with `READ_CONTROL`, only when attributes are compared.

use std::fs::{Metadata, OpenOptions};
use std::io;
use std::os::windows::fs::{MetadataExt, OpenOptionsExt};
use std::os::windows::io::AsRawHandle;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::OnceLock;

use winapi::shared::minwindef::HLOCAL;
use winapi::shared::winerror::ERROR_SUCCESS;
use winapi::um::accctrl::SE_FILE_OBJECT;
use winapi::um::aclapi::GetSecurityInfo;
use winapi::um::fileapi::{GetFileInformationByHandle, BY_HANDLE_FILE_INFORMATION};
use winapi::um::securitybaseapi::GetLengthSid;
use winapi::um::winbase::{LocalFree, FILE_FLAG_BACKUP_SEMANTICS, FILE_FLAG_OPEN_REPARSE_POINT};
use winapi::um::winnt::{
    FILE_SHARE_READ, FILE_SHARE_WRITE, HANDLE, OWNER_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR,
    PSID, READ_CONTROL,
};

use super::FileIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HandleInfo {
    volume_serial: u32,
    file_index: u64,
    links: u32,
}

/// File identity backed by a lazily opened Windows file handle.
#[derive(Debug)]
pub struct WindowsStat {
    path: PathBuf,
    metadata: Metadata,
    info: OnceLock<HandleInfo>,
    owner: OnceLock<Vec<u8>>,
}

impl WindowsStat {
    #[must_use]
    pub fn new(path: PathBuf, metadata: Metadata) -> Self {
        Self {
            path,
            metadata,
            info: OnceLock::new(),
            owner: OnceLock::new(),
        }
    }

    /// Owner SID bytes, queried once.
    fn owner(&self) -> io::Result<&[u8]> {
        if let Some(sid) = self.owner.get() {
            return Ok(sid.as_slice());
        }
        let sid = query_owner(&self.path)?;
        Ok(self.owner.get_or_init(|| sid).as_slice())
    }

    fn load(&self) -> io::Result<HandleInfo> {
        if let Some(info) = self.info.get() {
            return Ok(*info);
        }
        let info = query_handle_info(&self.path)?;
        Ok(*self.info.get_or_init(|| info))
    }
}

fn query_handle_info(path: &Path) -> io::Result<HandleInfo> {
    // Zero access rights: only attribute queries are performed. The reparse
    // flag keeps symlinks from being followed.
    let file = OpenOptions::new()
        .access_mode(0)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS | FILE_FLAG_OPEN_REPARSE_POINT)
        .open(path)
        .map_err(|e| io::Error::new(e.kind(), format!("CreateFile {}: {}", path.display(), e)))?;

    // SAFETY: the handle is owned by `file` and stays open for the call; the
    // output struct is plain data that the call fully initializes on success.
    let mut raw: BY_HANDLE_FILE_INFORMATION = unsafe { std::mem::zeroed() };
    let ok = unsafe { GetFileInformationByHandle(file.as_raw_handle() as HANDLE, &mut raw) };
    if ok == 0 {
        let e = io::Error::last_os_error();
        return Err(io::Error::new(
            e.kind(),
            format!("GetFileInformationByHandle {}: {}", path.display(), e),
        ));
    }

    Ok(HandleInfo {
        volume_serial: raw.dwVolumeSerialNumber,
        file_index: (u64::from(raw.nFileIndexHigh) << 32) | u64::from(raw.nFileIndexLow),
        links: raw.nNumberOfLinks,
    })
}

fn query_owner(path: &Path) -> io::Result<Vec<u8>> {
    let file = OpenOptions::new()
        .access_mode(READ_CONTROL)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS | FILE_FLAG_OPEN_REPARSE_POINT)
        .open(path)
        .map_err(|e| io::Error::new(e.kind(), format!("CreateFile {}: {}", path.display(), e)))?;

    let mut owner: PSID = ptr::null_mut();
    let mut descriptor: PSECURITY_DESCRIPTOR = ptr::null_mut();
    // SAFETY: the handle is owned by `file`. On success `owner` points into
    // `descriptor`, which is freed with LocalFree after the SID is copied.
    let status = unsafe {
        GetSecurityInfo(
            file.as_raw_handle() as HANDLE,
            SE_FILE_OBJECT,
            OWNER_SECURITY_INFORMATION,
            &mut owner,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            &mut descriptor,
        )
    };
    if status != ERROR_SUCCESS {
        let e = io::Error::from_raw_os_error(status as i32);
        return Err(io::Error::new(
            e.kind(),
            format!("GetSecurityInfo {}: {}", path.display(), e),
        ));
    }

    let sid = unsafe {
        let len = GetLengthSid(owner) as usize;
        std::slice::from_raw_parts(owner as *const u8, len).to_vec()
    };
    unsafe {
        LocalFree(descriptor as HLOCAL);
    }
    Ok(sid)
}

impl FileIdentity for WindowsStat {
    fn path(&self) -> &Path {
        &self.path
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn device(&self) -> io::Result<u64> {
        Ok(u64::from(self.load()?.volume_serial))
    }

    fn link_count(&self) -> io::Result<u64> {
        Ok(u64::from(self.load()?.links))
    }

    fn same_file(&self, other: &Self) -> bool {
        match (self.load(), other.load()) {
            (Ok(a), Ok(b)) => a.volume_serial == b.volume_serial && a.file_index == b.file_index,
            _ => false,
        }
    }

    fn same_attributes(&self, other: &Self) -> bool {
        match (self.load(), other.load()) {
            (Ok(a), Ok(b)) => {
                a.volume_serial == b.volume_serial
                    && self.metadata.file_attributes() == other.metadata.file_attributes()
                    && matches!((self.owner(), other.owner()), (Ok(x), Ok(y)) if x == y)
            }
            _ => false,
        }
    }
}

//! Advisory lock over bank mutations.
//!
//! Every operation that rewrites the manifest or the bank tree holds a lock
//! file inside the bank root containing the holder's PID. The file name starts
//! with a dot, so reconciliation never mistakes it for a rule.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::{Result, RuleError};

/// Name of the lock file within the bank root
pub const LOCK_FILE_NAME: &str = ".lock";

/// A guard that holds the bank lock.
/// The lock file is removed when this guard is dropped.
#[derive(Debug)]
pub struct BankLock {
    path: PathBuf,
}

impl BankLock {
    /// Get the path to the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BankLock {
    fn drop(&mut self) {
        // Best-effort cleanup of the lock file
        let _ = fs::remove_file(&self.path);
    }
}

/// Get the path to the lock file for a given bank root.
pub fn lock_file_path(bank_root: &Path) -> PathBuf {
    bank_root.join(LOCK_FILE_NAME)
}

/// Acquire the bank lock.
///
/// Fails with [`RuleError::BankLocked`] if a live process holds it. A lock
/// file left behind by a dead process is removed and the lock retaken.
pub fn acquire_bank_lock(bank_root: &Path) -> Result<BankLock> {
    let lock_path = lock_file_path(bank_root);
    fs::create_dir_all(bank_root)?;

    if let Some(existing_pid) = read_lock_file(&lock_path) {
        if is_process_alive(existing_pid) {
            return Err(RuleError::BankLocked(existing_pid));
        }
        tracing::debug!("Removing stale bank lock held by pid {}", existing_pid);
        fs::remove_file(&lock_path)?;
    }

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true) // Fail if file exists (race condition protection)
        .open(&lock_path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            // Another process created the file between our check and create
            match read_lock_file(&lock_path) {
                Some(pid) if is_process_alive(pid) => return Err(RuleError::BankLocked(pid)),
                _ => {
                    let _ = fs::remove_file(&lock_path);
                    OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .open(&lock_path)?
                }
            }
        }
        Err(e) => return Err(e.into()),
    };

    writeln!(file, "{}", std::process::id())?;

    Ok(BankLock { path: lock_path })
}

/// Read the PID from a lock file. Missing or unreadable files yield `None`.
fn read_lock_file(path: &Path) -> Option<u32> {
    let mut file = File::open(path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse::<u32>().ok()
}

/// Check if a process with the given PID is still alive.
#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    // On Unix, sending signal 0 checks if process exists without actually signaling
    // SAFETY: This is a standard Unix API call
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(windows)]
fn is_process_alive(pid: u32) -> bool {
    // PROCESS_QUERY_LIMITED_INFORMATION = 0x1000
    const PROCESS_QUERY_LIMITED_INFORMATION: u32 = 0x1000;

    unsafe {
        let handle = windows_sys::Win32::System::Threading::OpenProcess(
            PROCESS_QUERY_LIMITED_INFORMATION,
            0, // bInheritHandle = FALSE
            pid,
        );

        if handle.is_null() {
            return false;
        }

        let mut exit_code: u32 = 0;
        let result = windows_sys::Win32::System::Threading::GetExitCodeProcess(
            handle,
            &mut exit_code as *mut u32,
        );

        windows_sys::Win32::Foundation::CloseHandle(handle);

        // STILL_ACTIVE = 259
        result != 0 && exit_code == 259
    }
}

#[cfg(not(any(unix, windows)))]
fn is_process_alive(_pid: u32) -> bool {
    true
}

//! Shared-Clock Reader (§4.1).
//!
//! Reads a versioned, torn-write-protected record maintained by an external
//! PTP daemon in a POSIX shared-memory region. The daemon writes `main`,
//! then `secondary`, with full fences between; this reader reads both and
//! retries until they agree, the wait-free substitute for a reader/writer
//! lock described in §9.

use std::ffi::CString;
use std::sync::atomic::{fence, Ordering};

/// Expected value of the shared record's version field.
///
/// Mirrors `NQPTP_SHM_STRUCTURES_VERSION` in the shared-memory interface
/// (§6): a zero version means the daemon hasn't initialised the region yet,
/// a mismatched non-zero version means an incompatible daemon is running.
pub const SHM_STRUCTURES_VERSION: u32 = 7;

/// Maximum number of double-read attempts before giving up (§3, §8 scenario 4).
const MAX_READ_ATTEMPTS: u32 = 10;

/// One snapshot of the master clock as seen by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct ClockSet {
    /// Non-zero identity of the current PTP master clock.
    pub master_clock_id: u64,
    /// Daemon's local monotonic time at the moment of the sample, in ns.
    pub local_time: u64,
    /// `local_time - master_time`, in ns; may be negative.
    pub local_to_master_offset: i64,
    /// Local time at which the current master clock became mastership, in ns.
    pub master_clock_start_time: u64,
}

/// The full record mapped from shared memory: two copies of the same set
/// plus a version tag, written by the daemon with release fences between.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct ShmRecord {
    /// Structure version, checked against [`SHM_STRUCTURES_VERSION`].
    pub version: u32,
    /// First (primary) copy of the clock set.
    pub main: ClockSet,
    /// Second copy, always written strictly after `main`.
    pub secondary: ClockSet,
}

/// Errors the shared-clock reader can report.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ClockError {
    /// The shared-memory region does not exist or is not yet initialised
    /// (version field reads zero).
    #[error("PTP shared-clock service unavailable")]
    ServiceUnavailable,
    /// The region's version does not match what this reader expects.
    #[error("PTP shared-clock version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this reader was built against.
        expected: u32,
        /// Version found in the region.
        actual: u32,
    },
    /// `main` and `secondary` never agreed within [`MAX_READ_ATTEMPTS`].
    #[error("PTP shared-clock data unavailable after {attempts} attempts")]
    DataUnavailable {
        /// Number of read attempts made.
        attempts: u32,
    },
    /// The region is readable and consistent but reports no master clock.
    #[error("no PTP master clock")]
    NoMaster,
    /// The region could not be opened or mapped.
    #[error("PTP shared-clock access error: {0}")]
    AccessError(String),
}

/// Result of a successful [`SharedClockReader::get_clock_info`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockInfo {
    /// Identity of the current master clock.
    pub clock_id: u64,
    /// Daemon-local time of the sample, in ns.
    pub local_time: u64,
    /// Offset from local time to master time, in ns.
    pub offset_to_master: i64,
    /// When the current master clock took over mastership, in ns.
    pub mastership_start: u64,
}

/// Anything that can answer "who is the master clock right now". Lets
/// [`crate::clock::anchor::AnchorStore`] be tested without real shared memory.
pub trait ClockSource {
    /// Query the current master clock.
    fn get_clock_info(&self) -> Result<ClockInfo, ClockError>;
}

/// Reads the versioned double-buffered shared-memory record produced by an
/// external PTP daemon.
///
/// The mapping itself is process-wide and read-only after `open`, matching
/// the "process-level singleton" carve-out in §9's design notes.
pub struct SharedClockReader {
    mapping: Option<Mapping>,
}

struct Mapping {
    addr: *const ShmRecord,
    len: usize,
}

// The mapping is read-only memory shared with an external process; reading
// it from multiple threads is safe, it is simply an ordinary shared `&T`.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl SharedClockReader {
    /// Open (mmap) the named shared-memory region.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::AccessError`] if the region can't be opened or
    /// mapped (e.g. the PTP daemon has never run).
    pub fn open(shm_name: &str) -> Result<Self, ClockError> {
        let cname = CString::new(shm_name)
            .map_err(|e| ClockError::AccessError(format!("invalid shm name: {e}")))?;

        // SAFETY: `shm_open` takes a NUL-terminated name and standard POSIX
        // open flags/mode; O_RDONLY with mode 0 matches a read-only client.
        let fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDONLY, 0) };
        if fd < 0 {
            return Err(ClockError::AccessError(
                std::io::Error::last_os_error().to_string(),
            ));
        }

        let len = std::mem::size_of::<ShmRecord>();
        // SAFETY: `fd` is a just-opened, valid shared-memory descriptor;
        // `len` matches the record this reader interprets the mapping as.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        // SAFETY: `fd` was returned by `shm_open` above and is not used again.
        unsafe {
            libc::close(fd);
        }

        if addr == libc::MAP_FAILED {
            return Err(ClockError::AccessError(
                std::io::Error::last_os_error().to_string(),
            ));
        }

        Ok(Self {
            mapping: Some(Mapping {
                addr: addr.cast::<ShmRecord>(),
                len,
            }),
        })
    }

    /// Construct a reader over an already-mapped region.
    ///
    /// Exists so tests can drive the double-read protocol against a plain
    /// heap-allocated `ShmRecord` instead of real shared memory.
    #[cfg(test)]
    fn from_raw(addr: *const ShmRecord) -> Self {
        Self {
            mapping: Some(Mapping {
                addr,
                len: std::mem::size_of::<ShmRecord>(),
            }),
        }
    }

    /// Read one `main`/`secondary` copy each, with acquire fences between,
    /// retrying until they agree or the attempt budget is exhausted.
    fn read_consistent(&self) -> Result<ShmRecord, ClockError> {
        let Some(mapping) = &self.mapping else {
            return Err(ClockError::ServiceUnavailable);
        };

        for attempt in 1..=MAX_READ_ATTEMPTS {
            // SAFETY: `mapping.addr` points at `len` bytes of a read-only
            // mapping that outlives this call; `ShmRecord` is `Copy`/`repr(C)`.
            let first = unsafe { std::ptr::read_volatile(mapping.addr) };
            fence(Ordering::Acquire);
            let second = unsafe { std::ptr::read_volatile(mapping.addr) };
            fence(Ordering::Acquire);

            if first.main == second.secondary {
                return Ok(first);
            }

            if attempt < MAX_READ_ATTEMPTS {
                std::thread::sleep(std::time::Duration::from_micros(2));
            }
        }

        Err(ClockError::DataUnavailable {
            attempts: MAX_READ_ATTEMPTS,
        })
    }

    /// Query the current master clock (§4.1 operation).
    ///
    /// # Errors
    ///
    /// See [`ClockError`] for the conditions under which each variant is
    /// returned.
    pub fn get_clock_info(&self) -> Result<ClockInfo, ClockError> {
        let record = self.read_consistent()?;

        if record.version == 0 {
            return Err(ClockError::ServiceUnavailable);
        }
        if record.version != SHM_STRUCTURES_VERSION {
            return Err(ClockError::VersionMismatch {
                expected: SHM_STRUCTURES_VERSION,
                actual: record.version,
            });
        }
        if record.main.master_clock_id == 0 {
            return Err(ClockError::NoMaster);
        }

        Ok(ClockInfo {
            clock_id: record.main.master_clock_id,
            local_time: record.main.local_time,
            offset_to_master: record.main.local_to_master_offset,
            mastership_start: record.main.master_clock_start_time,
        })
    }
}

impl ClockSource for SharedClockReader {
    fn get_clock_info(&self) -> Result<ClockInfo, ClockError> {
        SharedClockReader::get_clock_info(self)
    }
}

impl Drop for SharedClockReader {
    fn drop(&mut self) {
        if let Some(mapping) = self.mapping.take() {
            // SAFETY: `mapping.addr`/`mapping.len` describe exactly the
            // region mapped in `open`, unmapped exactly once here.
            unsafe {
                libc::munmap(mapping.addr.cast::<libc::c_void>().cast_mut(), mapping.len);
            }
        }
    }
}

//! Persisted armed flag.
//!
//! The system is armed while the state file exists, so the flag survives a
//! `restart`.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

#[derive(Debug)]
pub struct AlarmSystem {
    state_file: PathBuf,
    armed: AtomicBool,
}

impl AlarmSystem {
    /// Read the initial state from the state file.
    pub fn new(state_file: impl Into<PathBuf>) -> Self {
        let state_file = state_file.into();
        let armed = state_file.exists();
        info!(armed, state_file = %state_file.display(), "Alarm state loaded");
        Self {
            state_file,
            armed: AtomicBool::new(armed),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn arm(&self) -> io::Result<()> {
        if let Some(parent) = self.state_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.state_file, b"")?;
        self.armed.store(true, Ordering::SeqCst);
        info!("System armed");
        Ok(())
    }

    pub fn disarm(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.state_file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.armed.store(false, Ordering::SeqCst);
        info!("System disarmed");
        Ok(())
    }

    /// `armed` or `disarmed`.
    pub fn status(&self) -> &'static str {
        if self.is_armed() {
            "armed"
        } else {
            "disarmed"
        }
    }
}

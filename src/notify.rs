//! Reminder delivery outside the task list: desktop notifications and an
//! audio cue. Delivery is best-effort; callers log failures and move on.

use crate::error::{Error, Result};
use crate::reminder::Reminder;
use crate::storage::Storage;
use std::{
    cell::RefCell,
    io::{self, Write},
    path::PathBuf,
    process::Command,
    rc::Rc,
};

pub const PERMISSION_KEY: &str = "notifications";

pub trait Notifier {
    fn notify(&mut self, reminder: &Reminder) -> Result<()>;
}

/// Lets the TUI keep a handle on a notifier the scheduler also drives.
impl<N: Notifier> Notifier for Rc<RefCell<N>> {
    fn notify(&mut self, reminder: &Reminder) -> Result<()> {
        self.borrow_mut().notify(reminder)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Permission {
    #[default]
    Default,
    Granted,
    Denied,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Default => "default",
            Permission::Granted => "granted",
            Permission::Denied => "denied",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "granted" => Permission::Granted,
            "denied" => Permission::Denied,
            _ => Permission::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    /// No notification tool on this system.
    Unsupported,
    /// The user denied notifications earlier.
    Blocked,
    Granted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Backend {
    NotifySend(PathBuf),
    AppleScript(PathBuf),
}

impl Backend {
    fn detect() -> Option<Self> {
        if let Ok(path) = which::which("notify-send") {
            return Some(Backend::NotifySend(path));
        }
        which::which("osascript").ok().map(Backend::AppleScript)
    }

    fn send(&self, title: &str, body: &str) -> Result<()> {
        let status = match self {
            Backend::NotifySend(path) => Command::new(path)
                .args(["--app-name", "taskminder", title, body])
                .status()?,
            Backend::AppleScript(path) => {
                let script = format!(
                    "display notification {} with title {}",
                    applescript_quote(body),
                    applescript_quote(title)
                );
                Command::new(path).args(["-e", &script]).status()?
            }
        };
        if status.success() {
            Ok(())
        } else {
            Err(Error::Notify(format!("notifier exited with {status}")))
        }
    }
}

fn applescript_quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Desktop notification channel, gated by a persisted permission.
pub struct DesktopNotifier {
    permission: Permission,
    backend: Option<Backend>,
    storage: Box<dyn Storage>,
}

impl DesktopNotifier {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self::with_backend(storage, Backend::detect())
    }

    fn with_backend(storage: Box<dyn Storage>, backend: Option<Backend>) -> Self {
        let permission = match storage.get(PERMISSION_KEY) {
            Ok(Some(raw)) => Permission::parse(&raw),
            Ok(None) => Permission::Default,
            Err(err) => {
                log::warn!("Failed to read notification permission: {err}");
                Permission::Default
            }
        };
        Self {
            permission,
            backend,
            storage,
        }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn is_supported(&self) -> bool {
        self.backend.is_some()
    }

    pub fn request_permission(&mut self) -> PermissionOutcome {
        let Some(backend) = &self.backend else {
            return PermissionOutcome::Unsupported;
        };
        if self.permission == Permission::Denied {
            return PermissionOutcome::Blocked;
        }
        if let Err(err) = backend.send("Notifications Enabled", "You will be reminded of your tasks!") {
            log::warn!("Confirmation notification failed: {err}");
        }
        self.set_permission(Permission::Granted);
        PermissionOutcome::Granted
    }

    pub fn set_permission(&mut self, permission: Permission) {
        self.permission = permission;
        if let Err(err) = self.storage.set(PERMISSION_KEY, permission.as_str()) {
            log::error!("Failed to save notification permission: {err}");
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&mut self, reminder: &Reminder) -> Result<()> {
        if self.permission != Permission::Granted {
            return Ok(());
        }
        match &self.backend {
            Some(backend) => backend.send(
                &format!("Task Due: {}", reminder.text),
                "It's time to complete this task!",
            ),
            None => Ok(()),
        }
    }
}

/// Rings the terminal bell once per reminder.
pub struct AudioCue<W: Write = io::Stdout> {
    out: W,
}

impl AudioCue {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

#[cfg(test)]
impl<W: Write> AudioCue<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Notifier for AudioCue<W> {
    fn notify(&mut self, _reminder: &Reminder) -> Result<()> {
        self.out.write_all(b"\x07")?;
        self.out.flush()?;
        Ok(())
    }
}

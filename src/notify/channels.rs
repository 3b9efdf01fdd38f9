use std::io::ErrorKind;
use std::process::Stdio;

use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::NotifyError;
use crate::notify::{Channel, Notice};

// ---------------------------------------------------------------------------
// CommandChannel: native notifications and speech via platform tools
// ---------------------------------------------------------------------------

/// Hands a notice to a local program (`notify-send`, `osascript`, `spd-say`, ...).
/// A missing program makes the channel unavailable so the next one is tried.
///
/// The program runs on the tokio runtime and is reaped by a background task,
/// so `deliver` never waits on it.
pub struct CommandChannel {
    name: &'static str,
    program: String,
    build_args: fn(&Notice) -> Vec<String>,
}

impl CommandChannel {
    pub fn new(
        name: &'static str,
        program: impl Into<String>,
        build_args: fn(&Notice) -> Vec<String>,
    ) -> Self {
        Self {
            name,
            program: program.into(),
            build_args,
        }
    }

    /// Native desktop notification for the current platform, if there is one.
    pub fn desktop() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(Self::new("desktop", "notify-send", |n| vec![n.title.clone(), n.body.clone()]))
        } else if cfg!(target_os = "macos") {
            Some(Self::new("desktop", "osascript", |n| {
                vec![
                    "-e".to_string(),
                    format!("display notification {:?} with title {:?}", n.body, n.title),
                ]
            }))
        } else {
            None
        }
    }

    /// Local speech synthesizer for the current platform, if there is one.
    /// Only the body is spoken.
    pub fn speech() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(Self::new("speech", "spd-say", |n| vec![n.body.clone()]))
        } else if cfg!(target_os = "macos") {
            Some(Self::new("speech", "say", |n| vec![n.body.clone()]))
        } else {
            None
        }
    }
}

impl Channel for CommandChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    fn deliver(&self, notice: &Notice) -> Result<(), NotifyError> {
        let handle = Handle::try_current().map_err(|_| NotifyError::Failed {
            channel: self.name,
            reason: "no tokio runtime".to_string(),
        })?;

        let mut cmd = Command::new(&self.program);
        cmd.args((self.build_args)(notice))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = {
            let _guard = handle.enter();
            cmd.spawn().map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    NotifyError::Unavailable(self.name)
                } else {
                    NotifyError::Failed {
                        channel: self.name,
                        reason: e.to_string(),
                    }
                }
            })?
        };

        let channel = self.name;
        let program = self.program.clone();
        handle.spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => warn!(channel, "{program} exited with {status}"),
                Err(e) => warn!(channel, "{program} wait failed: {e}"),
            }
        });
        debug!(channel = self.name, program = %self.program, "Notice delivered");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PopupChannel: in-app transient popup
// ---------------------------------------------------------------------------

/// Queues the notice for the dashboard, which shows it as an overlay.
/// Unavailable once the dashboard has gone away.
pub struct PopupChannel {
    tx: mpsc::UnboundedSender<Notice>,
}

impl PopupChannel {
    pub fn new(tx: mpsc::UnboundedSender<Notice>) -> Self {
        Self { tx }
    }
}

impl Channel for PopupChannel {
    fn name(&self) -> &'static str {
        "popup"
    }

    fn deliver(&self, notice: &Notice) -> Result<(), NotifyError> {
        self.tx
            .send(notice.clone())
            .map_err(|_| NotifyError::Unavailable("popup"))
    }
}

// ---------------------------------------------------------------------------
// LogChannel: last resort, never fails
// ---------------------------------------------------------------------------

pub struct LogChannel;

impl Channel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    fn deliver(&self, notice: &Notice) -> Result<(), NotifyError> {
        info!(title = %notice.title, "[NOTICE] {}: {}", notice.title, notice.body);
        Ok(())
    }
}

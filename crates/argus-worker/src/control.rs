//! Plaintext control channel over local TCP.
//!
//! One command per connection: the client writes a command, reads the
//! response and the server closes the connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use argus_models::{ControlCommand, DEFAULT_RESPONSE};
use argus_notify::NotificationDispatcher;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::alarm::AlarmSystem;
use crate::error::WorkerResult;
use crate::fatal::{FatalSender, ShutdownReason};
use crate::state::SourceStateStore;

/// Largest command accepted.
pub const MAX_COMMAND_BYTES: usize = 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Applies control commands to shared state.
pub struct ControlHandler {
    alarm: Arc<AlarmSystem>,
    state: Arc<SourceStateStore>,
    dispatcher: NotificationDispatcher,
    sources: Vec<String>,
}

impl ControlHandler {
    pub fn new(
        alarm: Arc<AlarmSystem>,
        state: Arc<SourceStateStore>,
        dispatcher: NotificationDispatcher,
        sources: Vec<String>,
    ) -> Self {
        Self {
            alarm,
            state,
            dispatcher,
            sources,
        }
    }

    /// Apply a command and return the response text.
    ///
    /// `restart` only answers here; the listener reports the shutdown after
    /// the response is written.
    pub fn handle(&self, command: &ControlCommand) -> String {
        match command {
            ControlCommand::Restart => {}
            ControlCommand::Reset => self.state.clear_silence_all(),
            ControlCommand::GetPhotos => self
                .state
                .request_photos(self.sources.iter().map(String::as_str)),
            ControlCommand::Arming => {
                if let Err(e) = self.alarm.arm() {
                    error!(error = %e, "Failed to persist armed state");
                }
            }
            ControlCommand::Disarming => {
                if let Err(e) = self.alarm.disarm() {
                    error!(error = %e, "Failed to persist disarmed state");
                }
            }
            ControlCommand::Status => return self.alarm.status().to_string(),
            ControlCommand::RunScene => {
                self.dispatcher.run_scene();
            }
            ControlCommand::SaveCode(code) => {
                self.dispatcher.save_auth_code(code.as_str());
            }
        }
        DEFAULT_RESPONSE.to_string()
    }

    /// Parse raw input and apply it. Unknown input is logged and answered
    /// like any other command.
    pub fn handle_raw(&self, raw: &str) -> (String, Option<ControlCommand>) {
        match raw.parse::<ControlCommand>() {
            Ok(command) => {
                info!(command = %command, "Control command");
                (self.handle(&command), Some(command))
            }
            Err(_) => {
                warn!(command = raw.trim(), "Unknown control command");
                (DEFAULT_RESPONSE.to_string(), None)
            }
        }
    }
}

pub struct ControlListener {
    listener: TcpListener,
    handler: Arc<ControlHandler>,
    fatal: FatalSender,
}

impl ControlListener {
    pub async fn bind(
        addr: SocketAddr,
        handler: Arc<ControlHandler>,
        fatal: FatalSender,
    ) -> WorkerResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Control listener bound");
        Ok(Self {
            listener,
            handler,
            fatal,
        })
    }

    pub fn local_addr(&self) -> WorkerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let handler = Arc::clone(&self.handler);
                    let fatal = self.fatal.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve(stream, &handler, &fatal).await {
                            debug!(peer = %peer, error = %e, "Control connection failed");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Control accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

async fn serve(
    mut stream: TcpStream,
    handler: &ControlHandler,
    fatal: &FatalSender,
) -> std::io::Result<()> {
    let mut buf = [0u8; MAX_COMMAND_BYTES];
    let n = match tokio::time::timeout(READ_TIMEOUT, stream.read(&mut buf)).await {
        Ok(read) => read?,
        Err(_) => {
            debug!("Control client sent nothing, closing");
            return Ok(());
        }
    };

    let raw = String::from_utf8_lossy(&buf[..n]);
    let (response, command) = handler.handle_raw(&raw);

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;

    if command == Some(ControlCommand::Restart) {
        info!("Restart requested over control channel");
        fatal.report(ShutdownReason::RestartRequested);
    }
    Ok(())
}

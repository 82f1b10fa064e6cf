//! Hot-reload server
//!
//! The connected clients are shared between:
//! - One thread per incoming connection, which performs the WebSocket
//!   handshake, rebuilds the bundle and greets the client with `REFRESH_BUNDLE`
//! - The watcher, which turns file-system events into `STYLE`/`SCRIPT`
//!   messages and broadcasts them to every client
//!
//! Sockets carry read and write timeouts, so a peer that never finishes the
//! handshake or stops reading is dropped instead of stalling the server.

use notify::{recommended_watcher, Event, EventKind, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::net::{TcpListener, TcpStream};
use std::path::{Component, Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use tungstenite::{Message as Frame, WebSocket};

use quark_pm::NODE_MODULES;

use crate::bundler::{BundleError, Bundler, FileArtifact, ReloadConfig};

use super::protocol::{Command, Message, ProtocolError, RefreshContent, ScriptContent, StyleContent};

/// Errors that stop the reload server
#[derive(Debug, Error)]
pub enum ReloadError {
    /// The listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The file watcher could not be started
    #[error("Failed to watch sources: {0}")]
    Watch(#[from] notify::Error),

    /// Rebuilding failed
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// A message could not be encoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Time a peer gets to complete the WebSocket handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Time one frame may take to reach a client before it is dropped
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// State shared by the connection threads and the watcher
struct Shared {
    bundler: Bundler,
    clients: Mutex<Vec<WebSocket<TcpStream>>>,
    /// Serializes full rebuilds
    rebuild: Mutex<()>,
    /// Serializes broadcasts so each client sees messages in order
    sending: Mutex<()>,
    verbose: bool,
}

/// Watches the source tree and pushes changes to connected pages
pub struct ReloadServer {
    config: ReloadConfig,
    shared: Arc<Shared>,
}

impl ReloadServer {
    /// Create a server for a bundler
    pub fn new(bundler: Bundler, config: ReloadConfig) -> Self {
        let verbose = config.verbose;
        Self {
            config,
            shared: Arc::new(Shared {
                bundler,
                clients: Mutex::new(Vec::new()),
                rebuild: Mutex::new(()),
                sending: Mutex::new(()),
                verbose,
            }),
        }
    }

    /// `host:port` the server binds to
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Bind the configured address
    pub fn bind(&self) -> Result<TcpListener, ReloadError> {
        let addr = self.address();
        TcpListener::bind(&addr).map_err(|source| ReloadError::Bind { addr, source })
    }

    /// Bind, start watching and serve until the listener fails
    pub fn run(&self) -> Result<(), ReloadError> {
        let listener = self.bind()?;
        let root = self.shared.bundler.config().project_root();

        let (tx, rx) = mpsc::channel();
        let mut watcher = recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let shared = Arc::clone(&self.shared);
        thread::spawn(move || {
            let _watcher = watcher;
            watch_loop(&shared, rx);
        });

        info!(addr = %self.address(), root = %root.display(), "reload server listening");
        self.serve(listener);
        Ok(())
    }

    /// Accept clients from `listener` until it fails
    ///
    /// Each connection is handled on its own thread.
    pub fn serve(&self, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let shared = Arc::clone(&self.shared);
                    thread::spawn(move || shared.accept(stream));
                }
                Err(e) => warn!(error = %e, "failed to accept connection"),
            }
        }
    }

    /// Rebuild one changed file and broadcast it; returns the clients reached
    pub fn notify_change(&self, path: &Path) -> Result<usize, ReloadError> {
        self.shared.notify_change(path)
    }

    /// Send a message to every client; returns the clients reached
    pub fn broadcast(&self, message: &Message) -> Result<usize, ReloadError> {
        self.shared.broadcast(message)
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.shared.clients.lock().len()
    }
}

impl Shared {
    fn accept(&self, stream: TcpStream) {
        let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_default();
        let timeouts = stream
            .set_read_timeout(Some(HANDSHAKE_TIMEOUT))
            .and_then(|()| stream.set_write_timeout(Some(WRITE_TIMEOUT)));
        if let Err(e) = timeouts {
            warn!(peer = %peer, error = %e, "failed to configure connection");
            return;
        }

        let mut socket = match tungstenite::accept(stream) {
            Ok(socket) => socket,
            Err(e) => {
                warn!(peer = %peer, error = %e, "websocket handshake failed");
                return;
            }
        };

        let greeting = {
            let _rebuild = self.rebuild.lock();
            connect_message(&self.bundler).and_then(|m| Ok(m.to_json()?))
        };
        match greeting {
            Ok(text) => {
                if let Err(e) = socket.send(Frame::Text(text)) {
                    warn!(peer = %peer, error = %e, "client dropped during greeting");
                    return;
                }
            }
            Err(e) => error!(peer = %peer, error = %e, "bundle rebuild failed"),
        }

        info!(peer = %peer, "reload client connected");
        self.clients.lock().push(socket);
    }

    fn notify_change(&self, path: &Path) -> Result<usize, ReloadError> {
        match change_message(&self.bundler, path)? {
            Some(message) => self.broadcast(&message),
            None => Ok(0),
        }
    }

    /// Send without holding the client list, so connections keep registering
    fn broadcast(&self, message: &Message) -> Result<usize, ReloadError> {
        let text = message.to_json()?;
        let _turn = self.sending.lock();
        let recipients = std::mem::take(&mut *self.clients.lock());

        let mut alive = Vec::with_capacity(recipients.len());
        for mut socket in recipients {
            match socket.send(Frame::Text(text.clone())) {
                Ok(()) => alive.push(socket),
                Err(e) => debug!(error = %e, "dropping disconnected client"),
            }
        }
        let reached = alive.len();

        let mut clients = self.clients.lock();
        let arrived = std::mem::replace(&mut *clients, alive);
        clients.extend(arrived);

        if self.verbose {
            info!(kind = message.kind(), file = %message.file_path, clients = reached, "broadcast");
        }
        Ok(reached)
    }

    /// Whether a changed path should produce a message
    fn is_source(&self, path: &Path) -> bool {
        let config = self.bundler.config();
        path.is_file()
            && path != config.out_script
            && path != config.out_style
            && !path
                .components()
                .any(|c| matches!(c, Component::Normal(name) if name == NODE_MODULES || name == ".git"))
    }
}

fn watch_loop(shared: &Shared, events: mpsc::Receiver<notify::Result<Event>>) {
    for event in events {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "watch error");
                continue;
            }
        };
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            continue;
        }

        let mut seen: Vec<PathBuf> = Vec::new();
        for path in event.paths {
            if seen.contains(&path) || !shared.is_source(&path) {
                continue;
            }
            if let Err(e) = shared.notify_change(&path) {
                error!(file = %path.display(), error = %e, "failed to rebuild changed file");
            }
            seen.push(path);
        }
    }
}

/// Rebuild the whole bundle and describe it for a fresh client
pub fn connect_message(bundler: &Bundler) -> Result<Message, ReloadError> {
    let report = bundler.bundle()?;
    Ok(Message::new(
        report.script_path.to_string_lossy(),
        Command::RefreshBundle(RefreshContent {
            filenames: report.filenames(),
            version: report.version,
        }),
    ))
}

/// Message for one changed file, or `None` when it produces no artifact
pub fn change_message(bundler: &Bundler, path: &Path) -> Result<Option<Message>, ReloadError> {
    let file_path = path.to_string_lossy();
    match bundler.bundle_file(path) {
        Ok(FileArtifact::Style { css, js, .. }) => {
            Ok(Some(Message::new(file_path, Command::Style(StyleContent { css, js }))))
        }
        Ok(FileArtifact::Script { file, js }) => Ok(Some(Message::new(
            file_path,
            Command::Script(ScriptContent {
                js,
                module_name: file.full_module_name,
            }),
        ))),
        Err(BundleError::Unsupported(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::BundleConfig;
    use std::fs;
    use tempfile::TempDir;

    fn bundler(root: &Path) -> Bundler {
        fs::write(root.join("index.tsx"), "import './card';\n").unwrap();
        fs::write(root.join("card.tsx"), "export const card = 1;\n").unwrap();
        fs::write(root.join("theme.module.css"), ".primary { color: red; }\n").unwrap();
        fs::write(root.join("logo.svg"), "<svg/>").unwrap();
        let mut config = BundleConfig::for_entry(root.join("index.tsx"));
        config.package_name = Some("app".to_string());
        Bundler::new(config)
    }

    #[test]
    fn test_change_message_kinds() {
        let temp = TempDir::new().unwrap();
        let bundler = bundler(temp.path());

        let script = change_message(&bundler, &temp.path().join("card.tsx")).unwrap().unwrap();
        match script.command {
            Command::Script(content) => {
                assert_eq!(content.module_name, "app/card");
                assert!(content.js.starts_with("define(\"app/card\""));
            }
            other => panic!("expected SCRIPT, got {:?}", other),
        }

        let style = change_message(&bundler, &temp.path().join("theme.module.css")).unwrap().unwrap();
        match style.command {
            Command::Style(content) => {
                assert!(content.css.contains("_primary"));
                assert!(content.js.unwrap().starts_with("dS(\"app/theme.module.css\""));
            }
            other => panic!("expected STYLE, got {:?}", other),
        }

        assert!(change_message(&bundler, &temp.path().join("logo.svg")).unwrap().is_none());
    }

    #[test]
    fn test_connect_message_rebuilds_bundle() {
        let temp = TempDir::new().unwrap();
        let bundler = bundler(temp.path());

        let message = connect_message(&bundler).unwrap();
        match message.command {
            Command::RefreshBundle(content) => {
                assert_eq!(content.version.len(), 7);
                assert_eq!(content.filenames, vec!["quark.js", "quark.css"]);
            }
            other => panic!("expected REFRESH_BUNDLE, got {:?}", other),
        }
        assert!(temp.path().join("quark.js").is_file());
    }

    #[test]
    fn test_artifacts_are_not_sources() {
        let temp = TempDir::new().unwrap();
        let server = ReloadServer::new(bundler(temp.path()), ReloadConfig::default());
        connect_message(&server.shared.bundler).unwrap();

        assert!(server.shared.is_source(&temp.path().join("card.tsx")));
        assert!(!server.shared.is_source(&temp.path().join("quark.js")));
        assert!(!server.shared.is_source(&temp.path().join("missing.tsx")));
    }
}

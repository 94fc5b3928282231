// src/proxy/mode.rs

//! The proxy's three-state mode and its single writer.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// What a waiting request should do on its next poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyMode {
    /// Forward to the application.
    Serving,
    /// A build or restart is in progress; keep waiting.
    Paused,
    /// The last build or run failed; answer 500 with this text.
    Errored(Arc<str>),
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyMode::Serving => f.write_str("serving"),
            ProxyMode::Paused => f.write_str("paused"),
            ProxyMode::Errored(_) => f.write_str("errored"),
        }
    }
}

/// The only handle that can change the mode. Deliberately not `Clone`.
#[derive(Debug)]
pub struct ProxyControl {
    tx: watch::Sender<ProxyMode>,
}

/// Read side handed to request handlers.
pub type ModeReader = watch::Receiver<ProxyMode>;

impl ProxyControl {
    /// A new control in `Paused` mode and a reader for it.
    pub fn new() -> (Self, ModeReader) {
        let (tx, rx) = watch::channel(ProxyMode::Paused);
        (Self { tx }, rx)
    }

    pub fn serve(&self) {
        self.set(ProxyMode::Serving);
    }

    pub fn pause(&self) {
        self.set(ProxyMode::Paused);
    }

    pub fn error(&self, text: impl Into<Arc<str>>) {
        self.set(ProxyMode::Errored(text.into()));
    }

    /// Current mode snapshot.
    pub fn mode(&self) -> ProxyMode {
        self.tx.borrow().clone()
    }

    /// Another reader, for handlers created after startup.
    pub fn subscribe(&self) -> ModeReader {
        self.tx.subscribe()
    }

    fn set(&self, mode: ProxyMode) {
        debug!(%mode, "proxy mode");
        // send_replace never fails, even with no readers left.
        self.tx.send_replace(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_paused_and_readers_see_updates() {
        let (control, reader) = ProxyControl::new();
        assert_eq!(*reader.borrow(), ProxyMode::Paused);

        control.error("boom");
        assert_eq!(*reader.borrow(), ProxyMode::Errored(Arc::from("boom")));

        control.serve();
        assert_eq!(control.mode(), ProxyMode::Serving);
        assert_eq!(*control.subscribe().borrow(), ProxyMode::Serving);
    }
}

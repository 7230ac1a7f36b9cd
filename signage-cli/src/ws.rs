//! WebSocket transport for the "schedule" channel.
//!
//! tungstenite is blocking, so the socket lives on a blocking task. Frames to send
//! arrive on an unbounded queue; frames from the server go out on an events
//! channel. The socket polls with a short read timeout so queued frames are not
//! stuck behind a blocking read.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use signage_sync::{SyncError, Transport};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub enum WsEvent {
    Frame(String),
    Closed { reason: String },
}

pub struct WsChannel {
    outgoing: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<WsEvent>,
    open: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

impl WsChannel {
    pub async fn connect(url: &str) -> Result<Self> {
        let target = url.to_string();
        let (socket, _) = tokio::task::spawn_blocking(move || tungstenite::connect(target.as_str()))
            .await
            .context("websocket connect task")?
            .with_context(|| format!("connect {url}"))?;
        set_poll_timeout(&socket)?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&open);
        let worker = tokio::task::spawn_blocking(move || run_worker(socket, out_rx, ev_tx, flag));

        tracing::info!(url, "connected to schedule channel");
        Ok(Self {
            outgoing: out_tx,
            events: ev_rx,
            open,
            worker,
        })
    }

    /// Next frame from the server. `None` when nothing arrived within `wait`.
    pub async fn next_frame(&mut self, wait: Duration) -> Result<Option<String>> {
        match tokio::time::timeout(wait, self.events.recv()).await {
            Err(_) => Ok(None),
            Ok(None) => bail!("websocket worker stopped"),
            Ok(Some(WsEvent::Frame(frame))) => Ok(Some(frame)),
            Ok(Some(WsEvent::Closed { reason })) => bail!("websocket closed: {reason}"),
        }
    }

    /// Stop the worker and close the socket.
    pub async fn close(self) -> Result<()> {
        let WsChannel { outgoing, worker, .. } = self;
        drop(outgoing);
        worker.await.context("websocket worker")?;
        Ok(())
    }
}

impl Transport for WsChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send(&mut self, frame: String) -> Result<(), SyncError> {
        self.outgoing.send(frame).map_err(|_| SyncError::NotConnected)
    }
}

fn set_poll_timeout(socket: &Socket) -> Result<()> {
    let tcp = match socket.get_ref() {
        MaybeTlsStream::Plain(s) => s,
        MaybeTlsStream::Rustls(s) => s.get_ref(),
        _ => return Ok(()),
    };
    tcp.set_read_timeout(Some(POLL_INTERVAL))
        .context("set websocket read timeout")
}

fn run_worker(
    mut socket: Socket,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<WsEvent>,
    open: Arc<AtomicBool>,
) {
    let reason = 'session: loop {
        loop {
            match outgoing.try_recv() {
                Ok(frame) => {
                    if let Err(e) = socket.send(Message::text(frame)) {
                        break 'session format!("send: {e}");
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    break 'session "closed by client".to_string();
                }
            }
        }

        match socket.read() {
            Ok(Message::Text(text)) => {
                if events.send(WsEvent::Frame(text)).is_err() {
                    break 'session "event receiver dropped".to_string();
                }
            }
            Ok(Message::Close(frame)) => {
                break 'session frame
                    .map(|f| f.reason.to_string())
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "closed by server".to_string());
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => break 'session format!("read: {e}"),
        }
    };

    open.store(false, Ordering::SeqCst);
    tracing::debug!(%reason, "websocket worker stopped");
    let _ = events.send(WsEvent::Closed { reason });
}

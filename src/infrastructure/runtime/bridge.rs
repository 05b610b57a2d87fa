//! Runtime bridge - connects sync TUI thread with async Tokio runtime
//!
//! The TUI thread owns all session state. Network work runs on a worker
//! thread with its own Tokio runtime; the two sides only exchange
//! [`RuntimeCommand`]s and [`RuntimeEvent`]s over channels.

use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use tokio::runtime::Runtime;

use crate::domain::{ReadRequest, ReadResult};
use crate::infrastructure::ethereum::ProviderConfig;
use crate::infrastructure::runtime::worker::{run_async_worker, WorkerSettings};
use crate::infrastructure::wallet::ConnectorOption;

/// Commands sent from the TUI to the async worker
#[derive(Debug, Clone)]
pub enum RuntimeCommand {
    /// Switch to a different endpoint
    SwitchEndpoint { index: usize },
    /// Activate a wallet connector
    Connect { connector: ConnectorOption },
    /// Stop tracking the connected wallet
    Disconnect,
    /// Execute a read plan
    ReadBatch { id: u64, plan: Vec<ReadRequest> },
    /// Resolve ENS name and avatar for an account
    ResolveIdentity { address: String },
    /// Shutdown the worker
    Shutdown,
}

/// Events sent from the async worker to the TUI
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Successfully connected to a node
    EndpointReady {
        endpoint: String,
        node_kind: String,
        chain_id: Option<u64>,
    },
    /// A connector produced an account
    WalletConnected { connector: String, address: String },
    /// A connector could not produce an account
    WalletConnectFailed { connector: String, message: String },
    /// The connected account went away
    WalletDisconnected { reason: String },
    /// ENS lookup finished (fields are `None` when no record exists)
    IdentityResolved {
        address: String,
        name: Option<String>,
        avatar: Option<String>,
    },
    /// A read batch finished; one result per plan position
    BatchResolved { id: u64, results: Vec<ReadResult> },
    /// A read batch failed as a whole
    BatchFailed { id: u64, message: String },
    /// Error occurred
    Error { message: String },
    /// The worker is gone; nothing sent afterwards will be answered
    WorkerStopped { reason: String },
}

/// Bridge between sync TUI thread and async Tokio runtime
pub struct RuntimeBridge {
    cmd_tx: Sender<RuntimeCommand>,
    evt_rx: Receiver<RuntimeEvent>,
    stopped: Cell<bool>,
}

impl RuntimeBridge {
    /// Create a new runtime bridge with the given endpoint configurations
    pub fn new(endpoints: Vec<ProviderConfig>, settings: WorkerSettings) -> anyhow::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<RuntimeCommand>();
        let (evt_tx, evt_rx) = mpsc::channel::<RuntimeEvent>();
        let rt = Runtime::new()?;

        thread::Builder::new()
            .name("tokenboard-rpc".to_string())
            .spawn(move || {
                rt.block_on(async {
                    if let Err(err) = run_async_worker(endpoints, settings, cmd_rx, evt_tx.clone()).await {
                        tracing::error!(error = %format!("{err:#}"), "worker exited");
                        let _ = evt_tx.send(RuntimeEvent::Error {
                            message: format!("Worker exited: {:#}", err),
                        });
                    }
                });
            })?;

        Ok(Self {
            cmd_tx,
            evt_rx,
            stopped: Cell::new(false),
        })
    }

    /// Send a command to the async worker
    pub fn send(&self, cmd: RuntimeCommand) -> anyhow::Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| anyhow::anyhow!("Worker channel closed"))
    }

    /// Poll for events (non-blocking).
    ///
    /// Once the worker has exited, the first call after the queued events
    /// are drained yields a single [`RuntimeEvent::WorkerStopped`].
    pub fn poll_events(&self) -> Vec<RuntimeEvent> {
        let mut events = Vec::new();
        loop {
            match self.evt_rx.try_recv() {
                Ok(evt) => events.push(evt),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.stopped.replace(true) {
                        tracing::warn!("worker channel closed");
                        events.push(RuntimeEvent::WorkerStopped {
                            reason: "RPC worker stopped".to_string(),
                        });
                    }
                    break;
                }
            }
        }
        events
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.get()
    }
}

impl Drop for RuntimeBridge {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(RuntimeCommand::Shutdown);
    }
}

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::core::{Action, Command, NotifyLevel};
use crate::domain::{
    gate_open, plan, BatchSnapshot, CardValues, ConnectionGate, PollScheduler, ReadRequest,
    ReadResult, TokenAddress, ValidationError, Watchlist, DEFAULT_POLL_INTERVAL,
};
use crate::infrastructure::wallet::ConnectorOption;

pub const ERROR_BANNER: &str = "Error fetching contract data";

const STATUS_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing into the address input
    Address,
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

impl From<NotifyLevel> for StatusLevel {
    fn from(level: NotifyLevel) -> Self {
        match level {
            NotifyLevel::Info => StatusLevel::Info,
            NotifyLevel::Warn => StatusLevel::Warn,
            NotifyLevel::Error => StatusLevel::Error,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CommandBar {
    pub input: String,
    pub last: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
    pub since: Instant,
}

#[derive(Debug, Clone)]
pub struct RpcEndpointOption {
    pub label: String,
    pub display: String,
}

/// A batch handed to the worker and not yet answered
#[derive(Debug, Clone)]
pub struct ReadDispatch {
    pub id: u64,
    pub plan: Vec<ReadRequest>,
}

/// One rendered card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub index: usize,
    pub title: String,
    pub address: TokenAddress,
    pub values: CardValues,
}

#[derive(Debug)]
pub struct App {
    pub watchlist: Watchlist,
    pub gate: ConnectionGate,
    pub scheduler: PollScheduler,
    /// Plan derived from the current watchlist
    pub plan: Vec<ReadRequest>,
    /// Last successful batch
    pub snapshot: Option<BatchSnapshot>,
    pub is_error: bool,
    pub last_error: Option<String>,
    pub address_input: String,
    pub command: CommandBar,
    pub input_mode: InputMode,
    pub selected_card: usize,
    pub connectors: Vec<ConnectorOption>,
    pub selected_connector: usize,
    /// Connector currently being activated
    pub connecting: Option<String>,
    pub status: Option<StatusMessage>,
    /// Blocking alert; input is ignored until dismissed
    pub alert: Option<String>,
    pub help_open: bool,
    pub should_quit: bool,
    pub rpc_endpoint: String,
    pub rpc_endpoints: Vec<RpcEndpointOption>,
    pub rpc_endpoint_index: usize,
    pub node_kind: String,
    pub chain_id: Option<u64>,
    /// UI ticks since start, drives the spinner
    pub ticks: u64,
    in_flight: Option<ReadDispatch>,
    pending_read: Option<ReadDispatch>,
    pending_connect: Option<ConnectorOption>,
    pending_disconnect: bool,
    pending_identity: Option<String>,
    pending_endpoint_switch: Option<usize>,
    pending_copy: Option<String>,
}

impl Default for App {
    fn default() -> Self {
        Self::new(vec![ConnectorOption::node_accounts()], DEFAULT_POLL_INTERVAL)
    }
}

impl App {
    pub fn new(connectors: Vec<ConnectorOption>, poll_interval: Duration) -> Self {
        Self {
            watchlist: Watchlist::new(),
            gate: ConnectionGate::new(),
            scheduler: PollScheduler::new(poll_interval),
            plan: Vec::new(),
            snapshot: None,
            is_error: false,
            last_error: None,
            address_input: String::new(),
            command: CommandBar::default(),
            input_mode: InputMode::Normal,
            selected_card: 0,
            connectors,
            selected_connector: 0,
            connecting: None,
            status: None,
            alert: None,
            help_open: false,
            should_quit: false,
            rpc_endpoint: "localhost:8545".to_string(),
            rpc_endpoints: Vec::new(),
            rpc_endpoint_index: 0,
            node_kind: "unknown".to_string(),
            chain_id: None,
            ticks: 0,
            in_flight: None,
            pending_read: None,
            pending_connect: None,
            pending_disconnect: false,
            pending_identity: None,
            pending_endpoint_switch: None,
            pending_copy: None,
        }
    }

    pub fn set_status(&mut self, text: impl Into<String>, level: StatusLevel) {
        self.status = Some(StatusMessage {
            text: text.into(),
            level,
            since: Instant::now(),
        });
    }

    pub fn status_text(&self) -> Option<(&str, StatusLevel)> {
        self.status
            .as_ref()
            .map(|status| (status.text.as_str(), status.level))
    }

    pub fn is_connected(&self) -> bool {
        self.gate.is_connected()
    }

    /// First load for the current list: nothing to show yet and a batch is out
    pub fn is_loading(&self) -> bool {
        self.scheduler.is_in_flight()
            && !self.watchlist.is_empty()
            && !self
                .snapshot
                .as_ref()
                .is_some_and(|snapshot| snapshot.covers(&self.plan))
    }

    /// Background refresh of data already on screen
    pub fn is_refreshing(&self) -> bool {
        self.scheduler.is_in_flight() && !self.is_loading()
    }

    /// Time until the next scheduled poll while the gate is open
    pub fn next_poll_in(&self, now: Instant) -> Option<Duration> {
        if !gate_open(&self.watchlist, &self.gate) || self.scheduler.is_in_flight() {
            return None;
        }
        self.scheduler.due_in(now)
    }

    // ---- address list ----

    pub fn enter_address_input(&mut self) {
        self.input_mode = InputMode::Address;
    }

    pub fn exit_address_input(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    /// Add the contents of the address input.
    ///
    /// The input is cleared only when the address was accepted.
    pub fn submit_address(&mut self) -> bool {
        let input = self.address_input.clone();
        match self.add_address(&input) {
            Ok(_) => {
                self.address_input.clear();
                true
            }
            Err(_) => false,
        }
    }

    pub fn add_address(&mut self, input: &str) -> Result<TokenAddress, ValidationError> {
        match self.watchlist.add(input) {
            Ok(address) => {
                info!(%address, "watching contract");
                self.replan();
                self.selected_card = self.watchlist.len() - 1;
                self.set_status(format!("Added {}", address.short()), StatusLevel::Info);
                Ok(address)
            }
            Err(err) => {
                debug!(error = ?err, "address rejected");
                self.alert = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn remove_address(&mut self, address: &TokenAddress) -> bool {
        if !self.watchlist.remove(address) {
            return false;
        }
        info!(%address, "removed contract");
        self.replan();
        self.set_status(format!("Removed {}", address.short()), StatusLevel::Info);
        true
    }

    pub fn remove_at(&mut self, index: usize) -> Option<TokenAddress> {
        let address = self.watchlist.get(index)?.clone();
        self.remove_address(&address);
        Some(address)
    }

    pub fn remove_selected(&mut self) -> Option<TokenAddress> {
        self.remove_at(self.selected_card)
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    fn replan(&mut self) {
        self.plan = plan(self.watchlist.list());
        self.scheduler.invalidate();
        self.clamp_selection();
    }

    // ---- cards ----

    pub fn card_values(&self, index: usize) -> CardValues {
        match self.watchlist.get(index) {
            Some(address) => CardValues::from_snapshot(self.snapshot.as_ref(), address),
            None => CardValues::ABSENT,
        }
    }

    pub fn cards(&self) -> Vec<Card> {
        self.watchlist
            .list()
            .iter()
            .enumerate()
            .map(|(index, address)| Card {
                index,
                title: format!("Contract {}", index + 1),
                address: address.clone(),
                values: CardValues::from_snapshot(self.snapshot.as_ref(), address),
            })
            .collect()
    }

    pub fn selected_address(&self) -> Option<&TokenAddress> {
        self.watchlist.get(self.selected_card)
    }

    pub fn move_selection_up(&mut self) {
        if self.selected_card > 0 {
            self.selected_card -= 1;
        }
    }

    pub fn move_selection_down(&mut self) {
        if self.selected_card + 1 < self.watchlist.len() {
            self.selected_card += 1;
        }
    }

    /// Move by `step` cards, e.g. one grid row
    pub fn move_selection_by(&mut self, step: isize) {
        let len = self.watchlist.len();
        if len == 0 {
            return;
        }
        let next = self.selected_card as isize + step;
        self.selected_card = next.clamp(0, len as isize - 1) as usize;
    }

    fn clamp_selection(&mut self) {
        self.selected_card = self
            .selected_card
            .min(self.watchlist.len().saturating_sub(1));
    }

    pub fn copy_selected(&mut self) {
        match self.selected_address().cloned() {
            Some(address) => self.apply_action(Action::Copy(address.to_string())),
            None => self.set_status("No contract selected", StatusLevel::Warn),
        }
    }

    // ---- wallet ----

    pub fn move_connector_up(&mut self) {
        if self.selected_connector > 0 {
            self.selected_connector -= 1;
        }
    }

    pub fn move_connector_down(&mut self) {
        if self.selected_connector + 1 < self.connectors.len() {
            self.selected_connector += 1;
        }
    }

    pub fn activate_selected_connector(&mut self) {
        self.activate_connector(self.selected_connector);
    }

    /// Ask the connector at `index` for an account
    pub fn activate_connector(&mut self, index: usize) {
        if self.gate.is_connected() {
            self.set_status("Already connected; disconnect first", StatusLevel::Warn);
            return;
        }
        if let Some(name) = &self.connecting {
            self.set_status(format!("Still connecting via {name}"), StatusLevel::Warn);
            return;
        }
        let Some(connector) = self.connectors.get(index).cloned() else {
            self.set_status(format!("No connector {}", index + 1), StatusLevel::Warn);
            return;
        };
        self.selected_connector = index;
        self.set_status(format!("Connecting via {}…", connector.name), StatusLevel::Info);
        self.connecting = Some(connector.name.clone());
        self.pending_connect = Some(connector);
    }

    pub fn disconnect(&mut self) {
        if self.gate.disconnect() {
            info!("wallet disconnected by user");
            self.pending_disconnect = true;
            self.set_status("Disconnected", StatusLevel::Info);
        } else {
            self.set_status("Not connected", StatusLevel::Warn);
        }
    }

    // ---- polling ----

    /// Force a poll on the next tick
    pub fn refresh(&mut self) {
        if !gate_open(&self.watchlist, &self.gate) {
            self.set_status("Nothing to refresh", StatusLevel::Warn);
            return;
        }
        self.scheduler.invalidate();
        self.set_status("Refreshing contract data…", StatusLevel::Info);
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.ticks = self.ticks.wrapping_add(1);
        if let Some(status) = self.status.as_ref() {
            if now.saturating_duration_since(status.since) > STATUS_TTL {
                self.status = None;
            }
        }

        let open = gate_open(&self.watchlist, &self.gate);
        if let Some(ticket) = self.scheduler.next_dispatch(now, open) {
            debug!(id = ticket.id, reads = self.plan.len(), "dispatching read batch");
            let dispatch = ReadDispatch {
                id: ticket.id,
                plan: self.plan.clone(),
            };
            self.in_flight = Some(dispatch.clone());
            self.pending_read = Some(dispatch);
        }
    }

    // ---- inbound events ----

    pub fn apply_batch_resolved(&mut self, id: u64, results: Vec<ReadResult>) -> bool {
        if !self.scheduler.resolve(id) {
            debug!(id, "dropping stale batch result");
            return false;
        }
        let Some(dispatch) = self.in_flight.take() else {
            return false;
        };
        self.snapshot = Some(BatchSnapshot::new(dispatch.plan, results));
        self.is_error = false;
        self.last_error = None;
        true
    }

    pub fn apply_batch_failed(&mut self, id: u64, message: String) -> bool {
        if !self.scheduler.resolve(id) {
            debug!(id, "dropping stale batch failure");
            return false;
        }
        self.in_flight = None;
        self.is_error = true;
        self.last_error = Some(message);
        true
    }

    pub fn apply_wallet_connected(&mut self, connector: String, address: String) {
        info!(%connector, %address, "wallet connected");
        self.connecting = None;
        self.gate.on_connected(connector.clone(), address.clone());
        self.scheduler.invalidate();
        self.set_status(format!("Connected via {connector}"), StatusLevel::Info);
        self.pending_identity = Some(address);
    }

    pub fn apply_wallet_connect_failed(&mut self, connector: String, message: String) {
        self.connecting = None;
        self.set_status(format!("{connector}: {message}"), StatusLevel::Error);
    }

    pub fn apply_wallet_disconnected(&mut self, reason: String) {
        if !self.gate.is_connected() {
            return;
        }
        self.gate.on_disconnected();
        self.set_status(format!("Disconnected: {reason}"), StatusLevel::Warn);
    }

    pub fn apply_identity(&mut self, address: String, name: Option<String>, avatar: Option<String>) {
        if !self.gate.apply_identity(&address, name, avatar) {
            debug!(%address, "identity for a stale account ignored");
        }
    }

    pub fn apply_endpoint_ready(&mut self, endpoint: String, node_kind: String, chain_id: Option<u64>) {
        self.rpc_endpoint = endpoint;
        if let Some(index) = self
            .rpc_endpoints
            .iter()
            .position(|candidate| candidate.display.eq_ignore_ascii_case(&self.rpc_endpoint))
        {
            self.rpc_endpoint_index = index;
        }
        self.node_kind = node_kind;
        self.chain_id = chain_id;
        self.scheduler.invalidate();
        self.set_status(format!("Connected to {}", self.rpc_endpoint), StatusLevel::Info);
    }

    pub fn apply_rpc_error(&mut self, message: String) {
        self.set_status(message, StatusLevel::Error);
    }

    /// The worker exited. Fails the batch it was holding so the error banner
    /// shows instead of a loading state that never ends.
    pub fn apply_worker_stopped(&mut self, reason: String) {
        warn!(%reason, "runtime worker stopped");
        if let Some(id) = self.in_flight.as_ref().map(|dispatch| dispatch.id) {
            self.apply_batch_failed(id, reason.clone());
        }
        self.connecting = None;
        self.set_status(reason, StatusLevel::Error);
    }

    pub fn cycle_rpc_endpoint(&mut self, forward: bool) {
        if self.rpc_endpoints.is_empty() {
            self.set_status("No RPC endpoints configured", StatusLevel::Warn);
            return;
        }
        let len = self.rpc_endpoints.len();
        let next = if forward {
            (self.rpc_endpoint_index + 1) % len
        } else {
            (self.rpc_endpoint_index + len - 1) % len
        };
        self.switch_endpoint(next);
    }

    fn switch_endpoint(&mut self, index: usize) {
        let Some(endpoint) = self.rpc_endpoints.get(index) else {
            self.set_status(format!("No endpoint {}", index + 1), StatusLevel::Warn);
            return;
        };
        let label = endpoint.label.clone();
        self.rpc_endpoint_index = index;
        self.pending_endpoint_switch = Some(index);
        self.set_status(format!("Switching RPC endpoint: {label}"), StatusLevel::Info);
    }

    // ---- command bar ----

    pub fn enter_command(&mut self) {
        self.input_mode = InputMode::Command;
        self.command.input.clear();
    }

    pub fn exit_command(&mut self) {
        self.input_mode = InputMode::Normal;
        self.command.input.clear();
    }

    pub fn apply_command(&mut self) {
        let input = self.command.input.trim().to_string();
        if input.is_empty() {
            self.exit_command();
            return;
        }
        let cmd = crate::core::parse_command(&input);
        self.exit_command();
        self.command.last = Some(input);
        let action = self.execute_command(&cmd);
        self.apply_action(action);
    }

    /// Execute a parsed command
    pub fn execute_command(&mut self, cmd: &Command) -> Action {
        match cmd {
            Command::Add(input) => {
                let _ = self.add_address(input);
                Action::None
            }
            Command::Remove(target) => {
                let removed = match target.parse::<usize>() {
                    Ok(n) if n > 0 => self.remove_at(n - 1).is_some(),
                    _ => match target.parse::<TokenAddress>() {
                        Ok(address) => self.remove_address(&address),
                        Err(_) => false,
                    },
                };
                if removed {
                    Action::None
                } else {
                    Action::Notify(format!("Not watching {target}"), NotifyLevel::Warn)
                }
            }
            Command::Copy(n) => {
                let index = n.map(|n| n.saturating_sub(1)).unwrap_or(self.selected_card);
                match self.watchlist.get(index) {
                    Some(address) => Action::Copy(address.to_string()),
                    None => Action::Notify("No contract selected".to_string(), NotifyLevel::Warn),
                }
            }
            Command::Connect(n) => {
                let index = n.map(|n| n.saturating_sub(1)).unwrap_or(self.selected_connector);
                self.activate_connector(index);
                Action::None
            }
            Command::Disconnect => {
                self.disconnect();
                Action::None
            }
            Command::Endpoint(Some(n)) => {
                self.switch_endpoint(n.saturating_sub(1));
                Action::None
            }
            Command::Endpoint(None) => {
                self.cycle_rpc_endpoint(true);
                Action::None
            }
            Command::Refresh => {
                self.refresh();
                Action::None
            }
            Command::Help => Action::OpenHelp,
            Command::Quit => Action::Quit,
            Command::Unknown(s) => Action::Notify(format!("Unknown command: {}", s), NotifyLevel::Warn),
        }
    }

    /// Apply an action returned by a command
    pub fn apply_action(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::Copy(text) => {
                self.set_status(format!("Copied {text}"), StatusLevel::Info);
                self.pending_copy = Some(text);
            }
            Action::Notify(msg, level) => self.set_status(msg, level.into()),
            Action::OpenHelp => self.help_open = true,
            Action::Quit => self.should_quit = true,
        }
    }

    // ---- outbound requests ----

    pub fn take_read_request(&mut self) -> Option<ReadDispatch> {
        self.pending_read.take()
    }

    pub fn take_connect_request(&mut self) -> Option<ConnectorOption> {
        self.pending_connect.take()
    }

    pub fn take_disconnect_request(&mut self) -> bool {
        std::mem::take(&mut self.pending_disconnect)
    }

    pub fn take_identity_request(&mut self) -> Option<String> {
        self.pending_identity.take()
    }

    pub fn take_endpoint_switch_request(&mut self) -> Option<usize> {
        self.pending_endpoint_switch.take()
    }

    pub fn take_copy_request(&mut self) -> Option<String> {
        self.pending_copy.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(fill: char) -> String {
        format!("0x{}", fill.to_string().repeat(40))
    }

    #[test]
    fn test_command_remove_by_number() {
        let mut app = App::default();
        app.add_address(&addr('a')).unwrap();
        app.add_address(&addr('b')).unwrap();

        let action = app.execute_command(&Command::Remove("1".to_string()));
        assert_eq!(action, Action::None);
        assert_eq!(app.watchlist.list()[0].as_str(), addr('b'));

        let action = app.execute_command(&Command::Remove("7".to_string()));
        assert!(matches!(action, Action::Notify(_, NotifyLevel::Warn)));
    }

    #[test]
    fn test_copy_queues_clipboard_text() {
        let mut app = App::default();
        app.add_address(&addr('c')).unwrap();
        app.copy_selected();
        assert_eq!(app.take_copy_request(), Some(addr('c')));
        assert_eq!(app.take_copy_request(), None);
    }

    #[test]
    fn test_status_expires() {
        let mut app = App::default();
        app.set_status("hello", StatusLevel::Info);
        let since = app.status.as_ref().unwrap().since;
        app.on_tick(since + Duration::from_secs(1));
        assert!(app.status_text().is_some());
        app.on_tick(since + Duration::from_secs(4));
        assert!(app.status_text().is_none());
    }

    #[test]
    fn test_selection_follows_list() {
        let mut app = App::default();
        for fill in ['a', 'b', 'c'] {
            app.add_address(&addr(fill)).unwrap();
        }
        assert_eq!(app.selected_card, 2);
        app.remove_selected();
        assert_eq!(app.selected_card, 1);
        app.move_selection_by(-5);
        assert_eq!(app.selected_card, 0);
    }
}

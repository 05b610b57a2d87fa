use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tokenboard::app::{App, InputMode, RpcEndpointOption, StatusLevel};
use tokenboard::config;
use tokenboard::infrastructure::ethereum::{BatchReader, BatchStrategy, ProviderConfig};
use tokenboard::infrastructure::runtime::{
    RuntimeBridge, RuntimeCommand, RuntimeEvent, WorkerSettings,
};
use tokenboard::infrastructure::wallet::connector_options;
use tokenboard::ui;

#[derive(Debug, Parser)]
#[command(
    name = "tokenboard",
    version,
    about = "tokenboard: watch ERC-20 balances and supply from the terminal"
)]
struct Args {
    /// HTTP JSON-RPC endpoint (e.g. http://localhost:8545)
    #[arg(long)]
    rpc: Option<String>,

    /// WebSocket endpoint (e.g. ws://localhost:8546)
    #[arg(long)]
    ws: Option<String>,

    /// IPC path (e.g. ~/.ethereum/geth.ipc). Unix only.
    #[arg(long)]
    ipc: Option<PathBuf>,

    /// Watch-only account offered as a connector (repeatable)
    #[arg(long = "account")]
    accounts: Vec<String>,

    /// Poll interval in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Send one eth_call per read instead of a Multicall3 batch
    #[arg(long)]
    no_multicall: bool,

    /// Log file (default: state dir)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load()?;

    let log_path = args
        .log_file
        .clone()
        .or_else(|| config.log_file.as_deref().and_then(expand_path))
        .or_else(config::default_log_path);
    let log_path = init_logging(log_path);

    let (rpc_endpoints, rpc_endpoint_options) = endpoints_from_args_and_config(&args, &config)?;
    let initial_endpoint_display = rpc_endpoints
        .first()
        .map(|endpoint| endpoint.display())
        .unwrap_or_else(|| "localhost:8545".to_string());

    let strategy = if args.no_multicall {
        BatchStrategy::Individual
    } else {
        config.batch
    };
    let poll_interval = match args.interval {
        Some(secs) if secs > 0 => Duration::from_secs(secs),
        _ => config.poll_interval(),
    };
    let settings = WorkerSettings {
        reader: BatchReader::new(strategy, config.multicall()?, config.request_timeout()),
        resolve_ens: config.resolve_ens,
        health_interval: Duration::from_secs(5),
    };

    let watch_accounts = args
        .accounts
        .iter()
        .map(|address| (address.as_str(), None))
        .chain(
            config
                .watch_accounts
                .iter()
                .map(|account| (account.address.as_str(), account.label.clone())),
        );
    let connectors = connector_options(watch_accounts);

    info!(
        endpoints = rpc_endpoints.len(),
        connectors = connectors.len(),
        ?strategy,
        interval_secs = poll_interval.as_secs(),
        "starting tokenboard"
    );

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create the runtime bridge
    let runtime = RuntimeBridge::new(rpc_endpoints, settings)?;

    let mut app = App::new(connectors, poll_interval);
    app.rpc_endpoint = initial_endpoint_display;
    app.rpc_endpoints = rpc_endpoint_options;
    app.rpc_endpoint_index = 0;
    app.node_kind = "connecting".to_string();
    match log_path {
        Some(path) => app.set_status(format!("Logging to {}", path.display()), StatusLevel::Info),
        None => app.set_status("Logging disabled", StatusLevel::Warn),
    }

    let res = run_app(&mut terminal, app, runtime);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{err:?}");
    }

    Ok(())
}

/// Route tracing output to a file; the terminal belongs to the UI.
fn init_logging(path: Option<PathBuf>) -> Option<PathBuf> {
    let path = path?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok()?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .ok()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .ok()?;
    Some(path)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    runtime: RuntimeBridge,
) -> Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        pump_background(&mut app, &runtime);
        terminal.draw(|f| ui::draw(f, &app))?;
        if app.should_quit {
            info!("quitting");
            let _ = runtime.send(RuntimeCommand::Shutdown);
            return Ok(());
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => handle_key(&mut app, key),
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick(Instant::now());
            last_tick = Instant::now();
        }

        pump_background(&mut app, &runtime);
    }
}

fn pump_background(app: &mut App, runtime: &RuntimeBridge) {
    // Process runtime events
    for event in runtime.poll_events() {
        match event {
            RuntimeEvent::EndpointReady {
                endpoint,
                node_kind,
                chain_id,
            } => app.apply_endpoint_ready(endpoint, node_kind, chain_id),
            RuntimeEvent::WalletConnected { connector, address } => {
                app.apply_wallet_connected(connector, address)
            }
            RuntimeEvent::WalletConnectFailed { connector, message } => {
                app.apply_wallet_connect_failed(connector, message)
            }
            RuntimeEvent::WalletDisconnected { reason } => app.apply_wallet_disconnected(reason),
            RuntimeEvent::IdentityResolved {
                address,
                name,
                avatar,
            } => app.apply_identity(address, name, avatar),
            RuntimeEvent::BatchResolved { id, results } => {
                app.apply_batch_resolved(id, results);
            }
            RuntimeEvent::BatchFailed { id, message } => {
                app.apply_batch_failed(id, message);
            }
            RuntimeEvent::Error { message } => app.apply_rpc_error(message),
            RuntimeEvent::WorkerStopped { reason } => app.apply_worker_stopped(reason),
        }
    }

    // Forward pending requests to the worker
    if let Some(index) = app.take_endpoint_switch_request() {
        let _ = runtime.send(RuntimeCommand::SwitchEndpoint { index });
    }
    if let Some(connector) = app.take_connect_request() {
        if let Err(err) = runtime.send(RuntimeCommand::Connect {
            connector: connector.clone(),
        }) {
            app.apply_wallet_connect_failed(connector.name, err.to_string());
        }
    }
    if app.take_disconnect_request() {
        let _ = runtime.send(RuntimeCommand::Disconnect);
    }
    if let Some(address) = app.take_identity_request() {
        let _ = runtime.send(RuntimeCommand::ResolveIdentity { address });
    }
    if let Some(dispatch) = app.take_read_request() {
        let id = dispatch.id;
        if let Err(err) = runtime.send(RuntimeCommand::ReadBatch {
            id,
            plan: dispatch.plan,
        }) {
            warn!(id, error = %err, "read batch not sent");
            app.apply_batch_failed(id, err.to_string());
        }
    }
    if let Some(text) = app.take_copy_request() {
        copy_to_clipboard(app, &text);
    }
}

fn endpoints_from_args_and_config(
    args: &Args,
    config: &config::Config,
) -> Result<(Vec<ProviderConfig>, Vec<RpcEndpointOption>)> {
    use std::collections::BTreeSet;

    fn push_endpoint(
        endpoints: &mut Vec<ProviderConfig>,
        options: &mut Vec<RpcEndpointOption>,
        seen: &mut BTreeSet<String>,
        endpoint: ProviderConfig,
        name: Option<String>,
    ) {
        let display = endpoint.display();
        let key = display.to_lowercase();
        if !seen.insert(key) {
            return;
        }
        let label = name
            .filter(|value| !value.trim().is_empty())
            .map(|name| format!("{name} ({display})"))
            .unwrap_or_else(|| display.clone());
        options.push(RpcEndpointOption { label, display });
        endpoints.push(endpoint);
    }

    let mut endpoints = Vec::new();
    let mut options = Vec::new();
    let mut seen = BTreeSet::<String>::new();

    // CLI arguments take precedence
    if let Some(ipc) = args.ipc.clone() {
        #[cfg(unix)]
        {
            push_endpoint(
                &mut endpoints,
                &mut options,
                &mut seen,
                ProviderConfig::Ipc(ipc),
                Some("cli".to_string()),
            );
        }
        #[cfg(not(unix))]
        {
            let _ = ipc;
            return Err(anyhow::anyhow!("IPC is not supported on this platform"));
        }
    } else if let Some(ws) = args.ws.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        push_endpoint(
            &mut endpoints,
            &mut options,
            &mut seen,
            ProviderConfig::WebSocket(ws.to_string()),
            Some("cli".to_string()),
        );
    } else if let Some(rpc) = args.rpc.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        push_endpoint(
            &mut endpoints,
            &mut options,
            &mut seen,
            ProviderConfig::Http(normalize_http_endpoint(rpc)),
            Some("cli".to_string()),
        );
    }

    // Config file endpoints
    for (idx, entry) in config.endpoints.iter().enumerate() {
        let name = entry.name.clone().filter(|value| !value.trim().is_empty());
        if let Some(rpc) = entry.rpc.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            push_endpoint(
                &mut endpoints,
                &mut options,
                &mut seen,
                ProviderConfig::Http(normalize_http_endpoint(rpc)),
                name,
            );
            continue;
        }
        if let Some(ws) = entry.ws.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            push_endpoint(
                &mut endpoints,
                &mut options,
                &mut seen,
                ProviderConfig::WebSocket(ws.to_string()),
                name,
            );
            continue;
        }
        if let Some(ipc) = entry.ipc.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            #[cfg(unix)]
            {
                let Some(ipc_path) = expand_path(ipc) else {
                    continue;
                };
                push_endpoint(
                    &mut endpoints,
                    &mut options,
                    &mut seen,
                    ProviderConfig::Ipc(ipc_path),
                    name.or_else(|| Some(format!("ipc-{idx}"))),
                );
            }
            #[cfg(not(unix))]
            {
                let _ = (idx, ipc);
                warn!("skipping IPC endpoint: not supported on this platform");
            }
        }
    }

    // Default fallback
    if endpoints.is_empty() {
        push_endpoint(
            &mut endpoints,
            &mut options,
            &mut seen,
            ProviderConfig::Http(normalize_http_endpoint("localhost:8545")),
            Some("local".to_string()),
        );
    }

    Ok((endpoints, options))
}

fn normalize_http_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

fn expand_path(path: &str) -> Option<PathBuf> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            return Some(home.join(rest));
        }
    }

    let mut buf = PathBuf::from(trimmed);
    if buf.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            buf = cwd.join(buf);
        }
    }
    Some(buf)
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    // The alert blocks everything until dismissed
    if app.alert.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            app.dismiss_alert();
        }
        return;
    }

    if app.help_open {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
            app.help_open = false;
        }
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Address => handle_address_mode(app, key),
        InputMode::Command => handle_command_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true
        }
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => app.help_open = true,
        KeyCode::Char(':') => app.enter_command(),
        KeyCode::Char('[') => app.cycle_rpc_endpoint(false),
        KeyCode::Char(']') => app.cycle_rpc_endpoint(true),
        _ if app.is_connected() => handle_dashboard_key(app, key),
        _ => handle_connect_key(app, key),
    }
}

fn handle_connect_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.move_connector_down(),
        KeyCode::Char('k') | KeyCode::Up => app.move_connector_up(),
        KeyCode::Enter => app.activate_selected_connector(),
        KeyCode::Char(ch @ '1'..='9') => {
            if let Some(n) = ch.to_digit(10) {
                app.activate_connector(n as usize - 1);
            }
        }
        _ => {}
    }
}

fn handle_dashboard_key(app: &mut App, key: KeyEvent) {
    let columns = terminal_rect()
        .map(|size| ui::layout::columns_for(size.width))
        .unwrap_or(1) as isize;
    match key.code {
        KeyCode::Char('i') | KeyCode::Char('a') | KeyCode::Enter => app.enter_address_input(),
        KeyCode::Char('h') | KeyCode::Left => app.move_selection_up(),
        KeyCode::Char('l') | KeyCode::Right => app.move_selection_down(),
        KeyCode::Char('k') | KeyCode::Up => app.move_selection_by(-columns),
        KeyCode::Char('j') | KeyCode::Down => app.move_selection_by(columns),
        KeyCode::Char('d') | KeyCode::Delete => {
            if app.remove_selected().is_none() {
                app.set_status("No contract selected", StatusLevel::Warn);
            }
        }
        KeyCode::Char('y') => app.copy_selected(),
        KeyCode::Char('r') => app.refresh(),
        KeyCode::Char('x') => app.disconnect(),
        _ => {}
    }
}

fn handle_address_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.exit_address_input(),
        KeyCode::Enter => {
            app.submit_address();
        }
        KeyCode::Backspace => {
            app.address_input.pop();
        }
        KeyCode::Char(ch) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                return;
            }
            app.address_input.push(ch);
        }
        _ => {}
    }
}

fn handle_command_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.exit_command(),
        KeyCode::Enter => app.apply_command(),
        KeyCode::Backspace => {
            app.command.input.pop();
        }
        KeyCode::Char(ch) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                return;
            }
            app.command.input.push(ch);
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.help_open || app.alert.is_some() || !app.is_connected() {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollUp => app.move_selection_up(),
        MouseEventKind::ScrollDown => app.move_selection_down(),
        MouseEventKind::Down(MouseButton::Left) => {
            let Some(size) = terminal_rect() else {
                return;
            };
            let areas = ui::layout::areas(size);
            let cells = ui::layout::card_grid(areas.main, app.watchlist.len(), app.selected_card);
            if let Some((index, _)) = cells
                .into_iter()
                .find(|(_, rect)| rect_contains(*rect, mouse.column, mouse.row))
            {
                app.selected_card = index;
            }
        }
        _ => {}
    }
}

fn terminal_rect() -> Option<Rect> {
    crossterm::terminal::size()
        .ok()
        .map(|(width, height)| Rect::new(0, 0, width, height))
}

fn rect_contains(rect: Rect, col: u16, row: u16) -> bool {
    col >= rect.x
        && col < rect.x.saturating_add(rect.width)
        && row >= rect.y
        && row < rect.y.saturating_add(rect.height)
}

fn copy_to_clipboard(app: &mut App, text: &str) {
    let result = arboard::Clipboard::new()
        .and_then(|mut clipboard| clipboard.set_text(text.to_string()))
        .context("Clipboard not available");
    if let Err(err) = result {
        warn!(error = %format!("{err:#}"), "copy failed");
        app.set_status(format!("{err:#}"), StatusLevel::Error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["tokenboard"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_default_endpoint() {
        let (endpoints, options) =
            endpoints_from_args_and_config(&args(&[]), &config::Config::default()).unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(options[0].label, "local (http://localhost:8545)");
    }

    #[test]
    fn test_cli_endpoint_precedes_config() {
        let config = config::Config::parse(
            r#"
            [[endpoints]]
            name = "remote"
            rpc = "https://rpc.example.org"

            [[endpoints]]
            rpc = "127.0.0.1:8545"
            "#,
        )
        .unwrap();
        let (endpoints, options) =
            endpoints_from_args_and_config(&args(&["--rpc", "127.0.0.1:8545"]), &config).unwrap();

        assert_eq!(endpoints.len(), 2);
        assert_eq!(options[0].display, "http://127.0.0.1:8545");
        assert_eq!(options[1].label, "remote (https://rpc.example.org)");
    }

    #[test]
    fn test_repeatable_account_flag() {
        let parsed = args(&["--account", "0xa", "--account", "0xb", "--no-multicall"]);
        assert_eq!(parsed.accounts, vec!["0xa".to_string(), "0xb".to_string()]);
        assert!(parsed.no_multicall);
    }

    #[test]
    fn test_normalize_http_endpoint() {
        assert_eq!(normalize_http_endpoint("localhost:8545"), "http://localhost:8545");
        assert_eq!(normalize_http_endpoint(" https://x.io "), "https://x.io");
    }
}

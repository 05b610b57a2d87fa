use std::time::Instant;

use chrono::Local;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

pub mod layout;

use crate::app::{App, Card, InputMode, StatusLevel, ERROR_BANNER};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub fn draw(f: &mut Frame, app: &App) {
    let areas = layout::areas(f.size());

    draw_header(f, areas.header, app);
    if app.is_connected() {
        draw_account(f, areas.account, app);
        draw_address_input(f, areas.input, app);
        draw_banner(f, areas.banner, app);
        draw_cards(f, areas.main, app);
    } else {
        let connect_area = Rect {
            y: areas.account.y,
            height: areas.status_line.y.saturating_sub(areas.account.y),
            ..areas.account
        };
        draw_connectors(f, connect_area, app);
    }
    draw_status_line(f, areas.status_line, app);
    draw_command_line(f, areas.command_line, app);

    if app.help_open {
        draw_help_popup(f, areas.size);
    }
    if let Some(message) = app.alert.as_deref() {
        draw_alert(f, areas.size, message);
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let chain = app
        .chain_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "--".to_string());
    let title = Line::from(vec![
        Span::styled(
            "Connector ETH",
            Style::default()
                .fg(Color::LightCyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled("RPC", Style::default().fg(Color::DarkGray)),
        Span::raw(format!(" {} ", app.rpc_endpoint)),
        Span::styled("Node", Style::default().fg(Color::DarkGray)),
        Span::raw(format!(" {} ", app.node_kind)),
        Span::styled("Chain", Style::default().fg(Color::DarkGray)),
        Span::raw(format!(" {}", chain)),
    ]);

    let paragraph = Paragraph::new(title)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Left);
    f.render_widget(paragraph, area);
}

fn draw_connectors(f: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .connectors
        .iter()
        .enumerate()
        .map(|(idx, connector)| {
            let busy = app.connecting.as_deref() == Some(connector.name.as_str());
            let mut spans = vec![
                Span::styled(format!("{:>2}. ", idx + 1), Style::default().fg(Color::DarkGray)),
                Span::raw(connector.name.clone()),
            ];
            if busy {
                spans.push(Span::styled(
                    format!("  connecting {}", spinner(app)),
                    Style::default().fg(Color::LightYellow),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title("Connect a wallet (Enter)")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::LightCyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !app.connectors.is_empty() {
        state.select(Some(app.selected_connector));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_account(f: &mut Frame, area: Rect, app: &App) {
    let Some(identity) = app.gate.identity() else {
        return;
    };
    let mut spans = vec![
        Span::styled("Account ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            identity.label(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
    ];
    if let Some(avatar) = identity.avatar.as_deref() {
        spans.push(Span::styled("  Avatar ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::raw(truncate_str(avatar, 48)));
    }
    if let Some(connector) = app.gate.connector() {
        spans.push(Span::styled("  via ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::raw(connector.to_string()));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .title("Wallet (x: disconnect)")
            .borders(Borders::ALL),
    );
    f.render_widget(paragraph, area);
}

fn draw_address_input(f: &mut Frame, area: Rect, app: &App) {
    let editing = app.input_mode == InputMode::Address;
    let content = if app.address_input.is_empty() && !editing {
        Line::from(Span::styled(
            "Enter contract address (0x...)",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut spans = vec![Span::raw(app.address_input.clone())];
        if editing {
            spans.push(Span::styled("_", Style::default().fg(Color::LightCyan)));
        }
        Line::from(spans)
    };
    let border = if editing {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let paragraph = Paragraph::new(content).block(
        Block::default()
            .title("Add Contract (i: edit, Enter: add)")
            .borders(Borders::ALL)
            .border_style(border),
    );
    f.render_widget(paragraph, area);
}

fn draw_banner(f: &mut Frame, area: Rect, app: &App) {
    let line = if app.is_error {
        Line::from(Span::styled(
            ERROR_BANNER,
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        ))
    } else if app.is_loading() {
        Line::from(Span::styled(
            format!("{} Loading contract data...", spinner(app)),
            Style::default().fg(Color::LightCyan),
        ))
    } else {
        Line::default()
    };
    f.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

fn draw_cards(f: &mut Frame, area: Rect, app: &App) {
    let cards = app.cards();
    if cards.is_empty() {
        let hint = Paragraph::new("No contracts yet. Press i to add one.")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        f.render_widget(hint, area);
        return;
    }
    for (index, rect) in layout::card_grid(area, cards.len(), app.selected_card) {
        if let Some(card) = cards.get(index) {
            draw_card(f, rect, card, index == app.selected_card);
        }
    }
}

fn draw_card(f: &mut Frame, area: Rect, card: &Card, selected: bool) {
    let border = if selected {
        Style::default().fg(Color::LightCyan)
    } else {
        Style::default().fg(Color::Blue)
    };
    let title = if selected {
        format!("{} (d: delete)", card.title)
    } else {
        card.title.clone()
    };
    let lines = vec![
        Line::from(Span::styled(
            card.address.to_string(),
            Style::default().fg(Color::Gray),
        )),
        Line::default(),
        value_line("Balance:", &card.values.balance.display()),
        value_line("Total Supply:", &card.values.total_supply.display()),
    ];
    let paragraph = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(border),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn value_line(label: &'static str, value: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<14}"), Style::default().fg(Color::DarkGray)),
        Span::styled(
            value.to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
    ])
}

fn draw_status_line(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::styled("Contracts ", Style::default().fg(Color::DarkGray)),
        Span::raw(format!("{}  ", app.watchlist.len())),
        Span::styled("Reads ", Style::default().fg(Color::DarkGray)),
        Span::raw(format!("{}  ", app.plan.len())),
    ];
    if app.is_refreshing() {
        spans.push(Span::styled("Polling ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::raw(spinner(app)));
    } else if let Some(due) = app.next_poll_in(Instant::now()) {
        spans.push(Span::styled("Next poll ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::raw(format!("{}s", due.as_secs())));
    }
    if let Some(snapshot) = app.snapshot.as_ref() {
        let age = chrono::Duration::from_std(snapshot.resolved_at.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        spans.push(Span::styled("  Updated ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::raw((Local::now() - age).format("%H:%M:%S").to_string()));
    }
    if app.is_error {
        if let Some(err) = app.last_error.as_deref() {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                truncate_str(err, 60),
                Style::default().fg(Color::LightRed),
            ));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left);
    f.render_widget(paragraph, area);
}

/// Get command hint for autocompletion
fn command_hint(input: &str) -> Option<&'static str> {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        return None;
    }

    let commands = [
        ("add", "Watch a contract address"),
        ("rm", "Remove by number or address"),
        ("copy", "Copy an address"),
        ("connect", "Activate connector <n>"),
        ("disconnect", "Disconnect wallet"),
        ("endpoint", "Switch RPC endpoint <n>"),
        ("refresh", "Poll now"),
        ("help", "Show keys"),
        ("quit", "Exit"),
    ];

    for (cmd, desc) in commands {
        if cmd.starts_with(&input) {
            return Some(desc);
        }
    }
    None
}

fn draw_command_line(f: &mut Frame, area: Rect, app: &App) {
    let content = match app.input_mode {
        InputMode::Command => {
            let hint = command_hint(&app.command.input).unwrap_or("add | rm | connect | refresh");
            Line::from(vec![
                Span::styled(": ", Style::default().fg(Color::Yellow)),
                Span::raw(app.command.input.clone()),
                Span::styled(format!("  {}", hint), Style::default().fg(Color::DarkGray)),
            ])
        }
        InputMode::Normal | InputMode::Address => {
            if let Some((text, level)) = app.status_text() {
                let color = match level {
                    StatusLevel::Info => Color::LightGreen,
                    StatusLevel::Warn => Color::LightYellow,
                    StatusLevel::Error => Color::LightRed,
                };
                Line::from(vec![
                    Span::styled("msg: ", Style::default().fg(Color::DarkGray)),
                    Span::styled(text.to_string(), Style::default().fg(color)),
                ])
            } else {
                action_hints(app)
            }
        }
    };

    let paragraph = Paragraph::new(content).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}

fn action_hints(app: &App) -> Line<'static> {
    let hints: &[(&str, &str)] = match (app.input_mode, app.is_connected()) {
        (InputMode::Address, _) => &[("Enter", "add"), ("Esc", "done")],
        (_, false) => &[("j/k", "select"), ("Enter", "connect"), (":", "command"), ("?", "help"), ("q", "quit")],
        (_, true) => &[
            ("i", "add"),
            ("hjkl", "move"),
            ("d", "delete"),
            ("y", "copy"),
            ("r", "refresh"),
            ("x", "disconnect"),
            ("?", "help"),
            ("q", "quit"),
        ],
    };
    let mut spans = Vec::new();
    for (key, label) in hints {
        spans.push(Span::styled(
            key.to_string(),
            Style::default().fg(Color::LightCyan),
        ));
        spans.push(Span::styled(
            format!(" {label}  "),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn draw_help_popup(f: &mut Frame, area: Rect) {
    let popup_area = layout::centered_rect(60, 60, area);
    f.render_widget(Clear, popup_area);

    let lines = vec![
        Line::from("Wallet"),
        Line::from("  j / k      Select connector"),
        Line::from("  Enter      Connect"),
        Line::from("  x          Disconnect"),
        Line::from(""),
        Line::from("Contracts"),
        Line::from("  i          Edit address, Enter adds"),
        Line::from("  h j k l    Move between cards"),
        Line::from("  d          Delete selected card"),
        Line::from("  y          Copy selected address"),
        Line::from("  r          Poll now"),
        Line::from(""),
        Line::from("General"),
        Line::from("  :          Command (add, rm, connect, endpoint, ...)"),
        Line::from("  [ / ]      Switch RPC endpoint"),
        Line::from("  ?          Toggle help"),
        Line::from("  q          Quit"),
    ];

    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().title("Help").borders(Borders::ALL))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, popup_area);
}

fn draw_alert(f: &mut Frame, area: Rect, message: &str) {
    let popup_area = layout::centered_rect(50, 20, area);
    f.render_widget(Clear, popup_area);

    let lines = vec![
        Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::LightYellow),
        )),
        Line::default(),
        Line::from(Span::styled(
            "Press Enter or Esc",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let paragraph = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .title("Invalid address")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, popup_area);
}

fn spinner(app: &App) -> &'static str {
    SPINNER[(app.ticks % SPINNER.len() as u64) as usize]
}

fn truncate_str(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    value.chars().take(max).collect::<String>() + "…"
}

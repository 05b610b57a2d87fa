use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Rows of a card, borders included
pub const CARD_HEIGHT: u16 = 7;

#[derive(Debug, Clone, Copy)]
pub struct UiAreas {
    pub size: Rect,
    pub header: Rect,
    pub account: Rect,
    pub input: Rect,
    pub banner: Rect,
    pub main: Rect,
    pub status_line: Rect,
    pub command_line: Rect,
}

pub fn areas(size: Rect) -> UiAreas {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(2),
        ])
        .split(size);

    let footer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(vertical[5]);

    UiAreas {
        size,
        header: vertical[0],
        account: vertical[1],
        input: vertical[2],
        banner: vertical[3],
        main: vertical[4],
        status_line: footer_chunks[0],
        command_line: footer_chunks[1],
    }
}

/// One, two or three card columns depending on width
pub fn columns_for(width: u16) -> usize {
    match width {
        w if w >= 120 => 3,
        w if w >= 80 => 2,
        _ => 1,
    }
}

/// Card rectangles for a grid of `count` cards in `area`.
///
/// Rows scroll so the row holding `selected` stays visible. Returns
/// `(card index, rect)` for each card that fits.
pub fn card_grid(area: Rect, count: usize, selected: usize) -> Vec<(usize, Rect)> {
    if count == 0 || area.height < CARD_HEIGHT || area.width == 0 {
        return Vec::new();
    }
    let columns = columns_for(area.width);
    let visible_rows = (area.height / CARD_HEIGHT) as usize;
    let selected_row = selected.min(count - 1) / columns;
    let first_row = selected_row.saturating_sub(visible_rows - 1);

    let col_width = area.width / columns as u16;
    let mut cells = Vec::new();
    for row in 0..visible_rows {
        for col in 0..columns {
            let index = (first_row + row) * columns + col;
            if index >= count {
                return cells;
            }
            let x = area.x + col as u16 * col_width;
            // Last column takes the remainder
            let width = if col + 1 == columns {
                area.width - col as u16 * col_width
            } else {
                col_width
            };
            cells.push((
                index,
                Rect::new(x, area.y + row as u16 * CARD_HEIGHT, width, CARD_HEIGHT),
            ));
        }
    }
    cells
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

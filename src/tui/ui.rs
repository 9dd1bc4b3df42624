//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
    Frame,
};

use super::app::{App, TokenView};
use crate::lifecycle::{outcome_message, OpStatus, Operation};
use crate::tokens::Expiry;

/// Rows used by one token card, borders included
const CARD_HEIGHT: u16 = 8;

/// Main render function
pub fn render(frame: &mut Frame, app: &App, views: &[TokenView]) {
    let area = frame.area();

    // Layout: header (1 line) + token list + status bar (1 line)
    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), views.len());
    render_tokens(main_area, frame.buffer_mut(), views, app.selected);
    render_status(status_area, frame.buffer_mut(), app);
}

fn render_header(area: Rect, buf: &mut Buffer, count: usize) {
    let line = Line::from(vec![
        Span::styled(
            " Tokens",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" ({})", count), Style::default().fg(Color::Gray)),
    ]);
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn render_tokens(area: Rect, buf: &mut Buffer, views: &[TokenView], selected: usize) {
    if views.is_empty() {
        Paragraph::new("No tokens found. Run 'token-cli login' to authenticate.")
            .style(Style::default().fg(Color::Gray))
            .render(area, buf);
        return;
    }

    // Scroll so the selected card is always on screen
    let fits = usize::from((area.height / CARD_HEIGHT).max(1));
    let first = selected.saturating_sub(fits - 1);
    let shown = &views[first..views.len().min(first + fits)];

    let areas = Layout::vertical(shown.iter().map(|_| Constraint::Length(CARD_HEIGHT))).split(area);
    for (i, (view, card)) in shown.iter().zip(areas.iter()).enumerate() {
        render_card(*card, buf, view, first + i == selected);
    }
}

fn render_card(area: Rect, buf: &mut Buffer, view: &TokenView, selected: bool) {
    let record = &view.record;
    let border = if selected { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(format!(" Token ({}) ", record.created_local()));

    let label = Style::default().fg(Color::Gray);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Status:  ", label),
            expiry_span(&view.expiry),
            Span::raw("  "),
            button("Refresh", "Refreshing...", view.refresh),
            Span::raw(" "),
            button("Revoke", "Revoking...", view.revoke),
        ]),
        Line::from(vec![
            Span::styled("Access:  ", label),
            Span::raw(record.access_token.clone()),
        ]),
        Line::from(vec![
            Span::styled("Refresh: ", label),
            Span::raw(record.refresh_token.clone()),
        ]),
    ];

    for (op, status) in [
        (Operation::Refresh, view.refresh),
        (Operation::Revoke, view.revoke),
    ] {
        if let Some(message) = outcome_message(op, status) {
            let color = if status == OpStatus::Success {
                Color::Green
            } else {
                Color::Red
            };
            lines.push(Line::from(Span::styled(message, Style::default().fg(color))));
        }
    }

    Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .render(area, buf);
}

fn expiry_span(expiry: &Expiry) -> Span<'static> {
    let color = match expiry {
        Expiry::Remaining { .. } => Color::Green,
        Expiry::Expired | Expiry::Invalid(_) => Color::Red,
    };
    Span::styled(expiry.to_string(), Style::default().fg(color))
}

/// Action label, dimmed while its operation is running
fn button(idle: &'static str, busy: &'static str, status: OpStatus) -> Span<'static> {
    if status == OpStatus::Loading {
        Span::styled(format!("[{}]", busy), Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(format!("[{}]", idle), Style::default().fg(Color::Yellow))
    }
}

fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    let line = match &app.notice {
        Some(notice) => Line::from(Span::styled(
            format!(" {}", notice),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(Span::styled(
            " j/k select  r refresh  v revoke  d delete  q quit",
            Style::default().fg(Color::Gray),
        )),
    };
    Paragraph::new(line).render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenRecord;
    use crate::tokens::ExpiryError;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn view(id: i64, expiry: Expiry, refresh: OpStatus) -> TokenView {
        TokenView {
            record: TokenRecord {
                id,
                access_token: format!("access-{}", id),
                refresh_token: format!("refresh-{}", id),
                expires_in: 3600,
                created_at: "2024-05-01T12:00:00.000Z".to_string(),
            },
            expiry,
            refresh,
            revoke: OpStatus::Idle,
        }
    }

    fn draw(views: &[TokenView], selected: usize, height: u16) -> String {
        let backend = TestBackend::new(80, height);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| {
                let area = frame.area();
                render_tokens(area, frame.buffer_mut(), views, selected);
            })
            .unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(usize::from(buffer.area.width))
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_empty_list_message() {
        assert!(draw(&[], 0, 10).contains("No tokens found"));
    }

    #[test]
    fn test_card_shows_expiry_and_status() {
        let views = [
            view(1, Expiry::Remaining { minutes: 4, seconds: 2 }, OpStatus::Loading),
            view(2, Expiry::Invalid(ExpiryError::InvalidDate), OpStatus::Error),
        ];
        let screen = draw(&views, 0, 20);
        assert!(screen.contains("4m 2s remaining"));
        assert!(screen.contains("[Refreshing...]"));
        assert!(screen.contains("access-1"));
        assert!(screen.contains("Invalid date"));
        assert!(screen.contains("Failed to refresh token"));
    }

    #[test]
    fn test_selected_card_scrolled_into_view() {
        let views: Vec<_> = (1..=5)
            .map(|id| view(id, Expiry::Expired, OpStatus::Idle))
            .collect();
        let screen = draw(&views, 4, CARD_HEIGHT * 2);
        assert!(screen.contains("access-5"));
        assert!(!screen.contains("access-1"));
    }
}

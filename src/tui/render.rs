use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::{
    habits::entities::NAME_CUTOFF,
    utils::time::pretty_date,
};

use super::app::App;

pub const HEADER_HEIGHT: u16 = 2;
pub const MESSAGE_HEIGHT: u16 = 1;
pub const DATE_PADDING: usize = 14;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(MESSAGE_HEIGHT),
        ])
        .split(f.area());

    draw_header(f, chunks[0], app);
    draw_habits(f, chunks[1], app);
    f.render_widget(Paragraph::new(app.message()), chunks[2]);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let marker = Line::from(format!(
        "{}{}",
        " ".repeat(NAME_CUTOFF + DATE_PADDING * app.days_back() as usize),
        "-".repeat(DATE_PADDING)
    ));

    let mut dates = vec![Span::raw(" ".repeat(NAME_CUTOFF))];
    for date in app.dates() {
        let style = if date == app.today() {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        dates.push(Span::styled(pad(&pretty_date(date), DATE_PADDING), style));
    }

    f.render_widget(Paragraph::new(vec![marker, Line::from(dates)]), area);
}

/// First row to draw so that the selected habit stays on screen.
pub fn scroll_offset(selected_row: usize, visible_rows: usize) -> usize {
    (selected_row + 1).saturating_sub(visible_rows)
}

fn draw_habits(f: &mut Frame, area: Rect, app: &App) {
    let rows = area.height as usize;
    let offset = scroll_offset(app.selected_row(), rows);
    let dates = app.dates();

    let lines = app
        .visible_habits()
        .enumerate()
        .skip(offset)
        .take(rows)
        .map(|(row, habit)| {
            let mut style = if app.is_dimmed(habit) {
                Style::default().add_modifier(Modifier::DIM)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            if row == app.selected_row() {
                style = style.add_modifier(Modifier::REVERSED);
            }

            let mut spans = vec![Span::raw(pad(&habit.display_name(), NAME_CUTOFF))];
            spans.extend(
                dates
                    .iter()
                    .map(|date| Span::raw(pad(&habit.cell(*date), DATE_PADDING))),
            );
            Line::from(spans).style(style)
        })
        .collect::<Vec<_>>();

    f.render_widget(Paragraph::new(lines), area);
}

fn pad(value: &str, width: usize) -> String {
    format!("{value}{}", " ".repeat(width.saturating_sub(value.width())))
}

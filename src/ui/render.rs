use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::alert::AlertState;
use crate::types::Source;
use crate::ui::app::{format_amount, format_change, format_price, AppState, Field, StatusKind, Trend};

const GOLD: Color = Color::Rgb(0xFF, 0xD7, 0x00);
const RISING: Color = Color::Rgb(0xFF, 0x6B, 0x6B);
const FALLING: Color = Color::Rgb(0x4C, 0xAF, 0x50);
const NEUTRAL: Color = Color::Rgb(0xA0, 0xA0, 0xA0);

pub fn render(f: &mut Frame, app: &AppState) {
    let area = f.area();

    let card_height = 4;
    let mut constraints = vec![Constraint::Length(3)]; // header
    constraints.extend(app.sources.iter().map(|_| Constraint::Length(card_height)));
    constraints.push(Constraint::Length(3)); // alert summary
    constraints.push(Constraint::Min(0));
    constraints.push(Constraint::Length(1)); // toast
    constraints.push(Constraint::Length(1)); // footer

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    render_header(f, app, chunks[0]);
    for (i, source) in app.sources.iter().enumerate() {
        render_card(f, app, source, chunks[1 + i]);
    }
    let n = app.sources.len();
    render_alert_summary(f, app, chunks[1 + n]);
    render_toast(f, app, chunks[3 + n]);
    render_footer(f, chunks[4 + n]);

    if let Some(popup) = app.popups.front() {
        render_popup(f, &popup.item.title, &popup.item.body, area);
    }
    if app.form.is_some() {
        render_form(f, app, area);
    }
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let status_color = match app.status.kind {
        StatusKind::Pending => Color::DarkGray,
        StatusKind::Ok => Color::Green,
        StatusKind::Error => Color::Red,
    };

    let line = Line::from(vec![
        Span::styled(
            " 金价监控  ",
            Style::default().fg(GOLD).add_modifier(Modifier::BOLD),
        ),
        Span::raw("│  "),
        Span::styled(app.status.text.clone(), Style::default().fg(status_color)),
    ]);
    let paragraph = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_card(f: &mut Frame, app: &AppState, source: &Source, area: Rect) {
    let (r, g, b) = source.color;
    let source_color = Color::Rgb(r, g, b);

    let (price, (change, trend)) = match app.store.get(&source.id) {
        Some(sample) => (format_price(&sample.price), format_change(&sample.change)),
        None => ("¥--".to_string(), ("--".to_string(), Trend::Flat)),
    };
    let change_color = match trend {
        Trend::Rising => RISING,
        Trend::Falling => FALLING,
        Trend::Flat => NEUTRAL,
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {:<6}", source.name),
            Style::default().fg(source_color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{price:<14}"),
            Style::default().fg(GOLD).add_modifier(Modifier::BOLD),
        ),
        Span::styled(change, Style::default().fg(change_color)),
    ]);

    let title = format!(" {}银行 ", source.name);
    let paragraph = Paragraph::new(vec![Line::raw(""), line]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                title,
                Style::default().fg(source_color).add_modifier(Modifier::BOLD),
            )),
    );
    f.render_widget(paragraph, area);
}

fn render_alert_summary(f: &mut Frame, app: &AppState, area: Rect) {
    let line = match app.alert_state() {
        AlertState::Disabled => Line::from(Span::styled(
            " 提醒未启用",
            Style::default().fg(Color::DarkGray),
        )),
        AlertState::Armed(band) => Line::from(vec![
            Span::styled(" 提醒已启用  ", Style::default().fg(Color::Green)),
            Span::raw(format!("基准 {:.2}  ", band.base)),
            Span::styled(format!("上限 {:.2}  ", band.upper()), Style::default().fg(RISING)),
            Span::styled(format!("下限 {:.2}", band.lower()), Style::default().fg(FALLING)),
        ]),
    };
    let paragraph = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_toast(f: &mut Frame, app: &AppState, area: Rect) {
    if let Some(toast) = &app.toast {
        let line = Line::from(Span::styled(
            format!(" {}", toast.item),
            Style::default().fg(Color::Yellow),
        ));
        f.render_widget(Paragraph::new(line), area);
    }
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[a] ", Style::default().fg(Color::Yellow)),
        Span::raw("alert settings  "),
        Span::styled("[v] ", Style::default().fg(Color::Yellow)),
        Span::raw("voice test"),
    ]);
    f.render_widget(Paragraph::new(line).style(Style::default().fg(Color::White)), area);
}

fn render_popup(f: &mut Frame, title: &str, body: &str, area: Rect) {
    let rect = centered(area, 50, 5);
    let paragraph = Paragraph::new(vec![
        Line::raw(""),
        Line::from(Span::styled(
            body.to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
    ])
    .alignment(ratatui::layout::Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(GOLD))
            .title(format!(" {title} ")),
    );
    f.render_widget(Clear, rect);
    f.render_widget(paragraph, rect);
}

fn render_form(f: &mut Frame, app: &AppState, area: Rect) {
    let Some(form) = &app.form else {
        return;
    };
    let rect = centered(area, 50, 10);

    let row = |field: Field, label: &str, value: String| {
        let focused = form.focus == field;
        let marker = if focused { "▸ " } else { "  " };
        let value_style = if focused {
            Style::default().fg(Color::Black).bg(GOLD)
        } else {
            Style::default().fg(Color::White)
        };
        Line::from(vec![
            Span::raw(marker.to_string()),
            Span::styled(format!("{label:<10}"), Style::default().fg(NEUTRAL)),
            Span::styled(format!(" {value} "), value_style),
        ])
    };

    let enabled = if form.input.enabled { "[x] 开" } else { "[ ] 关" };
    let lines = vec![
        row(Field::Base, "基准价格:", form.input.base.clone()),
        row(Field::Up, "涨多少(元):", form.input.up.clone()),
        row(Field::Down, "跌多少(元):", form.input.down.clone()),
        row(Field::Enabled, "启用提醒:", enabled.to_string()),
        Line::raw(""),
        Line::from(Span::styled(
            format!(
                "当前设置: 基准 {}  涨 {}  跌 {}",
                format_amount(app.alert_config().base_price),
                format_amount(app.alert_config().up_amount),
                format_amount(app.alert_config().down_amount),
            ),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            "[Tab] 切换  [Space] 开关  [c] 当前价  [Enter] 保存  [Esc] 取消",
            Style::default().fg(Color::Yellow),
        )),
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(Span::styled(
                " 提醒设置 ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );
    f.render_widget(Clear, rect);
    f.render_widget(paragraph, rect);
}

/// A `width`% wide, `height`-row tall rect in the middle of `area`.
fn centered(area: Rect, width_pct: u16, height: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_pct) / 2),
            Constraint::Percentage(width_pct),
            Constraint::Percentage((100 - width_pct) / 2),
        ])
        .split(vertical[1])[1]
}

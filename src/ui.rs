use crate::app::{App, InputMode, Screen, StatusKind};
use crate::assistant::{markdown_to_text, SUGGESTIONS};
use crate::cache::QuerySnapshot;
use crate::charts::{self, Slice, OTHERS, TASK_DAYS, TOP_COLLABORATORS, TYPE_SLICES};
use crate::format::{format_duration, format_timestamp, format_timestamp_or_dash, percent, NO_VALUE};
use crate::models::{DashboardSummary, Labelled, Role, Task, TaskStatus};
use ansi_parser::{AnsiParser, Output};
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{
        Bar, BarChart, BarGroup, Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row,
        Sparkline, Table, Tabs, Wrap,
    },
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

const LOADING: &str = "Cargando…";
const NO_DATA: &str = "Sin datos";

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

pub fn ansi_to_text(ansi_str: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for ansi_line in ansi_str.lines() {
        let mut spans = Vec::new();
        for item in ansi_line.ansi_parse() {
            if let Output::TextBlock(text) = item {
                spans.push(Span::raw(text.to_string()));
            }
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn key_hint(key: &'static str, action: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(format!(" {} ", key), Style::default().fg(Color::Red)),
        Span::raw(format!(": {} ", action)),
    ]
}

fn get_legend(app: &App) -> Text<'static> {
    let hints: Vec<(&'static str, &'static str)> = match app.input_mode {
        InputMode::Normal => {
            let mut hints = vec![("q", "Salir"), ("Tab", "Pantalla"), ("r", "Refrescar")];
            match app.screen {
                Screen::Tasks => hints.extend([
                    ("j/k", "Mover"),
                    ("n/p", "Página"),
                    ("Enter", "Detalle"),
                    ("/", "Buscar"),
                    ("f", "Estado"),
                    ("c", "Cliente"),
                    ("l", "Colaborador"),
                    ("s", "Tamaño"),
                    ("x", "Limpiar"),
                    ("i/o", "Check-in/out"),
                ]),
                Screen::Clients | Screen::Collaborators => {
                    hints.extend([("j/k", "Mover"), ("/", "Filtrar")])
                }
                Screen::Metrics => {}
            }
            hints.push(("a", "Asistente"));
            hints
        }
        InputMode::Search => vec![("Enter", "Aceptar"), ("Esc", "Cerrar")],
        InputMode::Picking => vec![("↑/↓", "Mover"), ("Enter", "Aplicar"), ("Esc", "Cancelar")],
        InputMode::Detail => vec![("i", "Check-in"), ("o", "Check-out"), ("Esc", "Cerrar")],
        InputMode::Assistant => vec![
            ("Enter", "Enviar"),
            ("Tab", "Sugerencias"),
            ("Ctrl-L", "Limpiar chat"),
            ("Esc", "Cerrar"),
        ],
    };
    let spans: Vec<Span<'static>> = hints
        .into_iter()
        .flat_map(|(key, action)| key_hint(key, action))
        .collect();
    Text::from(Line::from(spans))
}

/// Block body for a query that has not produced data yet.
fn placeholder<T>(snap: &QuerySnapshot<T>) -> Option<Paragraph<'static>> {
    if snap.is_loading() {
        return Some(Paragraph::new(LOADING).style(Style::default().fg(Color::DarkGray)));
    }
    match (&snap.data, &snap.error) {
        (None, Some(err)) => Some(
            Paragraph::new(err.clone())
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true }),
        ),
        _ => None,
    }
}

fn status_style(status: TaskStatus) -> Style {
    match status {
        TaskStatus::Pending => Style::default().fg(Color::Yellow),
        TaskStatus::InProgress => Style::default().fg(Color::Cyan),
        TaskStatus::Finished => Style::default().fg(Color::Green),
    }
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(18)].as_ref())
        .split(area);

    let titles: Vec<Line> = Screen::ALL
        .iter()
        .enumerate()
        .map(|(i, s)| Line::from(format!("{} {}", i + 1, s.title())))
        .collect();
    let selected = Screen::ALL.iter().position(|&s| s == app.screen).unwrap_or(0);
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title("Lira"))
        .select(selected)
        .highlight_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, chunks[0]);

    let (label, color) = if app.snapshots.is_fetching() {
        ("actualizando…", Color::Yellow)
    } else {
        ("en línea", Color::Green)
    };
    let status = Paragraph::new(Span::styled(label, Style::default().fg(color)))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(status, chunks[1]);
}

fn kpi_row(f: &mut Frame, area: Rect, kpis: &[(&str, String)]) {
    let constraints: Vec<Constraint> = kpis
        .iter()
        .map(|_| Constraint::Ratio(1, kpis.len() as u32))
        .collect();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);
    for (chunk, (title, value)) in chunks.iter().zip(kpis) {
        let widget = Paragraph::new(Span::styled(
            value.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()));
        f.render_widget(widget, *chunk);
    }
}

/// KPI text; a count the backend did not send shows as a dash, never as 0.
fn summary_value(app: &App, pick: impl Fn(&DashboardSummary) -> Option<u64>) -> String {
    let snap = &app.snapshots.summary;
    match (&snap.data, &snap.error) {
        (Some(summary), _) => pick(summary).map_or_else(|| NO_VALUE.to_string(), |v| v.to_string()),
        (None, Some(_)) => NO_VALUE.to_string(),
        (None, None) => "…".to_string(),
    }
}

fn draw_tasks(f: &mut Frame, app: &mut App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(area);

    kpi_row(
        f,
        rows[0],
        &[
            ("Total", summary_value(app, |s| Some(s.total))),
            ("Pendientes", summary_value(app, |s| Some(s.pending))),
            ("En progreso", summary_value(app, |s| s.in_progress)),
            ("Finalizadas", summary_value(app, |s| Some(s.finished))),
        ],
    );

    draw_filters(f, app, rows[1]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)].as_ref())
        .split(rows[2]);
    draw_task_table(f, app, body[0]);
    draw_page_charts(f, app, body[1]);

    let info = app.page_info();
    let nav = |enabled: bool, label: &'static str| {
        let style = if enabled {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Span::styled(label, style)
    };
    let footer = Line::from(vec![
        Span::raw(format!(" {}   ", info.range_text())),
        nav(info.can_prev(), "◀ Anterior"),
        Span::raw("  "),
        nav(info.can_next(), "Siguiente ▶"),
        Span::raw(format!("   {} por página", app.query.limit())),
    ]);
    f.render_widget(Paragraph::new(footer), rows[3]);
}

fn draw_filters(f: &mut Frame, app: &App, area: Rect) {
    let editing = app.input_mode == InputMode::Search;
    let search = if app.search_input.is_empty() && !editing {
        Span::styled("(vacío)", Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(app.search_input.clone())
    };
    let label = |name: Option<&str>, id: Option<u64>| match Labelled::from_parts(name, id) {
        Labelled::Missing => "Todos".to_string(),
        other => other.to_string(),
    };
    let line = Line::from(vec![
        Span::styled("Buscar: ", Style::default().add_modifier(Modifier::BOLD)),
        search,
        Span::raw(if editing { "▏" } else { "" }),
        Span::styled(
            if app.search_pending() { " …  " } else { "  " },
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled("Estado: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("{}  ", app.query.finished().label())),
        Span::styled("Cliente: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("{}  ", label(app.client_label.as_deref(), app.query.client_id()))),
        Span::styled("Colaborador: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(label(app.collaborator_label.as_deref(), app.query.collaborator_id())),
    ]);
    let border = if editing { Color::Green } else { Color::Reset };
    let widget = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title("Filtros"),
    );
    f.render_widget(widget, area);
}

fn task_row(task: &Task) -> Row<'static> {
    let status = task.status();
    Row::new(vec![
        Cell::from(task.id.to_string()),
        Cell::from(task.ticket.clone().unwrap_or_default()),
        Cell::from(task.description.clone().unwrap_or_default()),
        Cell::from(task.client().to_string()),
        Cell::from(task.collaborator().to_string()),
        Cell::from(task.kind().to_string()),
        Cell::from(Span::styled(status.label(), status_style(status))),
        Cell::from(format_timestamp(task.date.as_deref())),
    ])
}

fn draw_task_table(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Tareas");
    let error = app.snapshots.tasks.error.clone();

    if app.visible_page().is_none() {
        let body = placeholder(&app.snapshots.tasks)
            .unwrap_or_else(|| Paragraph::new(LOADING))
            .block(block);
        f.render_widget(body, area);
        return;
    }
    if app.visible_tasks().is_empty() {
        let body = Paragraph::new("No hay resultados")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(body, area);
        return;
    }

    // a failed refetch keeps the rows and reports above them
    let block = match error {
        Some(err) => block.title_bottom(Line::from(Span::styled(
            format!(" {} ", err),
            Style::default().fg(Color::Red),
        ))),
        None => block,
    };
    let rows: Vec<Row> = app.visible_tasks().iter().map(task_row).collect();
    let header = Row::new(vec![
        "ID", "Ticket", "Descripción", "Cliente", "Colaborador", "Tipo", "Estado", "Fecha",
    ])
    .style(Style::default().add_modifier(Modifier::BOLD));
    let widths = [
        Constraint::Length(6),
        Constraint::Length(8),
        Constraint::Min(16),
        Constraint::Length(16),
        Constraint::Length(14),
        Constraint::Length(12),
        Constraint::Length(11),
        Constraint::Length(16),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .highlight_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        .highlight_symbol(">> ");
    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn bar_chart<'a>(slices: &'a [Slice], title: &'a str, horizontal: bool) -> BarChart<'a> {
    let bars: Vec<Bar> = slices
        .iter()
        .map(|s| {
            let bar = Bar::default().value(s.value).label(Line::from(s.name.clone()));
            if s.name == OTHERS {
                bar.style(Style::default().fg(Color::DarkGray))
            } else {
                bar
            }
        })
        .collect();
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(BarGroup::default().bars(&bars))
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().add_modifier(Modifier::BOLD));
    if horizontal {
        chart.direction(Direction::Horizontal).bar_width(1).bar_gap(0)
    } else {
        chart.bar_width(5).bar_gap(1)
    }
}

fn empty_block(title: &str, message: &str) -> Paragraph<'static> {
    Paragraph::new(message.to_string())
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
}

fn draw_page_charts(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)].as_ref())
        .split(area);
    let tasks = app.visible_tasks();
    if tasks.is_empty() {
        f.render_widget(empty_block("Estado (página)", NO_DATA), chunks[0]);
        f.render_widget(empty_block("Tareas por día", NO_DATA), chunks[1]);
        return;
    }

    let totals = charts::page_status_totals(tasks);
    let status = [
        Slice {
            name: "Pend.".to_string(),
            value: totals.pending,
        },
        Slice {
            name: "Fin.".to_string(),
            value: totals.finished,
        },
    ];
    f.render_widget(bar_chart(&status, "Estado (página)", false), chunks[0]);

    let per_day = charts::tasks_per_day(tasks, TASK_DAYS);
    if per_day.is_empty() {
        f.render_widget(empty_block("Tareas por día", NO_DATA), chunks[1]);
    } else {
        f.render_widget(bar_chart(&per_day, "Tareas por día", true), chunks[1]);
    }
}

fn draw_metrics(f: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Percentage(40),
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(area);

    let pct = |pick: fn(&DashboardSummary) -> u64| {
        let snap = &app.snapshots.summary;
        match (&snap.data, &snap.error) {
            (Some(s), _) => format!("{}%", percent(pick(s), s.total)),
            (None, Some(_)) => NO_VALUE.to_string(),
            (None, None) => "…".to_string(),
        }
    };
    kpi_row(
        f,
        rows[0],
        &[
            ("Total", summary_value(app, |s| Some(s.total))),
            ("Pendientes", summary_value(app, |s| Some(s.pending))),
            ("Finalizadas", summary_value(app, |s| Some(s.finished))),
            ("% Pendientes", pct(|s| s.pending)),
            ("% Finalizadas", pct(|s| s.finished)),
        ],
    );

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)].as_ref())
        .split(rows[1]);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage(34),
                Constraint::Percentage(33),
                Constraint::Percentage(33),
            ]
            .as_ref(),
        )
        .split(rows[2]);

    let snaps = &app.snapshots;

    // status and trend both come from the timeseries
    match (&snaps.timeseries.data, placeholder(&snaps.timeseries)) {
        (Some(series), _) if !series.items.is_empty() => {
            let totals = charts::status_totals(&series.items);
            let status = [
                Slice {
                    name: "Pend.".to_string(),
                    value: totals.pending,
                },
                Slice {
                    name: "Fin.".to_string(),
                    value: totals.finished,
                },
            ];
            f.render_widget(bar_chart(&status, "Estado", false), top[0]);

            let trend = charts::trend(&series.items);
            let values: Vec<u64> = trend.iter().map(|s| s.value).collect();
            let range = match (trend.first(), trend.last()) {
                (Some(first), Some(last)) => format!("Tendencia {} → {}", first.name, last.name),
                _ => "Tendencia".to_string(),
            };
            let sparkline = Sparkline::default()
                .block(Block::default().borders(Borders::ALL).title(range))
                .data(&values)
                .style(Style::default().fg(Color::Cyan));
            f.render_widget(sparkline, top[1]);
        }
        (Some(_), _) => {
            f.render_widget(empty_block("Estado", NO_DATA), top[0]);
            f.render_widget(empty_block("Tendencia", NO_DATA), top[1]);
        }
        (None, Some(body)) => {
            f.render_widget(
                body.clone().block(Block::default().borders(Borders::ALL).title("Estado")),
                top[0],
            );
            f.render_widget(
                body.block(Block::default().borders(Borders::ALL).title("Tendencia")),
                top[1],
            );
        }
        (None, None) => {}
    }

    let title = "Por tipo";
    match (&snaps.by_type.data, placeholder(&snaps.by_type)) {
        (Some(list), _) if !list.items.is_empty() => {
            let slices = charts::type_distribution(&list.items, TYPE_SLICES);
            f.render_widget(bar_chart(&slices, title, true), bottom[0]);
        }
        (None, Some(body)) => f.render_widget(
            body.block(Block::default().borders(Borders::ALL).title(title)),
            bottom[0],
        ),
        _ => f.render_widget(empty_block(title, NO_DATA), bottom[0]),
    }

    let title = "Top colaboradores";
    match (&snaps.by_collaborator.data, placeholder(&snaps.by_collaborator)) {
        (Some(list), _) if !list.items.is_empty() => {
            let slices = charts::top_collaborators(&list.items, TOP_COLLABORATORS);
            f.render_widget(bar_chart(&slices, title, true), bottom[1]);
        }
        (None, Some(body)) => f.render_widget(
            body.block(Block::default().borders(Borders::ALL).title(title)),
            bottom[1],
        ),
        _ => f.render_widget(empty_block(title, NO_DATA), bottom[1]),
    }

    let title = "Pendientes por cliente";
    match (&snaps.by_client_pending.data, placeholder(&snaps.by_client_pending)) {
        (Some(list), _) if !list.items.is_empty() => {
            let items: Vec<ListItem> = charts::pending_by_client(&list.items, list.items.len())
                .into_iter()
                .map(|s| {
                    ListItem::new(Line::from(vec![
                        Span::styled(
                            format!("{:>4} ", s.value),
                            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                        ),
                        Span::raw(s.name),
                    ]))
                })
                .collect();
            let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
            f.render_widget(list, bottom[2]);
        }
        (None, Some(body)) => f.render_widget(
            body.block(Block::default().borders(Borders::ALL).title(title)),
            bottom[2],
        ),
        _ => f.render_widget(empty_block(title, NO_DATA), bottom[2]),
    }
}

fn draw_directory(f: &mut Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let editing = app.input_mode == InputMode::Search;
    let filter = Paragraph::new(format!(
        "{}{}",
        app.directory_filter,
        if editing { "▏" } else { "" }
    ))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if editing { Color::Green } else { Color::Reset }))
            .title("Filtrar por nombre"),
    );
    f.render_widget(filter, chunks[0]);

    let title = app.screen.title();
    let (has_data, body) = match app.screen {
        Screen::Clients => (
            app.snapshots.clients.data.is_some(),
            placeholder(&app.snapshots.clients),
        ),
        _ => (
            app.snapshots.collaborators.data.is_some(),
            placeholder(&app.snapshots.collaborators),
        ),
    };
    if !has_data {
        if let Some(body) = body {
            f.render_widget(
                body.block(Block::default().borders(Borders::ALL).title(title)),
                chunks[1],
            );
        }
        return;
    }

    let rows = app.directory_rows();
    if rows.is_empty() {
        f.render_widget(empty_block(title, "Sin resultados."), chunks[1]);
        return;
    }
    let items: Vec<ListItem> = rows
        .into_iter()
        .map(|(id, name)| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("#{:<5} ", id), Style::default().fg(Color::DarkGray)),
                Span::raw(name),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, chunks[1], &mut app.directory_state);
}

fn field(name: &'static str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", name), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(value),
    ])
}

fn draw_detail(f: &mut Frame, app: &App, area: Rect) {
    let Some(task) = &app.selected_task else {
        return;
    };
    let status = task.status();
    let or_dash = |v: Option<String>| v.filter(|s| !s.is_empty()).unwrap_or_else(|| NO_VALUE.to_string());
    let lines = vec![
        Line::from(vec![
            Span::styled(
                format!("Tarea #{}  ", task.id),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" {} ", status.label()),
                status_style(status).add_modifier(Modifier::REVERSED),
            ),
        ]),
        Line::from(""),
        field("Tipo", task.kind().to_string()),
        field("Descripción", or_dash(task.description.clone())),
        field("Cliente", task.client().to_string()),
        field("Colaborador", task.collaborator().to_string()),
        field("Fecha", format_timestamp_or_dash(task.date.as_deref())),
        field("Check-in", format_timestamp_or_dash(task.check_in.as_deref())),
        field("Check-out", format_timestamp_or_dash(task.check_out.as_deref())),
        field(
            "Duración",
            format_duration(task.check_in.as_deref(), task.check_out.as_deref()),
        ),
        field("Ticket", or_dash(task.ticket.clone())),
        field("Estado (id)", or_dash(task.status_id.map(|id| id.to_string()))),
    ];

    let width = area.width.saturating_sub(4).min(70);
    let popup = centered_rect_absolute(width, lines.len() as u16 + 2, area);
    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Detalle")
                .style(Style::default().fg(Color::Green)),
        )
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, popup);
    f.render_widget(widget, popup);
}

fn draw_picker(f: &mut Frame, app: &mut App, area: Rect) {
    let Some(picker) = app.picker.as_mut() else {
        return;
    };
    let view = app.snapshots.picker.clone().unwrap_or_default();
    let popup = centered_rect_absolute(area.width.saturating_sub(4).min(50), area.height.saturating_sub(4).min(20), area);
    f.render_widget(Clear, popup);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(popup);

    let suffix = if view.is_fetching { "  …" } else { "" };
    let input = Paragraph::new(format!("{}▏{}", picker.input(), suffix)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Buscar {}", picker.directory.title().to_lowercase()))
            .style(Style::default().fg(Color::Green)),
    );
    f.render_widget(input, chunks[0]);

    let mut items = vec![ListItem::new(Span::styled(
        "Todos",
        Style::default().add_modifier(Modifier::ITALIC),
    ))];
    items.extend(view.items.iter().map(|e| ListItem::new(e.name.clone())));
    let mut block = Block::default().borders(Borders::ALL);
    if let Some(err) = &view.error {
        block = block.title(Span::styled(err.clone(), Style::default().fg(Color::Red)));
    }
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, chunks[1], &mut picker.state);
}

fn draw_assistant(f: &mut Frame, app: &mut App, area: Rect) {
    let popup = centered_rect_absolute(
        area.width.saturating_sub(4).min(100),
        area.height.saturating_sub(2),
        area,
    );
    f.render_widget(Clear, popup);

    let suggestions_height = if app.show_suggestions {
        SUGGESTIONS.len() as u16 + 2
    } else {
        0
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Min(0),
                Constraint::Length(suggestions_height),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(popup);

    let width = chunks[0].width.saturating_sub(2) as usize;
    let mut lines: Vec<Line<'static>> = Vec::new();
    for message in app.conversation.messages() {
        let (who, color) = match message.role {
            Role::User => ("Tú", Color::Cyan),
            Role::Assistant => ("Asistente", Color::Green),
        };
        lines.push(Line::from(Span::styled(
            who,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        match message.role {
            Role::Assistant => lines.extend(ansi_to_text(&markdown_to_text(&message.content, width))),
            Role::User => lines.extend(message.content.lines().map(|l| Line::from(l.to_string()))),
        }
        lines.push(Line::from(""));
    }
    if app.conversation.is_pending() {
        lines.push(Line::from(Span::styled(
            "Escribiendo…",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    // keep the newest messages in view
    let visible = chunks[0].height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;
    let history = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Asistente")
                .style(Style::default().fg(Color::Green)),
        )
        .style(Style::default().fg(Color::White))
        .scroll((scroll, 0));
    f.render_widget(history, chunks[0]);

    if app.show_suggestions {
        let items: Vec<ListItem> = SUGGESTIONS.iter().map(|s| ListItem::new(*s)).collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Sugerencias"))
            .highlight_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
            .highlight_symbol(">> ");
        f.render_stateful_widget(list, chunks[1], &mut app.suggestion_state);
    }

    let input = Paragraph::new(format!("{}▏", app.assistant_input)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Pregunta")
            .style(Style::default().fg(Color::Green)),
    );
    f.render_widget(input, chunks[2]);
}

fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(size);
    let body = chunks[1];

    draw_header(f, app, chunks[0]);
    match app.screen {
        Screen::Tasks => draw_tasks(f, app, body),
        Screen::Metrics => draw_metrics(f, app, body),
        Screen::Clients | Screen::Collaborators => draw_directory(f, app, body),
    }

    match app.input_mode {
        InputMode::Detail => draw_detail(f, app, body),
        InputMode::Picking => draw_picker(f, app, body),
        InputMode::Assistant => draw_assistant(f, app, body),
        InputMode::Normal | InputMode::Search => {}
    }

    if let Some((message, kind, _)) = &app.status {
        let color = match kind {
            StatusKind::Info => Color::Green,
            StatusKind::Error => Color::Red,
        };
        let status = Paragraph::new(Span::styled(message.clone(), Style::default().fg(color)));
        f.render_widget(status, chunks[2]);
    }

    let legend = Paragraph::new(get_legend(app))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    f.render_widget(legend, chunks[3]);
}

pub async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<()> {
    loop {
        app.tick(Instant::now());
        terminal.draw(|f| draw(f, &mut app))?;

        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if app.handle_input(key, Instant::now()) {
                    return Ok(());
                }
            }
        }
    }
}

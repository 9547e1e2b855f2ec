use crate::app::{App, PopupInfo, Surface};
use crate::braille::BrailleCanvas;
use crate::map::{Lod, MapLayers, MapRenderer};
use chrono::{DateTime, Utc};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Widget},
    Frame,
};

const POPUP_WIDTH: u16 = 36;

/// Split the screen into search line, map and status bar
fn layout(area: Rect) -> [Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Search
            Constraint::Min(3),    // Map
            Constraint::Length(1), // Status bar
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2]]
}

fn map_block() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Markers ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
}

/// Inner rect of the map for a terminal of the given size
pub fn map_area(area: Rect) -> Rect {
    map_block().inner(layout(area)[1])
}

/// Render the UI
pub fn render(frame: &mut Frame, app: &App, now: DateTime<Utc>) {
    if let Surface::Failed(_) = app.surface {
        render_notice(frame, frame.area(), "Error loading maps", Color::Red);
        return;
    }
    let [search, map, status] = layout(frame.area());

    render_search_bar(frame, app, search);

    let block = map_block();
    let inner = block.inner(map);
    frame.render_widget(block, map);

    match &app.surface {
        Surface::Loading => render_notice(frame, inner, "Loading...", Color::DarkGray),
        Surface::Failed(_) => {}
        Surface::Ready(renderer) => {
            render_map(frame, app, renderer, inner);
            if let Some(info) = app.popup(now) {
                render_popup(frame, app, &info, inner);
            }
        }
    }

    render_suggestions(frame, app, inner);
    render_status_bar(frame, app, status);
}

fn render_notice(frame: &mut Frame, area: Rect, text: &str, color: Color) {
    let y = area.y + area.height / 2;
    let line = Rect::new(area.x, y, area.width, 1.min(area.height));
    frame.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .style(Style::default().fg(color)),
        line,
    );
}

fn render_map(frame: &mut Frame, app: &App, renderer: &MapRenderer, inner: Rect) {
    let viewport = app.controller.viewport();
    let mut layers = renderer.render(inner.width as usize, inner.height as usize, viewport);

    if let Some(location) = app.user_location {
        renderer.draw_radius(&mut layers.overlay, viewport, location, app.user_radius_m);
    }

    let markers = app
        .markers
        .iter()
        .filter_map(|m| {
            let selected = app.selected.as_ref() == Some(&m.id);
            app.controller.cell_of(m.position()).map(|cell| (cell, selected))
        })
        .collect();

    let cursor_pos = app
        .mouse_pos
        .filter(|&(col, row)| app.controller.contains_cell(col, row))
        .map(|(col, row)| (col - inner.x, row - inner.y));

    let map_widget = MapWidget {
        layers,
        markers,
        user: app.user_location.and_then(|p| app.controller.cell_of(p)),
        cursor_pos,
        zoom: viewport.zoom,
    };
    frame.render_widget(map_widget, inner);
}

/// Braille map with markers and labels overlaid
struct MapWidget {
    layers: MapLayers,
    /// Map-relative cell and selected flag of each visible marker
    markers: Vec<((u16, u16), bool)>,
    user: Option<(u16, u16)>,
    cursor_pos: Option<(u16, u16)>,
    zoom: u8,
}

/// Write a glyph at a map-relative cell if it lies inside `area`
fn put(buf: &mut Buffer, area: Rect, (cx, cy): (u16, u16), ch: char, style: Style) {
    if cx < area.width && cy < area.height {
        buf[(area.x + cx, area.y + cy)].set_char(ch).set_style(style);
    }
}

impl MapWidget {
    /// Render a braille canvas layer with a specific color
    fn render_layer(canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for (col, row, ch) in canvas.glyphs() {
            if col >= area.width as usize || row >= area.height as usize {
                continue;
            }
            buf[(area.x + col as u16, area.y + row as u16)]
                .set_char(ch)
                .set_fg(color);
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Back to front
        Self::render_layer(&self.layers.coastlines, Color::Cyan, area, buf);
        let border_color = if Lod::from_zoom(self.zoom) == Lod::Low {
            Color::DarkGray
        } else {
            Color::Yellow
        };
        Self::render_layer(&self.layers.borders, border_color, area, buf);
        Self::render_layer(&self.layers.pois, Color::White, area, buf);
        Self::render_layer(&self.layers.overlay, Color::LightBlue, area, buf);

        let label_style = Style::default().fg(Color::Gray);
        for (lx, ly, text) in &self.layers.labels {
            if *ly >= area.height || *lx >= area.width {
                continue;
            }
            let max_len = (area.width - lx) as usize;
            for (i, ch) in text.chars().take(max_len.min(24)).enumerate() {
                put(buf, area, (lx + i as u16, *ly), ch, label_style);
            }
        }

        if let Some(cell) = self.user {
            put(buf, area, cell, '◎', Style::default().fg(Color::LightBlue));
        }

        for (cell, selected) in &self.markers {
            let (ch, style) = if *selected {
                ('◉', Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            } else {
                ('●', Style::default().fg(Color::Red))
            };
            put(buf, area, *cell, ch, style);
        }

        if let Some(cell) = self.cursor_pos {
            put(buf, area, cell, '╋', Style::default().fg(Color::Magenta));
        }
    }
}

fn render_popup(frame: &mut Frame, app: &App, info: &PopupInfo, inner: Rect) {
    let mut lines = vec![
        Line::from(format!("{:.5}, {:.5}", info.position.lat, info.position.lng)),
        Line::from(format!("Reported {}", info.reported)),
    ];
    if let Some((name, km)) = &info.nearest {
        lines.push(Line::from(Span::styled(
            format!("{km:.0} km from {name}"),
            Style::default().fg(Color::Gray),
        )));
    }
    lines.push(Line::from(Span::styled(
        "d:delete esc:close",
        Style::default().fg(Color::DarkGray),
    )));

    let height = lines.len() as u16 + 2;
    let width = POPUP_WIDTH.min(inner.width);
    if inner.height < height || width < 4 {
        return;
    }

    // Sit just above the marker, clamped inside the map
    let (mx, my) = app
        .controller
        .cell_of(info.position)
        .unwrap_or((inner.width / 2, inner.height / 2));
    let x = inner.x + mx.saturating_sub(width / 2).min(inner.width - width);
    let y = inner.y + my.saturating_sub(height).min(inner.height - height);
    let area = Rect::new(x, y, width, height);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" Marker {} ", info.id));
    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_search_bar(frame: &mut Frame, app: &App, area: Rect) {
    let search = &app.search;
    let line = if !app.search_ready() {
        Line::from(Span::styled(
            " Search unavailable",
            Style::default().fg(Color::DarkGray),
        ))
    } else if search.active {
        Line::from(vec![
            Span::styled(" Search: ", Style::default().fg(Color::Cyan)),
            Span::raw(search.value.as_str()),
            Span::styled("▏", Style::default().fg(Color::Cyan)),
        ])
    } else if search.value.is_empty() {
        Line::from(Span::styled(
            " /: search places",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(vec![
            Span::styled(" Search: ", Style::default().fg(Color::DarkGray)),
            Span::raw(search.value.as_str()),
        ])
    };
    frame.render_widget(Paragraph::new(line), area);
}

/// Suggestion dropdown below the search line, over the map
fn render_suggestions(frame: &mut Frame, app: &App, inner: Rect) {
    let suggestions = app.visible_suggestions();
    if !app.search.active || suggestions.is_empty() {
        return;
    }
    let height = (suggestions.len() as u16).min(inner.height);
    let width = suggestions
        .iter()
        .map(|s| s.description.chars().count() as u16 + 2)
        .max()
        .unwrap_or(0)
        .min(inner.width);
    let area = Rect::new(inner.x, inner.y, width, height);

    let items: Vec<ListItem> = suggestions
        .iter()
        .map(|s| ListItem::new(format!(" {}", s.description)))
        .collect();
    let list = List::new(items)
        .style(Style::default().fg(Color::White).bg(Color::Black))
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan));
    let mut state = ListState::default().with_selected(Some(app.search.highlighted));

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let camera = app.controller.camera();
    let toggle = |on: bool, on_label: &'static str, off_label: &'static str| {
        Span::styled(
            if on { on_label } else { off_label },
            Style::default().fg(if on { Color::Green } else { Color::DarkGray }),
        )
    };

    let mut spans = vec![
        Span::styled(" Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(camera.zoom.to_string(), Style::default().fg(Color::Yellow)),
        Span::styled(" (", Style::default().fg(Color::DarkGray)),
        Span::styled(
            Lod::from_zoom(camera.zoom).label(),
            Style::default().fg(Color::Magenta),
        ),
        Span::styled(") ", Style::default().fg(Color::DarkGray)),
    ];
    if let Some(renderer) = app.renderer() {
        let settings = &renderer.settings;
        spans.push(toggle(settings.show_borders, "[B]order ", "[b]order "));
        spans.push(toggle(settings.show_pois, "[C]ities ", "[c]ities "));
        // Labels toggle on L; l pans
        spans.push(toggle(settings.show_labels, "[L]abels ", "[L]abels "));
    }
    spans.push(Span::styled("| ", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(
        format!("{} markers ", app.markers.len()),
        Style::default().fg(Color::Red),
    ));
    spans.push(Span::styled("| ", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(
        app.controller.center_coords(),
        Style::default().fg(Color::Cyan),
    ));
    match app.note() {
        Some(note) => spans.push(Span::styled(
            format!(" | {note}"),
            Style::default().fg(Color::LightRed),
        )),
        None => spans.push(Span::styled(
            " | click:add right-click:delete g:locate u:refresh r:reset q:quit",
            Style::default().fg(Color::DarkGray),
        )),
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

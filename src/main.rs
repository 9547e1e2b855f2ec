use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use ratatui::layout::Rect;
use ratatui::DefaultTerminal;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use marker_map::api::HttpMarkerApi;
use marker_map::app::{App, Command, Message, Surface};
use marker_map::config::Config;
use marker_map::dispatch::{Dispatcher, Services};
use marker_map::locate::{ChainedGeolocator, FixedGeolocator, Geolocator, IpGeolocator};
use marker_map::places::{GooglePlacesClient, PlacesClient};
use marker_map::ui;

fn main() -> Result<()> {
    // Config and logging come up before the terminal is taken over
    let config = Config::from_env()?;
    init_tracing(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let services = build_services(&config)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(
        runtime.handle().clone(),
        services,
        tx,
        config.data_dir.clone(),
        config.data_dir_explicit,
    );
    let mut app = App::new(&config);

    tracing::info!(api = %config.api_url, search = config.search_enabled(), "starting marker-map");

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, &mut app, &dispatcher, rx);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    // In-flight requests are abandoned; their replies have nowhere to go
    runtime.shutdown_timeout(Duration::from_millis(200));
    tracing::info!("exiting");

    result
}

fn init_tracing(config: &Config) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let file = File::create(&config.log_file)
        .with_context(|| format!("failed to open log file {}", config.log_file.display()))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,marker_map=info".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(Arc::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn build_services(config: &Config) -> Result<Services> {
    let markers = HttpMarkerApi::new(&config.api_url, config.http_timeout)
        .with_context(|| format!("invalid MARKER_MAP_API_URL {}", config.api_url))?;

    let places = match &config.places_api_key {
        Some(key) => {
            let client = GooglePlacesClient::new(
                &config.places_url,
                key.clone(),
                config.search_bias,
                config.http_timeout,
            )
            .with_context(|| format!("invalid MARKER_MAP_PLACES_URL {}", config.places_url))?;
            Some(Arc::new(client) as Arc<dyn PlacesClient>)
        }
        None => {
            tracing::warn!("no places API key configured; search disabled");
            None
        }
    };

    let mut sources: Vec<Box<dyn Geolocator>> = Vec::new();
    if config.fixed_location.is_some() {
        sources.push(Box::new(FixedGeolocator::new(config.fixed_location)));
    }
    sources.push(Box::new(IpGeolocator::new(
        config.locate_url.clone(),
        config.http_timeout,
    )?));

    Ok(Services {
        markers: Arc::new(markers),
        places,
        locator: Arc::new(ChainedGeolocator::new(sources)),
    })
}

/// Keys while the search box has focus
fn handle_search_key(app: &mut App, key: KeyEvent) -> Option<Command> {
    match key.code {
        KeyCode::Esc => {
            app.close_search();
            None
        }
        KeyCode::Enter => app.select_highlighted(),
        KeyCode::Down | KeyCode::Tab => {
            app.highlight_next();
            None
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.highlight_prev();
            None
        }
        KeyCode::Backspace => app.search_pop(),
        KeyCode::Char(c) => app.search_push(c),
        _ => None,
    }
}

fn handle_map_key(app: &mut App, key: KeyEvent) -> Option<Command> {
    // The error screen only lets the user leave
    if let Surface::Failed(_) = app.surface {
        if key.code == KeyCode::Char('q') {
            app.quit();
        }
        return None;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Esc => app.close_popup(),

        KeyCode::Char('/') => app.open_search(),
        KeyCode::Char('g') => return app.locate(),
        KeyCode::Char('d') | KeyCode::Delete => return app.delete_selected(),
        KeyCode::Char('u') => return Some(app.refresh_markers()),
        KeyCode::Char('r') | KeyCode::Char('0') => return Some(app.reset()),

        // Pan with hjkl or arrow keys
        KeyCode::Left | KeyCode::Char('h') => app.controller.pan(-10, 0),
        KeyCode::Right | KeyCode::Char('l') => app.controller.pan(10, 0),
        KeyCode::Up | KeyCode::Char('k') => app.controller.pan(0, -6),
        KeyCode::Down | KeyCode::Char('j') => app.controller.pan(0, 6),

        // Zoom
        KeyCode::Char('+') | KeyCode::Char('=') => app.controller.zoom_in(),
        KeyCode::Char('-') | KeyCode::Char('_') => app.controller.zoom_out(),

        // Layer toggles
        KeyCode::Char('b') | KeyCode::Char('B') => {
            if let Some(renderer) = app.renderer_mut() {
                renderer.toggle_borders();
            }
        }
        KeyCode::Char('c') | KeyCode::Char('C') => {
            if let Some(renderer) = app.renderer_mut() {
                renderer.toggle_pois();
            }
        }
        KeyCode::Char('L') => {
            if let Some(renderer) = app.renderer_mut() {
                renderer.toggle_labels();
            }
        }
        _ => {}
    }
    None
}

/// Handle mouse events for markers, panning and zooming
fn handle_mouse(app: &mut App, mouse: MouseEvent, map: Rect) -> Option<Command> {
    // Always track mouse position for cursor marker
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        // Scroll wheel for zooming towards mouse position
        MouseEventKind::ScrollUp => app.controller.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.controller.zoom_out_at(mouse.column, mouse.row),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.controller.pan(-15, 0),
        MouseEventKind::ScrollRight => app.controller.pan(15, 0),
        MouseEventKind::Down(MouseButton::Left) => {
            if app.search.active {
                // Suggestions are drawn over the top rows of the map
                let row = mouse.row.checked_sub(map.y).map(usize::from);
                return app.click_search(row);
            }
            app.press(mouse.column, mouse.row);
        }
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => {
            return app.release(mouse.column, mouse.row, Utc::now());
        }
        MouseEventKind::Down(MouseButton::Right) => {
            return app.right_click_map(mouse.column, mouse.row);
        }
        _ => {}
    }
    None
}

fn run(
    terminal: &mut DefaultTerminal,
    app: &mut App,
    dispatcher: &Dispatcher,
    mut rx: UnboundedReceiver<Message>,
) -> Result<()> {
    dispatcher.dispatch_all(app.start());

    // Main loop
    loop {
        let size = terminal.size()?;
        let map = ui::map_area(Rect::new(0, 0, size.width, size.height));
        app.controller
            .resize_surface((map.x, map.y), map.width, map.height);

        // Draw
        terminal.draw(|frame| ui::render(frame, app, Utc::now()))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            let command = match event::read()? {
                // Only handle key press events (not release)
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.search.active {
                        handle_search_key(app, key)
                    } else {
                        handle_map_key(app, key)
                    }
                }
                Event::Mouse(mouse) => handle_mouse(app, mouse, map),
                _ => None,
            };
            dispatcher.dispatch_all(command);
        }

        // Apply whatever finished since the last frame
        while let Ok(message) = rx.try_recv() {
            app.update(message);
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::api::ApiError;
use crate::config::Config;
use crate::geo::LatLng;
use crate::locate::LocateError;
use crate::map::{Camera, MapController, MapRenderer};
use crate::marker::{Marker, MarkerId, MarkerStore, NewMarker};
use crate::places::{PlacesError, Suggestion, Suggestions};
use crate::tickets::{RequestKind, RequestTickets, Ticket};
use crate::timefmt::TimeDisplay;

/// How long a status-bar note stays up
const NOTE_TTL: Duration = Duration::from_secs(4);

/// Popup lists the nearest place within this distance
const NEAREST_POI_KM: f64 = 100.0;

/// Remote work requested by the shell
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadMap,
    ListMarkers { ticket: Ticket },
    CreateMarker { ticket: Ticket, marker: NewMarker },
    DeleteMarker { ticket: Ticket, id: MarkerId },
    Autocomplete { ticket: Ticket, input: String },
    Geocode { ticket: Ticket, address: String },
    Locate { ticket: Ticket },
}

/// Results of remote work, fed back into `App::update`
#[derive(Debug)]
pub enum Message {
    MapLoaded(Result<MapRenderer, String>),
    MarkersListed {
        ticket: Ticket,
        result: Result<Vec<Marker>, ApiError>,
    },
    MarkerCreated {
        ticket: Ticket,
        result: Result<Marker, ApiError>,
    },
    MarkerDeleted {
        ticket: Ticket,
        id: MarkerId,
        result: Result<(), ApiError>,
    },
    Suggestions {
        ticket: Ticket,
        result: Result<Suggestions, PlacesError>,
    },
    Geocoded {
        ticket: Ticket,
        address: String,
        result: Result<LatLng, PlacesError>,
    },
    Located {
        ticket: Ticket,
        result: Result<LatLng, LocateError>,
    },
}

impl Message {
    fn ticket(&self) -> Option<Ticket> {
        match self {
            Message::MapLoaded(_) => None,
            Message::MarkersListed { ticket, .. }
            | Message::MarkerCreated { ticket, .. }
            | Message::MarkerDeleted { ticket, .. }
            | Message::Suggestions { ticket, .. }
            | Message::Geocoded { ticket, .. }
            | Message::Located { ticket, .. } => Some(*ticket),
        }
    }
}

/// A mutation confirmed by the backend
#[derive(Debug, Clone)]
enum MarkerEdit {
    Created(Marker),
    Deleted(MarkerId),
}

/// The rendering surface's lifecycle
pub enum Surface {
    Loading,
    Ready(MapRenderer),
    Failed(String),
}

/// Search box state
#[derive(Debug)]
pub struct SearchState {
    /// Keystrokes go to the search box
    pub active: bool,
    pub value: String,
    pub suggestions: Suggestions,
    pub highlighted: usize,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            active: false,
            value: String::new(),
            suggestions: Suggestions::empty(),
            highlighted: 0,
        }
    }
}

/// What the info popup shows for the selected marker
#[derive(Debug, Clone, PartialEq)]
pub struct PopupInfo {
    pub id: MarkerId,
    pub position: LatLng,
    pub reported: String,
    /// Nearest place name and distance in km
    pub nearest: Option<(String, f64)>,
}

/// Application state
pub struct App {
    pub controller: MapController,
    pub surface: Surface,
    pub markers: MarkerStore,
    pub selected: Option<MarkerId>,
    pub user_location: Option<LatLng>,
    pub search: SearchState,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    dragged: bool,
    tickets: RequestTickets,
    /// Edits confirmed while a list request is in flight, replayed over its result
    unlisted_edits: Option<Vec<MarkerEdit>>,
    note: Option<(String, Instant)>,
    time_display: TimeDisplay,
    max_suggestions: usize,
    pub user_radius_m: f64,
    search_enabled: bool,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let initial = Camera {
            center: config.initial_center,
            zoom: config.initial_zoom,
        };
        Self {
            controller: MapController::new(initial, config.move_to_zoom),
            surface: Surface::Loading,
            markers: MarkerStore::new(),
            selected: None,
            user_location: None,
            search: SearchState::default(),
            should_quit: false,
            last_mouse: None,
            mouse_pos: None,
            dragged: false,
            tickets: RequestTickets::new(),
            unlisted_edits: None,
            note: None,
            time_display: config.time_display,
            max_suggestions: config.max_suggestions,
            user_radius_m: config.user_radius_m,
            search_enabled: config.search_enabled(),
        }
    }

    /// Work to kick off at startup
    pub fn start(&mut self) -> Vec<Command> {
        vec![Command::LoadMap, self.refresh_markers()]
    }

    pub fn renderer(&self) -> Option<&MapRenderer> {
        match &self.surface {
            Surface::Ready(renderer) => Some(renderer),
            _ => None,
        }
    }

    pub fn renderer_mut(&mut self) -> Option<&mut MapRenderer> {
        match &mut self.surface {
            Surface::Ready(renderer) => Some(renderer),
            _ => None,
        }
    }

    /// Search is usable once the map is up and a places key exists
    pub fn search_ready(&self) -> bool {
        self.search_enabled && self.controller.is_loaded()
    }

    pub fn locate_ready(&self) -> bool {
        self.controller.is_loaded()
    }

    /// Current status-bar note, if it hasn't expired
    pub fn note(&self) -> Option<&str> {
        self.note
            .as_ref()
            .filter(|(_, at)| at.elapsed() < NOTE_TTL)
            .map(|(text, _)| text.as_str())
    }

    fn set_note(&mut self, text: impl Into<String>) {
        self.note = Some((text.into(), Instant::now()));
    }

    /// Apply a response from the dispatcher
    pub fn update(&mut self, message: Message) {
        if let Some(ticket) = message.ticket() {
            if !self.tickets.is_current(ticket) {
                tracing::debug!(kind = ?ticket.kind, "dropping stale response");
                return;
            }
        }

        match message {
            Message::MapLoaded(Ok(renderer)) => {
                self.surface = Surface::Ready(renderer);
                self.controller.mark_loaded();
            }
            Message::MapLoaded(Err(err)) => {
                tracing::error!(error = %err, "map surface failed to load");
                self.surface = Surface::Failed(err);
            }
            Message::MarkersListed { result, .. } => match result {
                Ok(markers) => {
                    tracing::info!(count = markers.len(), "markers listed");
                    self.markers.replace_all(markers);
                    for edit in self.unlisted_edits.take().unwrap_or_default() {
                        match edit {
                            MarkerEdit::Created(marker) => self.markers.insert(marker),
                            MarkerEdit::Deleted(id) => {
                                self.markers.remove(&id);
                            }
                        }
                    }
                    if self
                        .selected
                        .as_ref()
                        .is_some_and(|id| !self.markers.contains(id))
                    {
                        self.selected = None;
                    }
                }
                Err(err) => {
                    self.unlisted_edits = None;
                    tracing::warn!(error = %err, "listing markers failed");
                    self.set_note("Couldn't load markers (u to retry)");
                }
            },
            Message::MarkerCreated { result, .. } => match result {
                Ok(marker) => {
                    tracing::info!(id = %marker.id, lat = marker.lat, lng = marker.lng, "marker created");
                    self.record_edit(MarkerEdit::Created(marker.clone()));
                    self.markers.insert(marker);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "creating marker failed");
                    self.set_note("Couldn't save marker");
                }
            },
            Message::MarkerDeleted { id, result, .. } => match result {
                Ok(()) => {
                    tracing::info!(id = %id, "marker deleted");
                    self.record_edit(MarkerEdit::Deleted(id.clone()));
                    self.markers.remove(&id);
                    if self.selected.as_ref() == Some(&id) {
                        self.selected = None;
                    }
                }
                Err(err) => {
                    tracing::warn!(id = %id, error = %err, "deleting marker failed");
                    self.set_note("Couldn't delete marker");
                }
            },
            Message::Suggestions { result, .. } => match result {
                Ok(suggestions) => {
                    self.search.suggestions = suggestions;
                    self.search.highlighted = 0;
                }
                Err(err) => {
                    tracing::debug!(error = %err, "autocomplete failed");
                    self.search.suggestions = Suggestions::empty();
                }
            },
            Message::Geocoded { address, result, .. } => match result {
                Ok(point) => self.move_to(point),
                Err(err) => tracing::warn!(address = %address, error = %err, "geocoding failed"),
            },
            Message::Located { result, .. } => match result {
                Ok(point) => {
                    self.move_to(point);
                    self.user_location = Some(point);
                }
                // Denied or unavailable: nothing to do
                Err(err) => tracing::debug!(error = %err, "locate failed"),
            },
        }
    }

    fn record_edit(&mut self, edit: MarkerEdit) {
        if let Some(edits) = self.unlisted_edits.as_mut() {
            edits.push(edit);
        }
    }

    fn move_to(&mut self, point: LatLng) {
        if let Err(err) = self.controller.move_to(point) {
            tracing::debug!(error = %err, "move ignored");
        }
    }

    /// Re-fetch the marker list (no automatic retry exists)
    pub fn refresh_markers(&mut self) -> Command {
        // A newer list supersedes the pending one and sees every edit confirmed so far
        self.unlisted_edits = Some(Vec::new());
        Command::ListMarkers {
            ticket: self.tickets.issue(RequestKind::List),
        }
    }

    /// Ask the backend to create a marker at a coordinate
    pub fn add_marker_at(&mut self, point: LatLng, now: DateTime<Utc>) -> Option<Command> {
        match NewMarker::new(point, now) {
            Ok(marker) => Some(Command::CreateMarker {
                ticket: self.tickets.issue(RequestKind::Create),
                marker,
            }),
            Err(err) => {
                tracing::debug!(error = %err, "click outside the map");
                None
            }
        }
    }

    /// Ask the backend to delete a marker; the mirror changes on success only
    pub fn delete_marker(&mut self, id: MarkerId) -> Command {
        Command::DeleteMarker {
            ticket: self.tickets.issue(RequestKind::Delete),
            id,
        }
    }

    pub fn delete_selected(&mut self) -> Option<Command> {
        let id = self.selected.clone()?;
        Some(self.delete_marker(id))
    }

    /// Select a marker to show its popup
    pub fn select_marker(&mut self, id: &MarkerId) {
        if self.markers.contains(id) {
            self.selected = Some(id.clone());
        }
    }

    pub fn close_popup(&mut self) {
        self.selected = None;
    }

    /// Left click on the map: select the marker under the cursor or drop a new one
    pub fn click_map(&mut self, col: u16, row: u16, now: DateTime<Utc>) -> Option<Command> {
        if !self.controller.is_loaded() || !self.controller.contains_cell(col, row) {
            return None;
        }
        let hit = self
            .controller
            .marker_at(self.markers.iter(), col, row)
            .map(|m| m.id.clone());
        if let Some(id) = hit {
            self.select_marker(&id);
            return None;
        }
        let point = self.controller.unproject_cell(col, row);
        self.add_marker_at(point, now)
    }

    /// Right click on the map: delete the marker under the cursor
    pub fn right_click_map(&mut self, col: u16, row: u16) -> Option<Command> {
        if !self.controller.is_loaded() {
            return None;
        }
        let id = self
            .controller
            .marker_at(self.markers.iter(), col, row)
            .map(|m| m.id.clone())?;
        Some(self.delete_marker(id))
    }

    /// Mouse button down starts a potential drag
    pub fn press(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
        self.dragged = false;
    }

    /// Handle mouse drag: pan by the distance moved
    pub fn handle_drag(&mut self, col: u16, row: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = i32::from(last_x) - i32::from(col);
            let dy = i32::from(last_y) - i32::from(row);
            if dx != 0 || dy != 0 {
                self.dragged = true;
                // Terminal cells are 2x4 braille pixels
                self.controller.pan(dx * 2, dy * 4);
            }
        }
        self.last_mouse = Some((col, row));
    }

    /// Mouse button up: a press without drag is a click
    pub fn release(&mut self, col: u16, row: u16, now: DateTime<Utc>) -> Option<Command> {
        let was_press = self.last_mouse.take().is_some();
        if was_press && !std::mem::take(&mut self.dragged) {
            self.click_map(col, row, now)
        } else {
            None
        }
    }

    /// Update mouse cursor position
    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }

    /// Request the current position; ignored until the map is loaded
    pub fn locate(&mut self) -> Option<Command> {
        if !self.locate_ready() {
            return None;
        }
        Some(Command::Locate {
            ticket: self.tickets.issue(RequestKind::Locate),
        })
    }

    pub fn open_search(&mut self) {
        if self.search_ready() {
            self.search.active = true;
        }
    }

    pub fn close_search(&mut self) {
        self.search.active = false;
        self.clear_suggestions();
    }

    fn clear_suggestions(&mut self) {
        self.search.suggestions = Suggestions::empty();
        self.search.highlighted = 0;
        self.tickets.invalidate(RequestKind::Search);
    }

    /// Replace the search text and fetch fresh suggestions
    pub fn set_search_value(&mut self, value: String) -> Option<Command> {
        self.search.value = value;
        if self.search.value.trim().is_empty() {
            self.clear_suggestions();
            return None;
        }
        Some(Command::Autocomplete {
            ticket: self.tickets.issue(RequestKind::Search),
            input: self.search.value.clone(),
        })
    }

    pub fn search_push(&mut self, ch: char) -> Option<Command> {
        let mut value = self.search.value.clone();
        value.push(ch);
        self.set_search_value(value)
    }

    pub fn search_pop(&mut self) -> Option<Command> {
        let mut value = self.search.value.clone();
        value.pop();
        self.set_search_value(value)
    }

    /// Suggestions the search box shows
    pub fn visible_suggestions(&self) -> &[Suggestion] {
        self.search.suggestions.visible(self.max_suggestions)
    }

    pub fn highlight_next(&mut self) {
        let n = self.visible_suggestions().len();
        if n > 0 {
            self.search.highlighted = (self.search.highlighted + 1) % n;
        }
    }

    pub fn highlight_prev(&mut self) {
        let n = self.visible_suggestions().len();
        if n > 0 {
            self.search.highlighted = (self.search.highlighted + n - 1) % n;
        }
    }

    /// Pick a suggestion. The box shows the choice and the list is cleared
    /// before geocoding is requested.
    pub fn select_suggestion(&mut self, index: usize) -> Option<Command> {
        let address = self.visible_suggestions().get(index)?.description.clone();
        self.search.value = address.clone();
        self.search.active = false;
        self.clear_suggestions();
        Some(Command::Geocode {
            ticket: self.tickets.issue(RequestKind::Geocode),
            address,
        })
    }

    pub fn select_highlighted(&mut self) -> Option<Command> {
        self.select_suggestion(self.search.highlighted)
    }

    /// A click while searching picks the suggestion on `row`, or leaves
    /// search. Either way the click is spent and never reaches the map.
    pub fn click_search(&mut self, row: Option<usize>) -> Option<Command> {
        self.last_mouse = None;
        self.dragged = false;
        match row.filter(|row| *row < self.visible_suggestions().len()) {
            Some(row) => self.select_suggestion(row),
            None => {
                self.close_search();
                None
            }
        }
    }

    /// Popup content for the selected marker
    pub fn popup(&self, now: DateTime<Utc>) -> Option<PopupInfo> {
        let marker = self.markers.get(self.selected.as_ref()?)?;
        let nearest = self.renderer().and_then(|r| {
            r.nearest_poi(marker.position(), NEAREST_POI_KM)
                .map(|(poi, km)| (poi.name.clone(), km))
        });
        Some(PopupInfo {
            id: marker.id.clone(),
            position: marker.position(),
            reported: self.time_display.format(marker.time, now),
            nearest,
        })
    }

    /// Drop in-flight results; nothing that returns later is applied
    pub fn teardown(&mut self) {
        self.tickets.teardown();
        self.unlisted_edits = None;
    }

    /// Start over as if freshly opened; the loaded map is kept
    pub fn reset(&mut self) -> Command {
        self.teardown();
        self.controller.reset();
        self.markers = MarkerStore::new();
        self.selected = None;
        self.user_location = None;
        self.search = SearchState::default();
        self.last_mouse = None;
        self.dragged = false;
        self.refresh_markers()
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.teardown();
        self.should_quit = true;
    }
}

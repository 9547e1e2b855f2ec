//! Runs `Command`s on the tokio runtime and reports back as `Message`s.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;

use crate::api::MarkerApi;
use crate::app::{Command, Message};
use crate::data;
use crate::locate::Geolocator;
use crate::places::{self, PlacesClient};

/// Remote collaborators behind their traits
#[derive(Clone)]
pub struct Services {
    pub markers: Arc<dyn MarkerApi>,
    /// Absent when no places key is configured
    pub places: Option<Arc<dyn PlacesClient>>,
    pub locator: Arc<dyn Geolocator>,
}

pub struct Dispatcher {
    handle: Handle,
    services: Services,
    tx: UnboundedSender<Message>,
    data_dir: PathBuf,
    data_dir_explicit: bool,
}

impl Dispatcher {
    pub fn new(
        handle: Handle,
        services: Services,
        tx: UnboundedSender<Message>,
        data_dir: PathBuf,
        data_dir_explicit: bool,
    ) -> Self {
        Self {
            handle,
            services,
            tx,
            data_dir,
            data_dir_explicit,
        }
    }

    pub fn dispatch_all(&self, commands: impl IntoIterator<Item = Command>) {
        for command in commands {
            self.dispatch(command);
        }
    }

    /// Spawn the work for one command. The reply is dropped if the UI has gone away.
    pub fn dispatch(&self, command: Command) {
        let tx = self.tx.clone();
        match command {
            Command::LoadMap => {
                let dir = self.data_dir.clone();
                let explicit = self.data_dir_explicit;
                self.handle.spawn(async move {
                    let result = tokio::task::spawn_blocking(move || data::load_map(&dir, explicit))
                        .await
                        .map_err(|e| format!("map loader panicked: {e}"))
                        .and_then(|r| r.map_err(|e| format!("{e:#}")));
                    let _ = tx.send(Message::MapLoaded(result));
                });
            }
            Command::ListMarkers { ticket } => {
                let api = Arc::clone(&self.services.markers);
                self.handle.spawn(async move {
                    let result = api.list_markers().await;
                    let _ = tx.send(Message::MarkersListed { ticket, result });
                });
            }
            Command::CreateMarker { ticket, marker } => {
                let api = Arc::clone(&self.services.markers);
                self.handle.spawn(async move {
                    let result = api.create_marker(&marker).await;
                    let _ = tx.send(Message::MarkerCreated { ticket, result });
                });
            }
            Command::DeleteMarker { ticket, id } => {
                let api = Arc::clone(&self.services.markers);
                self.handle.spawn(async move {
                    let result = api.delete_marker(&id).await;
                    let _ = tx.send(Message::MarkerDeleted { ticket, id, result });
                });
            }
            Command::Autocomplete { ticket, input } => {
                let Some(client) = self.services.places.clone() else {
                    tracing::debug!("autocomplete requested without a places client");
                    return;
                };
                self.handle.spawn(async move {
                    let result = client.autocomplete(&input).await;
                    let _ = tx.send(Message::Suggestions { ticket, result });
                });
            }
            Command::Geocode { ticket, address } => {
                let Some(client) = self.services.places.clone() else {
                    tracing::debug!("geocode requested without a places client");
                    return;
                };
                self.handle.spawn(async move {
                    let result = places::resolve_address(client.as_ref(), &address).await;
                    let _ = tx.send(Message::Geocoded {
                        ticket,
                        address,
                        result,
                    });
                });
            }
            Command::Locate { ticket } => {
                let locator = Arc::clone(&self.services.locator);
                self.handle.spawn(async move {
                    let result = locator.current_position().await;
                    let _ = tx.send(Message::Located { ticket, result });
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::geo::LatLng;
    use crate::locate::FixedGeolocator;
    use crate::marker::{Marker, MarkerId, NewMarker};
    use crate::places::{GeocodeResult, Geometry, PlacesError, Suggestion, Suggestions};
    use crate::tickets::{RequestKind, RequestTickets};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct MemoryApi {
        markers: Mutex<Vec<Marker>>,
    }

    #[async_trait]
    impl MarkerApi for MemoryApi {
        async fn list_markers(&self) -> Result<Vec<Marker>, ApiError> {
            Ok(self.markers.lock().unwrap().clone())
        }

        async fn create_marker(&self, marker: &NewMarker) -> Result<Marker, ApiError> {
            let mut markers = self.markers.lock().unwrap();
            let created = Marker {
                id: MarkerId::Int(markers.len() as u64 + 1),
                lat: marker.lat,
                lng: marker.lng,
                time: marker.time,
            };
            markers.push(created.clone());
            Ok(created)
        }

        async fn delete_marker(&self, id: &MarkerId) -> Result<(), ApiError> {
            self.markers.lock().unwrap().retain(|m| &m.id != id);
            Ok(())
        }
    }

    struct OnePlace;

    #[async_trait]
    impl PlacesClient for OnePlace {
        async fn autocomplete(&self, input: &str) -> Result<Suggestions, PlacesError> {
            Ok(Suggestions {
                status: "OK".into(),
                data: vec![Suggestion {
                    place_id: "p1".into(),
                    description: format!("{input}, ON"),
                }],
            })
        }

        async fn geocode(&self, address: &str) -> Result<Vec<GeocodeResult>, PlacesError> {
            Ok(vec![GeocodeResult {
                formatted_address: address.to_string(),
                geometry: Geometry {
                    location: LatLng::new(43.65, -79.38),
                },
            }])
        }
    }

    fn dispatcher(places: bool) -> (Dispatcher, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let services = Services {
            markers: Arc::new(MemoryApi::default()),
            places: places.then(|| Arc::new(OnePlace) as Arc<dyn PlacesClient>),
            locator: Arc::new(FixedGeolocator::new(None)),
        };
        let dispatcher = Dispatcher::new(
            Handle::current(),
            services,
            tx,
            PathBuf::from("no-such-data-dir"),
            false,
        );
        (dispatcher, rx)
    }

    #[tokio::test]
    async fn test_create_then_list_round_trips() {
        let (dispatcher, mut rx) = dispatcher(false);
        let mut tickets = RequestTickets::new();
        let marker = NewMarker::new(LatLng::new(43.0, -80.0), Utc::now()).unwrap();
        dispatcher.dispatch(Command::CreateMarker {
            ticket: tickets.issue(RequestKind::Create),
            marker,
        });
        let Some(Message::MarkerCreated { result, .. }) = rx.recv().await else {
            panic!("expected created");
        };
        assert_eq!(result.unwrap().id, MarkerId::Int(1));

        let ticket = tickets.issue(RequestKind::List);
        dispatcher.dispatch(Command::ListMarkers { ticket });
        let Some(Message::MarkersListed { ticket: got, result }) = rx.recv().await else {
            panic!("expected list");
        };
        assert_eq!(got, ticket);
        assert_eq!(result.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_geocode_resolves_first_result() {
        let (dispatcher, mut rx) = dispatcher(true);
        let mut tickets = RequestTickets::new();
        dispatcher.dispatch(Command::Geocode {
            ticket: tickets.issue(RequestKind::Geocode),
            address: "Toronto".into(),
        });
        let Some(Message::Geocoded { result, address, .. }) = rx.recv().await else {
            panic!("expected geocode");
        };
        assert_eq!(address, "Toronto");
        assert_eq!(result.unwrap(), LatLng::new(43.65, -79.38));
    }

    #[tokio::test]
    async fn test_search_without_places_client_is_dropped() {
        let (dispatcher, mut rx) = dispatcher(false);
        let mut tickets = RequestTickets::new();
        dispatcher.dispatch(Command::Autocomplete {
            ticket: tickets.issue(RequestKind::Search),
            input: "Tor".into(),
        });
        dispatcher.dispatch(Command::Locate {
            ticket: tickets.issue(RequestKind::Locate),
        });
        // Only the locate reply arrives
        let Some(Message::Located { result, .. }) = rx.recv().await else {
            panic!("expected locate");
        };
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_map_falls_back_to_builtin_outlines() {
        let (dispatcher, mut rx) = dispatcher(false);
        dispatcher.dispatch(Command::LoadMap);
        let Some(Message::MapLoaded(result)) = rx.recv().await else {
            panic!("expected map");
        };
        assert!(result.unwrap().has_data());
    }
}

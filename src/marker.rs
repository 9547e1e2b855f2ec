//! Markers and the in-memory mirror of the backend's marker list.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::LatLng;

/// Backend-assigned marker id. Backends hand out either integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkerId {
    Int(u64),
    Str(String),
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerId::Int(id) => write!(f, "{id}"),
            MarkerId::Str(id) => f.write_str(id),
        }
    }
}

impl From<u64> for MarkerId {
    fn from(id: u64) -> Self {
        MarkerId::Int(id)
    }
}

impl From<&str> for MarkerId {
    fn from(id: &str) -> Self {
        MarkerId::Str(id.to_string())
    }
}

/// A user-placed point with its creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub lat: f64,
    pub lng: f64,
    pub time: DateTime<Utc>,
}

impl Marker {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// Body of a create request; the backend assigns the id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMarker {
    pub lat: f64,
    pub lng: f64,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq)]
pub enum MarkerError {
    #[error("coordinate out of range: lat {lat}, lng {lng}")]
    OutOfRange { lat: f64, lng: f64 },
}

impl NewMarker {
    pub fn new(position: LatLng, time: DateTime<Utc>) -> Result<Self, MarkerError> {
        if !position.is_valid() {
            return Err(MarkerError::OutOfRange {
                lat: position.lat,
                lng: position.lng,
            });
        }
        Ok(Self {
            lat: position.lat,
            lng: position.lng,
            time,
        })
    }
}

/// Local mirror of the markers the backend has confirmed.
/// Ids are unique; order is the order confirmations arrived in.
#[derive(Debug, Default, Clone)]
pub struct MarkerStore {
    markers: Vec<Marker>,
}

impl MarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list with a fresh listing (later duplicates win)
    pub fn replace_all(&mut self, markers: Vec<Marker>) {
        self.markers.clear();
        for marker in markers {
            self.insert(marker);
        }
    }

    /// Append a confirmed marker. An id already present is replaced in place.
    pub fn insert(&mut self, marker: Marker) {
        match self.markers.iter_mut().find(|m| m.id == marker.id) {
            Some(existing) => *existing = marker,
            None => self.markers.push(marker),
        }
    }

    /// Remove a marker by id, returning it if it was present
    pub fn remove(&mut self, id: &MarkerId) -> Option<Marker> {
        let idx = self.markers.iter().position(|m| &m.id == id)?;
        Some(self.markers.remove(idx))
    }

    pub fn get(&self, id: &MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|m| &m.id == id)
    }

    pub fn contains(&self, id: &MarkerId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn marker(id: u64, lat: f64, lng: f64) -> Marker {
        Marker {
            id: MarkerId::Int(id),
            lat,
            lng,
            time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_marker_id_accepts_int_and_string() {
        let m: Marker =
            serde_json::from_str(r#"{"id":5,"lat":43.0,"lng":-80.0,"time":"2024-05-01T12:00:00.000Z"}"#)
                .unwrap();
        assert_eq!(m.id, MarkerId::Int(5));

        let m: Marker =
            serde_json::from_str(r#"{"id":"a1b2","lat":43.0,"lng":-80.0,"time":"2024-05-01T12:00:00Z"}"#)
                .unwrap();
        assert_eq!(m.id, MarkerId::Str("a1b2".into()));
        assert_eq!(m.id.to_string(), "a1b2");
    }

    #[test]
    fn test_new_marker_body_has_no_id() {
        let body = NewMarker::new(LatLng::new(43.0, -80.0), Utc::now()).unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["lat"], 43.0);
        assert_eq!(json["lng"], -80.0);
        assert!(json["time"].is_string());
    }

    #[test]
    fn test_new_marker_rejects_out_of_range() {
        let err = NewMarker::new(LatLng::new(95.0, 0.0), Utc::now()).unwrap_err();
        assert_eq!(err, MarkerError::OutOfRange { lat: 95.0, lng: 0.0 });
        assert!(NewMarker::new(LatLng::new(0.0, -181.0), Utc::now()).is_err());
    }

    #[test]
    fn test_store_keeps_ids_unique() {
        let mut store = MarkerStore::new();
        store.insert(marker(1, 1.0, 1.0));
        store.insert(marker(2, 2.0, 2.0));
        store.insert(marker(1, 3.0, 3.0));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&MarkerId::Int(1)).unwrap().lat, 3.0);
    }

    #[test]
    fn test_store_remove() {
        let mut store = MarkerStore::new();
        store.replace_all(vec![marker(1, 1.0, 1.0), marker(5, 2.0, 2.0)]);
        assert!(store.remove(&MarkerId::Int(5)).is_some());
        assert!(!store.contains(&MarkerId::Int(5)));
        assert!(store.remove(&MarkerId::Int(5)).is_none());
        assert_eq!(store.len(), 1);
    }
}

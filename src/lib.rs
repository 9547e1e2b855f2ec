//! Terminal marker map: drop, persist and search markers on a Braille world map.

pub mod api;
pub mod app;
pub mod braille;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod geo;
pub mod locate;
pub mod map;
pub mod marker;
pub mod places;
pub mod tickets;
pub mod timefmt;
pub mod ui;

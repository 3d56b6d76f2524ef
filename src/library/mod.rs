//! Media library façade and its orchestration state.

mod item;
mod online;
mod playlists;
mod service;
mod shares;

pub use item::{MediaItem, MediaItemId};
pub use online::OnlineSystemRegistry;
pub use playlists::{Playlist, PlaylistId, PlaylistSummary};
pub use service::MediaLibrary;
pub use shares::{RelocationMode, Share, ShareId};

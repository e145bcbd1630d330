//! Wanted-list sources feeding batch acquisition

pub mod lidarr;

pub use lidarr::{LidarrClient, WantedItem, WantedRelease};

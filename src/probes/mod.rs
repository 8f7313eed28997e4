//! Concrete probes used by the service tiers
//!
//! - static_files: the UI's asset directory is complete
//! - downstream: the next tier down answers queries

pub mod downstream;
pub mod static_files;

pub use downstream::DownstreamProbe;
pub use static_files::{
    DEFAULT_ASSETS, DEFAULT_DOGS, StaticFilesProbe, default_required_files, dog_image,
};

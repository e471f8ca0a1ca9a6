//! Data loading modules

pub mod csv_loader;
pub mod json_loader;
pub mod store;

// Re-export commonly used types
pub use csv_loader::load_directory;
pub use json_loader::{parse_line_key, RaceCard};
pub use store::{MarketSource, MarketStore};

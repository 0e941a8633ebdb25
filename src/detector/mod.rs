pub mod diff;
pub mod taxonomy;

pub use diff::detect_events;
pub use taxonomy::EventTaxonomy;

use thiserror::Error;

mod range;
pub use range::*;
mod markers;
pub use markers::*;
mod line;
pub use line::*;
pub mod snap;
mod events;
pub use events::*;
mod document;
pub use document::*;
mod selection;
pub use selection::*;
mod sources;
pub use sources::*;
mod settings;
pub use settings::*;
mod controller;
pub use controller::*;

#[derive(Debug, Error)]
pub enum TimingError {
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),
    #[error("history empty: {0}")]
    HistoryEmpty(&'static str),
    #[error("invalid settings: {0}")]
    Settings(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TimingError>;

pub type Ms = i64; // time in milliseconds, negatives allowed while dragging past zero

//! Domain types for Cadence

pub mod bar;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use order::{Order, OrderSide};
pub use portfolio::{MarkBook, Portfolio, PortfolioSnapshot, PositionSnapshot};
pub use position::Position;
pub use trade::TradeRecord;

/// Asset identifier
pub type Asset = String;

//! Types library for the market-data feed handlers
//!
//! Shared vocabulary between the exchange adapters (which decode wire
//! messages) and the market-data core (which rebuilds books and candles).
//! Nothing in here knows about a specific exchange's JSON layout.
//!
//! # Modules
//! - `ids`: Identifiers (ExchangeId, MarketId, LevelId)
//! - `numeric`: Price-id formatting and lenient decimal field parsing
//! - `side`: Book side and signed-size side inference
//! - `level`: Price levels and normalized level updates
//! - `trade`: Normalized trade prints
//! - `errors`: Error taxonomy

pub mod errors;
pub mod ids;
pub mod level;
pub mod numeric;
pub mod side;
pub mod trade;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::level::*;
    pub use crate::numeric::*;
    pub use crate::side::*;
    pub use crate::trade::*;
}

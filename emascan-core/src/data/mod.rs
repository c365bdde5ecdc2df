//! Market data: price sources, the NSE provider, and instrument universes.

pub mod circuit_breaker;
pub mod memory;
pub mod nse;
pub mod provider;
pub mod universe;

pub use circuit_breaker::CircuitBreaker;
pub use memory::StaticPriceSource;
pub use nse::NseProvider;
pub use provider::{DataError, DateRange, PriceSource};
pub use universe::{FileUniverse, Nifty500Universe, StaticUniverse, UniverseProvider};

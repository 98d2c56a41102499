//! Domain types: bars, price series, orders, trades and the derived position.

pub mod bar;
pub mod ids;
pub mod order;
pub mod position;
pub mod series;
pub mod trade;

pub use bar::Bar;
pub use ids::{IdGen, OrderId, TradeId};
pub use order::{Order, OrderError, OrderRequest, FULL_EQUITY};
pub use position::Position;
pub use series::{DataError, PriceSeries, SeriesView};
pub use trade::Trade;

mod cable;
mod cable_core;
mod connection;
mod customer;
pub mod geojson;
mod node;
mod topology;

pub use self::cable::*;
pub use self::cable_core::*;
pub use self::connection::*;
pub use self::customer::*;
pub use self::geojson::{Feature, FeatureCollection};
pub use self::node::*;
pub use self::topology::*;

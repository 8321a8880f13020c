//! Graph engine over the fiber plant: core allocation, splice matrices,
//! customer path tracing and proximity search. Everything here is pure and
//! operates on snapshots loaded by the store.

pub mod cores;
pub mod geo;
pub mod splice;
pub mod trace;

pub use cores::{generate_cores, reconcile, AllocationChange};
pub use geo::{NearbyParams, NearbyQuery};
pub use splice::build_matrix;
pub use trace::{assemble, walk, HopDetails, DEFAULT_MAX_HOPS};

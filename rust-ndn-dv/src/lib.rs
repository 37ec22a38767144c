//! The rust-ndn distance-vector routing daemon.
//!
//! Routers discover each other through periodic sync Interests carrying
//! a state vector, fetch versioned advertisements when a neighbor's
//! sequence moves, recompute the routing information base and reconcile
//! the derived forwarding entries with the forwarder through management
//! commands.

pub mod advert;
pub mod config;
pub mod fib;
pub mod neighbors;
pub mod prefix_table;
pub mod rib;
pub mod router;

pub use advert::{Advertisement, AdvertEntry, StateVector, StateVectorEntry};
pub use config::{DvConfig, NeighborConfig};
pub use fib::{Fib, FibCmd};
pub use neighbors::{NeighborState, NeighborTable};
pub use prefix_table::{PrefixOp, PrefixOpList, PrefixTable};
pub use rib::{NextHop, Rib};
pub use router::DvRouter;

pub use rust_ndn_common::{Error, Result};

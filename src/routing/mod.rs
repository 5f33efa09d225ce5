//! Global routing: shortest-path tables computed centrally from full
//! topology knowledge.
//!
//! Tables are never patched. A recompute builds a whole new set and the
//! runtime swaps it in with a single assignment.

pub mod compute;
pub mod table;

pub use compute::{compute_tables, connected_routes};
pub use table::{Route, RouteOrigin, RoutingTable};

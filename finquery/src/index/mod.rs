//! Vector index access over the hosted REST API: index lifecycle on the
//! control plane, upsert/query/stats on the data plane.

mod client;

pub use client::VectorIndexClient;

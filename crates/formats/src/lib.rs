pub mod trip_chunk;

pub use trip_chunk::*;

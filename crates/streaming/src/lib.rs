pub mod chunk_key;
pub mod source;

pub use chunk_key::*;
pub use source::*;

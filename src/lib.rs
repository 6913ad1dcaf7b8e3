pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod records;
pub mod stats;
pub mod store;
pub mod transform;

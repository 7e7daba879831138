pub mod migrate;
pub mod output;

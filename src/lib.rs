pub mod cli;
pub mod config;
pub mod error;
pub mod imaging;
pub mod ingest;
pub mod key;
pub mod manifest;
pub mod store;
pub mod utils;

pub use config::Opts;
pub use error::StoreError;
pub use imaging::{PairSizes, Size};
pub use store::{AccessMode, Sample, SampleStore, SampleStoreBuilder};

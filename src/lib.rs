pub mod adaptive_cuckoo_filter;
pub mod log;

pub use adaptive_cuckoo_filter::{AdaptiveCuckooFilter, FilterError};

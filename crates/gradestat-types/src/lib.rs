pub mod error;
pub mod group_key;
pub mod record;

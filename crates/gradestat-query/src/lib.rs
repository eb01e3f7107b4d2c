//! Streaming group-by statistics over student records.
//!
//! Rows flow `csv_tokenizer -> record_decoder -> execute::Engine`, which fans
//! each decoded record out to every [`spec::AggregationSpec`]'s accumulator
//! table and finalizes them into a [`result::ResultSet`] at end of stream.

pub mod algorithms;
pub mod config;
pub mod execute;
pub mod result;
pub mod spec;

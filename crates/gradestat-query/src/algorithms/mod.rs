pub mod aggregators;
pub mod analyses;
pub mod csv_tokenizer;
pub mod csv_writer;
pub mod groupby;
pub mod json;
pub mod record_decoder;

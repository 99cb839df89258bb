pub mod association;
pub mod cif_fields;
pub mod cif_reader;
pub mod days;
pub mod error;
pub mod fetcher;
pub mod file_fetcher;
pub mod header;
pub mod journey;
pub mod json_reader;
pub mod manager;
pub mod mirror_manager;
pub mod nr_json;
pub mod parser;
pub mod schedule_data;
pub mod schedule_manager;
pub mod stp_indicator;
pub mod tiploc;
pub mod train_schedule;

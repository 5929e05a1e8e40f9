//! Configuration: defaults, validation, loading from `.env` + environment,
//! and the `printer.csv` printer selection.

pub mod app_config;
pub mod defaults;
pub mod printer_csv;
pub mod validation;

pub use app_config::AppConfig;
pub use printer_csv::PrinterCsv;

//! CSV export and terminal rendering of reading views.

mod generator;

pub use generator::{
    export_file_name, generate_comparison_table, generate_csv, generate_summary_text,
    generate_table, write_csv,
};

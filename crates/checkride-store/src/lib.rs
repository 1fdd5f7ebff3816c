//! checkride-store — session storage and question-bank loading.
//!
//! Implements the `ExamStore` trait over in-process memory and loads
//! question banks from TOML files.

pub mod bank;
pub mod memory;

pub use bank::{load_bank_directory, parse_bank, validate_bank, QuestionBank};
pub use memory::MemoryStore;

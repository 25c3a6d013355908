//! ELF Segment Alignment Validator Library.
//!
//! This library checks that the segments of a linked binary start and end on page boundaries,
//! which page-granular memory protection between compartments depends on.
//! It is organized into several modules:
//! - `config`: CLI configuration.
//! - `segment`: Program header and section mapping data model.
//! - `extract`: Header table extraction, direct or through readelf.
//! - `check`: The page alignment rule.
//! - `report`: Violation rendering and section header dumps.
//! - `validator`: Extraction and checking for one binary.

pub mod check;
pub mod config;
pub mod error;
pub mod extract;
pub mod report;
pub mod segment;
pub mod tool;
pub mod utils;
pub mod validator;

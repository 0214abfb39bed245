//! Output generation for collected articles.
//!
//! # Submodules
//!
//! - [`json`]: writes one [`Batch`](crate::models::Batch) per listing page
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! ├── techsir_com/
//! │   ├── commerce_1.json
//! │   └── mobile_2.json
//! └── v2_sohu_com/
//!     └── fashion_1.json
//! ```

pub mod json;

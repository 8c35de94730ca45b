//! PDF generation and Bates stamping.
//!
//! [`builder`] writes new documents from scratch with a hand-rolled object
//! arena and xref table. [`bates`] rewrites existing documents through
//! `lopdf`.

pub mod bates;
pub mod builder;
pub mod text;

pub use bates::{stamp, BatesCounter, BatesMode, StampResult};
pub use builder::{build_pdf, PageSize, PdfBuilder, PdfLayout};

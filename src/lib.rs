//! Page rendering through device chains.
//!
//! A chain is a terminal device (a raster renderer or a PDF writer) with
//! stages installed in front of it: a page range that keeps only selected
//! pages, and an object filter that drops vector, image or text drawing.
//! Drawing is fed in as JSON display lists.

pub mod display_list;
pub mod error;
pub mod pipeline;

pub use display_list::{DisplayList, DrawOp, replay};
pub use error::PipelineError;
pub use pipeline::{ChainBuilder, ChainConfig, ChainOutput, DeviceKind, PageChain, PageSpan};

pub use pagechain_stages::ObjectKinds;

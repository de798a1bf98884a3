//! Device chain assembly.
//!
//! - [`ChainBuilder`]: builds a terminal device with its stages from a [`ChainConfig`]
//! - [`PageChain`]: the open chain, fed from display lists and closed into a [`ChainOutput`]
//!
//! # Example
//!
//! ```ignore
//! use pagechain::{ChainBuilder, DeviceKind, DisplayList};
//!
//! let mut chain = ChainBuilder::new()
//!     .with_device(DeviceKind::Pdf)
//!     .with_page_range(1, 2)
//!     .build()?;
//! chain.replay(&DisplayList::from_file("pages.json")?)?;
//! let pdf = chain.finish()?.into_pdf();
//! ```

mod builder;
pub mod config;
mod orchestrator;

pub use builder::ChainBuilder;
pub use config::{ChainConfig, DeviceKind, PageSpan};
pub use orchestrator::{ChainOutput, PageChain};

//! A PDF-writing terminal device for pagechain device chains.
//!
//! [`PdfWriterDevice`] sits at the end of a chain and turns the drawing it
//! receives into PDF pages, sharing fonts, images and graphics states
//! through a [`ResourceRegistry`].

pub mod content;
pub mod device;
pub mod image;
pub mod resource;

pub use content::{ContentBuilder, Paint};
pub use device::{PDF_DEVICE, PdfDocument, PdfOptions, PdfOutput, PdfWriterDevice};
pub use image::PdfImageEnum;
pub use resource::{Resource, ResourceHandle, ResourceRegistry, ResourceType};

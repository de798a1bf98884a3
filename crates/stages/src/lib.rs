//! Stages that sit in front of a device and decide what reaches it.

pub mod object_filter;
pub mod page_range;

pub use object_filter::{ObjectFilter, ObjectKinds, install_object_filter};
pub use page_range::{PageCounter, PageRange, install_page_range, page_in_range, uninstall_page_range};

#![allow(dead_code)]

use lopdf::content::Content;
use lopdf::{Dictionary, Document as LopdfDocument, ObjectId};
use pagechain_device::{Device, HeapMemory};
use pagechain_pdf::{PdfOptions, PdfWriterDevice};
use std::sync::Arc;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A 100x100 point page at 72 dpi, kept in memory.
pub fn small_options() -> PdfOptions {
    PdfOptions { media_size: [100.0, 100.0], ..PdfOptions::default() }
}

pub fn writer(options: &PdfOptions) -> Device {
    PdfWriterDevice::create(options, Arc::new(HeapMemory::new())).expect("pdf writer")
}

/// A document read back from the writer's output.
pub struct GeneratedPdf {
    pub bytes: Vec<u8>,
    pub doc: LopdfDocument,
}

impl GeneratedPdf {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Box<dyn std::error::Error>> {
        let doc = LopdfDocument::load_mem(&bytes)?;
        Ok(Self { bytes, doc })
    }

    /// Closes the chain and reads back what the writer produced.
    pub fn from_device(dev: &mut Device) -> Result<Self, Box<dyn std::error::Error>> {
        dev.close()?;
        let bytes = PdfWriterDevice::take_output(dev)?.ok_or("writer kept no output")?;
        Self::from_bytes(bytes)
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    pub fn page_id(&self, number: u32) -> ObjectId {
        self.doc.get_pages()[&number]
    }

    pub fn resources(&self, number: u32) -> Result<&Dictionary, Box<dyn std::error::Error>> {
        let page = self.doc.get_object(self.page_id(number))?.as_dict()?;
        Ok(page.get(b"Resources")?.as_dict()?)
    }

    /// Names under `key` in page `number`'s resource dictionary.
    pub fn resource_names(&self, number: u32, key: &[u8]) -> Vec<String> {
        self.resources(number)
            .ok()
            .and_then(|r| r.get(key).ok())
            .and_then(|o| o.as_dict().ok())
            .map(|d| d.iter().map(|(k, _)| String::from_utf8_lossy(k).into_owned()).collect())
            .unwrap_or_default()
    }

    pub fn operators(&self, number: u32) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        let bytes = self.doc.get_page_content(self.page_id(number))?;
        let content = Content::decode(&bytes)?;
        Ok(content.operations.into_iter().map(|op| op.operator).collect())
    }
}

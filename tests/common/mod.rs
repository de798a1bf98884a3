#![allow(dead_code)]

use lopdf::Document as LopdfDocument;
use lopdf::content::Content;
use pagechain::{ChainBuilder, DisplayList, DrawOp};
use pagechain_raster::RenderedPage;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A 10x10 point page at 72 dpi.
pub fn small_chain() -> ChainBuilder {
    ChainBuilder::new().with_media_size(10.0, 10.0)
}

/// `pages` pages, page `n` carrying a 2x2 square at `(n, n)` in gray `n / 10`.
pub fn numbered_pages(pages: i32) -> DisplayList {
    let mut ops = Vec::new();
    for n in 0..pages {
        ops.push(DrawOp::FillRect { x: n, y: n, width: 2, height: 2, color: vec![n as f32 / 10.0] });
        ops.push(DrawOp::ShowPage { copies: 1 });
    }
    DisplayList { ops }
}

/// Component values of the pixel at `(x, y)`.
pub fn pixel(page: &RenderedPage, x: i32, y: i32) -> Vec<u8> {
    let ncomp = usize::from(page.num_components);
    let start = (y as usize * page.width as usize + x as usize) * ncomp;
    page.data[start..start + ncomp].to_vec()
}

pub struct GeneratedPdf {
    pub doc: LopdfDocument,
}

impl GeneratedPdf {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self { doc: LopdfDocument::load_mem(bytes)? })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    pub fn operators(&self, number: u32) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        let id = *self.doc.get_pages().get(&number).ok_or("no such page")?;
        let content = Content::decode(&self.doc.get_page_content(id)?)?;
        Ok(content.operations.into_iter().map(|op| op.operator).collect())
    }
}

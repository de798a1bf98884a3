//! The PDF writer terminal.
//!
//! Drawing is recorded as page content in device coordinates. Images, fonts,
//! graphics states and color spaces become shared resources in a
//! [`ResourceRegistry`]; each page's resource dictionary lists what that page
//! used, and page-local resources are released once the page is written.
//! The document is serialized when the device closes.

use crate::content::{ContentBuilder, Paint};
use crate::image::PdfImageEnum;
use crate::resource::{ResourceHandle, ResourceRegistry, ResourceType};
use log::{debug, info, trace};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use pagechain_device::defaults;
use pagechain_device::{
    DevSpecRequest, Device, DeviceError, DeviceId, DeviceMemory, DeviceProcs, DeviceResult, DeviceState, ImageEnum,
    DefaultTextEnum, Op, OpTable, Prototype, TextEnum,
};
use pagechain_types::geometry::fixed2float;
use pagechain_types::graphics::{
    ClipPath, ColorSpaceRef, FillParams, Font, ImageDescriptor, ImagerState, Path, StrokeParams, TextParams,
    TransparencyGroupParams,
};
use pagechain_types::{ColorIndex, ColorInfo, ColorModel, ColorValue, DeviceColor, FixedPoint, IntRect, Matrix, Rect};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

pub const PDF_DEVICE: &str = "pdfwrite";

/// Content streams draw at this level; bit 0 of a resource's use mask.
const PAGE_LEVEL: u32 = 0;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfOutput {
    /// Keep the finished document for [`PdfWriterDevice::take_output`].
    #[default]
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfOptions {
    pub color_model: ColorModel,
    /// Device pixels per inch; drawing coordinates are in these units.
    pub resolution: [f32; 2],
    /// Points.
    pub media_size: [f32; 2],
    pub output: PdfOutput,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            color_model: ColorModel::DeviceRGB,
            resolution: [72.0, 72.0],
            media_size: [612.0, 792.0],
            output: PdfOutput::Memory,
        }
    }
}

/// The writer's private data: the document being built.
#[derive(Debug)]
pub struct PdfDocument {
    output: PdfOutput,
    document: Option<Document>,
    pages_id: Option<ObjectId>,
    page_ids: Vec<ObjectId>,
    registry: ResourceRegistry,
    content: Option<ContentBuilder>,
    /// Transparency groups begun and not yet ended.
    groups: usize,
    finished: Option<Vec<u8>>,
}

impl PdfDocument {
    fn new(output: PdfOutput) -> Self {
        Self {
            output,
            document: None,
            pages_id: None,
            page_ids: Vec::new(),
            registry: ResourceRegistry::new(),
            content: None,
            groups: 0,
            finished: None,
        }
    }

    pub fn pages_written(&self) -> usize {
        self.page_ids.len()
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// The serialized document, once the device has closed.
    pub fn output(&self) -> Option<&[u8]> {
        self.finished.as_deref()
    }

    pub fn open_groups(&self) -> usize {
        self.groups
    }

    fn parts(&mut self) -> DeviceResult<(&mut Document, &mut ResourceRegistry, &mut ContentBuilder)> {
        match (self.document.as_mut(), self.content.as_mut()) {
            (Some(document), Some(content)) => Ok((document, &mut self.registry, content)),
            _ => Err(DeviceError::Structural("PDF writer used while closed".into())),
        }
    }

    fn content(&mut self) -> DeviceResult<&mut ContentBuilder> {
        Ok(self.parts()?.2)
    }

    /// Looks `rid` up; otherwise registers the body `make` builds under a
    /// fresh object number.
    fn resource(
        &mut self,
        rtype: ResourceType,
        rid: u64,
        make: impl FnOnce(&mut Document) -> Object,
    ) -> DeviceResult<ResourceHandle> {
        let (document, registry, _) = self.parts()?;
        if let Some(found) = registry.find_by_rid(rtype, rid) {
            return Ok(found);
        }
        let body = make(document);
        let id = document.new_object_id();
        Ok(registry.alloc_resource(rtype, rid, id, body))
    }

    fn use_resource(&mut self, handle: ResourceHandle) -> DeviceResult<String> {
        self.registry
            .mark_used(handle, PAGE_LEVEL)
            .ok_or_else(|| DeviceError::Structural("resource vanished from the registry".into()))
    }

    /// Registers an Image XObject, sharing an identical one already in the
    /// registry, and paints it.
    pub(crate) fn place_image(
        &mut self,
        rid: u64,
        stream: Stream,
        placement: &Matrix,
        clip: Option<&ClipPath>,
        mask_color: Option<&[ColorValue]>,
    ) -> DeviceResult<()> {
        let (document, registry, _) = self.parts()?;
        let id = document.new_object_id();
        let mut handle = registry.alloc_resource(ResourceType::XObject, rid, id, Object::Stream(stream));
        if let Some(same) = registry.find_same(handle) {
            registry.cancel_resource(handle);
            trace!("image shares XObject {id:?}'s body with an earlier one");
            handle = same;
        }
        let name = self.use_resource(handle)?;
        let content = self.content()?;
        if let Some(clip) = clip {
            content.begin_clip(clip);
        }
        if let Some(color) = mask_color {
            content.set_fill_color(color);
        }
        content.draw_xobject(&name, placement);
        if clip.is_some() {
            content.restore();
        }
        Ok(())
    }

    /// Writes the page content and the resources it used.
    fn emit_page(&mut self, media_size: [f32; 2], next: ContentBuilder) -> DeviceResult<()> {
        let pages_id = self.pages_id.ok_or_else(|| DeviceError::Structural("PDF writer has no page tree".into()))?;
        let content = self.content.replace(next).ok_or_else(|| DeviceError::Structural("no page content".into()))?;
        let document = self
            .document
            .as_mut()
            .ok_or_else(|| DeviceError::Structural("PDF writer used while closed".into()))?;
        let bytes = content.finish().encode().map_err(pdf_error)?;
        let content_id = document.add_object(Stream::new(dictionary! {}, bytes));
        for (id, body) in self.registry.take_unwritten() {
            document.objects.insert(id, body);
        }
        let resources = self.registry.store_page_resources();
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), media_size[0].into(), media_size[1].into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.page_ids.push(page_id);
        self.registry.free_page_resources();
        Ok(())
    }

    /// Finishes the page tree and serializes the document.
    fn finish(&mut self) -> DeviceResult<Vec<u8>> {
        let mut document = self
            .document
            .take()
            .ok_or_else(|| DeviceError::Structural("PDF writer closed twice".into()))?;
        let pages_id = self.pages_id.take().ok_or_else(|| DeviceError::Structural("PDF writer has no page tree".into()))?;
        for (id, body) in self.registry.take_unwritten() {
            document.objects.insert(id, body);
        }
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::from(*id)).collect();
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );
        let catalog_id = document.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        document.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        document.save_to(&mut bytes).map_err(pdf_error)?;
        Ok(bytes)
    }
}

fn pdf_error(err: impl std::fmt::Display) -> DeviceError {
    DeviceError::Pdf(err.to_string())
}

fn hash_of(value: impl Hash) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug)]
pub struct PdfWriterDevice;

impl PdfWriterDevice {
    pub fn prototype(options: &PdfOptions) -> Prototype {
        let table = OpTable::implementing(&[
            Op::OpenDevice,
            Op::OutputPage,
            Op::CloseDevice,
            Op::FillRectangle,
            Op::FillPath,
            Op::StrokePath,
            Op::BeginTypedImage,
            Op::TextBegin,
            Op::BeginTransparencyGroup,
            Op::EndTransparencyGroup,
            Op::IncludeColorSpace,
            Op::GetPageDevice,
            Op::DevSpecOp,
        ]);
        let output = options.output.clone();
        Prototype::new(PDF_DEVICE, PdfWriterDevice, table).with_private_data(move || PdfDocument::new(output.clone()))
    }

    pub fn initial_state(options: &PdfOptions) -> DeviceResult<DeviceState> {
        if options.resolution.iter().chain(&options.media_size).any(|v| *v <= 0.0) {
            return Err(DeviceError::Range("resolution and media size must be positive".into()));
        }
        let mut state = DeviceState {
            color_info: ColorInfo::for_model(options.color_model, options.color_model.num_components() * 8),
            hw_resolution: options.resolution,
            media_size: options.media_size,
            ..DeviceState::default()
        };
        state.update_dimensions();
        Ok(state)
    }

    pub fn create(options: &PdfOptions, memory: Arc<dyn DeviceMemory>) -> DeviceResult<Device> {
        Device::new(&Self::prototype(options), Self::initial_state(options)?, memory)
    }

    /// The document data at the end of `dev`'s chain.
    pub fn document(dev: &Device) -> DeviceResult<&PdfDocument> {
        dev.tail().private::<PdfDocument>()
    }

    /// Takes the serialized document kept in memory, if the writer has closed.
    pub fn take_output(dev: &mut Device) -> DeviceResult<Option<Vec<u8>>> {
        let tail = dev.tail().id();
        let node = dev
            .find_mut(tail)
            .ok_or_else(|| DeviceError::Structural(format!("tail {tail} vanished from its chain")))?;
        Ok(node.private_mut::<PdfDocument>()?.finished.take())
    }
}

fn new_content(state: &DeviceState) -> ContentBuilder {
    ContentBuilder::new(state.hw_resolution, state.media_size[1])
}

/// Components for the content stream's color operators.
fn color_components(dev: &Device, color: &DeviceColor) -> DeviceResult<Option<Vec<ColorValue>>> {
    match color {
        DeviceColor::Pure(index) => dev.decode_color(*index).map(Some),
        DeviceColor::DevN(values) => Ok(Some(values.clone())),
        DeviceColor::Null => Ok(None),
    }
}

impl DeviceProcs for PdfWriterDevice {
    fn open_device(&self, dev: &mut Device) -> DeviceResult<()> {
        let content = new_content(dev.state());
        let doc = dev.private_mut::<PdfDocument>()?;
        if doc.document.is_none() {
            let mut document = Document::with_version("1.7");
            doc.pages_id = Some(document.new_object_id());
            doc.document = Some(document);
            doc.page_ids.clear();
            doc.registry = ResourceRegistry::new();
        }
        doc.content = Some(content);
        doc.groups = 0;
        dev.wire_deferred();
        debug!("PDF writer {} opened", dev.id());
        Ok(())
    }

    fn output_page(&self, dev: &mut Device, num_copies: u32, flush: bool) -> DeviceResult<()> {
        let number = dev.state().page_count + 1;
        let media_size = dev.state().media_size;
        let next = new_content(dev.state());
        let id = dev.id();
        let doc = dev.private_mut::<PdfDocument>()?;
        if doc.groups > 0 {
            debug!("PDF writer {id} closing {} open transparency groups at page end", doc.groups);
            doc.groups = 0;
        }
        doc.emit_page(media_size, next)?;
        info!("PDF writer {id} wrote page {number}");
        defaults::output_page(dev, num_copies, flush)
    }

    /// Writes a page still holding drawing, then the document.
    fn close_device(&self, dev: &mut Device) -> DeviceResult<()> {
        let media_size = dev.state().media_size;
        let next = new_content(dev.state());
        let id = dev.id();
        let doc = dev.private_mut::<PdfDocument>()?;
        if doc.content.as_ref().is_some_and(|c| !c.is_empty()) {
            doc.emit_page(media_size, next)?;
        }
        doc.content = None;
        let bytes = doc.finish()?;
        let pages = doc.page_ids.len();
        match &doc.output {
            PdfOutput::Memory => doc.finished = Some(bytes),
            PdfOutput::File(path) => {
                std::fs::write(path, &bytes)?;
                info!("PDF written to {}", path.display());
            }
        }
        info!("PDF writer {id} closed after {pages} pages");
        dev.unwire_deferred();
        Ok(())
    }

    fn fill_rectangle(&self, dev: &mut Device, x: i32, y: i32, width: i32, height: i32, color: ColorIndex) -> DeviceResult<()> {
        let components = dev.decode_color(color)?;
        let content = dev.private_mut::<PdfDocument>()?.content()?;
        content.set_fill_color(&components);
        content.fill_rectangle(x, y, width, height);
        Ok(())
    }

    fn fill_path(
        &self,
        dev: &mut Device,
        _pis: &ImagerState,
        path: &Path,
        params: &FillParams,
        color: &DeviceColor,
        clip: Option<&ClipPath>,
    ) -> DeviceResult<()> {
        let Some(components) = color_components(dev, color)? else {
            return Ok(());
        };
        if path.is_empty() {
            return Ok(());
        }
        let content = dev.private_mut::<PdfDocument>()?.content()?;
        if let Some(clip) = clip {
            content.begin_clip(clip);
        }
        content.set_fill_color(&components);
        content.path(path);
        content.paint(Paint::Fill(params.rule));
        if clip.is_some() {
            content.restore();
        }
        Ok(())
    }

    fn stroke_path(
        &self,
        dev: &mut Device,
        _pis: &ImagerState,
        path: &Path,
        params: &StrokeParams,
        color: &DeviceColor,
        clip: Option<&ClipPath>,
    ) -> DeviceResult<()> {
        let Some(components) = color_components(dev, color)? else {
            return Ok(());
        };
        if path.is_empty() {
            return Ok(());
        }
        let content = dev.private_mut::<PdfDocument>()?.content()?;
        if let Some(clip) = clip {
            content.begin_clip(clip);
        }
        content.set_stroke_color(&components);
        content.set_line_width(params.line_width);
        content.path(path);
        content.paint(Paint::Stroke);
        if clip.is_some() {
            content.restore();
        }
        Ok(())
    }

    /// Plain sampled images become XObjects; anything else is rendered by
    /// the default enumerator as rectangles.
    fn begin_typed_image(
        &self,
        dev: &mut Device,
        pis: &ImagerState,
        matrix: Option<&Matrix>,
        image: &ImageDescriptor,
        rect: Option<&IntRect>,
        color: &DeviceColor,
        clip: Option<&ClipPath>,
    ) -> DeviceResult<Box<dyn ImageEnum>> {
        let whole = IntRect::new(0, 0, image.width as i32, image.height as i32);
        let partial = rect.is_some_and(|r| *r != whole);
        let Some(to_user) = image.image_matrix.invert() else {
            return Err(DeviceError::Range("image matrix is singular".into()));
        };
        if partial || !PdfImageEnum::supports(image) {
            return defaults::begin_typed_image(dev, pis, matrix, image, rect, color, clip);
        }
        let mask_color = if image.image_mask { color_components(dev, color)? } else { None };
        let to_device = to_user.concat(matrix.unwrap_or(&pis.ctm));
        Ok(Box::new(PdfImageEnum::new(dev.id(), image, &to_device, clip, mask_color)))
    }

    /// Shows the string with a Type 1 font named after `font` and hands back
    /// an enumerator that measures it.
    fn text_begin(
        &self,
        dev: &mut Device,
        pis: &ImagerState,
        text: &TextParams,
        font: &Font,
        origin: FixedPoint,
        color: &DeviceColor,
        clip: Option<&ClipPath>,
    ) -> DeviceResult<Box<dyn TextEnum>> {
        let enumerator = Box::new(DefaultTextEnum::new(dev.id(), text, font, origin));
        if enumerator.is_width_only() || text.operation != pagechain_types::graphics::TextOperation::Show {
            return Ok(enumerator);
        }
        let Some(components) = color_components(dev, color)? else {
            return Ok(enumerator);
        };
        let base_font: String = font.name.chars().filter(|c| !c.is_whitespace()).collect();
        let doc = dev.private_mut::<PdfDocument>()?;
        let handle = doc.resource(ResourceType::Font, hash_of(&base_font), |_| {
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
                "Encoding" => "WinAnsiEncoding",
            })
        })?;
        let name = doc.use_resource(handle)?;
        let ctm = pis.ctm;
        let tm = Matrix::new(ctm.xx, ctm.xy, ctm.yx, ctm.yy, fixed2float(origin.x), fixed2float(origin.y));
        let content = doc.content()?;
        if let Some(clip) = clip {
            content.begin_clip(clip);
        }
        content.set_fill_color(&components);
        content.show_text(&name, font.size, &tm, text.char_spacing, &text.bytes);
        if clip.is_some() {
            content.restore();
        }
        Ok(enumerator)
    }

    /// Opens a group as a saved state carrying the group's alpha and blend
    /// mode in an ExtGState.
    fn begin_transparency_group(
        &self,
        dev: &mut Device,
        params: &TransparencyGroupParams,
        _bbox: &Rect,
        _pis: &ImagerState,
    ) -> DeviceResult<()> {
        let (alpha, blend) = (params.alpha, params.blend_mode.pdf_name());
        dev.state_mut().page_uses_transparency = true;
        let doc = dev.private_mut::<PdfDocument>()?;
        let handle = doc.resource(ResourceType::ExtGState, hash_of((alpha.to_bits(), blend)), |_| {
            Object::Dictionary(dictionary! {
                "Type" => "ExtGState",
                "CA" => alpha,
                "ca" => alpha,
                "BM" => Object::Name(blend.as_bytes().to_vec()),
            })
        })?;
        let name = doc.use_resource(handle)?;
        let content = doc.content()?;
        content.save();
        content.set_graphics_state(&name);
        doc.groups += 1;
        Ok(())
    }

    fn end_transparency_group(&self, dev: &mut Device, _pis: &ImagerState) -> DeviceResult<()> {
        let doc = dev.private_mut::<PdfDocument>()?;
        if doc.groups == 0 {
            return Err(DeviceError::Range("no transparency group is open".into()));
        }
        doc.content()?.restore();
        doc.groups -= 1;
        Ok(())
    }

    /// Embeds the space once per document; ICC data becomes an ICCBased
    /// stream.
    fn include_color_space(&self, dev: &mut Device, space: &ColorSpaceRef) -> DeviceResult<()> {
        let rid = hash_of((&space.name, space.num_components, &space.data));
        let doc = dev.private_mut::<PdfDocument>()?;
        let handle = doc.resource(ResourceType::ColorSpace, rid, |document| {
            if space.data.is_empty() {
                return Object::Name(space.name.as_bytes().to_vec());
            }
            let profile = Stream::new(dictionary! { "N" => i64::from(space.num_components) }, space.data.clone());
            let profile_id = document.add_object(profile);
            Object::Array(vec![Object::Name(b"ICCBased".to_vec()), profile_id.into()])
        })?;
        doc.registry.set_named(handle, true);
        doc.use_resource(handle)?;
        Ok(())
    }

    fn get_page_device(&self, dev: &Device) -> Option<DeviceId> {
        Some(dev.id())
    }

    fn dev_spec_op(&self, dev: &mut Device, request: &DevSpecRequest) -> DeviceResult<i64> {
        match request {
            DevSpecRequest::SupportsHlColor => Ok(1),
            _ => defaults::dev_spec_op(dev, request),
        }
    }
}

//! Sampled images collected into Image XObjects.
//!
//! Rows arrive in whatever packing the caller uses (chunky or one plane per
//! component, starting at any sample); they are repacked into the chunky,
//! byte-aligned rows an Image XObject stores. The XObject is placed when
//! the image ends.

use crate::device::PdfDocument;
use log::debug;
use lopdf::{Dictionary, Object, Stream, dictionary};
use pagechain_device::{Device, DeviceError, DeviceId, DeviceResult, ImageEnum};
use pagechain_types::graphics::{ClipPath, ImageDescriptor, ImageFormat, ImagePlane};
use pagechain_types::{ColorValue, Matrix};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug)]
pub struct PdfImageEnum {
    device: DeviceId,
    descriptor: ImageDescriptor,
    /// Unit square to device space.
    placement: Matrix,
    clip: Option<ClipPath>,
    /// Paint color for masks.
    mask_color: Option<Vec<ColorValue>>,
    data: Vec<u8>,
    rows_done: u32,
}

impl PdfImageEnum {
    /// `to_device` maps image space onto the device.
    pub fn new(
        device: DeviceId,
        descriptor: &ImageDescriptor,
        to_device: &Matrix,
        clip: Option<&ClipPath>,
        mask_color: Option<Vec<ColorValue>>,
    ) -> Self {
        let (w, h) = (f64::from(descriptor.width), f64::from(descriptor.height));
        Self {
            device,
            descriptor: descriptor.clone(),
            placement: Matrix::new(w, 0.0, 0.0, -h, 0.0, h).concat(to_device),
            clip: clip.copied(),
            mask_color,
            data: Vec::with_capacity(row_bytes(descriptor) * descriptor.height as usize),
            rows_done: 0,
        }
    }

    /// Whether this writer can store `image` as an XObject as given.
    pub fn supports(image: &ImageDescriptor) -> bool {
        image.image_type == 1
            && matches!(image.bits_per_component, 1 | 2 | 4 | 8 | 16)
            && (image.image_mask || matches!(image.num_components, 1 | 3 | 4))
            && (!image.image_mask || image.bits_per_component == 1)
    }

    pub fn rows_done(&self) -> u32 {
        self.rows_done
    }

    fn is_complete(&self) -> bool {
        self.rows_done >= self.descriptor.height
    }

    fn xobject(&self) -> Stream {
        let d = &self.descriptor;
        let mut dict: Dictionary = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(d.width),
            "Height" => i64::from(d.height),
            "BitsPerComponent" => i64::from(d.bits_per_component),
        };
        if d.image_mask {
            dict.set("ImageMask", true);
            // Set bits paint.
            dict.set("Decode", vec![Object::Integer(1), Object::Integer(0)]);
        } else {
            let space = match d.num_components {
                1 => "DeviceGray",
                4 => "DeviceCMYK",
                _ => "DeviceRGB",
            };
            dict.set("ColorSpace", Object::Name(space.as_bytes().to_vec()));
        }
        Stream::new(dict, self.data.clone())
    }

    fn rid(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        let d = &self.descriptor;
        (d.width, d.height, d.bits_per_component, d.num_components, d.image_mask).hash(&mut hasher);
        self.data.hash(&mut hasher);
        hasher.finish()
    }
}

fn row_bytes(d: &ImageDescriptor) -> usize {
    (d.width as usize * usize::from(d.effective_components()) * usize::from(d.bits_per_component)).div_ceil(8)
}

/// Reads the `index`th `bits`-wide sample, MSB first; zero past the end.
fn read_sample(row: &[u8], index: usize, bits: u32) -> u32 {
    let mut value = 0;
    let start = index * bits as usize;
    for bit in start..start + bits as usize {
        let set = row.get(bit / 8).is_some_and(|b| b & (0x80 >> (bit % 8)) != 0);
        value = (value << 1) | u32::from(set);
    }
    value
}

#[derive(Debug, Default)]
struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    pending: u32,
}

impl BitWriter {
    fn push(&mut self, value: u32, bits: u32) {
        for shift in (0..bits).rev() {
            self.acc = (self.acc << 1) | ((value >> shift) & 1);
            self.pending += 1;
            if self.pending == 8 {
                self.out.push(self.acc as u8);
                self.acc = 0;
                self.pending = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.pending > 0 {
            self.out.push((self.acc << (8 - self.pending)) as u8);
        }
        self.out
    }
}

impl ImageEnum for PdfImageEnum {
    fn device_id(&self) -> DeviceId {
        self.device
    }

    fn num_planes(&self) -> usize {
        self.descriptor.num_planes()
    }

    fn plane_data(&mut self, _dev: &mut Device, planes: &[ImagePlane<'_>], height: u32) -> DeviceResult<bool> {
        let nplanes = self.num_planes();
        if planes.len() < nplanes {
            return Err(DeviceError::Range(format!("image needs {nplanes} planes, got {}", planes.len())));
        }
        let d = &self.descriptor;
        let bits = u32::from(d.bits_per_component);
        let ncomp = usize::from(d.effective_components());
        for r in 0..height as usize {
            if self.is_complete() {
                break;
            }
            let rows: Vec<&[u8]> = planes[..nplanes]
                .iter()
                .map(|p| &p.data[(r * p.raster).min(p.data.len())..])
                .collect();
            let data_x = planes[0].data_x.max(0) as usize;
            let mut writer = BitWriter::default();
            for col in 0..d.width as usize {
                for k in 0..ncomp {
                    let sample = match d.format {
                        ImageFormat::Chunky => read_sample(rows[0], data_x + col * ncomp + k, bits),
                        ImageFormat::ComponentPlanar => read_sample(rows[k], data_x + col, bits),
                    };
                    writer.push(sample, bits);
                }
            }
            self.data.extend(writer.finish());
            self.rows_done += 1;
        }
        Ok(self.is_complete())
    }

    /// Places the image. An incomplete image is dropped, or padded with
    /// zero rows when `draw_last` asks for what was supplied.
    fn end_image(mut self: Box<Self>, dev: &mut Device, draw_last: bool) -> DeviceResult<()> {
        if !self.is_complete() {
            if !draw_last {
                debug!("image on {} abandoned after {} rows", self.device, self.rows_done);
                return Ok(());
            }
            let missing = (self.descriptor.height - self.rows_done) as usize;
            let pad = row_bytes(&self.descriptor) * missing;
            self.data.resize(self.data.len() + pad, 0);
        }
        let rid = self.rid();
        let stream = self.xobject();
        let doc = dev.private_mut::<PdfDocument>()?;
        doc.place_image(rid, stream, &self.placement, self.clip.as_ref(), self.mask_color.as_deref())
    }
}

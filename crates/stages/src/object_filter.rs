//! Dropping whole classes of marks: vector art, images or text.
//!
//! High-level operations are classified by what they are. Low-level raster
//! operations (`fill_rectangle`, `copy_mono`, ...) are classified by the
//! graphics type tag last set on the device, since they are what images and
//! glyphs are eventually drawn with.

use log::debug;
use pagechain_device::{Device, DeviceResult, DeviceState, ForwardingStage, Op, OpCategory, Prototype, StagePolicy, install};
use pagechain_types::GraphicsTypeTag;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const OBJECT_FILTER_STAGE: &str = "ObjectFilter";

/// Which kinds of object to drop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectKinds {
    pub vector: bool,
    pub image: bool,
    pub text: bool,
}

impl ObjectKinds {
    pub fn is_empty(&self) -> bool {
        !(self.vector || self.image || self.text)
    }
}

impl FromStr for ObjectKinds {
    type Err = String;

    /// Comma-separated kinds, e.g. `"image,text"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut kinds = ObjectKinds::default();
        for word in s.split(',').map(str::trim).filter(|w| !w.is_empty()) {
            match word.to_ascii_lowercase().as_str() {
                "vector" => kinds.vector = true,
                "image" => kinds.image = true,
                "text" => kinds.text = true,
                other => return Err(format!("unknown object kind '{other}'")),
            }
        }
        Ok(kinds)
    }
}

impl fmt::Display for ObjectKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [(self.vector, "vector"), (self.image, "image"), (self.text, "text")]
            .into_iter()
            .filter_map(|(on, name)| on.then_some(name))
            .collect();
        f.write_str(&names.join(","))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Vector,
    Image,
    Text,
}

fn classify(op: Op, tag: GraphicsTypeTag) -> Option<Kind> {
    let by_tag = match tag {
        GraphicsTypeTag::Path => Some(Kind::Vector),
        GraphicsTypeTag::Image => Some(Kind::Image),
        GraphicsTypeTag::Text => Some(Kind::Text),
        GraphicsTypeTag::Unknown | GraphicsTypeTag::Untouched => None,
    };
    match op.category() {
        OpCategory::Image => Some(Kind::Image),
        OpCategory::Text => Some(Kind::Text),
        OpCategory::Vector => by_tag.or(Some(Kind::Vector)),
        OpCategory::Raster => match op {
            Op::GetBits | Op::GetBitsRectangle | Op::GetAlphaBits | Op::GetBand | Op::ProcessPage => None,
            _ => by_tag,
        },
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectFilter;

impl ObjectFilter {
    pub fn prototype(kinds: ObjectKinds) -> Prototype {
        ForwardingStage::prototype(OBJECT_FILTER_STAGE, ObjectFilter, move || kinds)
    }
}

impl StagePolicy for ObjectFilter {
    type Data = ObjectKinds;

    fn suppresses(&self, op: Op, kinds: &ObjectKinds, state: &DeviceState) -> bool {
        match classify(op, state.graphics_type_tag) {
            Some(Kind::Vector) => kinds.vector,
            Some(Kind::Image) => kinds.image,
            Some(Kind::Text) => kinds.text,
            None => false,
        }
    }
}

pub fn install_object_filter(dev: &mut Device, kinds: ObjectKinds) -> DeviceResult<()> {
    let prototype = ObjectFilter::prototype(kinds);
    install(dev, &prototype, prototype.private_size())?;
    debug!("dropping [{kinds}] in front of {}", dev.describe_chain());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_from_a_list() {
        let kinds: ObjectKinds = "Image, text".parse().unwrap();
        assert_eq!(kinds, ObjectKinds { vector: false, image: true, text: true });
        assert_eq!(kinds.to_string(), "image,text");
        assert!("".parse::<ObjectKinds>().unwrap().is_empty());
        assert!("shading".parse::<ObjectKinds>().is_err());
    }

    #[test]
    fn raster_ops_follow_the_graphics_type_tag() {
        assert_eq!(classify(Op::FillRectangle, GraphicsTypeTag::Text), Some(Kind::Text));
        assert_eq!(classify(Op::CopyMono, GraphicsTypeTag::Image), Some(Kind::Image));
        assert_eq!(classify(Op::FillRectangle, GraphicsTypeTag::Unknown), None);
        assert_eq!(classify(Op::GetBits, GraphicsTypeTag::Image), None);
    }

    #[test]
    fn high_level_ops_are_classified_by_what_they_draw() {
        assert_eq!(classify(Op::FillPath, GraphicsTypeTag::Unknown), Some(Kind::Vector));
        assert_eq!(classify(Op::FillPath, GraphicsTypeTag::Text), Some(Kind::Text));
        assert_eq!(classify(Op::BeginTypedImage, GraphicsTypeTag::Path), Some(Kind::Image));
        assert_eq!(classify(Op::TextBegin, GraphicsTypeTag::Unknown), Some(Kind::Text));
        assert_eq!(classify(Op::OutputPage, GraphicsTypeTag::Image), None);
    }

    #[test]
    fn only_selected_kinds_are_suppressed() {
        let kinds = ObjectKinds { image: true, ..ObjectKinds::default() };
        let state = DeviceState::default();
        assert!(ObjectFilter.suppresses(Op::BeginTypedImage, &kinds, &state));
        assert!(!ObjectFilter.suppresses(Op::FillPath, &kinds, &state));
        assert!(!ObjectFilter.suppresses(Op::TextBegin, &kinds, &state));
    }
}

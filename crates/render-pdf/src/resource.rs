//! Named, shared PDF resources and the registry that tracks which content
//! streams use them.
//!
//! Resources of each type hang off 16 chains selected by a hash of their
//! `rid`, the caller's key for "the same thing" (a font name, an image's
//! sample data). A resource's name is `R<object number>` and is what content
//! streams refer to; `where_used` carries one bit per content-stream level,
//! bit 0 being the page itself.

use log::{debug, trace};
use lopdf::{Dictionary, Object, ObjectId, StringFormat};
use std::collections::BTreeMap;
use std::io::{self, Write};

pub const NUM_RESOURCE_CHAINS: usize = 16;

/// Spreads sequential ids across chains.
pub fn rid_hash(rid: u64) -> u64 {
    rid.wrapping_add(rid / NUM_RESOURCE_CHAINS as u64)
}

fn chain_index(rid: u64) -> usize {
    (rid_hash(rid) % NUM_RESOURCE_CHAINS as u64) as usize
}

/// Resource kinds. Everything before `Font` is written and released page
/// by page; `Font` and the internal kinds after it live for the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    ColorSpace,
    ExtGState,
    Pattern,
    Shading,
    XObject,
    Font,
    CharProc,
    CIDFont,
    CMap,
    FontDescriptor,
    Function,
}

impl ResourceType {
    pub const COUNT: usize = 11;

    pub const ALL: [ResourceType; ResourceType::COUNT] = [
        ResourceType::ColorSpace,
        ResourceType::ExtGState,
        ResourceType::Pattern,
        ResourceType::Shading,
        ResourceType::XObject,
        ResourceType::Font,
        ResourceType::CharProc,
        ResourceType::CIDFont,
        ResourceType::CMap,
        ResourceType::FontDescriptor,
        ResourceType::Function,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_page_local(self) -> bool {
        self < ResourceType::Font
    }

    /// The key in a page's resource dictionary, for types that have one.
    pub fn dict_key(self) -> Option<&'static str> {
        match self {
            ResourceType::ColorSpace => Some("ColorSpace"),
            ResourceType::ExtGState => Some("ExtGState"),
            ResourceType::Pattern => Some("Pattern"),
            ResourceType::Shading => Some("Shading"),
            ResourceType::XObject => Some("XObject"),
            ResourceType::Font | ResourceType::CIDFont => Some("Font"),
            ResourceType::CMap => Some("CMap"),
            ResourceType::FontDescriptor => Some("FontDescriptor"),
            ResourceType::CharProc | ResourceType::Function => None,
        }
    }
}

/// Refers to a live resource in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(usize);

#[derive(Debug, Clone)]
pub struct Resource {
    pub rtype: ResourceType,
    pub rid: u64,
    /// `R<object number>`.
    pub name: String,
    /// Named resources survive `free_page_resources`.
    pub named: bool,
    pub where_used: u64,
    pub object_id: ObjectId,
    /// Content-stream levels that have used this resource.
    pub ref_count: u32,
    body: Object,
    key: Vec<u8>,
    written: bool,
}

impl Resource {
    pub fn body(&self) -> &Object {
        &self.body
    }

    pub fn is_written(&self) -> bool {
        self.written
    }
}

#[derive(Debug, Default)]
pub struct ResourceRegistry {
    slots: Vec<Option<Resource>>,
    chains: [[Vec<usize>; NUM_RESOURCE_CHAINS]; ResourceType::COUNT],
    last: Option<ResourceHandle>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `body` as object `object_id`, at the front of its chain.
    pub fn alloc_resource(&mut self, rtype: ResourceType, rid: u64, object_id: ObjectId, body: Object) -> ResourceHandle {
        let handle = ResourceHandle(self.slots.len());
        let resource = Resource {
            rtype,
            rid,
            name: format!("R{}", object_id.0),
            named: false,
            where_used: 0,
            object_id,
            ref_count: 0,
            key: object_key(&body),
            body,
            written: false,
        };
        trace!("allocated {:?} {} for rid {rid}", rtype, resource.name);
        self.slots.push(Some(resource));
        self.chains[rtype.index()][chain_index(rid)].insert(0, handle.0);
        self.last = Some(handle);
        handle
    }

    /// Looks a resource up by its rid, moving it to the front of its chain.
    pub fn find_by_rid(&mut self, rtype: ResourceType, rid: u64) -> Option<ResourceHandle> {
        let chain = &mut self.chains[rtype.index()][chain_index(rid)];
        let slots = &self.slots;
        let pos = chain.iter().position(|&i| slots[i].as_ref().is_some_and(|r| r.rid == rid))?;
        let index = chain.remove(pos);
        chain.insert(0, index);
        Some(ResourceHandle(index))
    }

    /// Another resource of the same type whose body is identical to
    /// `handle`'s.
    pub fn find_same(&self, handle: ResourceHandle) -> Option<ResourceHandle> {
        let resource = self.get(handle)?;
        self.chains[resource.rtype.index()]
            .iter()
            .flatten()
            .copied()
            .filter(|&i| i != handle.0)
            .find(|&i| self.slots[i].as_ref().is_some_and(|r| r.key == resource.key))
            .map(ResourceHandle)
    }

    /// Withdraws a resource that turned out not to be needed. Its object
    /// number is the caller's to discard.
    pub fn cancel_resource(&mut self, handle: ResourceHandle) -> Option<Resource> {
        let resource = self.slots.get_mut(handle.0)?.take()?;
        self.chains[resource.rtype.index()][chain_index(resource.rid)].retain(|&i| i != handle.0);
        if self.last == Some(handle) {
            self.last = None;
        }
        trace!("cancelled {:?} {}", resource.rtype, resource.name);
        Some(resource)
    }

    pub fn get(&self, handle: ResourceHandle) -> Option<&Resource> {
        self.slots.get(handle.0)?.as_ref()
    }

    pub fn get_mut(&mut self, handle: ResourceHandle) -> Option<&mut Resource> {
        self.slots.get_mut(handle.0)?.as_mut()
    }

    /// The most recently allocated resource still registered.
    pub fn last_resource(&self) -> Option<ResourceHandle> {
        self.last
    }

    /// Records a use at content-stream `level`; returns the resource name.
    pub fn mark_used(&mut self, handle: ResourceHandle, level: u32) -> Option<String> {
        let resource = self.get_mut(handle)?;
        let bit = 1u64 << level.min(63);
        if resource.where_used & bit == 0 {
            resource.where_used |= bit;
            resource.ref_count += 1;
        }
        Some(resource.name.clone())
    }

    pub fn set_named(&mut self, handle: ResourceHandle, named: bool) {
        if let Some(resource) = self.get_mut(handle) {
            resource.named = named;
        }
    }

    pub fn len(&self, rtype: ResourceType) -> usize {
        self.chains[rtype.index()].iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Live resources of `rtype`, chain by chain, most recently used first.
    pub fn iter(&self, rtype: ResourceType) -> impl Iterator<Item = (ResourceHandle, &Resource)> + '_ {
        self.chains[rtype.index()]
            .iter()
            .flatten()
            .filter_map(|&i| self.slots[i].as_ref().map(|r| (ResourceHandle(i), r)))
    }

    /// Which chain a rid lands on.
    pub fn chain_of(rid: u64) -> usize {
        chain_index(rid)
    }

    /// Bodies not yet handed out for writing, marking them written.
    pub fn take_unwritten(&mut self) -> Vec<(ObjectId, Object)> {
        self.slots
            .iter_mut()
            .flatten()
            .filter(|r| !r.written)
            .map(|r| {
                r.written = true;
                (r.object_id, r.body.clone())
            })
            .collect()
    }

    /// The page's resource dictionary: every resource used at page level,
    /// grouped under its type's key. Clears the page-level use bit.
    pub fn store_page_resources(&mut self) -> Dictionary {
        let mut groups: BTreeMap<&'static str, Dictionary> = BTreeMap::new();
        for resource in self.slots.iter_mut().flatten() {
            if resource.where_used & 1 == 0 {
                continue;
            }
            resource.where_used &= !1;
            if let Some(key) = resource.rtype.dict_key() {
                groups
                    .entry(key)
                    .or_default()
                    .set(resource.name.as_bytes(), Object::Reference(resource.object_id));
            }
        }
        let mut dict = Dictionary::new();
        for (key, group) in groups {
            dict.set(key, Object::Dictionary(group));
        }
        dict
    }

    /// Drops unnamed page-local resources that are written and no longer in
    /// use by any open stream. Returns how many went.
    pub fn free_page_resources(&mut self) -> usize {
        let doomed: Vec<ResourceHandle> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (ResourceHandle(i), r)))
            .filter(|(_, r)| r.rtype.is_page_local() && !r.named && r.written && r.where_used == 0)
            .map(|(h, _)| h)
            .collect();
        for &handle in &doomed {
            self.cancel_resource(handle);
        }
        if !doomed.is_empty() {
            debug!("freed {} page resources", doomed.len());
        }
        doomed.len()
    }
}

/// A canonical serialization of `object`, used to compare resource bodies:
/// dictionary keys are sorted, so equal content gives equal bytes.
pub fn object_key(object: &Object) -> Vec<u8> {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_object(&mut out, object);
    out
}

fn write_object(out: &mut dyn Write, object: &Object) -> io::Result<()> {
    match object {
        Object::Null => out.write_all(b"null"),
        Object::Boolean(b) => out.write_all(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => write!(out, "{i}"),
        Object::Real(r) => write!(out, "{r}"),
        Object::Name(n) => {
            out.write_all(b"/")?;
            out.write_all(n)
        }
        Object::String(s, format) => {
            let tag: &[u8] = match format {
                StringFormat::Literal => b"(",
                StringFormat::Hexadecimal => b"<",
            };
            out.write_all(tag)?;
            write!(out, "{}:", s.len())?;
            out.write_all(s)
        }
        Object::Array(items) => {
            out.write_all(b"[")?;
            for item in items {
                write_object(out, item)?;
                out.write_all(b" ")?;
            }
            out.write_all(b"]")
        }
        Object::Dictionary(dict) => write_dictionary(out, dict),
        Object::Stream(stream) => {
            write_dictionary(out, &stream.dict)?;
            write!(out, "stream {}:", stream.content.len())?;
            out.write_all(&stream.content)
        }
        Object::Reference(id) => write!(out, "{} {} R", id.0, id.1),
    }
}

fn write_dictionary(out: &mut dyn Write, dict: &Dictionary) -> io::Result<()> {
    out.write_all(b"<<")?;
    let sorted: BTreeMap<_, _> = dict.iter().collect();
    for (key, value) in sorted {
        out.write_all(b"/")?;
        out.write_all(key)?;
        out.write_all(b" ")?;
        write_object(out, value)?;
        out.write_all(b" ")?;
    }
    out.write_all(b">>")
}

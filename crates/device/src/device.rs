//! Device nodes and the state they share with the devices they wrap.

use crate::error::{DeviceError, DeviceResult};
use crate::memory::{Allocation, Arena, DeviceMemory};
use crate::op::{OpTable, ProcSlot, fill_in_procs};
use crate::procs::DeviceProcs;
use pagechain_types::graphics::SpaceParams;
use pagechain_types::{CachedColors, ColorInfo, GraphicsTypeTag, ProfileHandle, Rect};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u64);

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

impl DeviceId {
    pub fn next() -> Self {
        DeviceId(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies the concrete procs type a node currently runs.
///
/// Stored on the node and updated by install/uninstall, so anything walking
/// the chain can tell what each node is without trusting its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeWitness {
    type_name: &'static str,
    type_id: TypeId,
}

impl TypeWitness {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The type name with module paths stripped, generics included.
    pub fn short_name(&self) -> String {
        let mut out = String::new();
        let mut segment = String::new();
        let mut chars = self.type_name.chars().peekable();
        while let Some(c) = chars.next() {
            if c == ':' && chars.peek() == Some(&':') {
                chars.next();
                segment.clear();
            } else if c.is_alphanumeric() || c == '_' {
                segment.push(c);
            } else {
                out.push_str(&segment);
                segment.clear();
                out.push(c);
            }
        }
        out.push_str(&segment);
        out
    }
}

/// Fields a wrapper mirrors from the device it wraps.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub color_info: ColorInfo,
    pub cached_colors: CachedColors,
    pub width: i32,
    pub height: i32,
    pub pad: i32,
    pub log2_align_mod: i32,
    pub max_fill_band: i32,
    pub is_planar: bool,
    pub leading_edge: i32,
    pub imaging_bbox: Rect,
    pub imaging_bbox_set: bool,
    /// Points.
    pub media_size: [f32; 2],
    /// Dots per inch.
    pub hw_resolution: [f32; 2],
    pub margins: [f32; 2],
    /// Left, bottom, right, top, in points.
    pub hw_margins: [f32; 4],
    pub first_page: i32,
    /// 0 means "until the end".
    pub last_page: i32,
    pub page_count: i64,
    pub showpage_count: i64,
    pub num_copies: i32,
    pub num_copies_set: bool,
    pub ignore_num_copies: bool,
    pub use_cie_color: bool,
    pub lock_safety_params: bool,
    pub band_offset_x: i32,
    pub band_offset_y: i32,
    pub space_params: SpaceParams,
    pub max_pattern_bitmap: u64,
    pub page_uses_transparency: bool,
    pub icc_profile: Option<ProfileHandle>,
    pub graphics_type_tag: GraphicsTypeTag,
}

impl Default for DeviceState {
    fn default() -> Self {
        let mut state = Self {
            color_info: ColorInfo::default(),
            cached_colors: CachedColors::default(),
            width: 0,
            height: 0,
            pad: 0,
            log2_align_mod: 0,
            max_fill_band: 0,
            is_planar: false,
            leading_edge: 0,
            imaging_bbox: Rect::default(),
            imaging_bbox_set: false,
            media_size: [612.0, 792.0],
            hw_resolution: [72.0, 72.0],
            margins: [0.0, 0.0],
            hw_margins: [0.0; 4],
            first_page: 0,
            last_page: 0,
            page_count: 0,
            showpage_count: 0,
            num_copies: 1,
            num_copies_set: false,
            ignore_num_copies: false,
            use_cie_color: false,
            lock_safety_params: false,
            band_offset_x: 0,
            band_offset_y: 0,
            space_params: SpaceParams::default(),
            max_pattern_bitmap: 0,
            page_uses_transparency: false,
            icc_profile: None,
            graphics_type_tag: GraphicsTypeTag::Unknown,
        };
        state.update_dimensions();
        state
    }
}

impl DeviceState {
    /// Recomputes the pixel size from media size and resolution.
    pub fn update_dimensions(&mut self) {
        self.width = (f64::from(self.media_size[0]) * f64::from(self.hw_resolution[0]) / 72.0 + 0.5) as i32;
        self.height = (f64::from(self.media_size[1]) * f64::from(self.hw_resolution[1]) / 72.0 + 0.5) as i32;
    }

    /// Copies the mirrored fields from `other`, one by one.
    pub fn sync_from(&mut self, other: &DeviceState) {
        self.color_info = other.color_info.clone();
        self.cached_colors = other.cached_colors;
        self.width = other.width;
        self.height = other.height;
        self.pad = other.pad;
        self.log2_align_mod = other.log2_align_mod;
        self.max_fill_band = other.max_fill_band;
        self.is_planar = other.is_planar;
        self.leading_edge = other.leading_edge;
        self.imaging_bbox = other.imaging_bbox;
        self.imaging_bbox_set = other.imaging_bbox_set;
        self.media_size = other.media_size;
        self.hw_resolution = other.hw_resolution;
        self.margins = other.margins;
        self.hw_margins = other.hw_margins;
        self.first_page = other.first_page;
        self.last_page = other.last_page;
        self.page_count = other.page_count;
        self.showpage_count = other.showpage_count;
        self.num_copies = other.num_copies;
        self.num_copies_set = other.num_copies_set;
        self.ignore_num_copies = other.ignore_num_copies;
        self.use_cie_color = other.use_cie_color;
        self.lock_safety_params = other.lock_safety_params;
        self.band_offset_x = other.band_offset_x;
        self.band_offset_y = other.band_offset_y;
        self.space_params = other.space_params;
        self.max_pattern_bitmap = other.max_pattern_bitmap;
        self.page_uses_transparency = other.page_uses_transparency;
        self.icc_profile = other.icc_profile.clone();
        self.graphics_type_tag = other.graphics_type_tag;
    }
}

/// A node's private block: the accounting allocation plus the stage's data.
pub struct PrivateData {
    pub(crate) allocation: Allocation,
    pub(crate) data: Box<dyn Any + Send>,
}

impl fmt::Debug for PrivateData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateData").field("allocation", &self.allocation).finish_non_exhaustive()
    }
}

pub type FinalizeHook = Arc<dyn Fn(&mut Device) + Send + Sync>;

type PrivateInit = Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// Everything needed to stamp out a device or install a stage.
#[derive(Clone)]
pub struct Prototype {
    name: String,
    witness: TypeWitness,
    procs: Arc<dyn DeviceProcs>,
    table: OpTable,
    private_size: usize,
    private_init: Option<PrivateInit>,
    finalize: Option<FinalizeHook>,
}

impl Prototype {
    /// `table` marks which operations `procs` implements; the rest fall back.
    pub fn new<P: DeviceProcs + 'static>(name: impl Into<String>, procs: P, table: OpTable) -> Self {
        Self {
            name: name.into(),
            witness: TypeWitness::of::<P>(),
            procs: Arc::new(procs),
            table,
            private_size: 0,
            private_init: None,
            finalize: None,
        }
    }

    pub fn with_private_data<T, F>(mut self, init: F) -> Self
    where
        T: Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.private_size = std::mem::size_of::<T>();
        self.private_init = Some(Arc::new(move || Box::new(init()) as Box<dyn Any + Send>));
        self
    }

    pub fn with_finalize<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Device) + Send + Sync + 'static,
    {
        self.finalize = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn witness(&self) -> TypeWitness {
        self.witness
    }

    pub fn table(&self) -> &OpTable {
        &self.table
    }

    pub fn private_size(&self) -> usize {
        self.private_size
    }

    pub(crate) fn procs(&self) -> &Arc<dyn DeviceProcs> {
        &self.procs
    }

    pub(crate) fn finalize_hook(&self) -> Option<FinalizeHook> {
        self.finalize.clone()
    }

    pub(crate) fn new_private_data(&self) -> Box<dyn Any + Send> {
        match &self.private_init {
            Some(init) => init(),
            None => Box::new(()),
        }
    }
}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prototype")
            .field("name", &self.name)
            .field("witness", &self.witness.short_name())
            .field("private_size", &self.private_size)
            .finish_non_exhaustive()
    }
}

/// One stage of a device chain.
///
/// Callers address the head; each node owns the node it wraps. Operations
/// are inherent methods that consult the node's table and either run the
/// node's procs or the default implementation.
pub struct Device {
    pub(crate) id: DeviceId,
    pub(crate) name: String,
    pub(crate) witness: TypeWitness,
    pub(crate) procs: Arc<dyn DeviceProcs>,
    /// What the procs declared they implement.
    pub(crate) declared: OpTable,
    pub(crate) table: OpTable,
    pub(crate) state: DeviceState,
    pub(crate) is_open: bool,
    pub(crate) private: Option<PrivateData>,
    pub(crate) parent: Option<DeviceId>,
    pub(crate) child: Option<Box<Device>>,
    pub(crate) finalize: Option<FinalizeHook>,
    pub(crate) memory: Arc<dyn DeviceMemory>,
    /// Set on nodes created by install; freed when the node collapses.
    pub(crate) node_allocation: Option<Allocation>,
}

impl Device {
    pub fn new(prototype: &Prototype, state: DeviceState, memory: Arc<dyn DeviceMemory>) -> DeviceResult<Device> {
        let allocation = memory.alloc(Arena::Stable, prototype.private_size, "device private data")?;
        let mut table = prototype.table.clone();
        for op in crate::op::Op::ALL.into_iter().filter(|op| op.is_deferred()) {
            table.set(op, ProcSlot::Unset);
        }
        fill_in_procs(&mut table);
        Ok(Device {
            id: DeviceId::next(),
            name: prototype.name.clone(),
            witness: prototype.witness,
            procs: Arc::clone(&prototype.procs),
            declared: prototype.table.clone(),
            table,
            state,
            is_open: false,
            private: Some(PrivateData {
                allocation,
                data: prototype.new_private_data(),
            }),
            parent: None,
            child: None,
            finalize: prototype.finalize_hook(),
            memory,
            node_allocation: None,
        })
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn witness(&self) -> TypeWitness {
        self.witness
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn set_open(&mut self, open: bool) {
        self.is_open = open;
    }

    pub fn table(&self) -> &OpTable {
        &self.table
    }

    pub fn parent(&self) -> Option<DeviceId> {
        self.parent
    }

    pub fn child(&self) -> Option<&Device> {
        self.child.as_deref()
    }

    pub fn child_mut(&mut self) -> Option<&mut Device> {
        self.child.as_deref_mut()
    }

    pub fn memory(&self) -> &Arc<dyn DeviceMemory> {
        &self.memory
    }

    /// Wires the deferred slots this device's procs implement. Called by a
    /// terminal device once its buffer exists.
    pub fn wire_deferred(&mut self) {
        for op in crate::op::Op::ALL.into_iter().filter(|op| op.is_deferred()) {
            if self.table.is_unset(op) && self.declared.is_implemented(op) {
                self.table.set(op, ProcSlot::Implemented);
            }
        }
    }

    /// Undoes `wire_deferred`, as when a buffer is released on close.
    pub fn unwire_deferred(&mut self) {
        for op in crate::op::Op::ALL.into_iter().filter(|op| op.is_deferred()) {
            self.table.set(op, ProcSlot::Unset);
        }
    }

    pub fn private<T: Any>(&self) -> DeviceResult<&T> {
        self.private
            .as_ref()
            .and_then(|p| p.data.downcast_ref::<T>())
            .ok_or_else(|| self.missing_private::<T>())
    }

    pub fn private_mut<T: Any>(&mut self) -> DeviceResult<&mut T> {
        let err = self.missing_private::<T>();
        self.private.as_mut().and_then(|p| p.data.downcast_mut::<T>()).ok_or(err)
    }

    fn missing_private<T: Any>(&self) -> DeviceError {
        DeviceError::Structural(format!(
            "device '{}' {} has no private data of type {}",
            self.name,
            self.id,
            std::any::type_name::<T>()
        ))
    }

    /// Nodes from this one down to the tail.
    pub fn walk(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }

    pub fn chain_len(&self) -> usize {
        self.walk().count()
    }

    /// `name(Witness) -> name(Witness) -> ...`, head first.
    pub fn describe_chain(&self) -> String {
        self.walk()
            .map(|d| format!("{}({})", d.name, d.witness.short_name()))
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn find(&self, id: DeviceId) -> Option<&Device> {
        self.walk().find(|d| d.id == id)
    }

    pub fn find_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        if self.id == id {
            return Some(self);
        }
        self.child.as_deref_mut()?.find_mut(id)
    }

    pub fn tail(&self) -> &Device {
        match self.child.as_deref() {
            Some(child) => child.tail(),
            None => self,
        }
    }

    /// Opens the device unless it already is.
    pub fn open(&mut self) -> DeviceResult<()> {
        if !self.is_open {
            self.open_device()?;
            self.is_open = true;
        }
        Ok(())
    }

    /// Closes the device if it is open.
    pub fn close(&mut self) -> DeviceResult<()> {
        if self.is_open {
            let result = self.close_device();
            self.is_open = false;
            result?;
        }
        Ok(())
    }

    /// Runs the finalize hook (at most once) and releases this node's
    /// private block and node allocation. Children finalize when dropped.
    pub fn finalize(&mut self) {
        if let Some(hook) = self.finalize.take() {
            log::debug!("finalizing '{}' {}", self.name, self.id);
            hook(self);
        }
        if let Some(private) = self.private.take() {
            self.memory.free(private.allocation);
        }
        if let Some(node) = self.node_allocation.take() {
            self.memory.free(node);
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("witness", &self.witness.short_name())
            .field("is_open", &self.is_open)
            .field("parent", &self.parent)
            .field("child", &self.child)
            .finish_non_exhaustive()
    }
}

pub struct Chain<'a> {
    next: Option<&'a Device>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Device;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.child.as_deref();
        Some(current)
    }
}

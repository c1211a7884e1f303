//! Vertex, index and instance buffers

use hashbrown::HashMap;

use crate::device::{
    ActiveAttribute, BufferTarget, BufferUsage, ComponentType, GpuBuffer, GpuDevice, IndexType,
};
use crate::scene::{AttributeData, BufferAttribute, Geometry, GeometryId, Instancing, NodeId};
use crate::state::GpuState;

/// Bytes per instance matrix (4 columns of vec4)
const MATRIX_STRIDE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferEntry {
    buffer: GpuBuffer,
    version: u64,
    bytes: usize,
    component: ComponentType,
}

/// Line index derived from a triangle geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireframeIndex {
    pub buffer: GpuBuffer,
    pub count: u32,
    pub index_type: IndexType,
    /// Version of the index (or position) attribute it was built from
    source_version: u64,
}

#[derive(Debug, Default)]
struct GeometryBuffers {
    attributes: HashMap<String, BufferEntry>,
    morph: HashMap<String, Vec<BufferEntry>>,
    index: Option<BufferEntry>,
    wireframe: Option<WireframeIndex>,
}

#[derive(Debug)]
struct InstanceBuffers {
    matrices: BufferEntry,
    colors: Option<BufferEntry>,
}

/// Owns every vertex buffer created for scene geometry.
#[derive(Debug, Default)]
pub struct AttributeManager {
    geometries: HashMap<GeometryId, GeometryBuffers>,
    instances: HashMap<NodeId, InstanceBuffers>,
}

impl AttributeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of geometries with live GPU buffers.
    pub fn count(&self) -> usize {
        self.geometries.len()
    }

    /// Upload attributes, morph targets and the index of `geometry` where
    /// their version moved. Returns true if anything was uploaded.
    pub fn update_geometry<D: GpuDevice>(
        &mut self,
        state: &mut GpuState<D>,
        geometry: &mut Geometry,
    ) -> bool {
        let buffers = self.geometries.entry(geometry.id()).or_default();
        let mut uploaded = false;

        for (name, attribute) in geometry.attributes_mut() {
            let existing = buffers.attributes.get(name).copied();
            if let Some(entry) = sync_buffer(state, existing, BufferTarget::Array, attribute) {
                buffers.attributes.insert(name.to_string(), entry);
                uploaded = true;
            }
        }

        for (name, targets) in geometry.morph_attributes_mut() {
            let entries = buffers.morph.entry(name.to_string()).or_default();
            for (i, attribute) in targets.iter_mut().enumerate() {
                let existing = entries.get(i).copied();
                if let Some(entry) = sync_buffer(state, existing, BufferTarget::Array, attribute) {
                    if i < entries.len() {
                        entries[i] = entry;
                    } else {
                        entries.push(entry);
                    }
                    uploaded = true;
                }
            }
        }

        if let Some(index) = geometry.index_mut()
            && let Some(entry) = sync_buffer(state, buffers.index, BufferTarget::ElementArray, index)
        {
            buffers.index = Some(entry);
            uploaded = true;
        }

        if uploaded {
            tracing::trace!("Updated buffers of geometry {:?}", geometry.id());
        }
        uploaded
    }

    /// Upload per-instance matrices and colours of `node`.
    pub fn update_instancing<D: GpuDevice>(
        &mut self,
        state: &mut GpuState<D>,
        node: NodeId,
        instancing: &mut Instancing,
    ) -> bool {
        let existing = self.instances.get(&node);
        let matrices_entry = existing.map(|i| i.matrices);
        let colors_entry = existing.and_then(|i| i.colors);

        let matrices = sync_buffer(state, matrices_entry, BufferTarget::Array, &mut instancing.matrices);
        let colors = match &mut instancing.colors {
            Some(colors) => sync_buffer(state, colors_entry, BufferTarget::Array, colors),
            None => None,
        };
        let changed = matrices.is_some() || colors.is_some();

        let (Some(matrices), colors) = (matrices.or(matrices_entry), colors.or(colors_entry)) else {
            return false;
        };
        self.instances
            .insert(node, InstanceBuffers { matrices, colors });
        changed
    }

    /// Bind every attribute `attributes` asks for and disable the rest.
    ///
    /// Attributes the geometry does not provide stay disabled and read the
    /// driver's constant default.
    pub fn setup_vertex_attributes<D: GpuDevice>(
        &self,
        state: &mut GpuState<D>,
        attributes: &[ActiveAttribute],
        geometry: &Geometry,
        node: Option<NodeId>,
    ) {
        let Some(buffers) = self.geometries.get(&geometry.id()) else {
            return;
        };
        let instances = node.and_then(|n| self.instances.get(&n));

        state.init_attributes();
        for attribute in attributes {
            let location = attribute.location;
            match attribute.name.as_str() {
                "instanceMatrix" => {
                    let Some(instances) = instances else { continue };
                    state.bind_buffer(BufferTarget::Array, Some(instances.matrices.buffer));
                    for column in 0..4 {
                        state.enable_attribute(location + column, 1);
                        state.vertex_attrib_pointer(
                            location + column,
                            4,
                            ComponentType::Float,
                            false,
                            MATRIX_STRIDE,
                            column as usize * 16,
                        );
                    }
                }
                "instanceColor" => {
                    let Some(colors) = instances.and_then(|i| i.colors) else {
                        continue;
                    };
                    state.bind_buffer(BufferTarget::Array, Some(colors.buffer));
                    state.enable_attribute(location, 1);
                    state.vertex_attrib_pointer(location, 3, ComponentType::Float, false, 0, 0);
                }
                name => {
                    let source = match morph_target_slot(name) {
                        Some((morph_name, index)) => buffers
                            .morph
                            .get(morph_name)
                            .and_then(|entries| entries.get(index))
                            .zip(
                                geometry
                                    .morph_attribute(morph_name)
                                    .and_then(|targets| targets.get(index)),
                            ),
                        None => buffers
                            .attributes
                            .get(name)
                            .zip(geometry.attribute(name)),
                    };
                    let Some((entry, data)) = source else { continue };
                    state.bind_buffer(BufferTarget::Array, Some(entry.buffer));
                    state.enable_attribute(location, 0);
                    state.vertex_attrib_pointer(
                        location,
                        data.item_size,
                        entry.component,
                        data.normalized,
                        0,
                        0,
                    );
                }
            }
        }
        state.disable_unused_attributes();
    }

    /// Index buffer of `geometry`, if it is indexed and uploaded.
    pub fn index_buffer(&self, geometry: &Geometry) -> Option<(GpuBuffer, IndexType)> {
        let entry = self.geometries.get(&geometry.id())?.index?;
        let index_type = match entry.component {
            ComponentType::UnsignedShort => IndexType::U16,
            _ => IndexType::U32,
        };
        Some((entry.buffer, index_type))
    }

    /// Line-list index for drawing `geometry` as wireframe, rebuilt when the
    /// source index or positions change.
    pub fn update_wireframe<D: GpuDevice>(
        &mut self,
        state: &mut GpuState<D>,
        geometry: &Geometry,
    ) -> Option<WireframeIndex> {
        let source_version = match (geometry.index(), geometry.attribute("position")) {
            (Some(index), _) => index.version(),
            (None, Some(position)) => position.version(),
            (None, None) => return None,
        };
        let buffers = self.geometries.entry(geometry.id()).or_default();
        if let Some(wireframe) = buffers.wireframe
            && wireframe.source_version == source_version
        {
            return Some(wireframe);
        }

        let lines = wireframe_lines(geometry);
        let max = lines.iter().copied().max().unwrap_or(0);
        let data = if max > u32::from(u16::MAX) {
            AttributeData::U32(lines)
        } else {
            AttributeData::U16(lines.into_iter().map(|i| i as u16).collect())
        };
        let index_type = match data {
            AttributeData::U16(_) => IndexType::U16,
            _ => IndexType::U32,
        };

        let buffer = match buffers.wireframe {
            Some(old) => old.buffer,
            None => state.device_mut().create_buffer(),
        };
        state.bind_buffer(BufferTarget::ElementArray, Some(buffer));
        state.device_mut().buffer_data(
            BufferTarget::ElementArray,
            data.as_bytes(),
            BufferUsage::StaticDraw,
        );
        let wireframe = WireframeIndex {
            buffer,
            count: data.len() as u32,
            index_type,
            source_version,
        };
        buffers.wireframe = Some(wireframe);
        Some(wireframe)
    }

    pub fn dispose_geometry<D: GpuDevice>(&mut self, state: &mut GpuState<D>, id: GeometryId) {
        let Some(buffers) = self.geometries.remove(&id) else {
            return;
        };
        let morph = buffers.morph.into_values().flatten();
        for entry in buffers.attributes.into_values().chain(morph).chain(buffers.index) {
            state.delete_buffer(entry.buffer);
        }
        if let Some(wireframe) = buffers.wireframe {
            state.delete_buffer(wireframe.buffer);
        }
    }

    pub fn dispose_instances<D: GpuDevice>(&mut self, state: &mut GpuState<D>, node: NodeId) {
        if let Some(instances) = self.instances.remove(&node) {
            state.delete_buffer(instances.matrices.buffer);
            if let Some(colors) = instances.colors {
                state.delete_buffer(colors.buffer);
            }
        }
    }

    /// Geometries with buffers, for pruning against the scene.
    pub fn geometry_ids(&self) -> impl Iterator<Item = GeometryId> + '_ {
        self.geometries.keys().copied()
    }

    /// Nodes with instance buffers, for pruning against the scene.
    pub fn instanced_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.instances.keys().copied()
    }

    /// Forget every buffer without deleting it (context lost).
    pub fn reset(&mut self) {
        self.geometries.clear();
        self.instances.clear();
    }
}

/// Create or update the buffer behind `attribute`.
///
/// Returns the new entry when the GPU was touched. Pending update ranges are
/// uploaded with sub-data calls as long as the buffer size is unchanged.
fn sync_buffer<D: GpuDevice>(
    state: &mut GpuState<D>,
    existing: Option<BufferEntry>,
    target: BufferTarget,
    attribute: &mut BufferAttribute,
) -> Option<BufferEntry> {
    if existing.is_some_and(|e| e.version == attribute.version()) {
        return None;
    }
    let data = attribute.data();
    let bytes = data.as_bytes();
    let component = data.component_type();

    let entry = match existing {
        Some(entry) => {
            state.bind_buffer(target, Some(entry.buffer));
            if entry.bytes != bytes.len() || entry.component != component {
                state
                    .device_mut()
                    .buffer_data(target, bytes, attribute.usage);
            } else if attribute.update_ranges().is_empty() {
                state.device_mut().buffer_sub_data(target, 0, bytes);
            } else {
                let size = component.bytes();
                for range in attribute.update_ranges() {
                    let start = range.start * size;
                    let end = (range.end * size).min(bytes.len());
                    if start < end {
                        state
                            .device_mut()
                            .buffer_sub_data(target, start, &bytes[start..end]);
                    }
                }
            }
            entry.buffer
        }
        None => {
            let buffer = state.device_mut().create_buffer();
            state.bind_buffer(target, Some(buffer));
            state
                .device_mut()
                .buffer_data(target, bytes, attribute.usage);
            buffer
        }
    };

    let entry = BufferEntry {
        buffer: entry,
        version: attribute.version(),
        bytes: bytes.len(),
        component,
    };
    attribute.clear_update_ranges();
    Some(entry)
}

/// `morphTarget3` -> (`position`, 3), `morphNormal0` -> (`normal`, 0)
fn morph_target_slot(name: &str) -> Option<(&'static str, usize)> {
    if let Some(index) = name.strip_prefix("morphTarget") {
        return index.parse().ok().map(|i| ("position", i));
    }
    if let Some(index) = name.strip_prefix("morphNormal") {
        return index.parse().ok().map(|i| ("normal", i));
    }
    None
}

/// Three edges per triangle as a line list.
fn wireframe_lines(geometry: &Geometry) -> Vec<u32> {
    let triangle = |a: u32, b: u32, c: u32| [a, b, b, c, c, a];
    match (geometry.index(), geometry.attribute("position")) {
        (Some(index), _) => {
            let data = index.data();
            (0..data.len() / 3)
                .flat_map(|t| {
                    triangle(
                        data.index_at(t * 3),
                        data.index_at(t * 3 + 1),
                        data.index_at(t * 3 + 2),
                    )
                })
                .collect()
        }
        (None, Some(position)) => (0..position.count() / 3)
            .flat_map(|t| triangle(t * 3, t * 3 + 1, t * 3 + 2))
            .collect(),
        (None, None) => Vec::new(),
    }
}

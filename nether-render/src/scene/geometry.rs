//! Geometry buffers and vertex attributes

use std::ops::Range;

use glam::Vec3;
use hashbrown::HashMap;

use super::camera::Sphere;
use super::{GeometryId, next_resource_id};
use crate::device::{BufferUsage, ComponentType};

/// Typed CPU-side attribute storage.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    F32(Vec<f32>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl AttributeData {
    pub fn len(&self) -> usize {
        match self {
            AttributeData::F32(v) => v.len(),
            AttributeData::U16(v) => v.len(),
            AttributeData::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            AttributeData::F32(_) => ComponentType::Float,
            AttributeData::U16(_) => ComponentType::UnsignedShort,
            AttributeData::U32(_) => ComponentType::UnsignedInt,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AttributeData::F32(v) => bytemuck::cast_slice(v),
            AttributeData::U16(v) => bytemuck::cast_slice(v),
            AttributeData::U32(v) => bytemuck::cast_slice(v),
        }
    }

    /// Element at `index` widened to u32 (index buffers).
    pub fn index_at(&self, index: usize) -> u32 {
        match self {
            AttributeData::F32(v) => v[index] as u32,
            AttributeData::U16(v) => u32::from(v[index]),
            AttributeData::U32(v) => v[index],
        }
    }
}

/// One vertex attribute (or index buffer) with change tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferAttribute {
    data: AttributeData,
    pub item_size: u32,
    pub normalized: bool,
    pub usage: BufferUsage,
    version: u64,
    /// Element ranges modified since the last upload
    update_ranges: Vec<Range<usize>>,
}

impl BufferAttribute {
    pub fn new(data: AttributeData, item_size: u32) -> Self {
        Self {
            data,
            item_size,
            normalized: false,
            usage: BufferUsage::StaticDraw,
            version: 0,
            update_ranges: Vec::new(),
        }
    }

    pub fn from_f32(data: Vec<f32>, item_size: u32) -> Self {
        Self::new(AttributeData::F32(data), item_size)
    }

    pub fn from_u16(data: Vec<u16>) -> Self {
        Self::new(AttributeData::U16(data), 1)
    }

    pub fn from_u32(data: Vec<u32>) -> Self {
        Self::new(AttributeData::U32(data), 1)
    }

    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn data(&self) -> &AttributeData {
        &self.data
    }

    /// Mutable data access; the whole buffer is re-uploaded unless update
    /// ranges are added afterwards.
    pub fn data_mut(&mut self) -> &mut AttributeData {
        self.version += 1;
        self.update_ranges.clear();
        &mut self.data
    }

    /// Overwrite a sub-range of a float attribute and mark only that range.
    pub fn write_f32(&mut self, start: usize, values: &[f32]) {
        if let AttributeData::F32(data) = &mut self.data {
            let end = (start + values.len()).min(data.len());
            data[start..end].copy_from_slice(&values[..end - start]);
            self.version += 1;
            self.update_ranges.push(start..end);
        }
    }

    /// Mark the attribute dirty without touching its data.
    pub fn needs_update(&mut self) {
        self.version += 1;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn update_ranges(&self) -> &[Range<usize>] {
        &self.update_ranges
    }

    pub(crate) fn clear_update_ranges(&mut self) {
        self.update_ranges.clear();
    }

    /// Number of items (vertices, or indices for an index buffer).
    pub fn count(&self) -> u32 {
        (self.data.len() / self.item_size.max(1) as usize) as u32
    }

    pub fn vec3(&self, index: usize) -> Option<Vec3> {
        match &self.data {
            AttributeData::F32(v) if self.item_size >= 3 => {
                let base = index * self.item_size as usize;
                v.get(base..base + 3).map(Vec3::from_slice)
            }
            _ => None,
        }
    }
}

/// Sub-range of a geometry drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryGroup {
    pub start: u32,
    pub count: u32,
    pub material_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    id: GeometryId,
    pub name: String,
    attributes: HashMap<String, BufferAttribute>,
    index: Option<BufferAttribute>,
    pub groups: Vec<GeometryGroup>,
    /// First element and optional element count to draw
    pub draw_range: (u32, Option<u32>),
    morph_attributes: HashMap<String, Vec<BufferAttribute>>,
    /// Morph data stores offsets from the base attribute
    pub morph_targets_relative: bool,
    bounding_sphere: Option<Sphere>,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl Geometry {
    pub fn new() -> Self {
        Self {
            id: GeometryId(next_resource_id()),
            name: String::new(),
            attributes: HashMap::new(),
            index: None,
            groups: Vec::new(),
            draw_range: (0, None),
            morph_attributes: HashMap::new(),
            morph_targets_relative: false,
            bounding_sphere: None,
        }
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn with_attribute(mut self, name: &str, attribute: BufferAttribute) -> Self {
        self.set_attribute(name, attribute);
        self
    }

    pub fn with_index(mut self, index: BufferAttribute) -> Self {
        self.index = Some(index);
        self
    }

    pub fn set_attribute(&mut self, name: &str, attribute: BufferAttribute) {
        if name == "position" {
            self.bounding_sphere = None;
        }
        self.attributes.insert(name.to_string(), attribute);
    }

    pub fn attribute(&self, name: &str) -> Option<&BufferAttribute> {
        self.attributes.get(name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut BufferAttribute> {
        if name == "position" {
            self.bounding_sphere = None;
        }
        self.attributes.get_mut(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &BufferAttribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn attributes_mut(&mut self) -> impl Iterator<Item = (&str, &mut BufferAttribute)> {
        self.attributes.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn index(&self) -> Option<&BufferAttribute> {
        self.index.as_ref()
    }

    pub fn index_mut(&mut self) -> Option<&mut BufferAttribute> {
        self.index.as_mut()
    }

    pub fn set_index(&mut self, index: Option<BufferAttribute>) {
        self.index = index;
    }

    pub fn add_group(&mut self, start: u32, count: u32, material_index: usize) {
        self.groups.push(GeometryGroup {
            start,
            count,
            material_index,
        });
    }

    pub fn set_morph_attribute(&mut self, name: &str, targets: Vec<BufferAttribute>) {
        self.morph_attributes.insert(name.to_string(), targets);
    }

    pub fn morph_attribute(&self, name: &str) -> Option<&[BufferAttribute]> {
        self.morph_attributes.get(name).map(Vec::as_slice)
    }

    pub(crate) fn morph_attributes_mut(
        &mut self,
    ) -> impl Iterator<Item = (&str, &mut Vec<BufferAttribute>)> {
        self.morph_attributes.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Total drawable element count before the draw range is applied.
    pub fn element_count(&self) -> u32 {
        match (&self.index, self.attributes.get("position")) {
            (Some(index), _) => index.count(),
            (None, Some(position)) => position.count(),
            (None, None) => 0,
        }
    }

    pub fn bounding_sphere(&self) -> Option<Sphere> {
        self.bounding_sphere
    }

    /// Compute (or reuse) the bounding sphere from the position attribute.
    pub fn compute_bounding_sphere(&mut self) -> Sphere {
        if let Some(sphere) = self.bounding_sphere {
            return sphere;
        }
        let sphere = match self.attributes.get("position") {
            Some(position) if position.count() > 0 => {
                let count = position.count() as usize;
                let (mut min, mut max) = (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN));
                for i in 0..count {
                    if let Some(p) = position.vec3(i) {
                        min = min.min(p);
                        max = max.max(p);
                    }
                }
                let center = (min + max) * 0.5;
                let radius = (0..count)
                    .filter_map(|i| position.vec3(i))
                    .map(|p| p.distance_squared(center))
                    .fold(0.0f32, f32::max)
                    .sqrt();
                Sphere::new(center, radius)
            }
            _ => Sphere::default(),
        };
        self.bounding_sphere = Some(sphere);
        sphere
    }

    /// Axis-aligned box centred at the origin, 24 vertices, 36 indices.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let (hx, hy, hz) = (width * 0.5, height * 0.5, depth * 0.5);
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];
        let half = Vec3::new(hx, hy, hz);
        let mut positions = Vec::with_capacity(72);
        let mut normals = Vec::with_capacity(72);
        let mut uvs = Vec::with_capacity(48);
        let mut indices = Vec::with_capacity(36);
        for (face, (normal, u, v)) in faces.iter().enumerate() {
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = (*normal + *u * su + *v * sv) * half;
                positions.extend_from_slice(&p.to_array());
                normals.extend_from_slice(&normal.to_array());
                uvs.extend_from_slice(&[(su + 1.0) * 0.5, (sv + 1.0) * 0.5]);
            }
            let base = (face * 4) as u16;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Geometry::new()
            .with_attribute("position", BufferAttribute::from_f32(positions, 3))
            .with_attribute("normal", BufferAttribute::from_f32(normals, 3))
            .with_attribute("uv", BufferAttribute::from_f32(uvs, 2))
            .with_index(BufferAttribute::from_u16(indices))
    }

    /// Single triangle covering the whole viewport (used for full-screen passes).
    pub fn fullscreen_triangle() -> Self {
        Geometry::new()
            .with_attribute(
                "position",
                BufferAttribute::from_f32(vec![-1.0, 3.0, 0.0, -1.0, -1.0, 0.0, 3.0, -1.0, 0.0], 3),
            )
            .with_attribute(
                "uv",
                BufferAttribute::from_f32(vec![0.0, 2.0, 0.0, 0.0, 2.0, 0.0], 2),
            )
    }
}

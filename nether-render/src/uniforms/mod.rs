//! Uniform upload layer
//!
//! Every linked program owns a [`UniformTable`]: the active uniforms reported
//! by the driver, keyed by name, together with the last value uploaded to
//! each location. [`UniformTable::set`] flattens a [`UniformValue`], compares
//! it against that cache and only reaches the driver when the components
//! differ.
//!
//! Sampler uniforms hold texture ids; the [`UniformSink`] resolves them to a
//! texture unit (allocated per draw by [`TextureUnits`]) and binds the GPU
//! texture through the state cache. The unit index itself is then diffed like
//! any other integer uniform.

mod refresh;

#[cfg(test)]
mod tests;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use hashbrown::HashMap;
use smallvec::SmallVec;

pub(crate) use refresh::{
    MaterialContext, refresh_camera, refresh_clipping, refresh_fog, refresh_material,
    refresh_object, refresh_skinning,
};

use crate::device::{ActiveUniform, TextureTarget, UniformLocation, UniformType, UniformUpload};
use crate::scene::TextureId;

/// A uniform value as set by materials, lights and the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
    FloatArray(Vec<f32>),
    Vec2Array(Vec<Vec2>),
    Vec3Array(Vec<Vec3>),
    Vec4Array(Vec<Vec4>),
    Mat4Array(Vec<Mat4>),
    /// `None` samples an unbound unit
    Texture(Option<TextureId>),
    TextureArray(Vec<Option<TextureId>>),
}

impl UniformValue {
    /// Texture ids referenced by this value.
    pub fn textures(&self) -> Vec<TextureId> {
        match self {
            UniformValue::Texture(texture) => texture.iter().copied().collect(),
            UniformValue::TextureArray(textures) => textures.iter().flatten().copied().collect(),
            _ => Vec::new(),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                fn from(value: $ty) -> Self {
                    UniformValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_value!(
    f32 => Float,
    i32 => Int,
    u32 => UInt,
    bool => Bool,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat3 => Mat3,
    Mat4 => Mat4,
    Vec<f32> => FloatArray,
    Vec<Vec3> => Vec3Array,
    Vec<Vec4> => Vec4Array,
    Vec<Mat4> => Mat4Array,
);

/// Where uniform uploads and sampler bindings go.
pub trait UniformSink {
    fn upload(&mut self, location: UniformLocation, value: UniformUpload<'_>);

    /// Bind `texture` for sampling on a freshly allocated unit and return
    /// that unit.
    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>) -> u32;
}

/// Last uploaded components of one uniform
#[derive(Debug, Clone, PartialEq)]
enum Uploaded {
    Floats(Vec<f32>),
    Ints(Vec<i32>),
    UInts(Vec<u32>),
}

#[derive(Debug, Clone)]
struct UniformEntry {
    location: UniformLocation,
    kind: UniformType,
    size: u32,
    cache: Option<Uploaded>,
}

/// Active uniforms of one program with their last uploaded values.
#[derive(Debug, Clone, Default)]
pub struct UniformTable {
    entries: HashMap<String, UniformEntry>,
}

impl UniformTable {
    /// Build the table from driver reflection.
    ///
    /// Primitive arrays are reported as `name[0]` and stored as `name`;
    /// struct members keep their full path (`pointLights[1].color`).
    pub fn from_active(active: &[ActiveUniform]) -> Self {
        let entries = active
            .iter()
            .map(|uniform| {
                let name = uniform
                    .name
                    .strip_suffix("[0]")
                    .unwrap_or(&uniform.name)
                    .to_string();
                (
                    name,
                    UniformEntry {
                        location: uniform.location,
                        kind: uniform.kind,
                        size: uniform.size.max(1),
                        cache: None,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every cached value so the next `set` uploads unconditionally.
    pub fn invalidate(&mut self) {
        for entry in self.entries.values_mut() {
            entry.cache = None;
        }
    }

    /// Upload `value` to `name` if it differs from the cached value.
    ///
    /// Unknown names are ignored (the shader does not use the uniform).
    /// Returns true if an upload was issued.
    pub fn set(&mut self, sink: &mut impl UniformSink, name: &str, value: &UniformValue) -> bool {
        let Some(entry) = self.entries.get_mut(name) else {
            return false;
        };

        if entry.kind.is_sampler() {
            let target = entry.kind.sampler_target().unwrap_or(TextureTarget::Texture2D);
            let units: SmallVec<[i32; 4]> = match value {
                UniformValue::Texture(texture) => {
                    smallvec::smallvec![sink.bind_texture(target, *texture) as i32]
                }
                UniformValue::TextureArray(textures) => textures
                    .iter()
                    .take(entry.size as usize)
                    .map(|texture| sink.bind_texture(target, *texture) as i32)
                    .collect(),
                other => {
                    tracing::debug!("sampler uniform {} given non-texture value {:?}", name, other);
                    return false;
                }
            };
            return upload_ints(entry, sink, &units);
        }

        let limit = entry.size as usize;
        match value {
            UniformValue::Float(v) => upload_floats(entry, sink, std::slice::from_ref(v)),
            UniformValue::Vec2(v) => upload_floats(entry, sink, &v.to_array()),
            UniformValue::Vec3(v) => upload_floats(entry, sink, &v.to_array()),
            UniformValue::Vec4(v) => upload_floats(entry, sink, &v.to_array()),
            UniformValue::Mat3(m) => upload_floats(entry, sink, &m.to_cols_array()),
            UniformValue::Mat4(m) => upload_floats(entry, sink, &m.to_cols_array()),
            UniformValue::FloatArray(values) => {
                upload_floats(entry, sink, &values[..values.len().min(limit)])
            }
            UniformValue::Vec2Array(values) => upload_floats(
                entry,
                sink,
                bytemuck::cast_slice(&values[..values.len().min(limit)]),
            ),
            UniformValue::Vec3Array(values) => upload_floats(
                entry,
                sink,
                bytemuck::cast_slice(&values[..values.len().min(limit)]),
            ),
            UniformValue::Vec4Array(values) => upload_floats(
                entry,
                sink,
                bytemuck::cast_slice(&values[..values.len().min(limit)]),
            ),
            UniformValue::Mat4Array(values) => upload_floats(
                entry,
                sink,
                bytemuck::cast_slice(&values[..values.len().min(limit)]),
            ),
            UniformValue::Int(v) => match entry.kind {
                UniformType::Float => upload_floats(entry, sink, &[*v as f32]),
                UniformType::UInt => upload_uints(entry, sink, &[*v as u32]),
                _ => upload_ints(entry, sink, std::slice::from_ref(v)),
            },
            UniformValue::UInt(v) => match entry.kind {
                UniformType::UInt => upload_uints(entry, sink, std::slice::from_ref(v)),
                _ => upload_ints(entry, sink, &[*v as i32]),
            },
            UniformValue::Bool(v) => match entry.kind {
                UniformType::Float => upload_floats(entry, sink, &[f32::from(u8::from(*v))]),
                _ => upload_ints(entry, sink, &[i32::from(*v)]),
            },
            UniformValue::Texture(_) | UniformValue::TextureArray(_) => {
                tracing::debug!("texture value given to non-sampler uniform {}", name);
                false
            }
        }
    }
}

fn upload_floats(entry: &mut UniformEntry, sink: &mut impl UniformSink, values: &[f32]) -> bool {
    if values.is_empty() {
        return false;
    }
    if let Some(Uploaded::Floats(cached)) = &entry.cache
        && cached.as_slice() == values
    {
        return false;
    }
    let upload = match entry.kind {
        UniformType::Vec2 => UniformUpload::Vec2(values),
        UniformType::Vec3 => UniformUpload::Vec3(values),
        UniformType::Vec4 => UniformUpload::Vec4(values),
        UniformType::Mat3 => UniformUpload::Mat3(values),
        UniformType::Mat4 => UniformUpload::Mat4(values),
        _ => UniformUpload::Float(values),
    };
    sink.upload(entry.location, upload);
    entry.cache = Some(Uploaded::Floats(values.to_vec()));
    true
}

fn upload_ints(entry: &mut UniformEntry, sink: &mut impl UniformSink, values: &[i32]) -> bool {
    if values.is_empty() {
        return false;
    }
    if let Some(Uploaded::Ints(cached)) = &entry.cache
        && cached.as_slice() == values
    {
        return false;
    }
    sink.upload(entry.location, UniformUpload::Int(values));
    entry.cache = Some(Uploaded::Ints(values.to_vec()));
    true
}

fn upload_uints(entry: &mut UniformEntry, sink: &mut impl UniformSink, values: &[u32]) -> bool {
    if values.is_empty() {
        return false;
    }
    if let Some(Uploaded::UInts(cached)) = &entry.cache
        && cached.as_slice() == values
    {
        return false;
    }
    sink.upload(entry.location, UniformUpload::UInt(values));
    entry.cache = Some(Uploaded::UInts(values.to_vec()));
    true
}

/// Per-draw texture unit allocator.
///
/// Units are handed out sequentially from 0 and wrap over the device budget;
/// the first overflow logs a warning.
#[derive(Debug, Clone)]
pub struct TextureUnits {
    next: u32,
    max: u32,
    warned: bool,
}

impl TextureUnits {
    pub fn new(max: u32) -> Self {
        Self {
            next: 0,
            max: max.max(1),
            warned: false,
        }
    }

    /// Start a new draw.
    pub fn reset(&mut self) {
        self.next = 0;
    }

    pub fn allocate(&mut self) -> u32 {
        let requested = self.next;
        self.next += 1;
        if requested >= self.max && !self.warned {
            self.warned = true;
            tracing::warn!(
                "trying to use {} texture units while this device supports only {}",
                requested + 1,
                self.max
            );
        }
        requested % self.max
    }

    pub fn in_use(&self) -> u32 {
        self.next
    }
}

/// Table + sink pair used while preparing one draw.
pub struct UniformWriter<'a, S: UniformSink> {
    table: &'a mut UniformTable,
    sink: &'a mut S,
}

impl<'a, S: UniformSink> UniformWriter<'a, S> {
    pub fn new(table: &'a mut UniformTable, sink: &'a mut S) -> Self {
        Self { table, sink }
    }

    pub fn has(&self, name: &str) -> bool {
        self.table.contains(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) -> bool {
        let value = value.into();
        self.table.set(&mut *self.sink, name, &value)
    }

    pub fn set_ref(&mut self, name: &str, value: &UniformValue) -> bool {
        self.table.set(&mut *self.sink, name, value)
    }

    /// Compute the value only if the program uses `name`.
    pub fn set_with<V: Into<UniformValue>>(&mut self, name: &str, value: impl FnOnce() -> V) -> bool {
        if !self.table.contains(name) {
            return false;
        }
        self.set(name, value())
    }

    pub fn texture(&mut self, name: &str, texture: Option<TextureId>) -> bool {
        self.set(name, UniformValue::Texture(texture))
    }
}

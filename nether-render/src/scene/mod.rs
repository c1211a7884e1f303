//! Minimal scene object model read by the renderer
//!
//! Nodes live in an arena addressed by [`NodeId`]; geometries, materials and
//! textures live in id-keyed tables so that the renderer can hold plain ids
//! in its caches instead of references.

pub mod camera;
pub mod geometry;
pub mod light;
pub mod material;
pub mod texture;

use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Quat, Vec3};
use hashbrown::HashMap;

pub use camera::{Camera, Frustum, Layers, Plane, Projection, Sphere};
pub use geometry::{AttributeData, BufferAttribute, Geometry, GeometryGroup};
pub use light::{Light, LightKind, LightShadow, ShadowCameraBounds};
pub use material::{
    Blending, CustomBlending, DepthPacking, Material, MaterialKind, ShaderMaterial, Side,
    StencilState,
};
pub use texture::{
    DepthTexture, Image, RenderTarget, RenderTargetKind, Texture, TextureKind,
};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide id source shared by materials, geometries, textures and
/// render targets.
pub(crate) fn next_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetId(pub u64);

/// How a drawable's vertices are assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    LineStrip,
    LineLoop,
    LineSegments,
    Points,
}

/// One material for the whole geometry, or one per geometry group
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialSlot {
    Single(MaterialId),
    PerGroup(Vec<MaterialId>),
}

impl MaterialSlot {
    pub fn ids(&self) -> &[MaterialId] {
        match self {
            MaterialSlot::Single(id) => std::slice::from_ref(id),
            MaterialSlot::PerGroup(ids) => ids,
        }
    }
}

/// Per-instance transforms (and optional colours) for instanced drawing
#[derive(Debug, Clone, PartialEq)]
pub struct Instancing {
    /// 16 floats per instance
    pub matrices: BufferAttribute,
    /// 3 floats per instance
    pub colors: Option<BufferAttribute>,
    pub count: u32,
}

impl Instancing {
    pub fn new(matrices: &[Mat4]) -> Self {
        let data = matrices.iter().flat_map(|m| m.to_cols_array()).collect();
        Self {
            matrices: BufferAttribute::from_f32(data, 16),
            colors: None,
            count: matrices.len() as u32,
        }
    }
}

/// Bone matrices of a skinned mesh, already multiplied by their inverses
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    pub bone_matrices: Vec<Mat4>,
    pub bind_matrix: Mat4,
    pub bind_matrix_inverse: Mat4,
}

/// Mesh, line or point cloud
#[derive(Debug, Clone, PartialEq)]
pub struct Drawable {
    pub geometry: GeometryId,
    pub materials: MaterialSlot,
    pub primitive: Primitive,
    pub instancing: Option<Instancing>,
    pub skeleton: Option<Skeleton>,
    pub morph_influences: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Drawable(Box<Drawable>),
    Light(Light),
}

/// Scene graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    world: Mat4,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pub visible: bool,
    pub layers: Layers,
    pub frustum_culled: bool,
    pub render_order: i32,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            name: String::new(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            world: Mat4::IDENTITY,
            parent: None,
            children: Vec::new(),
            visible: true,
            layers: Layers::default(),
            frustum_culled: true,
            render_order: 0,
            cast_shadow: false,
            receive_shadow: false,
            kind,
        }
    }

    pub fn group() -> Self {
        Self::new(NodeKind::Group)
    }

    fn drawable(geometry: GeometryId, materials: MaterialSlot, primitive: Primitive) -> Self {
        Self::new(NodeKind::Drawable(Box::new(Drawable {
            geometry,
            materials,
            primitive,
            instancing: None,
            skeleton: None,
            morph_influences: Vec::new(),
        })))
    }

    pub fn mesh(geometry: GeometryId, material: MaterialId) -> Self {
        Self::drawable(geometry, MaterialSlot::Single(material), Primitive::Triangles)
    }

    /// Mesh drawing each geometry group with its own material.
    pub fn multi_material_mesh(geometry: GeometryId, materials: Vec<MaterialId>) -> Self {
        Self::drawable(geometry, MaterialSlot::PerGroup(materials), Primitive::Triangles)
    }

    pub fn line(geometry: GeometryId, material: MaterialId, primitive: Primitive) -> Self {
        Self::drawable(geometry, MaterialSlot::Single(material), primitive)
    }

    pub fn points(geometry: GeometryId, material: MaterialId) -> Self {
        Self::drawable(geometry, MaterialSlot::Single(material), Primitive::Points)
    }

    pub fn light(light: Light) -> Self {
        Self::new(NodeKind::Light(light))
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_shadows(mut self, cast: bool, receive: bool) -> Self {
        self.cast_shadow = cast;
        self.receive_shadow = receive;
        self
    }

    pub fn with_render_order(mut self, order: i32) -> Self {
        self.render_order = order;
        self
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// World transform as of the last [`Scene::update_world_matrices`].
    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    pub fn world_position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn as_drawable(&self) -> Option<&Drawable> {
        match &self.kind {
            NodeKind::Drawable(drawable) => Some(drawable),
            _ => None,
        }
    }

    pub fn as_drawable_mut(&mut self) -> Option<&mut Drawable> {
        match &mut self.kind {
            NodeKind::Drawable(drawable) => Some(drawable),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    Color(Vec3),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fog {
    Linear { color: Vec3, near: f32, far: f32 },
    Exp2 { color: Vec3, density: f32 },
}

/// Node arena plus resource tables.
#[derive(Debug, Default)]
pub struct Scene {
    nodes: Vec<Option<Node>>,
    roots: Vec<NodeId>,
    geometries: HashMap<GeometryId, Geometry>,
    materials: HashMap<MaterialId, Material>,
    textures: HashMap<TextureId, Texture>,
    pub background: Option<Background>,
    pub fog: Option<Fog>,
    /// Replaces every drawable's material when set
    pub override_material: Option<MaterialId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root node.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = self.insert(node, None);
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.insert(node, Some(parent));
        if let Some(p) = self.node_mut(parent) {
            p.children.push(id);
        }
        id
    }

    fn insert(&mut self, mut node: Node, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.parent = parent;
        node.children.clear();
        self.nodes.push(Some(node));
        id
    }

    /// Remove a node and all of its descendants.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.get_mut(id.0 as usize)?.take()?;
        for child in &node.children {
            self.remove(*child);
        }
        match node.parent {
            Some(parent) => {
                if let Some(p) = self.node_mut(parent) {
                    p.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
        Some(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Live nodes in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    /// Depth-first visit in declaration order, skipping invisible subtrees.
    pub fn visit_visible<'a>(&'a self, mut visit: impl FnMut(NodeId, &'a Node)) {
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            visit(id, node);
            stack.extend(node.children.iter().rev());
        }
    }

    /// Propagate local transforms down the hierarchy.
    pub fn update_world_matrices(&mut self) {
        let mut stack: Vec<(NodeId, Mat4)> =
            self.roots.iter().map(|r| (*r, Mat4::IDENTITY)).collect();
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.node_mut(id) else {
                continue;
            };
            node.world = parent_world * node.local_matrix();
            let world = node.world;
            stack.extend(node.children.iter().map(|c| (*c, world)));
        }
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        let id = geometry.id();
        self.geometries.insert(id, geometry);
        id
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(&id)
    }

    pub fn geometry_mut(&mut self, id: GeometryId) -> Option<&mut Geometry> {
        self.geometries.get_mut(&id)
    }

    pub fn remove_geometry(&mut self, id: GeometryId) -> Option<Geometry> {
        self.geometries.remove(&id)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = material.id();
        self.materials.insert(id, material);
        id
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    /// Mutable access; bumps the material version.
    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        let material = self.materials.get_mut(&id)?;
        material.needs_update();
        Some(material)
    }

    pub fn remove_material(&mut self, id: MaterialId) -> Option<Material> {
        self.materials.remove(&id)
    }

    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.materials.values()
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        let id = texture.id();
        self.textures.insert(id, texture);
        id
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(&id)
    }

    /// Mutable access; schedules a full re-upload.
    pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut Texture> {
        let texture = self.textures.get_mut(&id)?;
        texture.needs_update();
        Some(texture)
    }

    /// Mutable access without scheduling an upload (use with
    /// [`Texture::update_region`]).
    pub fn texture_mut_untracked(&mut self, id: TextureId) -> Option<&mut Texture> {
        self.textures.get_mut(&id)
    }

    pub fn remove_texture(&mut self, id: TextureId) -> Option<Texture> {
        self.textures.remove(&id)
    }

    /// Split borrow used by the upload sync phase.
    pub(crate) fn resources_mut(
        &mut self,
    ) -> (
        &mut [Option<Node>],
        &mut HashMap<GeometryId, Geometry>,
        &mut HashMap<TextureId, Texture>,
        &HashMap<MaterialId, Material>,
    ) {
        (
            &mut self.nodes,
            &mut self.geometries,
            &mut self.textures,
            &self.materials,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_matrices_propagate() {
        let mut scene = Scene::new();
        let parent = scene.add(Node::group().with_position(Vec3::new(1.0, 0.0, 0.0)));
        let child = scene.add_child(parent, Node::group().with_position(Vec3::new(0.0, 2.0, 0.0)));
        scene.update_world_matrices();
        let world = scene.node(child).unwrap().world_position();
        assert!((world - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_remove_subtree() {
        let mut scene = Scene::new();
        let parent = scene.add(Node::group());
        let child = scene.add_child(parent, Node::group());
        scene.remove(parent);
        assert!(scene.node(parent).is_none());
        assert!(scene.node(child).is_none());
        assert!(scene.roots().is_empty());
    }

    #[test]
    fn test_invisible_subtree_is_skipped() {
        let mut scene = Scene::new();
        let parent = scene.add(Node::group());
        scene.add_child(parent, Node::group());
        let hidden = scene.add(Node::group());
        scene.add_child(hidden, Node::group());
        scene.node_mut(hidden).unwrap().visible = false;

        let mut visited = Vec::new();
        scene.visit_visible(|id, _| visited.push(id));
        assert_eq!(visited, vec![NodeId(0), NodeId(1)]);

        // Visited nodes borrow from the scene, not from the walk
        let mut nodes: Vec<&Node> = Vec::new();
        scene.visit_visible(|_, node| nodes.push(node));
        assert!(nodes.iter().all(|n| n.visible));
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_material_mut_bumps_version() {
        let mut scene = Scene::new();
        let id = scene.add_material(Material::default());
        let before = scene.material(id).unwrap().version();
        scene.material_mut(id).unwrap().opacity = 0.5;
        assert_eq!(scene.material(id).unwrap().version(), before + 1);
    }
}

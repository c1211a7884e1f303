//! The `render` pipeline

use glam::{Vec2, Vec3};

use super::Renderer;
use super::draw::{DrawCall, DrawContext};
use crate::device::{ClearMask, Filter, GpuDevice, InternalFormat, PixelType};
use crate::error::RenderError;
use crate::lights::LightSource;
use crate::render_list::{RenderItem, RenderList};
use crate::scene::{
    Background, Camera, Frustum, LightKind, MaterialSlot, NodeId, NodeKind, RenderTarget, Scene,
    Side,
};
use crate::shadow::spot_map_matrix;

impl<D: GpuDevice> Renderer<D> {
    /// Render `scene` as seen from `camera` into the current render target.
    ///
    /// # Errors
    ///
    /// [`RenderError::ContextLost`] while the device context is lost; the
    /// frame is skipped and every cache is rebuilt once it comes back.
    pub fn render(&mut self, scene: &mut Scene, camera: &Camera) -> Result<(), RenderError> {
        self.check_context()?;

        self.core.programs.collect(&mut self.core.state);
        scene.update_world_matrices();
        self.sync_resources(scene);
        let drawn = self.render_frame(scene, camera)?;

        // One-shot requests are consumed once the map has been drawn
        for light in drawn {
            if let Some(shadow) = scene
                .node_mut(light)
                .and_then(|n| n.as_light_mut())
                .and_then(|l| l.shadow.as_mut())
            {
                shadow.needs_update = false;
            }
        }
        Ok(())
    }

    fn render_frame(
        &mut self,
        scene: &Scene,
        camera: &Camera,
    ) -> Result<Vec<NodeId>, RenderError> {
        self.core.info.reset();
        self.core.info.frame += 1;
        let local_clipping = self.core.config.render.local_clipping_enabled;
        self.core.clipping.set_local_enabled(local_clipping);

        // Projection
        let frustum = Frustum::from_matrix(&camera.view_projection());
        self.render_list.init();
        let lights = project(scene, camera, &frustum, &mut self.render_list);
        self.render_list.finish();
        if self.core.config.render.sort_objects {
            self.render_list
                .sort(self.opaque_sort, self.transparent_sort);
        }

        // Lights and shadows
        self.core.lights.setup(&lights);
        self.core.shadow_settings = self.shadow_map.settings;
        let rendered = self
            .shadow_map
            .render(&mut self.core, scene, camera, &lights);
        self.core.shadow_settings = self.shadow_map.settings;
        let shadow_map = &self.shadow_map;
        self.core.lights.apply_shadows(|node| shadow_map.binding(node));
        let spot_shadows = self.core.lights.counts().spot_shadows as usize;
        let map_only = lights.iter().filter(|l| {
            matches!(l.light.kind, LightKind::Spot { map: Some(_), .. })
                && !(l.cast_shadow && l.light.shadow.is_some())
        });
        for (j, source) in map_only.enumerate() {
            let matrix =
                spot_map_matrix(&source.light.kind, source.light.shadow.as_ref(), &source.world);
            self.core.lights.set_spot_map_matrix(spot_shadows + j, matrix);
        }
        self.core.lights.setup_view(camera);

        // Target and background
        let selection = self.render_target.clone();
        match &selection {
            Some(s) => self.core.bind_target(Some(&s.target), s.face, s.level)?,
            None => self.core.bind_target(None, 0, 0)?,
        }
        self.draw_background(scene);

        // Colour passes
        let opaque: Vec<RenderItem> = self.render_list.opaque().copied().collect();
        let transmissive: Vec<RenderItem> = self.render_list.transmissive().copied().collect();
        let transparent: Vec<RenderItem> = self.render_list.transparent().copied().collect();

        render_items(&mut self.core, scene, camera, &opaque);
        if !transmissive.is_empty() {
            self.render_transmission_pass(scene, camera, &opaque, &transmissive)?;
        }
        render_items(&mut self.core, scene, camera, &transmissive);
        render_items(&mut self.core, scene, camera, &transparent);

        // Resolve the bound target
        if let Some(s) = &selection {
            let core = &mut self.core;
            if s.target.samples > 0 {
                core.textures
                    .update_multisample_render_target(&mut core.state, &s.target);
            }
            core.textures
                .update_render_target_mipmap(&mut core.state, &s.target);
        }

        // Leave writes enabled for whoever clears next
        let state = &mut self.core.state;
        state.set_depth_test(true);
        state.set_depth_write(true);
        state.set_color_mask(true);
        state.set_polygon_offset(None);
        self.core.transmission = None;

        Ok(rendered)
    }

    /// Upload textures, geometries and instance buffers whose versions moved.
    pub(super) fn sync_resources(&mut self, scene: &mut Scene) {
        let core = &mut self.core;
        let (nodes, geometries, textures, _) = scene.resources_mut();
        for texture in textures.values_mut() {
            core.textures
                .upload_texture(&mut core.state, &core.caps, texture);
        }
        for (index, node) in nodes.iter_mut().enumerate() {
            let Some(node) = node else {
                continue;
            };
            let NodeKind::Drawable(drawable) = &mut node.kind else {
                continue;
            };
            if let Some(geometry) = geometries.get_mut(&drawable.geometry) {
                geometry.compute_bounding_sphere();
                core.attributes.update_geometry(&mut core.state, geometry);
            }
            if let Some(instancing) = &mut drawable.instancing {
                core.attributes.update_instancing(
                    &mut core.state,
                    NodeId(index as u32),
                    instancing,
                );
            }
        }
    }

    fn draw_background(&mut self, scene: &Scene) {
        let settings = &self.core.config.render;
        let (color, alpha) = match scene.background {
            Some(Background::Color(color)) => (color, 1.0),
            None => (self.clear_color, self.clear_alpha),
        };
        let force = scene.background.is_some();
        let mut mask = ClearMask::empty();
        if settings.auto_clear || force {
            if settings.auto_clear_color || force {
                mask |= ClearMask::COLOR;
            }
            if settings.auto_clear_depth {
                mask |= ClearMask::DEPTH;
            }
            if settings.auto_clear_stencil {
                mask |= ClearMask::STENCIL;
            }
        }
        if mask.is_empty() {
            return;
        }
        self.apply_clear_color(color, alpha);
        self.core.clear(mask);
    }

    /// Capture the opaque scene (plus back faces of double-sided
    /// transmissive objects) into a mip-mapped target for refraction.
    fn render_transmission_pass(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        opaque: &[RenderItem],
        transmissive: &[RenderItem],
    ) -> Result<(), RenderError> {
        let (width, height) = self.core.surface.drawing_buffer_size();
        let scale = self.core.config.render.transmission_resolution_scale;
        let size = (
            ((width as f32 * scale) as u32).max(1),
            ((height as f32 * scale) as u32).max(1),
        );
        let float_type = self.core.caps.float_target_type();
        let antialias = self.core.config.antialias;
        let target = self.transmission_target.get_or_insert_with(|| {
            let mut target = RenderTarget::new(size.0, size.1);
            target.name = "transmission".into();
            target.generate_mipmaps = true;
            target.min_filter = Filter::LinearMipmapLinear;
            target.data_type = float_type;
            if float_type == PixelType::HalfFloat {
                target.internal_format = InternalFormat::Rgba16F;
            }
            target.samples = if antialias { 4 } else { 0 };
            target
        });
        target.set_size(size.0, size.1);
        let target = target.clone();

        let previous = self.core.target.take();
        self.core.transmission = None;
        self.core.bind_target(Some(&target), 0, 0)?;
        // A translucent canvas would show through the refraction
        let (clear_color, clear_alpha) = if self.clear_alpha < 1.0 {
            (Vec3::ONE, 0.5)
        } else {
            (self.clear_color, self.clear_alpha)
        };
        self.apply_clear_color(clear_color, clear_alpha);
        self.core.clear(ClearMask::COLOR | ClearMask::DEPTH | ClearMask::STENCIL);

        render_items(&mut self.core, scene, camera, opaque);
        for item in transmissive {
            let Some(material) = scene.material(item.material) else {
                continue;
            };
            if material.side == Side::Double {
                render_item(&mut self.core, scene, camera, item, Side::Back);
            }
        }

        let core = &mut self.core;
        if target.samples > 0 {
            core.textures
                .update_multisample_render_target(&mut core.state, &target);
        }
        core.textures
            .update_render_target_mipmap(&mut core.state, &target);
        core.restore_target(previous);
        self.apply_clear_color(self.clear_color, self.clear_alpha);
        let resolution = Vec2::new(size.0 as f32, size.1 as f32);
        self.core.transmission = Some((target.texture(), resolution));
        Ok(())
    }
}

/// Lights collected during projection, for the shadow pass and the light
/// uniforms.
pub(super) fn collect_lights<'a>(scene: &'a Scene, camera: &Camera) -> Vec<LightSource<'a>> {
    let mut lights = Vec::new();
    scene.visit_visible(|id, node| {
        if let Some(light) = node.as_light()
            && camera.layers.test(node.layers)
        {
            lights.push(LightSource {
                node: id,
                light,
                world: node.world_matrix(),
                cast_shadow: node.cast_shadow,
            });
        }
    });
    lights
}

/// Walk the visible hierarchy, filling `list` and returning the lights.
///
/// Groups with a non-zero render order pass it on to their descendants as
/// the group order. Drawables outside `frustum` are culled unless frustum
/// culling is off for them or they are instanced.
fn project<'a>(
    scene: &'a Scene,
    camera: &Camera,
    frustum: &Frustum,
    list: &mut RenderList,
) -> Vec<LightSource<'a>> {
    let view_projection = camera.view_projection();
    let mut lights = Vec::new();
    let mut stack: Vec<(NodeId, i32)> = scene.roots().iter().rev().map(|r| (*r, 0)).collect();

    while let Some((id, group_order)) = stack.pop() {
        let Some(node) = scene.node(id) else {
            continue;
        };
        if !node.visible {
            continue;
        }
        let mut child_order = group_order;
        if camera.layers.test(node.layers) {
            match &node.kind {
                NodeKind::Group => {
                    if node.render_order != 0 {
                        child_order = node.render_order;
                    }
                }
                NodeKind::Light(light) => lights.push(LightSource {
                    node: id,
                    light,
                    world: node.world_matrix(),
                    cast_shadow: node.cast_shadow,
                }),
                NodeKind::Drawable(drawable) => {
                    let sphere = scene
                        .geometry(drawable.geometry)
                        .and_then(|g| g.bounding_sphere())
                        .map(|s| s.transformed(&node.world_matrix()));
                    let culled = node.frustum_culled
                        && drawable.instancing.is_none()
                        && sphere.is_some_and(|s| !frustum.intersects_sphere(&s));
                    if !culled {
                        let center = sphere.map_or_else(|| node.world_position(), |s| s.center);
                        let z = view_projection.project_point3(center).z;
                        push_drawable(scene, list, id, node.render_order, group_order, z);
                    }
                }
            }
        }
        stack.extend(node.children().iter().rev().map(|c| (*c, child_order)));
    }
    lights
}

fn push_drawable(
    scene: &Scene,
    list: &mut RenderList,
    id: NodeId,
    render_order: i32,
    group_order: i32,
    z: f32,
) {
    let Some(drawable) = scene.node(id).and_then(|n| n.as_drawable()) else {
        return;
    };
    let Some(geometry) = scene.geometry(drawable.geometry) else {
        return;
    };
    let item = |material, group| RenderItem {
        node: id,
        geometry: drawable.geometry,
        material,
        group_order,
        render_order,
        z,
        group,
    };
    match &drawable.materials {
        MaterialSlot::PerGroup(materials) if !geometry.groups.is_empty() => {
            for group in &geometry.groups {
                let Some(material_id) = materials.get(group.material_index) else {
                    continue;
                };
                if let Some(material) = scene.material(*material_id)
                    && material.visible
                {
                    list.push(item(*material_id, Some(*group)), material);
                }
            }
        }
        slot => {
            let Some(material_id) = slot.ids().first() else {
                return;
            };
            if let Some(material) = scene.material(*material_id)
                && material.visible
            {
                list.push(item(*material_id, None), material);
            }
        }
    }
}

/// Draw `items` in order. Transparent double-sided materials draw back
/// faces first, then front faces.
fn render_items<D: GpuDevice>(
    ctx: &mut DrawContext<D>,
    scene: &Scene,
    camera: &Camera,
    items: &[RenderItem],
) {
    for item in items {
        let material_id = scene.override_material.unwrap_or(item.material);
        let Some(material) = scene.material(material_id) else {
            continue;
        };
        if material.transparent && material.side == Side::Double {
            render_item(ctx, scene, camera, item, Side::Back);
            render_item(ctx, scene, camera, item, Side::Front);
        } else {
            render_item(ctx, scene, camera, item, material.side);
        }
    }
}

fn render_item<D: GpuDevice>(
    ctx: &mut DrawContext<D>,
    scene: &Scene,
    camera: &Camera,
    item: &RenderItem,
    side: Side,
) {
    let material_id = scene.override_material.unwrap_or(item.material);
    let (Some(node), Some(geometry), Some(material)) = (
        scene.node(item.node),
        scene.geometry(item.geometry),
        scene.material(material_id),
    ) else {
        return;
    };
    let draw = DrawCall {
        camera,
        node: Some((item.node, node)),
        geometry,
        material,
        group: item.group,
        side,
    };
    ctx.render_buffer_direct(scene, &draw);
}

//! Per-frame render lists
//!
//! The renderer pushes every drawable that survived culling into one of
//! three buckets: opaque, transmissive (sampled through the opaque capture)
//! and transparent. Items live in a pool that grows to the largest frame seen
//! and is reused afterwards; buckets only hold pool indices.
//!
//! Transparent items are sorted back to front per object. Intersecting
//! transparent geometry is therefore only approximately ordered; there is no
//! per-fragment sort.

use std::cmp::Ordering;

use crate::scene::{GeometryGroup, GeometryId, Material, MaterialId, NodeId};

/// One drawable sub-range of one object for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    pub node: NodeId,
    pub geometry: GeometryId,
    pub material: MaterialId,
    /// Render order inherited from the closest ordered group ancestor
    pub group_order: i32,
    pub render_order: i32,
    /// Depth in camera space (NDC z of the object's centre)
    pub z: f32,
    /// Geometry group drawn, `None` for the whole draw range
    pub group: Option<GeometryGroup>,
}

/// Item comparator used to sort one bucket.
pub type RenderItemCompare = fn(&RenderItem, &RenderItem) -> Ordering;

/// Default opaque order: state clustering, then front to back.
pub fn painter_sort_stable(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.group_order
        .cmp(&b.group_order)
        .then(a.render_order.cmp(&b.render_order))
        .then(a.material.cmp(&b.material))
        .then(a.z.total_cmp(&b.z))
        .then(a.node.cmp(&b.node))
}

/// Default transparent order: back to front.
pub fn reverse_painter_sort_stable(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.group_order
        .cmp(&b.group_order)
        .then(a.render_order.cmp(&b.render_order))
        .then(b.z.total_cmp(&a.z))
        .then(a.node.cmp(&b.node))
}

/// Bucket an item lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Opaque,
    Transmissive,
    Transparent,
}

impl Bucket {
    pub fn of(material: &Material) -> Self {
        if material.transmission > 0.0 {
            Bucket::Transmissive
        } else if material.transparent {
            Bucket::Transparent
        } else {
            Bucket::Opaque
        }
    }
}

#[derive(Debug, Default)]
pub struct RenderList {
    pool: Vec<Option<RenderItem>>,
    used: usize,
    opaque: Vec<usize>,
    transmissive: Vec<usize>,
    transparent: Vec<usize>,
}

impl RenderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a frame; buckets are emptied, storage is kept.
    pub fn init(&mut self) {
        self.used = 0;
        self.opaque.clear();
        self.transmissive.clear();
        self.transparent.clear();
    }

    /// Classify and append an item. Culling is the caller's job.
    pub fn push(&mut self, item: RenderItem, material: &Material) -> Bucket {
        let index = self.next_slot(item);
        let bucket = Bucket::of(material);
        match bucket {
            Bucket::Opaque => self.opaque.push(index),
            Bucket::Transmissive => self.transmissive.push(index),
            Bucket::Transparent => self.transparent.push(index),
        }
        bucket
    }

    /// Like [`RenderList::push`], but placed before everything already in
    /// its bucket.
    pub fn unshift(&mut self, item: RenderItem, material: &Material) -> Bucket {
        let index = self.next_slot(item);
        let bucket = Bucket::of(material);
        match bucket {
            Bucket::Opaque => self.opaque.insert(0, index),
            Bucket::Transmissive => self.transmissive.insert(0, index),
            Bucket::Transparent => self.transparent.insert(0, index),
        }
        bucket
    }

    fn next_slot(&mut self, item: RenderItem) -> usize {
        let index = self.used;
        match self.pool.get_mut(index) {
            Some(slot) => *slot = Some(item),
            None => self.pool.push(Some(item)),
        }
        self.used += 1;
        index
    }

    /// Clear pool slots left over from a larger earlier frame.
    pub fn finish(&mut self) {
        for slot in &mut self.pool[self.used..] {
            if slot.is_none() {
                break;
            }
            *slot = None;
        }
    }

    /// Sort the buckets; `None` keeps insertion order for that bucket.
    pub fn sort(
        &mut self,
        opaque: Option<RenderItemCompare>,
        transparent: Option<RenderItemCompare>,
    ) {
        let pool = &self.pool;
        let by = |compare: RenderItemCompare| {
            move |a: &usize, b: &usize| match (&pool[*a], &pool[*b]) {
                (Some(a), Some(b)) => compare(a, b),
                _ => Ordering::Equal,
            }
        };
        if self.opaque.len() > 1
            && let Some(compare) = opaque
        {
            self.opaque.sort_by(by(compare));
        }
        if let Some(compare) = transparent {
            if self.transmissive.len() > 1 {
                self.transmissive.sort_by(by(compare));
            }
            if self.transparent.len() > 1 {
                self.transparent.sort_by(by(compare));
            }
        }
    }

    fn items<'a>(&'a self, bucket: &'a [usize]) -> impl Iterator<Item = &'a RenderItem> + 'a {
        bucket.iter().filter_map(|i| self.pool[*i].as_ref())
    }

    pub fn opaque(&self) -> impl Iterator<Item = &RenderItem> + '_ {
        self.items(&self.opaque)
    }

    pub fn transmissive(&self) -> impl Iterator<Item = &RenderItem> + '_ {
        self.items(&self.transmissive)
    }

    pub fn transparent(&self) -> impl Iterator<Item = &RenderItem> + '_ {
        self.items(&self.transparent)
    }

    pub fn bucket(&self, bucket: Bucket) -> Vec<RenderItem> {
        match bucket {
            Bucket::Opaque => self.opaque().copied().collect(),
            Bucket::Transmissive => self.transmissive().copied().collect(),
            Bucket::Transparent => self.transparent().copied().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Pool slots currently holding an item, live or stale.
    pub fn pooled(&self) -> usize {
        self.pool.iter().filter(|slot| slot.is_some()).count()
    }

    /// Drop pool storage entirely.
    pub fn dispose(&mut self) {
        self.pool = Vec::new();
        self.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(node: u32, material: &Material, z: f32) -> RenderItem {
        RenderItem {
            node: NodeId(node),
            geometry: GeometryId(1),
            material: material.id(),
            group_order: 0,
            render_order: 0,
            z,
            group: None,
        }
    }

    fn nodes<'a>(items: impl Iterator<Item = &'a RenderItem>) -> Vec<u32> {
        items.map(|i| i.node.0).collect()
    }

    #[test]
    fn test_classification() {
        let opaque = Material::default();
        let transparent = Material::default().with_transparency(0.5);
        let mut transmissive = Material::default();
        transmissive.transmission = 1.0;
        transmissive.transparent = true;

        let mut list = RenderList::new();
        list.init();
        assert_eq!(list.push(item(0, &opaque, 0.0), &opaque), Bucket::Opaque);
        assert_eq!(list.push(item(1, &transparent, 0.0), &transparent), Bucket::Transparent);
        assert_eq!(list.push(item(2, &transmissive, 0.0), &transmissive), Bucket::Transmissive);
        list.finish();

        assert_eq!(nodes(list.opaque()), vec![0]);
        assert_eq!(nodes(list.transparent()), vec![1]);
        assert_eq!(nodes(list.transmissive()), vec![2]);
    }

    #[test]
    fn test_transparent_back_to_front() {
        let material = Material::default().with_transparency(0.5);
        let mut list = RenderList::new();
        list.init();
        for (node, z) in [(0, 0.2), (1, 0.9), (2, 0.5), (3, 0.7)] {
            list.push(item(node, &material, z), &material);
        }
        list.sort(Some(painter_sort_stable), Some(reverse_painter_sort_stable));

        let depths: Vec<f32> = list.transparent().map(|i| i.z).collect();
        assert!(depths.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(nodes(list.transparent()), vec![1, 3, 2, 0]);
    }

    #[test]
    fn test_opaque_clusters_by_material() {
        let a = Material::default();
        let b = Material::default();
        let mut list = RenderList::new();
        list.init();
        list.push(item(0, &a, 0.1), &a);
        list.push(item(1, &b, 0.2), &b);
        list.push(item(2, &a, 0.3), &a);
        list.push(item(3, &b, 0.4), &b);
        list.sort(Some(painter_sort_stable), Some(reverse_painter_sort_stable));

        let materials: Vec<MaterialId> = list.opaque().map(|i| i.material).collect();
        assert_eq!(materials, vec![a.id(), a.id(), b.id(), b.id()]);
        assert_eq!(nodes(list.opaque()), vec![0, 2, 1, 3]);
    }

    #[test]
    fn test_render_order_precedes_material_and_depth() {
        let a = Material::default();
        let b = Material::default();
        let mut list = RenderList::new();
        list.init();
        let mut late = item(0, &a, 0.0);
        late.render_order = 1;
        list.push(late, &a);
        list.push(item(1, &b, 0.9), &b);
        let mut grouped = item(2, &a, 0.0);
        grouped.group_order = -1;
        list.push(grouped, &a);
        list.sort(Some(painter_sort_stable), Some(reverse_painter_sort_stable));

        assert_eq!(nodes(list.opaque()), vec![2, 1, 0]);
    }

    #[test]
    fn test_opaque_ties_break_on_depth_then_node() {
        let material = Material::default();
        let mut list = RenderList::new();
        list.init();
        list.push(item(5, &material, 0.5), &material);
        list.push(item(4, &material, 0.5), &material);
        list.push(item(6, &material, 0.1), &material);
        list.sort(Some(painter_sort_stable), None);
        assert_eq!(nodes(list.opaque()), vec![6, 4, 5]);
    }

    #[test]
    fn test_no_comparator_keeps_insertion_order() {
        let material = Material::default().with_transparency(0.5);
        let mut list = RenderList::new();
        list.init();
        list.push(item(0, &material, 0.1), &material);
        list.push(item(1, &material, 0.9), &material);
        list.sort(None, None);
        assert_eq!(nodes(list.transparent()), vec![0, 1]);
    }

    #[test]
    fn test_pool_is_reused_and_stale_slots_cleared() {
        let material = Material::default();
        let mut list = RenderList::new();
        list.init();
        for node in 0..4 {
            list.push(item(node, &material, 0.0), &material);
        }
        list.finish();
        assert_eq!(list.pooled(), 4);

        list.init();
        list.push(item(9, &material, 0.0), &material);
        list.finish();
        assert_eq!(list.len(), 1);
        assert_eq!(list.pooled(), 1);
        assert_eq!(nodes(list.opaque()), vec![9]);
    }

    #[test]
    fn test_unshift_goes_first() {
        let material = Material::default();
        let mut list = RenderList::new();
        list.init();
        list.push(item(0, &material, 0.0), &material);
        list.unshift(item(1, &material, 0.0), &material);
        assert_eq!(nodes(list.opaque()), vec![1, 0]);
    }
}

//! Per-slot geometry
//!
//! Every skeleton slot owns one [`SlotRenderable`] for the lifetime of the
//! mesh. Its buffers are rewritten in place each frame and only grow.

use glam::Vec2;

use crate::material::MaterialHandle;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SlotVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl SlotVertex {
    #[cfg(feature = "gpu")]
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
    ];

    #[cfg(feature = "gpu")]
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SlotVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Grow-only buffer with a logical length tracked apart from its storage.
///
/// Shrinking the logical length keeps the storage, so a slot whose clipped
/// vertex count oscillates never reallocates.
#[derive(Debug, Clone)]
pub struct GrowableBuffer<T> {
    data: Vec<T>,
    len: usize,
    grows: usize,
}

impl<T> Default for GrowableBuffer<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            len: 0,
            grows: 0,
        }
    }
}

impl<T: Copy + Default> GrowableBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the logical contents, growing storage only when needed.
    pub fn write(&mut self, items: impl ExactSizeIterator<Item = T>) {
        let needed = items.len();
        if needed > self.data.len() {
            self.data.resize(needed, T::default());
            self.grows += 1;
        }
        for (dst, src) in self.data.iter_mut().zip(items) {
            *dst = src;
        }
        self.len = needed;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// How many times storage has been reallocated.
    pub fn grows(&self) -> usize {
        self.grows
    }
}

/// Persistent draw item bound to one slot.
#[derive(Debug, Default)]
pub struct SlotRenderable {
    slot_name: String,
    vertices: GrowableBuffer<SlotVertex>,
    indices: GrowableBuffer<u16>,
    material: Option<MaterialHandle>,
    pub render_order: f32,
    /// Combined tint. Premultiplied by alpha for basic materials; recolor
    /// materials receive alpha through their own uniform and keep white here.
    pub tint: [f32; 4],
    pub visible: bool,
    /// Bumped whenever geometry is rewritten; GPU backends re-upload on change.
    generation: u64,
}

impl SlotRenderable {
    pub fn new(slot_name: impl Into<String>) -> Self {
        Self {
            slot_name: slot_name.into(),
            tint: [1.0; 4],
            ..Default::default()
        }
    }

    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }

    pub fn set_geometry(&mut self, positions: &[Vec2], uvs: &[Vec2], triangles: &[u16]) {
        self.vertices.write(
            positions
                .iter()
                .zip(uvs)
                .map(|(p, uv)| SlotVertex {
                    position: p.to_array(),
                    uv: uv.to_array(),
                }),
        );
        self.indices.write(triangles.iter().copied());
        self.generation += 1;
    }

    pub fn vertices(&self) -> &[SlotVertex] {
        self.vertices.as_slice()
    }

    pub fn indices(&self) -> &[u16] {
        self.indices.as_slice()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_buffer(&self) -> &GrowableBuffer<SlotVertex> {
        &self.vertices
    }

    pub fn index_buffer(&self) -> &GrowableBuffer<u16> {
        &self.indices
    }

    pub fn material(&self) -> Option<&MaterialHandle> {
        self.material.as_ref()
    }

    pub fn set_material(&mut self, material: Option<MaterialHandle>) {
        self.material = material;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Hide and drop geometry and material left over from earlier frames.
    pub fn clear(&mut self) {
        self.set_geometry(&[], &[], &[]);
        self.material = None;
        self.visible = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_never_shrinks() {
        let mut buf = GrowableBuffer::<u16>::new();
        buf.write([0, 1, 2, 0, 2, 3].into_iter());
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.grows(), 1);

        buf.write([0, 1, 2].into_iter());
        assert_eq!(buf.as_slice(), &[0, 1, 2]);
        assert_eq!(buf.capacity(), 6);

        buf.write([5, 4, 3, 2, 1, 0].into_iter());
        assert_eq!(buf.grows(), 1);

        buf.write([7; 9].into_iter());
        assert_eq!(buf.grows(), 2);
        assert_eq!(buf.capacity(), 9);
    }

    #[test]
    fn test_renderable_geometry_round_trip() {
        let mut r = SlotRenderable::new("Head");
        let pos = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0)];
        let uvs = [Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), Vec2::new(1.0, 0.0)];
        r.set_geometry(&pos, &uvs, &[0, 1, 2]);

        assert_eq!(r.vertex_count(), 3);
        assert_eq!(r.triangle_count(), 1);
        assert_eq!(r.vertices()[2].position, [1.0, 1.0]);
        assert_eq!(r.vertices()[2].uv, [1.0, 0.0]);
        assert_eq!(r.generation(), 1);
        assert_eq!(r.slot_name(), "Head");
    }

    #[test]
    fn test_slot_vertex_is_pod() {
        let v = [SlotVertex {
            position: [1.0, 2.0],
            uv: [0.5, 0.25],
        }];
        let bytes: &[u8] = bytemuck::cast_slice(&v);
        assert_eq!(bytes.len(), 16);
    }
}

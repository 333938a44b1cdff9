//! Pooled GPU buffers shared by the render batchers
//!
//! Each ring hands out its slots round-robin, one slot per request. A slot
//! is reused only after every other slot of its ring has been handed out,
//! which keeps the CPU from overwriting data the GPU may still be reading.

use cinder_core::{IntSize, RenderConfig, Result};
use cinder_gpu::{
    BufferUsage, GraphicContext, PixelBuffer, Texture2D, TextureFilter, TextureFormat,
    VertexArrayBuffer,
};

struct Ring<T> {
    slots: Vec<Option<T>>,
    current: usize,
    name: &'static str,
}

impl<T> Ring<T> {
    fn new(name: &'static str, count: usize) -> Self {
        Self {
            slots: (0..count.max(1)).map(|_| None).collect(),
            current: 0,
            name,
        }
    }

    /// Advance to the next slot and return it, creating its value on first use
    fn next(&mut self, create: impl FnOnce() -> Result<T>) -> Result<(usize, &mut T)> {
        self.current += 1;
        if self.current == self.slots.len() {
            self.current = 0;
            tracing::trace!(ring = self.name, slots = self.slots.len(), "batch buffer ring wrapped");
        }
        let slot = self.current;
        let value = match &mut self.slots[slot] {
            Some(value) => value,
            empty => empty.insert(create()?),
        };
        Ok((slot, value))
    }

    fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    fn allocated(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Ring-buffered vertex buffers, textures and transfer buffers
pub struct RenderBatchBuffer {
    config: RenderConfig,
    vertex_buffers: Ring<VertexArrayBuffer>,
    rgba32f_textures: Ring<Texture2D>,
    r8_textures: Ring<Texture2D>,
    rgba32f_transfers: Ring<PixelBuffer>,
    r8_transfers: Ring<PixelBuffer>,
}

impl RenderBatchBuffer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            vertex_buffers: Ring::new("vertex", config.vertex_buffer_count),
            rgba32f_textures: Ring::new("rgba32f texture", config.texture_ring_count),
            r8_textures: Ring::new("r8 texture", config.texture_ring_count),
            rgba32f_transfers: Ring::new("rgba32f transfer", config.texture_ring_count),
            r8_transfers: Ring::new("r8 transfer", config.texture_ring_count),
            config,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Byte size of every pooled vertex buffer
    pub fn vertex_buffer_size(&self) -> usize {
        self.config.vertex_buffer_size
    }

    pub fn rgba32f_size(&self) -> IntSize {
        IntSize::new(
            self.config.rgba32f_texture_width,
            self.config.rgba32f_texture_height,
        )
    }

    pub fn r8_size(&self) -> IntSize {
        IntSize::new(self.config.mask_texture_size, self.config.mask_texture_size)
    }

    /// Next vertex buffer and its ring slot
    pub fn get_vertex_buffer(&mut self, gc: &GraphicContext) -> Result<(VertexArrayBuffer, usize)> {
        let size = self.config.vertex_buffer_size;
        let (slot, buffer) = self
            .vertex_buffers
            .next(|| gc.create_vertex_buffer(size, BufferUsage::StreamDraw))?;
        Ok((*buffer, slot))
    }

    pub fn get_texture_rgba32f(&mut self, gc: &GraphicContext) -> Result<Texture2D> {
        let size = self.rgba32f_size();
        let (_, texture) = self.rgba32f_textures.next(|| {
            gc.create_texture(size, TextureFormat::Rgba32f, TextureFilter::Nearest)
        })?;
        Ok(*texture)
    }

    pub fn get_texture_r8(&mut self, gc: &GraphicContext) -> Result<Texture2D> {
        let size = self.r8_size();
        let (_, texture) = self
            .r8_textures
            .next(|| gc.create_texture(size, TextureFormat::R8, TextureFilter::Nearest))?;
        Ok(*texture)
    }

    /// Next float RGBA staging buffer and its ring slot
    pub fn get_transfer_rgba32f(&mut self) -> Result<(usize, &mut PixelBuffer)> {
        let size = self.rgba32f_size();
        self.rgba32f_transfers
            .next(|| PixelBuffer::new(size, TextureFormat::Rgba32f))
    }

    /// Next coverage staging buffer and its ring slot
    pub fn get_transfer_r8(&mut self) -> Result<(usize, &mut PixelBuffer)> {
        let size = self.r8_size();
        self.r8_transfers.next(|| PixelBuffer::new(size, TextureFormat::R8))
    }

    /// A staging buffer handed out earlier by [`Self::get_transfer_rgba32f`]
    pub fn transfer_rgba32f(&mut self, slot: usize) -> Option<&mut PixelBuffer> {
        self.rgba32f_transfers.get_mut(slot)
    }

    pub fn transfer_r8(&mut self, slot: usize) -> Option<&mut PixelBuffer> {
        self.r8_transfers.get_mut(slot)
    }

    /// Count of created vertex buffers, textures and transfer buffers
    pub fn allocated(&self) -> usize {
        self.vertex_buffers.allocated()
            + self.rgba32f_textures.allocated()
            + self.r8_textures.allocated()
            + self.rgba32f_transfers.allocated()
            + self.r8_transfers.allocated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_gpu::SoftwareProvider;

    fn context() -> GraphicContext {
        let size = IntSize::new(32, 32);
        GraphicContext::new(Box::new(SoftwareProvider::new(size).unwrap()), size).unwrap()
    }

    fn config() -> RenderConfig {
        RenderConfig {
            vertex_buffer_size: 256,
            vertex_buffer_count: 3,
            texture_ring_count: 2,
            rgba32f_texture_width: 8,
            rgba32f_texture_height: 2,
            mask_texture_size: 32,
            ..RenderConfig::default()
        }
    }

    #[test]
    fn test_vertex_ring_round_robin() {
        let gc = context();
        let mut pool = RenderBatchBuffer::new(config());
        let (a, slot_a) = pool.get_vertex_buffer(&gc).unwrap();
        let (b, slot_b) = pool.get_vertex_buffer(&gc).unwrap();
        let (c, slot_c) = pool.get_vertex_buffer(&gc).unwrap();
        let (d, slot_d) = pool.get_vertex_buffer(&gc).unwrap();

        assert_eq!(vec![slot_a, slot_b, slot_c, slot_d], vec![1, 2, 0, 1]);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(a, d);
        assert_eq!(a.size, 256);
        assert_eq!(pool.allocated(), 3);
    }

    #[test]
    fn test_textures_created_lazily() {
        let gc = context();
        let mut pool = RenderBatchBuffer::new(config());
        assert_eq!(pool.allocated(), 0);

        let mask = pool.get_texture_r8(&gc).unwrap();
        assert_eq!(mask.format, TextureFormat::R8);
        assert_eq!(mask.size, IntSize::new(32, 32));
        let instances = pool.get_texture_rgba32f(&gc).unwrap();
        assert_eq!(instances.size, IntSize::new(8, 2));
        assert_eq!(pool.allocated(), 2);

        let second = pool.get_texture_r8(&gc).unwrap();
        let third = pool.get_texture_r8(&gc).unwrap();
        assert_ne!(mask, second);
        assert_eq!(mask, third);
        assert_eq!(
            gc.with_provider::<SoftwareProvider, _>(|p| p.texture_filter(&mask))
                .flatten(),
            Some(TextureFilter::Nearest)
        );
    }

    #[test]
    fn test_transfer_slots_stay_addressable() {
        let mut pool = RenderBatchBuffer::new(config());
        let (slot, buffer) = pool.get_transfer_r8().unwrap();
        buffer.data_mut()[0] = 7;
        let (other, _) = pool.get_transfer_r8().unwrap();
        assert_ne!(slot, other);
        assert_eq!(pool.transfer_r8(slot).map(|b| b.data()[0]), Some(7));
        assert!(pool.transfer_rgba32f(0).is_none());
    }
}

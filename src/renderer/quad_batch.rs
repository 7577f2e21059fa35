use glam::Vec2;

use crate::renderer::BatchError;

/// Largest quad count addressable with 16-bit indices.
pub const MAX_QUADS: usize = (u16::MAX as usize + 1) / 4;

/// Floats every vertex reserves for position and texcoord.
pub const BASE_COMPONENTS: usize = 4;

const CORNERS: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
];

const TEXCOORDS: [Vec2; 4] = [
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, 0.0),
];

/// CPU side of a quad batch: a flat `f32` array of interleaved vertices,
/// four per quad, `stride` floats each.
#[derive(Debug, Clone)]
pub struct QuadBatch {
    capacity: usize,
    stride: usize,
    vertices: Vec<f32>,
    len: usize,
}

impl QuadBatch {
    pub fn new(capacity: usize, stride: usize) -> Result<Self, BatchError> {
        if capacity == 0 || capacity > MAX_QUADS {
            return Err(BatchError::InvalidCapacity {
                capacity,
                max: MAX_QUADS,
            });
        }

        if stride < BASE_COMPONENTS {
            return Err(BatchError::InvalidStride(stride));
        }

        let mut vertices = vec![0.0; capacity * 4 * stride];

        for quad in vertices.chunks_exact_mut(4 * stride) {
            for (vertex, texcoord) in quad.chunks_exact_mut(stride).zip(TEXCOORDS) {
                vertex[2] = texcoord.x;
                vertex[3] = texcoord.y;
            }
        }

        Ok(Self {
            capacity,
            stride,
            vertices,
            len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    /// Packs one axis-aligned quad with its lower-left corner at `position`.
    pub fn push(&mut self, position: Vec2, size: Vec2, extra: &[f32]) -> Result<(), BatchError> {
        if extra.len() != self.stride - BASE_COMPONENTS {
            return Err(BatchError::AttributeCount {
                expected: self.stride - BASE_COMPONENTS,
                found: extra.len(),
            });
        }

        if self.is_full() {
            return Err(BatchError::Full(self.capacity));
        }

        let start = self.len * 4 * self.stride;
        let quad = &mut self.vertices[start..start + 4 * self.stride];

        for (vertex, corner) in quad.chunks_exact_mut(self.stride).zip(CORNERS) {
            let pos = position + corner * size;
            vertex[0] = pos.x;
            vertex[1] = pos.y;
            vertex[BASE_COMPONENTS..].copy_from_slice(extra);
        }

        self.len += 1;

        Ok(())
    }

    /// Vertices of the quads pushed since the last clear.
    pub fn pending(&self) -> &[f32] {
        &self.vertices[..self.len * 4 * self.stride]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

/// Two triangles per quad, sharing the 0-2 diagonal. Never indexes past
/// [`MAX_QUADS`], the most a `u16` index can reach.
pub(in crate::renderer) fn quad_indices(capacity: usize) -> Vec<u16> {
    (0..capacity.min(MAX_QUADS))
        .flat_map(|quad| {
            let base = (quad * 4) as u16;
            [base, base + 1, base + 2, base, base + 2, base + 3]
        })
        .collect()
}

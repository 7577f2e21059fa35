use glam::{Vec2, Vec4, vec2, vec4};

use crate::renderer::{ShaderError, UniformBlock};

pub const CAMERA_UNIFORM: &str = "u_camera";
pub const ZOOM_UNIFORM: &str = "u_zoom";

/// 2D camera in world units, where one unit is one pixel at zoom 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec2,
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Camera {
    pub fn new(position: Vec2, zoom: f32) -> Self {
        Self { position, zoom }
    }

    /// `(viewport.x, viewport.y, position.x, position.y)`.
    pub fn uniform(&self, viewport: Vec2) -> Vec4 {
        vec4(viewport.x, viewport.y, self.position.x, self.position.y)
    }

    /// Writes `u_camera` and `u_zoom` into `block`, skipping absent fields.
    pub fn apply(&self, viewport: Vec2, block: &mut UniformBlock) -> Result<(), ShaderError> {
        if block.contains(CAMERA_UNIFORM) {
            block.set(CAMERA_UNIFORM, self.uniform(viewport))?;
        }

        if block.contains(ZOOM_UNIFORM) {
            block.set(ZOOM_UNIFORM, self.zoom)?;
        }

        Ok(())
    }

    /// Same transform the built-in vertex shader applies.
    pub fn world_to_clip(&self, world: Vec2, viewport: Vec2) -> Vec2 {
        (world - self.position) * self.zoom / viewport * 2.0
    }

    /// Maps a window position (origin top-left, y down) to world space.
    pub fn screen_to_world(&self, screen: Vec2, viewport: Vec2) -> Vec2 {
        let clip = vec2(
            screen.x / viewport.x * 2.0 - 1.0,
            1.0 - screen.y / viewport.y * 2.0,
        );

        self.position + clip * viewport / (2.0 * self.zoom)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::renderer::ShaderProgram;

    #[test]
    fn viewport_edges_map_to_clip_edges() {
        let camera = Camera::new(vec2(100.0, 100.0), 1.0);
        let viewport = vec2(512.0, 512.0);

        let clip = camera.world_to_clip(vec2(356.0, -156.0), viewport);
        assert_relative_eq!(clip.x, 1.0);
        assert_relative_eq!(clip.y, -1.0);

        assert_eq!(camera.world_to_clip(camera.position, viewport), Vec2::ZERO);
    }

    #[test]
    fn zoom_scales_around_camera() {
        let camera = Camera::new(Vec2::ZERO, 2.0);
        let clip = camera.world_to_clip(vec2(64.0, 32.0), vec2(256.0, 128.0));

        assert_relative_eq!(clip.x, 1.0);
        assert_relative_eq!(clip.y, 1.0);
    }

    #[test]
    fn screen_to_world_inverts_projection() {
        let camera = Camera::new(vec2(-40.0, 25.0), 1.5);
        let viewport = vec2(800.0, 600.0);

        let center = camera.screen_to_world(viewport / 2.0, viewport);
        assert_relative_eq!(center.x, camera.position.x);
        assert_relative_eq!(center.y, camera.position.y);

        let top_left = camera.screen_to_world(Vec2::ZERO, viewport);
        let clip = camera.world_to_clip(top_left, viewport);
        assert_relative_eq!(clip.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn apply_fills_builtin_uniforms() {
        let mut program = ShaderProgram::base().unwrap().reflection().clone();
        let block = program.uniforms.as_mut().unwrap();

        Camera::new(vec2(100.0, 100.0), 1.0)
            .apply(vec2(512.0, 512.0), block)
            .unwrap();

        let bytes = block.as_bytes();
        assert_eq!(
            bytemuck::pod_read_unaligned::<[f32; 4]>(&bytes[0..16]),
            [512.0, 512.0, 100.0, 100.0]
        );
        assert_eq!(bytemuck::pod_read_unaligned::<f32>(&bytes[16..20]), 1.0);
    }
}

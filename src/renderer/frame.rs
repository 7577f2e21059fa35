use glam::{UVec2, Vec4, uvec2};
use wgpu::{
    Color, CommandEncoderDescriptor, LoadOp, Operations, RenderPassColorAttachment,
    RenderPassDescriptor, StoreOp, TextureView,
};

use crate::renderer::RenderContext;

/// One presented image. The first pass clears the output, later passes load
/// what earlier ones drew.
pub struct Frame<'a> {
    pub(in crate::renderer) output: &'a TextureView,
    pub(in crate::renderer) ctx: RenderContext<'a>,
    clear_color: Color,
    has_rendered: bool,
}

impl<'a> Frame<'a> {
    pub fn new(output: &'a TextureView, clear_color: Vec4, ctx: RenderContext<'a>) -> Self {
        Self {
            output,
            ctx,
            clear_color: Color {
                r: clear_color.x as f64,
                g: clear_color.y as f64,
                b: clear_color.z as f64,
                a: clear_color.w as f64,
            },
            has_rendered: false,
        }
    }

    pub fn size(&self) -> UVec2 {
        uvec2(self.output.texture().width(), self.output.texture().height())
    }

    pub fn ctx(&self) -> RenderContext<'a> {
        self.ctx
    }

    pub fn has_rendered(&self) -> bool {
        self.has_rendered
    }

    pub(in crate::renderer) fn color_attachment(&self) -> RenderPassColorAttachment<'a> {
        let load = if self.has_rendered {
            LoadOp::Load
        } else {
            LoadOp::Clear(self.clear_color)
        };

        RenderPassColorAttachment {
            view: self.output,
            depth_slice: None,
            ops: Operations {
                load,
                store: StoreOp::Store,
            },
            resolve_target: None,
        }
    }

    pub(in crate::renderer) fn mark_rendered(&mut self) {
        self.has_rendered = true;
    }
}

impl<'a> Drop for Frame<'a> {
    fn drop(&mut self) {
        if self.has_rendered {
            return;
        }

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&CommandEncoderDescriptor::default());

        encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("quadbatch clear pass"),
            color_attachments: &[Some(self.color_attachment())],
            timestamp_writes: None,
            occlusion_query_set: None,
            depth_stencil_attachment: None,
            multiview_mask: None,
        });

        self.ctx.queue.submit([encoder.finish()]);
    }
}

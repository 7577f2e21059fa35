use bytemuck::cast_slice;
use glam::Vec2;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, BlendState, Buffer, BufferBindingType,
    BufferDescriptor, BufferUsages, ColorTargetState, ColorWrites, CommandEncoderDescriptor,
    FragmentState, FrontFace, IndexFormat, MultisampleState, PipelineCompilationOptions,
    PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology,
    RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, SamplerBindingType,
    ShaderStages, TextureSampleType, TextureViewDimension, VertexBufferLayout, VertexState,
    VertexStepMode,
    util::{BufferInitDescriptor, DeviceExt},
};

use crate::renderer::{
    Frame, QuadBatch, RenderContext, Shader, ShaderError, Texture, VertexLayout,
    quad_batch::quad_indices,
};

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("batch capacity must be between 1 and {max} quads, got {capacity}")]
    InvalidCapacity { capacity: usize, max: usize },

    #[error("vertex stride must hold at least position and texcoord, got {0} floats")]
    InvalidStride(usize),

    #[error("attribute `{name}` must have 1 to 4 components, got {components}")]
    InvalidAttribute { name: String, components: u32 },

    #[error("attribute `{0}` appears twice in the vertex layout")]
    DuplicateAttribute(String),

    #[error("expected {expected} extra floats per quad, got {found}")]
    AttributeCount { expected: usize, found: usize },

    #[error("batch is full ({0} quads)")]
    Full(usize),

    #[error(transparent)]
    Shader(#[from] ShaderError),
}

/// Packs quads into one dynamic vertex buffer and draws them with a single
/// indexed call per flush.
#[derive(Debug)]
pub struct Batch {
    quads: QuadBatch,
    layout: VertexLayout,
    shader: Shader,
    vertex_buf: Buffer,
    index_buf: Buffer,
    uniform_buf: Option<Buffer>,
    bind_group_layout: BindGroupLayout,
    bind_group: BindGroup,
    pipeline: RenderPipeline,
}

/// Borrow of a [`Batch`] for the duration of a frame. Anything still pending
/// is flushed when it drops.
pub struct BatchFrame<'a, 'b, 'c> {
    batch: &'a mut Batch,
    frame: &'b mut Frame<'c>,
}

impl Batch {
    pub fn new(
        capacity: usize,
        shader: Shader,
        layout: VertexLayout,
        texture: &Texture,
        ctx: RenderContext<'_>,
    ) -> Result<Self, BatchError> {
        let quads = QuadBatch::new(capacity, layout.stride())?;
        let attributes = layout.vertex_attributes(shader.reflection())?;

        let vertex_buf = ctx.device.create_buffer(&BufferDescriptor {
            label: Some("quadbatch vertex buffer"),
            size: (capacity * 4 * layout.stride() * size_of::<f32>()) as u64,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let index_buf = ctx.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("quadbatch index buffer"),
            contents: cast_slice(&quad_indices(capacity)),
            usage: BufferUsages::INDEX,
        });

        let uniform_buf = shader.uniforms().map(|block| {
            ctx.device.create_buffer(&BufferDescriptor {
                label: Some("quadbatch uniform buffer"),
                size: block.size(),
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let bind_group_layout = create_bind_group_layout(&shader, ctx);
        let bind_group = create_bind_group(
            &shader,
            &bind_group_layout,
            uniform_buf.as_ref(),
            texture,
            ctx,
        );

        let pipeline = ctx
            .device
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(format!("quadbatch `{}` pipeline", shader.label()).as_str()),
                cache: None,
                depth_stencil: None,
                layout: Some(
                    &ctx.device
                        .create_pipeline_layout(&PipelineLayoutDescriptor {
                            label: Some("quadbatch pipeline layout"),
                            bind_group_layouts: &[&bind_group_layout],
                            immediate_size: 0,
                        }),
                ),
                multiview_mask: None,
                primitive: PrimitiveState {
                    front_face: FrontFace::Ccw,
                    conservative: false,
                    cull_mode: None,
                    polygon_mode: PolygonMode::Fill,
                    strip_index_format: None,
                    topology: PrimitiveTopology::TriangleList,
                    unclipped_depth: false,
                },
                vertex: VertexState {
                    module: shader.vertex_module(),
                    entry_point: Some(shader.reflection().vertex_entry.as_str()),
                    compilation_options: PipelineCompilationOptions::default(),
                    buffers: &[VertexBufferLayout {
                        array_stride: (layout.stride() * size_of::<f32>()) as u64,
                        step_mode: VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                fragment: Some(FragmentState {
                    module: shader.fragment_module(),
                    targets: &[Some(ColorTargetState {
                        blend: Some(BlendState::ALPHA_BLENDING),
                        format: ctx.surface_format,
                        write_mask: ColorWrites::all(),
                    })],
                    entry_point: Some(shader.reflection().fragment_entry.as_str()),
                    compilation_options: PipelineCompilationOptions::default(),
                }),
                multisample: MultisampleState::default(),
            });

        log::debug!(
            "created batch for shader `{}`: {} quads, stride {}",
            shader.label(),
            capacity,
            layout.stride()
        );

        Ok(Self {
            quads,
            layout,
            shader,
            vertex_buf,
            index_buf,
            uniform_buf,
            bind_group_layout,
            bind_group,
            pipeline,
        })
    }

    pub fn capacity(&self) -> usize {
        self.quads.capacity()
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn shader(&self) -> &Shader {
        &self.shader
    }

    pub fn shader_mut(&mut self) -> &mut Shader {
        &mut self.shader
    }

    pub fn set_texture(&mut self, texture: &Texture, ctx: RenderContext<'_>) {
        self.bind_group = create_bind_group(
            &self.shader,
            &self.bind_group_layout,
            self.uniform_buf.as_ref(),
            texture,
            ctx,
        );
    }

    /// Queues one quad, flushing first if the batch is already full.
    pub fn draw(
        &mut self,
        frame: &mut Frame<'_>,
        position: Vec2,
        size: Vec2,
        extra: &[f32],
    ) -> Result<(), BatchError> {
        if extra.len() != self.layout.extra_components() {
            return Err(BatchError::AttributeCount {
                expected: self.layout.extra_components(),
                found: extra.len(),
            });
        }

        if self.quads.is_full() {
            self.flush(frame);
        }

        self.quads.push(position, size, extra)
    }

    pub fn flush(&mut self, frame: &mut Frame<'_>) {
        if self.quads.is_empty() {
            return;
        }

        let ctx = frame.ctx;

        ctx.queue
            .write_buffer(&self.vertex_buf, 0, cast_slice(self.quads.pending()));

        if let (Some(buf), Some(block)) = (&self.uniform_buf, self.shader.uniforms()) {
            ctx.queue.write_buffer(buf, 0, block.as_bytes());
        }

        let mut encoder = ctx
            .device
            .create_command_encoder(&CommandEncoderDescriptor::default());

        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("quadbatch render pass"),
            color_attachments: &[Some(frame.color_attachment())],
            timestamp_writes: None,
            occlusion_query_set: None,
            depth_stencil_attachment: None,
            multiview_mask: None,
        });

        pass.set_vertex_buffer(0, self.vertex_buf.slice(..));
        pass.set_index_buffer(self.index_buf.slice(..), IndexFormat::Uint16);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_pipeline(&self.pipeline);

        pass.draw_indexed(0..(self.quads.len() * 6) as u32, 0, 0..1);

        drop(pass);

        ctx.queue.submit([encoder.finish()]);

        log::trace!("flushed {} quads", self.quads.len());

        frame.mark_rendered();
        self.quads.clear();
    }

    /// Drops pending quads without drawing them.
    pub fn begin_batch(&mut self) {
        self.quads.clear();
    }

    pub fn begin<'a, 'b, 'c>(&'a mut self, frame: &'b mut Frame<'c>) -> BatchFrame<'a, 'b, 'c> {
        BatchFrame { batch: self, frame }
    }
}

impl<'a, 'b, 'c> BatchFrame<'a, 'b, 'c> {
    pub fn draw(&mut self, position: Vec2, size: Vec2, extra: &[f32]) -> Result<(), BatchError> {
        self.batch.draw(self.frame, position, size, extra)
    }

    pub fn flush(&mut self) {
        self.batch.flush(self.frame);
    }

    pub fn shader_mut(&mut self) -> &mut Shader {
        self.batch.shader_mut()
    }
}

impl<'a, 'b, 'c> Drop for BatchFrame<'a, 'b, 'c> {
    fn drop(&mut self) {
        self.batch.flush(self.frame);
    }
}

fn create_bind_group_layout(shader: &Shader, ctx: RenderContext<'_>) -> BindGroupLayout {
    let reflection = shader.reflection();
    let mut entries = Vec::new();

    if let Some(block) = &reflection.uniforms {
        entries.push(BindGroupLayoutEntry {
            binding: block.binding(),
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
            visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
        });
    }

    if let Some(binding) = reflection.texture {
        entries.push(BindGroupLayoutEntry {
            binding,
            ty: BindingType::Texture {
                sample_type: TextureSampleType::Float { filterable: true },
                view_dimension: TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
            visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
        });
    }

    if let Some(binding) = reflection.sampler {
        entries.push(BindGroupLayoutEntry {
            binding,
            ty: BindingType::Sampler(SamplerBindingType::Filtering),
            count: None,
            visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
        });
    }

    ctx.device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("quadbatch bind group layout"),
            entries: &entries,
        })
}

fn create_bind_group(
    shader: &Shader,
    layout: &BindGroupLayout,
    uniform_buf: Option<&Buffer>,
    texture: &Texture,
    ctx: RenderContext<'_>,
) -> BindGroup {
    let reflection = shader.reflection();
    let mut entries = Vec::new();

    if let (Some(block), Some(buf)) = (&reflection.uniforms, uniform_buf) {
        entries.push(BindGroupEntry {
            binding: block.binding(),
            resource: buf.as_entire_binding(),
        });
    }

    if let Some(binding) = reflection.texture {
        entries.push(BindGroupEntry {
            binding,
            resource: BindingResource::TextureView(texture.view()),
        });
    }

    if let Some(binding) = reflection.sampler {
        entries.push(BindGroupEntry {
            binding,
            resource: BindingResource::Sampler(texture.sampler()),
        });
    }

    ctx.device.create_bind_group(&BindGroupDescriptor {
        label: Some("quadbatch bind group"),
        layout,
        entries: &entries,
    })
}

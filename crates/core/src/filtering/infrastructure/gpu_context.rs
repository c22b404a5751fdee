use std::sync::Arc;

use crate::filtering::domain::image_filter_backend::FilterError;

/// Shared wgpu state for the pixelate and blend compute passes.
///
/// Device, queue and both pipelines are created once and reused for every
/// frame.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pixelate_pipeline: wgpu::ComputePipeline,
    blend_pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// Packed params matching the WGSL uniform layout (48 bytes, 12 x 4).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuFilterParams {
    pub width: u32,
    pub height: u32,
    pub block_size: f32,
    pub origin_x: f32,
    pub origin_y: f32,
    pub blocks_x: u32,
    pub blocks_y: u32,
    pub first_block_x: i32,
    pub first_block_y: i32,
    pub _pad0: u32,
    pub _pad1: u32,
    pub _pad2: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpuPass {
    Pixelate,
    Blend,
}

const WORKGROUP_SIZE: u32 = 8;

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GpuContext {
    /// Create a new GPU context. Returns `None` if no suitable adapter is available.
    pub fn new() -> Option<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;
        log::debug!("GPU adapter: {:?}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("facepixel-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .ok()?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pixelate-blend-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/pixelate_blend.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("filter-bind-group-layout"),
            entries: &[
                // params uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),  // src_a
                storage_entry(2, true),  // src_b
                storage_entry(3, true),  // mask
                storage_entry(4, false), // dst
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("filter-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let make_pipeline = |entry: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let pixelate_pipeline = make_pipeline("pixelate");
        let blend_pipeline = make_pipeline("blend");

        Some(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            pixelate_pipeline,
            blend_pipeline,
            bind_group_layout,
        })
    }

    /// Largest storage buffer the device accepts, in bytes.
    pub fn max_buffer_size(&self) -> u64 {
        self.device.limits().max_storage_buffer_binding_size as u64
    }

    /// Runs one pass and reads `dst` back.
    ///
    /// `src_a` is the primary RGBA input and also the initial `dst` content.
    /// `src_b` and `mask` are only read by the blend pass; pass empty slices
    /// for pixelation.
    pub fn run(
        &self,
        pass: GpuPass,
        params: &GpuFilterParams,
        src_a: &[u32],
        src_b: &[u32],
        mask: &[f32],
    ) -> Result<Vec<u32>, FilterError> {
        let buf_size = std::mem::size_of_val(src_a) as u64;
        if buf_size == 0 {
            return Ok(Vec::new());
        }
        if buf_size > self.max_buffer_size() {
            return Err(FilterError::Gpu(format!(
                "frame needs {buf_size} bytes, device limit is {}",
                self.max_buffer_size()
            )));
        }

        let params_buf = self.upload("params", bytemuck::bytes_of(params), wgpu::BufferUsages::UNIFORM);
        let a_buf = self.upload("src-a", bytemuck::cast_slice(src_a), wgpu::BufferUsages::STORAGE);
        let b_buf = self.upload_or_stub("src-b", bytemuck::cast_slice(src_b));
        let mask_buf = self.upload_or_stub("mask", bytemuck::cast_slice(mask));
        let dst_buf = self.upload(
            "dst",
            bytemuck::cast_slice(src_a),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        );
        let staging_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size: buf_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("filter-bind-group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: a_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: b_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: mask_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: dst_buf.as_entire_binding(),
                },
            ],
        });

        let (pipeline, grid_x, grid_y) = match pass {
            GpuPass::Pixelate => (&self.pixelate_pipeline, params.blocks_x, params.blocks_y),
            GpuPass::Blend => (&self.blend_pipeline, params.width, params.height),
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("filter-encoder"),
            });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("filter-pass"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            cpass.dispatch_workgroups(
                grid_x.div_ceil(WORKGROUP_SIZE),
                grid_y.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        encoder.copy_buffer_to_buffer(&dst_buf, 0, &staging_buf, 0, buf_size);
        self.queue.submit(Some(encoder.finish()));

        // Read back results
        let (tx, rx) = crossbeam_channel::bounded(1);
        let slice = staging_buf.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| FilterError::Gpu("readback callback dropped".into()))?
            .map_err(|e| FilterError::Gpu(format!("buffer map failed: {e}")))?;

        let mapped = slice.get_mapped_range();
        let result: Vec<u32> = bytemuck::cast_slice(&mapped).to_vec();
        drop(mapped);
        staging_buf.unmap();

        Ok(result)
    }

    fn upload(&self, label: &str, bytes: &[u8], usage: wgpu::BufferUsages) -> wgpu::Buffer {
        let buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: bytes.len() as u64,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(&buf, 0, bytes);
        buf
    }

    // Bindings must be non-empty even when the pass ignores them.
    fn upload_or_stub(&self, label: &str, bytes: &[u8]) -> wgpu::Buffer {
        if bytes.is_empty() {
            self.upload(label, &[0u8; 4], wgpu::BufferUsages::STORAGE)
        } else {
            self.upload(label, bytes, wgpu::BufferUsages::STORAGE)
        }
    }
}

use std::path::Path;

use wgpu::{
    AddressMode, Extent3d, FilterMode, MipmapFilterMode, Origin3d, Sampler, SamplerDescriptor,
    TexelCopyBufferLayout, TexelCopyTextureInfo, TextureAspect, TextureDescriptor,
    TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
};

use crate::renderer::RenderContext;

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("failed to load texture image: {0}")]
    Image(#[from] image::ImageError),

    #[error("texture dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },

    #[error("texture is {width}x{height}, the device allows at most {max}x{max}")]
    TooLarge { width: u32, height: u32, max: u32 },

    #[error("expected {expected} bytes of pixel data for {width}x{height}, got {found}")]
    DataLength {
        width: u32,
        height: u32,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Luma,
    Rgb,
    Rgba,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureOptions {
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub srgb: bool,
}

#[derive(Debug)]
pub struct Texture {
    view: TextureView,
    sampler: Sampler,
    width: u32,
    height: u32,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::Luma => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            srgb: true,
        }
    }
}

impl Texture {
    pub fn from_file(
        path: impl AsRef<Path>,
        options: TextureOptions,
        ctx: RenderContext<'_>,
    ) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let image = image::open(path)?.to_rgba8();

        log::debug!(
            "loaded texture {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );

        Self::from_data(
            image.as_raw(),
            image.width(),
            image.height(),
            PixelFormat::Rgba,
            options,
            ctx,
        )
    }

    pub fn from_data(
        pixels: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
        options: TextureOptions,
        ctx: RenderContext<'_>,
    ) -> Result<Self, TextureError> {
        check_size(width, height, ctx.device.limits().max_texture_dimension_2d)?;
        let rgba = expand_to_rgba(pixels, width, height, format)?;

        let texture = ctx.device.create_texture(&TextureDescriptor {
            label: Some("quadbatch texture"),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: if options.srgb {
                TextureFormat::Rgba8UnormSrgb
            } else {
                TextureFormat::Rgba8Unorm
            },
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });

        ctx.queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture,
                aspect: TextureAspect::All,
                mip_level: 0,
                origin: Origin3d::ZERO,
            },
            &rgba,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            texture.size(),
        );

        let sampler = ctx.device.create_sampler(&sampler_descriptor(options));

        Ok(Self {
            view: texture.create_view(&TextureViewDescriptor::default()),
            sampler,
            width,
            height,
        })
    }

    /// 1x1 opaque white, for untextured quads.
    pub fn white(ctx: RenderContext<'_>) -> Self {
        Self::from_data(
            &[255, 255, 255, 255],
            1,
            1,
            PixelFormat::Rgba,
            TextureOptions::default(),
            ctx,
        )
        .unwrap_or_else(|_| unreachable!("1x1 rgba data is always valid"))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub(in crate::renderer) fn view(&self) -> &TextureView {
        &self.view
    }

    pub(in crate::renderer) fn sampler(&self) -> &Sampler {
        &self.sampler
    }
}

fn check_size(width: u32, height: u32, max: u32) -> Result<(), TextureError> {
    if width > max || height > max {
        return Err(TextureError::TooLarge { width, height, max });
    }

    Ok(())
}

fn sampler_descriptor(options: TextureOptions) -> SamplerDescriptor<'static> {
    SamplerDescriptor {
        label: Some("quadbatch sampler"),
        address_mode_u: options.address_mode_u,
        address_mode_v: options.address_mode_v,
        address_mode_w: AddressMode::ClampToEdge,
        mag_filter: options.mag_filter,
        min_filter: options.min_filter,
        mipmap_filter: MipmapFilterMode::Nearest,
        ..Default::default()
    }
}

/// Converts tightly packed pixels into RGBA8, the narrowest color format the
/// GPU accepts. Missing alpha becomes opaque.
pub fn expand_to_rgba(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>, TextureError> {
    if width == 0 || height == 0 {
        return Err(TextureError::EmptyDimensions { width, height });
    }

    let count = width as usize * height as usize;
    let expected = count * format.channels();

    if pixels.len() != expected {
        return Err(TextureError::DataLength {
            width,
            height,
            expected,
            found: pixels.len(),
        });
    }

    let rgba = match format {
        PixelFormat::Rgba => pixels.to_vec(),
        PixelFormat::Rgb => pixels
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
        PixelFormat::Luma => pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
    };

    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_gets_opaque_alpha() {
        let rgba = expand_to_rgba(&[1, 2, 3, 4, 5, 6], 2, 1, PixelFormat::Rgb).unwrap();
        assert_eq!(rgba, vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn luma_is_replicated() {
        let rgba = expand_to_rgba(&[7, 9], 1, 2, PixelFormat::Luma).unwrap();
        assert_eq!(rgba, vec![7, 7, 7, 255, 9, 9, 9, 255]);
    }

    #[test]
    fn rgba_passes_through() {
        let data = [10, 20, 30, 40];
        assert_eq!(
            expand_to_rgba(&data, 1, 1, PixelFormat::Rgba).unwrap(),
            data.to_vec()
        );
    }

    #[test]
    fn wrong_length() {
        let err = expand_to_rgba(&[0; 5], 2, 1, PixelFormat::Rgb).unwrap_err();
        assert!(matches!(
            err,
            TextureError::DataLength {
                expected: 6,
                found: 5,
                ..
            }
        ));
    }

    #[test]
    fn zero_sized() {
        assert!(matches!(
            expand_to_rgba(&[], 0, 4, PixelFormat::Rgba),
            Err(TextureError::EmptyDimensions { width: 0, height: 4 })
        ));
    }

    #[test]
    fn larger_than_device_limit() {
        assert!(check_size(8192, 8192, 8192).is_ok());
        assert!(matches!(
            check_size(16384, 16, 8192),
            Err(TextureError::TooLarge {
                width: 16384,
                max: 8192,
                ..
            })
        ));
        assert!(check_size(16, 8193, 8192).is_err());
    }

    #[test]
    fn sampler_keeps_full_lod_range() {
        let options = TextureOptions {
            mag_filter: FilterMode::Linear,
            ..TextureOptions::default()
        };
        let descriptor = sampler_descriptor(options);

        // mag_filter only applies while the LOD can reach zero.
        assert_eq!(descriptor.lod_min_clamp, 0.0);
        assert!(descriptor.lod_max_clamp >= 1.0);
        assert_eq!(descriptor.mag_filter, FilterMode::Linear);
        assert_eq!(descriptor.min_filter, FilterMode::Nearest);
    }

    #[test]
    fn default_options_match_pixel_art_sampling() {
        let options = TextureOptions::default();
        assert_eq!(options.mag_filter, FilterMode::Nearest);
        assert_eq!(options.address_mode_u, AddressMode::ClampToEdge);
    }
}

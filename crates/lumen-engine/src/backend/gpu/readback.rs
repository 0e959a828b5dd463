use anyhow::{Context, Result, anyhow};

use crate::device::Gpu;
use crate::texture::{PixelFormat, RenderTextureDesc};

/// GPU storage format backing a [`PixelFormat`].
pub(crate) fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::R8G8B8 => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Float32R => wgpu::TextureFormat::R32Float,
        PixelFormat::Float32Rgb | PixelFormat::Float32Rgba => wgpu::TextureFormat::Rgba32Float,
    }
}

/// Bytes per texel of the GPU storage format.
fn gpu_texel_size(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::R8G8B8 | PixelFormat::Float32R => 4,
        PixelFormat::Float32Rgb | PixelFormat::Float32Rgba => 16,
    }
}

/// Row pitch of a texture copy, padded to wgpu's alignment.
pub(crate) fn padded_bytes_per_row(width: u32, texel_size: u32) -> u32 {
    let unpadded = width * texel_size;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copies `texture` into host memory and unpacks it into `out` with the
/// channel count of `desc.format`. Blocks until the GPU is done.
pub(crate) fn read_texture(
    gpu: &Gpu,
    texture: &wgpu::Texture,
    desc: &RenderTextureDesc,
    out: &mut Vec<f32>,
) -> Result<()> {
    let texel_size = gpu_texel_size(desc.format);
    let row_pitch = padded_bytes_per_row(desc.width, texel_size);

    let buffer = gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("lumen readback buffer"),
        size: row_pitch as u64 * desc.height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lumen readback encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(row_pitch),
                rows_per_image: Some(desc.height),
            },
        },
        wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        },
    );
    let index = gpu.queue().submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        let _ = tx.send(r);
    });
    gpu.wait_idle(index)?;
    rx.recv()
        .context("readback callback dropped")?
        .map_err(|e| anyhow!("failed to map readback buffer: {e}"))?;

    {
        let data = slice.get_mapped_range();
        unpack_rows(&data, desc, row_pitch as usize, out);
    }
    buffer.unmap();
    Ok(())
}

/// Strips row padding and converts GPU texels to the host layout.
fn unpack_rows(data: &[u8], desc: &RenderTextureDesc, row_pitch: usize, out: &mut Vec<f32>) {
    let channels = desc.format.channel_count() as usize;
    let width = desc.width as usize;
    out.clear();
    out.reserve(desc.readback_len());

    for row in data.chunks(row_pitch).take(desc.height as usize) {
        match desc.format {
            PixelFormat::R8G8B8 => {
                for texel in row[..width * 4].chunks_exact(4) {
                    out.extend(texel[..channels].iter().map(|b| *b as f32 / 255.0));
                }
            }
            format => {
                let texel_size = gpu_texel_size(format) as usize;
                for texel in row[..width * texel_size].chunks_exact(texel_size) {
                    out.extend(
                        texel
                            .chunks_exact(4)
                            .take(channels)
                            .map(bytemuck::pod_read_unaligned::<f32>),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_alignment() {
        assert_eq!(padded_bytes_per_row(1, 16), 256);
        assert_eq!(padded_bytes_per_row(16, 16), 256);
        assert_eq!(padded_bytes_per_row(17, 16), 512);
    }

    #[test]
    fn rgb_drops_the_fourth_channel() {
        let desc = RenderTextureDesc::new("t", 2, 1, PixelFormat::Float32Rgb);
        let texels: [f32; 8] = [1.0, 2.0, 3.0, 1.0, 4.0, 5.0, 6.0, 1.0];
        let mut row = bytemuck::cast_slice::<f32, u8>(&texels).to_vec();
        row.resize(256, 0);
        let mut out = Vec::new();
        unpack_rows(&row, &desc, 256, &mut out);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn unorm_becomes_unit_floats() {
        let desc = RenderTextureDesc::new("t", 1, 2, PixelFormat::R8G8B8);
        let mut data = vec![0u8; 512];
        data[..4].copy_from_slice(&[255, 0, 51, 255]);
        data[256..260].copy_from_slice(&[0, 255, 0, 255]);
        let mut out = Vec::new();
        unpack_rows(&data, &desc, 256, &mut out);
        assert_eq!(out, vec![1.0, 0.0, 0.2, 0.0, 1.0, 0.0]);
    }
}

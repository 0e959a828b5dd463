use crate::texture::{PixelFormat, RenderTextureDesc};

/// Host-memory render texture, tightly packed with the format's channels.
#[derive(Debug, Clone)]
pub(crate) struct CpuTexture {
    pub desc: RenderTextureDesc,
    pub data: Vec<f32>,
}

impl CpuTexture {
    pub(crate) fn new(desc: RenderTextureDesc) -> Self {
        let data = vec![0.0; desc.readback_len()];
        Self { desc, data }
    }

    #[inline]
    pub(crate) fn channels(&self) -> usize {
        self.desc.format.channel_count() as usize
    }

    #[inline]
    pub(crate) fn texel_offset(&self, col: u32, row: u32) -> usize {
        (row as usize * self.desc.width as usize + col as usize) * self.channels()
    }

    pub(crate) fn texel(&self, col: u32, row: u32) -> &[f32] {
        let start = self.texel_offset(col, row);
        &self.data[start..start + self.channels()]
    }

    pub(crate) fn fill(&mut self, value: [f32; 4]) {
        let encoded = encode(self.desc.format, value);
        let channels = self.channels();
        for texel in self.data.chunks_exact_mut(channels) {
            texel.copy_from_slice(&encoded[..channels]);
        }
    }
}

/// Stores `value` the way a GPU render target of `format` would.
pub(crate) fn encode(format: PixelFormat, value: [f32; 4]) -> [f32; 4] {
    match format {
        PixelFormat::R8G8B8 => value.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() / 255.0),
        _ => value,
    }
}

/// Writes `value` into a texel slice of any channel count.
#[inline]
pub(crate) fn write_texel(format: PixelFormat, texel: &mut [f32], value: [f32; 4]) {
    let encoded = encode(format, value);
    let n = texel.len();
    texel.copy_from_slice(&encoded[..n]);
}

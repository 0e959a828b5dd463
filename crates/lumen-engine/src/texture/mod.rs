//! Render texture descriptions shared by every backend.

mod format;

pub use format::PixelFormat;

/// Opaque handle to a backend-owned render texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u32);

impl TextureId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Creation parameters of an off-screen render texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl RenderTextureDesc {
    pub fn new(label: impl Into<String>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format,
        }
    }

    #[inline]
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Length of a tightly packed readback of this texture.
    #[inline]
    pub fn readback_len(&self) -> usize {
        self.texel_count() * self.format.channel_count() as usize
    }

    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.width > 0 && self.height > 0,
            "render texture `{}` has zero size ({}x{})",
            self.label,
            self.width,
            self.height
        );
        Ok(())
    }
}

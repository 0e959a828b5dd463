/// Pixel formats render textures can be created with.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum PixelFormat {
    /// 8-bit RGB colour, read back as floats in `0..=1`.
    R8G8B8,
    Float32R,
    /// Three float channels; the range sensor's (range, retro, 0) format.
    #[default]
    Float32Rgb,
    Float32Rgba,
}

impl PixelFormat {
    #[inline]
    pub const fn channel_count(self) -> u32 {
        match self {
            PixelFormat::Float32R => 1,
            PixelFormat::R8G8B8 | PixelFormat::Float32Rgb => 3,
            PixelFormat::Float32Rgba => 4,
        }
    }

    /// Bytes per texel in host memory.
    #[inline]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::R8G8B8 => 3,
            _ => self.channel_count() * 4,
        }
    }

    /// Name published alongside frames.
    pub const fn name(self) -> &'static str {
        match self {
            PixelFormat::R8G8B8 => "PF_R8G8B8",
            PixelFormat::Float32R => "PF_FLOAT32_R",
            PixelFormat::Float32Rgb => "PF_FLOAT32_RGB",
            PixelFormat::Float32Rgba => "PF_FLOAT32_RGBA",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            PixelFormat::R8G8B8,
            PixelFormat::Float32R,
            PixelFormat::Float32Rgb,
            PixelFormat::Float32Rgba,
        ]
        .into_iter()
        .find(|f| f.name() == name)
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        !matches!(self, PixelFormat::R8G8B8)
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(PixelFormat::Float32Rgb.channel_count(), 3);
        assert_eq!(PixelFormat::Float32Rgb.bytes_per_pixel(), 12);
        assert_eq!(PixelFormat::R8G8B8.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Float32R.bytes_per_pixel(), 4);
    }

    #[test]
    fn names_resolve_back() {
        assert_eq!(PixelFormat::from_name("PF_FLOAT32_RGB"), Some(PixelFormat::Float32Rgb));
        assert_eq!(PixelFormat::from_name("BLABLA"), None);
    }
}

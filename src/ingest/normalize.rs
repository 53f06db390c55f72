use anyhow::{anyhow, Result};

/// Device buffer layouts we can turn into luma.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Grey,
    Yuyv,
    Rgb24,
    Nv12,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"GREY" => Some(PixelFormat::Grey),
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"NV12" => Some(PixelFormat::Nv12),
            _ => None,
        }
    }

    /// Bytes a `width` x `height` buffer must hold at least.
    fn buffer_len(self, width: usize, height: usize) -> Option<usize> {
        let pixels = width.checked_mul(height)?;
        match self {
            PixelFormat::Grey => Some(pixels),
            PixelFormat::Yuyv => pixels.checked_mul(2),
            PixelFormat::Rgb24 => pixels.checked_mul(3),
            PixelFormat::Nv12 => pixels.checked_add(pixels / 2),
        }
    }
}

/// Extract the row-major 8-bit luma plane from a device buffer.
///
/// Drivers may hand out buffers longer than the image; trailing bytes are
/// ignored.
pub(crate) fn to_luma(pixels: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let expected = format
        .buffer_len(w, h)
        .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", format))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "{:?} frame too short: expected {}, got {}",
            format,
            expected,
            pixels.len()
        ));
    }

    let luma = match format {
        // NV12 stores the full-resolution Y plane first.
        PixelFormat::Grey | PixelFormat::Nv12 => pixels[..w * h].to_vec(),
        PixelFormat::Yuyv => pixels[..expected].iter().step_by(2).copied().collect(),
        PixelFormat::Rgb24 => pixels[..expected]
            .chunks_exact(3)
            .map(|rgb| {
                let (r, g, b) = (rgb[0] as f32, rgb[1] as f32, rgb[2] as f32);
                clamp_to_u8(0.299 * r + 0.587 * g + 0.114 * b)
            })
            .collect(),
    };
    Ok(luma)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_keeps_every_other_byte() -> Result<()> {
        // Y0 U Y1 V for a 2x1 frame.
        let luma = to_luma(&[10, 128, 20, 128], 2, 1, PixelFormat::Yuyv)?;
        assert_eq!(luma, vec![10, 20]);
        Ok(())
    }

    #[test]
    fn nv12_uses_y_plane() -> Result<()> {
        let nv12 = [vec![50u8, 60, 70, 80], vec![128u8; 2]].concat();
        assert_eq!(to_luma(&nv12, 2, 2, PixelFormat::Nv12)?, vec![50, 60, 70, 80]);
        Ok(())
    }

    #[test]
    fn rgb_gray_maps_to_same_luma() -> Result<()> {
        let rgb = vec![128u8; 12];
        assert_eq!(to_luma(&rgb, 2, 2, PixelFormat::Rgb24)?, vec![128u8; 4]);
        Ok(())
    }

    #[test]
    fn short_buffer_is_rejected_and_padding_ignored() -> Result<()> {
        assert!(to_luma(&[1, 2, 3], 2, 2, PixelFormat::Grey).is_err());
        assert_eq!(to_luma(&[1, 2, 3, 4, 0, 0], 2, 2, PixelFormat::Grey)?, vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn fourcc_lookup() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), None);
    }
}

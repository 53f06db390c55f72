//! V4L2 frame source.
//!
//! `V4l2Source` owns a local capture device (e.g. /dev/video0) for the
//! lifetime of a session:
//! - The device is opened and streaming starts in `new`
//! - Each `capture` blocks for the next buffer and converts it to luma
//! - Dropping the source stops the stream and closes the device
//!
//! YUYV is requested because nearly every UVC camera offers it; whatever the
//! driver settles on must be one of the layouts `normalize` understands.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{to_luma, PixelFormat};
use super::{FrameSource, SourceStats};
use crate::clock::{Clock, SharedClock};
use crate::frame::Frame;

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Frame rate requested from the driver. 0 keeps the driver default.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 0,
            width: 640,
            height: 480,
        }
    }
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub struct V4l2Source {
    config: V4l2Config,
    state: DeviceState,
    clock: SharedClock,
    format: PixelFormat,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl V4l2Source {
    /// Open the device, negotiate the format and start streaming.
    pub fn new(config: V4l2Config, clock: SharedClock) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&config.device)
            .with_context(|| format!("open v4l2 device {}", config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"YUYV");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Source: failed to set format on {}: {}", config.device, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "v4l2 device {} delivers unsupported format {}",
                config.device,
                format.fourcc
            )
        })?;

        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Source: failed to set fps on {}: {}", config.device, err);
            }
        }

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "V4l2Source: streaming from {} ({}x{} {:?})",
            config.device,
            format.width,
            format.height,
            pixel_format
        );
        Ok(Self {
            width: format.width,
            height: format.height,
            format: pixel_format,
            config,
            state,
            clock,
            frame_count: 0,
        })
    }
}

impl FrameSource for V4l2Source {
    fn name(&self) -> &str {
        &self.config.device
    }

    fn capture(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let (buf, _meta) = self
            .state
            .with_mut(|fields| fields.stream.next())
            .with_context(|| format!("capture v4l2 frame from {}", self.config.device))?;
        let captured_at = self.clock.now();
        let luma = to_luma(buf, self.width, self.height, self.format)?;
        self.frame_count += 1;
        Frame::from_luma(self.width, self.height, luma, captured_at)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.device.clone(),
        }
    }
}

impl Drop for V4l2Source {
    fn drop(&mut self) {
        log::info!(
            "V4l2Source: releasing {} after {} frames",
            self.config.device,
            self.frame_count
        );
    }
}

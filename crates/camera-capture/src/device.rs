//! V4L2 webcam source
//!
//! Streams frames from a local video device node (e.g. `/dev/video0`) through
//! memory-mapped buffers. RGB3 is requested; drivers that refuse it are read
//! as YUYV or MJPG and converted to RGB.

use std::time::Instant;

use ouroboros::self_referencing;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;

use crate::{CaptureError, FrameSource, VideoFrame};

const RGB3: [u8; 4] = *b"RGB3";
const YUYV: [u8; 4] = *b"YUYV";
const MJPG: [u8; 4] = *b"MJPG";

#[self_referencing]
struct DeviceStream {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

/// Live webcam source. Streaming stops and the device node is closed on drop.
pub struct V4l2Source {
    path: String,
    state: DeviceStream,
    fourcc: [u8; 4],
    width: u32,
    height: u32,
    opened_at: Instant,
    sequence: u32,
}

impl V4l2Source {
    /// Open `path` and start streaming at (roughly) `width` x `height`
    pub fn open(path: &str, width: u32, height: u32) -> Result<Self, CaptureError> {
        let open_err =
            |e: std::io::Error| CaptureError::Open(format!("cannot open webcam {}: {}", path, e));

        let device = v4l::Device::with_path(path).map_err(open_err)?;
        let mut format = device.format().map_err(open_err)?;
        format.width = width;
        format.height = height;
        format.fourcc = v4l::FourCC::new(&RGB3);

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(e) => {
                warn!("Failed to set RGB3 format on {}: {}", path, e);
                device.format().map_err(open_err)?
            }
        };

        let fourcc = format.fourcc.repr;
        if ![RGB3, YUYV, MJPG].contains(&fourcc) {
            return Err(CaptureError::Open(format!(
                "unsupported pixel format {} on {}",
                format.fourcc, path
            )));
        }

        let state = DeviceStream::try_new(device, |device| {
            v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
        })
        .map_err(open_err)?;

        info!(
            "Webcam {} streaming {}x{} {}",
            path, format.width, format.height, format.fourcc
        );

        Ok(Self {
            path: path.to_string(),
            state,
            fourcc,
            width: format.width,
            height: format.height,
            opened_at: Instant::now(),
            sequence: 0,
        })
    }

    fn convert(&self, buf: &[u8], timestamp_ns: u64) -> Result<VideoFrame, CaptureError> {
        match self.fourcc {
            RGB3 => {
                let len = self.width as usize * self.height as usize * 3;
                let data = buf.get(..len).ok_or_else(|| {
                    CaptureError::InvalidFrame(format!("short RGB3 buffer: {} bytes", buf.len()))
                })?;
                VideoFrame::new(data.to_vec(), self.width, self.height, timestamp_ns, self.sequence)
            }
            YUYV => VideoFrame::from_yuyv(buf, self.width, self.height, timestamp_ns, self.sequence),
            _ => {
                let mut frame = VideoFrame::decode(buf)?;
                frame.timestamp_ns = timestamp_ns;
                frame.sequence = self.sequence;
                Ok(frame)
            }
        }
    }
}

impl FrameSource for V4l2Source {
    fn read_frame(&mut self) -> Result<VideoFrame, CaptureError> {
        let buf = self
            .state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .map_err(|e| CaptureError::Read(format!("{}: {}", self.path, e)))?;

        let timestamp_ns = self.opened_at.elapsed().as_nanos() as u64;
        let frame = self.convert(&buf, timestamp_ns)?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("webcam {} ({}x{})", self.path, self.width, self.height)
    }
}

impl Drop for V4l2Source {
    fn drop(&mut self) {
        debug!("Releasing webcam {} after {} frames", self.path, self.sequence);
    }
}

use crate::capture::domain::frame_source::{CaptureError, CaptureTarget, FrameRead, FrameSource};
use crate::shared::frame::Frame;

/// Camera or file capture via ffmpeg-next (libavdevice + libavcodec).
///
/// Every decoded frame is converted to RGB24. With `mirror` set, frames are
/// flipped horizontally (selfie view) before they leave the source.
pub struct FfmpegFrameSource {
    state: Option<DecodeState>,
    target: CaptureTarget,
    mirror: bool,
    frame_index: usize,
}

struct DecodeState {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
    width: u32,
    height: u32,
    /// Devices have no end of stream: running out of packets never drains
    /// the decoder.
    live: bool,
    flushing: bool,
}

// Safety: FfmpegFrameSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    pub fn open(target: CaptureTarget, mirror: bool) -> Result<Self, CaptureError> {
        let open_err = |reason: String| CaptureError::Open {
            device: target.to_string(),
            reason,
        };

        ffmpeg_next::init().map_err(|e| open_err(e.to_string()))?;
        let input = match &target {
            CaptureTarget::File(path) => {
                ffmpeg_next::format::input(path).map_err(|e| open_err(e.to_string()))?
            }
            CaptureTarget::Device(device) => open_device(device).map_err(open_err)?,
        };
        let state =
            DecodeState::new(input, target.is_live()).map_err(|e| open_err(e.to_string()))?;
        log::info!(
            "Opened {target} ({}x{}, mirror: {mirror})",
            state.width,
            state.height
        );

        Ok(Self {
            state: Some(state),
            target,
            mirror,
            frame_index: 0,
        })
    }

    pub fn target(&self) -> &CaptureTarget {
        &self.target
    }
}

impl FrameSource for FfmpegFrameSource {
    fn read(&mut self) -> Result<FrameRead, Box<dyn std::error::Error>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(FrameRead::EndOfStream);
        };

        match state.next_rgb()? {
            Some(pixels) => {
                let frame = Frame::new(pixels, state.width, state.height, 3, self.frame_index);
                self.frame_index += 1;
                Ok(FrameRead::Frame(if self.mirror {
                    frame.mirrored()
                } else {
                    frame
                }))
            }
            // A live device that stops delivering packets is a failed read,
            // not the end of the session.
            None if self.target.is_live() => Ok(FrameRead::Empty),
            None => Ok(FrameRead::EndOfStream),
        }
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!("Closed {}", self.target);
        }
    }
}

impl DecodeState {
    fn new(
        input: ffmpeg_next::format::context::Input,
        live: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            input,
            decoder,
            scaler,
            video_stream_index,
            width,
            height,
            live,
            flushing: false,
        })
    }

    /// Decodes until one frame is available. `None` once the input has no
    /// more packets and, for files, the decoder is drained. A live input
    /// with no packet right now also yields `None` and can be read again.
    fn next_rgb(&mut self) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
        if let Some(pixels) = self.try_receive()? {
            return Ok(Some(pixels));
        }
        if self.flushing {
            return Ok(None);
        }

        loop {
            let Some((stream, packet)) = self.input.packets().next() else {
                if self.live {
                    return Ok(None);
                }
                let _ = self.decoder.send_eof();
                self.flushing = true;
                return self.try_receive();
            };
            if stream.index() != self.video_stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Dropping undecodable packet: {e}");
                continue;
            }
            if let Some(pixels) = self.try_receive()? {
                return Ok(Some(pixels));
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb_frame)?;
        Ok(Some(packed_rgb(&rgb_frame, self.width, self.height)))
    }
}

/// Name of the platform's camera input format in libavdevice.
fn device_format_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(target_os = "windows") {
        "dshow"
    } else {
        "v4l2"
    }
}

/// Maps a bare device index to the platform's device URL; other strings
/// pass through unchanged.
fn device_url(device: &str) -> String {
    let is_index = !device.is_empty() && device.chars().all(|c| c.is_ascii_digit());
    if !is_index {
        return device.to_string();
    }
    match device_format_name() {
        "v4l2" => format!("/dev/video{device}"),
        "avfoundation" => format!("{device}:none"),
        _ => device.to_string(),
    }
}

fn open_device(device: &str) -> Result<ffmpeg_next::format::context::Input, String> {
    ffmpeg_next::device::register_all();
    let wanted = device_format_name();
    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name().split(',').any(|n| n == wanted))
        .ok_or_else(|| format!("capture backend {wanted} is not available in this ffmpeg build"))?;

    let url = device_url(device);
    ffmpeg_next::format::open_with(
        &url,
        &ffmpeg_next::format::format::Format::Input(format),
        ffmpeg_next::Dictionary::new(),
    )
    .map(|ctx| ctx.input())
    .map_err(|e| format!("{url}: {e}"))
}

/// Packed RGB24 rows of `picture`, without the stride padding ffmpeg adds.
fn packed_rgb(picture: &ffmpeg_next::util::frame::video::Video, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 3;
    picture
        .data(0)
        .chunks(picture.stride(0))
        .take(height as usize)
        .flat_map(|row| &row[..row_bytes])
        .copied()
        .collect()
}

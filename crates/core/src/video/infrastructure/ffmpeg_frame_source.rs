use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

/// Decodes a video file via ffmpeg-next, one RGB24 frame per request.
///
/// Every call to [`FrameSource::next_frame`] decodes exactly one frame, so
/// the monitor's refresh pacing controls playback speed.
pub struct FfmpegFrameSource {
    path: PathBuf,
    state: Option<DecodeState>,
    frame_index: usize,
    finished: bool,
}

// Safety: the source is only driven from one thread at a time; the raw
// ffmpeg pointers are never shared.
unsafe impl Send for FfmpegFrameSource {}

struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    flushing: bool,
}

impl FfmpegFrameSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            state: None,
            frame_index: 0,
            finished: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for FfmpegFrameSource {
    fn acquire(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(&self.path)?;
        let stream = ictx
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

        log::info!("Opened {} ({width}x{height})", self.path.display());

        self.state = Some(DecodeState {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
            flushing: false,
        });
        self.frame_index = 0;
        self.finished = false;
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.finished {
            return None;
        }
        let state = self.state.as_mut()?;

        match state.decode_next(self.frame_index) {
            Ok(Some(frame)) => {
                self.frame_index += 1;
                Some(frame)
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                log::warn!("Failed to decode frame {}: {e}", self.frame_index);
                None
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::debug!("Released {}", self.path.display());
        }
    }
}

impl DecodeState {
    /// Feeds packets until the decoder yields a frame. `Ok(None)` at end of stream.
    fn decode_next(&mut self, index: usize) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        loop {
            if let Some(frame) = self.try_receive(index)? {
                return Ok(Some(frame));
            }
            if self.flushing {
                return Ok(None);
            }

            match self.ictx.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.video_stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        log::debug!("Skipping undecodable packet: {e}");
                    }
                }
                None => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                }
            }
        }
    }

    fn try_receive(&mut self, index: usize) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb_frame)?;
        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Some(Frame::new(pixels, self.width, self.height, index)))
    }
}

/// Copies an ffmpeg RGB24 plane into a tightly packed buffer, dropping
/// per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}

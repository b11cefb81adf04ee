//! MP3 Test Fixture Generator
//!
//! Builds minimal but well-formed MPEG audio streams: a run of identical
//! frame headers with filler payload. The demuxer accepts them and each
//! frame contributes its header's sample count to the duration.

use std::path::Path;

/// One constant-bitrate frame layout
#[derive(Debug, Clone, Copy)]
pub struct FrameFormat {
    pub header: [u8; 4],
    pub frame_len: usize,
    pub frame_seconds: f32,
}

/// MPEG-1 Layer III, no CRC, 128 kbit/s, 44.1 kHz, no padding, stereo
pub const MPEG1_L3: FrameFormat = FrameFormat {
    header: [0xFF, 0xFB, 0x90, 0x00],
    // 144 * 128000 / 44100, rounded down
    frame_len: 417,
    frame_seconds: 1152.0 / 44100.0,
};

/// Same as [`MPEG1_L3`] with the CRC-protected flag set
pub const MPEG1_L3_CRC: FrameFormat = FrameFormat {
    header: [0xFF, 0xFA, 0x90, 0x00],
    frame_len: 417,
    frame_seconds: 1152.0 / 44100.0,
};

/// MPEG-2 Layer III, no CRC, 64 kbit/s, 22.05 kHz, stereo
pub const MPEG2_L3: FrameFormat = FrameFormat {
    header: [0xFF, 0xF3, 0x80, 0x00],
    // 72 * 64000 / 22050, rounded down
    frame_len: 208,
    frame_seconds: 576.0 / 22050.0,
};

pub const FRAME_LEN: usize = MPEG1_L3.frame_len;

pub const FRAME_SECONDS: f32 = MPEG1_L3.frame_seconds;

/// `frames` consecutive MPEG-1 Layer III frames; `seed` varies the payload
/// (and the hash)
pub fn mp3_bytes(frames: usize, seed: u8) -> Vec<u8> {
    frame_bytes(&MPEG1_L3, frames, seed)
}

/// `frames` consecutive frames of `format`
pub fn frame_bytes(format: &FrameFormat, frames: usize, seed: u8) -> Vec<u8> {
    // Keep the filler away from 0xFF so it can never look like a sync word
    let filler = (seed % 0x7F) + 1;
    let mut data = Vec::with_capacity(frames * format.frame_len);
    for _ in 0..frames {
        data.extend_from_slice(&format.header);
        data.extend(std::iter::repeat(filler).take(format.frame_len - format.header.len()));
    }
    data
}

pub fn write_mp3(path: &Path, frames: usize, seed: u8) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, mp3_bytes(frames, seed)).unwrap();
}

fn syncsafe(size: usize) -> [u8; 4] {
    [
        ((size >> 21) & 0x7F) as u8,
        ((size >> 14) & 0x7F) as u8,
        ((size >> 7) & 0x7F) as u8,
        (size & 0x7F) as u8,
    ]
}

/// MP3 stream preceded by an ID3v2.3 tag holding one front-cover picture
pub fn mp3_with_picture(frames: usize, seed: u8, picture: &[u8], mime: &str) -> Vec<u8> {
    let mut apic = Vec::new();
    apic.push(0x00); // ISO-8859-1
    apic.extend_from_slice(mime.as_bytes());
    apic.push(0x00);
    apic.push(0x03); // front cover
    apic.push(0x00); // empty description
    apic.extend_from_slice(picture);

    let mut frame = Vec::new();
    frame.extend_from_slice(b"APIC");
    frame.extend_from_slice(&(apic.len() as u32).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&apic);

    let mut data = Vec::new();
    data.extend_from_slice(b"ID3");
    data.extend_from_slice(&[0x03, 0x00, 0x00]);
    data.extend_from_slice(&syncsafe(frame.len()));
    data.extend_from_slice(&frame);
    data.extend_from_slice(&mp3_bytes(frames, seed));
    data
}

/// Solid-color PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([20, 120, 220]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

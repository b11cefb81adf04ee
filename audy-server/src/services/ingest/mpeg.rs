//! MPEG audio detection and duration measurement

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use symphonia::core::codecs::{CODEC_TYPE_MP1, CODEC_TYPE_MP2, CODEC_TYPE_MP3};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use tracing::debug;

const MPEG_MIME: &str = "audio/mpeg";

/// Resync attempts before the rest of the file is treated as garbage
const MAX_CONSECUTIVE_BAD_FRAMES: usize = 64;

/// Check that a file is MPEG audio
///
/// The header must either be recognized as `audio/mpeg` or start with an
/// MPEG audio frame sync, and the demuxer must then find an MPEG audio
/// track. Open failures are returned as errors; anything that is not MPEG
/// audio is `Ok(false)`.
pub fn sniff(path: &Path) -> io::Result<bool> {
    let mime = infer::get_from_path(path)?.map(|kind| kind.mime_type());
    let plausible = match mime {
        Some(MPEG_MIME) => true,
        Some(_) => false,
        None => starts_with_frame_sync(path)?,
    };
    if !plausible {
        debug!(path = %path.display(), mime = ?mime, "Rejected by header sniff");
        return Ok(false);
    }

    match open_reader(path) {
        Ok(_) => Ok(true),
        Err(SymphoniaError::IoError(e)) if e.kind() != io::ErrorKind::UnexpectedEof => Err(e),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Rejected by demuxer probe");
            Ok(false)
        }
    }
}

/// 11-bit frame sync followed by a valid layer (any MPEG version, with or
/// without CRC)
fn is_frame_sync(header: [u8; 2]) -> bool {
    let layer = (header[1] >> 1) & 0x03;
    header[0] == 0xFF && header[1] & 0xE0 == 0xE0 && layer != 0
}

fn starts_with_frame_sync(path: &Path) -> io::Result<bool> {
    let mut header = [0u8; 2];
    match File::open(path)?.read_exact(&mut header) {
        Ok(()) => Ok(is_frame_sync(header)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Total duration in seconds, summed over demuxed frames
///
/// Frames that fail to parse are skipped; a truncated trailer ends the pass.
pub fn measure_duration(path: &Path) -> Result<f32, SymphoniaError> {
    let (mut reader, track_id) = open_reader(path)?;

    let time_base = reader
        .tracks()
        .iter()
        .find(|t| t.id == track_id)
        .and_then(|t| {
            t.codec_params
                .time_base
                .or_else(|| t.codec_params.sample_rate.map(|sr| TimeBase::new(1, sr)))
        });

    let Some(time_base) = time_base else {
        debug!(path = %path.display(), "No time base, duration unknown");
        return Ok(0.0);
    };

    let mut total_ts: u64 = 0;
    let mut bad_frames = 0usize;
    loop {
        match reader.next_packet() {
            Ok(packet) if packet.track_id() == track_id => {
                bad_frames = 0;
                total_ts += packet.dur;
            }
            Ok(_) => continue,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::DecodeError(e)) if bad_frames < MAX_CONSECUTIVE_BAD_FRAMES => {
                bad_frames += 1;
                debug!(path = %path.display(), error = e, "Skipping malformed frame");
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Stopping duration pass");
                break;
            }
        }
    }

    let time = time_base.calc_time(total_ts);
    let seconds = time.seconds as f64 + time.frac;

    Ok(seconds as f32)
}

fn open_reader(path: &Path) -> Result<(Box<dyn FormatReader>, u32), SymphoniaError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3").mime_type(MPEG_MIME);

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let reader = probed.format;
    let track_id = reader
        .tracks()
        .iter()
        .find(|t| {
            let codec = t.codec_params.codec;
            codec == CODEC_TYPE_MP3 || codec == CODEC_TYPE_MP2 || codec == CODEC_TYPE_MP1
        })
        .map(|t| t.id)
        .ok_or(SymphoniaError::Unsupported("no MPEG audio track"))?;

    Ok((reader, track_id))
}

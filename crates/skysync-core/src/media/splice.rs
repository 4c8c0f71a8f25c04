//! JPEG container splicing for single-file motion photos.
//!
//! The remote encoding is a JPEG still with the video appended after its
//! end-of-image marker. An XMP APP1 segment placed right after the still's
//! leading metadata segments advertises the embedded clip using the
//! `GCamera` motion-photo vocabulary, so any reader that knows motion photos
//! can find the clip without knowing this crate.

use std::ops::Range;

use super::TranscodeError;

const MARKER_PREFIX: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP1: u8 = 0xE1;
const COM: u8 = 0xFE;
const TEM: u8 = 0x01;

/// Identifier opening every XMP APP1 payload.
pub const XMP_NAMESPACE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
/// Attribute announcing a motion photo.
pub const MOTION_PHOTO_SENTINEL: &str = "GCamera:MotionPhoto=\"1\"";
/// Attribute announcing the legacy micro-video form.
pub const MICRO_VIDEO_SENTINEL: &str = "GCamera:MicroVideo=\"1\"";
/// Version written into the marker block.
pub const MOTION_PHOTO_VERSION: u32 = 1;

const MICRO_VIDEO_OFFSET_ATTR: &str = "GCamera:MicroVideoOffset=\"";
const TOOLKIT_ATTR: &str = "x:xmptk=\"skysync\"";

/// Byte layout of the primary image inside a JPEG byte sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
struct JpegLayout {
    /// Offset just past the last metadata segment that directly follows SOI
    metadata_end: usize,
    /// Offset just past the end-of-image marker
    image_end: usize,
    /// Motion-photo XMP segment, if one is present among the leading segments
    motion_marker: Option<MotionMarker>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MotionMarker {
    segment: Range<usize>,
    /// Length of the trailing video, counted from the end of the file
    video_length: Option<usize>,
    /// Whether this crate wrote the segment
    written_by_us: bool,
}

/// Still image and trailing video recovered from a spliced file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitMotionPhoto {
    pub image: Vec<u8>,
    pub video: Vec<u8>,
}

/// Build the XMP APP1 segment announcing a trailing clip of `video_length` bytes.
pub fn motion_marker_segment(video_length: usize) -> Result<Vec<u8>, TranscodeError> {
    let packet = format!(
        concat!(
            "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\" {toolkit}>",
            "<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">",
            "<rdf:Description rdf:about=\"\" ",
            "xmlns:GCamera=\"http://ns.google.com/photos/1.0/camera/\" ",
            "{motion} ",
            "GCamera:MotionPhotoVersion=\"{version}\" ",
            "GCamera:MotionPhotoPresentationTimestampUs=\"-1\" ",
            "{micro} ",
            "GCamera:MicroVideoVersion=\"{version}\" ",
            "{offset}{length}\"/>",
            "</rdf:RDF></x:xmpmeta>"
        ),
        toolkit = TOOLKIT_ATTR,
        motion = MOTION_PHOTO_SENTINEL,
        micro = MICRO_VIDEO_SENTINEL,
        version = MOTION_PHOTO_VERSION,
        offset = MICRO_VIDEO_OFFSET_ATTR,
        length = video_length,
    );

    let payload_len = XMP_NAMESPACE.len() + packet.len();
    let segment_len = u16::try_from(payload_len + 2)
        .map_err(|_| TranscodeError::Malformed("motion marker exceeds a JPEG segment".into()))?;

    let mut segment = Vec::with_capacity(payload_len + 4);
    segment.extend_from_slice(&[MARKER_PREFIX, APP1]);
    segment.extend_from_slice(&segment_len.to_be_bytes());
    segment.extend_from_slice(XMP_NAMESPACE);
    segment.extend_from_slice(packet.as_bytes());
    Ok(segment)
}

/// Splice `video` into `image`, producing the single-file remote encoding.
///
/// Images that already carry a clip spliced by this crate are rejected.
pub fn splice_motion_photo(image: &[u8], video: &[u8]) -> Result<Vec<u8>, TranscodeError> {
    if video.is_empty() {
        return Err(TranscodeError::MissingVideo);
    }

    let layout = scan_jpeg(image)?;
    let marker = motion_marker_segment(video.len())?;

    if layout
        .motion_marker
        .as_ref()
        .is_some_and(|existing| existing.written_by_us)
    {
        return Err(TranscodeError::Malformed(
            "image already carries an embedded motion clip".into(),
        ));
    }

    let mut spliced = Vec::with_capacity(image.len() + marker.len() + video.len());
    spliced.extend_from_slice(&image[..layout.metadata_end]);
    spliced.extend_from_slice(&marker);
    spliced.extend_from_slice(&image[layout.metadata_end..]);
    spliced.extend_from_slice(video);
    Ok(spliced)
}

/// Split a spliced file back into the original still and the video.
///
/// The clip length advertised by the marker is preferred; without one the
/// split happens at the primary image's end-of-image marker.
pub fn split_motion_photo(bytes: &[u8]) -> Result<SplitMotionPhoto, TranscodeError> {
    let layout = scan_jpeg(bytes)?;

    let (image, video) = match &layout.motion_marker {
        Some(MotionMarker {
            segment,
            video_length: Some(video_length),
            written_by_us,
        }) => {
            let trailing = bytes.len() - layout.image_end;
            if *video_length > trailing {
                return Err(TranscodeError::Malformed(format!(
                    "marker declares a {video_length}-byte clip but only {trailing} bytes follow the image"
                )));
            }
            let video_start = bytes.len() - video_length;
            let mut image = Vec::with_capacity(video_start);
            if *written_by_us {
                image.extend_from_slice(&bytes[..segment.start]);
                image.extend_from_slice(&bytes[segment.end..video_start]);
            } else {
                image.extend_from_slice(&bytes[..video_start]);
            }
            (image, bytes[video_start..].to_vec())
        }
        Some(MotionMarker {
            segment,
            written_by_us: true,
            ..
        }) => {
            let mut image = Vec::with_capacity(layout.image_end);
            image.extend_from_slice(&bytes[..segment.start]);
            image.extend_from_slice(&bytes[segment.end..layout.image_end]);
            (image, bytes[layout.image_end..].to_vec())
        }
        _ => (
            bytes[..layout.image_end].to_vec(),
            bytes[layout.image_end..].to_vec(),
        ),
    };

    if video.is_empty() {
        return Err(TranscodeError::MissingVideo);
    }
    Ok(SplitMotionPhoto { image, video })
}

/// Whether `bytes` advertise an embedded motion clip.
pub fn has_motion_marker(bytes: &[u8]) -> bool {
    scan_jpeg(bytes).is_ok_and(|layout| layout.motion_marker.is_some())
}

fn scan_jpeg(bytes: &[u8]) -> Result<JpegLayout, TranscodeError> {
    if bytes.len() < 2 || bytes[0] != MARKER_PREFIX || bytes[1] != SOI {
        return Err(TranscodeError::NotJpeg);
    }

    let mut pos = 2;
    let mut metadata_end = 2;
    let mut leading_metadata = true;
    let mut motion_marker = None;

    loop {
        if pos + 1 >= bytes.len() {
            return Err(TranscodeError::MissingEndOfImage);
        }
        if bytes[pos] != MARKER_PREFIX {
            return Err(TranscodeError::Malformed(format!(
                "expected a segment marker at byte {pos}"
            )));
        }

        let marker = bytes[pos + 1];
        match marker {
            // Fill bytes before a marker.
            MARKER_PREFIX => {
                pos += 1;
                continue;
            }
            EOI => {
                return Ok(JpegLayout {
                    metadata_end,
                    image_end: pos + 2,
                    motion_marker,
                });
            }
            TEM | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            _ => {}
        }

        if pos + 3 >= bytes.len() {
            return Err(TranscodeError::MissingEndOfImage);
        }
        let length = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
        let segment_end = pos + 2 + length;
        if length < 2 || segment_end > bytes.len() {
            return Err(TranscodeError::Malformed(format!(
                "segment at byte {pos} overruns the input"
            )));
        }

        let is_metadata = (0xE0..=0xEF).contains(&marker) || marker == COM;
        if leading_metadata && is_metadata {
            metadata_end = segment_end;
            if marker == APP1 {
                if let Some(found) =
                    parse_motion_marker(&bytes[pos + 4..segment_end], pos..segment_end)
                {
                    // Our own block wins over any marker another writer left.
                    let replace = match &motion_marker {
                        None => true,
                        Some(current) => found.written_by_us && !current.written_by_us,
                    };
                    if replace {
                        motion_marker = Some(found);
                    }
                }
            }
        } else {
            leading_metadata = false;
        }

        pos = segment_end;
        if marker == SOS {
            pos = skip_entropy_coded_data(bytes, pos)?;
        }
    }
}

/// Advance past entropy-coded scan data to the next real marker.
fn skip_entropy_coded_data(bytes: &[u8], mut pos: usize) -> Result<usize, TranscodeError> {
    while pos + 1 < bytes.len() {
        if bytes[pos] != MARKER_PREFIX {
            pos += 1;
            continue;
        }
        match bytes[pos + 1] {
            // Stuffed zero byte or restart marker: still scan data.
            0x00 | 0xD0..=0xD7 => pos += 2,
            MARKER_PREFIX => pos += 1,
            _ => return Ok(pos),
        }
    }
    Err(TranscodeError::MissingEndOfImage)
}

fn parse_motion_marker(payload: &[u8], segment: Range<usize>) -> Option<MotionMarker> {
    let packet = payload.strip_prefix(XMP_NAMESPACE)?;
    let packet = String::from_utf8_lossy(packet);
    if !packet.contains(MOTION_PHOTO_SENTINEL) && !packet.contains(MICRO_VIDEO_SENTINEL) {
        return None;
    }

    let video_length = packet
        .split_once(MICRO_VIDEO_OFFSET_ATTR)
        .and_then(|(_, rest)| rest.split_once('"'))
        .and_then(|(digits, _)| digits.trim().parse::<usize>().ok())
        .filter(|length| *length > 0);

    Some(MotionMarker {
        segment,
        video_length,
        written_by_us: packet.contains(TOOLKIT_ATTR),
    })
}

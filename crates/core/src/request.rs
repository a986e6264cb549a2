//! Job request types and validation.
//!
//! A [`JobRequest`] is either text-driven or image-driven. The limits
//! enforced by [`JobRequest::validate`] match the ones the input forms
//! apply, so a malformed request is rejected before anything is sent.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::job::JobKind;

/* --------------------------------------------------------------------------
Limits
-------------------------------------------------------------------------- */

/// Maximum prompt length, in characters.
pub const MAX_PROMPT_CHARS: usize = 500;

/// Maximum number of images attached to one image-driven job.
pub const MAX_IMAGES: usize = 5;

/// Maximum size of a single image (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Exclusive upper bound for [`Seed::random`].
pub const SEED_UPPER_BOUND: i64 = 999_999_999;

/// Wire value meaning "let the service choose a seed".
pub const AUTO_SEED: i64 = -1;

/* --------------------------------------------------------------------------
Resolution
-------------------------------------------------------------------------- */

/// The five output resolutions the service accepts.
///
/// Serialized in the service's `"W*H"` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "1280*720")]
    Landscape720,
    #[serde(rename = "960*960")]
    Square960,
    #[serde(rename = "720*1280")]
    Portrait720,
    #[serde(rename = "1088*832")]
    Landscape4x3,
    #[serde(rename = "832*1088")]
    Portrait3x4,
}

impl Resolution {
    /// All presets, in display order.
    pub const ALL: [Resolution; 5] = [
        Resolution::Landscape720,
        Resolution::Square960,
        Resolution::Portrait720,
        Resolution::Landscape4x3,
        Resolution::Portrait3x4,
    ];

    /// Width and height in pixels.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Landscape720 => (1280, 720),
            Self::Square960 => (960, 960),
            Self::Portrait720 => (720, 1280),
            Self::Landscape4x3 => (1088, 832),
            Self::Portrait3x4 => (832, 1088),
        }
    }

    /// The `"W*H"` string sent to the service.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Landscape720 => "1280*720",
            Self::Square960 => "960*960",
            Self::Portrait720 => "720*1280",
            Self::Landscape4x3 => "1088*832",
            Self::Portrait3x4 => "832*1088",
        }
    }

    /// Aspect ratio label for display, e.g. `"16:9"`.
    pub fn aspect_label(self) -> &'static str {
        match self {
            Self::Landscape720 => "16:9",
            Self::Square960 => "1:1",
            Self::Portrait720 => "9:16",
            Self::Landscape4x3 => "4:3",
            Self::Portrait3x4 => "3:4",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "{w}x{h} ({})", self.aspect_label())
    }
}

impl FromStr for Resolution {
    type Err = CoreError;

    /// Accepts both the wire form (`1280*720`) and `1280x720`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(['x', 'X'], "*");
        Self::ALL
            .into_iter()
            .find(|r| r.as_wire() == normalized)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown resolution '{s}'. Valid resolutions: {}",
                    Self::ALL.map(Resolution::as_wire).join(", ")
                ))
            })
    }
}

/* --------------------------------------------------------------------------
Seed
-------------------------------------------------------------------------- */

/// Generation seed. [`Seed::Auto`] lets the service pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Seed {
    #[default]
    Auto,
    Fixed(i64),
}

impl Seed {
    /// Interpret a raw wire value; `-1` means [`Seed::Auto`].
    pub fn from_wire(value: i64) -> Self {
        if value == AUTO_SEED {
            Self::Auto
        } else {
            Self::Fixed(value)
        }
    }

    /// The value sent to the service.
    pub fn to_wire(self) -> i64 {
        match self {
            Self::Auto => AUTO_SEED,
            Self::Fixed(v) => v,
        }
    }

    /// A fixed seed drawn uniformly from `0..SEED_UPPER_BOUND`.
    pub fn random() -> Self {
        Self::Fixed(rand::rng().random_range(0..SEED_UPPER_BOUND))
    }
}

impl From<Option<i64>> for Seed {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Auto, Self::from_wire)
    }
}

impl Serialize for Seed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.to_wire())
    }
}

impl<'de> Deserialize<'de> for Seed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<i64>::deserialize(deserializer).map(Seed::from)
    }
}

/* --------------------------------------------------------------------------
Images
-------------------------------------------------------------------------- */

/// Accepted image encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Png,
    Jpeg,
}

impl ImageMime {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// One uploaded image.
#[derive(Clone)]
pub struct ImageBlob {
    pub file_name: String,
    pub mime: ImageMime,
    pub bytes: Vec<u8>,
}

impl ImageBlob {
    pub fn new(file_name: impl Into<String>, mime: ImageMime, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime,
            bytes,
        }
    }

    /// Build a blob by sniffing the encoding from the file header.
    ///
    /// Only PNG and JPEG are accepted.
    pub fn sniff(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, CoreError> {
        let file_name = file_name.into();
        let mime = match image::guess_format(&bytes) {
            Ok(image::ImageFormat::Png) => ImageMime::Png,
            Ok(image::ImageFormat::Jpeg) => ImageMime::Jpeg,
            Ok(other) => {
                return Err(CoreError::Validation(format!(
                    "Image '{file_name}' has unsupported format {other:?}; only PNG and JPEG are accepted"
                )))
            }
            Err(_) => {
                return Err(CoreError::Validation(format!(
                    "Image '{file_name}' is not a recognizable image"
                )))
            }
        };
        Ok(Self::new(file_name, mime, bytes))
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.bytes.is_empty() {
            return Err(CoreError::Validation(format!(
                "Image '{}' is empty",
                self.file_name
            )));
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(CoreError::Validation(format!(
                "Image '{}' is {} bytes; the limit is {MAX_IMAGE_BYTES} bytes",
                self.file_name,
                self.bytes.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/* --------------------------------------------------------------------------
Requests
-------------------------------------------------------------------------- */

/// Generate a video from a text prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct TextJobRequest {
    pub prompt: String,
    pub resolution: Resolution,
    pub watermark: bool,
    pub seed: Seed,
}

/// Generate a video from one or more images and an optional prompt.
#[derive(Debug, Clone)]
pub struct ImageJobRequest {
    pub prompt: Option<String>,
    pub images: Vec<ImageBlob>,
    pub watermark: bool,
    pub seed: Seed,
}

/// A job submission, text-driven or image-driven.
#[derive(Debug, Clone)]
pub enum JobRequest {
    Text(TextJobRequest),
    Image(ImageJobRequest),
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Text(_) => JobKind::Text,
            Self::Image(_) => JobKind::Image,
        }
    }

    /// Check prompt length, image count, image sizes and encodings.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::Text(req) => {
                if req.prompt.trim().is_empty() {
                    return Err(CoreError::Validation(
                        "Prompt must not be empty".to_string(),
                    ));
                }
                validate_prompt(&req.prompt)
            }
            Self::Image(req) => {
                if let Some(prompt) = &req.prompt {
                    validate_prompt(prompt)?;
                }
                if req.images.is_empty() {
                    return Err(CoreError::Validation(
                        "At least one image is required".to_string(),
                    ));
                }
                if req.images.len() > MAX_IMAGES {
                    return Err(CoreError::Validation(format!(
                        "At most {MAX_IMAGES} images are allowed (got {})",
                        req.images.len()
                    )));
                }
                req.images.iter().try_for_each(ImageBlob::validate)
            }
        }
    }
}

impl From<TextJobRequest> for JobRequest {
    fn from(req: TextJobRequest) -> Self {
        Self::Text(req)
    }
}

impl From<ImageJobRequest> for JobRequest {
    fn from(req: ImageJobRequest) -> Self {
        Self::Image(req)
    }
}

fn validate_prompt(prompt: &str) -> Result<(), CoreError> {
    let chars = prompt.chars().count();
    if chars > MAX_PROMPT_CHARS {
        return Err(CoreError::Validation(format!(
            "Prompt is {chars} characters; the limit is {MAX_PROMPT_CHARS}"
        )));
    }
    Ok(())
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    fn text(prompt: &str) -> JobRequest {
        JobRequest::Text(TextJobRequest {
            prompt: prompt.to_string(),
            resolution: Resolution::default(),
            watermark: true,
            seed: Seed::Auto,
        })
    }

    fn image_request(images: Vec<ImageBlob>) -> JobRequest {
        JobRequest::Image(ImageJobRequest {
            prompt: None,
            images,
            watermark: false,
            seed: Seed::Auto,
        })
    }

    fn png(len: usize) -> ImageBlob {
        ImageBlob::new("frame.png", ImageMime::Png, vec![0u8; len])
    }

    // -- Resolution --

    #[test]
    fn resolution_parses_wire_and_x_forms() {
        assert_eq!("1280*720".parse::<Resolution>().unwrap(), Resolution::Landscape720);
        assert_eq!("832x1088".parse::<Resolution>().unwrap(), Resolution::Portrait3x4);
    }

    #[test]
    fn resolution_rejects_unknown_size() {
        let err = "640*480".parse::<Resolution>().unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("960*960"));
    }

    #[test]
    fn resolution_serializes_as_wire_string() {
        let json = serde_json::to_string(&Resolution::Square960).unwrap();
        assert_eq!(json, "\"960*960\"");
    }

    #[test]
    fn default_resolution_is_first_preset() {
        assert_eq!(Resolution::default(), Resolution::ALL[0]);
    }

    // -- Seed --

    #[test]
    fn seed_minus_one_is_auto() {
        assert_eq!(Seed::from_wire(-1), Seed::Auto);
        assert_eq!(Seed::from(None), Seed::Auto);
        assert_eq!(Seed::from(Some(42)), Seed::Fixed(42));
        assert_eq!(Seed::Auto.to_wire(), -1);
    }

    #[test]
    fn random_seed_is_within_bounds() {
        for _ in 0..50 {
            assert_matches!(Seed::random(), Seed::Fixed(v) if (0..SEED_UPPER_BOUND).contains(&v));
        }
    }

    #[test]
    fn seed_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Seed::Auto).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&Seed::Fixed(7)).unwrap(), "7");
    }

    // -- Text requests --

    #[test]
    fn valid_text_request_accepted() {
        assert!(text("a cat").validate().is_ok());
    }

    #[test]
    fn blank_prompt_rejected() {
        assert_matches!(text("   ").validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn prompt_limit_counts_characters_not_bytes() {
        let at_limit = "é".repeat(MAX_PROMPT_CHARS);
        assert!(text(&at_limit).validate().is_ok());

        let over = "a".repeat(MAX_PROMPT_CHARS + 1);
        assert_matches!(text(&over).validate(), Err(CoreError::Validation(_)));
    }

    // -- Image requests --

    #[test]
    fn image_request_requires_at_least_one_image() {
        assert_matches!(image_request(vec![]).validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn image_request_caps_image_count() {
        assert!(image_request(vec![png(10); MAX_IMAGES]).validate().is_ok());
        assert_matches!(
            image_request(vec![png(10); MAX_IMAGES + 1]).validate(),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn oversized_image_rejected() {
        assert!(image_request(vec![png(MAX_IMAGE_BYTES)]).validate().is_ok());
        assert_matches!(
            image_request(vec![png(MAX_IMAGE_BYTES + 1)]).validate(),
            Err(CoreError::Validation(msg)) if msg.contains("frame.png")
        );
    }

    #[test]
    fn image_request_prompt_is_optional_but_limited() {
        let mut req = ImageJobRequest {
            prompt: Some("a".repeat(MAX_PROMPT_CHARS + 1)),
            images: vec![png(10)],
            watermark: false,
            seed: Seed::Auto,
        };
        assert!(JobRequest::Image(req.clone()).validate().is_err());
        req.prompt = None;
        assert!(JobRequest::Image(req).validate().is_ok());
    }

    #[test]
    fn request_kind_matches_variant() {
        assert_eq!(text("x").kind(), JobKind::Text);
        assert_eq!(image_request(vec![png(1)]).kind(), JobKind::Image);
    }

    // -- Sniffing --

    #[test]
    fn sniff_detects_png_and_jpeg() {
        let blob = ImageBlob::sniff("a.png", PNG_HEADER.to_vec()).unwrap();
        assert_eq!(blob.mime, ImageMime::Png);
        let blob = ImageBlob::sniff("b.jpg", JPEG_HEADER.to_vec()).unwrap();
        assert_eq!(blob.mime, ImageMime::Jpeg);
    }

    #[test]
    fn sniff_rejects_unrecognized_bytes() {
        let err = ImageBlob::sniff("notes.txt", b"hello world".to_vec()).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("notes.txt"));
    }

    #[test]
    fn blob_debug_omits_bytes() {
        let rendered = format!("{:?}", png(3));
        assert!(rendered.contains("len: 3"));
    }
}

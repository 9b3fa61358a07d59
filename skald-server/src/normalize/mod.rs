//! Message normalizer
//!
//! Converts inbound chat content into the canonical printable unit the
//! transaction engine consumes. Text is ASCII-folded, URLs become trailing
//! QR blocks, images are downscaled into the spool directory, and
//! contact/location/poll content is mapped onto fixed textual templates.
//! Audio, video and generic documents normalize to a no-op acknowledgement
//! and are never enqueued or counted.

mod text;
mod url;

pub use text::ascii_fold;
pub use url::extract_urls;

use crate::store::MessageKind;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Fixed raster width the printer expects, in dots
pub const IMAGE_WIDTH: u32 = 512;

/// Inbound content as delivered by the chat transport
#[derive(Debug, Clone)]
pub enum InboundContent {
    Text(String),
    Image {
        /// Transport attachment reference, resolved via `fetch_attachment`
        attachment: String,
        caption: Option<String>,
        animated: bool,
    },
    Contact {
        first_name: String,
        last_name: Option<String>,
        phone: String,
    },
    Location {
        latitude: f64,
        longitude: f64,
    },
    Poll {
        question: String,
        options: Vec<String>,
    },
    Audio,
    Video,
    Document,
}

impl InboundContent {
    /// Attachment reference to fetch before normalization, if any
    pub fn attachment_ref(&self) -> Option<&str> {
        match self {
            InboundContent::Image {
                attachment,
                animated: false,
                ..
            } => Some(attachment),
            _ => None,
        }
    }
}

/// Canonical printable unit
#[derive(Debug, Clone)]
pub struct NormalizedMessage {
    pub kind: MessageKind,
    /// ASCII-folded body text (may be empty for pure image messages)
    pub body: String,
    /// QR payloads trailing the body, in order of appearance
    pub qr: Vec<String>,
    /// Spooled, pre-scaled image file
    pub image: Option<PathBuf>,
    /// ASCII-folded caption printed after the image
    pub caption: Option<String>,
}

/// Normalization result
#[derive(Debug)]
pub enum Outcome {
    /// Print this
    Printable(NormalizedMessage),
    /// Reply with this and stop; nothing is enqueued or counted
    Acknowledge(&'static str),
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Animated media cannot be rastered; user-visible and permanent
    #[error("Cannot print animated stickers...")]
    Animated,

    #[error("Could not read that image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image attachment was not fetched")]
    MissingAttachment,

    #[error("Spool write failed: {0}")]
    Spool(#[from] std::io::Error),
}

/// Message normalizer with an image spool directory
#[derive(Clone)]
pub struct Normalizer {
    spool_dir: PathBuf,
}

impl Normalizer {
    pub fn new(spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
        }
    }

    /// Normalize inbound content into a printable unit.
    ///
    /// `attachment` carries the fetched bytes for image content; other kinds
    /// ignore it.
    pub fn normalize(
        &self,
        content: &InboundContent,
        attachment: Option<&[u8]>,
    ) -> Result<Outcome, NormalizeError> {
        let unit = match content {
            InboundContent::Text(text) => {
                let body = ascii_fold(text);
                let qr = extract_urls(&body);
                NormalizedMessage {
                    kind: MessageKind::Text,
                    body,
                    qr,
                    image: None,
                    caption: None,
                }
            }

            InboundContent::Image {
                caption, animated, ..
            } => {
                if *animated {
                    return Err(NormalizeError::Animated);
                }
                let bytes = attachment.ok_or(NormalizeError::MissingAttachment)?;
                let path = self.spool_image(bytes)?;
                NormalizedMessage {
                    kind: MessageKind::Image,
                    body: String::new(),
                    qr: Vec::new(),
                    image: Some(path),
                    caption: caption.as_deref().map(ascii_fold),
                }
            }

            InboundContent::Contact {
                first_name,
                last_name,
                phone,
            } => {
                let name = match last_name {
                    Some(last) => format!("{} {}", first_name, last),
                    None => first_name.clone(),
                };
                NormalizedMessage {
                    kind: MessageKind::Contact,
                    body: ascii_fold(&format!("Name: {}\nTel: {}", name, phone)),
                    qr: Vec::new(),
                    image: None,
                    caption: None,
                }
            }

            InboundContent::Location {
                latitude,
                longitude,
            } => NormalizedMessage {
                kind: MessageKind::Location,
                body: format!("Latitude: {}\nLongitude: {}", latitude, longitude),
                qr: vec![format!(
                    "https://maps.google.com/?q={:.14},{:.14}",
                    latitude, longitude
                )],
                image: None,
                caption: None,
            },

            InboundContent::Poll { question, options } => {
                let mut body = format!("Question: {}", ascii_fold(question));
                for option in options {
                    let _ = write!(body, "\n    [] {}", ascii_fold(option));
                }
                NormalizedMessage {
                    kind: MessageKind::Poll,
                    body,
                    qr: Vec::new(),
                    image: None,
                    caption: None,
                }
            }

            InboundContent::Audio => {
                return Ok(Outcome::Acknowledge(
                    "Although the printer makes sound, my printer cannot make your sound...",
                ));
            }
            InboundContent::Video => {
                return Ok(Outcome::Acknowledge("Videos cannot be printed."));
            }
            InboundContent::Document => {
                return Ok(Outcome::Acknowledge(
                    "How about no. Print your own documents!",
                ));
            }
        };

        Ok(Outcome::Printable(unit))
    }

    /// Decode, downscale to the fixed raster width and spool to disk
    fn spool_image(&self, bytes: &[u8]) -> Result<PathBuf, NormalizeError> {
        use image::GenericImageView;

        let img = image::load_from_memory(bytes)?;
        let (w, h) = img.dimensions();
        // height = round(h * 512 / w), aspect ratio preserved
        let new_h = ((h as f64) * (IMAGE_WIDTH as f64) / (w as f64)).round() as u32;
        let scaled = img.resize_exact(IMAGE_WIDTH, new_h.max(1), image::imageops::FilterType::Triangle);

        std::fs::create_dir_all(&self.spool_dir)?;
        let path = self
            .spool_dir
            .join(format!("{}.png", uuid::Uuid::new_v4()));
        scaled.save(&path).map_err(|e| match e {
            image::ImageError::IoError(io) => NormalizeError::Spool(io),
            other => NormalizeError::Decode(other),
        })?;

        info!(path = %path.display(), width = IMAGE_WIDTH, height = new_h, "spooled image");
        Ok(path)
    }

    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> (Normalizer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (Normalizer::new(dir.path()), dir)
    }

    #[test]
    fn test_text_with_url() {
        let (n, _dir) = normalizer();
        let content = InboundContent::Text("see http://example.com/a(b) now".to_string());
        match n.normalize(&content, None).unwrap() {
            Outcome::Printable(unit) => {
                assert_eq!(unit.kind, MessageKind::Text);
                assert_eq!(unit.body, "see http://example.com/a(b) now");
                assert_eq!(unit.qr, vec!["http://example.com/a(b)"]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_text_folds_before_url_scan() {
        let (n, _dir) = normalizer();
        let content = InboundContent::Text("café ☃".to_string());
        match n.normalize(&content, None).unwrap() {
            Outcome::Printable(unit) => {
                assert_eq!(unit.body, "cafe [SNOWMAN]");
                assert!(unit.qr.is_empty());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_animated_sticker_rejected() {
        let (n, _dir) = normalizer();
        let content = InboundContent::Image {
            attachment: "file-1".to_string(),
            caption: None,
            animated: true,
        };
        let err = n.normalize(&content, None).unwrap_err();
        assert!(matches!(err, NormalizeError::Animated));
    }

    #[test]
    fn test_image_downscaled_and_spooled() {
        let (n, dir) = normalizer();

        // 1024x100 white PNG
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            1024,
            100,
            image::Rgba([255, 255, 255, 255]),
        ));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();

        let content = InboundContent::Image {
            attachment: "file-1".to_string(),
            caption: Some("snowy ☃".to_string()),
            animated: false,
        };
        match n.normalize(&content, Some(&bytes)).unwrap() {
            Outcome::Printable(unit) => {
                let path = unit.image.unwrap();
                assert!(path.starts_with(dir.path()));
                let spooled = image::open(&path).unwrap();
                use image::GenericImageView;
                assert_eq!(spooled.dimensions(), (512, 50));
                assert_eq!(unit.caption.as_deref(), Some("snowy [SNOWMAN]"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_location_template() {
        let (n, _dir) = normalizer();
        let content = InboundContent::Location {
            latitude: 52.37,
            longitude: 4.89,
        };
        match n.normalize(&content, None).unwrap() {
            Outcome::Printable(unit) => {
                assert_eq!(unit.kind, MessageKind::Location);
                assert_eq!(unit.body, "Latitude: 52.37\nLongitude: 4.89");
                assert_eq!(
                    unit.qr,
                    vec!["https://maps.google.com/?q=52.37000000000000,4.89000000000000"]
                );
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_poll_template() {
        let (n, _dir) = normalizer();
        let content = InboundContent::Poll {
            question: "Tea?".to_string(),
            options: vec!["yes".to_string(), "no".to_string()],
        };
        match n.normalize(&content, None).unwrap() {
            Outcome::Printable(unit) => {
                assert_eq!(unit.body, "Question: Tea?\n    [] yes\n    [] no");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_kinds_acknowledged() {
        let (n, _dir) = normalizer();
        for content in [
            InboundContent::Audio,
            InboundContent::Video,
            InboundContent::Document,
        ] {
            match n.normalize(&content, None).unwrap() {
                Outcome::Acknowledge(_) => {}
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
    }
}

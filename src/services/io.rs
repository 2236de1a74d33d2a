//! Image I/O operations service
//!
//! Decoding, encoding and file access for [`RawImage`], kept apart from the
//! pipelines so those stay pure transforms.

use crate::{
    config::OutputFormat,
    error::{FilterError, Result},
    services::OutputFormatHandler,
    types::RawImage,
};
use image::codecs::jpeg::JpegEncoder;
use std::io::Cursor;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Falls back to content sniffing when the extension is wrong or missing.
    ///
    /// ```rust,no_run
    /// use filterkit::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("input.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RawImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(FilterError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(RawImage::from(img)),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );
                let data = std::fs::read(path_ref)
                    .map_err(|io_err| FilterError::file_io_error("read image data", path_ref, &io_err))?;
                Self::decode(&data).map_err(|content_err| {
                    FilterError::unsupported_format(format!(
                        "Failed to decode '{}' ({} bytes): {}; content detection: {}",
                        path_ref.display(),
                        data.len(),
                        e,
                        content_err
                    ))
                })
            },
        }
    }

    /// Decode an in-memory encoded image
    ///
    /// # Errors
    /// - `InvalidInput` for an empty buffer
    /// - `Image` when the bytes cannot be decoded
    pub fn decode(bytes: &[u8]) -> Result<RawImage> {
        if bytes.is_empty() {
            return Err(FilterError::invalid_input("Image data is empty"));
        }
        let image = image::load_from_memory(bytes)?;
        Ok(RawImage::from(image))
    }

    /// Read and decode an image from an async reader
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(
        mut reader: R,
    ) -> Result<RawImage> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        Self::decode(&buffer)
    }

    /// Encode an image into bytes
    ///
    /// `quality` applies to JPEG only. The `image` WebP encoder is lossless,
    /// so WebP output has no quality setting. `Rgba8` returns the raw
    /// interleaved pixel buffer.
    pub fn encode(image: &RawImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        OutputFormatHandler::warn_if_alpha_dropped(format, image);

        let Some(image_format) = OutputFormatHandler::image_format(format)? else {
            return Ok(image.pixels().as_raw().clone());
        };

        let mut buffer = Cursor::new(Vec::new());
        if format == OutputFormat::Jpeg {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
            image.to_rgb().write_with_encoder(encoder)?;
        } else {
            OutputFormatHandler::to_encodable(image, format).write_to(&mut buffer, image_format)?;
        }
        Ok(buffer.into_inner())
    }

    /// Encode and write to an async writer
    pub async fn save_to_writer<W: tokio::io::AsyncWrite + Unpin>(
        image: &RawImage,
        mut writer: W,
        format: OutputFormat,
        quality: u8,
    ) -> Result<()> {
        let bytes = Self::encode(image, format, quality)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Encode and write an image, creating parent directories
    pub fn save_image<P: AsRef<Path>>(
        image: &RawImage,
        path: P,
        format: OutputFormat,
        quality: u8,
    ) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| FilterError::file_io_error("create output directory", parent, &e))?;
        }

        let bytes = Self::encode(image, format, quality)?;
        std::fs::write(path_ref, bytes)
            .map_err(|e| FilterError::file_io_error("write image", path_ref, &e))?;
        log::debug!(
            "Saved {}x{} {:?} image to {}",
            image.width(),
            image.height(),
            format,
            path_ref.display()
        );
        Ok(())
    }

    /// Check if the file extension is a decodable image format
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| {
                matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "tif" | "tiff")
                    || (cfg!(feature = "webp-support") && ext == "webp")
            })
    }
}

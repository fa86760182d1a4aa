//! Image source port for loading encoded images.

/// An encoded image and where it came from.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Path or identifier of the image.
    pub path: String,
    /// Raw encoded bytes (JPEG, PNG, TIFF, ...).
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// Creates a new encoded image.
    #[must_use]
    pub fn new(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }
}

/// Port for loading images from a source.
pub trait ImageSource: Send + Sync {
    /// Returns an iterator over images from this source.
    ///
    /// # Errors
    ///
    /// Individual items may be errors if an image cannot be read.
    fn images(&self) -> Box<dyn Iterator<Item = anyhow::Result<EncodedImage>> + Send + '_>;

    /// Returns the total number of images, if known.
    fn count_hint(&self) -> Option<usize>;
}

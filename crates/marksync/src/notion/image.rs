use url::Url;

/// File extensions accepted as images.
const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "avif"];

/// Path fragments that mark CDN image endpoints without an extension.
const IMAGE_PATH_KEYWORDS: [&str; 6] = ["image", "img", "thumbnail", "thumb", "asset", "media"];

/// Decide whether `raw` may be attached to a page as an external image.
///
/// Requires an absolute http(s) URL whose path either ends in an image file
/// extension or contains one of a fixed set of image-ish keywords.
pub fn is_valid_image_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw.trim()) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return false;
    }

    let path = url.path().to_ascii_lowercase();
    let has_extension = path
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext));

    has_extension || IMAGE_PATH_KEYWORDS.iter().any(|k| path.contains(k))
}

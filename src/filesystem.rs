use actix_multipart::form::tempfile::TempFile;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use uuid::Uuid;

static MEDIA_ROOT: OnceCell<PathBuf> = OnceCell::new();

#[inline(always)]
pub fn get_media_root() -> &'static Path {
    unsafe { MEDIA_ROOT.get_unchecked() }
}

/// Prepares the directory uploaded post images live in.
/// Safe to call more than once; the first MEDIA_ROOT wins.
pub fn init() {
    let dir = std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_owned());
    let path = PathBuf::from(&dir);
    if !path.exists() {
        std::fs::DirBuilder::new()
            .recursive(true)
            .create(&path)
            .expect("failed to create MEDIA_ROOT");
    }
    if MEDIA_ROOT.set(path).is_err() {
        log::warn!("filesystem::init() called twice; keeping the first MEDIA_ROOT");
    }
}

/// Maps an upload's content type to the extension we store it under.
/// Anything that is not a known image type is rejected.
pub fn image_extension(content_type: &mime::Mime) -> Option<&'static str> {
    if content_type.type_() != mime::IMAGE {
        return None;
    }
    match content_type.subtype().as_str() {
        "png" => Some("png"),
        "jpeg" => Some("jpg"),
        "gif" => Some("gif"),
        "webp" => Some("webp"),
        _ => None,
    }
}

/// Copies an accepted upload into the media root under a generated name
/// and returns the stored filename.
pub fn save_image(file: &TempFile, extension: &str) -> std::io::Result<String> {
    let filename = format!("{}.{}", Uuid::new_v4(), extension);
    std::fs::copy(file.file.path(), get_media_root().join(&filename))?;
    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_image_content_types_are_accepted() {
        assert_eq!(image_extension(&mime::IMAGE_PNG), Some("png"));
        assert_eq!(image_extension(&mime::IMAGE_JPEG), Some("jpg"));
        assert_eq!(image_extension(&mime::IMAGE_GIF), Some("gif"));
        assert_eq!(image_extension(&mime::TEXT_HTML), None);
        assert_eq!(image_extension(&mime::APPLICATION_OCTET_STREAM), None);
    }

    #[test]
    fn unusual_image_subtypes_are_rejected() {
        let svg: mime::Mime = "image/svg+xml".parse().unwrap();
        assert_eq!(image_extension(&svg), None);
    }
}

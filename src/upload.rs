use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

use actix_multipart::Multipart;
use bytesize::ByteSize;
use futures_util::TryStreamExt as _;
use log::{debug, error};
use mime::Mime;

use crate::{error::AppError, util};

const TEXT_FIELD_LIMIT: usize = 64 * 1024;

/// Parts accepted per form; every form we serve has two.
const PART_LIMIT: usize = 8;

const WINDOWS_DEVICE_FILES: [&str; 22] = [
    "CON", "AUX", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8", "COM9", "LPT1",
    "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9", "PRN", "NUL",
];

/// Reduces a client-supplied filename to something safe to join onto the upload directory.
///
/// The result only contains `[A-Za-z0-9_.-]`, never starts or ends with `.` or `_`,
/// and may be empty.
pub fn secure_filename(name: &str) -> String {
    let name: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let name = name.split_whitespace().collect::<Vec<_>>().join("_");

    let name: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let name = name.trim_matches(|c| c == '.' || c == '_').to_string();

    let stem = name.split('.').next().unwrap_or_default().to_ascii_uppercase();
    if WINDOWS_DEVICE_FILES.contains(&stem.as_str()) {
        return format!("_{name}");
    }

    name
}

/// A stored name may be served only if sanitizing it is a no-op.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && secure_filename(name) == name
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageKind {
    /// Identifies an image by its magic bytes.
    pub fn sniff(data: &[u8]) -> Option<ImageKind> {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageKind::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }

    pub fn from_extension(name: &str) -> Option<ImageKind> {
        let (_, ext) = name.rsplit_once('.')?;

        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "gif" => Some(ImageKind::Gif),
            "webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
        }
    }

    pub fn mime(self) -> Mime {
        match self {
            ImageKind::Png => mime::IMAGE_PNG,
            ImageKind::Jpeg => mime::IMAGE_JPEG,
            ImageKind::Gif => mime::IMAGE_GIF,
            ImageKind::Webp => "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        }
    }
}

pub struct FileData {
    pub data: Vec<u8>,
    pub filename: String,
    pub filetype: Mime,
}

/// Text fields of a multipart form plus at most one file.
#[derive(Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<FileData>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }
}

pub async fn receive_form(
    mut payload: Multipart,
    file_field: &str,
    limit: ByteSize,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    let mut parts = 0;

    while let Some(mut field) = payload.try_next().await? {
        parts += 1;
        if parts > PART_LIMIT {
            return Err(AppError::BadRequest("too many form fields".into()));
        }

        let (name, filename) = match field.content_disposition() {
            Some(x) => (
                x.get_name().unwrap_or_default().to_owned(),
                x.get_filename().map(str::to_owned),
            ),
            None => return Err(AppError::BadRequest("content disposition empty".into())),
        };

        if name == file_field && filename.is_some() {
            if form.file.is_some() {
                return Err(AppError::BadRequest("only one file per upload".into()));
            }

            let filetype = field
                .content_type()
                .cloned()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM);

            let mut data: Vec<u8> = Vec::new();
            while let Some(chunk) = field.try_next().await? {
                if (data.len() + chunk.len()) as u64 > limit.as_u64() {
                    return Err(AppError::PayloadTooLarge(limit));
                }

                data.extend_from_slice(&chunk);
            }

            // browsers send an empty part when no file was picked
            if data.is_empty() {
                continue;
            }

            form.file = Some(FileData {
                data,
                filename: filename.unwrap_or_else(|| "unknown".into()),
                filetype,
            });
        } else {
            let mut data: Vec<u8> = Vec::new();
            while let Some(chunk) = field.try_next().await? {
                if data.len() + chunk.len() > TEXT_FIELD_LIMIT {
                    return Err(AppError::BadRequest(format!("field {name} too large")));
                }

                data.extend_from_slice(&chunk);
            }

            let value = String::from_utf8(data)
                .map_err(|_| AppError::BadRequest(format!("field {name} is not utf-8")))?;

            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

pub struct StoredImage {
    pub name: String,
    pub kind: ImageKind,
}

/// Writes an uploaded image into `dir` and returns its stored name.
///
/// The type is decided by the file's contents; the client's name and MIME type
/// only contribute the readable part of the stored name.
pub async fn store_image(dir: &Path, file: &FileData) -> Result<StoredImage, AppError> {
    let kind = ImageKind::sniff(&file.data).ok_or_else(|| {
        AppError::BadRequest("only png, jpeg, gif and webp images are accepted".into())
    })?;

    let original = secure_filename(&file.filename);
    let stem = original
        .rsplit_once('.')
        .map_or(original.as_str(), |(stem, _)| stem);
    let stem: String = stem.chars().take(64).collect();

    let name = if stem.is_empty() {
        format!("{}.{}", util::generate_file_prefix(), kind.extension())
    } else {
        format!("{}_{}.{}", util::generate_file_prefix(), stem, kind.extension())
    };

    debug!(
        "Storing upload: {} ({}, claimed {}, {}) as {}",
        file.filename,
        kind.mime(),
        file.filetype,
        ByteSize::b(file.data.len() as u64),
        name
    );

    tokio::fs::write(dir.join(&name), &file.data).await?;

    Ok(StoredImage { name, kind })
}

pub fn stored_path(dir: &Path, name: &str) -> Option<PathBuf> {
    is_safe_name(name).then(|| dir.join(name))
}

/// Deletes a stored file; a file that is already gone counts as removed.
pub async fn remove(dir: &Path, name: &str) -> io::Result<()> {
    let path = match stored_path(dir, name) {
        Some(x) => x,
        None => return Ok(()),
    };

    match tokio::fs::remove_file(&path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            error!("failed to remove {}: {e}", path.display());
            Err(e)
        }
        _ => Ok(()),
    }
}

#[test]
fn filename_sanitizing() {
    assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
    assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
    assert_eq!(secure_filename("..\\..\\windows\\win.ini"), "windows_win.ini");
    assert_eq!(secure_filename("i contain cool \u{fc}ml\u{e4}uts.txt"), "i_contain_cool_mluts.txt");
    assert_eq!(secure_filename("__init__.py"), "init__.py");
    assert_eq!(secure_filename(".bashrc"), "bashrc");
    assert_eq!(secure_filename("CON"), "_CON");
    assert_eq!(secure_filename("nul.txt"), "_nul.txt");
    assert_eq!(secure_filename("<script>.png"), "script.png");
    assert_eq!(secure_filename("..."), "");
    assert_eq!(secure_filename("\u{1F600}"), "");
}

#[test]
fn safe_names() {
    assert!(is_safe_name("abc123_photo.png"));
    assert!(!is_safe_name(""));
    assert!(!is_safe_name("../secret.png"));
    assert!(!is_safe_name(".hidden"));
    assert!(!is_safe_name("a b.png"));
    assert!(stored_path(Path::new("/srv"), "../x").is_none());
    assert_eq!(
        stored_path(Path::new("/srv"), "x.png"),
        Some(PathBuf::from("/srv/x.png"))
    );
}

#[test]
fn image_sniffing() {
    assert_eq!(ImageKind::sniff(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), Some(ImageKind::Png));
    assert_eq!(ImageKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]), Some(ImageKind::Jpeg));
    assert_eq!(ImageKind::sniff(b"GIF89a\x01\0\x01\0"), Some(ImageKind::Gif));
    assert_eq!(ImageKind::sniff(b"RIFF\x24\0\0\0WEBPVP8 "), Some(ImageKind::Webp));
    assert_eq!(ImageKind::sniff(b"RIFF\x24\0\0\0WAVEfmt "), None);
    assert_eq!(ImageKind::sniff(b"<html>"), None);
    assert_eq!(ImageKind::sniff(b""), None);
}

#[test]
fn image_extensions() {
    assert_eq!(ImageKind::from_extension("a.PNG"), Some(ImageKind::Png));
    assert_eq!(ImageKind::from_extension("a.jpeg"), Some(ImageKind::Jpeg));
    assert_eq!(ImageKind::from_extension("a.tar.gz"), None);
    assert_eq!(ImageKind::from_extension("noext"), None);
    assert_eq!(ImageKind::Webp.mime().to_string(), "image/webp");
    assert_eq!(ImageKind::Jpeg.extension(), "jpg");
}

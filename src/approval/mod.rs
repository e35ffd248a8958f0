use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object, Stream};
use regex::Regex;

use crate::error::Result;

/// US-letter page, points.
const LETTER: (f32, f32) = (612.0, 792.0);
/// The approval screenshot is drawn square at this size...
const IMAGE_SIZE: f32 = 500.0;
/// ...at this fixed offset (centered on the page).
const IMAGE_OFFSET: (f32, f32) = ((LETTER.0 - IMAGE_SIZE) / 2.0, (LETTER.1 - IMAGE_SIZE) / 2.0);

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Restrict a file stem to a safe character set; everything outside
/// `[A-Za-z0-9._-]` becomes an underscore.
pub fn sanitize_file_name(name: &str) -> String {
    let re = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
    re.replace_all(name.trim(), "_").to_string()
}

/// Locate the supplementary approval page for one enrollee.
///
/// Prefers an already-converted `<dir>/<stem>.pdf`; failing that, an
/// uploaded screenshot (`.png`/`.jpg`/`.jpeg`) is converted next to
/// itself and the converted path returned. Absence means "omit the
/// supplementary pages", never an error; a screenshot that fails to
/// convert is logged and treated as absent.
pub fn find_for(dir: &Path, stem: &str) -> Option<PathBuf> {
    let converted = dir.join(format!("{stem}.pdf"));
    if converted.is_file() {
        return Some(converted);
    }
    for extension in IMAGE_EXTENSIONS {
        let image = dir.join(format!("{stem}.{extension}"));
        if image.is_file() {
            match convert_image(&image, &converted) {
                Ok(()) => return Some(converted),
                Err(error) => {
                    tracing::warn!(image = %image.display(), %error, "approval conversion failed");
                    return None;
                }
            }
        }
    }
    None
}

/// Convert an approval screenshot into a one-page letter-size PDF with the
/// image placed 500x500 at a fixed offset.
pub fn convert_image(image_path: &Path, out: &Path) -> Result<()> {
    let rgb = image::open(image_path)?.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Object::Stream(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
        },
        rgb.into_raw(),
    )));

    let content = format!(
        "q\n{size} 0 0 {size} {x} {y} cm\n/Im0 Do\nQ",
        size = IMAGE_SIZE,
        x = IMAGE_OFFSET.0,
        y = IMAGE_OFFSET.1,
    );
    let content_id = doc.add_object(Object::Stream(Stream::new(
        dictionary! {},
        content.into_bytes(),
    )));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![
            Object::Real(0.0),
            Object::Real(0.0),
            Object::Real(LETTER.0),
            Object::Real(LETTER.1),
        ],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => Object::Reference(image_id) },
        },
        "Contents" => Object::Reference(content_id),
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.compress();
    doc.save(out)?;
    Ok(())
}

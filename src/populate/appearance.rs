use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use regex::Regex;

use crate::error::Result;

use super::decoder::decode_text;

const DEFAULT_FONT_SIZE: f32 = 10.0;

/// Rebuild the normal appearance of one field annotation from its stored
/// value, so viewers that ignore NeedAppearances still render correctly.
///
/// Text values get a fresh `/AP /N` form XObject; name values (checkbox
/// states) get their `/AS` synced to `/V`. Annotations without an
/// identifier or a value are left untouched.
pub fn refresh_annotation(doc: &mut Document, annot_id: ObjectId) -> Result<()> {
    enum Refresh {
        Text {
            value: String,
            rect: [f32; 4],
            size: f32,
        },
        Button(Vec<u8>),
    }

    let refresh = {
        let annot = doc.get_dictionary(annot_id)?;
        if !annot.has(b"T") {
            return Ok(());
        }
        match annot.get(b"V") {
            Ok(Object::String(bytes, _)) => match rect_of(annot) {
                Some(rect) => Some(Refresh::Text {
                    value: decode_text(bytes),
                    rect,
                    size: font_size_of(annot),
                }),
                None => None,
            },
            Ok(Object::Name(state)) => Some(Refresh::Button(state.clone())),
            _ => None,
        }
    };

    match refresh {
        Some(Refresh::Text { value, rect, size }) => {
            let width = (rect[2] - rect[0]).abs();
            let height = (rect[3] - rect[1]).abs();
            let baseline = ((height - size) / 2.0).max(2.0);
            let content = format!(
                "/Tx BMC\nq\nBT\n/Helv {size} Tf 0 g\n2 {baseline:.2} Td\n({}) Tj\nET\nQ\nEMC",
                escape_literal(&value)
            );
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![
                        Object::Real(0.0),
                        Object::Real(0.0),
                        Object::Real(width),
                        Object::Real(height),
                    ],
                    "Resources" => helvetica_resources(),
                },
                content.into_bytes(),
            );
            let ap_id = doc.add_object(Object::Stream(stream));
            let annot = doc.get_object_mut(annot_id)?.as_dict_mut()?;
            annot.set("AP", dictionary! { "N" => Object::Reference(ap_id) });
        }
        Some(Refresh::Button(state)) => {
            let annot = doc.get_object_mut(annot_id)?.as_dict_mut()?;
            annot.set("AS", Object::Name(state));
        }
        None => {}
    }
    Ok(())
}

pub fn helvetica_resources() -> Dictionary {
    dictionary! {
        "Font" => dictionary! {
            "Helv" => dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
            },
        },
    }
}

fn rect_of(annot: &Dictionary) -> Option<[f32; 4]> {
    let array = annot.get(b"Rect").ok()?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut rect = [0.0f32; 4];
    for (index, object) in array.iter().enumerate() {
        rect[index] = match object {
            Object::Integer(i) => *i as f32,
            Object::Real(r) => *r,
            _ => return None,
        };
    }
    Some(rect)
}

/// Font size from the annotation's default-appearance string, e.g.
/// "/Helv 10 Tf 0 g". A size of 0 means auto; use the default instead.
fn font_size_of(annot: &Dictionary) -> f32 {
    let da = match annot.get(b"DA").ok().and_then(|o| o.as_str().ok()) {
        Some(bytes) => decode_text(bytes),
        None => return DEFAULT_FONT_SIZE,
    };
    let re = Regex::new(r"/\S+\s+([0-9.]+)\s+Tf").unwrap();
    match re
        .captures(&da)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f32>().ok())
    {
        Some(size) if size > 0.0 => size,
        _ => DEFAULT_FONT_SIZE,
    }
}

fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '(' => escaped.push_str("\\("),
            ')' => escaped.push_str("\\)"),
            '\r' | '\n' => escaped.push(' '),
            other => escaped.push(other),
        }
    }
    escaped
}

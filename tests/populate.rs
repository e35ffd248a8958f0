//! End-to-end checks on a small in-memory enrollment template.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{dictionary, Document, Object, Stream};

use registrar::{
    BatchRunner, Cell, Error, FieldMap, NamingScheme, Populator, Row, RowStatus,
};

const TEMPLATE_FIELDS: &[(&str, &str)] = &[
    ("name", "Tx"),
    ("duke_id", "Tx"),
    ("class_number", "Tx"),
    ("date", "Tx"),
    ("fall_1", "Btn"),
    ("fall_2", "Btn"),
    ("spring_1", "Btn"),
    ("spring_2", "Btn"),
    ("credit", "Btn"),
    ("audit", "Btn"),
    // carries no entry in the field map
    ("advisor", "Tx"),
];

/// Build a one-page form template with the enrollment field set.
fn build_template(path: &Path, with_acroform: bool) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut annot_refs = vec![];
    for (index, (name, field_type)) in TEMPLATE_FIELDS.iter().enumerate() {
        let y = 700.0 - 24.0 * index as f32;
        let annot_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => *field_type,
            "T" => Object::string_literal(*name),
            "Rect" => vec![
                Object::Real(56.0),
                Object::Real(y),
                Object::Real(400.0),
                Object::Real(y + 18.0),
            ],
            "DA" => Object::string_literal("/Helv 10 Tf 0 g"),
            "F" => 4i64,
        });
        annot_refs.push(Object::Reference(annot_id));
    }

    let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, vec![])));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![
            Object::Real(0.0),
            Object::Real(0.0),
            Object::Real(612.0),
            Object::Real(792.0),
        ],
        "Contents" => Object::Reference(content_id),
        "Annots" => annot_refs.clone(),
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1i64,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    };
    if with_acroform {
        let form_id = doc.add_object(dictionary! {
            "Fields" => annot_refs,
            "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
        });
        catalog.set("AcroForm", Object::Reference(form_id));
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.save(path).unwrap();
}

fn sample_row() -> Row {
    let mut row = Row::new();
    row.insert(
        "Full name".to_string(),
        Cell::Text("Ada Lovelace".to_string()),
    );
    row.insert("Duke Unique ID#".to_string(), Cell::Number(3614.0));
    row.insert(
        " Class Number #".to_string(),
        Cell::Text("MGMT 748".to_string()),
    );
    row.insert(
        "Timestamp".to_string(),
        Cell::Text("2024-05-01 00:00:00".to_string()),
    );
    row.insert("Session".to_string(), Cell::Text("Fall-1".to_string()));
    row.insert("Credit/Audit".to_string(), Cell::Text("Audit".to_string()));
    row
}

/// All identified fields of a saved document: identifier -> `/V`.
fn field_values(path: &Path) -> BTreeMap<String, Option<Object>> {
    let doc = Document::load(path).unwrap();
    let mut values = BTreeMap::new();
    for page_id in doc.page_iter() {
        let page = doc.get_dictionary(page_id).unwrap();
        let Ok(annots) = page.get(b"Annots") else {
            continue;
        };
        for reference in annots.as_array().unwrap() {
            let Ok(id) = reference.as_reference() else {
                continue;
            };
            let annot = doc.get_dictionary(id).unwrap();
            let Ok(t) = annot.get(b"T") else { continue };
            let key = String::from_utf8_lossy(t.as_str().unwrap()).into_owned();
            values.insert(key, annot.get(b"V").ok().cloned());
        }
    }
    values
}

/// Regenerated normal-appearance stream contents, keyed by identifier.
fn appearance_streams(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let doc = Document::load(path).unwrap();
    let mut streams = BTreeMap::new();
    for page_id in doc.page_iter() {
        let page = doc.get_dictionary(page_id).unwrap();
        let Ok(annots) = page.get(b"Annots") else {
            continue;
        };
        for reference in annots.as_array().unwrap() {
            let Ok(id) = reference.as_reference() else {
                continue;
            };
            let annot = doc.get_dictionary(id).unwrap();
            let Ok(t) = annot.get(b"T") else { continue };
            let Ok(ap) = annot.get(b"AP") else { continue };
            let key = String::from_utf8_lossy(t.as_str().unwrap()).into_owned();
            let normal_id = ap
                .as_dict()
                .unwrap()
                .get(b"N")
                .unwrap()
                .as_reference()
                .unwrap();
            match doc.get_object(normal_id).unwrap() {
                Object::Stream(stream) => {
                    streams.insert(key, stream.content.clone());
                }
                other => panic!("expected appearance stream, got {other:?}"),
            }
        }
    }
    streams
}

fn text_value(values: &BTreeMap<String, Option<Object>>, key: &str) -> Option<String> {
    match values.get(key)? {
        Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

fn is_checked(values: &BTreeMap<String, Option<Object>>, key: &str) -> bool {
    matches!(values.get(key), Some(Some(Object::Name(name))) if name == b"Yes")
}

fn need_appearances(path: &Path) -> bool {
    let doc = Document::load(path).unwrap();
    let root_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    let form = match doc.get_dictionary(root_id).unwrap().get(b"AcroForm") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).unwrap().clone(),
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => return false,
    };
    matches!(form.get(b"NeedAppearances"), Ok(Object::Boolean(true)))
}

#[test]
fn mapped_values_and_special_rules_land_in_fields() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.pdf");
    build_template(&template, true);

    let out = dir.path().join("out.pdf");
    let populator = Populator::new(FieldMap::default());
    let report = populator
        .populate(&template, &sample_row(), None, &out)
        .unwrap();

    let values = field_values(&out);
    assert_eq!(text_value(&values, "name").as_deref(), Some("Ada Lovelace"));
    // integral xlsx number, no trailing .0
    assert_eq!(text_value(&values, "duke_id").as_deref(), Some("3614"));
    assert_eq!(
        text_value(&values, "class_number").as_deref(),
        Some("MGMT 748")
    );
    // time-of-day suffix dropped
    assert_eq!(text_value(&values, "date").as_deref(), Some("2024-05-01"));

    // only the slot whose sentinel matches the Session column is checked
    assert!(is_checked(&values, "fall_1"));
    assert!(!is_checked(&values, "fall_2"));
    assert!(!is_checked(&values, "spring_1"));
    assert!(!is_checked(&values, "spring_2"));

    assert!(is_checked(&values, "audit"));
    assert!(!is_checked(&values, "credit"));

    // the unmapped template field is reported, not fatal
    assert_eq!(report.unmapped, vec!["advisor".to_string()]);
    assert!(values.get("advisor").unwrap().is_none());
}

#[test]
fn populating_twice_yields_identical_field_values() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.pdf");
    build_template(&template, true);

    let populator = Populator::new(FieldMap::default());
    let first = dir.path().join("first.pdf");
    let second = dir.path().join("second.pdf");
    populator
        .populate(&template, &sample_row(), None, &first)
        .unwrap();
    populator
        .populate(&template, &sample_row(), None, &second)
        .unwrap();

    assert_eq!(field_values(&first), field_values(&second));

    // appearances match too, not just stored values
    let first_streams = appearance_streams(&first);
    assert!(!first_streams.is_empty());
    assert_eq!(first_streams, appearance_streams(&second));
}

#[test]
fn missing_session_column_skips_the_rule_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.pdf");
    build_template(&template, true);

    let mut row = sample_row();
    row.remove("Session");

    let out = dir.path().join("out.pdf");
    let report = Populator::new(FieldMap::default())
        .populate(&template, &row, None, &out)
        .unwrap();

    let values = field_values(&out);
    // the rest of the document populates normally
    assert_eq!(text_value(&values, "name").as_deref(), Some("Ada Lovelace"));
    for slot in ["fall_1", "fall_2", "spring_1", "spring_2"] {
        assert!(!is_checked(&values, slot), "{slot} must stay unset");
    }
    assert!(report
        .notes
        .iter()
        .any(|note| note.contains("'Session' column missing")));
}

#[test]
fn missing_credit_audit_column_skips_the_rule_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.pdf");
    build_template(&template, true);

    let mut row = sample_row();
    row.remove("Credit/Audit");

    let out = dir.path().join("out.pdf");
    let report = Populator::new(FieldMap::default())
        .populate(&template, &row, None, &out)
        .unwrap();

    let values = field_values(&out);
    assert_eq!(text_value(&values, "name").as_deref(), Some("Ada Lovelace"));
    assert!(!is_checked(&values, "credit"));
    assert!(!is_checked(&values, "audit"));
    // the session half of the row is still intact
    assert!(is_checked(&values, "fall_1"));
    assert!(report
        .notes
        .iter()
        .any(|note| note.contains("'Credit/Audit' column missing")));
}

#[test]
fn need_appearances_is_set_with_and_without_acroform() {
    let dir = tempfile::tempdir().unwrap();
    let populator = Populator::new(FieldMap::default());

    for with_acroform in [true, false] {
        let template = dir.path().join(format!("template_{with_acroform}.pdf"));
        build_template(&template, with_acroform);
        let out = dir.path().join(format!("out_{with_acroform}.pdf"));
        populator
            .populate(&template, &sample_row(), None, &out)
            .unwrap();
        assert!(need_appearances(&out), "acroform={with_acroform}");
    }
}

#[test]
fn text_fields_get_regenerated_appearance_streams() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.pdf");
    build_template(&template, true);

    let out = dir.path().join("out.pdf");
    Populator::new(FieldMap::default())
        .populate(&template, &sample_row(), None, &out)
        .unwrap();

    let doc = Document::load(&out).unwrap();
    let mut with_ap = 0;
    for page_id in doc.page_iter() {
        let page = doc.get_dictionary(page_id).unwrap();
        for reference in page.get(b"Annots").unwrap().as_array().unwrap() {
            let annot = doc
                .get_dictionary(reference.as_reference().unwrap())
                .unwrap();
            if matches!(annot.get(b"V"), Ok(Object::String(_, _))) {
                let ap = annot.get(b"AP").unwrap().as_dict().unwrap();
                assert!(ap.get(b"N").unwrap().as_reference().is_ok());
                with_ap += 1;
            }
        }
    }
    assert!(with_ap >= 4, "expected appearance streams on text fields");
}

#[test]
fn approval_pages_are_appended_after_the_template() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.pdf");
    build_template(&template, true);

    let screenshot = dir.path().join("approval.png");
    image::RgbImage::from_pixel(3, 3, image::Rgb([10, 120, 10]))
        .save(&screenshot)
        .unwrap();
    let approval = dir.path().join("approval.pdf");
    registrar::convert_image(&screenshot, &approval).unwrap();

    let out = dir.path().join("out.pdf");
    Populator::new(FieldMap::default())
        .populate(&template, &sample_row(), Some(&approval), &out)
        .unwrap();

    let doc = Document::load(&out).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
    // field values survive the append
    let values = field_values(&out);
    assert_eq!(text_value(&values, "name").as_deref(), Some("Ada Lovelace"));
}

/// A template whose page tree has an intermediate node holding two pages.
fn build_nested_template(path: &Path) {
    let mut doc = Document::with_version("1.5");
    let root_pages_id = doc.new_object_id();
    let branch_id = doc.new_object_id();

    let annot_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal("name"),
        "Rect" => vec![
            Object::Real(56.0),
            Object::Real(700.0),
            Object::Real(400.0),
            Object::Real(718.0),
        ],
        "DA" => Object::string_literal("/Helv 10 Tf 0 g"),
        "F" => 4i64,
    });
    let media_box = vec![
        Object::Real(0.0),
        Object::Real(0.0),
        Object::Real(612.0),
        Object::Real(792.0),
    ];
    let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, vec![])));
    let page_one = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(branch_id),
        "MediaBox" => media_box.clone(),
        "Contents" => Object::Reference(content_id),
        "Annots" => vec![Object::Reference(annot_id)],
    });
    let page_two = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(branch_id),
        "MediaBox" => media_box,
        "Contents" => Object::Reference(content_id),
    });

    doc.objects.insert(
        branch_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Parent" => Object::Reference(root_pages_id),
            "Kids" => vec![Object::Reference(page_one), Object::Reference(page_two)],
            "Count" => 2i64,
        }),
    );
    doc.objects.insert(
        root_pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(branch_id)],
            "Count" => 2i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(root_pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.save(path).unwrap();
}

#[test]
fn append_counts_leaf_pages_in_a_nested_page_tree() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("nested.pdf");
    build_nested_template(&template);

    let screenshot = dir.path().join("approval.png");
    image::RgbImage::from_pixel(3, 3, image::Rgb([10, 120, 10]))
        .save(&screenshot)
        .unwrap();
    let approval = dir.path().join("approval.pdf");
    registrar::convert_image(&screenshot, &approval).unwrap();

    let out = dir.path().join("out.pdf");
    Populator::new(FieldMap::default())
        .populate(&template, &sample_row(), Some(&approval), &out)
        .unwrap();

    let doc = Document::load(&out).unwrap();
    assert_eq!(doc.get_pages().len(), 3);

    // the root node's Count reflects leaf pages, not its direct kids
    let root_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    let pages_id = doc
        .get_dictionary(root_id)
        .unwrap()
        .get(b"Pages")
        .unwrap()
        .as_reference()
        .unwrap();
    let pages = doc.get_dictionary(pages_id).unwrap();
    assert_eq!(pages.get(b"Count").unwrap().as_i64().unwrap(), 3);
}

#[test]
fn inline_annotation_entries_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.pdf");

    // one referenced field plus one inline dictionary in /Annots
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let annot_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal("name"),
        "Rect" => vec![
            Object::Real(56.0),
            Object::Real(700.0),
            Object::Real(400.0),
            Object::Real(718.0),
        ],
        "DA" => Object::string_literal("/Helv 10 Tf 0 g"),
        "F" => 4i64,
    });
    let inline_annot = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal("duke_id"),
    };
    let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, vec![])));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![
            Object::Real(0.0),
            Object::Real(0.0),
            Object::Real(612.0),
            Object::Real(792.0),
        ],
        "Contents" => Object::Reference(content_id),
        "Annots" => vec![
            Object::Reference(annot_id),
            Object::Dictionary(inline_annot),
        ],
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
    doc.save(&template).unwrap();

    let out = dir.path().join("out.pdf");
    let report = Populator::new(FieldMap::default())
        .populate(&template, &sample_row(), None, &out)
        .unwrap();

    // the referenced field still fills; the inline entry is surfaced
    let values = field_values(&out);
    assert_eq!(text_value(&values, "name").as_deref(), Some("Ada Lovelace"));
    assert!(report
        .notes
        .iter()
        .any(|note| note.contains("inline annotation")));
}

#[test]
fn missing_template_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = Populator::new(FieldMap::default())
        .populate(
            &dir.path().join("nowhere.pdf"),
            &sample_row(),
            None,
            &dir.path().join("out.pdf"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::TemplateNotFound(_)));
}

#[test]
fn batch_isolates_row_failures_and_reports_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.pdf");
    build_template(&template, true);

    let mut nameless = sample_row();
    nameless.remove("Full name");
    let rows = vec![sample_row(), nameless];

    let out_dir = dir.path().join("results");
    let runner = BatchRunner::new(
        Populator::new(FieldMap::default()),
        out_dir.clone(),
        None,
        NamingScheme::FullName,
    );
    let outcomes = runner.run(&template, &rows).unwrap();
    assert_eq!(outcomes.len(), 2);

    match &outcomes[0].status {
        RowStatus::Generated { file, filled, .. } => {
            assert_eq!(file, &out_dir.join("Ada_Lovelace.pdf"));
            assert!(file.is_file());
            assert!(*filled >= 4);
        }
        other => panic!("expected generated, got {other:?}"),
    }
    assert!(matches!(outcomes[1].status, RowStatus::Skipped { .. }));
    assert_eq!(outcomes[1].row, 3);
}

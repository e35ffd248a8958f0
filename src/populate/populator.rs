use std::fs;
use std::path::Path;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::mapping::{symbol, FieldMap};
use crate::sheet::Row;

use super::appearance::{helvetica_resources, refresh_annotation};
use super::decoder::decode_text;

/// What happened while filling one document: counts for the report plus
/// row-scoped notes (skipped rules, identifiers with no mapping).
#[derive(Debug, Default, Clone, Serialize)]
pub struct FillReport {
    pub filled: usize,
    pub checked: usize,
    pub unmapped: Vec<String>,
    pub notes: Vec<String>,
}

impl FillReport {
    fn note_once(&mut self, note: String) {
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }
}

enum FieldWrite {
    Value(String),
    Checked,
}

/// Produces one populated document from one template and one data row.
/// Holds only the immutable field map; safe to reuse across rows.
pub struct Populator {
    map: FieldMap,
}

impl Populator {
    pub fn new(map: FieldMap) -> Populator {
        Populator { map }
    }

    /// Populate `template` with `row`, append the pages of `approval` if
    /// supplied, and write the result to `out` (via a temporary path, so
    /// a crash never publishes a partial file).
    pub fn populate(
        &self,
        template: &Path,
        row: &Row,
        approval: Option<&Path>,
        out: &Path,
    ) -> Result<FillReport> {
        if !template.is_file() {
            return Err(Error::TemplateNotFound(template.to_path_buf()));
        }
        let mut doc = Document::load(template)?;
        let mut report = FillReport::default();

        let pages: Vec<ObjectId> = doc.page_iter().collect();
        for page_id in &pages {
            let (annot_ids, inline) = annotation_ids(&doc, *page_id)?;
            if inline > 0 {
                report.note_once(format!("{inline} inline annotation entries not filled"));
            }
            for annot_id in annot_ids {
                self.fill_annotation(&mut doc, annot_id, row, &mut report)?;
            }
        }

        ensure_need_appearances(&mut doc)?;

        if let Some(path) = approval {
            if path.is_file() {
                append_document(&mut doc, Document::load(path)?)?;
            } else {
                report.note_once(format!("approval page missing: {}", path.display()));
            }
        }

        // re-walk: only the template's own pages carry form fields
        for page_id in &pages {
            let (annot_ids, _) = annotation_ids(&doc, *page_id)?;
            for annot_id in annot_ids {
                refresh_annotation(&mut doc, annot_id)?;
            }
        }

        save_atomic(&mut doc, out)?;
        tracing::debug!(
            out = %out.display(),
            filled = report.filled,
            checked = report.checked,
            "populated document"
        );
        Ok(report)
    }

    /// Apply the population rules to one annotation. The rules are
    /// independent sequential checks; a later matching rule overwrites
    /// the pending write of an earlier one.
    fn fill_annotation(
        &self,
        doc: &mut Document,
        annot_id: ObjectId,
        row: &Row,
        report: &mut FillReport,
    ) -> Result<()> {
        let key = {
            let annot = doc.get_dictionary(annot_id)?;
            field_identifier(annot)
        };
        let Some(key) = key else {
            // not a data field
            return Ok(());
        };

        let mut pending: Option<FieldWrite> = None;

        // general rule: mapped column present in the row
        match self.map.resolve(&key) {
            Some(column) => {
                if let Some(cell) = row.get(column) {
                    pending = Some(FieldWrite::Value(cell.stringify()));
                }
            }
            None => {
                tracing::debug!(field = %key, "no mapping for template field");
                report.unmapped.push(key.clone());
            }
        }

        // session slots check against the row's Session column, not the
        // mapped column itself
        if symbol::SESSION_SLOTS.contains(&key.as_str()) {
            match (row.get(symbol::SESSION_COLUMN), self.map.resolve(&key)) {
                (Some(session), Some(label)) if session.stringify() == label => {
                    pending = Some(FieldWrite::Checked);
                }
                (None, _) => report.note_once(format!(
                    "'{}' column missing; session checkboxes skipped",
                    symbol::SESSION_COLUMN
                )),
                _ => {}
            }
        }

        // date fields keep only the first token, dropping a time suffix
        if symbol::DATE_FIELDS.contains(&key.as_str()) {
            if let Some(cell) = self.map.resolve(&key).and_then(|column| row.get(column)) {
                let value = cell.stringify();
                let token = value.split_whitespace().next().unwrap_or_default();
                pending = Some(FieldWrite::Value(token.to_string()));
            }
        }

        if key == symbol::CREDIT_FIELD || key == symbol::AUDIT_FIELD {
            match (row.get(symbol::ENROLLMENT_COLUMN), self.map.resolve(&key)) {
                (Some(choice), Some(label)) if choice.stringify() == label => {
                    pending = Some(FieldWrite::Checked);
                }
                (None, _) => report.note_once(format!(
                    "'{}' column missing; credit/audit checkboxes skipped",
                    symbol::ENROLLMENT_COLUMN
                )),
                _ => {}
            }
        }

        match pending {
            Some(FieldWrite::Value(value)) => {
                let annot = doc.get_object_mut(annot_id)?.as_dict_mut()?;
                annot.set("V", Object::string_literal(value));
                report.filled += 1;
            }
            Some(FieldWrite::Checked) => {
                let annot = doc.get_object_mut(annot_id)?.as_dict_mut()?;
                annot.set("V", Object::Name(symbol::CHECKED.to_vec()));
                annot.set("AS", Object::Name(symbol::CHECKED.to_vec()));
                report.checked += 1;
            }
            None => {}
        }
        Ok(())
    }
}

/// The logical key of a field annotation: its `/T` entry, decoded.
fn field_identifier(annot: &Dictionary) -> Option<String> {
    let raw = annot.get(b"T").ok()?.as_str().ok()?;
    let key = decode_text(raw);
    let key = key.trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Annotation object ids of one page, in `/Annots` order, plus the count
/// of inline (non-reference) entries. The array may be inline or
/// referenced; inline entries cannot be mutated through an object id and
/// are reported back to the caller instead of being dropped silently.
fn annotation_ids(doc: &Document, page_id: ObjectId) -> Result<(Vec<ObjectId>, usize)> {
    let page = doc.get_dictionary(page_id)?;
    let annots = match page.get(b"Annots") {
        Ok(Object::Array(array)) => array.clone(),
        Ok(Object::Reference(id)) => doc.get_object(*id)?.as_array()?.clone(),
        _ => return Ok((vec![], 0)),
    };
    let mut ids = Vec::with_capacity(annots.len());
    let mut inline = 0;
    for object in &annots {
        match object.as_reference() {
            Ok(id) => ids.push(id),
            Err(_) => {
                tracing::debug!(page = ?page_id, "inline annotation entry in /Annots");
                inline += 1;
            }
        }
    }
    Ok((ids, inline))
}

/// Set the form-level NeedAppearances flag, creating the interactive-form
/// container when the template has none.
fn ensure_need_appearances(doc: &mut Document) -> Result<()> {
    let root_id = doc.trailer.get(b"Root")?.as_reference()?;
    let acro_form = doc.get_dictionary(root_id)?.get(b"AcroForm").ok().cloned();
    match acro_form {
        Some(Object::Reference(form_id)) => {
            let form = doc.get_object_mut(form_id)?.as_dict_mut()?;
            form.set("NeedAppearances", true);
        }
        Some(Object::Dictionary(mut form)) => {
            form.set("NeedAppearances", true);
            let root = doc.get_object_mut(root_id)?.as_dict_mut()?;
            root.set("AcroForm", Object::Dictionary(form));
        }
        _ => {
            let fields = field_references(doc)?;
            let form_id = doc.add_object(dictionary! {
                "Fields" => fields,
                "NeedAppearances" => true,
                "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
                "DR" => helvetica_resources(),
            });
            let root = doc.get_object_mut(root_id)?.as_dict_mut()?;
            root.set("AcroForm", Object::Reference(form_id));
        }
    }
    Ok(())
}

/// References to every identified field annotation, for a freshly created
/// form container's `/Fields` array.
fn field_references(doc: &Document) -> Result<Vec<Object>> {
    let mut fields = vec![];
    let pages: Vec<ObjectId> = doc.page_iter().collect();
    for page_id in pages {
        let (annot_ids, _) = annotation_ids(doc, page_id)?;
        for annot_id in annot_ids {
            if doc.get_dictionary(annot_id)?.has(b"T") {
                fields.push(Object::Reference(annot_id));
            }
        }
    }
    Ok(fields)
}

/// Append every page of `other` after the template's pages.
fn append_document(doc: &mut Document, mut other: Document) -> Result<()> {
    other.renumber_objects_with(doc.max_id + 1);
    doc.max_id = other.max_id;
    let other_pages = other.get_pages();

    let root_id = doc.trailer.get(b"Root")?.as_reference()?;
    let pages_id = doc.get_dictionary(root_id)?.get(b"Pages")?.as_reference()?;

    doc.objects.extend(other.objects);

    let mut appended = vec![];
    for (_, page_id) in other_pages {
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        page.set("Parent", Object::Reference(pages_id));
        appended.push(Object::Reference(page_id));
    }

    {
        let pages = doc.get_object_mut(pages_id)?.as_dict_mut()?;
        let mut kids = pages.get(b"Kids")?.as_array()?.clone();
        kids.extend(appended);
        pages.set("Kids", kids);
    }

    // the template's page tree may have intermediate nodes, so count
    // leaf pages rather than root kids
    let count = doc.get_pages().len() as i64;
    let pages = doc.get_object_mut(pages_id)?.as_dict_mut()?;
    pages.set("Count", count);
    Ok(())
}

/// Write to a sibling temporary path, then rename into place.
fn save_atomic(doc: &mut Document, out: &Path) -> Result<()> {
    let tmp = out.with_extension("tmp");
    doc.save(&tmp)?;
    fs::rename(&tmp, out)?;
    Ok(())
}

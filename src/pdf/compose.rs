use std::path::{Path, PathBuf};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::info;

use crate::config::Config;
use crate::error::{CertmailError, Result};
use crate::pdf::overlay::{render_overlay, PageGeometry};

/// Produces the personalized certificate: renders the name overlay at the
/// base page's geometry, composites it on top of the base page, and writes
/// the result as a single-page PDF to `out_path`.
pub fn compose_certificate(config: &Config, name: &str, out_path: &Path) -> Result<PathBuf> {
    if !config.base_cert.is_file() {
        return Err(CertmailError::BaseCertificateNotFound(
            config.base_cert.display().to_string(),
        ));
    }
    let mut base = Document::load(&config.base_cert)?;
    let (page_no, page_id) = first_page(&base)?;
    let geometry = page_geometry(&base, page_id)?;

    render_overlay(name, geometry, &config.layout, &config.overlay_path)?;
    let overlay = Document::load(&config.overlay_path)?;
    merge_overlay(&mut base, overlay, page_id)?;

    // The output is exactly the personalized page.
    let extra: Vec<u32> = base
        .get_pages()
        .keys()
        .copied()
        .filter(|n| *n != page_no)
        .collect();
    if !extra.is_empty() {
        base.delete_pages(&extra);
    }

    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    base.save(out_path)?;
    std::fs::remove_file(&config.overlay_path)?;

    info!("Generated certificate for {}: {}", name, out_path.display());
    Ok(out_path.to_path_buf())
}

fn first_page(doc: &Document) -> Result<(u32, ObjectId)> {
    doc.get_pages()
        .into_iter()
        .next()
        .ok_or_else(|| CertmailError::InvalidBaseCertificate("document has no pages".to_string()))
}

/// MediaBox of the page, following the Parent chain for inherited values.
fn page_geometry(doc: &Document, page_id: ObjectId) -> Result<PageGeometry> {
    let mut current = page_id;
    loop {
        let dict = doc.get_dictionary(current)?;
        if let Ok(obj) = dict.get(b"MediaBox") {
            let media_box = resolve(doc, obj)?.as_array()?;
            if media_box.len() != 4 {
                return Err(CertmailError::InvalidBaseCertificate(
                    "malformed MediaBox".to_string(),
                ));
            }
            let x0 = number(&media_box[0])?;
            let y0 = number(&media_box[1])?;
            let x1 = number(&media_box[2])?;
            let y1 = number(&media_box[3])?;
            return Ok(PageGeometry {
                width: x1 - x0,
                height: y1 - y0,
            });
        }
        match dict.get(b"Parent").and_then(|o| o.as_reference()) {
            Ok(parent) => current = parent,
            Err(_) => {
                return Err(CertmailError::InvalidBaseCertificate(
                    "first page has no MediaBox".to_string(),
                ))
            }
        }
    }
}

/// Composites the overlay's first page onto `base_page_id`. The base page
/// content is bracketed in `q`/`Q` so any graphics state it leaves open
/// cannot leak into the overlay, then the overlay content stream and font
/// resources are appended.
fn merge_overlay(base: &mut Document, mut overlay: Document, base_page_id: ObjectId) -> Result<()> {
    overlay.renumber_objects_with(base.max_id + 1);
    let (_, overlay_page_id) = first_page(&overlay)?;
    let overlay_contents = content_refs(&overlay, overlay_page_id)?;
    let overlay_fonts = page_fonts(&overlay, overlay_page_id)?;
    let overlay_max_id = overlay.max_id;

    base.objects.extend(overlay.objects);
    base.max_id = overlay_max_id;

    let base_contents = content_refs(base, base_page_id)?;
    let push_state = base.add_object(Object::Stream(Stream::new(dictionary! {}, b"q\n".to_vec())));
    let pop_state = base.add_object(Object::Stream(Stream::new(dictionary! {}, b"Q\n".to_vec())));

    let mut contents: Vec<Object> = Vec::with_capacity(base_contents.len() + overlay_contents.len() + 2);
    contents.push(push_state.into());
    contents.extend(base_contents);
    contents.push(pop_state.into());
    contents.extend(overlay_contents);

    let mut resources = page_resources(base, base_page_id)?;
    let mut fonts = match resources.get(b"Font") {
        Ok(obj) => resolve(base, obj)?.as_dict()?.clone(),
        Err(_) => Dictionary::new(),
    };
    for (key, value) in overlay_fonts {
        fonts.set(key, value);
    }
    resources.set("Font", Object::Dictionary(fonts));

    let page = base.get_object_mut(base_page_id)?.as_dict_mut()?;
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Content stream references of a page, as an array of references. An
/// inline stream is hoisted into its own object first.
fn content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let dict = doc.get_dictionary(page_id)?;
    match dict.get(b"Contents") {
        Ok(Object::Reference(id)) => Ok(vec![Object::Reference(*id)]),
        Ok(Object::Array(items)) => Ok(items.clone()),
        Ok(_) => Err(CertmailError::InvalidBaseCertificate(
            "unsupported page contents".to_string(),
        )),
        Err(_) => Ok(Vec::new()),
    }
}

/// Page Resources as an owned dictionary, following the Parent chain for
/// inherited resources. Missing resources resolve to an empty dictionary.
fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut current = page_id;
    loop {
        let dict = doc.get_dictionary(current)?;
        if let Ok(obj) = dict.get(b"Resources") {
            return Ok(resolve(doc, obj)?.as_dict()?.clone());
        }
        match dict.get(b"Parent").and_then(|o| o.as_reference()) {
            Ok(parent) => current = parent,
            Err(_) => return Ok(Dictionary::new()),
        }
    }
}

fn page_fonts(doc: &Document, page_id: ObjectId) -> Result<Vec<(Vec<u8>, Object)>> {
    let resources = page_resources(doc, page_id)?;
    match resources.get(b"Font") {
        Ok(obj) => Ok(resolve(doc, obj)?
            .as_dict()?
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()),
        Err(_) => Ok(Vec::new()),
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        _ => Ok(obj),
    }
}

fn number(obj: &Object) -> Result<f64> {
    match obj {
        Object::Integer(i) => Ok(*i as f64),
        Object::Real(r) => Ok(*r as f64),
        _ => Err(CertmailError::InvalidBaseCertificate(
            "non-numeric MediaBox entry".to_string(),
        )),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::tests_support::test_config;
    use lopdf::content::Content;

    /// Minimal single-page base certificate for tests.
    pub(crate) fn write_base(path: &Path, width: f64, height: f64) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content = Content { operations: vec![] };
        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                width.into(),
                height.into(),
            ],
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_compose_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_base(&config.base_cert, 842.0, 595.0);

        let out_path = config.output_dir.join("ada_lovelace.pdf");
        compose_certificate(&config, "Ada Lovelace", &out_path).unwrap();

        let doc = Document::load(&out_path).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        let text = doc.extract_text(&[1]).unwrap();
        assert!(text.contains("Ada Lovelace"));

        // Transient overlay is cleaned up after the merge.
        assert!(!config.overlay_path.exists());
    }

    #[test]
    fn test_compose_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_base(&config.base_cert, 842.0, 595.0);

        let out_path = config.output_dir.join("ada_lovelace.pdf");
        compose_certificate(&config, "Ada Lovelace", &out_path).unwrap();
        let first = std::fs::read(&out_path).unwrap();
        compose_certificate(&config, "Ada Lovelace", &out_path).unwrap();
        let second = std::fs::read(&out_path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_base_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let out_path = config.output_dir.join("x.pdf");
        let err = compose_certificate(&config, "X", &out_path).unwrap_err();
        assert!(matches!(err, CertmailError::BaseCertificateNotFound(_)));
    }

    #[test]
    fn test_geometry_from_base_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base.pdf");
        write_base(&path, 842.0, 595.0);

        let doc = Document::load(&path).unwrap();
        let (_, page_id) = first_page(&doc).unwrap();
        let geometry = page_geometry(&doc, page_id).unwrap();
        assert_eq!(geometry, PageGeometry { width: 842.0, height: 595.0 });
    }
}

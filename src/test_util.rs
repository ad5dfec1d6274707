#[cfg(test)]
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|err| err.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: HOME_MUTEX serializes every test that touches HOME.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

/// Builds an A4 document with one page per raw content stream. Every page
/// shares a Helvetica `/F1` resource and inherits its MediaBox from the page
/// tree root.
#[cfg(test)]
pub(crate) fn sample_pdf(contents: &[&str]) -> Vec<u8> {
    use lopdf::{Document, Object, Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let mut kids = Vec::new();
    for content in contents {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save sample pdf");
    bytes
}

/// One page per entry, each line drawn with `Tj` at 12pt, 20pt apart.
#[cfg(test)]
pub(crate) fn text_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let contents = pages
        .iter()
        .map(|lines| {
            let mut ops = String::from("BT /F1 12 Tf 72 720 Td ");
            for (idx, line) in lines.iter().enumerate() {
                if idx > 0 {
                    ops.push_str("0 -20 Td ");
                }
                ops.push_str(&format!("({line}) Tj "));
            }
            ops.push_str("ET");
            ops
        })
        .collect::<Vec<_>>();
    let refs = contents.iter().map(String::as_str).collect::<Vec<_>>();
    sample_pdf(&refs)
}

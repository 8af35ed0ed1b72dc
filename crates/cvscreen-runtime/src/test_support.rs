//! Fixtures shared by unit tests.

use lopdf::{dictionary, Document, Object, Stream};

/// Build a PDF with one page per content stream, Helvetica as `/F1`.
pub(crate) fn make_pdf(page_contents: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for content in page_contents {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Single-page CV: a large name header followed by body lines.
pub(crate) fn cv_pdf(name: &str, lines: &[&str]) -> Vec<u8> {
    let mut content = format!("BT /F1 22 Tf 72 740 Td ({}) Tj ET BT /F1 11 Tf 72 710 Td", name);
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            content.push_str(" 0 -14 Td");
        }
        content.push_str(&format!(" ({}) Tj", line));
    }
    content.push_str(" ET");
    make_pdf(&[&content])
}

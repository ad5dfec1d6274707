use std::collections::HashMap;
use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use pdf_translation_studio::{
    Dictionary, DocumentKind, ExtractionMethod, Extractor, ExtractorConfig, MethodChoice,
    Pipeline, Progress, RandomFiller, RenderOptions, TranslationEngine,
};

fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for line in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
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

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save pdf");
    bytes
}

fn pipeline(threshold: usize) -> Pipeline {
    let dictionary = Arc::new(Dictionary::new(HashMap::from([
        ("hello".to_string(), "X".to_string()),
        ("world".to_string(), "Y".to_string()),
    ])));
    let config = ExtractorConfig {
        scanned_threshold: threshold,
        ..ExtractorConfig::default()
    };
    Pipeline::with_parts(
        Extractor::new(config),
        TranslationEngine::with_placeholder(dictionary, RandomFiller::seeded("", 7)),
        RenderOptions {
            generated_on: "2024-05-01".to_string(),
            ..RenderOptions::default()
        },
    )
}

#[tokio::test]
async fn digital_document_is_translated_and_interleaved() {
    let pdf = build_pdf(&["hello world", "unknown term"]);
    let output = pipeline(5)
        .run(&pdf, MethodChoice::Auto, &Progress::silent())
        .await
        .expect("pipeline run");

    assert_eq!(output.kind, DocumentKind::Digital);
    assert_eq!(output.method, ExtractionMethod::Digital);
    assert_eq!(output.translated.len(), 2);

    let first = &output.translated[0];
    assert_eq!(first.translated_text, "X Y");
    let mappings = first
        .word_mappings
        .iter()
        .map(|m| (m.original.as_str(), m.translated.as_str(), m.confidence))
        .collect::<Vec<_>>();
    assert_eq!(mappings, vec![("hello", "X", 1.0), ("world", "Y", 1.0)]);

    let second = &output.translated[1];
    assert_eq!(second.word_mappings.len(), 2);
    assert!(second.word_mappings.iter().all(|m| m.confidence == 0.7));
    assert!(
        second
            .word_mappings
            .iter()
            .all(|m| m.translated.chars().all(|ch| !ch.is_ascii()))
    );

    assert_eq!(output.stats.total_pages, 2);
    assert!((output.stats.confidence - 0.85).abs() < 1e-9);

    let rendered = Document::load_mem(&output.document).expect("reload output");
    // Source and translation pages interleaved, then one mapping page each.
    assert_eq!(rendered.get_pages().len(), 2 * 2 + 2);
}

#[tokio::test]
async fn sparse_text_layer_classifies_as_scanned() {
    let pdf = build_pdf(&["hello world"]);
    let extractor = Extractor::new(ExtractorConfig::default());
    assert_eq!(extractor.classify(&pdf), DocumentKind::Scanned);

    let extractor = Extractor::new(ExtractorConfig {
        scanned_threshold: 5,
        ..ExtractorConfig::default()
    });
    assert_eq!(extractor.classify(&pdf), DocumentKind::Digital);
}

#[tokio::test]
async fn corrupt_bytes_classify_as_scanned() {
    let extractor = Extractor::new(ExtractorConfig::default());
    assert_eq!(extractor.classify(b"%PDF-1.4 garbage"), DocumentKind::Scanned);
}

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;

/// Reads a TEI bilingual dictionary (FreeDict layout) into a word map.
///
/// For every `<entry>` the first `form/orth` becomes the lowercased source
/// word and the first `sense/cit/quote` its translation. Entries missing
/// either part are skipped; later entries overwrite earlier ones.
pub fn parse_tei(xml: &str) -> Result<HashMap<String, String>> {
    // Some published dumps carry junk (BOMs, banners) before the prolog.
    let xml = match xml.find('<') {
        Some(start) => &xml[start..],
        None => return Ok(HashMap::new()),
    };

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut dictionary = HashMap::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut word: Option<String> = None;
    let mut translation: Option<String> = None;
    let mut buffer = String::new();

    loop {
        match reader
            .read_event()
            .with_context(|| format!("invalid TEI at byte {}", reader.buffer_position()))?
        {
            Event::Eof => break,
            Event::Start(start) => {
                let name = start.local_name().as_ref().to_vec();
                if name == b"entry" {
                    word = None;
                    translation = None;
                }
                path.push(name);
                buffer.clear();
            }
            Event::Text(text) => {
                let decoded = text.unescape().with_context(|| "failed to decode TEI text")?;
                buffer.push_str(&decoded);
            }
            Event::CData(cdata) => {
                buffer.push_str(&String::from_utf8_lossy(&cdata));
            }
            Event::End(_) => {
                if ends_with(&path, &[b"form", b"orth"]) && word.is_none() {
                    let value = buffer.trim().to_lowercase();
                    if !value.is_empty() {
                        word = Some(value);
                    }
                } else if ends_with(&path, &[b"sense", b"cit", b"quote"]) && translation.is_none()
                {
                    let value = buffer.trim().to_string();
                    if !value.is_empty() {
                        translation = Some(value);
                    }
                } else if ends_with(&path, &[b"entry"]) {
                    if let (Some(word), Some(translation)) = (word.take(), translation.take()) {
                        dictionary.insert(word, translation);
                    }
                }
                path.pop();
                buffer.clear();
            }
            _ => {}
        }
    }

    Ok(dictionary)
}

fn ends_with(path: &[Vec<u8>], suffix: &[&[u8]]) -> bool {
    if path.len() < suffix.len() {
        return false;
    }
    path[path.len() - suffix.len()..]
        .iter()
        .zip(suffix)
        .all(|(segment, expected)| segment.as_slice() == *expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"garbage before prolog
<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <text><body>
    <entry>
      <form><orth>Heart</orth></form>
      <sense><cit type="trans"><quote>قلب</quote></cit></sense>
    </entry>
    <entry>
      <form><orth>lung</orth></form>
      <sense><cit type="trans"><quote>رئة</quote><quote>second</quote></cit></sense>
    </entry>
    <entry>
      <form><orth>orphan</orth></form>
    </entry>
  </body></text>
</TEI>"#;

    #[test]
    fn parses_orth_and_first_quote() {
        let dictionary = parse_tei(SAMPLE).expect("parse");
        assert_eq!(dictionary.len(), 2);
        assert_eq!(dictionary["heart"], "قلب");
        assert_eq!(dictionary["lung"], "رئة");
        assert!(!dictionary.contains_key("orphan"));
    }

    #[test]
    fn text_without_markup_is_empty() {
        assert!(parse_tei("no xml here").expect("parse").is_empty());
    }
}

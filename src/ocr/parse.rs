use anyhow::{Result, anyhow};

use super::{BBoxPx, OcrWord};

const WORD_LEVEL: i32 = 5;
const TSV_COLUMNS: usize = 12;

/// Collects word-level rows from `tesseract ... tsv` output, in the order
/// tesseract emitted them (block, paragraph, line, word).
pub(super) fn parse_tsv_words(tsv: &str) -> Result<Vec<OcrWord>> {
    let mut lines = tsv.lines();
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    if !header.starts_with("level") {
        return Err(anyhow!("unexpected tesseract tsv header: {}", header.trim()));
    }

    let mut words = Vec::new();
    for row in lines {
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < TSV_COLUMNS {
            continue;
        }
        let level: i32 = cols[0].parse().unwrap_or(0);
        if level != WORD_LEVEL {
            continue;
        }
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        words.push(OcrWord {
            text: text.to_string(),
            bbox: BBoxPx {
                x: cols[6].parse().unwrap_or(0),
                y: cols[7].parse().unwrap_or(0),
                w: cols[8].parse().unwrap_or(0),
                h: cols[9].parse().unwrap_or(0),
            },
            conf: (conf / 100.0).clamp(0.0, 1.0),
        });
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn keeps_word_rows_in_emitted_order() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t1190\t1684\t-1\t\n\
             4\t1\t1\t1\t1\t0\t100\t80\t400\t40\t-1\t\n\
             5\t1\t1\t1\t1\t1\t100\t80\t150\t40\t96.5\tPatient\n\
             5\t1\t1\t1\t1\t2\t270\t82\t120\t38\t88\tname\n\
             5\t1\t1\t1\t1\t3\t400\t82\t10\t38\t95\t \n\
             5\t1\t1\t1\t2\t1\t100\t140\t90\t40\t-1\tghost\n"
        );
        let words = parse_tsv_words(&tsv).expect("parse");
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Patient");
        assert_eq!(words[0].bbox.x, 100);
        assert_eq!(words[0].bbox.w, 150);
        assert!((words[0].conf - 0.965).abs() < 1e-6);
        assert_eq!(words[1].text, "name");
    }

    #[test]
    fn empty_output_has_no_words() {
        assert!(parse_tsv_words("").expect("parse").is_empty());
        assert!(parse_tsv_words("garbage").is_err());
    }
}

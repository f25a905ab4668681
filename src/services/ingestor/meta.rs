//! HTML meta-tag extraction and entity decoding for the content ingestor
//! (spec.md §4.5 step 4). Deliberately small and regex-free: a handful of
//! attribute scans over the raw bytes rather than a full HTML parser, since
//! only five tag shapes matter here.

pub struct ExtractedMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub site_name: Option<String>,
}

fn find_meta_content(html: &str, attr_name: &str, attr_value: &str) -> Option<String> {
    let needle_a = format!("{attr_name}=\"{attr_value}\"");
    let needle_b = format!("{attr_name}='{attr_value}'");

    for needle in [needle_a.as_str(), needle_b.as_str()] {
        if let Some(tag_start) = html.find(needle) {
            let tag_open = html[..tag_start].rfind('<')?;
            let tag_end = html[tag_start..].find('>').map(|i| tag_start + i)?;
            let tag = &html[tag_open..tag_end];
            if let Some(content) = extract_attr(tag, "content") {
                return Some(decode_entities(&content));
            }
        }
    }
    None
}

fn extract_attr(tag: &str, attr: &str) -> Option<String> {
    for quote in ['"', '\''] {
        let needle = format!("{attr}={quote}");
        if let Some(start) = tag.find(&needle) {
            let rest = &tag[start + needle.len()..];
            if let Some(end) = rest.find(quote) {
                return Some(rest[..end].to_string());
            }
        }
    }
    None
}

fn extract_title_tag(html: &str) -> Option<String> {
    let start = html.find("<title")?;
    let open_end = html[start..].find('>')? + start + 1;
    let close = html[open_end..].find("</title>")? + open_end;
    Some(decode_entities(html[open_end..close].trim()))
}

/// Decodes numeric entities (`&#NN;`, `&#xHH;`) and the common named
/// entities (`&amp;`, `&lt;`, `&gt;`, `&quot;`, `&#39;`, `&nbsp;`) found in
/// page titles and descriptions (spec.md §4.5 step 4).
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    let bytes = input.as_bytes();

    let named = [
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&#39;", '\''),
        ("&apos;", '\''),
        ("&nbsp;", '\u{00A0}'),
    ];

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'&' {
            if let Some(rest) = input.get(i..) {
                if let Some(semi) = rest.find(';').filter(|&p| p < 12) {
                    let entity = &rest[..=semi];
                    if let Some(hex) = entity.strip_prefix("&#x").and_then(|s| s.strip_suffix(';')) {
                        if let Ok(code) = u32::from_str_radix(hex, 16) {
                            if let Some(c) = char::from_u32(code) {
                                out.push(c);
                                i += entity.len();
                                continue;
                            }
                        }
                    } else if let Some(dec) = entity.strip_prefix("&#").and_then(|s| s.strip_suffix(';')) {
                        if let Ok(code) = dec.parse::<u32>() {
                            if let Some(c) = char::from_u32(code) {
                                out.push(c);
                                i += entity.len();
                                continue;
                            }
                        }
                    } else if let Some((pattern, replacement)) = named.iter().find(|(p, _)| *p == entity) {
                        out.push(*replacement);
                        i += pattern.len();
                        continue;
                    }
                }
            }
        }
        let ch = input[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
        let _ = chars.next();
    }

    out
}

pub fn extract(html: &str) -> ExtractedMeta {
    let title = find_meta_content(html, "property", "og:title")
        .or_else(|| find_meta_content(html, "name", "twitter:title"))
        .or_else(|| extract_title_tag(html));

    let description = find_meta_content(html, "property", "og:description")
        .or_else(|| find_meta_content(html, "name", "twitter:description"))
        .or_else(|| find_meta_content(html, "name", "description"));

    let thumbnail = find_meta_content(html, "property", "og:image")
        .or_else(|| find_meta_content(html, "name", "twitter:image"));

    let site_name = find_meta_content(html, "property", "og:site_name");

    ExtractedMeta {
        title,
        description,
        thumbnail,
        site_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_and_numeric_entities() {
        assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(decode_entities("a&nbsp;b"), "a\u{00A0}b");
    }

    #[test]
    fn extracts_og_title_over_title_tag() {
        let html = r#"<html><head><meta property="og:title" content="OG Title"><title>Fallback</title></head></html>"#;
        let meta = extract(html);
        assert_eq!(meta.title.as_deref(), Some("OG Title"));
    }

    #[test]
    fn falls_back_to_title_tag() {
        let html = "<html><head><title>Plain Title</title></head></html>";
        let meta = extract(html);
        assert_eq!(meta.title.as_deref(), Some("Plain Title"));
    }
}

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use porter_collection::File;
use regex::Regex;

/// `data:<mime>[;name=<pct>][;charset=<c>];base64,<payload>`
static DATA_URI: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^data:(?P<mime>[^;,]+)(?P<params>(?:;[^;,=]+=[^;,]*)*);base64,(?P<payload>.*)$").ok()
});

const NAME_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b',')
    .add(b';')
    .add(b'=');

/// Decode a base64 data URI into a file. `None` when the shape or the
/// payload is invalid.
pub fn parse_data_uri(value: &str) -> Option<File> {
    let caps = DATA_URI.as_ref()?.captures(value)?;
    let buffer = BASE64.decode(caps.name("payload")?.as_str()).ok()?;

    let mut name = None;
    let mut charset = None;
    for param in caps["params"].split(';').filter(|p| !p.is_empty()) {
        let (key, raw) = param.split_once('=')?;
        match key {
            "name" => name = Some(percent_decode_str(raw).decode_utf8().ok()?.into_owned()),
            "charset" => charset = Some(raw.to_string()),
            _ => {}
        }
    }

    Some(File {
        mime_type: caps["mime"].to_string(),
        buffer,
        name: name.unwrap_or_default(),
        charset,
    })
}

pub fn encode_data_uri(file: &File) -> String {
    let mut out = format!("data:{}", file.mime_type);
    if !file.name.is_empty() {
        out.push_str(";name=");
        out.extend(utf8_percent_encode(&file.name, NAME_ENCODE));
    }
    if let Some(charset) = &file.charset {
        out.push_str(";charset=");
        out.push_str(charset);
    }
    out.push_str(";base64,");
    out.push_str(&BASE64.encode(&file.buffer));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_name_and_charset() {
        let file = parse_data_uri("data:text/csv;name=my%20report.csv;charset=utf-8;base64,YSxiCg==").unwrap();
        assert_eq!(file.mime_type, "text/csv");
        assert_eq!(file.name, "my report.csv");
        assert_eq!(file.charset.as_deref(), Some("utf-8"));
        assert_eq!(file.buffer, b"a,b\n");
    }

    #[test]
    fn encode_then_decode_keeps_every_part() {
        let file = File {
            mime_type: "image/png".into(),
            buffer: vec![0, 159, 146, 150],
            name: "cover; final.png".into(),
            charset: None,
        };
        let uri = encode_data_uri(&file);
        assert!(uri.starts_with("data:image/png;name=cover%3B%20final.png;base64,"));
        assert_eq!(parse_data_uri(&uri), Some(file));
    }

    #[test]
    fn rejects_other_strings() {
        assert_eq!(parse_data_uri("hello"), None);
        assert_eq!(parse_data_uri("data:text/plain,plain"), None);
        assert_eq!(parse_data_uri("data:text/plain;base64,!!!"), None);
    }
}

//! Text from Office Open XML packages (.docx, .xlsx)
//!
//! Both formats are ZIP archives of XML parts. Only text nodes are needed, so
//! a small tag scanner stands in for a full XML parser.

use crate::crawler::DocumentKind;
use crate::extract::ExtractionError;
use std::io::{Cursor, Read};
use zip::result::ZipError;
use zip::ZipArchive;

/// Extracts paragraph text from a Word document
///
/// Paragraphs end with a newline; tabs and line breaks are kept. Parts that
/// decompress to more than `max_part_bytes` are rejected as corrupt.
pub fn docx_text(bytes: &[u8], max_part_bytes: u64) -> Result<String, ExtractionError> {
    let kind = DocumentKind::Docx;
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractionError::corrupt(&kind, e))?;

    let xml = read_part(&mut archive, "word/document.xml", &kind, max_part_bytes)?
        .ok_or_else(|| ExtractionError::corrupt(&kind, "missing word/document.xml"))?;

    let mut text = String::new();
    let mut in_text = false;

    for token in tokenize(&xml) {
        match token {
            Token::Open { name: "w:t", self_closing: false, .. } => in_text = true,
            Token::Close("w:t") => in_text = false,
            Token::Open { name: "w:tab", .. } => text.push('\t'),
            Token::Open { name: "w:br" | "w:cr", .. } => text.push('\n'),
            Token::Close("w:p") => text.push('\n'),
            Token::Text(t) if in_text => text.push_str(&decode_entities(t)),
            _ => {}
        }
    }

    Ok(text)
}

/// Extracts cell values from every worksheet of a workbook
///
/// Cells are tab-separated, rows newline-separated, sheets separated by a
/// blank line. Shared strings are resolved. The part size cap applies to
/// every sheet and the shared string table.
pub fn xlsx_text(bytes: &[u8], max_part_bytes: u64) -> Result<String, ExtractionError> {
    let kind = DocumentKind::Xlsx;
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractionError::corrupt(&kind, e))?;

    let shared = match read_part(&mut archive, "xl/sharedStrings.xml", &kind, max_part_bytes)? {
        Some(xml) => shared_strings(&xml),
        None => Vec::new(),
    };

    let mut sheets: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("xl/worksheets/") && name.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    if sheets.is_empty() {
        return Err(ExtractionError::corrupt(&kind, "no worksheets"));
    }
    sheets.sort_by_key(|name| sheet_number(name));

    let mut text = String::new();
    for name in sheets {
        if let Some(xml) = read_part(&mut archive, &name, &kind, max_part_bytes)? {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&sheet_text(&xml, &shared));
        }
    }

    Ok(text)
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
    kind: &DocumentKind,
    limit: u64,
) -> Result<Option<String>, ExtractionError> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ExtractionError::corrupt(kind, e)),
    };

    let too_large = || ExtractionError::corrupt(kind, format!("{} expands beyond {} bytes", name, limit));
    if file.size() > limit {
        return Err(too_large());
    }

    // The declared size can lie; the read itself is capped too
    let mut xml = String::new();
    file.take(limit.saturating_add(1))
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::corrupt(kind, format!("{}: {}", name, e)))?;
    if xml.len() as u64 > limit {
        return Err(too_large());
    }
    Ok(Some(xml))
}

/// `xl/worksheets/sheet12.xml` sorts after `sheet2.xml`
fn sheet_number(name: &str) -> (u32, String) {
    let digits: String = name
        .trim_end_matches(".xml")
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    (digits.parse().unwrap_or(u32::MAX), name.to_string())
}

fn shared_strings(xml: &str) -> Vec<String> {
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    for token in tokenize(xml) {
        match token {
            Token::Open { name: "si", .. } => current.clear(),
            Token::Close("si") => strings.push(std::mem::take(&mut current)),
            Token::Open { name: "t", self_closing: false, .. } => in_text = true,
            Token::Close("t") => in_text = false,
            Token::Text(t) if in_text => current.push_str(&decode_entities(t)),
            _ => {}
        }
    }

    strings
}

fn sheet_text(xml: &str, shared: &[String]) -> String {
    let mut out = String::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_type: Option<String> = None;
    let mut value = String::new();
    let mut capture = false;

    for token in tokenize(xml) {
        match token {
            Token::Open { name: "c", attrs, self_closing } => {
                cell_type = attr(attrs, "t").map(str::to_string);
                value.clear();
                if self_closing {
                    row.push(String::new());
                }
            }
            Token::Open { name: "v" | "t", self_closing: false, .. } => capture = true,
            Token::Close("v" | "t") => capture = false,
            Token::Text(t) if capture => value.push_str(&decode_entities(t)),
            Token::Close("c") => {
                let cell = match cell_type.as_deref() {
                    Some("s") => value
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|idx| shared.get(idx).cloned())
                        .unwrap_or_default(),
                    _ => value.clone(),
                };
                row.push(cell);
            }
            Token::Close("row") => {
                while row.last().is_some_and(String::is_empty) {
                    row.pop();
                }
                out.push_str(&row.join("\t"));
                out.push('\n');
                row.clear();
            }
            _ => {}
        }
    }

    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Open {
        name: &'a str,
        attrs: &'a str,
        self_closing: bool,
    },
    Close(&'a str),
    Text(&'a str),
}

/// Splits XML into tags and text runs
///
/// Declarations, comments and processing instructions are dropped.
fn tokenize(xml: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = xml;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            tokens.push(Token::Text(rest));
            break;
        };
        if lt > 0 {
            tokens.push(Token::Text(&rest[..lt]));
        }
        rest = &rest[lt..];

        if let Some(body) = rest.strip_prefix("<!--") {
            rest = body.find("-->").map_or("", |end| &body[end + 3..]);
            continue;
        }
        if let Some(body) = rest.strip_prefix("<![CDATA[") {
            let end = body.find("]]>").unwrap_or(body.len());
            tokens.push(Token::Text(&body[..end]));
            rest = body.get(end + 3..).unwrap_or("");
            continue;
        }

        let Some(gt) = rest.find('>') else {
            break;
        };
        let inner = &rest[1..gt];
        rest = &rest[gt + 1..];

        if inner.starts_with('?') || inner.starts_with('!') {
            continue;
        }
        if let Some(name) = inner.strip_prefix('/') {
            tokens.push(Token::Close(name.trim()));
            continue;
        }

        let self_closing = inner.ends_with('/');
        let inner = inner.trim_end_matches('/');
        let (name, attrs) = match inner.find(char::is_whitespace) {
            Some(idx) => (&inner[..idx], inner[idx..].trim()),
            None => (inner, ""),
        };
        tokens.push(Token::Open {
            name,
            attrs,
            self_closing,
        });
    }

    tokens
}

/// Value of `key="..."` in a tag's attribute list
fn attr<'a>(attrs: &'a str, key: &str) -> Option<&'a str> {
    let mut search = attrs;
    loop {
        let idx = search.find(key)?;
        let before_ok = idx == 0
            || search[..idx]
                .chars()
                .last()
                .is_some_and(char::is_whitespace);
        let after = &search[idx + key.len()..];
        if before_ok {
            if let Some(value) = after.strip_prefix("=\"") {
                return value.find('"').map(|end| &value[..end]);
            }
        }
        search = after;
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let Some(semi) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

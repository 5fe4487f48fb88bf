/// Control words whose group holds metadata rather than body text
const DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "headerl",
    "headerr",
    "headerf",
    "footer",
    "footerl",
    "footerr",
    "footerf",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "themedata",
    "colorschememapping",
    "datastore",
    "latentstyles",
    "xmlnstbl",
    "fldinst",
];

#[derive(Debug, Clone, Copy)]
struct Group {
    ignorable: bool,
    uc_skip: usize,
}

/// Strips RTF markup, keeping body text
///
/// Paragraph and line breaks become newlines, cells and tabs become tabs.
/// `\'hh` escapes are read as Windows-1252 bytes in the Latin-1 range and
/// `\uN` escapes as UTF-16 code units.
///
/// # Example
///
/// ```
/// use docscoop::extract::strip_rtf;
///
/// let rtf = r"{\rtf1\ansi{\fonttbl{\f0 Arial;}}\f0 Hello \b world\b0\par}";
/// assert_eq!(strip_rtf(rtf), "Hello world\n");
/// ```
pub fn strip_rtf(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::new();
    let mut stack: Vec<Group> = Vec::new();
    let mut current = Group {
        ignorable: false,
        uc_skip: 1,
    };
    let mut pending_skip = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => {
                stack.push(current);
                pending_skip = 0;
                i += 1;
            }
            '}' => {
                current = stack.pop().unwrap_or(current);
                pending_skip = 0;
                i += 1;
            }
            '\\' => {
                i += 1;
                let Some(&next) = chars.get(i) else { break };

                if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();

                    let param_start = i;
                    if i < chars.len() && chars[i] == '-' {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    let param: Option<i32> = chars[param_start..i]
                        .iter()
                        .collect::<String>()
                        .parse()
                        .ok();

                    if i < chars.len() && chars[i] == ' ' {
                        i += 1;
                    }

                    if DESTINATIONS.contains(&word.as_str()) {
                        current.ignorable = true;
                        continue;
                    }
                    if current.ignorable {
                        continue;
                    }

                    match word.as_str() {
                        "par" | "line" | "sect" | "page" | "row" => out.push('\n'),
                        "tab" | "cell" => out.push('\t'),
                        "emdash" => out.push('\u{2014}'),
                        "endash" => out.push('\u{2013}'),
                        "lquote" => out.push('\u{2018}'),
                        "rquote" => out.push('\u{2019}'),
                        "ldblquote" => out.push('\u{201C}'),
                        "rdblquote" => out.push('\u{201D}'),
                        "bullet" => out.push('\u{2022}'),
                        "uc" => current.uc_skip = param.unwrap_or(1).max(0) as usize,
                        "u" => {
                            if let Some(code) = param {
                                let unit = (if code < 0 { code + 65_536 } else { code }) as u32;
                                out.push(char::from_u32(unit).unwrap_or('\u{FFFD}'));
                                pending_skip = current.uc_skip;
                            }
                        }
                        _ => {}
                    }
                    continue;
                }

                i += 1;
                match next {
                    '\'' => {
                        let hex: String = chars.iter().skip(i).take(2).collect();
                        i += hex.len();
                        if pending_skip > 0 {
                            pending_skip -= 1;
                        } else if !current.ignorable {
                            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                                out.push(byte as char);
                            }
                        }
                    }
                    '*' => current.ignorable = true,
                    '\\' | '{' | '}' => {
                        if pending_skip > 0 {
                            pending_skip -= 1;
                        } else if !current.ignorable {
                            out.push(next);
                        }
                    }
                    '~' if !current.ignorable => out.push(' '),
                    '_' if !current.ignorable => out.push('-'),
                    '\n' | '\r' if !current.ignorable => out.push('\n'),
                    _ => {}
                }
            }
            '\r' | '\n' => i += 1,
            _ => {
                if pending_skip > 0 {
                    pending_skip -= 1;
                } else if !current.ignorable {
                    out.push(c);
                }
                i += 1;
            }
        }
    }

    out
}

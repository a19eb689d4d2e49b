use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

/// Base64 for encoded-words; mail agents are sloppy about padding.
const B_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A run of header text together with the charset it is written in.
/// Plain runs carry no charset and are already UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderChunk {
    pub payload: Vec<u8>,
    pub charset: Option<String>,
}

/// Decode a raw header value (From, Subject, ...) into display text.
///
/// Absent or empty input gives an empty string. Values without any
/// RFC 2047 encoded-word are returned as they are. Never fails.
pub fn decode_header(raw: Option<&[u8]>) -> String {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return String::new();
    };
    let text = header_bytes_to_str(raw);
    if !text.contains("=?") {
        return text;
    }
    join_chunks(&split_encoded_words(&text))
}

/// Concatenate decoded chunks in order, no separator.
pub fn join_chunks(chunks: &[HeaderChunk]) -> String {
    chunks
        .iter()
        .map(|c| decode_charset(c.charset.as_deref(), &c.payload))
        .collect()
}

/// Decode bytes in the named charset, substituting invalid sequences.
/// Unknown or missing charsets fall back to UTF-8, and so does us-ascii
/// since undeclared 8-bit mail is nearly always UTF-8.
pub fn decode_charset(charset: Option<&str>, bytes: &[u8]) -> String {
    let encoding = charset
        .map(str::trim)
        .filter(|c| !c.eq_ignore_ascii_case("us-ascii") && !c.eq_ignore_ascii_case("ascii"))
        .and_then(|c| Encoding::for_label(c.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _had_errors) = encoding.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// 8-bit header bytes: UTF-8 when valid, otherwise Windows-1252.
fn header_bytes_to_str(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Split a header into plain runs and decoded encoded-words.
///
/// Whitespace that only separates two encoded-words is dropped (RFC 2047 6.2).
/// Anything that looks like an encoded-word but does not parse stays plain.
pub fn split_encoded_words(input: &str) -> Vec<HeaderChunk> {
    let mut chunks = Vec::new();
    let mut plain = String::new();
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        let after = &remaining[start + 2..];

        match parse_encoded_word(after) {
            Some((chunk, consumed)) => {
                if !last_was_encoded || !before.trim().is_empty() {
                    plain.push_str(before);
                }
                flush_plain(&mut plain, &mut chunks);
                chunks.push(chunk);
                remaining = &after[consumed..];
                last_was_encoded = true;
            }
            None => {
                plain.push_str(before);
                plain.push_str("=?");
                remaining = after;
                last_was_encoded = false;
            }
        }
    }

    plain.push_str(remaining);
    flush_plain(&mut plain, &mut chunks);
    chunks
}

fn flush_plain(plain: &mut String, chunks: &mut Vec<HeaderChunk>) {
    if !plain.is_empty() {
        chunks.push(HeaderChunk {
            payload: std::mem::take(plain).into_bytes(),
            charset: None,
        });
    }
}

/// Parse `charset?enc?text?=` (the leading `=?` already consumed).
/// Returns the chunk and the number of bytes used.
fn parse_encoded_word(s: &str) -> Option<(HeaderChunk, usize)> {
    let first_q = s.find('?')?;
    let charset = &s[..first_q];
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let text = &rest2[..end];
    if text.contains(char::is_whitespace) {
        return None;
    }

    let payload = match encoding {
        "B" | "b" => B_ENGINE.decode(text).ok()?,
        "Q" | "q" => decode_q(text),
        _ => return None,
    };

    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);

    let consumed = first_q + 1 + second_q + 1 + end + 2;
    Some((
        HeaderChunk {
            payload,
            charset: Some(charset.to_string()),
        },
        consumed,
    ))
}

/// Q encoding: `_` is a space, `=XX` a hex byte.
fn decode_q(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Undo RFC 5322 folding: each line break plus the whitespace that
/// continues the header becomes a single space.
pub fn unfold_header(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let brk = match &raw[i..] {
            [b'\r', b'\n', ..] => 2,
            [b'\n', ..] => 1,
            _ => 0,
        };
        if brk > 0 && matches!(raw.get(i + brk), Some(b' ' | b'\t')) {
            while out.last().is_some_and(|b| matches!(b, b' ' | b'\t')) {
                out.pop();
            }
            i += brk;
            while matches!(raw.get(i), Some(b' ' | b'\t')) {
                i += 1;
            }
            out.push(b' ');
            continue;
        }
        out.push(raw[i]);
        i += 1;
    }
    out
}

/// Collapse whitespace runs to one space, trim, and cut to `max_chars`
/// code points.
pub fn normalize_body(s: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max_chars.saturating_mul(4)));
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        if out.chars().count() >= max_chars {
            break;
        }
    }
    truncate_chars(&out, max_chars)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].trim_end().to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dh(raw: &[u8]) -> String {
        decode_header(Some(raw))
    }

    #[test]
    fn absent_and_empty_headers_are_empty() {
        assert_eq!(decode_header(None), "");
        assert_eq!(dh(b""), "");
    }

    #[test]
    fn plain_headers_pass_through() {
        for s in ["Hello", "  spaced  out ", "Re: =? not encoded", "Olá mundo"] {
            assert_eq!(dh(s.as_bytes()), s);
        }
    }

    #[test]
    fn base64_and_q_words() {
        assert_eq!(
            dh(b"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="),
            "Hola mundo"
        );
        assert_eq!(
            dh(b"=?iso-8859-1?Q?Caf=E9_cr=E8me?="),
            "Café crème"
        );
    }

    #[test]
    fn mixed_plain_and_encoded_keep_order() {
        let got = dh(b"Ana =?utf-8?q?Jos=C3=A9?= <ana@example.com>");
        assert_eq!(got, "Ana José <ana@example.com>");
    }

    #[test]
    fn missing_padding_is_tolerated() {
        assert_eq!(dh(b"=?UTF-8?B?SG9sYQ?="), "Hola");
    }

    #[test]
    fn unknown_charset_falls_back_to_utf8() {
        assert_eq!(dh(b"=?x-bogus?Q?ok?="), "ok");
    }

    #[test]
    fn invalid_bytes_are_substituted() {
        let chunks = [HeaderChunk {
            payload: vec![b'a', 0xff, b'b'],
            charset: Some("utf-8".into()),
        }];
        assert_eq!(join_chunks(&chunks), "a\u{fffd}b");
    }

    #[test]
    fn latin1_raw_header_bytes() {
        assert_eq!(dh(b"Caf\xe9"), "Café");
    }

    #[test]
    fn normalize_collapses_and_trims() {
        assert_eq!(normalize_body("  a\n\n b\t\tc  ", 100), "a b c");
    }

    #[test]
    fn normalize_truncates_on_char_boundary() {
        let s = "é".repeat(10);
        let out = normalize_body(&s, 4);
        assert_eq!(out, "éééé");
        assert_eq!(normalize_body("", 4), "");
    }

    #[test]
    fn unbounded_cap_keeps_whole_body() {
        assert_eq!(normalize_body(" one  two ", usize::MAX), "one two");
    }

    #[test]
    fn folded_header_lines_are_joined() {
        assert_eq!(unfold_header(b"Quarterly\r\n  report"), b"Quarterly report");
        assert_eq!(unfold_header(b"a\n\tb"), b"a b");
        assert_eq!(unfold_header(b"no fold"), b"no fold");
        assert_eq!(dh(&unfold_header(b"=?UTF-8?Q?a?=\r\n =?UTF-8?Q?b?=")), "ab");
    }
}

use mailparse::{DispositionType, ParsedMail};

use crate::mail::decoders::decode_charset;

/// Structure of a message as far as body extraction cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    Leaf {
        content_type: String,
        is_attachment: bool,
        charset: Option<String>,
        /// Transfer-decoded payload.
        raw: Vec<u8>,
    },
    Multipart(Vec<MessagePart>),
}

impl MessagePart {
    /// Convenience constructor for an inline leaf.
    pub fn leaf(content_type: &str, raw: impl Into<Vec<u8>>) -> Self {
        Self::Leaf {
            content_type: content_type.to_string(),
            is_attachment: false,
            charset: None,
            raw: raw.into(),
        }
    }

    pub fn attachment(content_type: &str, raw: impl Into<Vec<u8>>) -> Self {
        Self::Leaf {
            content_type: content_type.to_string(),
            is_attachment: true,
            charset: None,
            raw: raw.into(),
        }
    }

    /// Build the tree from a parsed mail. A body whose transfer encoding
    /// cannot be undone becomes empty.
    pub fn from_parsed(p: &ParsedMail) -> Self {
        if !p.subparts.is_empty() {
            return Self::Multipart(p.subparts.iter().map(Self::from_parsed).collect());
        }
        let raw = p.get_body_raw().unwrap_or_default();
        Self::Leaf {
            content_type: p.ctype.mimetype.to_ascii_lowercase(),
            is_attachment: p.get_content_disposition().disposition == DispositionType::Attachment,
            charset: Some(p.ctype.charset.clone()),
            raw,
        }
    }

    /// Visit leaves depth-first in document order.
    fn walk_leaves<'a>(&'a self, visit: &mut dyn FnMut(&'a MessagePart)) {
        match self {
            Self::Leaf { .. } => visit(self),
            Self::Multipart(children) => {
                for child in children {
                    child.walk_leaves(visit);
                }
            }
        }
    }
}

/// Pick the best readable body: first inline `text/plain`, else the first
/// inline `text/html` with tags stripped, else empty.
pub fn extract_body(root: &MessagePart) -> String {
    let mut text_body = String::new();
    let mut html_body = String::new();

    match root {
        MessagePart::Leaf {
            content_type,
            charset,
            raw,
            ..
        } => {
            let decoded = decode_charset(charset.as_deref(), raw);
            if content_type == "text/html" {
                html_body = decoded;
            } else {
                text_body = decoded;
            }
        }
        MessagePart::Multipart(_) => {
            root.walk_leaves(&mut |part| {
                let MessagePart::Leaf {
                    content_type,
                    is_attachment,
                    charset,
                    raw,
                } = part
                else {
                    return;
                };
                if *is_attachment {
                    return;
                }
                if content_type == "text/plain" && text_body.is_empty() {
                    text_body = decode_charset(charset.as_deref(), raw);
                } else if content_type == "text/html" && html_body.is_empty() {
                    html_body = decode_charset(charset.as_deref(), raw);
                }
            });
        }
    }

    if !text_body.is_empty() {
        return text_body;
    }
    strip_html(&html_body)
}

/// Replace every `<...>` span with a space, then decode entities.
/// An unterminated `<` is kept as text.
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open + 1..].find('>') else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push(' ');
        rest = &rest[open + 1 + close + 1..];
    }
    out.push_str(rest);
    html_escape::decode_html_entities(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_part_plain() {
        let root = MessagePart::leaf("text/plain", "hello");
        assert_eq!(extract_body(&root), "hello");
    }

    #[test]
    fn single_part_html_is_stripped() {
        let root = MessagePart::leaf("text/html", "<p>Hello &amp; welcome</p>");
        let body = extract_body(&root);
        assert!(body.contains("Hello & welcome"));
        assert!(!body.contains('<'));
    }

    #[test]
    fn single_part_other_type_counts_as_text() {
        let root = MessagePart::leaf("application/octet-stream", "data");
        assert_eq!(extract_body(&root), "data");
    }

    #[test]
    fn plain_wins_over_earlier_html() {
        let root = MessagePart::Multipart(vec![
            MessagePart::leaf("text/html", "<b>html</b>"),
            MessagePart::leaf("text/plain", "plain"),
        ]);
        assert_eq!(extract_body(&root), "plain");
    }

    #[test]
    fn first_plain_wins() {
        let root = MessagePart::Multipart(vec![
            MessagePart::Multipart(vec![MessagePart::leaf("text/plain", "first")]),
            MessagePart::leaf("text/plain", "second"),
        ]);
        assert_eq!(extract_body(&root), "first");
    }

    #[test]
    fn attachments_are_skipped() {
        let root = MessagePart::Multipart(vec![
            MessagePart::attachment("text/plain", "notes.txt"),
            MessagePart::leaf("text/html", "<i>inline</i>"),
        ]);
        assert_eq!(extract_body(&root).trim(), "inline");
    }

    #[test]
    fn attachment_only_is_empty() {
        let root = MessagePart::Multipart(vec![
            MessagePart::attachment("application/pdf", vec![0x25, 0x50, 0x44, 0x46]),
            MessagePart::attachment("text/plain", "x"),
        ]);
        assert_eq!(extract_body(&root), "");
    }

    #[test]
    fn invalid_utf8_does_not_fail() {
        let root = MessagePart::leaf("text/plain", vec![b'o', b'k', 0xc3]);
        assert_eq!(extract_body(&root), "ok\u{fffd}");
    }

    #[test]
    fn declared_charset_is_used() {
        let root = MessagePart::Leaf {
            content_type: "text/plain".into(),
            is_attachment: false,
            charset: Some("iso-8859-1".into()),
            raw: b"ol\xe1".to_vec(),
        };
        assert_eq!(extract_body(&root), "olá");
    }

    #[test]
    fn strip_html_replaces_tags_with_space() {
        assert_eq!(strip_html("a<br>b"), "a b");
        assert_eq!(strip_html("1 < 2"), "1 < 2");
        assert_eq!(strip_html("&lt;tag&gt;"), "<tag>");
    }

    #[test]
    fn tree_from_parsed_mail() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"b\"\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "caf=C3=A9\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=\"a.txt\"\r\n",
            "\r\n",
            "attached\r\n",
            "--b--\r\n",
        );
        let parsed = mailparse::parse_mail(raw.as_bytes()).unwrap();
        let tree = MessagePart::from_parsed(&parsed);
        let MessagePart::Multipart(children) = &tree else {
            panic!("expected multipart, got {tree:?}");
        };
        assert_eq!(children.len(), 2);
        assert!(matches!(
            &children[1],
            MessagePart::Leaf { is_attachment: true, .. }
        ));
        assert_eq!(extract_body(&tree).trim(), "café");
    }
}

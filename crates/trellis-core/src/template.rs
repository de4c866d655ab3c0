//! # Template Scanning
//!
//! Parses rendered markup into a flat node list of literal text and custom
//! component tags, built once per expansion pass. Custom tags are
//! capitalized names that are not standard HTML elements; everything else
//! stays opaque text. The engine walks the node list instead of re-scanning
//! raw text after each substitution.

/// Standard HTML element names, compared case-insensitively
const STANDARD_TAGS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base", "bdi", "bdo",
    "blockquote", "body", "br", "button", "canvas", "caption", "cite", "code", "col", "colgroup",
    "data", "datalist", "dd", "del", "details", "dfn", "dialog", "div", "dl", "dt", "em", "embed",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "head", "header", "hgroup", "hr", "html", "i", "iframe", "img", "input", "ins", "kbd", "label",
    "legend", "li", "link", "main", "map", "mark", "menu", "meta", "meter", "nav", "noscript",
    "object", "ol", "optgroup", "option", "output", "p", "picture", "pre", "progress", "q", "rp",
    "rt", "ruby", "s", "samp", "script", "section", "select", "slot", "small", "source", "span",
    "strong", "style", "sub", "summary", "sup", "table", "tbody", "td", "template", "textarea",
    "tfoot", "th", "thead", "time", "title", "tr", "track", "u", "ul", "var", "video", "wbr",
];

/// One custom tag occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CustomTag {
    /// Tag name as written
    pub name: String,
    /// Attributes in source order
    pub attributes: Vec<(String, String)>,
    /// Raw inner content for paired tags
    pub children: Option<String>,
}

/// Node of the scanned document
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    /// Literal markup, left untouched
    Text(String),
    /// A custom tag to expand
    Custom(CustomTag),
}

/// Scan a document into text and custom-tag nodes
pub(crate) fn parse(doc: &str) -> Vec<Node> {
    let bytes = doc.as_bytes();
    let mut nodes = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'<'
            && i + 1 < bytes.len()
            && bytes[i + 1].is_ascii_uppercase()
        {
            if let Some((tag, consumed)) = parse_tag(&doc[i..]) {
                if text_start < i {
                    nodes.push(Node::Text(doc[text_start..i].to_string()));
                }
                nodes.push(Node::Custom(tag));
                i += consumed;
                text_start = i;
                continue;
            }
        }
        i += 1;
    }

    if text_start < doc.len() {
        nodes.push(Node::Text(doc[text_start..].to_string()));
    }
    nodes
}

/// Whether the document contains at least one custom tag
pub(crate) fn has_custom_tag(doc: &str) -> bool {
    parse(doc)
        .iter()
        .any(|node| matches!(node, Node::Custom(_)))
}

/// Attribute names are letters, digits, `_`, `-`, `:` and `.`, starting
/// with a letter or underscore; anything else marks the `<` as plain text
fn is_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
}

/// Parse one tag starting at `<`; returns the tag and the bytes consumed
fn parse_tag(s: &str) -> Option<(CustomTag, usize)> {
    let bytes = s.as_bytes();
    let mut i = 1;

    let name_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
        i += 1;
    }
    let name = &s[name_start..i];
    if name.is_empty() || STANDARD_TAGS.contains(&name.to_ascii_lowercase().as_str()) {
        return None;
    }

    let mut attributes = Vec::new();
    let open_end;
    let self_closing;
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        if s[i..].starts_with("/>") {
            open_end = i + 2;
            self_closing = true;
            break;
        }
        if bytes[i] == b'>' {
            open_end = i + 1;
            self_closing = false;
            break;
        }

        let attr_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && bytes[i] != b'='
            && bytes[i] != b'>'
            && !s[i..].starts_with("/>")
        {
            i += 1;
        }
        if i == attr_start {
            return None;
        }
        let attr_name = s[attr_start..i].to_string();
        if !is_attribute_name(&attr_name) {
            return None;
        }

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let attr_value = if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                i += 1;
                let value_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i >= bytes.len() {
                    return None;
                }
                let value = s[value_start..i].to_string();
                i += 1;
                value
            } else {
                let value_start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && bytes[i] != b'>'
                    && !s[i..].starts_with("/>")
                {
                    i += 1;
                }
                s[value_start..i].to_string()
            }
        } else {
            String::new()
        };
        attributes.push((attr_name, attr_value));
    }

    if self_closing {
        return Some((
            CustomTag {
                name: name.to_string(),
                attributes,
                children: None,
            },
            open_end,
        ));
    }

    let close_pat = format!("</{name}>");
    match s[open_end..].find(&close_pat) {
        Some(close_at) => {
            let children = s[open_end..open_end + close_at].to_string();
            Some((
                CustomTag {
                    name: name.to_string(),
                    attributes,
                    children: Some(children),
                },
                open_end + close_at + close_pat.len(),
            ))
        }
        // Unclosed pair: consume the open tag alone, no children
        None => Some((
            CustomTag {
                name: name.to_string(),
                attributes,
                children: None,
            },
            open_end,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_custom(doc: &str) -> CustomTag {
        let nodes = parse(doc);
        let mut customs = nodes.into_iter().filter_map(|n| match n {
            Node::Custom(tag) => Some(tag),
            Node::Text(_) => None,
        });
        let tag = customs.next().expect("no custom tag found");
        assert!(customs.next().is_none(), "more than one custom tag");
        tag
    }

    #[test]
    fn test_self_closing_with_attributes() {
        let tag = only_custom(r#"<p>hi</p><Badge label="New" count='3' compact/>"#);
        assert_eq!(tag.name, "Badge");
        assert_eq!(
            tag.attributes,
            vec![
                ("label".to_string(), "New".to_string()),
                ("count".to_string(), "3".to_string()),
                ("compact".to_string(), String::new()),
            ]
        );
        assert_eq!(tag.children, None);
    }

    #[test]
    fn test_paired_with_children() {
        let tag = only_custom("<Card title=\"x\"><div>inner</div></Card>");
        assert_eq!(tag.name, "Card");
        assert_eq!(tag.children, Some("<div>inner</div>".to_string()));
    }

    #[test]
    fn test_standard_tags_ignored() {
        let nodes = parse("<DIV class='x'>text</DIV>");
        assert!(nodes.iter().all(|n| matches!(n, Node::Text(_))));
    }

    #[test]
    fn test_surrounding_text_preserved() {
        let nodes = parse("before <Badge/> after");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::Text("before ".to_string()));
        assert_eq!(nodes[2], Node::Text(" after".to_string()));
    }

    #[test]
    fn test_script_comparisons_stay_text() {
        let doc = "<script>if (a <B) { run(); }</script>";
        let nodes = parse(doc);
        assert!(nodes.iter().all(|n| matches!(n, Node::Text(_))));
    }

    #[test]
    fn test_unclosed_pair_consumes_open_tag() {
        let nodes = parse("<Badge>rest of the document");
        assert_eq!(
            nodes[0],
            Node::Custom(CustomTag {
                name: "Badge".to_string(),
                attributes: vec![],
                children: None,
            })
        );
        assert_eq!(nodes[1], Node::Text("rest of the document".to_string()));
    }

    #[test]
    fn test_quoted_value_may_contain_angle_bracket() {
        let tag = only_custom(r#"<Badge label="a > b"/>"#);
        assert_eq!(tag.attributes[0].1, "a > b");
    }

    #[test]
    fn test_has_custom_tag() {
        assert!(has_custom_tag("x <Badge/> y"));
        assert!(!has_custom_tag("<div>plain</div>"));
    }
}

//! Markup parser – converts template markup into a simple DOM tree.
//!
//! Template markup is a controlled subset of HTML:
//! - Structural: div, p, h1-h3, img
//! - Inline: span, a
//! - Styling via `class` and `style` attributes
//!
//! A hand-written recursive-descent parser is enough for this subset and
//! keeps the dependency surface small.

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of a supported element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Div,
    P,
    H1,
    H2,
    H3,
    Span,
    A,
    Img,
    Body,
    Html,
    Head,
    /// Catch-all for unknown tags – they are kept but treated as divs.
    Unknown(String),
}

impl Tag {
    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "div" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "span" => Tag::Span,
            "a" => Tag::A,
            "img" => Tag::Img,
            "body" => Tag::Body,
            "html" => Tag::Html,
            "head" => Tag::Head,
            _ => Tag::Unknown(s.to_string()),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Tag::Div
                | Tag::P
                | Tag::H1
                | Tag::H2
                | Tag::H3
                | Tag::Body
                | Tag::Html
                | Tag::Unknown(_)
        )
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, Tag::H1 | Tag::H2 | Tag::H3)
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Tag::Span | Tag::A)
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().contains(&class)
    }

    pub fn src(&self) -> Option<&str> {
        self.attributes.get("src").map(|s| s.as_str())
    }

    pub fn href(&self) -> Option<&str> {
        self.attributes.get("href").map(|s| s.as_str())
    }

    /// All descendant text, concatenated with whitespace collapsed.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => {
                out.push_str(t);
                out.push(' ');
            }
            DomNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser – simple recursive descent over the markup
// ---------------------------------------------------------------------------

/// Parse a markup string into a list of DOM nodes.
pub fn parse_markup(input: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(input);
    parser.parse_nodes()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_nodes(&mut self) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace_preserve();
            if self.eof() || self.starts_with("</") {
                break;
            }
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_comment();
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            // Skip doctype / processing instructions
            while !self.eof() && !self.starts_with(">") {
                self.advance(1);
            }
            if !self.eof() {
                self.advance(1); // skip '>'
            }
            return None;
        }
        if self.starts_with("<") {
            Some(self.parse_element())
        } else {
            Some(self.parse_text())
        }
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        while !self.eof() && !self.starts_with("<") {
            self.advance(1);
        }
        let text = &self.input[start..self.pos];
        DomNode::Text(decode_entities(text))
    }

    fn parse_element(&mut self) -> DomNode {
        // Consume '<'
        self.advance(1);
        let tag_name = self.parse_tag_name();
        let tag = Tag::from_str(&tag_name);
        let mut elem = ElementNode::new(tag.clone());

        // Parse attributes
        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let (key, value) = self.parse_attribute();
            elem.attributes.insert(key, value);
        }

        // Self-closing tags
        let self_closing = tag == Tag::Img;
        if self.starts_with("/>") {
            self.advance(2);
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.advance(1);
        }
        if self_closing {
            return DomNode::Element(elem);
        }

        // Parse children
        elem.children = self.parse_nodes();

        // Consume closing tag
        if self.starts_with("</") {
            self.advance(2);
            self.parse_tag_name(); // skip tag name
            self.skip_whitespace();
            if self.starts_with(">") {
                self.advance(1);
            }
        }

        DomNode::Element(elem)
    }

    fn parse_tag_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_tag_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance(1); // skip '='
        self.skip_whitespace();
        let value = self.parse_attr_value();
        (key, value)
    }

    fn parse_attr_value(&mut self) -> String {
        let delim = self.current_char();
        if delim == '"' || delim == '\'' {
            self.advance(1);
            let start = self.pos;
            while !self.eof() && self.current_char() != delim {
                self.advance(1);
            }
            let val = decode_entities(&self.input[start..self.pos]);
            if !self.eof() {
                self.advance(1); // closing quote
            }
            val
        } else {
            // Bare value: runs to whitespace or the end of the tag.
            let start = self.pos;
            while !self.eof() {
                let c = self.current_char();
                if c.is_whitespace() || c == '>' || c == '/' {
                    break;
                }
                self.advance(1);
            }
            self.input[start..self.pos].to_string()
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance(1);
        }
    }

    fn skip_whitespace_preserve(&mut self) {
        // Skip runs of pure whitespace between elements.
        let saved = self.pos;
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance(1);
        }
        // If we reached a tag or EOF, keep the skip. Otherwise revert.
        if !self.eof() && !self.starts_with("<") {
            self.pos = saved;
        }
    }

    fn skip_comment(&mut self) {
        self.advance(4); // skip <!--
        while !self.eof() && !self.starts_with("-->") {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(3);
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance(&mut self, n: usize) {
        // Advance by `n` characters (not bytes).
        for _ in 0..n {
            if let Some(c) = self.input[self.pos..].chars().next() {
                self.pos += c.len_utf8();
            }
        }
    }
}

const ENTITIES: [(&str, &str); 7] = [
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&nbsp;", "\u{00A0}"),
];

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, replacement)) => {
                out.push_str(replacement);
                rest = &rest[entity.len()..];
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

// ---------------------------------------------------------------------------
// Block flattening
// ---------------------------------------------------------------------------

/// A leaf of the block structure: an element with no block-level children,
/// reduced to its class list and collapsed text.
#[derive(Debug, Clone)]
pub struct FlatBlock {
    pub tag: Tag,
    pub classes: Vec<String>,
    pub text: String,
}

/// Flatten a tree into its text-bearing leaves, in document order.
///
/// Containers (elements with block children) are descended into; their
/// remaining element children — including inline ones like a button-styled
/// anchor — become one [`FlatBlock`] each. Elements with no text are
/// dropped, so decorative empty divs never produce a block.
pub fn flatten_blocks(nodes: &[DomNode]) -> Vec<FlatBlock> {
    let mut out = Vec::new();
    collect_blocks(nodes, &mut out);
    out
}

fn collect_blocks(nodes: &[DomNode], out: &mut Vec<FlatBlock>) {
    for node in nodes {
        let DomNode::Element(elem) = node else {
            continue;
        };
        let is_container = elem
            .children
            .iter()
            .any(|c| matches!(c, DomNode::Element(e) if e.tag.is_block()));
        if is_container {
            collect_blocks(&elem.children, out);
            continue;
        }
        let text = elem.text_content();
        if text.is_empty() {
            continue;
        }
        out.push(FlatBlock {
            tag: elem.tag.clone(),
            classes: elem.classes().iter().map(|c| c.to_string()).collect(),
            text,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_div() {
        let markup = r#"<div class="invitation-container wedding-elegant"><p>Hola</p></div>"#;
        let nodes = parse_markup(markup);
        assert_eq!(nodes.len(), 1);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.tag, Tag::Div);
            assert!(e.has_class("invitation-container"));
            assert_eq!(e.children.len(), 1);
        } else {
            panic!("Expected element");
        }
    }

    #[test]
    fn parse_anchor_href() {
        let markup = r#"<a href="https://x.test/rsvp/default" class="rsvp-button">Confirmar</a>"#;
        let nodes = parse_markup(markup);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.tag, Tag::A);
            assert_eq!(e.href(), Some("https://x.test/rsvp/default"));
            assert_eq!(e.text_content(), "Confirmar");
        } else {
            panic!("Expected anchor element");
        }
    }

    #[test]
    fn parse_self_closing_img() {
        let markup = r#"<img src="fondo.png" />"#;
        let nodes = parse_markup(markup);
        assert_eq!(nodes.len(), 1);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.tag, Tag::Img);
            assert_eq!(e.src(), Some("fondo.png"));
        } else {
            panic!("Expected img element");
        }
    }

    #[test]
    fn entities_are_decoded() {
        let markup = r#"<p>Ana &amp; Luis</p>"#;
        let nodes = parse_markup(markup);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.text_content(), "Ana & Luis");
        } else {
            panic!("Expected p element");
        }
    }

    #[test]
    fn flatten_walks_containers_and_keeps_inline_anchors() {
        let markup = r##"
<div class="invitation-container">
    <div class="invitation-header">
        <div class="ornament"></div>
        <h1 class="event-title">Boda</h1>
    </div>
    <p class="detail-text">Fecha</p>
    <a href="#" class="rsvp-button">Confirmar</a>
</div>"##;
        let blocks = flatten_blocks(&parse_markup(markup));
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        // The empty ornament div is dropped; document order is preserved.
        assert_eq!(texts, vec!["Boda", "Fecha", "Confirmar"]);
        assert_eq!(blocks[0].tag, Tag::H1);
        assert!(blocks[2].classes.contains(&"rsvp-button".to_string()));
    }

    #[test]
    fn lone_ampersand_survives_decoding() {
        let markup = "<p>Ana & Luis &amp; cía</p>";
        let nodes = parse_markup(markup);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.text_content(), "Ana & Luis & cía");
        } else {
            panic!("Expected p element");
        }
    }

    #[test]
    fn text_content_collapses_nested_whitespace() {
        let markup = "<div>\n    <h1>Titulo</h1>\n    <p>Uno   <span>dos</span></p>\n</div>";
        let nodes = parse_markup(markup);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.text_content(), "Titulo Uno dos");
        } else {
            panic!("Expected div element");
        }
    }
}

//! Minimal XML node tree over quick-xml events. The reconciler mutates
//! comment nodes in place and re-serializes, so a retained tree is needed
//! rather than a streaming pass. Parsing is tolerant: it never fails, it
//! keeps whatever well-formed prefix it managed to read and attaches any
//! still-open elements on EOF.

use quick_xml::{escape::escape, events::Event, Reader};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Raw content of an XML declaration, without the `<?`/`?>` markers.
    Decl(String),
    Element(Element),
    /// Character data, stored unescaped.
    Text(String),
    /// Comment body, stored raw (comments carry no entity escaping).
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    pub self_closing: bool,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Element {
            name: name.to_string(),
            ..Element::default()
        }
    }

    pub fn child_elements<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + use<'a, 'n> {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    pub fn first_child(&self, name: &str) -> Option<&Element> {
        self.child_elements(name).next()
    }

    /// Concatenated descendant character data, like DOM `textContent`.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(el: &Element, out: &mut String) {
    for node in &el.children {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(child) => collect_text(child, out),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub children: Vec<Node>,
}

impl Document {
    pub fn root(&self) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }
}

pub fn parse(text: &str) -> Document {
    let mut reader = Reader::from_str(text);
    let mut top: Vec<Node> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(element_from_start(&e, false));
            }
            Ok(Event::Empty(e)) => {
                let el = element_from_start(&e, true);
                append(&mut top, &mut stack, Node::Element(el));
            }
            Ok(Event::End(_)) => {
                if let Some(el) = stack.pop() {
                    append(&mut top, &mut stack, Node::Element(el));
                }
            }
            Ok(Event::Text(e)) => {
                let text = match e.unescape() {
                    Ok(text) => text.into_owned(),
                    Err(_) => String::from_utf8_lossy(e.as_ref()).into_owned(),
                };
                append(&mut top, &mut stack, Node::Text(text));
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                append(&mut top, &mut stack, Node::Text(text));
            }
            Ok(Event::Comment(e)) => {
                let body = String::from_utf8_lossy(e.as_ref()).into_owned();
                append(&mut top, &mut stack, Node::Comment(body));
            }
            Ok(Event::Decl(e)) => {
                let raw = String::from_utf8_lossy(e.as_ref()).into_owned();
                append(&mut top, &mut stack, Node::Decl(raw));
            }
            Ok(Event::PI(_)) | Ok(Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            // Malformed input: keep what was built so far.
            Err(_) => break,
        }
    }

    // Unclosed elements attach best-effort.
    while let Some(el) = stack.pop() {
        append(&mut top, &mut stack, Node::Element(el));
    }

    Document { children: top }
}

fn element_from_start(e: &quick_xml::events::BytesStart<'_>, self_closing: bool) -> Element {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if let Ok(value) = attr.unescape_value() {
            attrs.push((key, value.into_owned()));
        }
    }
    Element {
        name,
        attrs,
        children: Vec::new(),
        self_closing,
    }
}

fn append(top: &mut Vec<Node>, stack: &mut [Element], node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top.push(node),
    }
}

pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    for node in &doc.children {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Decl(raw) => {
            out.push_str("<?");
            out.push_str(raw);
            out.push_str("?>");
        }
        Node::Text(text) => out.push_str(&escape(text)),
        Node::Comment(body) => {
            out.push_str("<!--");
            out.push_str(body);
            out.push_str("-->");
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for (key, value) in &el.attrs {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(&escape(value));
                out.push('"');
            }
            if el.self_closing && el.children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in &el.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
    }
}

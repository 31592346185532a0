use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

use crate::error::Result;

/// XML 要素ツリーのノード。
///
/// `content` はレコード由来の値を含むかどうか。固定値（コードリストの既定値など）だけを
/// 含む任意ブロックは出力しない。
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Node>,
    content: bool,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
            content: false,
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// レコード由来のテキストを持つ葉
    pub fn value(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            content: true,
            ..Self::new(name)
        }
    }

    /// 固定テキストを持つ葉。任意ブロックの出力判定には数えない
    pub fn fixed(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(name)
        }
    }

    pub fn child(mut self, child: Node) -> Self {
        self.content |= child.content;
        self.children.push(child);
        self
    }

    pub fn has_content(&self) -> bool {
        self.content
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// 必須要素。子がすべて欠けていても出力する
pub fn required(name: &str, children: impl IntoIterator<Item = Option<Node>>) -> Node {
    let mut node = children
        .into_iter()
        .flatten()
        .fold(Node::new(name), Node::child);
    node.content = true;
    node
}

/// 任意要素。値を含む子孫がなければ要素ごと省略する
pub fn optional(name: &str, children: impl IntoIterator<Item = Option<Node>>) -> Option<Node> {
    let node = children
        .into_iter()
        .flatten()
        .fold(Node::new(name), Node::child);
    node.has_content().then_some(node)
}

pub fn render(root: &Node) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_node(&mut writer, root)?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &Node) -> Result<()> {
    let mut start = BytesStart::new(node.name.as_str());
    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.text.is_none() && node.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(text) = &node.text {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(node.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_group_without_content_is_dropped() {
        let fixed_only = optional("gmd:block", [Some(Node::fixed("gmd:level", "dataset")), None]);
        assert!(fixed_only.is_none());

        let with_value = optional(
            "gmd:block",
            [Some(Node::fixed("gmd:level", "dataset")), Some(Node::value("gmd:x", "1"))],
        )
        .unwrap();
        assert_eq!(with_value.children.len(), 2);
    }

    #[test]
    fn test_nested_optional_propagates_content() {
        let inner = optional("inner", [Some(Node::value("leaf", "v"))]);
        let outer = optional("outer", [inner]).unwrap();
        assert!(outer.has_content());
        assert!(outer.find("inner").is_some());

        assert!(optional("outer", [optional("inner", [None])]).is_none());
    }

    #[test]
    fn test_render_escapes_text_and_attributes() {
        let root = required(
            "root",
            [Some(Node::value("a", "x < y & z").attr("k", "\"q\""))],
        );
        let xml = render(&root).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("x &lt; y &amp; z"));
        assert!(xml.contains("k=\"&quot;q&quot;\""));
    }

    #[test]
    fn test_empty_required_element_is_self_closing() {
        let root = required("root", [Some(Node::new("empty").attr("gco:nilReason", "missing"))]);
        let xml = render(&root).unwrap();
        assert!(xml.contains("<empty gco:nilReason=\"missing\"/>"));
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_surfaces_as_io_error() {
        let mut writer = Writer::new(BrokenSink);
        let root = required("root", [Some(Node::value("a", "1"))]);
        match write_node(&mut writer, &root) {
            Err(crate::error::Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

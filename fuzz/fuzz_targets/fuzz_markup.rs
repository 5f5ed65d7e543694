//! Fuzz target for markup serialization.
//!
//! Text and attribute values are escaped, so arbitrary content never
//! produces markup that opens a tag.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rendertest::dom::{DomNode, ElementNode, to_markup};

#[derive(Arbitrary, Debug)]
struct Input {
    text: String,
    attribute: String,
}

fuzz_target!(|input: Input| {
    let node = DomNode::Element(ElementNode {
        tag: "span".to_string(),
        attributes: vec![("title".to_string(), input.attribute.clone())],
        handlers: Vec::new(),
        children: vec![DomNode::Text(input.text.clone())],
    });
    let markup = to_markup(std::slice::from_ref(&node));

    let inner = &markup["<span title=\"".len()..markup.len() - "</span>".len()];
    assert_eq!(inner.matches('<').count(), 0);
    assert_eq!(node.text_content(), input.text);
});

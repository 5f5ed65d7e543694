//! Fuzz target for selector parsing and matching.
//!
//! Arbitrary selector text must either be rejected with an error or match
//! a small document without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rendertest::dom::{DomNode, ElementNode, Selector, select_all};

fn element(tag: &str, attributes: &[(&str, &str)], children: Vec<DomNode>) -> DomNode {
    DomNode::Element(ElementNode {
        tag: tag.to_string(),
        attributes: attributes
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
        handlers: Vec::new(),
        children,
    })
}

fuzz_target!(|data: &str| {
    let document = vec![element(
        "div",
        &[("id", "root"), ("class", "a b")],
        vec![
            element("p", &[("data-x", "1")], vec![DomNode::Text("text".into())]),
            element("ul", &[], vec![element("li", &[("class", "done")], Vec::new())]),
        ],
    )];

    if let Ok(selector) = Selector::parse(data) {
        let matched = select_all(&document, &selector);
        assert!(matched.len() <= 4);
        let _ = Selector::parse(selector.as_str());
    }
});

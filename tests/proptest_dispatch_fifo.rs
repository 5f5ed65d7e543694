//! Property-based tests for dispatch ordering and render counting.
//!
//! Work submitted from one thread runs in submission order whether it is
//! posted or invoked, every completed click adds exactly one render, and
//! serialized markup never lets content open a tag.

mod common;

use common::fixtures::{Counter, Parent};
use proptest::prelude::*;
use rendertest::prelude::*;
use rendertest::dom::{DomNode, ElementNode, to_markup};
use rendertest::{TestContextOptions, TestRenderer};
use std::sync::{Arc, Mutex};

// ============================================================================
// Strategies
// ============================================================================

#[derive(Clone, Copy, Debug)]
enum Submit {
    Post,
    Invoke,
}

fn submissions() -> impl Strategy<Value = Vec<Submit>> {
    prop::collection::vec(
        prop_oneof![Just(Submit::Post), Just(Submit::Invoke)],
        1..40,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn submissions_run_in_order(plan in submissions()) {
        let renderer = TestRenderer::new(TestContextOptions::default()).unwrap();
        let dispatcher = renderer.dispatcher();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (index, submit) in plan.iter().enumerate() {
            let log = Arc::clone(&log);
            let job = move |_: &mut rendertest::ComponentTree| -> rendertest::Result<()> {
                log.lock().unwrap().push(index);
                Ok(())
            };
            match submit {
                Submit::Post => dispatcher.post(job).unwrap(),
                Submit::Invoke => dispatcher.invoke(job).unwrap(),
            }
        }
        dispatcher.invoke(|_| Ok(())).unwrap();

        let log = log.lock().unwrap();
        prop_assert_eq!(log.clone(), (0..plan.len()).collect::<Vec<_>>());
        prop_assert_eq!(dispatcher.completed_items(), plan.len() as u64 + 1);
    }

    #[test]
    fn each_click_renders_once(clicks in 0usize..12) {
        let ctx = TestContext::new().unwrap();
        let cut = ctx.render::<Counter>(Parameters::new()).unwrap();
        let button = cut.find("button").unwrap();

        for _ in 0..clicks {
            button.click().unwrap();
        }

        prop_assert_eq!(cut.render_count(), clicks as u64 + 1);
        let expected = format!("Current count: {clicks}");
        prop_assert_eq!(cut.find("p").unwrap().text_content().unwrap(), expected);
    }

    #[test]
    fn parent_counts_one_render_per_item(sizes in prop::collection::vec(0i64..6, 1..6)) {
        let ctx = TestContext::new().unwrap();
        let cut = ctx.render::<Parent>(Parameters::new().add("Items", sizes[0])).unwrap();

        for size in &sizes[1..] {
            cut.set_parameters_and_render(Parameters::new().add("Items", *size)).unwrap();
        }

        let last = *sizes.last().unwrap();
        prop_assert_eq!(cut.render_count(), sizes.len() as u64);
        prop_assert_eq!(cut.find_all("li").unwrap().len() as i64, last);
    }

    #[test]
    fn escaped_content_never_opens_a_tag(text in ".*", title in ".*") {
        let node = DomNode::Element(ElementNode {
            tag: "p".to_string(),
            attributes: vec![("title".to_string(), title)],
            handlers: Vec::new(),
            children: vec![DomNode::Text(text.clone())],
        });
        let markup = to_markup(std::slice::from_ref(&node));

        prop_assert_eq!(markup.matches('<').count(), 2);
        prop_assert_eq!(node.text_content(), text);
    }
}

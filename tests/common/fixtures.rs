//! Components shared by the integration tests.

use rendertest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

#[derive(Default)]
pub struct Hello;

impl Component for Hello {
    fn render(&self, b: &mut RenderTreeBuilder) {
        b.add_markup_content("<h1>Hello world</h1>");
    }
}

/// `<p>Current count: N</p><button>Click me</button>`; clicking increments.
#[derive(Default)]
pub struct Counter {
    pub count: i64,
}

impl Component for Counter {
    fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
        if let Some(start) = params.get::<i64>("Start")? {
            self.count = start;
        }
        Ok(())
    }

    fn render(&self, b: &mut RenderTreeBuilder) {
        b.element("p", |b| b.add_content(format!("Current count: {}", self.count)));
        b.open_element("button");
        b.add_event_handler("click", "increment");
        b.add_content("Click me");
        b.close_element();
    }

    fn handle_event(&mut self, handler: &str, _: &Event, _: &mut ComponentContext<'_>) -> Result<()> {
        match handler {
            "increment" => {
                self.count += 1;
                Ok(())
            }
            other => Err(Error::component::<Self>(format!("unknown handler {other}"))),
        }
    }
}

/// A list item labelled by its `Label` parameter.
#[derive(Default)]
pub struct Child {
    pub label: String,
}

impl Component for Child {
    fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
        self.label = params.get::<String>("Label")?.unwrap_or_default();
        Ok(())
    }

    fn render(&self, b: &mut RenderTreeBuilder) {
        b.element("li", |b| {
            b.add_attribute("class", "child");
            b.add_content(self.label.clone());
        });
    }
}

/// Renders `Items` children inside a `<ul>`, or the comma separated
/// `Order` labels as keyed children when that parameter is set.
#[derive(Default)]
pub struct Parent {
    items: i64,
    order: Option<String>,
}

impl Component for Parent {
    fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
        if let Some(items) = params.get::<i64>("Items")? {
            self.items = items;
        }
        self.order = params.get::<String>("Order")?;
        Ok(())
    }

    fn render(&self, b: &mut RenderTreeBuilder) {
        b.element("ul", |b| match &self.order {
            Some(order) => {
                for label in order.split(',') {
                    b.component_keyed::<Child>(label, Parameters::new().add("Label", label));
                }
            }
            None => {
                for i in 0..self.items {
                    b.component::<Child>(Parameters::new().add("Label", format!("item {i}")));
                }
            }
        });
    }
}

/// Receives labels from a test through its `Feed` parameter.
///
/// Starts as `FIRST`. A background thread forwards every received label
/// through a [`ComponentHandle`]; the label `FAIL` makes the update raise an
/// error instead.
#[derive(Default)]
pub struct AsyncLabel {
    pub text: String,
    pub history: Vec<String>,
    feed: Option<Arc<Feed>>,
}

pub type Feed = Mutex<Receiver<String>>;

/// A sender for labels and the parameter value that receives them.
pub fn feed() -> (Sender<String>, Arc<Feed>) {
    let (tx, rx) = mpsc::channel();
    (tx, Arc::new(Mutex::new(rx)))
}

impl Component for AsyncLabel {
    fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
        self.feed = params.object::<Feed>("Feed")?;
        Ok(())
    }

    fn on_initialized(&mut self, ctx: &mut ComponentContext<'_>) -> Result<()> {
        self.text = "FIRST".to_string();
        let Some(feed) = self.feed.clone() else {
            return Ok(());
        };
        let handle = ctx.handle::<Self>();
        thread::spawn(move || {
            loop {
                let received = feed.lock().unwrap_or_else(PoisonError::into_inner).recv();
                let Ok(text) = received else {
                    break;
                };
                let posted = handle.invoke(move |label: &mut Self, ctx| {
                    if text == "FAIL" {
                        return Err(Error::component::<Self>("update failed"));
                    }
                    label.history.push(text.clone());
                    label.text = text;
                    ctx.state_has_changed();
                    Ok(())
                });
                if posted.is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    fn render(&self, b: &mut RenderTreeBuilder) {
        b.element("p", |b| {
            if self.text != "FIRST" {
                b.add_attribute("class", "done");
            }
            b.add_content(self.text.clone());
        });
        b.element("ul", |b| {
            for item in &self.history {
                b.element("li", |b| b.add_content(item.clone()));
            }
        });
    }
}

/// Fails on request: `FailInit` errors during initialization, `PanicRender`
/// panics while rendering.
#[derive(Default)]
pub struct Thrower {
    panic_render: bool,
    fail_init: bool,
}

impl Component for Thrower {
    fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
        self.fail_init = params.get::<bool>("FailInit")?.unwrap_or(false);
        self.panic_render = params.get::<bool>("PanicRender")?.unwrap_or(false);
        Ok(())
    }

    fn on_initialized(&mut self, _: &mut ComponentContext<'_>) -> Result<()> {
        if self.fail_init {
            return Err(Error::component::<Self>("initialization failed"));
        }
        Ok(())
    }

    fn render(&self, b: &mut RenderTreeBuilder) {
        assert!(!self.panic_render, "render exploded");
        b.add_content("fine");
    }
}

/// Records every after-render callback.
#[derive(Default)]
pub struct AfterRenderProbe {
    pub first_renders: Vec<bool>,
}

impl Component for AfterRenderProbe {
    fn render(&self, b: &mut RenderTreeBuilder) {
        b.element("span", |b| b.add_content(format!("{}", self.first_renders.len())));
    }

    fn on_after_render(&mut self, first_render: bool, _: &mut ComponentContext<'_>) -> Result<()> {
        self.first_renders.push(first_render);
        Ok(())
    }
}

/// Requests another render after every render, forever.
#[derive(Default)]
pub struct RenderLoop;

impl Component for RenderLoop {
    fn render(&self, b: &mut RenderTreeBuilder) {
        b.add_content("again");
    }

    fn on_after_render(&mut self, _: bool, ctx: &mut ComponentContext<'_>) -> Result<()> {
        ctx.state_has_changed();
        Ok(())
    }
}

pub static DISPOSED: AtomicUsize = AtomicUsize::new(0);

/// Counts its disposals in [`DISPOSED`].
#[derive(Default)]
pub struct Tracked;

impl Component for Tracked {
    fn render(&self, b: &mut RenderTreeBuilder) {
        b.add_content("tracked");
    }

    fn dispose(&mut self) {
        DISPOSED.fetch_add(1, Ordering::SeqCst);
    }
}

/// Panics when disposed.
#[derive(Default)]
pub struct FragileDispose;

impl Component for FragileDispose {
    fn render(&self, b: &mut RenderTreeBuilder) {
        b.add_content("fragile");
    }

    fn dispose(&mut self) {
        panic!("dispose exploded");
    }
}

/// An `<input>` that keeps its value from `change` events and commits it
/// on Enter.
#[derive(Default)]
pub struct TodoInput {
    pub draft: String,
    pub items: Vec<String>,
}

impl Component for TodoInput {
    fn render(&self, b: &mut RenderTreeBuilder) {
        b.open_element("input");
        b.add_attribute("value", self.draft.clone());
        b.add_event_handler("change", "edit");
        b.add_event_handler("keydown", "key");
        b.close_element();
        b.element("ol", |b| {
            for item in &self.items {
                b.element("li", |b| b.add_content(item.clone()));
            }
        });
    }

    fn handle_event(&mut self, handler: &str, event: &Event, _: &mut ComponentContext<'_>) -> Result<()> {
        match handler {
            "edit" => self.draft = event.value().unwrap_or_default().to_string(),
            "key" => {
                let enter = event
                    .key()
                    .is_some_and(|key| key.code == KeyCode::Enter && !key.shift_key());
                if enter && !self.draft.is_empty() {
                    self.items.push(std::mem::take(&mut self.draft));
                }
            }
            other => return Err(Error::component::<Self>(format!("unknown handler {other}"))),
        }
        Ok(())
    }
}

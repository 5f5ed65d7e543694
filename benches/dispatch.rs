//! Dispatcher round-trip, render and query benchmarks.

#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rendertest::prelude::*;
use rendertest::{TestContextOptions, TestRenderer};
use std::hint::black_box;

#[derive(Default)]
struct Counter {
    count: i64,
}

impl Component for Counter {
    fn render(&self, b: &mut RenderTreeBuilder) {
        b.element("p", |b| b.add_content(format!("Current count: {}", self.count)));
        b.open_element("button");
        b.add_event_handler("click", "increment");
        b.close_element();
    }

    fn handle_event(&mut self, _: &str, _: &Event, _: &mut ComponentContext<'_>) -> Result<()> {
        self.count += 1;
        Ok(())
    }
}

#[derive(Default)]
struct Row {
    label: String,
}

impl Component for Row {
    fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
        self.label = params.get::<String>("Label")?.unwrap_or_default();
        Ok(())
    }

    fn render(&self, b: &mut RenderTreeBuilder) {
        b.element("li", |b| {
            b.add_attribute("class", "row");
            b.add_content(self.label.clone());
        });
    }
}

#[derive(Default)]
struct Table {
    rows: i64,
    generation: i64,
}

impl Component for Table {
    fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
        self.rows = params.get::<i64>("Rows")?.unwrap_or(0);
        self.generation = params.get::<i64>("Generation")?.unwrap_or(0);
        Ok(())
    }

    fn render(&self, b: &mut RenderTreeBuilder) {
        b.element("ul", |b| {
            for i in 0..self.rows {
                // Only the first row changes between generations.
                let label = if i == 0 {
                    format!("row 0 gen {}", self.generation)
                } else {
                    format!("row {i}")
                };
                b.component::<Row>(Parameters::new().add("Label", label));
            }
        });
    }
}

fn invoke_round_trip(c: &mut Criterion) {
    let renderer = TestRenderer::new(TestContextOptions::default()).expect("renderer");
    let dispatcher = renderer.dispatcher().clone();

    c.bench_function("invoke_round_trip", |b| {
        b.iter(|| dispatcher.invoke(|tree| Ok(black_box(tree.component_count()))))
    });
}

fn click_and_render(c: &mut Criterion) {
    let ctx = TestContext::new().expect("context");
    let cut = ctx.render::<Counter>(Parameters::new()).expect("render");
    let button = cut.find("button").expect("button");

    c.bench_function("click_and_render", |b| b.iter(|| button.click()));
}

fn rerender_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("rerender_table");
    for rows in [10_i64, 100, 1000] {
        let ctx = TestContext::new().expect("context");
        let cut = ctx
            .render::<Table>(Parameters::new().add("Rows", rows))
            .expect("render");
        let mut generation = 0_i64;

        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| {
                generation += 1;
                cut.set_parameters_and_render(Parameters::new().add("Generation", generation))
            })
        });
    }
    group.finish();
}

fn query_markup(c: &mut Criterion) {
    let ctx = TestContext::new().expect("context");
    let cut = ctx
        .render::<Table>(Parameters::new().add("Rows", 500_i64))
        .expect("render");

    c.bench_function("markup_500_rows", |b| b.iter(|| black_box(cut.markup())));
    c.bench_function("find_all_500_rows", |b| {
        b.iter(|| black_box(cut.find_all("ul > li.row")).map(|rows| rows.len()))
    });
    c.bench_function("wait_for_state_immediate", |b| {
        b.iter(|| cut.wait_for_state(|| true, None).wait())
    });
}

criterion_group!(
    benches,
    invoke_round_trip,
    click_and_render,
    rerender_table,
    query_markup
);
criterion_main!(benches);

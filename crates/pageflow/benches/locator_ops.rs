//! Locator Operations Benchmarks
//!
//! Registry construction, selector compilation and mock DOM queries.
//!
//! Run with: `cargo bench --bench locator_ops`

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pageflow::prelude::*;

fn list_of(n: usize) -> TodoList {
    let mut list = TodoList::new();
    for i in 0..n {
        list = list.add(&format!("task number {i}")).unwrap();
    }
    list
}

fn bench_registry_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_build");

    for (name, style) in [("css", LocatorStyle::Css), ("test_id", LocatorStyle::TestId)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &style, |bench, style| {
            bench.iter(|| black_box(todo_registry(*style).unwrap()));
        });
    }

    group.finish();
}

fn bench_query_script(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_script");

    let selectors = vec![
        ("css", Selector::css(".todo_list_item span")),
        ("test_id", Selector::test_id("todo-item")),
        ("text", Selector::text("Buy groceries")),
        ("xpath", Selector::xpath("//li[@class='todo_list_item']")),
        ("filtered", Selector::css(".todo_list_item").with_text("Buy")),
    ];

    for (name, selector) in selectors {
        group.bench_with_input(BenchmarkId::from_parameter(name), &selector, |bench, sel| {
            bench.iter(|| black_box(sel.to_query_all("document")));
        });
    }

    group.finish();
}

fn bench_mock_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("mock_query");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let selector = Selector::css("ul.todo_list > li.todo_list_item span");

    for size in [3usize, 30, 300] {
        let mut driver = MockDriver::new(Box::new(TodoApp::new(list_of(size))));
        runtime.block_on(driver.goto("http://localhost:3000/")).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &driver, |bench, driver| {
            bench.iter(|| {
                let found = runtime.block_on(driver.query(&selector, None)).unwrap();
                black_box(found.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_registry_build, bench_query_script, bench_mock_query);
criterion_main!(benches);

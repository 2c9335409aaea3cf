//! Benchmark suite for Conductor subsystems.
//!
//! This module provides performance benchmarks for:
//! - Task analysis (keyword classification and budgeting)
//! - Template selection and filling
//! - Quality scoring (heuristic strategy over implementations of various sizes)
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Save baseline for comparison
//! cargo bench -- --save-baseline main
//!
//! # Compare against baseline
//! cargo bench -- --baseline main
//! ```

use conductor::prompt::TemplateManager;
use conductor::quality::QualityAnalyzer;
use conductor::task::{Complexity, Task, TaskAnalyzer, TaskType};
use conductor::testing::{login_form_task, LOGIN_FORM_IMPLEMENTATION};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

// ============================================================================
// Task Analysis Benchmarks
// ============================================================================

/// Benchmark task analysis over short and long descriptions.
fn bench_task_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_analysis");
    let analyzer = TaskAnalyzer::new();

    let short = login_form_task();
    let long = Task::new(
        "long",
        "Build a responsive dashboard page with animated charts, async data fetching with retry, \
         form validation, keyboard navigation and aria labels, typed with TypeScript and a \
         shared store for state management"
            .repeat(4),
    )
    .with_type(TaskType::Ui)
    .with_complexity(Complexity::High);

    for (name, task) in [("short", &short), ("long", &long)] {
        group.bench_with_input(BenchmarkId::new("analyze", name), task, |b, task| {
            b.iter(|| analyzer.analyze(black_box(task)))
        });
    }

    group.finish();
}

// ============================================================================
// Template Benchmarks
// ============================================================================

/// Benchmark best-template selection followed by placeholder filling.
fn bench_template_fill(c: &mut Criterion) {
    let manager = TemplateManager::with_defaults(&["claude", "ui-specialist", "logic-specialist"]);
    let task = login_form_task()
        .with_feature("accessibility")
        .with_context("framework", "Svelte");

    c.bench_function("template_select_and_fill", |b| {
        b.iter(|| {
            let template_type = manager
                .get_best_template_type("claude", black_box(&task))
                .unwrap_or_default();
            manager.get_template("claude", &template_type, black_box(&task))
        })
    });
}

// ============================================================================
// Quality Scoring Benchmarks
// ============================================================================

/// Benchmark heuristic scoring as implementations grow.
fn bench_quality_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("quality_scoring");
    let analyzer = QualityAnalyzer::heuristic();
    let task = login_form_task();

    for copies in [1, 10, 50] {
        let implementation = LOGIN_FORM_IMPLEMENTATION.repeat(copies);
        group.throughput(Throughput::Bytes(implementation.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("heuristic", copies),
            &implementation,
            |b, implementation| b.iter(|| analyzer.analyze_quality(black_box(implementation), &task)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_task_analysis, bench_template_fill, bench_quality_scoring);
criterion_main!(benches);

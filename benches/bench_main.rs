//! minnow benchmarks: parser, expansion, resolution, and glob matching.
//!
//! Hand-rolled timing with `std::time::Instant`; no harness crate.
//!
//! Run with `cargo bench`.

use std::time::{Duration, Instant};

use minnow::expand::Expander;
use minnow::path::PathResolver;
use minnow::state::Environ;
use minnow::{glob, parser};

// ── Infrastructure ──────────────────────────────────────────────────

struct BenchResult {
    category: &'static str,
    name: &'static str,
    avg: Duration,
    iters: u64,
}

impl BenchResult {
    fn print(&self) {
        let avg_us = self.avg.as_nanos() as f64 / 1000.0;
        println!(
            "[{:<8}] {:<44}: avg {:>10.2}µs  ({} iters)",
            self.category, self.name, avg_us, self.iters,
        );
    }
}

fn bench<F: FnMut()>(
    category: &'static str,
    name: &'static str,
    iters: u64,
    mut f: F,
) -> BenchResult {
    // warmup
    for _ in 0..iters.min(100) {
        f();
    }

    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    let elapsed = start.elapsed();

    BenchResult {
        category,
        name,
        avg: elapsed / iters as u32,
        iters,
    }
}

// ── Main ────────────────────────────────────────────────────────────

fn main() {
    println!("minnow benchmark suite");
    println!("{}", "=".repeat(80));

    let mut results = Vec::new();

    println!("\n--- Parser ---");
    results.push(bench("parser", "echo hello", 10_000, || {
        let _ = parser::parse("echo hello");
    }));
    results.push(bench("parser", "three-stage pipeline", 10_000, || {
        let _ = parser::parse("cat /etc/passwd | grep root | wc -l");
    }));
    results.push(bench("parser", "quotes and redirects", 10_000, || {
        let _ = parser::parse(r#"FOO=1 sort -k2 "a b" '$x' < in.txt >> out.txt &"#);
    }));
    for r in &results {
        r.print();
    }
    let shown = results.len();

    println!("\n--- Expansion ---");
    let mut env = Environ::default();
    env.set("HOME", "/home/bench");
    env.set("USER", "bench");
    env.set("LONG", &"x".repeat(200));
    let expander = Expander::new(&env, 0);
    let var_word = parsed_word("prefix-$USER-${LONG}-suffix");
    let tilde_word = parsed_word("~/projects/src");

    results.push(bench("expand", "variables in one word", 10_000, || {
        let _ = expander.expand_word(&var_word);
    }));
    results.push(bench("expand", "tilde", 10_000, || {
        let _ = expander.expand_word(&tilde_word);
    }));
    for r in &results[shown..] {
        r.print();
    }
    let shown = results.len();

    println!("\n--- Resolution ---");
    let resolver = PathResolver::with_bin_dir(None);
    let path_var = std::env::var("PATH").ok();
    results.push(bench("resolve", "builtin hit", 10_000, || {
        let _ = resolver.resolve("cd", path_var.as_deref());
    }));
    results.push(bench("resolve", "PATH scan (ls)", 2_000, || {
        let _ = resolver.resolve("ls", path_var.as_deref());
    }));
    results.push(bench("resolve", "PATH miss", 2_000, || {
        let _ = resolver.resolve("no_such_command_zzz", path_var.as_deref());
    }));
    for r in &results[shown..] {
        r.print();
    }
    let shown = results.len();

    println!("\n--- Glob ---");
    results.push(bench("glob", "match: *.rs vs main.rs", 100_000, || {
        let _ = glob::matches("*.rs", "main.rs");
    }));
    results.push(bench("glob", "match: backtracking", 100_000, || {
        let _ = glob::matches("*a*b*c*", "xxaxxbxxcxx");
    }));
    results.push(bench("glob", "expand /tmp/*", 1_000, || {
        let _ = glob::expand("/tmp/*");
    }));
    for r in &results[shown..] {
        r.print();
    }

    println!("\n{}", "=".repeat(80));
    println!("{} benchmarks done", results.len());
}

fn parsed_word(text: &str) -> minnow::parser::Word {
    let line = format!("echo {}", text);
    parser::parse(&line)
        .ok()
        .flatten()
        .map(|seq| seq.pipelines[0].stages[0].words[1].clone())
        .unwrap_or_default()
}

// SPDX-License-Identifier: PMPL-1.0-or-later
//! Performance benchmarks for CTDL query compilation and execution

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use tokio::runtime::Runtime;

use credreg_query::{
    ColumnCatalog, ColumnInfo, CompilerConfig, ContextEntry, ExecutionError, QueryCompiler,
    QueryExecutor, QueryRunner, Row, RunOptions, Schema, SchemaContext,
};

fn schema() -> Schema {
    let context = SchemaContext::new()
        .with_entry("ceterms:name", ContextEntry::typed("xsd:string"))
        .with_entry("ceterms:description", ContextEntry::language())
        .with_entry("ceterms:credits", ContextEntry::typed("xsd:integer"))
        .with_entry("ceterms:tags", ContextEntry::default())
        .with_entry("ceterms:hasPart", ContextEntry::reference())
        .with_entry("ceterms:isPartOf", ContextEntry::reference())
        .with_entry("ceterms:ownedBy", ContextEntry::reference());
    let columns = ColumnCatalog::new()
        .with_column("@id", ColumnInfo::scalar("varchar"))
        .with_column("ceterms:ctid", ColumnInfo::scalar("varchar"))
        .with_column("ceterms:name", ColumnInfo::scalar("varchar"))
        .with_column("ceterms:description_en", ColumnInfo::scalar("varchar"))
        .with_column("ceterms:description_es", ColumnInfo::scalar("varchar"))
        .with_column("ceterms:credits", ColumnInfo::array("integer"))
        .with_column("ceterms:tags", ColumnInfo::array("varchar"));
    Schema::new(context, columns)
}

fn simple_query() -> Value {
    json!({
        "ceterms:name": {"search:value": "nursing", "search:matchType": "search:startsWith"},
        "ceterms:credits": [3, 12]
    })
}

fn reference_query() -> Value {
    json!({
        "ceterms:ownedBy": ["https://example.org/orgs/1", "https://example.org/orgs/2"],
        "^ceterms:isPartOf": {"ceterms:name": "welding"},
        "ceterms:hasPart": {"ceterms:tags": ["safety", "steel"]}
    })
}

/// Reference chain `depth` levels deep.
fn nested_query(depth: usize) -> Value {
    (0..depth).fold(json!({"ceterms:name": "leaf"}), |inner, i| {
        json!({
            "ceterms:description": {"en": format!("level {i}")},
            "ceterms:hasPart": inner
        })
    })
}

// ============================================================================
// Compile Benchmarks
// ============================================================================

fn bench_compile(c: &mut Criterion) {
    let schema = schema();
    let config = CompilerConfig::default();
    let compiler = QueryCompiler::new(&schema, &config);

    let mut group = c.benchmark_group("compile");

    let simple = simple_query();
    group.bench_function("simple", |b| {
        b.iter(|| black_box(compiler.count_query(black_box(&simple)).unwrap()))
    });

    let references = reference_query();
    group.bench_function("references", |b| {
        b.iter(|| black_box(compiler.count_query(black_box(&references)).unwrap()))
    });

    for depth in [1, 4, 16] {
        let query = nested_query(depth);
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::new("nested", depth), &query, |b, query| {
            b.iter(|| black_box(compiler.count_query(query).unwrap()))
        });
    }

    group.finish();
}

fn bench_term_group_width(c: &mut Criterion) {
    let schema = schema();
    let config = CompilerConfig::default();
    let compiler = QueryCompiler::new(&schema, &config);

    let mut group = c.benchmark_group("term_group");

    for width in [10, 100, 1000] {
        let terms: Vec<Value> = (0..width)
            .map(|i| json!({"ceterms:name": format!("term {i}")}))
            .collect();
        let query = json!({"search:termGroup": terms, "search:operator": "search:orTerms"});

        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &query, |b, query| {
            b.iter(|| black_box(compiler.count_query(query).unwrap()))
        });
    }

    group.finish();
}

// ============================================================================
// Render Benchmarks
// ============================================================================

fn bench_render(c: &mut Criterion) {
    let schema = schema();
    let config = CompilerConfig::default();
    let compiler = QueryCompiler::new(&schema, &config);

    let mut group = c.benchmark_group("render");

    let count = compiler.count_query(&reference_query()).unwrap();
    group.bench_function("count", |b| b.iter(|| black_box(compiler.to_sql(&count))));

    let data = compiler
        .data_query(&reference_query(), 20, 50, true)
        .unwrap();
    group.bench_function("data_with_metadata", |b| {
        b.iter(|| black_box(compiler.to_sql(&data)))
    });

    let nested = compiler.count_query(&nested_query(16)).unwrap();
    group.bench_function("nested_16", |b| b.iter(|| black_box(compiler.to_sql(&nested))));

    group.finish();
}

// ============================================================================
// Runner Benchmarks
// ============================================================================

/// Returns canned rows without touching a database.
struct CannedExecutor {
    rows: Vec<Row>,
}

#[async_trait]
impl QueryExecutor for CannedExecutor {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, ExecutionError> {
        if sql.contains("COUNT(*)") {
            let mut row = Row::new();
            row.insert("count".to_string(), json!(self.rows.len()));
            return Ok(vec![row]);
        }
        Ok(self.rows.clone())
    }
}

fn bench_run(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let schema = schema();
    let config = CompilerConfig::default();

    let rows: Vec<Row> = (0..50)
        .map(|i| {
            let mut row = Row::new();
            row.insert("@id".to_string(), json!(format!("https://example.org/resources/{i}")));
            row.insert(
                "payload".to_string(),
                json!(format!("{{\"@id\": \"https://example.org/resources/{i}\"}}")),
            );
            row.insert("created_at".to_string(), json!("2024-03-01T12:00:00Z"));
            row.insert("updated_at".to_string(), json!("2024-03-02 08:00:00"));
            row.insert("owned_by".to_string(), json!("ce-owner"));
            row.insert("published_by".to_string(), Value::Null);
            row
        })
        .collect();
    let runner = QueryRunner::new(&schema, &config, CannedExecutor { rows });

    let mut group = c.benchmark_group("run");

    let query = reference_query();
    let (runner, query) = (&runner, &query);
    for metadata in [false, true] {
        let options = RunOptions {
            skip: Some(0),
            take: Some(50),
            include_results_metadata: metadata,
        };
        group.bench_with_input(BenchmarkId::new("shape_50_rows", metadata), &options, |b, &options| {
            b.to_async(&rt)
                .iter(move || async move { black_box(runner.run(query, options).await.unwrap()) });
        });
    }

    group.finish();
}

criterion_group!(
    compile_benches,
    bench_compile,
    bench_term_group_width
);

criterion_group!(
    render_benches,
    bench_render
);

criterion_group!(
    run_benches,
    bench_run
);

criterion_main!(
    compile_benches,
    render_benches,
    run_benches
);

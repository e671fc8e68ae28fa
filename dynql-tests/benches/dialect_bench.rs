/// Performance benchmarks for the dialect pipeline and autocommit path
///
/// Run with: cargo bench -p dynql-tests

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dynql_api::{params, Connection};
use dynql_core::dialect::{DialectParser, OperationPlanner, StatementCompiler};
use dynql_core::{KeyAttribute, KeySchema, KeyType, MemoryStore, Value};
use std::collections::HashMap;
use std::sync::Arc;

const STATEMENTS: &[(&str, &str)] = &[
    ("insert", r#"INSERT INTO "tbltest" VALUE {'id': ?, 'name': ?, 'tags': ['a', 'b'], 'meta': {'n': 1}}"#),
    ("select", "SELECT id, name FROM tbltest WHERE id = ? AND name = 'x'"),
    ("update", r#"UPDATE "tbltest" SET duration=?, name='n' WHERE "id"=?"#),
    ("delete", "DELETE FROM tbltest WHERE id = ?"),
];

fn catalog() -> HashMap<String, KeySchema> {
    let mut c = HashMap::new();
    c.insert(
        "tbltest".to_string(),
        KeySchema::new(KeyAttribute::new("id", KeyType::String)),
    );
    c
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for (name, sql) in STATEMENTS {
        group.throughput(Throughput::Bytes(sql.len() as u64));
        group.bench_with_input(BenchmarkId::new("statement", name), sql, |b, sql| {
            b.iter(|| DialectParser::parse(black_box(sql)).unwrap());
        });
    }
    group.finish();
}

fn bench_compile_and_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_plan");
    let catalog = catalog();
    for (name, sql) in STATEMENTS {
        let ast = DialectParser::parse(sql).unwrap();
        let params: Vec<Value> = (0..ast.placeholder_count())
            .map(|i| Value::from(format!("v{}", i)))
            .collect();
        group.bench_with_input(BenchmarkId::new("statement", name), &ast, |b, ast| {
            b.iter(|| {
                let compiled = StatementCompiler::compile(black_box(ast.clone()), &catalog).unwrap();
                OperationPlanner::plan(&compiled, &params).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_autocommit_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("autocommit_insert");
    group.throughput(Throughput::Elements(1));

    group.bench_function("exec", |b| {
        let conn = Connection::new(Arc::new(MemoryStore::new()));
        conn.exec("CREATE TABLE tbltest WITH pk=id:string", &[]).unwrap();
        let mut counter = 0u64;
        b.iter(|| {
            let id = format!("key{}", counter);
            counter += 1;
            conn.exec(
                "INSERT INTO tbltest VALUE {'id': ?, 'n': ?}",
                black_box(&params![id, counter]),
            )
            .unwrap();
        });
    });

    group.bench_function("prepared", |b| {
        let conn = Connection::new(Arc::new(MemoryStore::new()));
        conn.exec("CREATE TABLE tbltest WITH pk=id:string", &[]).unwrap();
        let stmt = conn.prepare("INSERT INTO tbltest VALUE {'id': ?, 'n': ?}").unwrap();
        let mut counter = 0u64;
        b.iter(|| {
            let id = format!("key{}", counter);
            counter += 1;
            stmt.exec(black_box(&params![id, counter])).unwrap();
        });
    });
    group.finish();
}

fn bench_transaction_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("transaction_commit");
    for size in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("ops", size), &size, |b, &size| {
            b.iter(|| {
                let conn = Connection::new(Arc::new(MemoryStore::new()));
                conn.exec("CREATE TABLE tbltest WITH pk=id:string", &[]).unwrap();
                let mut tx = conn.begin().unwrap();
                for i in 0..size {
                    tx.exec("INSERT INTO tbltest VALUE {'id': ?}", &params![i.to_string()])
                        .unwrap();
                }
                tx.commit().unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_compile_and_plan,
    bench_autocommit_insert,
    bench_transaction_commit
);
criterion_main!(benches);

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::Utc;
use stockledger_core::{ExpectedRevision, ProductId, RecordId};
use stockledger_events::{EventEnvelope, InMemoryEventBus};
use stockledger_infra::{InMemoryRecordStore, InventoryLedger, RecordStore, StaticCatalog};
use stockledger_inventory::{ChangeEvent, InventoryRecord, NaturalKey, StockTransition};

type Bus = Arc<InMemoryEventBus<EventEnvelope<ChangeEvent>>>;

fn setup_ledger() -> (
    InventoryLedger<Arc<InMemoryRecordStore>, Bus, Arc<StaticCatalog>>,
    Arc<StaticCatalog>,
) {
    let store = Arc::new(InMemoryRecordStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let catalog = Arc::new(StaticCatalog::new());
    let ledger = InventoryLedger::new(store, bus, catalog.clone());
    (ledger, catalog)
}

fn bench_mutation_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutation_latency");
    group.sample_size(1000);

    group.bench_function("create_inventory_fresh", |b| {
        let (ledger, catalog) = setup_ledger();
        b.iter(|| {
            let product = ProductId::new();
            catalog.add(product);
            ledger
                .create_inventory(NaturalKey::product(product), black_box(100), None)
                .unwrap();
        });
    });

    group.bench_function("reserve_release_cycle", |b| {
        let (ledger, catalog) = setup_ledger();
        let product = ProductId::new();
        catalog.add(product);
        let key = NaturalKey::product(product);
        ledger.create_inventory(key, 1_000_000, None).unwrap();

        b.iter(|| {
            ledger.reserve(&key, black_box(3), None).unwrap();
            ledger.release(&key, 3, None).unwrap();
        });
    });

    group.bench_function("restock_with_history", |b| {
        let (ledger, catalog) = setup_ledger();
        let product = ProductId::new();
        catalog.add(product);
        let key = NaturalKey::product(product);
        ledger.create_inventory(key, 0, None).unwrap();

        b.iter(|| {
            ledger.restock(&key, black_box(5), None).unwrap();
        });
    });

    group.finish();
}

fn bench_conditional_write_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("conditional_write_throughput");
    group.throughput(Throughput::Elements(1));

    group.bench_function("save_with_revision_guard", |b| {
        let store = InMemoryRecordStore::new();
        let record = store
            .insert(
                InventoryRecord::new(
                    RecordId::new(),
                    NaturalKey::product(ProductId::new()),
                    1_000_000,
                    None,
                    Utc::now(),
                )
                .unwrap(),
            )
            .unwrap();
        let mut current = record;

        b.iter(|| {
            let next = StockTransition::Adjust { delta: 1 }
                .apply(&current, None, Utc::now())
                .unwrap();
            current = store
                .save(next, ExpectedRevision::Exact(current.revision))
                .unwrap();
            black_box(&current);
        });
    });

    group.finish();
}

fn bench_availability_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("availability_queries");

    for record_count in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("get_available", record_count),
            record_count,
            |b, &count| {
                let (ledger, catalog) = setup_ledger();
                let product = ProductId::new();
                catalog.add(product);
                for _ in 0..count {
                    let location = stockledger_core::LocationId::new();
                    ledger
                        .create_inventory(
                            NaturalKey::product(product).with_location(location),
                            50,
                            None,
                        )
                        .unwrap();
                }

                b.iter(|| {
                    black_box(ledger.get_available(black_box(product), None).unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_mutation_latency,
    bench_conditional_write_throughput,
    bench_availability_queries
);
criterion_main!(benches);

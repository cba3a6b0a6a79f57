use common::{AdditionalId, CartLineId, ProductId, UserId, VariantId};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::catalog::{AdditionalView, ProductView, ResolvedLine, VariantView};
use domain::{CartService, CheckoutService, CustomerInfo, Money, OrderSnapshot, pricing};
use store::{AdditionalRecord, InMemoryStore, ProductRecord, Store, VariantRecord};

fn resolved_lines(count: usize) -> Vec<ResolvedLine> {
    (0..count)
        .map(|i| ResolvedLine {
            line_id: CartLineId::new(i as i64 + 1),
            quantity: (i % 5) as u32 + 1,
            variant: VariantView {
                id: VariantId::new(i as i64),
                price: Money::from_cents(100 + i as i64),
                kit_amount: 1,
                product: ProductView {
                    id: ProductId::new((i % 20) as i64),
                    name: format!("Product {}", i % 20),
                    image_url: None,
                },
            },
            additionals: (0..(i % 3))
                .map(|a| AdditionalView {
                    id: AdditionalId::new(a as i64),
                    name: format!("Extra {a}"),
                    price: Money::from_cents(15),
                })
                .collect(),
            line_total: Money::zero(),
        })
        .collect()
}

fn bench_cart_total(c: &mut Criterion) {
    let mut group = c.benchmark_group("pricing/cart_total");
    for size in [10, 100, 1000] {
        let lines = resolved_lines(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &lines, |b, lines| {
            b.iter(|| pricing::cart_total(lines));
        });
    }
    group.finish();
}

fn bench_snapshot_round_trip(c: &mut Criterion) {
    let snapshot = OrderSnapshot::freeze(&resolved_lines(50));
    let document = snapshot.to_document().unwrap();

    c.bench_function("snapshot/freeze_50", |b| {
        let lines = resolved_lines(50);
        b.iter(|| OrderSnapshot::freeze(&lines).to_document().unwrap());
    });

    c.bench_function("snapshot/parse_validate_50", |b| {
        b.iter(|| {
            OrderSnapshot::parse(&document)
                .unwrap()
                .validated_lines()
                .unwrap()
        });
    });
}

fn bench_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    rt.block_on(async {
        store
            .upsert_product(ProductRecord::new(ProductId::new(1), "Pizza", 1_000_000))
            .await
            .unwrap();
        store
            .upsert_variant(VariantRecord {
                id: VariantId::new(11),
                product_id: ProductId::new(1),
                price_cents: 100,
                kit_amount: 1,
            })
            .await
            .unwrap();
        store
            .upsert_additional(AdditionalRecord {
                id: AdditionalId::new(21),
                name: "Cheese".to_string(),
                price_cents: 20,
            })
            .await
            .unwrap();
    });
    let carts = CartService::new(store.clone());
    let checkout = CheckoutService::new(store);
    let customer = CustomerInfo {
        full_name: "Bench User".to_string(),
        email: "bench@example.com".to_string(),
        phone: "+10000000000".to_string(),
        address: "1 Bench St".to_string(),
        comment: None,
    };

    c.bench_function("checkout/add_line_and_create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let token = carts.create_cart().await.unwrap();
                carts
                    .add_line(&token, VariantId::new(11), vec![AdditionalId::new(21)], 2)
                    .await
                    .unwrap();
                checkout
                    .create_order(&token, customer.clone(), Some(UserId::new()))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_cart_total, bench_snapshot_round_trip, bench_checkout);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use orderbook_matching_engine::{Order, OrderBook, OrderId, OrderType, Side};

fn gtc(id: OrderId, side: Side, price: u64, quantity: u64) -> Order {
    Order::new(OrderType::GoodTillCancel, id, side, price, quantity)
}

/// 50 levels a side, 10 orders per level, no crossing
fn seeded_book() -> OrderBook {
    let book = OrderBook::new();
    let mut id = 0;
    for level in 0..50 {
        for _ in 0..10 {
            id += 1;
            book.add_order(gtc(id, Side::Buy, 9_950 - level, 10)).unwrap();
            id += 1;
            book.add_order(gtc(id, Side::Sell, 10_050 + level, 10)).unwrap();
        }
    }
    book
}

fn bench_add_resting(c: &mut Criterion) {
    c.bench_function("add_resting_order", |b| {
        b.iter_batched(
            seeded_book,
            |book| {
                book.add_order(black_box(gtc(1_000_000, Side::Buy, 9_000, 10)))
                    .unwrap()
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_cancel(c: &mut Criterion) {
    c.bench_function("cancel_mid_queue", |b| {
        b.iter_batched(
            seeded_book,
            |book| book.cancel_order(black_box(501)).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");

    group.bench_function("market_buy_10_levels", |b| {
        b.iter_batched(
            seeded_book,
            |book| book.add_order(black_box(Order::new_market(1_000_000, Side::Buy, 1_000))).unwrap(),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("fill_or_kill_rejected", |b| {
        b.iter_batched(
            seeded_book,
            |book| {
                book.add_order(black_box(Order::new(
                    OrderType::FillOrKill,
                    1_000_000,
                    Side::Sell,
                    9_950,
                    1_000,
                )))
                .unwrap_err()
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_depth_snapshot(c: &mut Criterion) {
    let book = seeded_book();
    c.bench_function("get_order_infos", |b| b.iter(|| black_box(book.get_order_infos())));
}

criterion_group!(
    benches,
    bench_add_resting,
    bench_cancel,
    bench_sweep,
    bench_depth_snapshot
);
criterion_main!(benches);

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use shadow_strike::battle::{engine, AttributeVault, PlayerRegistry};
use shadow_strike::{Arena, ArenaConfig, LocalCoprocessor, PlayerId};

fn bench_engine_resolve(c: &mut Criterion) {
    let backend = LocalCoprocessor::default();
    let mut registry = PlayerRegistry::new();
    let mut vault = AttributeVault::new();
    let alice = PlayerId::derive("bench-alice");
    let bob = PlayerId::derive("bench-bob");
    registry.register(&mut vault, &backend, alice, "Alice", 0).unwrap();
    registry.register(&mut vault, &backend, bob, "Bob", 0).unwrap();

    c.bench_function("engine_resolve", |b| {
        b.iter(|| engine::resolve(&registry, &vault, &backend, black_box(alice), black_box(bob)))
    });
}

fn bench_arena_battle(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let arena = Arc::new(Arena::new(
        Arc::new(LocalCoprocessor::default()),
        ArenaConfig::default(),
    ));
    let alice = PlayerId::derive("bench-alice");
    let bob = PlayerId::derive("bench-bob");
    runtime.block_on(async {
        arena.register_player(alice, "Alice").await.unwrap();
        arena.register_player(bob, "Bob").await.unwrap();
    });

    c.bench_function("arena_battle_and_decrypt", |b| {
        b.to_async(&runtime).iter(|| {
            let arena = Arc::clone(&arena);
            async move {
                let resolved = arena.battle(alice, bob).await.unwrap();
                arena.request_decrypt(alice, resolved.battle_id).await.unwrap()
            }
        })
    });
}

criterion_group!(benches, bench_engine_resolve, bench_arena_battle);
criterion_main!(benches);

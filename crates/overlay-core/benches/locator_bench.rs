use criterion::{Criterion, criterion_group, criterion_main};
use overlay_core::{Identity, IdentityType, InetAddress, Locator};

fn make_locator() -> Locator {
    let id = Identity::generate(IdentityType::C25519).unwrap();
    let physical: Vec<InetAddress> = (1..=8)
        .map(|i| format!("10.0.0.{i}/9993").parse().unwrap())
        .collect();
    Locator::create(&id, physical, Vec::new(), 1_700_000_000_000).unwrap()
}

fn bench_locator(c: &mut Criterion) {
    let mut group = c.benchmark_group("locator");
    let loc = make_locator();
    let bytes = loc.bytes().to_vec();

    group.bench_function("decode", |b| {
        b.iter(|| Locator::decode(&bytes).unwrap());
    });

    group.bench_function("identity_parse", |b| {
        let text = loc.identity().to_string();
        b.iter(|| text.parse::<Identity>().unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_locator);
criterion_main!(benches);

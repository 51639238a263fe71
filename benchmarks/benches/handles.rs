use std::hash::BuildHasherDefault;
use std::pin::Pin;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use checkedref::{CanMakeCheckedPtr, CheckedPtr, CheckedRef, PackedCheckedPtr, PtrCounter};
use hashbrown::HashSet;
use rustc_hash::FxHasher;

struct Node {
    counter: PtrCounter,
}

unsafe impl CanMakeCheckedPtr for Node {
    fn ptr_counter(&self) -> &PtrCounter {
        &self.counter
    }
}

fn node() -> Pin<Box<Node>> {
    Box::pin(Node {
        counter: PtrCounter::new(),
    })
}

fn nodes(count: usize) -> Vec<Pin<Box<Node>>> {
    (0..count).map(|_| node()).collect()
}

fn bench_construct_drop(c: &mut Criterion) {
    let target = node();
    let mut group = c.benchmark_group("construct and drop");
    group.bench_function("CheckedPtr", |b| {
        b.iter(|| drop(CheckedPtr::<Node>::new(black_box(target.as_ref()))));
    });
    group.bench_function("PackedCheckedPtr", |b| {
        b.iter(|| drop(PackedCheckedPtr::<Node>::new(black_box(target.as_ref()))));
    });
    group.bench_function("CheckedRef", |b| {
        b.iter(|| drop(CheckedRef::<Node>::new(black_box(target.as_ref()))));
    });
    group.finish();
}

fn bench_clone(c: &mut Criterion) {
    let target = node();
    let ptr = CheckedPtr::<Node>::new(target.as_ref());
    let reference = CheckedRef::<Node>::new(target.as_ref());
    let mut group = c.benchmark_group("clone");
    group.bench_function("CheckedPtr", |b| {
        b.iter(|| ptr.clone());
    });
    group.bench_function("CheckedRef", |b| {
        b.iter(|| reference.clone());
    });
    group.finish();
}

fn bench_reassign(c: &mut Criterion) {
    let (first, second) = (node(), node());
    let mut ptr = CheckedPtr::<Node>::new(first.as_ref());
    let mut group = c.benchmark_group("reassign");
    group.bench_function("set between referents", |b| {
        b.iter(|| {
            ptr.set(black_box(second.as_ref()));
            ptr.set(black_box(first.as_ref()));
        });
    });
    group.bench_function("take and restore", |b| {
        b.iter(|| {
            let mut taken = ptr.take();
            ptr.take_from(black_box(&mut taken));
        });
    });
    group.bench_function("release_non_null and back", |b| {
        b.iter(|| {
            let reference = ptr.release_non_null();
            ptr = black_box(reference).release_ptr();
        });
    });
    group.finish();
}

fn bench_hash_set(c: &mut Criterion) {
    let targets = nodes(100);
    let mut group = c.benchmark_group("hashbrown set of CheckedPtr");
    for count in [10, 50, 100] {
        group.bench_function(format!("{count} pointers"), |b| {
            b.iter_batched(
                || {
                    let mut set: HashSet<CheckedPtr<Node>, BuildHasherDefault<FxHasher>> =
                        HashSet::default();
                    set.reserve(count);
                    set
                },
                |mut set| {
                    for target in &targets[..count] {
                        set.insert(CheckedPtr::new(target.as_ref()));
                    }
                    set
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_construct_drop,
    bench_clone,
    bench_reassign,
    bench_hash_set
);
criterion_main!(benches);

//! Tests for the comparator engine

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use common::{addr, model, model_with, Heap, BASE};
use memdiff_core::comparator::{Comparator, ComparatorConfig, RevmapEntry};
use memdiff_core::error::MemdiffError;
use memdiff_core::model::{
    Encoding, IntrusiveListField, ListPolicy, ModelOptions, Scheduler, SentinelArray, StringType, TypeId,
    TypeRegistry,
};
use memdiff_core::types::SymPath;

fn comparator(model: Arc<memdiff_core::model::Model>) -> Comparator
{
    Comparator::new(model, ComparatorConfig::default())
}

fn sorted(mut entries: Vec<RevmapEntry>) -> Vec<RevmapEntry>
{
    entries.sort_by_key(|entry| entry.address);
    entries
}

#[test]
fn test_concurrent_enqueue_dedups()
{
    let registry = Arc::new(TypeRegistry::new());
    let long = registry.register_basic("long", 8, Encoding::Signed).unwrap();
    let heap = Heap::new(0x10);
    let comparator = comparator(model(&registry, &heap, &heap));
    let accepted = AtomicUsize::new(0);

    thread::scope(|scope| {
        for worker in 0..8 {
            let comparator = &comparator;
            let accepted = &accepted;
            scope.spawn(move || {
                for index in 0..100u64 {
                    let path = SymPath::root("x").index(worker);
                    if comparator.enqueue_diff(path, long, addr(BASE + index * 8), addr(BASE)) {
                        accepted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    assert_eq!(accepted.load(Ordering::Relaxed), 100);
    assert_eq!(comparator.pending(), 100);
}

#[test]
fn test_fault_is_counted_and_isolated()
{
    let registry = Arc::new(TypeRegistry::new());
    let long = registry.register_basic("long", 8, Encoding::Signed).unwrap();
    let mut primary = Heap::new(0x10);
    primary.put_u64(BASE, 1).put_u64(BASE + 8, 2);
    let mut secondary = primary.clone();
    secondary.put_u64(BASE + 8, 3);
    let comparator = comparator(model(&registry, &primary, &secondary));

    comparator.enqueue_diff(SymPath::root("bad"), long, addr(0x40), addr(0x40));
    comparator.enqueue_diff(SymPath::root("same"), long, addr(BASE), addr(BASE));
    comparator.enqueue_diff(SymPath::root("changed"), long, addr(BASE + 8), addr(BASE + 8));

    let report = comparator.run(1).unwrap();
    assert_eq!(report.faults, 1);
    assert_eq!(report.processed, 3);
    assert_eq!(report.compared, 3);
    assert_eq!(report.differing, vec![SymPath::root("changed")]);
}

#[test]
fn test_struct_and_pointer_differences()
{
    let registry = Arc::new(TypeRegistry::new());
    let long = registry.register_basic("long", 8, Encoding::Signed).unwrap();
    let ptr = registry.register_pointer(Some(long)).unwrap();
    let st = registry
        .register_struct("cred", 32, &[("uid", 0, long), ("target", 8, ptr), ("none", 16, ptr), ("gone", 24, ptr)])
        .unwrap();

    let mut primary = Heap::new(0x100);
    primary.put_u64(BASE, 1000).put_u64(BASE + 8, BASE + 0x40).put_u64(BASE + 16, 0).put_u64(BASE + 24, BASE + 0x40);
    primary.put_u64(BASE + 0x40, 7).put_u64(BASE + 0x48, 7);
    let mut secondary = primary.clone();
    secondary.put_u64(BASE, 0).put_u64(BASE + 8, BASE + 0x48).put_u64(BASE + 24, 0);

    let comparator = comparator(model(&registry, &primary, &secondary));
    comparator.enqueue_diff(SymPath::root("cred"), st, addr(BASE), addr(BASE));
    let report = comparator.run(2).unwrap();

    let mut differing: Vec<String> = report.differing.iter().map(ToString::to_string).collect();
    differing.sort();
    assert_eq!(differing, vec!["cred.gone", "cred.target", "cred.uid"]);
    // struct, 4 members, 1 pointee
    assert_eq!(report.compared, 6);
    assert_eq!(report.faults, 0);
}

#[test]
fn test_string_comparison_ignores_trailing_bytes()
{
    let registry = Arc::new(TypeRegistry::new());
    let chr = registry.register_basic("char", 1, Encoding::Signed).unwrap();
    let comm = registry.register_array(chr, Some(4)).unwrap();
    StringType::over(&registry, comm).unwrap().takeover(&registry).unwrap();

    let mut primary = Heap::new(0x10);
    primary.put_bytes(BASE, &[72, 105, 0, 99]).put_bytes(BASE + 8, &[72, 105, 0, 0]);
    let mut secondary = Heap::new(0x10);
    secondary.put_bytes(BASE, &[72, 105, 0, 100]).put_bytes(BASE + 8, &[72, 111, 0, 0]);

    let comparator = comparator(model(&registry, &primary, &secondary));
    comparator.enqueue_diff(SymPath::root("a"), comm, addr(BASE), addr(BASE));
    comparator.enqueue_diff(SymPath::root("b"), comm, addr(BASE + 8), addr(BASE + 8));
    let report = comparator.run(1).unwrap();

    assert_eq!(report.differing, vec![SymPath::root("b")]);
}

#[test]
fn test_sentinel_length_change_is_a_difference()
{
    let registry = Arc::new(TypeRegistry::new());
    let byte = registry.register_basic("u8", 1, Encoding::Unsigned).unwrap();
    let array = registry.register_array(byte, None).unwrap();
    SentinelArray::over(&registry, array).unwrap().takeover(&registry).unwrap();

    let mut primary = Heap::new(0x10);
    primary.put_bytes(BASE, &[1, 2, 3, 0]);
    let mut secondary = Heap::new(0x10);
    secondary.put_bytes(BASE, &[1, 2, 0, 0]);

    let comparator = comparator(model(&registry, &primary, &secondary));
    comparator.enqueue_diff(SymPath::root("ops"), array, addr(BASE), addr(BASE));
    let report = comparator.run(1).unwrap();

    assert_eq!(report.differing, vec![SymPath::root("ops")]);
    // the array plus the two paired elements
    assert_eq!(report.compared, 3);
}

struct ListSetup
{
    registry: Arc<TypeRegistry>,
    task: TypeId,
    primary: Heap,
    secondary: Heap,
}

const TASK_A: u64 = BASE + 0x40;
const TASK_B: u64 = BASE + 0x80;

fn list_setup() -> ListSetup
{
    let registry = Arc::new(TypeRegistry::new());
    let int = registry.register_basic("int", 4, Encoding::Signed).unwrap();
    let void = registry.register_pointer(None).unwrap();
    let list_head = registry
        .register_struct("list_head", 16, &[("next", 0, void), ("prev", 8, void)])
        .unwrap();
    let task = registry
        .register_struct("task_struct", 24, &[("pid", 0, int), ("tasks", 8, list_head)])
        .unwrap();
    let tasks = registry.member_of(task, "tasks").unwrap();
    IntrusiveListField::over(&registry, task, "tasks", None)
        .unwrap()
        .takeover(&registry, tasks)
        .unwrap();

    let mut primary = Heap::new(0x100);
    primary.put_i32(TASK_A, 1).put_u64(TASK_A + 8, TASK_B + 8).put_u64(TASK_A + 16, 0);
    primary.put_i32(TASK_B, 2).put_u64(TASK_B + 8, 0).put_u64(TASK_B + 16, TASK_A + 8);
    let mut secondary = primary.clone();
    secondary.put_i32(TASK_B, 99);

    ListSetup {
        registry,
        task,
        primary,
        secondary,
    }
}

#[test]
fn test_list_fields_are_skipped_by_default()
{
    let setup = list_setup();
    let comparator = comparator(model(&setup.registry, &setup.primary, &setup.secondary));
    comparator.enqueue_diff(SymPath::root("init_task"), setup.task, addr(TASK_A), addr(TASK_A));
    let report = comparator.run(1).unwrap();

    // struct, pid, tasks; nothing behind the list
    assert_eq!(report.compared, 3);
    assert!(report.differing.is_empty());
}

#[test]
fn test_list_fields_followed_on_request()
{
    let setup = list_setup();
    let options = ModelOptions {
        list_policy: ListPolicy::Follow,
        ..ModelOptions::default()
    };
    let comparator = comparator(model_with(&setup.registry, &setup.primary, &setup.secondary, options));
    comparator.enqueue_diff(SymPath::root("init_task"), setup.task, addr(TASK_A), addr(TASK_A));
    let report = comparator.run(2).unwrap();

    // A, A.pid, A.tasks, B, B.pid, B.tasks
    assert_eq!(report.compared, 6);
    assert_eq!(report.differing, vec![SymPath::root("init_task").member("tasks").member("next").member("pid")]);
}

#[test]
fn test_list_peek_counts_unreadable_headers()
{
    let setup = list_setup();
    let unmapped = addr(BASE + 0x10000);
    let mut faults = Vec::new();
    for list_policy in [ListPolicy::Skip, ListPolicy::Peek] {
        let options = ModelOptions {
            list_policy,
            ..ModelOptions::default()
        };
        let comparator = comparator(model_with(&setup.registry, &setup.primary, &setup.secondary, options));
        comparator.enqueue_diff(SymPath::root("ghost_task"), setup.task, unmapped, unmapped);
        let report = comparator.run(1).unwrap();
        assert_eq!(report.compared, 3);
        assert!(report.is_complete());
        faults.push(report.faults);
    }
    // pid faults under both; the list header only when peeked
    assert_eq!(faults, vec![1, 2]);
}

#[test]
fn test_list_peek_schedules_nothing()
{
    let setup = list_setup();
    let options = ModelOptions {
        list_policy: ListPolicy::Peek,
        ..ModelOptions::default()
    };
    let comparator = comparator(model_with(&setup.registry, &setup.primary, &setup.secondary, options));
    comparator.enqueue_diff(SymPath::root("init_task"), setup.task, addr(TASK_A), addr(TASK_A));
    let report = comparator.run(1).unwrap();

    assert_eq!(report.compared, 3);
    assert_eq!(report.faults, 0);
    assert!(report.differing.is_empty());
}

#[test]
fn test_revmap_struct_round_trip()
{
    let registry = Arc::new(TypeRegistry::new());
    let long = registry.register_basic("long", 8, Encoding::Signed).unwrap();
    let st = registry.register_struct("timer", 16, &[("expires", 0, long), ("data", 8, long)]).unwrap();
    let heap = Heap::new(0x20);
    let model = model(&registry, &heap, &heap);
    let size = model.extent(st, addr(BASE)).unwrap();
    assert_eq!(size, 16);

    let comparator = comparator(model);
    assert!(comparator.enqueue_rev(SymPath::root("timer"), st, addr(BASE), size));
    let report = comparator.revmap(2).unwrap();
    assert_eq!(
        report.entries,
        vec![RevmapEntry {
            address: addr(BASE),
            size: 16,
            ty: st,
        }]
    );
    assert_eq!(report.faults, 0);

    assert!(!comparator.enqueue_rev(SymPath::root("again"), st, addr(BASE), size));
    let report = comparator.revmap(1).unwrap();
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.lookup(addr(BASE + 15)).map(|entry| entry.ty), Some(st));
    assert!(report.lookup(addr(BASE + 16)).is_none());
}

#[test]
fn test_revmap_follows_pointers_and_records_strings()
{
    let registry = Arc::new(TypeRegistry::new());
    let long = registry.register_basic("long", 8, Encoding::Signed).unwrap();
    let chr = registry.register_basic("char", 1, Encoding::Signed).unwrap();
    let name = registry.register_pointer(Some(chr)).unwrap();
    StringType::over(&registry, name).unwrap().takeover(&registry).unwrap();
    let node = registry.declare("node");
    let next = registry.register_pointer(Some(node)).unwrap();
    registry
        .define_struct(node, 24, &[("value", 0, long), ("next", 8, next), ("name", 16, name)])
        .unwrap();

    let first = BASE;
    let second = BASE + 0x20;
    let text = BASE + 0x40;
    let mut heap = Heap::new(0x50);
    heap.put_u64(first, 1).put_u64(first + 8, second).put_u64(first + 16, text);
    heap.put_u64(second, 2).put_u64(second + 8, 0).put_u64(second + 16, 0);
    heap.put_bytes(text, b"init\0");

    let comparator = comparator(model(&registry, &heap, &heap));
    comparator.enqueue_rev(SymPath::root("head"), node, addr(first), 24);
    let report = comparator.revmap(4).unwrap();

    assert_eq!(report.faults, 0);
    assert_eq!(
        sorted(report.entries),
        vec![
            RevmapEntry {
                address: addr(first),
                size: 24,
                ty: node,
            },
            RevmapEntry {
                address: addr(second),
                size: 24,
                ty: node,
            },
            RevmapEntry {
                address: addr(text),
                size: 5,
                ty: name,
            },
        ]
    );
}

#[test]
fn test_revmap_records_list_fields()
{
    let setup = list_setup();
    let tasks = setup.registry.member_of(setup.task, "tasks").unwrap();
    let comparator = comparator(model(&setup.registry, &setup.primary, &setup.primary));
    comparator.enqueue_rev(SymPath::root("init_task"), setup.task, addr(TASK_A), 24);
    let report = comparator.revmap(1).unwrap();

    assert_eq!(
        sorted(report.entries),
        vec![
            RevmapEntry {
                address: addr(TASK_A),
                size: 24,
                ty: setup.task,
            },
            RevmapEntry {
                address: addr(TASK_A + 8),
                size: 16,
                ty: tasks,
            },
        ]
    );
}

#[test]
fn test_revmap_null_pointer_task_is_a_fault()
{
    let registry = Arc::new(TypeRegistry::new());
    let long = registry.register_basic("long", 8, Encoding::Signed).unwrap();
    let ptr = registry.register_pointer(Some(long)).unwrap();
    let heap = Heap::new(0x10);

    let comparator = comparator(model(&registry, &heap, &heap));
    comparator.enqueue_rev(SymPath::root("slot"), ptr, addr(BASE), 8);
    let report = comparator.revmap(1).unwrap();

    assert_eq!(report.faults, 1);
    assert_eq!(report.entries.len(), 1);
}

/// `struct s { opaque *p; long x; }` where `opaque` is never defined and
/// `x` differs between the images
fn opaque_setup() -> (Arc<TypeRegistry>, TypeId, Heap, Heap)
{
    let registry = Arc::new(TypeRegistry::new());
    let long = registry.register_basic("long", 8, Encoding::Signed).unwrap();
    let opaque = registry.declare("opaque");
    let ptr = registry.register_pointer(Some(opaque)).unwrap();
    let st = registry.register_struct("s", 16, &[("p", 0, ptr), ("x", 8, long)]).unwrap();

    let mut primary = Heap::new(0x40);
    primary.put_u64(BASE, BASE + 0x20).put_u64(BASE + 8, 1);
    let mut secondary = primary.clone();
    secondary.put_u64(BASE + 8, 2);
    (registry, st, primary, secondary)
}

#[test]
fn test_worker_error_keeps_report()
{
    let (registry, st, primary, secondary) = opaque_setup();
    let comparator = comparator(model(&registry, &primary, &secondary));
    comparator.enqueue_diff(SymPath::root("s"), st, addr(BASE), addr(BASE));
    let report = comparator.run(1).unwrap();

    // s, s.p, s.x, then the opaque pointee stops the worker
    assert_eq!(report.compared, 4);
    assert_eq!(report.processed, 4);
    assert_eq!(report.faults, 0);
    assert_eq!(report.differing, vec![SymPath::root("s").member("x")]);

    assert!(!report.is_complete());
    assert_eq!(report.worker_failures.len(), 1);
    let failure = &report.worker_failures[0];
    assert_eq!(failure.worker, 0);
    assert_eq!(failure.abandoned, 0);
    assert!(matches!(*failure.error, MemdiffError::Incomplete(_)));
    assert!(!failure.error.is_fault());
}

#[test]
fn test_revmap_worker_error_keeps_entries()
{
    let (registry, st, primary, secondary) = opaque_setup();
    let comparator = comparator(model(&registry, &primary, &secondary));
    comparator.enqueue_rev(SymPath::root("s"), st, addr(BASE), 16);
    let report = comparator.revmap(1).unwrap();

    assert_eq!(report.entries, vec![RevmapEntry { address: addr(BASE), size: 16, ty: st }]);
    assert_eq!(report.worker_failures.len(), 1);
    assert!(matches!(*report.worker_failures[0].error, MemdiffError::Incomplete(_)));
}

#[test]
fn test_worker_error_reports_abandoned_batch()
{
    let registry = Arc::new(TypeRegistry::new());
    let long = registry.register_basic("long", 8, Encoding::Signed).unwrap();
    let ghost = registry.declare("ghost");
    let heap = Heap::new(0x40);

    let comparator = comparator(model(&registry, &heap, &heap));
    comparator.enqueue_diff(SymPath::root("a"), long, addr(BASE), addr(BASE));
    comparator.enqueue_diff(SymPath::root("ghost"), ghost, addr(BASE), addr(BASE));
    comparator.enqueue_diff(SymPath::root("b"), long, addr(BASE + 8), addr(BASE + 8));
    comparator.enqueue_diff(SymPath::root("c"), long, addr(BASE + 16), addr(BASE + 16));
    let report = comparator.run(1).unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.compared, 4);
    assert_eq!(report.worker_failures[0].abandoned, 2);
}

const FAN_OUT: u64 = 2000;
const NODES: u64 = BASE + 0x4000;

/// `node *table[FAN_OUT]`, every entry pointing at its own node; every
/// tenth node has a different `b` in the secondary image
fn fan_out_setup() -> (Arc<TypeRegistry>, TypeId, Heap, Heap)
{
    let registry = Arc::new(TypeRegistry::new());
    let long = registry.register_basic("long", 8, Encoding::Signed).unwrap();
    let node = registry.register_struct("node", 16, &[("a", 0, long), ("b", 8, long)]).unwrap();
    let ptr = registry.register_pointer(Some(node)).unwrap();
    let table = registry.register_array(ptr, Some(FAN_OUT)).unwrap();

    let mut primary = Heap::new(0xc000);
    for index in 0..FAN_OUT {
        let node_address = NODES + index * 16;
        primary.put_u64(BASE + index * 8, node_address);
        primary.put_u64(node_address, index).put_u64(node_address + 8, index * 2);
    }
    let mut secondary = primary.clone();
    for index in (0..FAN_OUT).step_by(10) {
        secondary.put_u64(NODES + index * 16 + 8, u64::MAX);
    }
    (registry, table, primary, secondary)
}

fn assert_fan_out_complete(workers: usize, batch_size: usize)
{
    let (registry, table, primary, secondary) = fan_out_setup();
    let config = ComparatorConfig::new().workers(workers).batch_size(batch_size);
    let comparator = Comparator::new(model(&registry, &primary, &secondary), config);

    // a single seed: the other workers are likely to find the queue empty
    // and exit before the first one has expanded it
    comparator.enqueue_diff(SymPath::root("table"), table, addr(BASE), addr(BASE));
    let report = comparator.run_configured().unwrap();

    // table, FAN_OUT pointers, FAN_OUT nodes, 2 * FAN_OUT members
    let expected = 1 + 4 * FAN_OUT as usize;
    assert_eq!(report.compared, expected);
    assert_eq!(report.processed, expected);
    assert_eq!(report.faults, 0);
    assert_eq!(comparator.pending(), 0);
    assert_eq!(report.differing.len(), (FAN_OUT / 10) as usize);
    assert!(report
        .differing
        .iter()
        .all(|path| path.as_str().starts_with("table[") && path.as_str().ends_with("]*.b")));
}

#[test]
fn test_high_fan_out_many_workers()
{
    assert_fan_out_complete(8, 100);
}

#[test]
fn test_high_fan_out_tiny_batches()
{
    assert_fan_out_complete(16, 1);
}

#[test]
fn test_high_fan_out_single_worker()
{
    assert_fan_out_complete(1, 100);
}

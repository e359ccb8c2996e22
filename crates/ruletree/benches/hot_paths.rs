use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ruletree::names::{AND, GREATER, IS_IN_LIST, OR};
use ruletree::path::set_at;
use ruletree::validate::PathEvaluations;
use ruletree::validate::local::validate_local;
use ruletree::{EditIntent, Editor, EditorConfig, Node, NodePath, RootKind, build_view_model, wire};

/// OR of `branches` AND groups with `conditions` comparisons each
fn large_trigger(branches: usize, conditions: usize) -> Arc<Node> {
    let branch = |b: usize| {
        Node::n_ary(
            AND,
            (0..conditions)
                .map(|c| {
                    if c % 2 == 0 {
                        Node::binary(GREATER, Node::payload(format!("f{b}_{c}")), Node::constant(c as i64))
                    } else {
                        Node::binary(IS_IN_LIST, Node::payload("country"), Node::constant(vec!["FR", "DE"]))
                    }
                })
                .collect(),
        )
    };
    Node::n_ary(OR, (0..branches).map(branch).collect())
}

fn bench_build_view_model(c: &mut Criterion) {
    let tree = large_trigger(20, 50);
    let errors = validate_local(&tree, RootKind::Trigger, None);
    let evaluations = PathEvaluations::new();

    c.bench_function("build_view_model_1k_conditions", |b| {
        b.iter(|| build_view_model(black_box(&tree), black_box(&errors), black_box(&evaluations)))
    });
}

fn bench_set_at(c: &mut Criterion) {
    let tree = large_trigger(20, 50);
    let path = NodePath::root().child(10).child(25).child(1);

    c.bench_function("set_at_deep_leaf", |b| {
        b.iter(|| set_at(black_box(&tree), black_box(&path), Node::constant(1)).unwrap())
    });
}

fn bench_local_validation(c: &mut Criterion) {
    let tree = large_trigger(20, 50);

    c.bench_function("validate_local_1k_conditions", |b| {
        b.iter(|| validate_local(black_box(&tree), RootKind::Trigger, None))
    });
}

fn bench_editor_apply(c: &mut Criterion) {
    let tree = large_trigger(20, 50);

    c.bench_function("editor_append_then_view", |b| {
        b.iter(|| {
            let mut editor = Editor::new(tree.clone(), EditorConfig::new().with_root_kind(RootKind::Trigger));
            editor
                .apply(EditIntent::AppendChild {
                    path: NodePath::root().child(0),
                    node: Node::binary(GREATER, Node::payload("amount"), Node::constant(1)),
                })
                .unwrap();
            editor.view()
        })
    });
}

fn bench_wire_roundtrip(c: &mut Criterion) {
    let tree = large_trigger(20, 50);
    let json = wire::serialize(&tree).unwrap();

    c.bench_function("wire_deserialize_1k_conditions", |b| {
        b.iter(|| wire::deserialize(black_box(&json)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_build_view_model,
    bench_set_at,
    bench_local_validation,
    bench_editor_apply,
    bench_wire_roundtrip
);
criterion_main!(benches);

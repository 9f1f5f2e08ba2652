use proptest::prelude::*;
use raygraph_model::normalize::WEIGHT_TOLERANCE;
use raygraph_model::{build_graph, prepare, NodeSpec, OutputSpec};

fn node_with_weights(weights: &[f64], error_term: f64) -> NodeSpec {
    let mut node = NodeSpec::leaf("n1", "Start").with_error_term(error_term);
    for (i, w) in weights.iter().enumerate() {
        node = node.with_output(OutputSpec::with_probability(
            format!("o{i}"),
            format!("branch {i}"),
            *w,
        ));
    }
    node
}

proptest! {
    // Any non-degenerate weight vector normalizes to a proper distribution.
    #[test]
    fn prop_distribution_sums_to_one(
        weights in proptest::collection::vec(0.0..100.0f64, 1..12),
        error_term in 0.0..10.0f64,
    ) {
        prop_assume!(weights.iter().sum::<f64>() + error_term > 0.0);

        let mut graph = build_graph(&[node_with_weights(&weights, error_term)], &[]).unwrap();
        prepare(&mut graph);

        let root = graph.node(graph.root());
        let total: f64 = root.branches.iter().map(|b| b.weight).sum::<f64>() + root.error_term;
        prop_assert!((total - 1.0).abs() < WEIGHT_TOLERANCE);
        prop_assert!(root.branches.iter().all(|b| b.weight >= 0.0));
    }

    // A second prepare leaves the distribution where the first put it.
    #[test]
    fn prop_prepare_is_idempotent(
        weights in proptest::collection::vec(0.0..100.0f64, 1..12),
        error_term in 0.0..10.0f64,
    ) {
        let mut graph = build_graph(&[node_with_weights(&weights, error_term)], &[]).unwrap();
        prepare(&mut graph);
        let once: Vec<f64> = graph.node(graph.root()).branches.iter().map(|b| b.weight).collect();
        let term_once = graph.node(graph.root()).error_term;

        prepare(&mut graph);
        let root = graph.node(graph.root());
        for (a, b) in once.iter().zip(root.branches.iter().map(|b| b.weight)) {
            prop_assert!((a - b).abs() < WEIGHT_TOLERANCE);
        }
        prop_assert!((term_once - root.error_term).abs() < WEIGHT_TOLERANCE);
    }

    // All-zero weights fall back to an equal split, never NaN.
    #[test]
    fn prop_degenerate_falls_back_to_equal(count in 1usize..12) {
        let weights = vec![0.0; count];
        let mut graph = build_graph(&[node_with_weights(&weights, 0.0)], &[]).unwrap();
        prepare(&mut graph);

        let root = graph.node(graph.root());
        let expected = 1.0 / count as f64;
        for branch in &root.branches {
            prop_assert!((branch.weight - expected).abs() < WEIGHT_TOLERANCE);
        }
        prop_assert_eq!(root.error_term, 0.0);
    }
}

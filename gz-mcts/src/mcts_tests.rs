use gz_core::{Move, Position};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;

use crate::{
    Evaluation, Evaluator, LeafSelection, Mcts, MctsConfig, MctsError, SearchTree,
    UniformEvaluator,
};

fn no_noise() -> MctsConfig {
    MctsConfig {
        dirichlet_epsilon: 0.0,
        ..MctsConfig::default()
    }
}

fn tree(size: usize, cfg: MctsConfig) -> Mcts {
    Mcts::new(cfg, Position::new(size, 0.5).unwrap()).unwrap()
}

/// One leaf at a time until the root gained `readouts` visits.
fn search(t: &mut Mcts, readouts: u32) {
    let target = t.root_visits() + readouts;
    while t.root_visits() < target {
        match t.select_leaf().unwrap() {
            LeafSelection::Pending(leaf) => {
                let e = UniformEvaluator.evaluate(t.leaf_position(&leaf)).unwrap();
                t.incorporate_results(leaf, e).unwrap();
            }
            LeafSelection::Collision(leaf) => t.revert_virtual_loss(leaf),
            LeafSelection::Terminal => {}
        }
    }
}

#[test]
fn first_selection_is_the_root() {
    let mut t = tree(5, no_noise());
    let leaf = match t.select_leaf().unwrap() {
        LeafSelection::Pending(l) => l,
        other => panic!("expected pending root, got {other:?}"),
    };
    assert_eq!(leaf.node(), 0);
    assert_eq!(leaf.depth(), 0);

    let e = Evaluation {
        probs: vec![1.0 / 26.0; 26],
        value: -0.25,
    };
    t.incorporate_results(leaf, e).unwrap();
    assert!(t.is_root_expanded());
    assert_eq!(t.root_visits(), 1);
    assert_eq!(t.root_raw_value(), -0.25);
    assert_eq!(t.root_q(), -0.25);
}

#[test]
fn virtual_loss_spreads_a_batch_and_is_released() {
    let mut t = tree(5, no_noise());
    search(&mut t, 1);

    let mut leaves = Vec::new();
    for _ in 0..4 {
        match t.select_leaf().unwrap() {
            LeafSelection::Pending(l) => leaves.push(l),
            other => panic!("unexpected {other:?}"),
        }
    }
    let mut nodes: Vec<_> = leaves.iter().map(|l| l.node()).collect();
    nodes.sort();
    nodes.dedup();
    assert_eq!(nodes.len(), 4, "batch must not repeat a leaf");
    assert_eq!(t.root().vl_sum, 4);

    let positions: Vec<&Position> = leaves.iter().map(|l| t.leaf_position(l)).collect();
    let evals = UniformEvaluator.evaluate_batch(&positions).unwrap();
    for (leaf, e) in leaves.into_iter().zip(evals) {
        t.incorporate_results(leaf, e).unwrap();
    }
    assert_eq!(t.root().vl_sum, 0);
    assert!(t.root().vl_n.iter().all(|&n| n == 0));
    assert!(t.root().vl_w.iter().all(|&w| w == 0.0));
    assert_eq!(t.root_visits(), 5);
}

#[test]
fn revert_restores_statistics() {
    let mut t = tree(5, no_noise());
    search(&mut t, 1);
    let before = t.root().n.clone();

    let leaf = match t.select_leaf().unwrap() {
        LeafSelection::Pending(l) => l,
        other => panic!("unexpected {other:?}"),
    };
    let node = leaf.node();
    t.revert_virtual_loss(leaf);

    assert_eq!(t.root().vl_sum, 0);
    assert_eq!(t.root().n, before);
    assert_eq!(t.root_visits(), 1);
    assert!(!t.node(node).pending);
}

#[test]
fn malformed_evaluation_is_rejected_after_releasing_virtual_loss() {
    let mut t = tree(5, no_noise());
    search(&mut t, 1);

    let leaf = match t.select_leaf().unwrap() {
        LeafSelection::Pending(l) => l,
        other => panic!("unexpected {other:?}"),
    };
    let node = leaf.node();
    let err = t
        .incorporate_results(
            leaf,
            Evaluation {
                probs: vec![0.5; 3],
                value: 0.0,
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        MctsError::MalformedEvaluation {
            expected: 26,
            got: 3
        }
    ));
    assert_eq!(t.root().vl_sum, 0);
    assert!(!t.node(node).pending);
    assert!(!t.node(node).is_expanded);

    let leaf = match t.select_leaf().unwrap() {
        LeafSelection::Pending(l) => l,
        other => panic!("unexpected {other:?}"),
    };
    let err = t
        .incorporate_results(
            leaf,
            Evaluation {
                probs: vec![1.0 / 26.0; 26],
                value: f32::NAN,
            },
        )
        .unwrap_err();
    assert!(matches!(err, MctsError::NonFiniteEvaluation));
    assert_eq!(t.root().vl_sum, 0);
}

#[test]
fn same_leaf_twice_without_virtual_loss_is_a_collision() {
    let mut t = tree(
        5,
        MctsConfig {
            virtual_loss: 0.0,
            ..no_noise()
        },
    );
    search(&mut t, 1);

    let first = match t.select_leaf().unwrap() {
        LeafSelection::Pending(l) => l,
        other => panic!("unexpected {other:?}"),
    };
    let second = match t.select_leaf().unwrap() {
        LeafSelection::Collision(l) => l,
        other => panic!("expected collision, got {other:?}"),
    };
    assert_eq!(first.node(), second.node());
    assert_eq!(t.stats().pending_collisions, 1);

    // Reverting the collision must not clear the original claim.
    t.revert_virtual_loss(second);
    assert!(t.node(first.node()).pending);

    let e = UniformEvaluator.evaluate(t.leaf_position(&first)).unwrap();
    t.incorporate_results(first, e).unwrap();
    assert_eq!(t.root_visits(), 2);
}

#[test]
fn uniform_search_visits_every_root_move_once() {
    let mut t = tree(5, no_noise());
    search(&mut t, 1);
    search(&mut t, 26);

    let pi = t.children_as_pi(false);
    assert_eq!(pi.len(), 26);
    for &p in &pi {
        assert!((p - 1.0 / 26.0).abs() < 1e-6, "pi={pi:?}");
    }
    assert_eq!(t.root_visits(), 27);
}

#[test]
fn pi_is_a_distribution_over_legal_moves() {
    let pos = Position::new(5, 0.5)
        .unwrap()
        .play_move(Move::Play(12))
        .unwrap();
    let mut t = Mcts::new(no_noise(), pos).unwrap();
    search(&mut t, 40);

    for squash in [false, true] {
        let pi = t.children_as_pi(squash);
        let sum: f32 = pi.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "sum={sum}");
        assert_eq!(pi[12], 0.0, "occupied point must have no mass");
        assert!(pi.iter().all(|&p| p >= 0.0));
    }
}

#[test]
fn noise_perturbs_only_legal_priors() {
    let pos = Position::new(5, 0.5)
        .unwrap()
        .play_move(Move::Play(12))
        .unwrap();
    let mut t = Mcts::new(
        MctsConfig {
            dirichlet_epsilon: 0.5,
            ..MctsConfig::default()
        },
        pos,
    )
    .unwrap();
    search(&mut t, 1);
    let before = t.root().p.clone();

    let mut rng = ChaCha8Rng::seed_from_u64(3);
    t.inject_noise(&mut rng);
    let after = &t.root().p;

    assert_ne!(&before, after);
    assert_eq!(after[12], 0.0);
    let sum: f32 = after.iter().sum();
    assert!((sum - 1.0).abs() < 1e-4, "sum={sum}");
}

#[test]
fn zero_epsilon_leaves_priors_alone() {
    let mut t = tree(5, no_noise());
    search(&mut t, 1);
    let before = t.root().p.clone();
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    t.inject_noise(&mut rng);
    assert_eq!(before, t.root().p);
}

#[test]
fn play_move_keeps_the_chosen_subtree() {
    let mut t = tree(5, no_noise());
    search(&mut t, 1);
    search(&mut t, 120);

    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let mv = t.pick_move(&mut rng);
    let a = mv.to_index(5);
    let edge_visits = t.root().n[a];
    let child_visits = t.root_child(a).unwrap().visits;
    assert_eq!(edge_visits, child_visits);
    let before_nodes = t.node_count();

    t.play_move(mv).unwrap();
    assert_eq!(t.root_visits(), child_visits);
    assert_eq!(t.root_position().n(), 1);
    assert!(t.node_count() < before_nodes);
    assert!(t.is_root_expanded());
}

#[test]
fn play_move_rejects_illegal_moves() {
    let mut t = tree(5, no_noise());
    search(&mut t, 1);
    t.play_move(Move::Play(6)).unwrap();
    let err = t.play_move(Move::Play(6)).unwrap_err();
    assert!(matches!(err, MctsError::IllegalMove { .. }));
    let err = t.play_move(Move::Play(99)).unwrap_err();
    assert!(matches!(err, MctsError::IllegalMove { .. }));
}

#[test]
fn terminal_leaves_are_backed_up_with_the_score() {
    // Black passed; White passing too ends the game, which White wins on komi.
    let pos = Position::new(2, 0.5).unwrap().play_move(Move::Pass).unwrap();
    let mut t = Mcts::new(no_noise(), pos).unwrap();
    search(&mut t, 1);
    search(&mut t, 5);

    assert!(t.stats().terminal_backups >= 1);
    let pass = Move::Pass.to_index(2);
    assert!(t.root().n[pass] >= 1);
    assert_eq!(t.root().edge_q(pass), 1.0);
}

#[test]
fn greedy_pick_after_cutoff_takes_most_visited() {
    let mut t = tree(
        5,
        MctsConfig {
            softpick_move_cutoff: 0,
            ..no_noise()
        },
    );
    search(&mut t, 1);
    search(&mut t, 60);
    let root = t.root();
    let best = (0..26).max_by_key(|&a| (root.n[a], std::cmp::Reverse(a))).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    assert_eq!(t.pick_move(&mut rng).to_index(5), best);
}

#[test]
fn resign_compares_root_q() {
    let mut t = tree(5, no_noise());
    let leaf = match t.select_leaf().unwrap() {
        LeafSelection::Pending(l) => l,
        other => panic!("unexpected {other:?}"),
    };
    t.incorporate_results(
        leaf,
        Evaluation {
            probs: vec![1.0 / 26.0; 26],
            value: -0.95,
        },
    )
    .unwrap();
    assert!(t.should_resign(-0.9));
    assert!(!t.should_resign(-0.99));
}

#[test]
fn invalid_config_is_rejected() {
    let pos = Position::new(5, 0.5).unwrap();
    for cfg in [
        MctsConfig {
            c_puct: 0.0,
            ..MctsConfig::default()
        },
        MctsConfig {
            dirichlet_alpha: -1.0,
            ..MctsConfig::default()
        },
        MctsConfig {
            dirichlet_epsilon: 1.5,
            ..MctsConfig::default()
        },
        MctsConfig {
            virtual_loss: f32::NAN,
            ..MctsConfig::default()
        },
    ] {
        assert!(matches!(
            Mcts::new(cfg, pos.clone()),
            Err(MctsError::InvalidConfig { .. })
        ));
    }
}

#[test]
fn describe_lists_visited_moves() {
    let mut t = tree(5, no_noise());
    search(&mut t, 1);
    search(&mut t, 10);
    let d = t.describe();
    assert!(d.starts_with("root: N=11"), "{d}");
    assert!(d.contains("A5"), "{d}");
}

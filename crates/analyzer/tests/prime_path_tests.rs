use wayfinder_analyzer::{CfgBuilder, ControlFlowGraph, NodeId};

fn build(source: &str) -> ControlFlowGraph {
    CfgBuilder::new().build_source(source, "paths").unwrap()
}

fn ids(path: &[u32]) -> Vec<NodeId> {
    path.iter().map(|&id| NodeId(id)).collect()
}

fn is_subpath(path: &[NodeId], candidate: &[NodeId]) -> bool {
    path.windows(candidate.len()).any(|window| window == candidate)
}

#[test]
fn test_straight_line_has_single_prime_path() {
    // 1:entry  2:a = 1  3:b = 2  4:exit
    let graph = build("a = 1\nb = 2\n");
    assert_eq!(graph.prime_paths(), vec![ids(&[1, 2, 3, 4])]);
}

#[test]
fn test_diamond_has_one_prime_path_per_branch() {
    let source = "
if c:
    a = 1
else:
    a = 2
b = a
";
    // 1:entry  2:if c  3:a = 1  4:a = 2  5:b = a  6:exit
    let graph = build(source);

    let prime = graph.prime_paths();
    assert_eq!(prime.len(), 2);
    assert!(prime.contains(&ids(&[1, 2, 3, 5, 6])));
    assert!(prime.contains(&ids(&[1, 2, 4, 5, 6])));
}

#[test]
fn test_simple_paths_include_every_trivial_path() {
    let graph = build("if c:\n    a = 1\nb = 2\n");

    let simple = graph.simple_paths();
    for id in graph.sorted_ids() {
        assert!(simple.contains(&vec![id]), "missing trivial path for {id:?}");
    }
}

#[test]
fn test_every_simple_path_has_no_repeated_vertex() {
    let graph = build("while c:\n    if d:\n        break\n    x = 1\n");

    for path in graph.simple_paths() {
        let mut sorted = path.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), path.len(), "repeated vertex in {path:?}");
    }
}

#[test]
fn test_no_prime_path_is_contained_in_another() {
    let sources = [
        "x = 1\n",
        "if c:\n    a = 1\nelse:\n    a = 2\nb = a\n",
        "while c:\n    x = 1\n",
        "for i in xs:\n    if i:\n        continue\n    y = i\n",
    ];

    for source in sources {
        let graph = build(source);
        let prime = graph.prime_paths();
        assert!(!prime.is_empty());

        for (i, a) in prime.iter().enumerate() {
            for (j, b) in prime.iter().enumerate() {
                if i != j {
                    assert!(!is_subpath(b, a), "{a:?} is contained in {b:?} for {source:?}");
                }
            }
        }
    }
}

#[test]
fn test_loop_prime_paths_cover_the_back_edge() {
    // 1:entry  2:while c  3:exit point  4:x = 1  5:exit
    let graph = build("while c:\n    x = 1\n");

    let prime = graph.prime_paths();
    // body -> header -> out is a prime path of its own
    assert!(prime.contains(&ids(&[4, 2, 3, 5])));
    // entering and running the body once
    assert!(prime.contains(&ids(&[1, 2, 4])));
}

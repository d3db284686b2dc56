use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

/// Walk every node reachable from the root and check the invariants that
/// saving must establish.
fn validate_tree<S: ByteStore>(reader: &Reader<S>) {
    let mut stack = vec![reader.root().clone()];
    while let Some(node) = stack.pop() {
        if node.is_leaf() {
            assert!(node.has_output(), "leaf at {} has no output", node.fp());
            continue;
        }
        let count = node.children_count();
        assert!((1..=256).contains(&count), "invalid children count: {count}");
        assert_eq!(node.node_type(), NodeType::for_children(count));

        let mut seen = 0;
        let mut last = None;
        for child in reader.children(&node) {
            let (b, child) = child.unwrap();
            assert!(child.fp() < node.fp(), "child must be saved before parent");
            assert!(last.map_or(true, |l| l < b), "children out of order");
            last = Some(b);
            seen += 1;
            stack.push(child);
        }
        assert_eq!(seen, count);
    }
}

fn save(builder: &ArtBuilder) -> Reader<Vec<u8>> {
    let mut out = Vec::new();
    let root_fp = builder.save(&mut out).unwrap();
    let config = Config {
        validate: true,
        ..Config::default()
    };
    Reader::with_config(out, root_fp, config).unwrap()
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    // Mostly a small alphabet so keys share prefixes and split nodes, with
    // enough arbitrary bytes to grow wide nodes.
    let byte = prop_oneof![3 => b'a'..=b'e', 1 => any::<u8>()];
    prop::collection::vec(byte, 0..=12)
}

fn output_strategy() -> impl Strategy<Value = Output> {
    (
        0..=MAX_TARGET_OFFSET,
        any::<bool>(),
        prop::option::of(prop::collection::vec(any::<u8>(), 0..=8)),
    )
        .prop_map(|(target_offset, has_terms, floor_data)| Output {
            target_offset,
            has_terms,
            floor_data,
        })
}

fn block_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    prop::collection::vec(b'a'..=b'd', 0..=6)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_with_btreemap(
        pairs in prop::collection::vec((key_strategy(), output_strategy()), 1..=400),
        probes in prop::collection::vec(key_strategy(), 0..=100),
    ) {
        let mut builder = ArtBuilder::new();
        let mut m: BTreeMap<Vec<u8>, Output> = BTreeMap::new();
        for (key, output) in pairs {
            let old_t = builder.insert(&key, output.clone());
            let old_m = m.insert(key, output);
            prop_assert_eq!(old_t, old_m);
            prop_assert_eq!(builder.len(), m.len());
        }

        let reader = save(&builder);
        validate_tree(&reader);

        for (key, output) in &m {
            let got = reader.get(key).unwrap();
            prop_assert!(got.is_some_and(|o| o.matches(output)), "key {:?}", key);
        }
        for probe in &probes {
            let got = reader.get(probe).unwrap();
            match m.get(probe) {
                Some(output) => prop_assert!(got.is_some_and(|o| o.matches(output))),
                None => prop_assert_eq!(got, None),
            }
        }

        let got: Vec<Vec<u8>> = reader.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        let expected: Vec<Vec<u8>> = m.keys().cloned().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_floor_data_round_trips(
        pairs in prop::collection::vec((key_strategy(), output_strategy()), 1..=100),
    ) {
        let mut builder = ArtBuilder::new();
        let mut m: BTreeMap<Vec<u8>, Output> = BTreeMap::new();
        for (key, output) in pairs {
            builder.insert(&key, output.clone());
            m.insert(key, output);
        }
        let reader = save(&builder);

        for (key, output) in &m {
            let mut cursor = KeyCursor::new(key);
            let matched = reader.root().match_len(key);
            prop_assert!(matched.is_some(), "root does not match {:?}", key);
            cursor.advance(matched.unwrap_or_default());
            let mut node = reader.root().clone();
            while !cursor.is_empty() {
                node = match reader.descend(&mut cursor, &node).unwrap() {
                    Descend::Child(child) => child,
                    other => panic!("lost {key:?} at {other:?}"),
                };
            }
            match (&output.floor_data, reader.floor_data(&node)) {
                (Some(expected), Some(mut input)) => {
                    let mut got = vec![0u8; expected.len()];
                    input.read_bytes(&mut got).unwrap();
                    prop_assert_eq!(&got, expected);
                }
                (None, None) => {}
                (expected, got) => {
                    prop_assert!(false, "floor data {:?} vs {:?}", expected, got.is_some())
                }
            }
        }
    }

    #[test]
    fn prop_descend_at_agrees_with_descend(
        keys in prop::collection::vec(key_strategy(), 1..=200),
        probes in prop::collection::vec(key_strategy(), 1..=50),
    ) {
        let mut builder = ArtBuilder::new();
        for (i, key) in keys.iter().enumerate() {
            builder.insert(key, Output::new(i as u64));
        }
        let reader = save(&builder);

        for probe in keys.iter().chain(&probes) {
            let mut cursor = KeyCursor::new(probe);
            let mut node = reader.root().clone();
            loop {
                let before = cursor.position();
                let at = reader.descend_at(&cursor, &node, before).unwrap();
                let stepped = reader.descend(&mut cursor, &node).unwrap();
                prop_assert_eq!(&at, &stepped);
                prop_assert_eq!(
                    cursor.position() == before,
                    before == probe.len() || node.is_leaf()
                );
                node = match stepped {
                    Descend::Child(child) => child,
                    Descend::NoMatch | Descend::PartialMatch(_) => break,
                };
            }
        }
    }

    #[test]
    fn prop_floor_block_is_longest_block_prefix(
        blocks in prop::collection::btree_map(block_strategy(), 0u64..1_000_000, 1..=60),
        probes in prop::collection::vec(block_strategy(), 1..=60),
    ) {
        let mut builder = ArtBuilder::new();
        for (prefix, &target) in &blocks {
            prop_assert!(builder.insert_block(prefix, Output::new(target)).is_none());
        }
        let reader = save(&builder);
        validate_tree(&reader);

        let got: Vec<(Vec<u8>, u64)> = reader
            .entries()
            .unwrap()
            .into_iter()
            .map(|(k, o)| (k, o.target_offset))
            .collect();
        let expected: Vec<(Vec<u8>, u64)> = blocks.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(got, expected);

        for probe in blocks.keys().chain(&probes) {
            let expected = blocks
                .iter()
                .filter(|(prefix, _)| probe.starts_with(prefix))
                .max_by_key(|(prefix, _)| prefix.len())
                .map(|(_, &target)| target);
            let got = reader
                .floor_block(probe)
                .unwrap()
                .and_then(|node| node.output())
                .map(|o| o.target_offset);
            prop_assert_eq!(got, expected, "probe {:?}", probe);
        }
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys: Vec<Vec<u8>> = vec![
        b"".to_vec(),
        b"a".to_vec(),
        b"b".to_vec(),
        b"aa".to_vec(),
        b"ab".to_vec(),
        b"ba".to_vec(),
    ];

    let mut saved: Option<Vec<u8>> = None;
    for_each_permutation(&keys, |perm| {
        let mut builder = ArtBuilder::new();
        for k in &perm {
            let target = keys.iter().position(|x| x == k).unwrap() as u64;
            assert!(builder.insert(k, Output::new(target)).is_none());
        }

        let mut out = Vec::new();
        let root_fp = builder.save(&mut out).unwrap();
        // Node4 keys are kept sorted and no node here reaches Node48, so the
        // bytes do not depend on insertion order.
        let first = saved.get_or_insert_with(|| out.clone());
        assert_eq!(first, &out);

        let reader = Reader::open(out, root_fp).unwrap();
        validate_tree(&reader);
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(reader.get(k).unwrap().map(|o| o.target_offset), Some(i as u64));
        }
    });
}

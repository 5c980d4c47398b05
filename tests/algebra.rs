//! Integration tests for the set/map algebra pipeline.

use polyset::prelude::*;

fn interval(lo: i64, hi: i64) -> Set {
    let mut bset = BasicSet::universe(Space::set(1));
    bset.add_lower_bound(0, lo);
    bset.add_upper_bound(0, hi);
    Set::from_basic(bset)
}

fn named_interval(name: &str, lo: i64, hi: i64) -> Set {
    let mut bset = BasicSet::universe(Space::set_named(name, 1));
    bset.add_lower_bound(0, lo);
    bset.add_upper_bound(0, hi);
    Set::from_basic(bset)
}

fn pt(v: i64) -> Point {
    Point::from_i64(Space::set(1), &[v])
}

#[test]
fn test_difference_identities() {
    let a = interval(0, 10);
    let none = Set::empty(Space::set(1));

    // A \ A is empty.
    assert!(a.clone().subtract(a.clone()).unwrap().is_empty());
    // A \ {} = A.
    let kept = a.clone().subtract(none.clone()).unwrap();
    assert!(kept.is_equal(&a).unwrap());
    // {} \ A = {}.
    assert!(none.subtract(a).unwrap().is_empty());
}

#[test]
fn test_band_difference() {
    // A = {x : 0 <= x <= 10}, B1 = {x : x <= 3}, B2 = {x : x >= 8}.
    let a = interval(0, 10);
    let mut b1 = BasicSet::universe(Space::set(1));
    b1.add_upper_bound(0, 3);
    let mut b2 = BasicSet::universe(Space::set(1));
    b2.add_lower_bound(0, 8);
    let b = Set::from_basic(b1).union(Set::from_basic(b2)).unwrap();

    let diff = a.subtract(b).unwrap();
    assert!(diff.is_equal(&interval(4, 7)).unwrap());
    assert_eq!(diff.n_piece(), 1);
}

#[test]
fn test_subset_agrees_with_difference() {
    let cases = [
        (interval(0, 10), interval(-2, 12)),
        (interval(0, 10), interval(0, 9)),
        (interval(0, 10), interval(3, 20)),
        (interval(5, 5), interval(0, 10)),
    ];
    for (a, b) in cases {
        let subset = a.is_subset(&b).unwrap();
        let diff_empty = a.clone().subtract(b.clone()).unwrap().is_empty();
        assert_eq!(subset, diff_empty, "{} vs {}", a, b);
    }
}

#[test]
fn test_singleton_fast_paths() {
    let mut five = BasicSet::universe(Space::set(1));
    five.fix(0, 5);
    let five = Set::from_basic(five);

    assert!(five.is_subset(&interval(4, 6)).unwrap());

    let mut six = BasicSet::universe(Space::set(1));
    six.fix(0, 6);
    assert!(!five.is_subset(&Set::from_basic(six)).unwrap());
}

#[test]
fn test_make_disjoint() {
    let a = interval(0, 6);
    let b = interval(4, 10);
    let both = a.union(b).unwrap();
    let disjoint = both.clone().make_disjoint().unwrap();

    assert!(disjoint.known_disjoint());
    assert!(disjoint.is_equal(&both).unwrap());

    // No integer point may land in two pieces.
    for v in -2..=12 {
        let hits = disjoint
            .pieces()
            .iter()
            .filter(|p| p.contains(&pt(v)))
            .count();
        assert!(hits <= 1, "value {} in {} pieces", v, hits);
        assert_eq!(hits == 1, both.contains(&pt(v)));
    }
}

#[test]
fn test_complement_involution() {
    let a = interval(2, 5);
    let twice = a.clone().complement().unwrap().complement().unwrap();
    assert!(twice.is_equal(&a).unwrap());
}

#[test]
fn test_complement_splits_into_two_rays() {
    let outside = interval(0, 4).complement().unwrap();
    assert!(!outside.contains(&pt(2)));
    assert!(outside.contains(&pt(-1)));
    assert!(outside.contains(&pt(5)));
}

#[test]
fn test_difference_with_divisions() {
    // B = even numbers within 0..10, defined by e = floor(x/2), x = 2e.
    let mut evens = BasicMap::universe(Space::set(1));
    evens.add_lower_bound(0, 0);
    evens.add_upper_bound(0, 10);
    let e = evens.add_div(Int::from(2), vec![Int::from(0), Int::from(1)]);
    let mut eq = vec![Int::from(0); evens.width()];
    eq[1] = Int::from(1);
    eq[2 + e] = Int::from(-2);
    evens.add_eq(eq);
    let evens = Set::from_map(Map::from_basic(evens));

    let odds = interval(0, 10).subtract(evens).unwrap();
    for v in 0..=10 {
        assert_eq!(odds.contains(&pt(v)), v % 2 == 1, "value {}", v);
    }
}

#[test]
fn test_parameter_alignment_across_operands() {
    // a: { x : x >= n } with parameter n; b: { x : x <= m }.
    let space_n = Space::set(1).with_params(vec!["n".into()]);
    let mut a = BasicSet::universe(space_n.clone());
    // x - n >= 0
    a.add_ineq(vec![Int::from(0), Int::from(-1), Int::from(1)]);
    let a = Set::from_basic(a);

    let space_m = Space::set(1).with_params(vec!["m".into()]);
    let mut b = BasicSet::universe(space_m);
    // m - x >= 0
    b.add_ineq(vec![Int::from(0), Int::from(1), Int::from(-1)]);
    let b = Set::from_basic(b);

    let both = a.intersect(b).unwrap();
    assert_eq!(both.space().params(), &["m", "n"]);
    // With m = 5, n = 2: 2 <= x <= 5.
    let space = both.space().clone();
    assert!(both.contains(&Point::from_i64(space.clone(), &[5, 2, 3])));
    assert!(!both.contains(&Point::from_i64(space, &[5, 2, 7])));
}

#[test]
fn test_union_container_scenario() {
    let u = UnionSet::empty(Space::set(0));
    let u = u.add_part(named_interval("S1", 0, 2)).unwrap();
    let u = u.add_part(named_interval("S1", 5, 7)).unwrap();

    let merged = u.extract_part(&Space::set_named("S1", 1));
    let expected = named_interval("S1", 0, 2)
        .union(named_interval("S1", 5, 7))
        .unwrap();
    assert!(merged.is_equal(&expected).unwrap());

    let missing = u.extract_part(&Space::set_named("S2", 1));
    assert!(missing.is_empty());
}

#[test]
fn test_union_container_idempotent_insert() {
    let part = named_interval("S1", 0, 5);
    let once = UnionSet::empty(Space::set(0))
        .add_part(part.clone())
        .unwrap();
    let twice = once.clone().add_part(part).unwrap();

    assert!(once.plain_is_equal(&twice));
    let mut seen = Vec::new();
    twice
        .for_each_part(|p| {
            seen.push(p);
            Ok(())
        })
        .unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].is_equal(&named_interval("S1", 0, 5)).unwrap());
}

#[test]
fn test_union_map_domain_restriction() {
    // One map part {[i] -> [o]}: o = i, 0 <= i <= 9.
    let mut ident = BasicMap::universe(Space::map_named("A", 1, "B", 1));
    ident.add_eq_i64(&[0, 1, -1]);
    ident.add_lower_bound(0, 0);
    ident.add_upper_bound(0, 9);
    let umap = UnionMap::from_part(Map::from_basic(ident)).unwrap();

    // Restrict the domain to the set named like the map's input tuple.
    let dom = UnionSet::from_part(named_interval("A", 3, 5)).unwrap();
    let restricted = umap.intersect_domain(dom).unwrap();
    assert_eq!(restricted.n_part(), 1);

    let part = restricted.extract_part(&Space::map_named("A", 1, "B", 1));
    let space = part.space().clone();
    assert!(part.contains(&Point::from_i64(space.clone(), &[4, 4])));
    assert!(!part.contains(&Point::from_i64(space, &[2, 2])));
}

#[test]
fn test_union_map_domain_mismatch_drops_entry() {
    let ident = BasicMap::universe(Space::map_named("A", 1, "B", 1));
    let umap = UnionMap::from_part(Map::from_basic(ident)).unwrap();
    // Domain entries only exist for an unrelated space.
    let dom = UnionSet::from_part(named_interval("C", 0, 5)).unwrap();
    let restricted = umap.intersect_domain(dom).unwrap();
    assert_eq!(restricted.n_part(), 0);
}

#[test]
fn test_space_mismatch_is_an_error() {
    let a = interval(0, 1);
    let b = Set::universe(Space::set(2));
    assert!(matches!(
        a.subtract(b),
        Err(PolysetError::SpaceMismatch { .. })
    ));
}

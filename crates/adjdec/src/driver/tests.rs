//! End-to-end runs of the decomposition on small polytopes.

use std::collections::BTreeSet;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::*;
use crate::geometry::ExactRotation;
use crate::maps::Permutation;
use crate::testing::{cube3, s3_coordinates, simplex3};

fn set(rows: Matrix) -> BTreeSet<Row> {
    rows.into_iter().collect()
}

fn cube_facets() -> BTreeSet<Row> {
    set(vec![
        Row::from([1, 0, 0, 1]),
        Row::from([0, 1, 0, 1]),
        Row::from([0, 0, 1, 1]),
        Row::from([-1, 0, 0, 0]),
        Row::from([0, -1, 0, 0]),
        Row::from([0, 0, -1, 0]),
    ])
}

fn cfg(threads: usize) -> RunCfg {
    RunCfg::default().with_threads(threads)
}

/// All transpositions, so every coordinate permutation is one generator away.
fn transpositions() -> Maps {
    [vec![1, 0, 2, 3], vec![2, 1, 0, 3], vec![0, 2, 1, 3]]
        .into_iter()
        .map(|s| Permutation::new(s).unwrap())
        .collect()
}

fn identity_probes(n: usize) -> Deterministics {
    let rows: Vec<Row> = (0..n)
        .map(|i| Row::new((0..n).map(|j| i64::from(i == j)).collect()))
        .collect();
    Deterministics::new(&rows)
}

#[test]
fn cube_without_symmetry_has_six_facets() {
    let problem = Problem::new(cube3());
    let rows = run_local(&problem, &ExactRotation, &cfg(2)).unwrap();
    assert_eq!(rows.len(), 6);
    assert_eq!(set(rows), cube_facets());
}

#[test]
fn cube_under_coordinate_permutations_has_two_classes() {
    let problem = Problem::new(cube3()).with_maps(s3_coordinates());
    let rows = run_local(&problem, &ExactRotation, &cfg(2)).unwrap();
    // canonical representatives are the orbit maxima
    let want = set(vec![Row::from([1, 0, 0, 1]), Row::from([0, 0, -1, 0])]);
    assert_eq!(set(rows), want);
}

#[test]
fn thread_and_node_counts_do_not_change_the_result() {
    let problem = Problem::new(cube3()).with_maps(s3_coordinates());
    let one = set(run_local(&problem, &ExactRotation, &cfg(1)).unwrap());
    let many = set(run_local(&problem, &ExactRotation, &cfg(4)).unwrap());
    let cluster = set(run_cluster(3, &problem, &ExactRotation, &cfg(2)).unwrap());
    assert_eq!(one, many);
    assert_eq!(one, cluster);

    let plain = Problem::new(cube3());
    let one = set(run_local(&plain, &ExactRotation, &cfg(1)).unwrap());
    let cluster = set(run_cluster(2, &plain, &ExactRotation, &cfg(3)).unwrap());
    assert_eq!(one, cluster);
}

#[test]
fn known_output_is_normalized_and_seeded() {
    // scaled copies normalize to the primitive rows
    let known: Matrix = cube_facets()
        .into_iter()
        .map(|r| Row::new(r.iter().map(|x| 2 * x).collect()))
        .collect();
    let problem = Problem::new(cube3()).with_known_output(known);
    let rows = run_local(&problem, &ExactRotation, &cfg(2)).unwrap();
    assert_eq!(set(rows), cube_facets());
}

#[test]
fn known_output_is_canonicalized_in_the_deterministic_variant() {
    // (-1, 0, 0, 0) is not the maximum of its orbit under transpositions
    let problem = Problem::new(cube3())
        .with_maps(transpositions())
        .with_deterministics(identity_probes(4))
        .with_known_output(vec![Row::from([-1, 0, 0, 0])]);
    let rows = run_local(&problem, &ExactRotation, &cfg(1)).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], Row::from([0, 0, -1, 0]));
    assert!(!rows.contains(&Row::from([-1, 0, 0, 0])));
}

#[test]
fn deterministic_variant_finds_the_same_classes() {
    let problem = Problem::new(cube3())
        .with_maps(transpositions())
        .with_deterministics(identity_probes(4));
    let rows = run_cluster(2, &problem, &ExactRotation, &cfg(2)).unwrap();
    assert_eq!(rows.len(), 2);
    // one "x_i <= 1" and one "x_i >= 0" facet, whichever was seen first
    let rhs: BTreeSet<i64> = rows.iter().map(|r| r[3]).collect();
    assert_eq!(rhs, [0, 1].into_iter().collect());
}

#[test]
fn simplex_facets_are_normalized_against_the_affine_hull() {
    let problem = Problem::new(simplex3());
    let rows = run_local(&problem, &ExactRotation, &cfg(2)).unwrap();
    assert_eq!(rows.len(), 3);

    // all three edges are one class under coordinate permutations
    let problem = Problem::new(simplex3()).with_maps(s3_coordinates());
    let rows = run_local(&problem, &ExactRotation, &cfg(2)).unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn vertex_mode_enumerates_cube_vertices() {
    let problem = Problem::new(cube_facets().into_iter().collect());
    let vertex = cfg(2).with_mode(SearchMode::Vertex);
    let rows = run_local(&problem, &ExactRotation, &vertex).unwrap();
    assert_eq!(set(rows), set(cube3()));

    // orbits of the vertices are counted by their number of ones
    let problem = problem.with_maps(s3_coordinates());
    let rows = run_local(&problem, &ExactRotation, &vertex).unwrap();
    assert_eq!(rows.len(), 4);
}

/// Rotation fails on any facet other than the seed.
#[derive(Debug)]
struct Brittle;

impl Geometry for Brittle {
    fn rotation(&self, input: &[Row], row: &Row, maps: &Maps) -> Result<Matrix, GeometryError> {
        if row[row.last_index()] == 0 {
            return Err(GeometryError::Invalid {
                row: row.clone(),
                index: 0,
            });
        }
        ExactRotation.rotation(input, row, maps)
    }

    fn seed(&self, _input: &[Row]) -> Result<Matrix, GeometryError> {
        Ok(vec![Row::from([1, 0, 0, 1])])
    }
}

#[test]
fn rotation_failure_aborts_every_node() {
    let problem = Problem::new(cube3());
    let err = run_cluster(3, &problem, &Brittle, &cfg(2)).unwrap_err();
    assert!(matches!(err, RunError::Geometry(GeometryError::Invalid { .. })));
}

#[derive(Debug)]
struct NoSeed;

impl Geometry for NoSeed {
    fn rotation(&self, _: &[Row], _: &Row, _: &Maps) -> Result<Matrix, GeometryError> {
        Ok(Matrix::new())
    }

    fn seed(&self, input: &[Row]) -> Result<Matrix, GeometryError> {
        Err(GeometryError::NoSeed(input.len()))
    }
}

#[test]
fn missing_seed_releases_all_workers() {
    let problem = Problem::new(cube3());
    let err = run_cluster(2, &problem, &NoSeed, &cfg(2)).unwrap_err();
    assert!(matches!(err, RunError::Geometry(GeometryError::NoSeed(8))));
}

#[test]
fn configuration_errors_are_reported() {
    let problem = Problem::new(cube3());
    assert!(matches!(
        run_local(&problem, &ExactRotation, &cfg(0)),
        Err(RunError::NoThreads)
    ));
    assert!(matches!(
        run_cluster(0, &problem, &ExactRotation, &cfg(1)),
        Err(RunError::NoNodes)
    ));
    let transport = ChannelCluster::single(1);
    assert!(matches!(
        adjacency_decomposition(&transport, &problem, &ExactRotation, &cfg(2)),
        Err(RunError::TooManyThreads {
            requested: 2,
            available: 1
        })
    ));
    assert!(matches!(
        run_local(&Problem::new(Matrix::new()), &ExactRotation, &cfg(1)),
        Err(RunError::Geometry(GeometryError::EmptyInput))
    ));
}

#[test]
fn equations_render_with_names() {
    let names = vec!["a".to_owned(), "b".to_owned()];
    assert_eq!(
        render_equation(&Row::from([1, 2, 0, 5]), &names),
        "1*a + 2*b = 5"
    );
}

/// Runs `f` on a helper thread and fails the test if it does not return.
fn finishes<R: Send + 'static>(f: impl FnOnce() -> R + Send + 'static) -> R {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(Duration::from_secs(30))
        .expect("run did not return")
}

fn shape_of(err: RunError) -> (String, usize, usize) {
    match err {
        RunError::Shape {
            what,
            expected,
            found,
        } => (what, expected, found),
        other => panic!("expected a shape error, got {other}"),
    }
}

#[test]
fn mismatched_widths_are_rejected_up_front() {
    let narrow_probes = Problem::new(cube3()).with_deterministics(identity_probes(3));
    let err = finishes(move || run_local(&narrow_probes, &ExactRotation, &cfg(2))).unwrap_err();
    assert_eq!(shape_of(err), ("deterministics".to_owned(), 4, 3));

    let mut maps = Maps::new();
    maps.push(Permutation::new(vec![1, 0, 2]).unwrap());
    let short_map = Problem::new(cube3()).with_maps(maps);
    let err = finishes(move || run_cluster(2, &short_map, &ExactRotation, &cfg(2))).unwrap_err();
    assert_eq!(shape_of(err), ("map #0".to_owned(), 4, 3));

    let known = Problem::new(cube3()).with_known_output(vec![Row::from([1, 0, 1])]);
    let err = run_local(&known, &ExactRotation, &cfg(1)).unwrap_err();
    assert_eq!(shape_of(err), ("known output row 0".to_owned(), 4, 3));

    let mut ragged = cube3();
    ragged.push(Row::from([1, 1]));
    let err = run_local(&Problem::new(ragged), &ExactRotation, &cfg(1)).unwrap_err();
    assert_eq!(shape_of(err), ("input row 8".to_owned(), 4, 2));
}

/// Panics on any facet other than the seed.
#[derive(Debug)]
struct Panicky;

impl Geometry for Panicky {
    fn rotation(&self, input: &[Row], row: &Row, maps: &Maps) -> Result<Matrix, GeometryError> {
        if row[row.last_index()] == 0 {
            panic!("rotation blew up on [{row}]");
        }
        ExactRotation.rotation(input, row, maps)
    }

    fn seed(&self, _input: &[Row]) -> Result<Matrix, GeometryError> {
        Ok(vec![Row::from([1, 0, 0, 1])])
    }
}

#[test]
fn worker_panic_aborts_every_node() {
    let problem = Problem::new(cube3());
    let err = finishes(move || run_cluster(3, &problem, &Panicky, &cfg(2))).unwrap_err();
    assert!(matches!(err, RunError::WorkerPanicked));
}

#[derive(Debug)]
struct SeedPanics;

impl Geometry for SeedPanics {
    fn rotation(&self, _: &[Row], _: &Row, _: &Maps) -> Result<Matrix, GeometryError> {
        Ok(Matrix::new())
    }

    fn seed(&self, _input: &[Row]) -> Result<Matrix, GeometryError> {
        panic!("no seeding today")
    }
}

#[test]
fn setup_panic_releases_all_workers() {
    let problem = Problem::new(cube3());
    let err = finishes(move || run_cluster(2, &problem, &SeedPanics, &cfg(2))).unwrap_err();
    assert!(matches!(err, RunError::WorkerPanicked));
}

/// Identity, except that it panics on one row.
#[derive(Debug)]
struct Tripwire(Row);

impl SymmetryMap for Tripwire {
    fn apply(&self, row: &Row) -> Row {
        assert_ne!(row, &self.0, "tripwire hit");
        row.clone()
    }
}

#[test]
fn seeding_panic_aborts_the_run() {
    // the first known row seeds fine, the second one panics in the seeder
    let mut maps = Maps::new();
    maps.push(Tripwire(Row::from([0, 0, -1, 0])));
    let problem = Problem::new(cube3())
        .with_maps(maps)
        .with_known_output(vec![Row::from([1, 0, 0, 1]), Row::from([0, 0, -1, 0])]);
    let err = finishes(move || run_cluster(2, &problem, &ExactRotation, &cfg(2))).unwrap_err();
    assert!(matches!(err, RunError::WorkerPanicked));
}

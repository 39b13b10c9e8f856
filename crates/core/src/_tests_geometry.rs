#![cfg(test)]

use super::geometry::{
    enumerate_quadruples, resolve, unique_rows_with_inverse, ArrayType, Electrode,
    ElectrodeQuadruple, GeometryError, RawGeometry,
};

fn line(xs: &[f64]) -> RawGeometry {
    let ids: Vec<u32> = (1..=xs.len() as u32).collect();
    RawGeometry {
        current: ids.clone(),
        potential: ids.clone(),
        aux_potential: Vec::new(),
        electrodes: ids
            .iter()
            .zip(xs)
            .map(|(&id, &x)| Electrode { id, x, y: 0.0, z: 0.0 })
            .collect(),
        pairs: None,
    }
}

fn spacings(src: &[f64; 4], rec: &[f64; 4]) -> (f64, f64, f64) {
    (rec[0] - src[0], rec[2] - rec[0], src[2] - rec[2])
}

#[test]
fn enumeration_keeps_only_disjoint_pairs() {
    let quads = enumerate_quadruples(&[1, 2, 3], &[3, 4, 5]);
    assert_eq!(quads.len(), 5);
    for q in &quads {
        assert!(q.c1 < q.c2 && q.p1 < q.p2);
        let [c1, c2, p1, p2] = q.ids();
        assert!(c1 != p1 && c1 != p2 && c2 != p1 && c2 != p2);
    }
    assert_eq!(quads[0], ElectrodeQuadruple::new(1, 2, 3, 4));
}

#[test]
fn four_electrodes_give_six_quadruples() {
    let quads = enumerate_quadruples(&[1, 2, 3, 4], &[1, 2, 3, 4]);
    assert_eq!(quads.len(), 6);
}

#[test]
fn enumeration_normalises_pair_order() {
    let quads = enumerate_quadruples(&[4, 1], &[3, 2]);
    assert_eq!(quads, vec![ElectrodeQuadruple::new(1, 4, 2, 3)]);
}

#[test]
fn wenner_on_six_surface_electrodes() {
    let geometry = line(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let (set, report) = resolve(&geometry, ArrayType::Wenner).unwrap();

    assert_eq!(set.receiver_count(), 3);
    assert_eq!(set.source_count(), 3);
    assert_eq!(report.accepted, 3);
    for i in 0..set.receiver_count() {
        let (am, mn, nb) = spacings(set.source_of(i).unwrap(), &set.recloc[i]);
        assert_eq!(am, mn);
        assert_eq!(mn, nb);
        assert!(am > 0.0);
    }
}

#[test]
fn wenner_schlumberger_requires_integer_ratio() {
    let geometry = line(&[0.0, 1.5, 2.5, 4.0]);

    let (ws, _) = resolve(&geometry, ArrayType::WennerSchlumberger).unwrap();
    assert!(ws.is_empty());

    let (non_int, _) = resolve(&geometry, ArrayType::WennerSchlumbergerNonInt).unwrap();
    assert_eq!(non_int.receiver_count(), 1);
    let (am, mn, nb) = spacings(non_int.source_of(0).unwrap(), &non_int.recloc[0]);
    assert_eq!((am, mn, nb), (1.5, 1.0, 1.5));

    let (wenner, _) = resolve(&geometry, ArrayType::Wenner).unwrap();
    assert!(wenner.is_empty());
}

#[test]
fn wenner_schlumberger_accepts_integer_ratio() {
    let geometry = line(&[0.0, 2.0, 3.0, 5.0]);
    let (set, _) = resolve(&geometry, ArrayType::WennerSchlumberger).unwrap();
    assert_eq!(set.receiver_count(), 1);
}

#[test]
fn buried_electrodes_are_excluded_from_array_policies() {
    let mut geometry = line(&[0.0, 1.0, 2.0, 3.0]);
    geometry.electrodes[2].z = -1.0;

    let (wenner, report) = resolve(&geometry, ArrayType::Wenner).unwrap();
    assert!(wenner.is_empty());
    assert_eq!(report.quadruples, 6);
    assert_eq!(report.at_surface, 0);

    let (all, _) = resolve(&geometry, ArrayType::AllCombination).unwrap();
    assert_eq!(all.receiver_count(), 6);
    assert!(all.recloc.iter().chain(&all.srcloc).any(|r| r[1] == 1.0 || r[3] == 1.0));
}

#[test]
fn every_receiver_points_at_its_own_source() {
    let geometry = line(&[0.0, 1.0, 2.0, 3.0, 4.0]);
    let (set, report) = resolve(&geometry, ArrayType::AllCombination).unwrap();

    assert_eq!(set.receiver_count(), 30);
    assert_eq!(set.srcnum.len(), set.receiver_count());
    assert_eq!(set.source_count(), 10);
    assert_eq!(report.unique_sources, 10);
    assert!(set.srcnum.iter().all(|&s| s < set.source_count()));

    for pair in set.srcloc.windows(2) {
        assert!(pair[0] < pair[1], "sources must be sorted and distinct");
    }

    // Rebuild the expected source rows from the enumeration and compare.
    let shift = 2.0;
    let quads = enumerate_quadruples(&geometry.current, &geometry.potential);
    for (i, q) in quads.iter().enumerate() {
        let xa = (q.c1 - 1) as f64 - shift;
        let xb = (q.c2 - 1) as f64 - shift;
        assert_eq!(set.source_of(i).unwrap(), &[xa, 0.0, xb, 0.0]);
    }
}

#[test]
fn coordinates_shift_by_half_the_extent() {
    let geometry = line(&[10.0, 11.0, 12.0, 13.0]);
    let (set, _) = resolve(&geometry, ArrayType::Wenner).unwrap();

    // Extent is 3, so every x moves left by 1.5 regardless of where the line starts.
    assert_eq!(set.srcloc, vec![[8.5, 0.0, 11.5, 0.0]]);
    assert_eq!(set.recloc, vec![[9.5, 0.0, 10.5, 0.0]]);
    assert_eq!(set.srcnum, vec![0]);
}

#[test]
fn line_starting_at_origin_is_centred() {
    let geometry = line(&[0.0, 1.0, 2.0, 3.0]);
    let (set, _) = resolve(&geometry, ArrayType::Wenner).unwrap();

    assert_eq!(set.srcloc, vec![[-1.5, 0.0, 1.5, 0.0]]);
    assert_eq!(set.recloc, vec![[-0.5, 0.0, 0.5, 0.0]]);
}

#[test]
fn empty_geometry_resolves_to_empty_set() {
    let (set, report) = resolve(&RawGeometry::default(), ArrayType::Wenner).unwrap();
    assert!(set.is_empty());
    assert_eq!(set.source_count(), 0);
    assert_eq!(report.quadruples, 0);
}

#[test]
fn explicit_pairs_replace_enumeration() {
    let mut geometry = line(&[0.0, 1.0, 2.0, 3.0]);
    geometry.pairs = Some(vec![ElectrodeQuadruple::new(1, 4, 2, 3)]);

    let (set, report) = resolve(&geometry, ArrayType::AllCombination).unwrap();
    assert_eq!(report.quadruples, 1);
    assert_eq!(set.recloc, vec![[-0.5, 0.0, 0.5, 0.0]]);
}

#[test]
fn unknown_electrode_is_an_error() {
    let mut geometry = line(&[0.0, 1.0, 2.0, 3.0]);
    geometry.pairs = Some(vec![ElectrodeQuadruple::new(1, 2, 3, 9)]);

    match resolve(&geometry, ArrayType::AllCombination) {
        Err(GeometryError::UnknownElectrode { id }) => assert_eq!(id, 9),
        other => panic!("expected unknown electrode, got {other:?}"),
    }
}

#[test]
fn unique_rows_report_inverse_indices() {
    let rows = [
        [2.0, 0.0, 3.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [2.0, 0.0, 3.0, 0.0],
        [0.0, 0.0, 2.0, 0.0],
    ];
    let (unique, inverse) = unique_rows_with_inverse(&rows);
    assert_eq!(
        unique,
        vec![
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 2.0, 0.0],
            [2.0, 0.0, 3.0, 0.0],
        ]
    );
    assert_eq!(inverse, vec![2, 0, 2, 1]);
    for (row, &u) in rows.iter().zip(&inverse) {
        assert_eq!(&unique[u], row);
    }
}

#[test]
fn signed_zeros_collapse_to_one_source() {
    let rows = [[-0.0, 0.0, 1.0, 0.0], [0.0, -0.0, 1.0, 0.0], [0.0, 0.0, 1.0, 0.0]];
    let (unique, inverse) = unique_rows_with_inverse(&rows);

    assert_eq!(unique.len(), 1);
    assert_eq!(inverse, vec![0, 0, 0]);
    assert!(unique[0].iter().all(|v| !v.is_sign_negative()));
}

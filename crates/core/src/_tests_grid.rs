#![cfg(test)]

use super::grid::Mesh;

#[test]
fn flat_index_is_depth_fastest() {
    let mesh = Mesh::uniform(4, 3);
    assert_eq!(mesh.len(), 12);
    assert_eq!(mesh.idx(0, 0), 0);
    assert_eq!(mesh.idx(0, 2), 2);
    assert_eq!(mesh.idx(1, 0), 3);
    assert_eq!(mesh.idx(3, 2), 11);
}

#[test]
fn centres_are_symmetric_in_x_and_downward_in_z() {
    let mesh = Mesh::uniform(4, 3);
    assert_eq!(mesh.x_centers(), vec![-1.5, -0.5, 0.5, 1.5]);
    assert_eq!(mesh.z_centers(), vec![0.5, 1.5, 2.5]);
}

#[test]
fn locate_snaps_outside_points_to_boundary_cells() {
    let mesh = Mesh::uniform(4, 3);
    assert_eq!(mesh.locate(0.0, 0.0), Some(mesh.idx(2, 0)));
    assert_eq!(mesh.locate(-0.5, 1.2), Some(mesh.idx(1, 1)));
    assert_eq!(mesh.locate(-100.0, -5.0), Some(mesh.idx(0, 0)));
    assert_eq!(mesh.locate(100.0, 100.0), Some(mesh.idx(3, 2)));
}

#[test]
fn empty_mesh_locates_nothing() {
    let mesh = Mesh::uniform(0, 3);
    assert!(mesh.is_empty());
    assert_eq!(mesh.locate(0.0, 0.0), None);
}

#[test]
fn from_spacing_takes_dimensions_from_lengths() {
    let mesh = Mesh::from_spacing(vec![1.0, 2.0], vec![0.5; 5]);
    assert_eq!((mesh.nx, mesh.nz), (2, 5));
    assert_eq!(mesh.width(), 3.0);
    assert_eq!(mesh.x_centers(), vec![-1.0, 0.5]);
}

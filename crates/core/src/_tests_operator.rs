#![cfg(test)]

use ndarray::Array2;

use super::geometry::{resolve, ArrayType, Electrode, RawGeometry, SourceReceiverSet};
use super::grid::Mesh;
use super::operator::{
    AssemblyInput, ForwardKernel, KernelError, Para, SensitivityKernel, ShapeMismatch,
};

fn survey() -> SourceReceiverSet {
    let ids: Vec<u32> = (1..=6).collect();
    let geometry = RawGeometry {
        current: ids.clone(),
        potential: ids.clone(),
        aux_potential: Vec::new(),
        electrodes: ids
            .iter()
            .map(|&id| Electrode {
                id,
                x: f64::from(id) - 1.0,
                y: 0.0,
                z: 0.0,
            })
            .collect(),
        pairs: None,
    };
    resolve(&geometry, ArrayType::WennerSchlumbergerNonInt).unwrap().0
}

fn assemble(set: &SourceReceiverSet, mesh: &Mesh, sigma: &Array2<f64>) -> Result<Para, KernelError> {
    SensitivityKernel::new().assemble(&AssemblyInput {
        srcloc: &set.srcloc,
        dx: &mesh.dx,
        dz: &mesh.dz,
        sigma: sigma.view(),
        num_k_g: 4,
        recloc: &set.recloc,
        srcnum: &set.srcnum,
    })
}

#[test]
fn assembled_operator_has_survey_shapes() {
    let set = survey();
    let mesh = Mesh::uniform(8, 4);
    let para = assemble(&set, &mesh, &Array2::ones((8, 4))).unwrap();

    assert_eq!(para.q.dim(), (set.receiver_count(), mesh.len()));
    assert_eq!(para.b.dim(), (mesh.len(), set.source_count()));
    assert_eq!(para.receiver_count(), set.receiver_count());
    assert!(para.check_shape(&set, &mesh).is_ok());
    assert!(para.q.iter().all(|v| v.is_finite()));
}

#[test]
fn source_columns_balance() {
    let set = survey();
    let mesh = Mesh::uniform(8, 4);
    let para = assemble(&set, &mesh, &Array2::ones((8, 4))).unwrap();

    for column in para.b.columns() {
        assert_eq!(column.sum(), 0.0);
        assert_eq!(column.iter().filter(|v| **v != 0.0).count(), 2);
    }
}

#[test]
fn assembly_rejects_mismatched_reference_grid() {
    let set = survey();
    let mesh = Mesh::uniform(8, 4);
    let err = assemble(&set, &mesh, &Array2::ones((4, 8))).unwrap_err();
    assert_eq!(
        err,
        KernelError::GridMismatch {
            expected: (8, 4),
            found: (4, 8),
        }
    );
}

#[test]
fn solve_scales_with_resistivity() {
    let set = survey();
    let mesh = Mesh::uniform(8, 4);
    let para = assemble(&set, &mesh, &Array2::ones((8, 4))).unwrap();
    let kernel = SensitivityKernel::new();

    let unit = kernel.solve(Array2::ones((8, 4)).view(), &para).unwrap();
    let doubled = kernel
        .solve(Array2::from_elem((8, 4), 2.0).view(), &para)
        .unwrap();

    assert_eq!(unit.dobs.len(), set.receiver_count());
    assert_eq!(unit.potentials.dim(), para.b.dim());
    for (a, b) in unit.dobs.iter().zip(doubled.dobs.iter()) {
        approx::assert_relative_eq!(*b, 0.5 * a, max_relative = 1e-12);
    }
}

#[test]
fn solve_rejects_non_positive_conductivity() {
    let set = survey();
    let mesh = Mesh::uniform(8, 4);
    let para = assemble(&set, &mesh, &Array2::ones((8, 4))).unwrap();

    let mut sigma = Array2::ones((8, 4));
    sigma[[1, 2]] = 0.0;
    let err = SensitivityKernel::new().solve(sigma.view(), &para).unwrap_err();
    assert_eq!(
        err,
        KernelError::NonPositiveConductivity {
            position: mesh.idx(1, 2),
            value: 0.0,
        }
    );
}

#[test]
fn solve_rejects_wrong_cell_count() {
    let set = survey();
    let mesh = Mesh::uniform(8, 4);
    let para = assemble(&set, &mesh, &Array2::ones((8, 4))).unwrap();

    let err = SensitivityKernel::new()
        .solve(Array2::ones((8, 3)).view(), &para)
        .unwrap_err();
    assert!(matches!(err, KernelError::CellCount { expected: 32, found: 24 }));
}

#[test]
fn check_shape_names_the_broken_dimension() {
    let set = survey();
    let mesh = Mesh::uniform(8, 4);
    let para = assemble(&set, &mesh, &Array2::ones((8, 4))).unwrap();

    let other = Mesh::uniform(8, 5);
    assert_eq!(
        para.check_shape(&set, &other),
        Err(ShapeMismatch::CouplingCols {
            expected: 40,
            found: 32,
        })
    );

    let mut fewer = set.clone();
    fewer.recloc.pop();
    fewer.srcnum.pop();
    assert!(matches!(
        para.check_shape(&fewer, &mesh),
        Err(ShapeMismatch::CouplingRows { .. })
    ));
}

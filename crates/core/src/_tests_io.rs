#![cfg(test)]

use std::fs;
use std::path::Path;

use super::geometry::{ArrayType, ElectrodeQuadruple, GeometryError};
use super::io::{read_forward_config, read_geometry, ConfigError};

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

const FORWARD: &str = r#"
[forward]
geometry_urf = "geometry.toml"
array_type = "Wenner_Schlumberger"
nx = 32
nz = 10
Para_pkl = "cache/para.bin"
num_k_g = 4
"#;

#[test]
fn forward_section_parses_and_rebases_paths() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "forward.toml", FORWARD);

    let config = read_forward_config(&path).unwrap();
    assert_eq!(config.array_type, ArrayType::WennerSchlumberger);
    assert_eq!((config.nx, config.nz, config.num_k_g), (32, 10, 4));
    assert_eq!(config.geometry_urf, dir.path().join("geometry.toml"));
    assert_eq!(config.para_path, dir.path().join("cache/para.bin"));
    assert_eq!(config.mesh().len(), 320);
}

#[test]
fn para_path_alias_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let content = FORWARD.replace("Para_pkl", "para_path");
    let path = write(dir.path(), "forward.toml", &content);

    let config = read_forward_config(&path).unwrap();
    assert_eq!(config.para_path, dir.path().join("cache/para.bin"));
}

#[test]
fn absolute_paths_are_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let abs = dir.path().join("elsewhere").join("geo.toml");
    let content = FORWARD.replace(
        "\"geometry.toml\"",
        &format!("{:?}", abs.to_string_lossy()),
    );
    let path = write(dir.path(), "forward.toml", &content);

    let config = read_forward_config(&path).unwrap();
    assert_eq!(config.geometry_urf, abs);
}

#[test]
fn unknown_array_type_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let content = FORWARD.replace("Wenner_Schlumberger", "Dipole_Dipole");
    let path = write(dir.path(), "forward.toml", &content);

    assert!(matches!(
        read_forward_config(&path),
        Err(ConfigError::Toml { .. })
    ));
}

#[test]
fn unknown_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let content = format!("{FORWARD}colour = \"blue\"\n");
    let path = write(dir.path(), "forward.toml", &content);

    assert!(matches!(
        read_forward_config(&path),
        Err(ConfigError::Toml { .. })
    ));
}

#[test]
fn zero_sized_grid_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let content = FORWARD.replace("nz = 10", "nz = 0");
    let path = write(dir.path(), "forward.toml", &content);

    assert!(matches!(
        read_forward_config(&path),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn missing_file_reports_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_forward_config(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("nope.toml"));
}

#[test]
fn geometry_file_converts_to_raw_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "geometry.toml",
        r#"
current = [1, 2, 3, 4]
potential = [1, 2, 3, 4]
coordinates = [
    [1.0, 0.0, 0.0, 0.0],
    [2.0, 1.0, 0.0, 0.0],
    [3.0, 2.0, 0.0, -0.5],
    [4.0, 3.0, 0.0, 0.0],
]
pairs = [[1, 4, 2, 3]]
"#,
    );

    let geometry = read_geometry(&path).unwrap();
    assert_eq!(geometry.current, vec![1, 2, 3, 4]);
    assert!(geometry.aux_potential.is_empty());
    assert_eq!(geometry.electrodes.len(), 4);
    assert_eq!(geometry.electrodes[2].id, 3);
    assert_eq!(geometry.electrodes[2].z, -0.5);
    assert_eq!(geometry.pairs, Some(vec![ElectrodeQuadruple::new(1, 4, 2, 3)]));
    assert_eq!(geometry.horizontal_extent(), 3.0);
}

#[test]
fn fractional_electrode_id_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "geometry.toml",
        "coordinates = [[1.5, 0.0, 0.0, 0.0]]\n",
    );

    match read_geometry(&path) {
        Err(ConfigError::Geometry(GeometryError::InvalidCoordinate { row, .. })) => {
            assert_eq!(row, 0)
        }
        other => panic!("expected invalid coordinate, got {other:?}"),
    }
}

#[test]
fn empty_geometry_file_is_valid() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "geometry.toml", "");
    let geometry = read_geometry(&path).unwrap();
    assert!(geometry.electrodes.is_empty());
    assert!(geometry.pairs.is_none());
}

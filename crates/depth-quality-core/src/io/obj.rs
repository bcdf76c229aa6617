//! Wavefront OBJ (geometry only).

use super::IoError;
use crate::mesh::TriangleMesh;
use nalgebra::Point3;
use std::fmt::Write as _;
use std::{fs, path::Path};

/// Load a triangulated surface from an OBJ file.
pub fn load_obj(path: impl AsRef<Path>) -> Result<TriangleMesh, IoError> {
    let raw = fs::read_to_string(path)?;
    parse_obj(&raw)
}

/// Parse OBJ text.
///
/// Only `v` and `f` records are used. Face corners may be written as `a`,
/// `a/b`, `a//c` or `a/b/c`; negative indices count from the end.
/// Polygons with more than three corners are fan-triangulated.
pub fn parse_obj(text: &str) -> Result<TriangleMesh, IoError> {
    let mut vertices = Vec::new();
    let mut faces = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let line_no = lineno + 1;
        let line = line.split('#').next().unwrap_or("").trim();
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let mut xyz = [0.0f64; 3];
                for slot in &mut xyz {
                    let tok = tokens.next().ok_or_else(|| IoError::Obj {
                        line: line_no,
                        reason: "vertex needs 3 coordinates".into(),
                    })?;
                    *slot = tok.parse().map_err(|_| IoError::Obj {
                        line: line_no,
                        reason: format!("bad coordinate {tok:?}"),
                    })?;
                }
                vertices.push(Point3::new(xyz[0], xyz[1], xyz[2]));
            }
            Some("f") => {
                let mut corners = Vec::with_capacity(4);
                for tok in tokens {
                    corners.push(resolve_index(tok, vertices.len(), line_no)?);
                }
                if corners.len() < 3 {
                    return Err(IoError::Obj {
                        line: line_no,
                        reason: format!("face has {} corners", corners.len()),
                    });
                }
                for k in 1..corners.len() - 1 {
                    faces.push([corners[0], corners[k], corners[k + 1]]);
                }
            }
            _ => {}
        }
    }

    Ok(TriangleMesh::new(vertices, faces))
}

fn resolve_index(tok: &str, n_vertices: usize, line: usize) -> Result<u32, IoError> {
    let head = tok.split('/').next().unwrap_or("");
    let raw: i64 = head.parse().map_err(|_| IoError::Obj {
        line,
        reason: format!("bad face index {tok:?}"),
    })?;
    let idx = if raw > 0 {
        raw - 1
    } else if raw < 0 {
        n_vertices as i64 + raw
    } else {
        -1
    };
    if idx < 0 || idx >= n_vertices as i64 {
        return Err(IoError::Obj {
            line,
            reason: format!("face index {raw} out of range (have {n_vertices} vertices)"),
        });
    }
    Ok(idx as u32)
}

/// Write a mesh as OBJ text (`v` + `f` records, 1-based indices).
pub fn write_obj(path: impl AsRef<Path>, mesh: &TriangleMesh) -> Result<(), IoError> {
    let mut out = String::with_capacity(mesh.vertices.len() * 32 + mesh.faces.len() * 24);
    for v in &mesh.vertices {
        let _ = writeln!(out, "v {} {} {}", v.x, v.y, v.z);
    }
    for f in &mesh.faces {
        let _ = writeln!(out, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1);
    }
    fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_face_syntax_and_fans_quads() {
        let text = "\
# comment
o part
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
f -4//1 -2//1 -1//1
";
        let mesh = parse_obj(text).expect("parse");
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3], [0, 2, 3]]);
    }

    #[test]
    fn out_of_range_index_reports_line() {
        let err = parse_obj("v 0 0 0\nf 1 2 3\n").unwrap_err();
        match err {
            IoError::Obj { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn write_then_load_preserves_geometry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tri.obj");
        let mesh = TriangleMesh::new(
            vec![
                Point3::new(0.5, -1.25, 6.35),
                Point3::new(2.0, 0.0, 6.35),
                Point3::new(0.0, 3.0, 9.35),
            ],
            vec![[0, 1, 2]],
        );
        write_obj(&path, &mesh).expect("write");
        let back = load_obj(&path).expect("load");
        assert_eq!(back, mesh);
    }
}

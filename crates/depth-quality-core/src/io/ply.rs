//! Vertex-only PLY for point clouds.
//!
//! Reading accepts `ascii`, `binary_little_endian` and `binary_big_endian`
//! files. Only the `x`, `y`, `z` properties of the `vertex` element are
//! kept; other properties and elements (faces, normals, colours) are
//! skipped. Writing always produces binary little-endian `double` xyz.
//!
//! Element counts come from an untrusted header, so buffers are sized by
//! what the body can actually hold, never by the declared count alone.

use super::IoError;
use crate::point_cloud::PointCloud;
use nalgebra::Point3;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Ascii,
    BinaryLe,
    BinaryBe,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Scalar {
    fn parse(name: &str) -> Result<Self, IoError> {
        Ok(match name {
            "char" | "int8" => Scalar::I8,
            "uchar" | "uint8" => Scalar::U8,
            "short" | "int16" => Scalar::I16,
            "ushort" | "uint16" => Scalar::U16,
            "int" | "int32" => Scalar::I32,
            "uint" | "uint32" => Scalar::U32,
            "float" | "float32" => Scalar::F32,
            "double" | "float64" => Scalar::F64,
            other => return Err(IoError::PlyHeader(format!("unknown scalar type {other:?}"))),
        })
    }

    fn size(self) -> usize {
        match self {
            Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
            Scalar::F64 => 8,
        }
    }
}

#[derive(Clone, Debug)]
enum Property {
    Scalar { name: String, ty: Scalar },
    List { count: Scalar, item: Scalar },
}

#[derive(Clone, Debug)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

#[derive(Debug)]
struct Header {
    format: Format,
    elements: Vec<Element>,
    body_offset: usize,
}

/// Load a point cloud from a PLY file.
pub fn load_ply(path: impl AsRef<Path>) -> Result<PointCloud, IoError> {
    let bytes = fs::read(path)?;
    parse_ply(&bytes)
}

/// Parse an in-memory PLY file.
pub fn parse_ply(bytes: &[u8]) -> Result<PointCloud, IoError> {
    let header = parse_header(bytes)?;
    let body = &bytes[header.body_offset..];
    match header.format {
        Format::Ascii => read_ascii(&header, body),
        Format::BinaryLe | Format::BinaryBe => read_binary(&header, body),
    }
}

fn next_line<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a str, IoError> {
    let rest = &bytes[*offset..];
    let end = rest
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| IoError::PlyHeader("missing end_header".into()))?;
    *offset += end + 1;
    std::str::from_utf8(&rest[..end])
        .map(|s| s.trim_end_matches('\r'))
        .map_err(|_| IoError::PlyHeader("header is not valid UTF-8".into()))
}

fn parse_header(bytes: &[u8]) -> Result<Header, IoError> {
    let mut offset = 0usize;

    if next_line(bytes, &mut offset)?.trim() != "ply" {
        return Err(IoError::PlyHeader("missing `ply` magic".into()));
    }

    let mut format = None;
    let mut elements: Vec<Element> = Vec::new();
    loop {
        let line = next_line(bytes, &mut offset)?;
        let mut tok = line.split_whitespace();
        match tok.next() {
            Some("format") => {
                format = Some(match tok.next() {
                    Some("ascii") => Format::Ascii,
                    Some("binary_little_endian") => Format::BinaryLe,
                    Some("binary_big_endian") => Format::BinaryBe,
                    other => {
                        return Err(IoError::PlyHeader(format!("unsupported format {other:?}")))
                    }
                });
            }
            Some("element") => {
                let name = tok
                    .next()
                    .ok_or_else(|| IoError::PlyHeader("element without name".into()))?;
                let count = tok
                    .next()
                    .and_then(|c| c.parse().ok())
                    .ok_or_else(|| IoError::PlyHeader(format!("element {name} without count")))?;
                elements.push(Element {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| IoError::PlyHeader("property before element".into()))?;
                let first = tok
                    .next()
                    .ok_or_else(|| IoError::PlyHeader("empty property".into()))?;
                let property = if first == "list" {
                    let count = Scalar::parse(tok.next().unwrap_or(""))?;
                    let item = Scalar::parse(tok.next().unwrap_or(""))?;
                    Property::List { count, item }
                } else {
                    let ty = Scalar::parse(first)?;
                    let name = tok
                        .next()
                        .ok_or_else(|| IoError::PlyHeader("property without name".into()))?;
                    Property::Scalar {
                        name: name.to_string(),
                        ty,
                    }
                };
                element.properties.push(property);
            }
            Some("end_header") => break,
            Some("comment") | Some("obj_info") | None => {}
            Some(other) => {
                return Err(IoError::PlyHeader(format!("unexpected keyword {other:?}")));
            }
        }
    }

    let format = format.ok_or_else(|| IoError::PlyHeader("missing format line".into()))?;
    Ok(Header {
        format,
        elements,
        body_offset: offset,
    })
}

/// Indices of `x`, `y`, `z` within the vertex element's properties.
fn xyz_slots(element: &Element) -> Result<[usize; 3], IoError> {
    let find = |axis: &str| {
        element
            .properties
            .iter()
            .position(|p| matches!(p, Property::Scalar { name, .. } if name == axis))
            .ok_or_else(|| IoError::PlyHeader(format!("vertex element has no `{axis}` property")))
    };
    Ok([find("x")?, find("y")?, find("z")?])
}

/// Walk one ascii vertex line property by property.
///
/// List properties consume their length token plus that many items, so they
/// may appear anywhere in the element.
fn parse_ascii_vertex(element: &Element, slots: &[usize; 3], line: &str) -> Option<Point3<f64>> {
    let mut tokens = line.split_whitespace();
    let mut xyz = [0.0f64; 3];
    for (k, prop) in element.properties.iter().enumerate() {
        match prop {
            Property::Scalar { .. } => {
                let tok = tokens.next()?;
                if let Some(axis) = slots.iter().position(|&s| s == k) {
                    xyz[axis] = tok.parse().ok()?;
                }
            }
            Property::List { .. } => {
                let n: usize = tokens.next()?.parse().ok()?;
                for _ in 0..n {
                    tokens.next()?;
                }
            }
        }
    }
    Some(Point3::new(xyz[0], xyz[1], xyz[2]))
}

fn read_ascii(header: &Header, body: &[u8]) -> Result<PointCloud, IoError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| IoError::PlyBody("ascii body is not valid UTF-8".into()))?;
    let available = text.lines().filter(|l| !l.trim().is_empty()).count();
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let mut points = Vec::new();

    for element in &header.elements {
        if element.name != "vertex" {
            for _ in 0..element.count {
                lines.next().ok_or_else(|| {
                    IoError::PlyBody(format!("truncated `{}` element", element.name))
                })?;
            }
            continue;
        }
        let slots = xyz_slots(element)?;
        points.reserve(element.count.min(available));
        for i in 0..element.count {
            let line = lines
                .next()
                .ok_or_else(|| IoError::PlyBody(format!("missing vertex {i}")))?;
            let p = parse_ascii_vertex(element, &slots, line)
                .ok_or_else(|| IoError::PlyBody(format!("bad vertex {i}: {line:?}")))?;
            points.push(p);
        }
    }

    Ok(PointCloud::new(points))
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], IoError> {
        let end = match self.pos.checked_add(n) {
            Some(end) if end <= self.data.len() => end,
            _ => {
                return Err(IoError::PlyBody(format!(
                    "unexpected end of data at byte {}",
                    self.pos
                )))
            }
        };
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read(&mut self, ty: Scalar) -> Result<f64, IoError> {
        let raw = self.take(ty.size())?;
        let big = self.big_endian;
        macro_rules! num {
            ($t:ty, $n:expr) => {{
                let mut buf = [0u8; $n];
                buf.copy_from_slice(raw);
                if big {
                    <$t>::from_be_bytes(buf) as f64
                } else {
                    <$t>::from_le_bytes(buf) as f64
                }
            }};
        }
        Ok(match ty {
            Scalar::I8 => num!(i8, 1),
            Scalar::U8 => num!(u8, 1),
            Scalar::I16 => num!(i16, 2),
            Scalar::U16 => num!(u16, 2),
            Scalar::I32 => num!(i32, 4),
            Scalar::U32 => num!(u32, 4),
            Scalar::F32 => num!(f32, 4),
            Scalar::F64 => num!(f64, 8),
        })
    }
}

/// Smallest possible encoded size of one record (empty lists).
fn min_record_size(element: &Element) -> usize {
    element
        .properties
        .iter()
        .map(|p| match p {
            Property::Scalar { ty, .. } => ty.size(),
            Property::List { count, .. } => count.size(),
        })
        .sum()
}

fn read_binary(header: &Header, body: &[u8]) -> Result<PointCloud, IoError> {
    let mut cur = Cursor {
        data: body,
        pos: 0,
        big_endian: header.format == Format::BinaryBe,
    };
    let mut points = Vec::new();

    for element in &header.elements {
        let slots = if element.name == "vertex" {
            let fits = body.len() / min_record_size(element).max(1);
            points.reserve(element.count.min(fits));
            Some(xyz_slots(element)?)
        } else {
            None
        };
        for _ in 0..element.count {
            let mut xyz = [0.0f64; 3];
            for (k, prop) in element.properties.iter().enumerate() {
                match prop {
                    Property::Scalar { ty, .. } => {
                        let v = cur.read(*ty)?;
                        if let Some(slots) = &slots {
                            if let Some(axis) = slots.iter().position(|&s| s == k) {
                                xyz[axis] = v;
                            }
                        }
                    }
                    Property::List { count, item } => {
                        let n = cur.read(*count)?;
                        if !(0.0..=u32::MAX as f64).contains(&n) {
                            return Err(IoError::PlyBody(format!("invalid list length {n}")));
                        }
                        let bytes = (n as usize).checked_mul(item.size()).ok_or_else(|| {
                            IoError::PlyBody(format!("invalid list length {n}"))
                        })?;
                        cur.take(bytes)?;
                    }
                }
            }
            if slots.is_some() {
                points.push(Point3::new(xyz[0], xyz[1], xyz[2]));
            }
        }
    }

    Ok(PointCloud::new(points))
}

/// Write a cloud as binary little-endian PLY with `double` xyz.
///
/// Full precision, so a written cloud reads back unchanged.
pub fn write_ply(path: impl AsRef<Path>, cloud: &PointCloud) -> Result<(), IoError> {
    let header = format!(
        "ply\nformat binary_little_endian 1.0\nelement vertex {}\n\
         property double x\nproperty double y\nproperty double z\nend_header\n",
        cloud.len()
    );
    let mut out = Vec::with_capacity(header.len() + cloud.len() * 24);
    out.extend_from_slice(header.as_bytes());
    for p in cloud.iter() {
        for v in [p.x, p.y, p.z] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    fs::write(path, out)?;
    Ok(())
}

/// `dir/stem.ext` becomes `dir/stem_<suffix>.ext`.
pub fn suffixed_path(original: &Path, suffix: &str) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match original.extension() {
        Some(ext) => format!("{stem}_{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{suffix}"),
    };
    original.with_file_name(name)
}

/// Save `cloud` next to `original` under a suffixed name and return the path.
pub fn save_point_cloud_with_suffix(
    original: &Path,
    suffix: &str,
    cloud: &PointCloud,
) -> Result<PathBuf, IoError> {
    let path = suffixed_path(original, suffix);
    write_ply(&path, cloud)?;
    log::debug!("wrote {} points to {}", cloud.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_ascii_with_extra_properties_and_faces() {
        let text = "ply\r\nformat ascii 1.0\r\ncomment made by hand\r\n\
element vertex 2\r\nproperty float nx\r\nproperty float x\r\nproperty float y\r\n\
property float z\r\nproperty uchar red\r\nelement face 1\r\n\
property list uchar int vertex_indices\r\nend_header\r\n\
0 1.5 2.5 3.5 255\r\n0 -1 -2 -3 0\r\n3 0 1 1\r\n";
        let cloud = parse_ply(text.as_bytes()).expect("parse");
        assert_eq!(
            cloud.points,
            vec![Point3::new(1.5, 2.5, 3.5), Point3::new(-1.0, -2.0, -3.0)]
        );
    }

    #[test]
    fn reads_big_endian_double_and_skips_list_elements() {
        let mut bytes = b"ply\nformat binary_big_endian 1.0\nelement vertex 1\n\
property double x\nproperty double y\nproperty double z\nproperty short q\n\
element face 1\nproperty list uchar uint vertex_indices\nend_header\n"
            .to_vec();
        for v in [0.25f64, -4.0, 1000.5] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        bytes.extend_from_slice(&7i16.to_be_bytes());
        bytes.push(3);
        for idx in [0u32, 0, 0] {
            bytes.extend_from_slice(&idx.to_be_bytes());
        }
        let cloud = parse_ply(&bytes).expect("parse");
        assert_eq!(cloud.points, vec![Point3::new(0.25, -4.0, 1000.5)]);
    }

    #[test]
    fn truncated_binary_body_is_an_error() {
        let mut bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 2\n\
property float x\nproperty float y\nproperty float z\nend_header\n"
            .to_vec();
        bytes.extend_from_slice(&[0u8; 12]);
        assert!(matches!(parse_ply(&bytes), Err(IoError::PlyBody(_))));
    }

    #[test]
    fn missing_axis_is_a_header_error() {
        let text = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\n\
property float y\nend_header\n1 2\n";
        assert!(matches!(
            parse_ply(text.as_bytes()),
            Err(IoError::PlyHeader(_))
        ));
    }

    #[test]
    fn suffixed_save_lands_next_to_original() {
        let dir = tempfile::tempdir().expect("tempdir");
        let original = dir.path().join("capture.ply");
        let cloud = PointCloud::new(vec![
            Point3::new(0.1, 1.0 / 3.0, 0.123_456_789_012_345),
            Point3::new(-1e-9, 2.0, 499.999_999_999),
        ]);
        let written = save_point_cloud_with_suffix(&original, "aligned", &cloud).expect("save");
        assert_eq!(written, dir.path().join("capture_aligned.ply"));

        let back = load_ply(&written).expect("load");
        assert_eq!(back, cloud);
    }

    #[test]
    fn absurd_vertex_count_fails_without_allocating() {
        let text = "ply\nformat ascii 1.0\nelement vertex 18446744073709551615\n\
property float x\nproperty float y\nproperty float z\nend_header\n1 2 3\n";
        assert!(matches!(
            parse_ply(text.as_bytes()),
            Err(IoError::PlyBody(_))
        ));

        let mut bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 1000000000000\n\
property float x\nproperty float y\nproperty float z\nend_header\n"
            .to_vec();
        bytes.extend_from_slice(&[0u8; 24]);
        assert!(matches!(parse_ply(&bytes), Err(IoError::PlyBody(_))));
    }

    #[test]
    fn ascii_list_before_coordinates_is_skipped() {
        let text = "ply\nformat ascii 1.0\nelement vertex 2\n\
property list uchar float tags\nproperty float x\nproperty float y\n\
property float z\nend_header\n3 9 9 9 1 2 3\n0 4 5 6\n";
        let cloud = parse_ply(text.as_bytes()).expect("parse");
        assert_eq!(
            cloud.points,
            vec![Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 5.0, 6.0)]
        );
    }

    #[test]
    fn suffix_without_extension() {
        assert_eq!(
            suffixed_path(Path::new("/tmp/cloud"), "clipped"),
            PathBuf::from("/tmp/cloud_clipped")
        );
    }
}

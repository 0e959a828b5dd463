//! Unit primitive meshes backing the scene's box/sphere/cylinder/cone/plane
//! factories. Every primitive fits the unit cube centred on the origin.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use super::{Mesh, PrimitiveType, SubMesh};

const SEGMENTS: u32 = 32;
const RINGS: u32 = 16;

/// Names accepted by [`primitive`].
pub const PRIMITIVE_NAMES: [&str; 5] = [
    "unit_box",
    "unit_sphere",
    "unit_cylinder",
    "unit_cone",
    "unit_plane",
];

/// Builds the unit primitive called `name`.
pub fn primitive(name: &str) -> Option<Mesh> {
    let sub = match name {
        "unit_box" => unit_box(),
        "unit_sphere" => unit_sphere(),
        "unit_cylinder" => unit_cylinder(),
        "unit_cone" => unit_cone(),
        "unit_plane" => unit_plane(),
        _ => return None,
    };
    let mut mesh = Mesh::new(name);
    mesh.add_sub_mesh(sub);
    Some(mesh)
}

fn unit_box() -> SubMesh {
    let mut s = SubMesh::with_capacity(PrimitiveType::Triangles, 8);
    for i in 0..8u32 {
        let x = if i & 1 == 0 { -0.5 } else { 0.5 };
        let y = if i & 2 == 0 { -0.5 } else { 0.5 };
        let z = if i & 4 == 0 { -0.5 } else { 0.5 };
        s.add_vertex(Vec3::new(x, y, z));
        s.add_tex_coord(Vec2::new((x + 0.5).abs(), (y + 0.5).abs()));
    }
    // Outward, counter-clockwise.
    const FACES: [[u32; 3]; 12] = [
        [0, 2, 1], [1, 2, 3], // -z
        [4, 5, 6], [5, 7, 6], // +z
        [0, 1, 4], [1, 5, 4], // -y
        [2, 6, 3], [3, 6, 7], // +y
        [0, 4, 2], [2, 4, 6], // -x
        [1, 3, 5], [3, 7, 5], // +x
    ];
    for f in FACES {
        f.iter().for_each(|&i| s.add_index(i));
    }
    s
}

fn unit_plane() -> SubMesh {
    let mut s = SubMesh::with_capacity(PrimitiveType::Triangles, 4);
    for (x, y) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
        s.add_vertex(Vec3::new(x, y, 0.0));
        s.add_tex_coord(Vec2::new(x + 0.5, 0.5 - y));
    }
    for i in [0, 1, 2, 0, 2, 3] {
        s.add_index(i);
    }
    s
}

fn unit_sphere() -> SubMesh {
    let mut s = SubMesh::with_capacity(
        PrimitiveType::Triangles,
        ((RINGS + 1) * (SEGMENTS + 1)) as usize,
    );
    for r in 0..=RINGS {
        let polar = PI * r as f32 / RINGS as f32;
        for g in 0..=SEGMENTS {
            let azimuth = TAU * g as f32 / SEGMENTS as f32;
            s.add_vertex(
                0.5 * Vec3::new(
                    polar.sin() * azimuth.cos(),
                    polar.sin() * azimuth.sin(),
                    polar.cos(),
                ),
            );
            s.add_tex_coord(Vec2::new(
                g as f32 / SEGMENTS as f32,
                r as f32 / RINGS as f32,
            ));
        }
    }
    let stride = SEGMENTS + 1;
    for r in 0..RINGS {
        for g in 0..SEGMENTS {
            let a = r * stride + g;
            let b = a + stride;
            for i in [a, b, a + 1, a + 1, b, b + 1] {
                s.add_index(i);
            }
        }
    }
    s
}

fn unit_cylinder() -> SubMesh {
    lathe(0.5, 0.5)
}

fn unit_cone() -> SubMesh {
    lathe(0.5, 0.0)
}

/// Capped surface of revolution from radius `bottom` at z = -0.5 to radius
/// `top` at z = +0.5.
fn lathe(bottom: f32, top: f32) -> SubMesh {
    let mut s = SubMesh::with_capacity(PrimitiveType::Triangles, (SEGMENTS as usize + 1) * 2 + 2);

    for g in 0..=SEGMENTS {
        let a = TAU * g as f32 / SEGMENTS as f32;
        let (sin, cos) = a.sin_cos();
        let u = g as f32 / SEGMENTS as f32;
        s.add_vertex(Vec3::new(bottom * cos, bottom * sin, -0.5));
        s.add_tex_coord(Vec2::new(u, 1.0));
        s.add_vertex(Vec3::new(top * cos, top * sin, 0.5));
        s.add_tex_coord(Vec2::new(u, 0.0));
    }

    let bottom_centre = s.vertex_count() as u32;
    s.add_vertex(Vec3::new(0.0, 0.0, -0.5));
    s.add_tex_coord(Vec2::new(0.5, 0.5));
    let top_centre = bottom_centre + 1;
    s.add_vertex(Vec3::new(0.0, 0.0, 0.5));
    s.add_tex_coord(Vec2::new(0.5, 0.5));

    for g in 0..SEGMENTS {
        let b0 = 2 * g;
        let t0 = b0 + 1;
        let b1 = b0 + 2;
        let t1 = b0 + 3;
        for i in [b0, b1, t0, t0, b1, t1] {
            s.add_index(i);
        }
        for i in [bottom_centre, b1, b0] {
            s.add_index(i);
        }
        if top > 0.0 {
            for i in [top_centre, t0, t1] {
                s.add_index(i);
            }
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_primitive_builds() {
        for name in PRIMITIVE_NAMES {
            let mesh = primitive(name).unwrap();
            assert_eq!(mesh.name(), name);
            assert!(mesh.index_count() % 3 == 0, "{name}");
            assert!(mesh.triangles().count() > 0, "{name}");
        }
        assert!(primitive("unit_teapot").is_none());
    }

    #[test]
    fn primitives_fit_the_unit_cube() {
        for name in PRIMITIVE_NAMES {
            let (lo, hi) = primitive(name).unwrap().bounds().unwrap();
            assert!(lo.cmpge(Vec3::splat(-0.5 - 1e-5)).all(), "{name}");
            assert!(hi.cmple(Vec3::splat(0.5 + 1e-5)).all(), "{name}");
        }
    }

    #[test]
    fn box_faces_point_outward() {
        let mesh = primitive("unit_box").unwrap();
        for [a, b, c] in mesh.triangles() {
            let normal = (b - a).cross(c - a);
            let centre = (a + b + c) / 3.0;
            assert!(normal.dot(centre) > 0.0);
        }
    }
}

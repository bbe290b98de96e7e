//! Geometric predicates and metric helpers.
//!
//! Everything here is a pure function over `&[f64]` coordinate slices. The
//! predicates are exact-sign tests on plain f64 arithmetic; a result of
//! exactly `0.0` means "on the boundary" and the *callers* own the tie
//! rules (a point on a circumsphere is not in conflict, a point exactly on
//! a box face is sent).
//!
//! Sign conventions, fixed by the unit tests at the bottom of this file:
//! - `orient2d(a, b, c) > 0` when `c` is to the left of `a -> b`.
//! - `orient3d(a, b, c, d) > 0` when `(b-a, c-a, d-a)` is a right-handed
//!   frame.
//! - `in_sphere2` / `in_sphere3` are positive when the query point lies
//!   strictly inside the circumsphere of a *positively oriented* simplex.

#[inline]
fn det3(m: [[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

#[inline]
fn det4(m: [[f64; 4]; 4]) -> f64 {
    let minor = |col: usize| -> f64 {
        let mut sub = [[0.0; 3]; 3];
        for (ri, row) in m[1..].iter().enumerate() {
            let mut cj = 0;
            for (ci, &v) in row.iter().enumerate() {
                if ci != col {
                    sub[ri][cj] = v;
                    cj += 1;
                }
            }
        }
        det3(sub)
    };
    m[0][0] * minor(0) - m[0][1] * minor(1) + m[0][2] * minor(2) - m[0][3] * minor(3)
}

pub fn orient2d(a: &[f64], b: &[f64], c: &[f64]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

pub fn orient3d(a: &[f64], b: &[f64], c: &[f64], d: &[f64]) -> f64 {
    det3([
        [b[0] - a[0], b[1] - a[1], b[2] - a[2]],
        [c[0] - a[0], c[1] - a[1], c[2] - a[2]],
        [d[0] - a[0], d[1] - a[1], d[2] - a[2]],
    ])
}

/// Positive when `p` lies strictly inside the circumcircle of the
/// counterclockwise triangle `(a, b, c)`.
pub fn in_sphere2(a: &[f64], b: &[f64], c: &[f64], p: &[f64]) -> f64 {
    let row = |v: &[f64]| {
        let dx = v[0] - p[0];
        let dy = v[1] - p[1];
        [dx, dy, dx * dx + dy * dy]
    };
    det3([row(a), row(b), row(c)])
}

/// Positive when `p` lies strictly inside the circumsphere of the
/// positively oriented tetrahedron `(a, b, c, d)`.
pub fn in_sphere3(a: &[f64], b: &[f64], c: &[f64], d: &[f64], p: &[f64]) -> f64 {
    let row = |v: &[f64]| {
        let dx = v[0] - p[0];
        let dy = v[1] - p[1];
        let dz = v[2] - p[2];
        [dx, dy, dz, dx * dx + dy * dy + dz * dz]
    };
    // The raw 4x4 determinant is negative for interior points; flip it so
    // both dimensions agree that positive means inside.
    -det4([row(a), row(b), row(c), row(d)])
}

/// Degenerate companion to the in-sphere tests: the query is coplanar with
/// a hull facet and we ask whether it falls strictly inside the facet's own
/// circumscribed (D-1)-sphere, evaluated within the facet's hyperplane.
///
/// In 2D the facet is a segment and the sphere is its diametral circle; in
/// 3D the facet triangle is projected on its dominant coordinate plane with
/// orientation preserved.
pub fn facet_in_sphere(dim: usize, facet: &[&[f64]], p: &[f64]) -> f64 {
    match dim {
        2 => {
            let (a, b) = (facet[0], facet[1]);
            -((p[0] - a[0]) * (p[0] - b[0]) + (p[1] - a[1]) * (p[1] - b[1]))
        }
        _ => {
            let (a, b, c) = (facet[0], facet[1], facet[2]);
            let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let n = [
                u[1] * v[2] - u[2] * v[1],
                u[2] * v[0] - u[0] * v[2],
                u[0] * v[1] - u[1] * v[0],
            ];
            let k = (0..3).max_by(|&i, &j| n[i].abs().total_cmp(&n[j].abs())).unwrap();
            let (i, j) = if n[k] > 0.0 {
                ((k + 1) % 3, (k + 2) % 3)
            } else {
                ((k + 2) % 3, (k + 1) % 3)
            };
            let proj = |v: &[f64]| [v[i], v[j]];
            in_sphere2(&proj(a), &proj(b), &proj(c), &proj(p))
        }
    }
}

/// Orientation of a facet (D points) against a query point: `orient2d` for
/// a segment, `orient3d` for a triangle.
pub fn orient_facet(dim: usize, facet: &[&[f64]], p: &[f64]) -> f64 {
    match dim {
        2 => orient2d(facet[0], facet[1], p),
        _ => orient3d(facet[0], facet[1], facet[2], p),
    }
}

/// Circumcenter and squared radius of a full-dimensional simplex, or `None`
/// when the simplex is flat.
pub fn circumsphere(dim: usize, verts: &[&[f64]]) -> Option<([f64; 3], f64)> {
    let a = verts[0];
    match dim {
        2 => {
            let r1 = [verts[1][0] - a[0], verts[1][1] - a[1]];
            let r2 = [verts[2][0] - a[0], verts[2][1] - a[1]];
            let b1 = 0.5 * (r1[0] * r1[0] + r1[1] * r1[1]);
            let b2 = 0.5 * (r2[0] * r2[0] + r2[1] * r2[1]);
            let det = r1[0] * r2[1] - r1[1] * r2[0];
            if det == 0.0 {
                return None;
            }
            let x = (b1 * r2[1] - b2 * r1[1]) / det;
            let y = (r1[0] * b2 - r2[0] * b1) / det;
            Some(([a[0] + x, a[1] + y, 0.0], x * x + y * y))
        }
        _ => {
            let mut m = [[0.0; 3]; 3];
            let mut b = [0.0; 3];
            for (i, v) in verts[1..].iter().enumerate() {
                let mut n2 = 0.0;
                for d in 0..3 {
                    m[i][d] = v[d] - a[d];
                    n2 += m[i][d] * m[i][d];
                }
                b[i] = 0.5 * n2;
            }
            let det = det3(m);
            if det == 0.0 {
                return None;
            }
            let col = |k: usize| {
                let mut mm = m;
                for i in 0..3 {
                    mm[i][k] = b[i];
                }
                det3(mm) / det
            };
            let x = [col(0), col(1), col(2)];
            Some((
                [a[0] + x[0], a[1] + x[1], a[2] + x[2]],
                x[0] * x[0] + x[1] * x[1] + x[2] * x[2],
            ))
        }
    }
}

/// Closed test: does the ball `(center, r2)` meet the axis-aligned box?
/// Points exactly on a box face count as intersecting.
pub fn ball_box_intersects(dim: usize, center: &[f64], r2: f64, le: &[f64], re: &[f64]) -> bool {
    let mut d2 = 0.0;
    for d in 0..dim {
        let c = center[d].clamp(le[d], re[d]);
        let delta = center[d] - c;
        d2 += delta * delta;
    }
    d2 <= r2
}

/// Closed test: does the box meet the outer half-space of a hull facet?
/// `witness` is any point strictly on the inner side of the facet plane.
pub fn halfspace_box_intersects(
    dim: usize,
    facet: &[&[f64]],
    witness: &[f64],
    le: &[f64],
    re: &[f64],
) -> bool {
    let inner = orient_facet(dim, facet, witness);
    if inner == 0.0 {
        // Flat inner cell; be conservative and send.
        return true;
    }
    let corners = 1usize << dim;
    let mut x = [0.0; 3];
    for mask in 0..corners {
        for d in 0..dim {
            x[d] = if mask & (1 << d) != 0 { re[d] } else { le[d] };
        }
        let o = orient_facet(dim, facet, &x[..dim]);
        if o == 0.0 || (o > 0.0) != (inner > 0.0) {
            return true;
        }
    }
    false
}

/// Area of a 2D polygon given in traversal order.
pub fn polygon_area(poly: &[[f64; 3]]) -> f64 {
    let mut s = 0.0;
    for (i, p) in poly.iter().enumerate() {
        let q = &poly[(i + 1) % poly.len()];
        s += p[0] * q[1] - q[0] * p[1];
    }
    0.5 * s.abs()
}

/// Volume of the pyramid with apex `apex` over the (planar, convex) polygon
/// `face`, via a triangle fan.
pub fn pyramid_volume(apex: &[f64], face: &[[f64; 3]]) -> f64 {
    let mut vol = 0.0;
    for i in 1..face.len().saturating_sub(1) {
        vol += orient3d(apex, &face[0], &face[i], &face[i + 1]).abs() / 6.0;
    }
    vol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_signs() {
        assert!(orient2d(&[0.0, 0.0], &[1.0, 0.0], &[0.0, 1.0]) > 0.0);
        assert!(orient2d(&[0.0, 0.0], &[0.0, 1.0], &[1.0, 0.0]) < 0.0);
        assert!(
            orient3d(&[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0], &[0.0, 0.0, 1.0]) > 0.0
        );
    }

    #[test]
    fn in_sphere_signs() {
        let (a, b, c) = ([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]);
        assert!(in_sphere2(&a, &b, &c, &[0.5, 0.5]) > 0.0);
        assert!(in_sphere2(&a, &b, &c, &[2.0, 2.0]) < 0.0);
        // (1, 1) is on the circumcircle of the unit right triangle.
        assert_eq!(in_sphere2(&a, &b, &c, &[1.0, 1.0]), 0.0);

        let (a, b, c, d) = (
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        );
        assert!(in_sphere3(&a, &b, &c, &d, &[0.5, 0.5, 0.5]) > 0.0);
        assert!(in_sphere3(&a, &b, &c, &d, &[2.0, 2.0, 2.0]) < 0.0);
        assert_eq!(in_sphere3(&a, &b, &c, &d, &[1.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn circumsphere_of_unit_simplices() {
        let (c, r2) = circumsphere(2, &[&[0.0, 0.0], &[1.0, 0.0], &[0.0, 1.0]]).unwrap();
        assert!((c[0] - 0.5).abs() < 1e-12 && (c[1] - 0.5).abs() < 1e-12);
        assert!((r2 - 0.5).abs() < 1e-12);

        let (c, r2) = circumsphere(
            3,
            &[
                &[0.0, 0.0, 0.0],
                &[1.0, 0.0, 0.0],
                &[0.0, 1.0, 0.0],
                &[0.0, 0.0, 1.0],
            ],
        )
        .unwrap();
        assert!((c[0] - 0.5).abs() < 1e-12 && (c[2] - 0.5).abs() < 1e-12);
        assert!((r2 - 0.75).abs() < 1e-12);

        assert!(circumsphere(2, &[&[0.0, 0.0], &[1.0, 0.0], &[2.0, 0.0]]).is_none());
    }

    #[test]
    fn ball_box_closed_boundary() {
        // Ball tangent to the box face: the touching point counts.
        assert!(ball_box_intersects(2, &[2.0, 0.5], 1.0, &[0.0, 0.0], &[1.0, 1.0]));
        assert!(!ball_box_intersects(2, &[2.1, 0.5], 1.0, &[0.0, 0.0], &[1.0, 1.0]));
    }

    #[test]
    fn facet_sphere_degenerate_tests() {
        // Midpoint of a segment is inside its diametral circle, the far
        // collinear point is not.
        assert!(facet_in_sphere(2, &[&[0.0, 0.0], &[1.0, 0.0]], &[0.5, 0.0]) > 0.0);
        assert!(facet_in_sphere(2, &[&[0.0, 0.0], &[1.0, 0.0]], &[2.0, 0.0]) < 0.0);
        // Coplanar query inside / on / outside a triangle's circumcircle.
        let f: [&[f64]; 3] = [&[-1.0, -1.0, 1.0], &[-1.0, -1.0, -1.0], &[-1.0, 1.0, 1.0]];
        assert!(facet_in_sphere(3, &f, &[-1.0, 0.0, 0.0]) > 0.0);
        assert_eq!(facet_in_sphere(3, &f, &[-1.0, 1.0, -1.0]), 0.0);
        assert!(facet_in_sphere(3, &f, &[-1.0, 5.0, 5.0]) < 0.0);
    }
}

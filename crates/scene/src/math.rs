//! Small geometry helpers shared by the reseed derivation and CPU-side
//! picking.

use glam::{Vec2, Vec3};

/// Converts spherical coordinates (radius, polar angle phi, azimuth theta)
/// into Cartesian coordinates.
pub fn spherical_to_xyz(r: f32, phi: f32, theta: f32) -> Vec3 {
    Vec3::new(
        r * phi.sin() * theta.cos(),
        r * phi.sin() * theta.sin(),
        r * phi.cos(),
    )
}

/// Closest intersection found so far by [`trace`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub dist: f32,
    pub index: i32,
}

impl Hit {
    pub const MISS: Hit = Hit {
        dist: 1.0e7,
        index: -2,
    };

    pub fn is_miss(&self) -> bool {
        self.index < 0
    }
}

/// Tests one sphere against a ray, keeping the hit if it is the nearest
/// positive intersection seen so far.
pub fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32, index: i32, hit: &mut Hit) {
    let rc = origin - center;
    let c = rc.dot(rc) - radius * radius;
    let b = dir.dot(rc);
    let d = b * b - c;
    let t = -b - d.abs().sqrt();
    if t > 0.0 && d > 0.0 && t < hit.dist {
        hit.dist = t;
        hit.index = index;
    }
}

/// Traces a ray against `[x, y, z, r]` sphere rows, returning the nearest hit.
pub fn trace(origin: Vec3, dir: Vec3, spheres: &[[f32; 4]]) -> Hit {
    let mut hit = Hit::MISS;
    for (index, sphere) in spheres.iter().enumerate() {
        ray_sphere(
            origin,
            dir,
            Vec3::new(sphere[0], sphere[1], sphere[2]),
            sphere[3],
            index as i32,
            &mut hit,
        );
    }
    hit
}

/// Builds the world-space view ray through a pixel for a look-at camera.
pub fn camera_ray(resolution: Vec2, camera_pos: Vec3, camera_target: Vec3, frag_coord: Vec2) -> Vec3 {
    let aspect = resolution.x / resolution.y;
    let uvd = Vec3::new(
        (-1.0 + 2.0 * frag_coord.x / resolution.x) * aspect,
        -1.0 + 2.0 * frag_coord.y / resolution.y,
        1.0,
    )
    .normalize();
    let zaxis = (camera_target - camera_pos).normalize();
    let xaxis = Vec3::Y.cross(zaxis).normalize();
    let yaxis = zaxis.cross(xaxis).normalize();
    Vec3::new(
        Vec3::new(xaxis.x, yaxis.x, zaxis.x).dot(uvd),
        Vec3::new(xaxis.y, yaxis.y, zaxis.y).dot(uvd),
        Vec3::new(xaxis.z, yaxis.z, zaxis.z).dot(uvd),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spherical_axes() {
        // phi = 0 points straight up the z axis regardless of theta.
        let v = spherical_to_xyz(2.0, 0.0, 1.234);
        assert!((v - Vec3::new(0.0, 0.0, 2.0)).length() < 1.0e-6);

        // phi = pi/2, theta = 0 lands on the x axis.
        let v = spherical_to_xyz(3.0, std::f32::consts::FRAC_PI_2, 0.0);
        assert!((v - Vec3::new(3.0, 0.0, 0.0)).length() < 1.0e-6);
    }

    #[test]
    fn trace_picks_nearest_sphere() {
        let spheres = [
            [0.0, 0.0, 10.0, 1.0],
            [0.0, 0.0, 5.0, 1.0],
            [0.0, 0.0, 20.0, 1.0],
        ];
        let hit = trace(Vec3::ZERO, Vec3::Z, &spheres);
        assert_eq!(hit.index, 1);
        assert!((hit.dist - 4.0).abs() < 1.0e-5);
    }

    #[test]
    fn trace_misses_behind_the_origin() {
        let spheres = [[0.0, 0.0, -5.0, 1.0]];
        let hit = trace(Vec3::ZERO, Vec3::Z, &spheres);
        assert!(hit.is_miss());
        assert_eq!(hit, Hit::MISS);
    }

    #[test]
    fn camera_ray_points_at_target_through_center_pixel() {
        let resolution = Vec2::new(640.0, 480.0);
        let pos = Vec3::new(0.0, 0.0, -10.0);
        let target = Vec3::ZERO;
        let dir = camera_ray(resolution, pos, target, resolution * 0.5);
        assert!((dir - Vec3::Z).length() < 1.0e-4);
        assert!((dir.length() - 1.0).abs() < 1.0e-5);
    }
}

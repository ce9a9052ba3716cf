use super::ResidualFactor;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use taser_core::{Derivative, Pt3, Quat, Real, SupportWindow, Vec2, Vec3};

/// Minimal 4-parameter pinhole intrinsics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinholeIntrinsics {
    pub fx: Real,
    pub fy: Real,
    pub cx: Real,
    pub cy: Real,
}

impl PinholeIntrinsics {
    /// Projects a camera-frame point; `None` if it is not in front of the camera.
    pub fn project(&self, p_cam: &Vec3) -> Option<Vec2> {
        if p_cam.z <= Real::EPSILON {
            return None;
        }
        Some(Vec2::new(
            self.fx * p_cam.x / p_cam.z + self.cx,
            self.fy * p_cam.y / p_cam.z + self.cy,
        ))
    }
}

/// Reprojection of a known landmark seen from the trajectory position at time `t`.
///
/// Camera-frame point: `p_c = R_cw * (landmark - x(t))`. The residual is
/// `project(p_c) - pixel`; points behind the camera give a non-finite residual.
/// No analytic Jacobian is provided.
#[derive(Debug, Clone)]
pub struct ReprojectionFactor {
    pub window: SupportWindow,
    pub landmark: Pt3,
    pub pixel: Vec2,
    pub camera: PinholeIntrinsics,
    pub world_to_camera: Quat,
}

impl ResidualFactor for ReprojectionFactor {
    fn residual_dim(&self) -> usize {
        2
    }

    fn num_params(&self) -> usize {
        self.window.num_params()
    }

    fn residual(&self, params: &[Real]) -> DVector<Real> {
        let x = self.window.combine(params, Derivative::Value);
        let position = Vec3::new(x[0], x[1], x[2]);
        let p_cam = self.world_to_camera * (self.landmark.coords - position);
        match self.camera.project(&p_cam) {
            Some(uv) => DVector::from_vec(vec![uv.x - self.pixel.x, uv.y - self.pixel.y]),
            None => DVector::from_element(2, Real::NAN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PinholeIntrinsics {
        PinholeIntrinsics {
            fx: 500.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
        }
    }

    #[test]
    fn landmark_on_axis_projects_to_principal_point() {
        let window = SupportWindow::new(3, vec![0], vec![1.0], vec![0.0], vec![0.0]);
        let factor = ReprojectionFactor {
            window,
            landmark: Pt3::new(0.0, 0.0, 5.0),
            pixel: Vec2::new(320.0, 240.0),
            camera: camera(),
            world_to_camera: Quat::identity(),
        };
        let r = factor.residual(&[0.0, 0.0, 1.0]);
        assert!(r.norm() < 1e-12);

        // camera moved past the landmark
        let behind = factor.residual(&[0.0, 0.0, 6.0]);
        assert!(behind.iter().all(|v| v.is_nan()));
    }
}

use super::{BindContext, Measurement};
use crate::binding::ResidualBinding;
use crate::error::BindError;
use crate::factors::reprojection::{PinholeIntrinsics, ReprojectionFactor};
use taser_core::{Pt3, Quat, Real, Vec2};

/// Pixel observation of a known landmark by a camera riding on the trajectory.
///
/// The camera orientation is known (`world_to_camera`); only its position comes from
/// the trajectory, which must therefore be 3-dimensional.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraMeasurement {
    pub t: Real,
    pub landmark: Pt3,
    pub pixel: Vec2,
    pub camera: PinholeIntrinsics,
    pub world_to_camera: Quat,
}

impl Measurement for CameraMeasurement {
    fn timestamps(&self) -> Vec<Real> {
        vec![self.t]
    }

    fn bind(&self, ctx: &BindContext<'_>) -> Result<Vec<ResidualBinding>, BindError> {
        ctx.check_time(self.t)?;
        let window = ctx.window(self.t, Some(3))?;
        let params = BindContext::trajectory_refs(&window);
        let factor = ReprojectionFactor {
            window,
            landmark: self.landmark,
            pixel: self.pixel,
            camera: self.camera,
            world_to_camera: self.world_to_camera,
        };
        Ok(vec![ResidualBinding::new("camera", params, Box::new(factor))?])
    }
}

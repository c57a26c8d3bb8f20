//! Serializable chains of layer-space operations.
//!
//! ```json
//! { "steps": [
//!     { "op": "crop", "rect": { "left": 0, "top": 0, "right": 64, "bottom": 64 } },
//!     { "op": "transform", "matrix": [2, 0, 0, 0, 2, 0, 0, 0, 1],
//!       "sampling": { "mode": "cubic", "b": 0.0, "c": 0.5 } },
//!     { "op": "color_filter", "filter": { "kind": "blend", "color": [1, 0, 0, 1], "mode": "src_over" } }
//! ] }
//! ```

use serde::{Deserialize, Serialize};

use crate::color::filter::ColorFilterDesc;
use crate::error::FilterError;
use crate::filter::context::Context;
use crate::filter::result::FilterResult;
use crate::geometry::matrix::Matrix;
use crate::geometry::rect::IRect;
use crate::geometry::space::LayerSpace;
use crate::raster::sampling::Sampling;

/// One operator application. All geometry is in layer space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Crop {
        rect: IRect,
    },
    Transform {
        /// Row-major 3×3.
        matrix: [f32; 9],
        #[serde(default)]
        sampling: Sampling,
    },
    ColorFilter {
        filter: ColorFilterDesc,
    },
}

impl Step {
    pub fn apply(&self, ctx: &Context, input: &FilterResult) -> FilterResult {
        match self {
            Self::Crop { rect } => input.apply_crop(ctx, LayerSpace::new(*rect)),
            Self::Transform { matrix, sampling } => input.apply_transform(
                ctx,
                &LayerSpace::new(Matrix::from_row_major(*matrix)),
                *sampling,
            ),
            Self::ColorFilter { filter } => input.apply_color_filter(ctx, filter.build()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Pipeline {
    pub fn from_json(json: &str) -> Result<Self, FilterError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Threads `source` through every step in order.
    pub fn evaluate(&self, ctx: &Context, source: FilterResult) -> FilterResult {
        self.steps.iter().fold(source, |acc, step| {
            let next = step.apply(ctx, &acc);
            tracing::trace!("{step:?} -> bounds {:?}", next.layer_bounds());
            next
        })
    }
}

//! Parameter → layer → device mapping for one filter evaluation.
//!
//! The device transform is split into two factors:
//!
//! ```text
//! device = layer_to_device × param_to_layer
//! ```
//!
//! `param_to_layer` is the part the filter can evaluate natively (it
//! decides the resolution filtering happens at); `layer_to_device` is the
//! remainder applied when the filtered layer is drawn. Which split is chosen
//! depends on the filter's [`MatrixCapability`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::FilterError;
use crate::geometry::matrix::{Matrix, NEARLY_ZERO};
use crate::geometry::space::{
    CoordSpace, Device, DeviceSpace, Layer, LayerSpace, Mappable, ParamSpace, Parameter, Tagged,
    conjugate_between, map_between,
};

/// The kinds of transform a filter node can evaluate in its own parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixCapability {
    /// Only translation; everything else is applied after filtering.
    Translate,
    /// Axis-aligned scale plus translation.
    ScaleTranslate,
    /// Any transform, including perspective.
    #[default]
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mapping {
    param_to_layer: Matrix,
    layer_to_device: Matrix,
    /// Always the inverse of `layer_to_device`.
    device_to_layer: Matrix,
}

impl Default for Mapping {
    fn default() -> Self {
        Self::new(Matrix::IDENTITY)
    }
}

impl Mapping {
    /// A mapping where layer space and device space coincide.
    pub fn new(param_to_layer: Matrix) -> Self {
        Self {
            param_to_layer,
            layer_to_device: Matrix::IDENTITY,
            device_to_layer: Matrix::IDENTITY,
        }
    }

    /// Splits the device transform `ctm` according to `capability`.
    ///
    /// `representative` is the parameter-space point whose local scale is
    /// used when `ctm` has perspective. Fails with
    /// [`FilterError::NonInvertible`] when the remainder is singular, in
    /// which case the caller should skip the layer.
    pub fn decompose(
        ctm: &Matrix,
        capability: MatrixCapability,
        representative: ParamSpace<Vec2>,
    ) -> Result<Self, FilterError> {
        let (layer, remainder) = if capability == MatrixCapability::Translate {
            (Matrix::IDENTITY, *ctm)
        } else if ctm.is_scale_translate() || capability == MatrixCapability::Complex {
            (*ctm, Matrix::IDENTITY)
        } else if let Some((scale, remainder)) = ctm.decompose_scale() {
            // Rotation or skew remains, which needs resampling after
            // filtering anyway: keep the layer as a plain scale.
            (Matrix::scale(scale.x, scale.y), remainder)
        } else {
            let area = ctm.differential_area_scale(representative.raw());
            let scale = if area.is_finite() && area > NEARLY_ZERO {
                area.sqrt()
            } else {
                // Representative point is behind the w = 0 plane.
                1.0
            };
            let mut remainder = *ctm;
            remainder.pre_scale(1.0 / scale, 1.0 / scale);
            (Matrix::scale(scale, scale), remainder)
        };

        let Some(inv_remainder) = remainder.invert() else {
            tracing::debug!("cannot build a filter layer: remainder {remainder:?} is singular");
            return Err(FilterError::NonInvertible);
        };
        tracing::trace!("decomposed {capability:?} ctm into layer {layer:?}, remainder {remainder:?}");
        Ok(Self {
            param_to_layer: layer,
            layer_to_device: remainder,
            device_to_layer: inv_remainder,
        })
    }

    /// Post-applies `layer` to layer space. Used when merging nested layers.
    /// On failure the mapping is left unchanged.
    pub fn adjust_layer_space(&mut self, layer: &Matrix) -> Result<(), FilterError> {
        let inv_layer = layer.invert().ok_or(FilterError::NonInvertible)?;
        self.param_to_layer.post_concat(layer);
        self.device_to_layer.post_concat(layer);
        self.layer_to_device.pre_concat(&inv_layer);
        Ok(())
    }

    pub fn layer_matrix(&self) -> &Matrix {
        &self.param_to_layer
    }

    pub fn device_matrix(&self) -> &Matrix {
        &self.layer_to_device
    }

    pub fn device_to_layer_matrix(&self) -> &Matrix {
        &self.device_to_layer
    }

    /// The full parameter-to-device transform.
    pub fn total_matrix(&self) -> Matrix {
        self.layer_to_device * self.param_to_layer
    }

    pub fn param_to_layer<T: Mappable>(&self, geom: &ParamSpace<T>) -> LayerSpace<T> {
        map_between::<T, Parameter, Layer>(geom, &self.param_to_layer)
    }

    pub fn layer_to_device<T: Mappable>(&self, geom: &LayerSpace<T>) -> DeviceSpace<T> {
        map_between::<T, Layer, Device>(geom, &self.layer_to_device)
    }

    pub fn device_to_layer<T: Mappable>(&self, geom: &DeviceSpace<T>) -> LayerSpace<T> {
        map_between::<T, Device, Layer>(geom, &self.device_to_layer)
    }

    /// Re-expresses a parameter-space transform in layer space. `None` when
    /// the parameter-to-layer matrix is singular.
    pub fn map_param_matrix_to_layer(
        &self,
        m: &ParamSpace<Matrix>,
    ) -> Option<LayerSpace<Matrix>> {
        conjugate_between(m, &self.param_to_layer)
    }

    pub fn map_layer_matrix_to_device(&self, m: &LayerSpace<Matrix>) -> DeviceSpace<Matrix> {
        conjugate_tagged(m, &self.layer_to_device, &self.device_to_layer)
    }

    pub fn map_device_matrix_to_layer(&self, m: &DeviceSpace<Matrix>) -> LayerSpace<Matrix> {
        conjugate_tagged(m, &self.device_to_layer, &self.layer_to_device)
    }
}

/// Conjugation with a known inverse, so it cannot fail.
fn conjugate_tagged<From: CoordSpace, To: CoordSpace>(
    m: &Tagged<Matrix, From>,
    forward: &Matrix,
    inverse: &Matrix,
) -> Tagged<Matrix, To> {
    Tagged::new(*forward * m.raw() * *inverse)
}

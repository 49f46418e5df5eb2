use nalgebra::{DMatrix, DVector, RealField};

pub trait MeasurementModel<T: RealField> {
    /// Observation for the current step, `None` when nothing valid is available.
    fn measure(&self) -> Option<DVector<T>>;

    /// Expected observation of every state column.
    fn predicted_measure(&self, states: &DMatrix<T>) -> Option<DMatrix<T>>;

    /// Measurement minus each predicted measurement column.
    fn innovation(&self, predicted: &DMatrix<T>, measurement: &DVector<T>) -> DMatrix<T> {
        let mut innovation = predicted.clone();
        for (i, z_pred) in predicted.column_iter().enumerate() {
            innovation.set_column(i, &(measurement - z_pred));
        }
        innovation
    }

    fn noise_covariance_matrix(&self) -> DMatrix<T>;

    fn measurement_size(&self) -> usize;
}

/// z = H x + v, v ~ N(0, R)
///
/// The observation of the current step is frozen with `freeze_measurement`
/// and stays available until cleared.
pub struct LinearMeasurementModel<T: RealField> {
    h: DMatrix<T>,
    r: DMatrix<T>,
    measurement: Option<DVector<T>>,
}

impl<T: RealField + Copy> LinearMeasurementModel<T> {
    pub fn new(h: DMatrix<T>, r: DMatrix<T>) -> LinearMeasurementModel<T> {
        assert!(r.is_square(), "measurement noise must be square");
        assert_eq!(h.nrows(), r.nrows(), "measurement noise does not match H");
        LinearMeasurementModel {
            h,
            r,
            measurement: None,
        }
    }

    pub fn freeze_measurement(&mut self, z: DVector<T>) {
        assert_eq!(z.nrows(), self.h.nrows(), "measurement size does not match H");
        self.measurement = Some(z);
    }

    pub fn clear_measurement(&mut self) {
        self.measurement = None;
    }
}

impl<T: RealField + Copy> MeasurementModel<T> for LinearMeasurementModel<T> {
    fn measure(&self) -> Option<DVector<T>> {
        self.measurement.clone()
    }

    fn predicted_measure(&self, states: &DMatrix<T>) -> Option<DMatrix<T>> {
        if states.nrows() != self.h.ncols() {
            return None;
        }
        Some(&self.h * states)
    }

    fn noise_covariance_matrix(&self) -> DMatrix<T> {
        self.r.clone()
    }

    fn measurement_size(&self) -> usize {
        self.h.nrows()
    }
}

use nalgebra::{DMatrix, DVector, RealField};

/// External perturbation applied on top of the dynamics, e.g. a known control.
///
/// `propagate` maps every column of `cur_states` into the matching column of
/// `prop_states`. Callers never pass the same buffer as input and output.
pub trait ExogenousModel<T: RealField> {
    fn propagate(&self, cur_states: &DMatrix<T>, prop_states: &mut DMatrix<T>);
}

/// x' = x + B u
pub struct ControlInput<T: RealField> {
    b: DMatrix<T>,
    u: DVector<T>,
}

impl<T: RealField + Copy> ControlInput<T> {
    /// Starts with a zero control.
    pub fn new(b: DMatrix<T>) -> ControlInput<T> {
        let u = DVector::zeros(b.ncols());
        ControlInput { b, u }
    }

    pub fn set_control(&mut self, u: DVector<T>) {
        assert_eq!(u.nrows(), self.b.ncols(), "control size does not match B");
        self.u = u;
    }

    pub fn control(&self) -> &DVector<T> {
        &self.u
    }
}

impl<T: RealField + Copy> ExogenousModel<T> for ControlInput<T> {
    fn propagate(&self, cur_states: &DMatrix<T>, prop_states: &mut DMatrix<T>) {
        assert_eq!(cur_states.shape(), prop_states.shape(), "exogenous output shape");
        assert_eq!(cur_states.nrows(), self.b.nrows(), "state size does not match B");
        let displacement = &self.b * &self.u;
        for (i, column) in cur_states.column_iter().enumerate() {
            prop_states.set_column(i, &(column + &displacement));
        }
    }
}

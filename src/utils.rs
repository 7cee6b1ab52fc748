use crate::error::ModelError;
use std::{fmt::Debug, ops::RangeBounds};

pub fn check_num<T, R>(name: &'static str, num: T, range: R) -> Result<(), ModelError>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        return Err(ModelError::invalid(
            name,
            format!("number must be in the range {range:?}, but is {num:?}"),
        ));
    }
    Ok(())
}

pub fn check_prob(name: &'static str, prob: f64) -> Result<(), ModelError> {
    // NaN fails the range test as well.
    check_num(name, prob, 0.0..=1.0)
}

pub fn check_pos(name: &'static str, num: f64) -> Result<(), ModelError> {
    if !(num.is_finite() && num > 0.0) {
        return Err(ModelError::invalid(
            name,
            format!("number must be finite and positive, but is {num:?}"),
        ));
    }
    Ok(())
}

pub fn check_non_neg(name: &'static str, num: f64) -> Result<(), ModelError> {
    if !(num.is_finite() && num >= 0.0) {
        return Err(ModelError::invalid(
            name,
            format!("number must be finite and non-negative, but is {num:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probabilities_outside_unit_interval_are_rejected() {
        assert!(check_prob("p", 0.0).is_ok());
        assert!(check_prob("p", 1.0).is_ok());
        assert!(check_prob("p", -0.1).is_err());
        assert!(check_prob("p", 1.1).is_err());
        assert!(check_prob("p", f64::NAN).is_err());
    }

    #[test]
    fn error_names_the_parameter() {
        let err = check_num("max_steps", 0, 1..).unwrap_err();
        assert!(matches!(
            err,
            ModelError::InvalidConfig {
                name: "max_steps",
                ..
            }
        ));
        assert!(check_pos("dt", 0.0).is_err());
        assert!(check_non_neg("rec_rate", 0.0).is_ok());
        assert!(check_non_neg("rec_rate", f64::INFINITY).is_err());
    }
}

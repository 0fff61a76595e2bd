use std::rc::Rc;

use approx::assert_abs_diff_eq;
use ndarray::prelude::*;
use ndarray_prox::container::ImageGeometry;
use ndarray_prox::error::Error;
use ndarray_prox::functions::compat::DeprecatedAliases;
use ndarray_prox::functions::{Function, Stage, TgvOptions, TotalGeneralisedVariation};
use ndarray_prox::linop::{Backend, Correlation, LinearOperator};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn checkerboard(n: usize, m: usize) -> ArrayD<f64> {
    Array::from_shape_fn(IxDyn(&[n, m]), |ix| ((ix[0] + ix[1]) % 2) as f64)
}

#[test]
fn evaluates_to_zero_before_any_proximal() {
    init();
    let tgv = TotalGeneralisedVariation::new(TgvOptions::default()).unwrap();
    for x in &[checkerboard(4, 4), checkerboard(7, 3) * 100.] {
        assert_eq!(tgv.call(x).unwrap(), 0.);
    }
    assert_eq!(tgv.stage(), Stage::Unconfigured);
}

#[test]
fn repeated_calls_share_operator_and_penalty() {
    init();
    let tgv = TotalGeneralisedVariation::new(TgvOptions {
        max_iteration: 30,
        verbose: 2,
        update_objective_interval: Some(10),
        ..TgvOptions::default()
    })
    .unwrap();
    let x = checkerboard(6, 6);

    let mut out = ArrayD::zeros(IxDyn(&[6, 6]));
    tgv.proximal_to(&x, 0.5, &mut out).unwrap();
    let operator = tgv.operator().unwrap();
    let penalty = tgv.penalty().unwrap();
    let first_trace = tgv.last_objective().unwrap();
    assert_eq!(first_trace.len(), 4);

    let again = tgv.proximal(&x, 0.5).unwrap();
    assert!(Rc::ptr_eq(&operator, &tgv.operator().unwrap()));
    assert!(Rc::ptr_eq(&penalty, &tgv.penalty().unwrap()));
    assert_eq!(tgv.last_iterations(), Some(30));
    assert_eq!(tgv.last_objective().unwrap(), first_trace);
    assert_abs_diff_eq!(again, out, epsilon = 1e-14);
}

#[test]
fn proximal_smooths_and_keeps_the_mean() {
    init();
    let tgv = TotalGeneralisedVariation::new(TgvOptions {
        backend: Backend::Numpy,
        ..TgvOptions::default()
    })
    .unwrap();
    let x = checkerboard(8, 8);
    let u = tgv.proximal(&x, 1.).unwrap();
    assert_abs_diff_eq!(u.mean().unwrap(), x.mean().unwrap(), epsilon = 1e-6);
    let spread = |v: &ArrayD<f64>| {
        v.fold(f64::MIN, |m, &a| m.max(a)) - v.fold(f64::MAX, |m, &a| m.min(a))
    };
    assert!(spread(&u) < 0.5 * spread(&x));

    // the reported value is the penalty at the last inner solution
    let value = tgv.call(&x).unwrap();
    assert!(value > 0.);
    let operator = tgv.operator().unwrap();
    let w = tgv.last_field().unwrap().clone();
    let direct = operator.direct(&(u, w)).unwrap();
    assert_abs_diff_eq!(tgv.penalty().unwrap().call(&direct).unwrap(), value, epsilon = 1e-12);
}

#[test]
fn moreau_identity_through_the_inner_solver() {
    init();
    let tgv = TotalGeneralisedVariation::new(TgvOptions {
        max_iteration: 40,
        ..TgvOptions::default()
    })
    .unwrap();
    let x = Array::from_shape_fn(IxDyn(&[5, 4]), |ix| (ix[0] * ix[1]) as f64 * 0.3 - 1.);
    for &tau in &[0.5, 2.] {
        let expected = &x - &(tgv.proximal(&(&x / tau), 1. / tau).unwrap() * tau);
        let got = tgv.proximal_conjugate(&x, tau).unwrap();
        assert_abs_diff_eq!(got, expected, epsilon = 1e-12);
    }
}

#[test]
fn output_of_another_shape_is_rejected() {
    init();
    let tgv = TotalGeneralisedVariation::new(TgvOptions::default()).unwrap();
    let x = checkerboard(6, 6);
    let mut out = ArrayD::zeros(IxDyn(&[6, 5]));
    let err = tgv.proximal_to(&x, 1., &mut out).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
    assert_eq!(tgv.stage(), Stage::Unconfigured);
    assert!(tgv.operator_norm().is_none());
}

#[test]
fn backends_agree() {
    init();
    let x = Array::from_shape_fn(IxDyn(&[5, 6]), |ix| ((ix[0] * 3 + ix[1] * 5) % 7) as f64 / 7.);
    let run = |backend| {
        let tgv = TotalGeneralisedVariation::new(TgvOptions {
            max_iteration: 25,
            backend,
            ..TgvOptions::default()
        })
        .unwrap();
        tgv.proximal(&x, 0.8).unwrap()
    };
    assert_abs_diff_eq!(run(Backend::C), run(Backend::Numpy), epsilon = 1e-10);
}

#[test]
fn options_parse_from_names() {
    init();
    let geometry = ImageGeometry::new(&[3, 4, 4]).with_channels(true);
    let tgv = TotalGeneralisedVariation::new(TgvOptions {
        alpha: 0.5,
        beta: 1.,
        max_iteration: 5,
        correlation: "SpaceChannels".parse::<Correlation>().unwrap(),
        backend: "numpy".parse::<Backend>().unwrap(),
        split: true,
        domain: Some(geometry),
        ..TgvOptions::default()
    })
    .unwrap();
    let x = Array::from_shape_fn(IxDyn(&[3, 4, 4]), |ix| (ix[0] + ix[1] * ix[2]) as f64);
    tgv.proximal(&x, 1.).unwrap();
    assert_eq!(tgv.operator().unwrap().k11().len(), 3);
    assert!("Spectral".parse::<Correlation>().is_err());
}

#[test]
#[allow(deprecated)]
fn deprecated_prox_alias() {
    init();
    let tgv = TotalGeneralisedVariation::new(TgvOptions {
        max_iteration: 10,
        ..TgvOptions::default()
    })
    .unwrap();
    let x = checkerboard(4, 5);
    let a = tgv.prox(&x, 1.).unwrap();
    let b = tgv.proximal(&x, 1.).unwrap();
    assert_eq!(a, b);
}

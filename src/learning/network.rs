//! Dense feed-forward networks as explicit parameter containers.
//!
//! Forward, backward and optimiser steps are plain functions over the parameters,
//! so there is no hidden autodiff graph: a caller that wants gradients asks for a
//! [`Trace`] on the forward pass and hands it back to [`Mlp::backward`].
//!
//! Layout is row-major batches: inputs are `(batch, in)`, weights `(in, out)`.

use ndarray::{Array1, Array2, Axis, Zip};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One affine layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

impl Linear {
    /// Uniform(-1/sqrt(fan_in), 1/sqrt(fan_in)) init for weights and biases.
    pub fn new<R: Rng>(fan_in: usize, fan_out: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (fan_in as f64).sqrt();
        let weight = Array2::from_shape_fn((fan_in, fan_out), |_| rng.random_range(-bound..bound));
        let bias = Array1::from_shape_fn(fan_out, |_| rng.random_range(-bound..bound));
        Self { weight, bias }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.weight.dim()
    }
}

/// Output nonlinearity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Head {
    Identity,
    /// `scale * tanh(z)`, bounded in [-scale, scale].
    ScaledTanh(f64),
}

/// ReLU hidden layers followed by a linear layer and a [`Head`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<Linear>,
    head: Head,
}

/// Activations recorded on a forward pass, consumed by `backward`.
#[derive(Debug, Clone)]
pub struct Trace {
    /// Input to every layer (`inputs[0]` is the network input).
    inputs: Vec<Array2<f64>>,
    /// Pre-activation of every layer.
    pre: Vec<Array2<f64>>,
    output: Array2<f64>,
}

impl Trace {
    #[inline]
    pub fn output(&self) -> &Array2<f64> {
        &self.output
    }
}

/// Per-layer parameter gradients, same order as the layers.
#[derive(Debug, Clone)]
pub struct Gradients {
    pub layers: Vec<(Array2<f64>, Array1<f64>)>,
}

impl Mlp {
    /// `sizes = [in, hidden.., out]`.
    pub fn new<R: Rng>(sizes: &[usize], head: Head, rng: &mut R) -> Self {
        assert!(sizes.len() >= 2, "an MLP needs at least input and output sizes");
        let layers = sizes
            .windows(2)
            .map(|w| Linear::new(w[0], w[1], rng))
            .collect();
        Self { layers, head }
    }

    #[inline]
    pub fn layers(&self) -> &[Linear] {
        &self.layers
    }

    #[inline]
    pub fn head(&self) -> Head {
        self.head
    }

    /// Layer shapes, used to check persisted parameters against a live network.
    pub fn shapes(&self) -> Vec<(usize, usize)> {
        self.layers.iter().map(Linear::shape).collect()
    }

    pub fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        let last = self.layers.len() - 1;
        let mut a = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = a.dot(&layer.weight) + &layer.bias;
            a = if i == last { self.apply_head(z) } else { z.mapv(relu) };
        }
        a
    }

    pub fn forward_traced(&self, x: &Array2<f64>) -> Trace {
        let last = self.layers.len() - 1;
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut pre = Vec::with_capacity(self.layers.len());
        let mut a = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = a.dot(&layer.weight) + &layer.bias;
            let next = if i == last { self.apply_head(z.clone()) } else { z.mapv(relu) };
            inputs.push(a);
            pre.push(z);
            a = next;
        }
        Trace {
            inputs,
            pre,
            output: a,
        }
    }

    /// Backpropagates `grad_output = dL/d(output)` through a recorded pass.
    ///
    /// Returns parameter gradients and `dL/d(input)`.
    pub fn backward(&self, trace: &Trace, grad_output: &Array2<f64>) -> (Gradients, Array2<f64>) {
        let last = self.layers.len() - 1;

        // through the head
        let mut dz = match self.head {
            Head::Identity => grad_output.clone(),
            Head::ScaledTanh(scale) => {
                let mut dz = grad_output.clone();
                Zip::from(&mut dz).and(&trace.output).for_each(|g, &out| {
                    let t = out / scale;
                    *g *= scale * (1.0 - t * t);
                });
                dz
            }
        };

        let mut grads = Vec::with_capacity(self.layers.len());
        let mut grad_input = Array2::zeros((0, 0));
        for i in (0..=last).rev() {
            let layer = &self.layers[i];
            let dw = trace.inputs[i].t().dot(&dz);
            let db = dz.sum_axis(Axis(0));
            let da = dz.dot(&layer.weight.t());
            grads.push((dw, db));

            if i == 0 {
                grad_input = da;
            } else {
                let mut next = da;
                Zip::from(&mut next)
                    .and(&trace.pre[i - 1])
                    .for_each(|g, &z| {
                        if z <= 0.0 {
                            *g = 0.0;
                        }
                    });
                dz = next;
            }
        }
        grads.reverse();
        (Gradients { layers: grads }, grad_input)
    }

    /// Polyak blend toward `live`: `self = tau * live + (1 - tau) * self`.
    pub fn soft_update_from(&mut self, live: &Mlp, tau: f64) {
        for (t, l) in self.layers.iter_mut().zip(&live.layers) {
            t.weight *= 1.0 - tau;
            t.weight.scaled_add(tau, &l.weight);
            t.bias *= 1.0 - tau;
            t.bias.scaled_add(tau, &l.bias);
        }
    }

    /// Euclidean norm over every parameter.
    pub fn parameter_norm(&self) -> f64 {
        self.layers
            .iter()
            .map(|l| l.weight.iter().chain(l.bias.iter()).map(|v| v * v).sum::<f64>())
            .sum::<f64>()
            .sqrt()
    }

    /// Euclidean distance between two networks of the same shape.
    pub fn distance(&self, other: &Mlp) -> f64 {
        self.layers
            .iter()
            .zip(&other.layers)
            .map(|(a, b)| {
                let w: f64 = a.weight.iter().zip(b.weight.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                let bb: f64 = a.bias.iter().zip(b.bias.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                w + bb
            })
            .sum::<f64>()
            .sqrt()
    }

    fn apply_head(&self, z: Array2<f64>) -> Array2<f64> {
        match self.head {
            Head::Identity => z,
            Head::ScaledTanh(scale) => z.mapv(|v| scale * v.tanh()),
        }
    }
}

#[inline]
fn relu(v: f64) -> f64 {
    v.max(0.0)
}

/// Adam optimiser state for one network.
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    step: i32,
    m: Vec<(Array2<f64>, Array1<f64>)>,
    v: Vec<(Array2<f64>, Array1<f64>)>,
}

impl Adam {
    pub fn new(net: &Mlp, lr: f64) -> Self {
        let zeros: Vec<_> = net
            .layers
            .iter()
            .map(|l| (Array2::zeros(l.weight.raw_dim()), Array1::zeros(l.bias.raw_dim())))
            .collect();
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            step: 0,
            m: zeros.clone(),
            v: zeros,
        }
    }

    /// One descent step on `net` with bias-corrected moments.
    pub fn step(&mut self, net: &mut Mlp, grads: &Gradients) {
        self.step = self.step.saturating_add(1);
        let (b1, b2, eps) = (self.beta1, self.beta2, self.eps);
        let c1 = 1.0 - b1.powi(self.step);
        let c2 = 1.0 - b2.powi(self.step);
        let lr = self.lr;

        for (((layer, (gw, gb)), (mw, mb)), (vw, vb)) in net
            .layers
            .iter_mut()
            .zip(&grads.layers)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
        {
            Zip::from(&mut layer.weight)
                .and(gw)
                .and(mw)
                .and(vw)
                .for_each(|p, &g, m, v| adam_update(p, g, m, v, lr, b1, b2, eps, c1, c2));
            Zip::from(&mut layer.bias)
                .and(gb)
                .and(mb)
                .and(vb)
                .for_each(|p, &g, m, v| adam_update(p, g, m, v, lr, b1, b2, eps, c1, c2));
        }
    }
}

#[inline]
#[allow(clippy::too_many_arguments)]
fn adam_update(
    p: &mut f64,
    g: f64,
    m: &mut f64,
    v: &mut f64,
    lr: f64,
    b1: f64,
    b2: f64,
    eps: f64,
    c1: f64,
    c2: f64,
) {
    *m = b1 * *m + (1.0 - b1) * g;
    *v = b2 * *v + (1.0 - b2) * g * g;
    let m_hat = *m / c1;
    let v_hat = *v / c2;
    *p -= lr * m_hat / (v_hat.sqrt() + eps);
}

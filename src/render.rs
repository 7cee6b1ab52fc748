//! Boundary to the external plotting collaborator.
//!
//! The model never draws anything itself. It hands series and labels to a
//! [`Renderer`], which decides how to present them.

use anyhow::{Context, Result};
use rmp_serde::encode;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

/// Columns of one plotted data set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Scalar field for contour plots.
    pub z: Option<Vec<f64>>,
    /// Grid shape `(n_rows, n_cols)` that `z` reshapes to, row-major.
    pub shape: Option<(usize, usize)>,
}

impl Series {
    pub fn line(label: &str, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            label: label.to_string(),
            x,
            y,
            z: None,
            shape: None,
        }
    }

    pub fn contour(label: &str, x: Vec<f64>, y: Vec<f64>, z: Vec<f64>, shape: (usize, usize)) -> Self {
        Self {
            label: label.to_string(),
            x,
            y,
            z: Some(z),
            shape: Some(shape),
        }
    }
}

/// Presentation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    pub title: String,
    pub x: String,
    pub y: String,
    pub z: Option<String>,
}

impl Labels {
    pub fn new(title: &str, x: &str, y: &str) -> Self {
        Self {
            title: title.to_string(),
            x: x.to_string(),
            y: y.to_string(),
            z: None,
        }
    }

    pub fn with_z(mut self, z: &str) -> Self {
        self.z = Some(z.to_string());
        self
    }
}

pub trait Renderer {
    fn render(&mut self, series: &[Series], labels: &Labels) -> Result<()>;
}

#[derive(Serialize)]
struct Figure<'a> {
    labels: &'a Labels,
    series: &'a [Series],
}

/// Renderer that writes each figure as a MessagePack file for an external plotting tool.
pub struct FileRenderer {
    out_dir: PathBuf,
    prefix: String,
    n_figures: usize,
}

impl FileRenderer {
    pub fn new(out_dir: PathBuf, prefix: &str) -> Self {
        Self {
            out_dir,
            prefix: prefix.to_string(),
            n_figures: 0,
        }
    }
}

impl Renderer for FileRenderer {
    fn render(&mut self, series: &[Series], labels: &Labels) -> Result<()> {
        let file = self
            .out_dir
            .join(format!("figure-{}-{:04}.msgpack", self.prefix, self.n_figures));
        let handle = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(handle);

        encode::write_named(&mut writer, &Figure { labels, series })
            .context("failed to serialize figure")?;
        writer.flush().context("failed to flush writer stream")?;

        self.n_figures += 1;
        log::info!("rendered {:?} to {file:?}", labels.title);

        Ok(())
    }
}
